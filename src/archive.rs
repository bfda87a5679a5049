/*
MIT License

Copyright (c) 2021 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/
//! Module for [`TarArchive`] and its query operations.

use crate::header::HeaderError;
use crate::{BlockCursor, Mode, PosixHeader, TypeFlag, BLOCKSIZE};
use core::fmt::{Debug, Formatter};
use std::collections::HashSet;
use std::io::{Read, Seek};
use thiserror::Error;

/// Errors reported by [`TarArchive::validate`].
#[derive(Debug, Error)]
pub enum ValidateError {
    /// A read or seek of the underlying byte source failed.
    #[error("failed to read from the archive source")]
    Io(#[from] std::io::Error),
    /// A header block is not a well-formed ustar header. Validation stops
    /// at the first offending header; `index` is its zero-based position
    /// among the archive's entries.
    #[error("invalid header at entry index {index}")]
    InvalidHeader {
        /// Zero-based index of the offending entry in scan order.
        index: usize,
        /// The codec-level reason.
        #[source]
        source: HeaderError,
    },
}

/// Errors reported by [`TarArchive::list`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ListError {
    /// No entry in the archive carries the normalized path as name or
    /// prefix, so there is nothing to list.
    #[error("no directory at the given path exists in the archive")]
    NotADirectory,
}

/// Errors reported by [`TarArchive::read_file`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// No entry with the given name exists in the archive. Resolution is
    /// best-effort: source failures during the lookup scans end up here
    /// as well.
    #[error("no entry at path {0:?} exists in the archive")]
    NotFound(String),
    /// The path resolved to an entry that is not a regular file.
    #[error("entry {0:?} is not a regular file")]
    NotAFile(String),
    /// The read offset lies at or beyond the end of the file.
    #[error("offset {offset} is outside the file of {size} bytes")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
        /// Total size of the resolved file in bytes.
        size: u64,
    },
    /// Symbolic link resolution visited the same name twice.
    #[error("symbolic link cycle while resolving {0:?}")]
    SymlinkCycle(String),
    /// Copying the content of an already resolved entry failed.
    #[error("failed to read file content from the archive source")]
    Io(#[from] std::io::Error),
}

/// Describes one entry of an archive: the decoded metadata of a single
/// header block. Entries are transient values produced during a scan; they
/// are never cached across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    size: u64,
    type_flag: TypeFlag,
    link_target: Option<String>,
    mode: Mode,
    /// Absolute byte offset of the first content block.
    content_offset: u64,
}

impl Entry {
    fn from_header(hdr: &PosixHeader, content_offset: u64) -> Result<Self, HeaderError> {
        let size = hdr.content_size()?;
        let name = String::from_utf8_lossy(hdr.name.as_bytes()).into_owned();
        let raw_flag = hdr.typeflag.to_type_flag();
        // Pre-ustar encodings omit the typeflag and mark directories with a
        // trailing slash instead.
        let type_flag = if raw_flag == TypeFlag::AltRegular && name.ends_with('/') {
            TypeFlag::Directory
        } else {
            raw_flag
        };
        let link_target = (type_flag == TypeFlag::Symlink)
            .then(|| String::from_utf8_lossy(hdr.linkname.as_bytes()).into_owned());
        Ok(Self {
            name,
            size,
            type_flag,
            link_target,
            mode: hdr.mode,
            content_offset,
        })
    }

    /// Name of the entry, including any trailing slash. Max 100 bytes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the entry's content in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Kind of the entry.
    #[must_use]
    pub const fn type_flag(&self) -> TypeFlag {
        self.type_flag
    }

    /// The linked-to name. Only meaningful for symbolic links.
    #[must_use]
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    /// UNIX permissions of the entry, see [`Mode::to_flags`].
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the entry is a regular file (either encoding).
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.type_flag.is_regular_file()
    }

    /// Whether the entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.type_flag == TypeFlag::Directory
    }

    /// Whether the entry is a symbolic link.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.type_flag == TypeFlag::Symlink
    }

    fn content_block_count(&self) -> u64 {
        self.size.div_ceil(BLOCKSIZE as u64)
    }
}

/// Result of [`TarArchive::list`]: the names of a directory's immediate
/// children, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Collected child names. A symbolic link child is recorded under its
    /// link target instead of its own name.
    pub names: Vec<String>,
    /// Number of children seen beyond the requested capacity.
    pub truncated: usize,
}

/// Result of [`TarArchive::read_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRead {
    /// Number of bytes copied into the caller buffer.
    pub bytes_written: usize,
    /// Bytes left between the end of the copy and the end of the file.
    /// Zero means the copy reached end-of-file.
    pub remaining: u64,
}

/// Read-only view of a Tar archive over a caller-owned byte source.
///
/// Every operation rewinds the source, performs one linear scan and rewinds
/// again before returning, so calls are independently reentrant. The source
/// must not be shared with anything else for the duration of a call.
pub struct TarArchive<R> {
    cursor: BlockCursor<R>,
}

impl<R> Debug for TarArchive<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TarArchive")
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl<R: Read + Seek> TarArchive<R> {
    /// Interprets the provided byte source as a Tar archive.
    pub const fn new(source: R) -> Self {
        Self {
            cursor: BlockCursor::new(source),
        }
    }

    /// Consumes the archive and returns the underlying byte source.
    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }

    /// Checks whether the archive is valid and returns the number of
    /// entries it holds.
    ///
    /// Each header of a valid archive has a magic value of `"ustar\0"`, a
    /// version value of `"00"` and a correct checksum. Validation is
    /// fail-fast: the first offending header aborts the scan and its entry
    /// index is reported. A truncated final block counts as end of stream,
    /// not as an error.
    ///
    /// # Errors
    /// [`ValidateError::InvalidHeader`] for a malformed header,
    /// [`ValidateError::Io`] if the source fails.
    pub fn validate(&mut self) -> Result<usize, ValidateError> {
        self.cursor.rewind()?;
        let result = self.validate_scan();
        let rewound = self.cursor.rewind();
        let count = result?;
        rewound?;
        Ok(count)
    }

    fn validate_scan(&mut self) -> Result<usize, ValidateError> {
        let mut block = [0u8; BLOCKSIZE];
        let mut count = 0;
        loop {
            if !self.cursor.read_block(&mut block)? {
                return Ok(count);
            }
            let hdr = PosixHeader::from_block(&block);
            if hdr.is_end_marker() {
                log::debug!("End of archive after {count} entries");
                return Ok(count);
            }
            let content_blocks = hdr
                .verify()
                .and_then(|()| hdr.content_block_count())
                .map_err(|source| ValidateError::InvalidHeader {
                    index: count,
                    source,
                })?;
            count += 1;
            self.cursor.skip_blocks(content_blocks)?;
        }
    }

    /// Resolves a path to the metadata of the first entry with exactly that
    /// name in scan order. Matching is byte-for-byte: case-sensitive and
    /// including any trailing slash.
    ///
    /// Returns `None` if no entry matches. Source failures and malformed
    /// headers fold into `None` at this layer; use [`TarArchive::validate`]
    /// to distinguish a broken archive from a missing entry.
    pub fn locate(&mut self, path: &str) -> Option<Entry> {
        let found = self.locate_rescan(path);
        let _ = self.cursor.rewind();
        found
    }

    /// Rewinds and scans for an exact name match. Leaves the cursor
    /// wherever the scan stopped.
    fn locate_rescan(&mut self, path: &str) -> Option<Entry> {
        self.cursor.rewind().ok()?;
        let mut block = [0u8; BLOCKSIZE];
        loop {
            match self.cursor.read_block(&mut block) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    log::warn!("Read failed while resolving {path:?}: {e}");
                    return None;
                }
            }
            let hdr = PosixHeader::from_block(&block);
            if hdr.is_end_marker() {
                return None;
            }
            if let Err(e) = hdr.verify() {
                log::warn!("Malformed header while resolving {path:?}: {e}");
                return None;
            }
            if hdr.name.as_bytes() == path.as_bytes() {
                let content_offset = self.cursor.position();
                return Entry::from_header(hdr, content_offset).ok();
            }
            let content_blocks = hdr.content_block_count().ok()?;
            self.cursor.skip_blocks(content_blocks).ok()?;
        }
    }

    /// Checks whether an entry with exactly the given name exists.
    pub fn exists(&mut self, path: &str) -> bool {
        self.locate(path).is_some()
    }

    /// Checks whether an entry with the given name exists and is a regular
    /// file. Symbolic links are not followed.
    pub fn is_file(&mut self, path: &str) -> bool {
        self.locate(path).is_some_and(|e| e.is_file())
    }

    /// Checks whether an entry with the given name exists and is a
    /// directory.
    pub fn is_dir(&mut self, path: &str) -> bool {
        self.locate(path).is_some_and(|e| e.is_dir())
    }

    /// Checks whether an entry with the given name exists and is a
    /// symbolic link.
    pub fn is_symlink(&mut self, path: &str) -> bool {
        self.locate(path).is_some_and(|e| e.is_symlink())
    }

    /// Lists the immediate children of the directory at `path`, without
    /// recursing into subdirectories. At most `capacity` names are
    /// collected; children beyond that are only counted in
    /// [`Listing::truncated`]. The empty path denotes the archive root.
    ///
    /// Entries below a directory are expected to form one contiguous run
    /// in scan order, as produced by conventional depth-first packing.
    /// Once the run has begun, the first entry outside the directory ends
    /// the scan; matching entries appearing later in a reordered archive
    /// are not found.
    ///
    /// # Errors
    /// [`ListError::NotADirectory`] if no entry carries the normalized
    /// path as name or prefix at all.
    pub fn list(&mut self, path: &str, capacity: usize) -> Result<Listing, ListError> {
        let prefix = normalize_dir_path(path);
        if self.cursor.rewind().is_err() {
            return Err(ListError::NotADirectory);
        }
        let result = self.list_scan(&prefix, capacity);
        let _ = self.cursor.rewind();
        result
    }

    fn list_scan(&mut self, prefix: &str, capacity: usize) -> Result<Listing, ListError> {
        let mut block = [0u8; BLOCKSIZE];
        let mut listing = Listing::default();
        let mut saw_prefix = false;
        loop {
            match self.cursor.read_block(&mut block) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    log::warn!("Read failed while listing {prefix:?}: {e}");
                    break;
                }
            }
            let hdr = PosixHeader::from_block(&block);
            if hdr.is_end_marker() {
                break;
            }
            if let Err(e) = hdr.verify() {
                log::warn!("Malformed header while listing {prefix:?}: {e}");
                break;
            }
            let content_offset = self.cursor.position();
            let Ok(entry) = Entry::from_header(hdr, content_offset) else {
                break;
            };
            if entry.name().starts_with(prefix) {
                saw_prefix = true;
                if let Some(child) = direct_child_name(&entry, prefix) {
                    if listing.names.len() < capacity {
                        listing.names.push(child);
                    } else {
                        listing.truncated += 1;
                    }
                }
            } else if saw_prefix {
                // end of the contiguous run below the directory
                break;
            }
            if self.cursor.skip_blocks(entry.content_block_count()).is_err() {
                break;
            }
        }
        if !saw_prefix && !prefix.is_empty() {
            return Err(ListError::NotADirectory);
        }
        Ok(listing)
    }

    /// Reads the content of the file at `path` into `buf`, starting at
    /// byte `offset` of the file. Symbolic links are resolved first, see
    /// [`ReadError::SymlinkCycle`].
    ///
    /// Copies `min(buf.len(), size - offset)` bytes and returns how many
    /// bytes were written along with how many remain after them.
    ///
    /// # Errors
    /// [`ReadError::NotFound`] if resolution fails, [`ReadError::NotAFile`]
    /// if the resolved entry is not a regular file,
    /// [`ReadError::OffsetOutOfRange`] if `offset >= size`,
    /// [`ReadError::SymlinkCycle`] if link resolution revisits a name,
    /// [`ReadError::Io`] if copying the content fails.
    pub fn read_file(
        &mut self,
        path: &str,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<FileRead, ReadError> {
        self.cursor.rewind()?;
        let result = self.read_file_inner(path, offset, buf);
        let rewound = self.cursor.rewind();
        let read = result?;
        rewound?;
        Ok(read)
    }

    fn read_file_inner(
        &mut self,
        path: &str,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<FileRead, ReadError> {
        let entry = self.resolve_links(path)?;
        if !entry.is_file() {
            return Err(ReadError::NotAFile(entry.name().to_string()));
        }
        if offset >= entry.size() {
            return Err(ReadError::OffsetOutOfRange {
                offset,
                size: entry.size(),
            });
        }
        let want = u64::min(buf.len() as u64, entry.size() - offset) as usize;
        self.cursor.seek_to(entry.content_offset + offset)?;
        self.cursor.read_exact(&mut buf[..want])?;
        Ok(FileRead {
            bytes_written: want,
            remaining: entry.size() - offset - want as u64,
        })
    }

    /// Follows symbolic links iteratively until a non-link entry is
    /// reached. The set of visited names bounds the walk: a repeated name
    /// is a cycle.
    fn resolve_links(&mut self, path: &str) -> Result<Entry, ReadError> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(path.to_string());
        let mut entry = self
            .locate_rescan(path)
            .ok_or_else(|| ReadError::NotFound(path.to_string()))?;
        while entry.is_symlink() {
            let target = entry.link_target().unwrap_or("").to_string();
            log::debug!("Following symlink {:?} -> {target:?}", entry.name());
            if !visited.insert(target.clone()) {
                return Err(ReadError::SymlinkCycle(target));
            }
            entry = match self.locate_rescan(&target) {
                Some(next) => next,
                None => return Err(ReadError::NotFound(target)),
            };
        }
        Ok(entry)
    }
}

/// Directory queries address entries by prefix: a non-empty path gets a
/// trailing slash appended unless it already ends in one. The empty string
/// denotes the archive root and stays as it is.
fn normalize_dir_path(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Returns the name under which `entry` appears as a direct child of the
/// directory `prefix`, or `None` if it is the directory itself or a deeper
/// descendant. A slash is only allowed at the very end of the remainder
/// (a subdirectory child).
fn direct_child_name(entry: &Entry, prefix: &str) -> Option<String> {
    let remainder = &entry.name()[prefix.len()..];
    if remainder.is_empty() {
        return None;
    }
    match remainder.find('/') {
        Some(i) if i + 1 < remainder.len() => None,
        _ => Some(match entry.link_target() {
            Some(target) => target.to_string(),
            None => entry.name().to_string(),
        }),
    }
}
