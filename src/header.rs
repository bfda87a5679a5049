/*
MIT License

Copyright (c) 2023 Philipp Schuster

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
//! TAR header definition taken from
//! <https://www.gnu.org/software/tar/manual/html_node/Standard.html>.
//! A Tar archive is a collection of 512-byte sized blocks. This library
//! focuses on the ustar (POSIX 1003.1-1990) format: every accepted header
//! carries the magic value `"ustar\0"` and the version value `"00"`.

use crate::{TarOctal, TarString, BLOCKSIZE, NAME_LEN, PREFIX_LEN};
use core::fmt::{Debug, Formatter};
use core::num::ParseIntError;
use thiserror::Error;

/// Magic value of a ustar header: the literal "ustar" plus a terminator.
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Version value of a ustar header.
pub const USTAR_VERSION: &[u8; 2] = b"00";

/// Byte range of the checksum field inside a header block. During checksum
/// computation these bytes count as ASCII spaces.
const CHECKSUM_RANGE: core::ops::Range<usize> = 148..156;

/// Reasons why a header block is not a well-formed ustar header.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// The magic field does not hold the literal `"ustar\0"`.
    #[error("bad magic value, expected \"ustar\\0\"")]
    BadMagic,
    /// The version field does not hold the literal `"00"`.
    #[error("bad version value, expected \"00\"")]
    BadVersion,
    /// The stored checksum does not match the sum over the header bytes.
    #[error("bad checksum: stored {stored}, computed {computed}")]
    BadChecksum {
        /// Checksum parsed from the header, or 0 if the field is not octal.
        stored: u64,
        /// Unsigned sum of the header bytes, checksum field as spaces.
        computed: u64,
    },
    /// The size field cannot be parsed as an octal number.
    #[error("size field is not a valid octal number")]
    BadSize,
}

/// Errors that may happen when parsing the [`ModeFlags`].
#[derive(Debug, Error)]
pub enum ModeError {
    /// The mode field is not a valid octal number.
    #[error("mode field is not a valid octal number: {0}")]
    ParseInt(#[from] ParseIntError),
    /// The mode value contains bits outside the known permission flags.
    #[error("mode value contains unknown permission bits")]
    IllegalMode,
}

/// Wrapper around the UNIX file permissions given in octal ASCII.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Mode(TarOctal<8>);

impl Mode {
    /// Parses the [`ModeFlags`] from the mode string.
    pub fn to_flags(self) -> Result<ModeFlags, ModeError> {
        let bits = self.0.as_number::<u64>().map_err(ModeError::ParseInt)?;
        ModeFlags::from_bits(bits).ok_or(ModeError::IllegalMode)
    }
}

impl Debug for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.to_flags(), f)
    }
}

/// Header of the TAR format as specified by POSIX (POSIX 1003.1-1990).
///
/// Each archived object starts with such a header, which describes the kind,
/// the size and the name of the object. After that, the content follows in
/// chunks of 512 bytes; the number of content blocks can be derived from the
/// size field.
///
/// A header is obtained by viewing one 512-byte block as this struct, see
/// [`PosixHeader::from_block`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C, packed)]
pub struct PosixHeader {
    /// Name. There is always a null byte, therefore the max len is 99.
    pub name: TarString<NAME_LEN>,
    pub mode: Mode,
    pub uid: TarOctal<8>,
    pub gid: TarOctal<8>,
    // confusing; size is stored as ASCII string
    pub size: TarOctal<12>,
    pub mtime: TarOctal<12>,
    pub cksum: TarOctal<8>,
    pub typeflag: TypeFlagRaw,
    /// Link target. There is always a null byte, therefore the max len is 99.
    pub linkname: TarString<NAME_LEN>,
    pub magic: TarString<6>,
    pub version: TarString<2>,
    pub uname: TarString<32>,
    pub gname: TarString<32>,
    pub dev_major: TarOctal<8>,
    pub dev_minor: TarOctal<8>,
    /// Path prefix for long names. Present in the layout but not
    /// interpreted; names longer than the name field are unsupported.
    pub prefix: TarString<PREFIX_LEN>,
    // padding => to BLOCKSIZE bytes
    pub _pad: [u8; 12],
}

impl PosixHeader {
    /// Views one block of the archive as a header.
    #[must_use]
    pub fn from_block(block: &[u8; BLOCKSIZE]) -> &Self {
        // SAFETY: the struct is repr(C, packed), consists of byte arrays
        // only and its size equals BLOCKSIZE (asserted in tests).
        unsafe { &*block.as_ptr().cast::<Self>() }
    }

    /// Returns the raw bytes of the underlying block.
    #[must_use]
    pub fn as_block(&self) -> &[u8; BLOCKSIZE] {
        // SAFETY: see from_block; same layout in the other direction.
        unsafe { &*(self as *const Self).cast::<[u8; BLOCKSIZE]>() }
    }

    /// A scan is over as soon as it hits a block whose name field starts
    /// with a zero byte. Well-formed archives terminate with two such
    /// blocks of zero bytes.
    #[must_use]
    pub const fn is_end_marker(&self) -> bool {
        self.name.is_empty()
    }

    /// File size in bytes, decoded from the octal size field.
    pub fn content_size(&self) -> Result<u64, HeaderError> {
        self.size.as_number::<u64>().map_err(|_| HeaderError::BadSize)
    }

    /// Returns the number of blocks that hold the content of this entry.
    pub fn content_block_count(&self) -> Result<u64, HeaderError> {
        Ok(self.content_size()?.div_ceil(BLOCKSIZE as u64))
    }

    /// Checks that this is a well-formed ustar header: the magic value
    /// `"ustar\0"`, the version value `"00"` and a correct checksum, in
    /// that order.
    pub fn verify(&self) -> Result<(), HeaderError> {
        if self.magic.as_raw() != USTAR_MAGIC {
            return Err(HeaderError::BadMagic);
        }
        if self.version.as_raw() != USTAR_VERSION {
            return Err(HeaderError::BadVersion);
        }
        let computed = self.compute_checksum();
        let stored = self.cksum.as_number::<u64>().unwrap_or(0);
        if stored != computed {
            return Err(HeaderError::BadChecksum { stored, computed });
        }
        Ok(())
    }

    /// Computes the checksum over this header: the unsigned sum of all 512
    /// bytes with the checksum field itself counted as ASCII spaces.
    #[must_use]
    pub fn compute_checksum(&self) -> u64 {
        self.as_block()
            .iter()
            .enumerate()
            .map(|(i, &byte)| {
                if CHECKSUM_RANGE.contains(&i) {
                    u64::from(b' ')
                } else {
                    u64::from(byte)
                }
            })
            .sum()
    }
}

/// Raw value of the typeflag field of a header.
#[derive(Copy, Clone, PartialOrd, PartialEq, Eq)]
#[repr(transparent)]
pub struct TypeFlagRaw(u8);

impl TypeFlagRaw {
    /// Maps the underlying byte to a [`TypeFlag`]. Everything that is not
    /// explicitly modeled ends up as [`TypeFlag::Other`].
    #[must_use]
    pub const fn to_type_flag(self) -> TypeFlag {
        TypeFlag::from_byte(self.0)
    }
}

impl Debug for TypeFlagRaw {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.to_type_flag(), f)
    }
}

/// Describes the kind of object an entry represents. Only the kinds the
/// reader acts on are modeled; every other typeflag byte (hard links,
/// device nodes, FIFOs, extension records, ...) is [`TypeFlag::Other`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TypeFlag {
    /// Regular file (typeflag `'0'`).
    Regular,
    /// Regular file in the pre-POSIX encoding (typeflag `'\0'`). In order
    /// to be compatible with older versions of tar, this is silently
    /// recognized as a regular file, unless the name ends with a slash, in
    /// which case the entry counts as a directory.
    AltRegular,
    /// Directory (typeflag `'5'`). The name should end with a slash.
    Directory,
    /// Symbolic link (typeflag `'2'`). The linked-to name is stored in the
    /// linkname field with a trailing null.
    Symlink,
    /// Any other typeflag byte.
    Other(u8),
}

impl TypeFlag {
    /// Maps a raw typeflag byte to the modeled kinds.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' => Self::Regular,
            b'\0' => Self::AltRegular,
            b'5' => Self::Directory,
            b'2' => Self::Symlink,
            byte => Self::Other(byte),
        }
    }

    /// Whether we have a regular file. Both encodings are equivalent, see
    /// [`TypeFlag::AltRegular`].
    #[must_use]
    pub fn is_regular_file(self) -> bool {
        self == Self::Regular || self == Self::AltRegular
    }
}

bitflags::bitflags! {
    /// UNIX file permissions in octal format.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u64 {
        /// Set UID on execution.
        const SetUID = 0o4000;
        /// Set GID on execution.
        const SetGID = 0o2000;
        /// Reserved.
        const TSVTX = 0o1000;
        /// Owner read.
        const OwnerRead = 0o400;
        /// Owner write.
        const OwnerWrite = 0o200;
        /// Owner execute.
        const OwnerExec = 0o100;
        /// Group read.
        const GroupRead = 0o040;
        /// Group write.
        const GroupWrite = 0o020;
        /// Group execute.
        const GroupExec = 0o010;
        /// Others read.
        const OthersRead = 0o004;
        /// Others write.
        const OthersWrite = 0o002;
        /// Others execute.
        const OthersExec = 0o001;
    }
}

/// Builders for raw header blocks used across the crate's test modules.
#[cfg(test)]
pub(crate) mod test_support {
    use crate::{BLOCKSIZE, NAME_LEN};

    /// Writes `value` as a 6-digit octal number plus NUL and space into the
    /// checksum field, the way GNU tar formats it.
    pub fn seal_checksum(block: &mut [u8; BLOCKSIZE]) {
        let sum: u64 = block
            .iter()
            .enumerate()
            .map(|(i, &byte)| {
                if (148..156).contains(&i) {
                    u64::from(b' ')
                } else {
                    u64::from(byte)
                }
            })
            .sum();
        let digits = format!("{sum:06o}");
        block[148..154].copy_from_slice(digits.as_bytes());
        block[154] = 0;
        block[155] = b' ';
    }

    /// Builds one raw ustar header block with a valid checksum.
    pub fn raw_header(name: &str, size: u64, typeflag: u8, linkname: &str) -> [u8; BLOCKSIZE] {
        assert!(name.len() < NAME_LEN);
        assert!(linkname.len() < NAME_LEN);
        let mut block = [0u8; BLOCKSIZE];
        block[0..name.len()].copy_from_slice(name.as_bytes());
        block[100..107].copy_from_slice(b"0000644");
        block[108..115].copy_from_slice(b"0001750");
        block[116..123].copy_from_slice(b"0001750");
        let size_digits = format!("{size:011o}");
        block[124..135].copy_from_slice(size_digits.as_bytes());
        block[136..147].copy_from_slice(b"14321654321");
        block[156] = typeflag;
        block[157..157 + linkname.len()].copy_from_slice(linkname.as_bytes());
        block[257..263].copy_from_slice(b"ustar\0");
        block[263..265].copy_from_slice(b"00");
        seal_checksum(&mut block);
        block
    }
}
