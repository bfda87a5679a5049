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
//! Library to inspect and read entries of Tar archives (ustar format) in
//! place, without unpacking them to a filesystem. If you need full feature
//! support including archive creation, I recommend the use of
//! <https://crates.io/crates/tar> instead.
//!
//! The crate operates on any caller-owned byte source implementing
//! [`std::io::Read`] + [`std::io::Seek`] and offers the following queries:
//!
//! - [`TarArchive::validate`]: walk the whole archive, verify every header
//!   and count the entries,
//! - [`TarArchive::locate`] (plus the [`TarArchive::exists`],
//!   [`TarArchive::is_file`], [`TarArchive::is_dir`] and
//!   [`TarArchive::is_symlink`] predicates): resolve a path to its metadata,
//! - [`TarArchive::list`]: enumerate the immediate children of a directory,
//! - [`TarArchive::read_file`]: copy a byte range of a regular file into a
//!   caller buffer, following symbolic links.
//!
//! Every query performs one linear scan over the archive and restores the
//! source position to the start before returning; no index is built and no
//! state is cached between calls. This keeps queries independently
//! reentrant at the cost of `O(archive size)` per call, which is the
//! intended trade-off for small archives.
//!
//! Only "basic" ustar archives are supported, therefore no extensions such
//! as GNU Longname, sparse files or PAX headers. The maximum supported file
//! name length is 100 characters excluding the NULL-byte.

#![deny(rustdoc::all)]
#![allow(rustdoc::missing_doc_code_examples)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations)]

/// Each archive record (either header or data block) is a block of 512 bytes.
pub const BLOCKSIZE: usize = 512;

/// Maximum length of the name field of a header, in bytes.
pub const NAME_LEN: usize = 100;

/// Length of the prefix field of a ustar header, in bytes. The field exists
/// in the layout but is not interpreted; long names are unsupported.
pub const PREFIX_LEN: usize = 155;

mod archive;
mod cursor;
mod fields;
mod header;

pub use archive::*;
pub use cursor::*;
pub use fields::*;
pub use header::*;
