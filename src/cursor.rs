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
//! Module for [`BlockCursor`].

use crate::BLOCKSIZE;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Sequential, block-addressable access over an underlying byte source.
///
/// The cursor advances by whole 512-byte blocks during scans and can rewind
/// to the archive's first byte. Archive operations open and close with
/// [`BlockCursor::rewind`] on every exit path, so the position is never
/// observable across calls.
pub struct BlockCursor<R> {
    source: R,
    pos: u64,
}

impl<R> core::fmt::Debug for BlockCursor<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCursor")
            .field("pos", &self.pos)
            .field("source", &"<byte source>")
            .finish()
    }
}

impl<R: Read + Seek> BlockCursor<R> {
    /// Creates a cursor over the given byte source. The source is assumed
    /// to be positioned at the archive's first byte.
    pub const fn new(source: R) -> Self {
        Self { source, pos: 0 }
    }

    /// Current absolute byte offset from the archive's first byte.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.pos
    }

    /// Reads exactly one block into `block` and returns `true`, or returns
    /// `false` when the source is exhausted. A truncated final block (fewer
    /// than [`BLOCKSIZE`] bytes available) counts as end of stream, not as
    /// an error.
    ///
    /// # Errors
    /// Propagates a failed read of the underlying source.
    pub fn read_block(&mut self, block: &mut [u8; BLOCKSIZE]) -> std::io::Result<bool> {
        let mut filled = 0;
        while filled < BLOCKSIZE {
            match self.source.read(&mut block[filled..]) {
                Ok(0) => {
                    if filled > 0 {
                        log::warn!(
                            "Truncated block of {filled} bytes at the end of the archive"
                        );
                    }
                    return Ok(false);
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.pos += BLOCKSIZE as u64;
        Ok(true)
    }

    /// Advances the position by `n` blocks without reading their content.
    ///
    /// # Errors
    /// Propagates a failed seek of the underlying source.
    pub fn skip_blocks(&mut self, n: u64) -> std::io::Result<()> {
        let bytes = n * BLOCKSIZE as u64;
        self.source.seek(SeekFrom::Current(bytes as i64))?;
        self.pos += bytes;
        Ok(())
    }

    /// Resets the position to the archive's first byte.
    ///
    /// # Errors
    /// Propagates a failed seek of the underlying source.
    pub fn rewind(&mut self) -> std::io::Result<()> {
        self.source.seek(SeekFrom::Start(0))?;
        self.pos = 0;
        Ok(())
    }

    /// Positions the cursor at an absolute byte offset. Content reads start
    /// mid-block at `content start + offset`, which block-granular access
    /// cannot express.
    ///
    /// # Errors
    /// Propagates a failed seek of the underlying source.
    pub fn seek_to(&mut self, pos: u64) -> std::io::Result<()> {
        self.source.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Fills `buf` completely from the current position.
    ///
    /// # Errors
    /// Propagates a failed or short read of the underlying source.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.source.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Consumes the cursor and returns the underlying byte source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_block_and_position() {
        let data: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        let mut cursor = BlockCursor::new(Cursor::new(data.clone()));

        let mut block = [0u8; BLOCKSIZE];
        assert!(cursor.read_block(&mut block).unwrap());
        assert_eq!(&block[..], &data[0..512]);
        assert_eq!(cursor.position(), 512);

        assert!(cursor.read_block(&mut block).unwrap());
        assert_eq!(&block[..], &data[512..1024]);

        // source exhausted
        assert!(!cursor.read_block(&mut block).unwrap());
    }

    #[test]
    fn test_truncated_final_block_is_end_of_stream() {
        let data = vec![7u8; 700];
        let mut cursor = BlockCursor::new(Cursor::new(data));

        let mut block = [0u8; BLOCKSIZE];
        assert!(cursor.read_block(&mut block).unwrap());
        assert!(!cursor.read_block(&mut block).unwrap());
    }

    #[test]
    fn test_skip_and_rewind() {
        let mut data = vec![0u8; 3 * BLOCKSIZE];
        data[2 * BLOCKSIZE] = 42;
        let mut cursor = BlockCursor::new(Cursor::new(data));

        cursor.skip_blocks(2).unwrap();
        assert_eq!(cursor.position(), 2 * BLOCKSIZE as u64);

        let mut block = [0u8; BLOCKSIZE];
        assert!(cursor.read_block(&mut block).unwrap());
        assert_eq!(block[0], 42);

        cursor.rewind().unwrap();
        assert_eq!(cursor.position(), 0);
        assert!(cursor.read_block(&mut block).unwrap());
        assert_eq!(block[0], 0);
    }

    #[test]
    fn test_seek_to_mid_block() {
        let data: Vec<u8> = (0..600u32).map(|i| (i % 256) as u8).collect();
        let mut cursor = BlockCursor::new(Cursor::new(data.clone()));

        cursor.seek_to(500).unwrap();
        let mut buf = [0u8; 100];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[500..600]);
        assert_eq!(cursor.position(), 600);
    }
}
