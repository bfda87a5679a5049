//! Fixed-length field types embedded in a Tar header block.
//!
//! All ustar header fields are fixed-size byte arrays holding either an
//! optionally NUL-terminated string or an ASCII number in a given radix.
//! The types here are `#[repr(C)]` so that [`crate::PosixHeader`] can be
//! laid out field by field over a raw 512-byte block.

use core::fmt::{Debug, Formatter};
use core::str::{from_utf8, Utf8Error};

/// String field of a Tar header. The contents are either:
/// 1. a fully populated string with no NUL termination, or
/// 2. a partially populated string where the unused bytes are zero.
///
/// The payload is likely to be UTF-8/ASCII, which is verified by
/// [`TarString::as_str`] but not by the type itself.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct TarString<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> TarString<N> {
    /// Constructor.
    ///
    /// # Panics
    /// Panics if `N` is zero, i.e., the underlying array has no length.
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        assert!(N > 0, "field must have at least one byte");
        Self { bytes }
    }

    /// True if the string is empty (ignoring NUL bytes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    /// Returns the length of the payload in bytes. This is either the data
    /// up to the first NUL byte or the full capacity `N`.
    #[must_use]
    pub fn size(&self) -> usize {
        memchr::memchr(0, &self.bytes).unwrap_or(N)
    }

    /// Returns the raw underlying bytes including any NUL terminator.
    /// Used for literal byte-for-byte comparisons (magic, version).
    #[must_use]
    pub const fn as_raw(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Returns the payload without terminating NUL bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[0..self.size()]
    }

    /// Returns a str ref of the payload, truncated at the first NUL byte.
    ///
    /// # Errors
    /// Returns a [`Utf8Error`] for invalid strings.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        from_utf8(self.as_bytes())
    }

    /// Wrapper around [`Self::as_str`] that stops at the first space. Some
    /// ustar implementations pad numbers with spaces, which prevents the
    /// proper parsing as number otherwise.
    ///
    /// # Errors
    /// Returns a [`Utf8Error`] for invalid strings.
    pub fn as_str_until_first_space(&self) -> Result<&str, Utf8Error> {
        self.as_str().map(|str| {
            let end_index_exclusive = str.find(' ').unwrap_or(str.len());
            &str[0..end_index_exclusive]
        })
    }
}

impl<const N: usize> Debug for TarString<N> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        write!(
            f,
            "str='{:?}',byte_usage={}/{}",
            from_utf8(self.as_bytes()),
            self.size(),
            N
        )
    }
}

/// Number field with radix `R`. Everything from the first space or NUL byte
/// on is ignored when parsing.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct TarNumber<const N: usize, const R: u32>(TarString<N>);

impl<const N: usize, const R: u32> TarNumber<N, R> {
    #[cfg(test)]
    pub(crate) const fn new(bytes: [u8; N]) -> Self {
        Self(TarString::new(bytes))
    }

    /// Interprets the underlying field as a number of the specified type
    /// using the radix `R`.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be parsed as a number of the
    /// specified type and radix.
    pub fn as_number<T>(&self) -> Result<T, T::FromStrRadixErr>
    where
        T: num_traits::Num,
    {
        let str = self.0.as_str_until_first_space().unwrap_or("0");
        T::from_str_radix(str, R)
    }

    /// Returns the underlying [`TarString`].
    #[must_use]
    pub const fn as_inner(&self) -> &TarString<N> {
        &self.0
    }
}

impl<const N: usize, const R: u32> Debug for TarNumber<N, R> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self.as_number::<u64>() {
            Err(msg) => write!(f, "{} [{:?}]", msg, self.0.as_str()),
            Ok(val) => write!(f, "{} [{:?}]", val, self.0.as_str()),
        }
    }
}

/// An octal number field. Trailing spaces in the payload are ignored.
pub type TarOctal<const N: usize> = TarNumber<N, 8>;

#[cfg(test)]
mod tar_string_tests {
    use super::TarString;

    #[test]
    fn test_empty_string() {
        let empty = TarString::new([0]);
        assert!(empty.is_empty());
        assert_eq!(empty.size(), 0);
        assert_eq!(empty.as_str(), Ok(""));
    }

    #[test]
    fn test_string_without_terminator() {
        let s = TarString::new([b'A', b'B']);
        assert!(!s.is_empty());
        assert_eq!(s.size(), 2);
        assert_eq!(s.as_str(), Ok("AB"));
    }

    #[test]
    fn test_string_truncated_at_first_nul() {
        let s = TarString::new([b'A', 0, b'B']);
        assert!(!s.is_empty());
        assert_eq!(s.size(), 1);
        assert_eq!(s.as_str(), Ok("A"));
        assert_eq!(s.as_raw(), &[b'A', 0, b'B']);
    }

    #[test]
    fn test_str_until_first_space() {
        let s = TarString::new([b'A', b'B', b' ', b'X', 0]);
        assert_eq!(s.size(), 4);
        assert_eq!(s.as_str(), Ok("AB X"));
        assert_eq!(s.as_str_until_first_space(), Ok("AB"));
    }
}

#[cfg(test)]
mod tar_number_tests {
    use super::TarNumber;

    #[test]
    fn test_octal_with_nul_terminator() {
        let n = TarNumber::<12, 8>::new(*b"00000001101\0");
        assert_eq!(n.as_number::<u64>(), Ok(0o1101));
    }

    #[test]
    fn test_as_number_with_space_in_string() {
        let n = TarNumber::<5, 10>::new([b'0', b'1', b'0', b' ', 0]);
        assert_eq!(n.as_number::<u64>(), Ok(10));
    }

    #[test]
    fn test_as_number_invalid() {
        let n = TarNumber::<4, 8>::new(*b"9x\0\0");
        assert!(n.as_number::<u64>().is_err());
    }
}
