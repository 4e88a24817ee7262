//! Byte order and character encoding negotiated by streams and archives.

use std::fmt;

use crate::util::{Error, Result};

/// Byte order of multi-byte primitives in a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first
    LittleEndian,
    /// Most significant byte first
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the running host.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    /// The opposite byte order.
    #[inline]
    pub const fn swapped(self) -> Self {
        match self {
            Self::LittleEndian => Self::BigEndian,
            Self::BigEndian => Self::LittleEndian,
        }
    }

    /// True when values must be swapped to/from host order.
    #[inline]
    pub const fn needs_swap(self) -> bool {
        !matches!(
            (self, Self::native()),
            (Self::LittleEndian, Self::LittleEndian) | (Self::BigEndian, Self::BigEndian)
        )
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LittleEndian => write!(f, "little-endian"),
            Self::BigEndian => write!(f, "big-endian"),
        }
    }
}

/// Character encoding of persisted strings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CharacterEncoding {
    /// One byte per character (legacy 8-bit)
    Ascii = 0,
    /// Two bytes per UTF-16 code unit, in the stream's byte order
    #[default]
    Utf16 = 1,
}

impl CharacterEncoding {
    /// Bytes per stored code unit.
    #[inline]
    pub const fn unit_size(self) -> usize {
        match self {
            Self::Ascii => 1,
            Self::Utf16 => 2,
        }
    }

    /// Parse from the stored encoding byte.
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Ascii),
            1 => Ok(Self::Utf16),
            other => Err(Error::UnknownEncoding(other)),
        }
    }
}

impl fmt::Display for CharacterEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => write!(f, "ascii"),
            Self::Utf16 => write!(f, "utf-16"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_only_for_foreign_order() {
        assert!(!ByteOrder::native().needs_swap());
        assert!(ByteOrder::native().swapped().needs_swap());
        assert_eq!(ByteOrder::BigEndian.swapped(), ByteOrder::LittleEndian);
    }

    #[test]
    fn test_encoding_byte() {
        assert_eq!(CharacterEncoding::from_u8(0).unwrap(), CharacterEncoding::Ascii);
        assert_eq!(CharacterEncoding::from_u8(1).unwrap(), CharacterEncoding::Utf16);
        assert!(matches!(CharacterEncoding::from_u8(7), Err(Error::UnknownEncoding(7))));
    }
}
