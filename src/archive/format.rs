//! Binary archive layout.
//!
//! ```text
//! u16  byte-order mark 0xFEFF
//! u32  format version
//! u8   character encoding (0 = ASCII, 1 = UTF-16)
//! u8   flags (bit 0 = zlib-compressed body)
//! u32  CRC-32 of the stored body bytes
//! body:
//!   u32 root count, then root element blobs
//! element blob:
//!   string type name, u64 uid, i32 field count,
//!   per field: string field name, u8 value tag, payload
//! ```

use std::io::{Read, Write};

use crate::stream::Stream;
use crate::util::{ByteOrder, CharacterEncoding, Error, Result};

/// Byte-order mark as written in the archive's byte order.
pub const BYTE_ORDER_MARK: u16 = 0xFEFF;

/// Current format version.
pub const CURRENT_VERSION: u32 = 1;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Header flag: body is zlib-compressed.
pub const FLAG_COMPRESSED: u8 = 1 << 0;

/// Presence marker before a nested element blob.
pub const ELEMENT_PRESENT: u8 = 1;

/// Presence marker for an empty element slot.
pub const ELEMENT_ABSENT: u8 = 0;

/// Deepest element nesting accepted on read.
pub const MAX_DEPTH: usize = 512;

/// Largest decompressed body accepted on read.
pub const MAX_BODY_SIZE: usize = 1 << 30;

/// Decoded archive header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub byte_order: ByteOrder,
    pub version: u32,
    pub encoding: CharacterEncoding,
    pub flags: u8,
    pub checksum: u32,
}

impl Header {
    /// True when the body is zlib-compressed.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Write the header in the stream's byte order.
    pub fn write<C: Write>(&self, stream: &mut Stream<C>) -> Result<()> {
        stream.set_byte_order(self.byte_order);
        stream.write(BYTE_ORDER_MARK)?;
        stream.write(self.version)?;
        stream.write(self.encoding as u8)?;
        stream.write(self.flags)?;
        stream.write(self.checksum)
    }

    /// Read a header, switching the stream to the byte order and encoding
    /// it declares.
    pub fn read<C: Read>(stream: &mut Stream<C>) -> Result<Self> {
        let mut mark = [0u8; 2];
        stream.read_exact(&mut mark)?;
        let byte_order = match u16::from_le_bytes(mark) {
            BYTE_ORDER_MARK => ByteOrder::LittleEndian,
            m if m == BYTE_ORDER_MARK.swap_bytes() => ByteOrder::BigEndian,
            m => return Err(Error::InvalidByteOrderMark(m)),
        };
        stream.set_byte_order(byte_order);

        let version = stream.read::<u32>()?;
        if version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                current: CURRENT_VERSION,
            });
        }
        let encoding = CharacterEncoding::from_u8(stream.read::<u8>()?)?;
        stream.set_encoding(encoding);
        let flags = stream.read::<u8>()?;
        let checksum = stream.read::<u32>()?;

        Ok(Self {
            byte_order,
            version,
            encoding,
            flags,
            checksum,
        })
    }
}
