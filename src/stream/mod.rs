//! Byte streams with explicit byte order and character encoding.
//!
//! A [`Stream`] wraps any byte channel. Multi-byte primitives are swapped
//! whenever the configured [`ByteOrder`] differs from the host, strings are
//! stored as a code-unit count plus an ASCII (Latin-1) or UTF-16 body.

mod file;
mod primitive;

pub use file::{FileChannel, FileMode, FileStream};
pub use primitive::Primitive;

use std::io::{self, BufRead, Cursor, Read, Write};

use crate::util::{ByteOrder, CharacterEncoding, Error, Result};

/// Items per chunk when reading arrays, bounding allocation on corrupt counts.
const ARRAY_CHUNK: usize = 64 * 1024;

/// In-memory stream.
pub type MemoryStream = Stream<Cursor<Vec<u8>>>;

/// Byte-order and encoding aware I/O over a channel.
#[derive(Debug)]
pub struct Stream<C> {
    channel: C,
    byte_order: ByteOrder,
    encoding: CharacterEncoding,
    bytes_read: u64,
    bytes_written: u64,
}

impl<C> Stream<C> {
    /// Wrap a channel.
    pub fn new(channel: C, byte_order: ByteOrder, encoding: CharacterEncoding) -> Self {
        Self {
            channel,
            byte_order,
            encoding,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Change the byte order, e.g. after reading a byte-order mark.
    #[inline]
    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    #[inline]
    pub fn encoding(&self) -> CharacterEncoding {
        self.encoding
    }

    #[inline]
    pub fn set_encoding(&mut self, encoding: CharacterEncoding) {
        self.encoding = encoding;
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Bytes produced so far.
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Borrow the channel.
    pub fn get_ref(&self) -> &C {
        &self.channel
    }

    /// Unwrap the channel.
    pub fn into_inner(self) -> C {
        self.channel
    }
}

impl MemoryStream {
    /// Empty in-memory stream for writing.
    pub fn memory(byte_order: ByteOrder, encoding: CharacterEncoding) -> Self {
        Self::new(Cursor::new(Vec::new()), byte_order, encoding)
    }

    /// In-memory stream reading `bytes`.
    pub fn from_bytes(bytes: Vec<u8>, byte_order: ByteOrder, encoding: CharacterEncoding) -> Self {
        Self::new(Cursor::new(bytes), byte_order, encoding)
    }

    /// Written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.channel.into_inner()
    }
}

fn read_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::StreamIo {
            context: "read".into(),
            message: "unexpected end of data".into(),
        }
    } else {
        Error::stream("read", &err)
    }
}

impl<C: Read> Stream<C> {
    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Stops early only at the end of data.
    pub fn read_buffer(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.channel.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::stream("read", &e)),
            }
        }
        self.bytes_read += filled as u64;
        Ok(filled)
    }

    /// Fill `buf` completely.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.channel.read_exact(buf).map_err(read_error)?;
        self.bytes_read += buf.len() as u64;
        Ok(())
    }

    /// Read everything left in the channel.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let n = self
            .channel
            .read_to_end(&mut out)
            .map_err(|e| Error::stream("read", &e))?;
        self.bytes_read += n as u64;
        Ok(out)
    }

    /// Read one primitive in the stream's byte order.
    pub fn read<T: Primitive>(&mut self) -> Result<T> {
        let value = T::read_from(&mut self.channel, self.byte_order).map_err(read_error)?;
        self.bytes_read += std::mem::size_of::<T>() as u64;
        Ok(value)
    }

    /// Read `count` primitives.
    pub fn read_array<T: Primitive>(&mut self, count: usize) -> Result<Vec<T>> {
        let mut out: Vec<T> = Vec::with_capacity(count.min(ARRAY_CHUNK));
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(ARRAY_CHUNK);
            let start = out.len();
            out.resize(start + n, T::zeroed());
            self.read_exact(bytemuck::cast_slice_mut(&mut out[start..]))?;
            remaining -= n;
        }
        if self.byte_order.needs_swap() {
            for value in &mut out {
                *value = value.swap();
            }
        }
        Ok(out)
    }

    /// Read a length-prefixed string in the stream's encoding.
    pub fn read_string(&mut self) -> Result<String> {
        let count = self.read::<u32>()? as usize;
        match self.encoding {
            CharacterEncoding::Ascii => {
                let bytes = self.read_array::<u8>(count)?;
                Ok(bytes.into_iter().map(char::from).collect())
            }
            CharacterEncoding::Utf16 => {
                let units = self.read_array::<u16>(count)?;
                Ok(char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect())
            }
        }
    }
}

impl<C: BufRead> Stream<C> {
    /// True when no data is left to read.
    pub fn is_done(&mut self) -> Result<bool> {
        self.channel
            .fill_buf()
            .map(|buf| buf.is_empty())
            .map_err(|e| Error::stream("read", &e))
    }
}

impl<C: Write> Stream<C> {
    /// Write raw bytes.
    pub fn write_buffer(&mut self, buf: &[u8]) -> Result<()> {
        self.channel
            .write_all(buf)
            .map_err(|e| Error::stream("write", &e))?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }

    /// Write one primitive in the stream's byte order.
    pub fn write<T: Primitive>(&mut self, value: T) -> Result<()> {
        value
            .write_to(&mut self.channel, self.byte_order)
            .map_err(|e| Error::stream("write", &e))?;
        self.bytes_written += std::mem::size_of::<T>() as u64;
        Ok(())
    }

    /// Write a slice of primitives.
    pub fn write_array<T: Primitive>(&mut self, values: &[T]) -> Result<()> {
        if self.byte_order.needs_swap() {
            let swapped: Vec<T> = values.iter().map(|v| v.swap()).collect();
            self.write_buffer(bytemuck::cast_slice(&swapped))
        } else {
            self.write_buffer(bytemuck::cast_slice(values))
        }
    }

    /// Write a length-prefixed string in the stream's encoding.
    ///
    /// ASCII streams store Latin-1; characters above U+00FF become `?`.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        match self.encoding {
            CharacterEncoding::Ascii => {
                let bytes: Vec<u8> = value
                    .chars()
                    .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                    .collect();
                self.write(bytes.len() as u32)?;
                self.write_buffer(&bytes)
            }
            CharacterEncoding::Utf16 => {
                let units: Vec<u16> = value.encode_utf16().collect();
                self.write(units.len() as u32)?;
                self.write_array(&units)
            }
        }
    }

    /// Flush buffered output.
    pub fn flush(&mut self) -> Result<()> {
        self.channel.flush().map_err(|e| Error::stream("flush", &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order_swapping() {
        let mut stream = MemoryStream::memory(ByteOrder::BigEndian, CharacterEncoding::Utf16);
        stream.write(0x0102_0304u32).unwrap();
        stream.write(1.0f32).unwrap();
        assert_eq!(stream.bytes_written(), 8);
        let bytes = stream.into_bytes();
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        assert_eq!(&bytes[4..], &1.0f32.to_be_bytes());

        let mut stream = MemoryStream::from_bytes(bytes, ByteOrder::BigEndian, CharacterEncoding::Utf16);
        assert_eq!(stream.read::<u32>().unwrap(), 0x0102_0304);
        assert_eq!(stream.read::<f32>().unwrap(), 1.0);
        assert!(stream.is_done().unwrap());
    }

    #[test]
    fn test_array_roundtrip_both_orders() {
        let values = [1u16, 0xABCD, 0x00FF];
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let mut stream = MemoryStream::memory(order, CharacterEncoding::Utf16);
            stream.write_array(&values).unwrap();
            let bytes = stream.into_bytes();

            let mut single = MemoryStream::from_bytes(bytes.clone(), order, CharacterEncoding::Utf16);
            assert_eq!(single.read::<u16>().unwrap(), 1);

            let mut stream = MemoryStream::from_bytes(bytes, order, CharacterEncoding::Utf16);
            assert_eq!(stream.read_array::<u16>(3).unwrap(), values);
        }
    }

    #[test]
    fn test_strings() {
        for encoding in [CharacterEncoding::Ascii, CharacterEncoding::Utf16] {
            let mut stream = MemoryStream::memory(ByteOrder::native().swapped(), encoding);
            stream.write_string("Spot light").unwrap();
            stream.write_string("").unwrap();
            let bytes = stream.into_bytes();
            assert_eq!(bytes.len(), 4 + 10 * encoding.unit_size() + 4);

            let mut stream = MemoryStream::from_bytes(bytes, ByteOrder::native().swapped(), encoding);
            assert_eq!(stream.read_string().unwrap(), "Spot light");
            assert_eq!(stream.read_string().unwrap(), "");
        }
    }

    #[test]
    fn test_ascii_is_latin1() {
        let mut stream = MemoryStream::memory(ByteOrder::LittleEndian, CharacterEncoding::Ascii);
        stream.write_string("café €").unwrap();
        let bytes = stream.into_bytes();
        let mut stream = MemoryStream::from_bytes(bytes, ByteOrder::LittleEndian, CharacterEncoding::Ascii);
        assert_eq!(stream.read_string().unwrap(), "café ?");
    }

    #[test]
    fn test_utf16_surrogates() {
        let text = "light \u{1F4A1}";
        let mut stream = MemoryStream::memory(ByteOrder::BigEndian, CharacterEncoding::Utf16);
        stream.write_string(text).unwrap();
        let bytes = stream.into_bytes();
        assert_eq!(bytes.len(), 4 + 8 * 2);
        let mut stream = MemoryStream::from_bytes(bytes, ByteOrder::BigEndian, CharacterEncoding::Utf16);
        assert_eq!(stream.read_string().unwrap(), text);
    }

    #[test]
    fn test_short_read() {
        let mut stream = MemoryStream::from_bytes(vec![1, 2], ByteOrder::LittleEndian, CharacterEncoding::Utf16);
        let err = stream.read::<u32>().unwrap_err();
        assert!(err.to_string().contains("unexpected end of data"));

        let mut stream = MemoryStream::from_bytes(vec![1, 2, 3], ByteOrder::LittleEndian, CharacterEncoding::Utf16);
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_buffer(&mut buf).unwrap(), 3);
        assert_eq!(stream.bytes_read(), 3);
        assert!(stream.is_done().unwrap());
    }
}
