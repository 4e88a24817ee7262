//! Fixed-size primitives streams read and write.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;

use crate::util::ByteOrder;

/// Plain-old-data values with a defined byte-swapped form.
pub trait Primitive: bytemuck::Pod {
    /// Read one value in `order`.
    fn read_from<R: Read>(reader: &mut R, order: ByteOrder) -> io::Result<Self>;

    /// Write one value in `order`.
    fn write_to<W: Write>(self, writer: &mut W, order: ByteOrder) -> io::Result<()>;

    /// Reverse the byte order of the value's representation.
    fn swap(self) -> Self;
}

impl Primitive for u8 {
    fn read_from<R: Read>(reader: &mut R, _order: ByteOrder) -> io::Result<Self> {
        reader.read_u8()
    }

    fn write_to<W: Write>(self, writer: &mut W, _order: ByteOrder) -> io::Result<()> {
        writer.write_u8(self)
    }

    fn swap(self) -> Self {
        self
    }
}

impl Primitive for i8 {
    fn read_from<R: Read>(reader: &mut R, _order: ByteOrder) -> io::Result<Self> {
        reader.read_i8()
    }

    fn write_to<W: Write>(self, writer: &mut W, _order: ByteOrder) -> io::Result<()> {
        writer.write_i8(self)
    }

    fn swap(self) -> Self {
        self
    }
}

macro_rules! impl_integer {
    ($($t:ty => $read:ident, $write:ident);* $(;)?) => {
        $(
            impl Primitive for $t {
                fn read_from<R: Read>(reader: &mut R, order: ByteOrder) -> io::Result<Self> {
                    match order {
                        ByteOrder::LittleEndian => reader.$read::<LittleEndian>(),
                        ByteOrder::BigEndian => reader.$read::<BigEndian>(),
                    }
                }

                fn write_to<W: Write>(self, writer: &mut W, order: ByteOrder) -> io::Result<()> {
                    match order {
                        ByteOrder::LittleEndian => writer.$write::<LittleEndian>(self),
                        ByteOrder::BigEndian => writer.$write::<BigEndian>(self),
                    }
                }

                #[inline]
                fn swap(self) -> Self {
                    self.swap_bytes()
                }
            }
        )*
    };
}

impl_integer! {
    u16 => read_u16, write_u16;
    i16 => read_i16, write_i16;
    u32 => read_u32, write_u32;
    i32 => read_i32, write_i32;
    u64 => read_u64, write_u64;
    i64 => read_i64, write_i64;
}

macro_rules! impl_float {
    ($($t:ty => $read:ident, $write:ident);* $(;)?) => {
        $(
            impl Primitive for $t {
                fn read_from<R: Read>(reader: &mut R, order: ByteOrder) -> io::Result<Self> {
                    match order {
                        ByteOrder::LittleEndian => reader.$read::<LittleEndian>(),
                        ByteOrder::BigEndian => reader.$read::<BigEndian>(),
                    }
                }

                fn write_to<W: Write>(self, writer: &mut W, order: ByteOrder) -> io::Result<()> {
                    match order {
                        ByteOrder::LittleEndian => writer.$write::<LittleEndian>(self),
                        ByteOrder::BigEndian => writer.$write::<BigEndian>(self),
                    }
                }

                #[inline]
                fn swap(self) -> Self {
                    <$t>::from_bits(self.to_bits().swap_bytes())
                }
            }
        )*
    };
}

impl_float! {
    f32 => read_f32, write_f32;
    f64 => read_f64, write_f64;
}

impl Primitive for f16 {
    fn read_from<R: Read>(reader: &mut R, order: ByteOrder) -> io::Result<Self> {
        u16::read_from(reader, order).map(f16::from_bits)
    }

    fn write_to<W: Write>(self, writer: &mut W, order: ByteOrder) -> io::Result<()> {
        self.to_bits().write_to(writer, order)
    }

    #[inline]
    fn swap(self) -> Self {
        f16::from_bits(self.to_bits().swap_bytes())
    }
}
