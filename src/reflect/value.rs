//! Dynamic values - the closed set of kinds a reflected field can hold.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use half::f16;

use crate::reflect::ElementPtr;
use crate::util::{Error, Result, Uid};

/// Kind of a field value. The discriminant is the on-disk value tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueKind {
    Bool = 0,
    U8 = 1,
    I8 = 2,
    U16 = 3,
    I16 = 4,
    U32 = 5,
    I32 = 6,
    U64 = 7,
    I64 = 8,
    F16 = 9,
    F32 = 10,
    F64 = 11,
    /// Text, persisted in the stream's character encoding
    String = 12,
    Vec2 = 13,
    Vec3 = 14,
    Vec4 = 15,
    Quat = 16,
    /// 4x4 float matrix, column-major
    Mat4 = 17,
    /// Enumeration, persisted by symbolic name
    Enum = 18,
    /// Nested element owned by value
    Element = 19,
    /// Non-owning reference to an element by uid
    Reference = 20,
    /// Homogeneous collection
    Array = 21,
    /// Ordered key/value collection
    Map = 22,
    /// Unknown/invalid kind
    #[default]
    Unknown = 127,
}

impl ValueKind {
    /// Returns the name of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Quat => "quat",
            Self::Mat4 => "mat4",
            Self::Enum => "enum",
            Self::Element => "element",
            Self::Reference => "reference",
            Self::Array => "array",
            Self::Map => "map",
            Self::Unknown => "unknown",
        }
    }

    /// Convert from the on-disk tag.
    pub const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Bool,
            1 => Self::U8,
            2 => Self::I8,
            3 => Self::U16,
            4 => Self::I16,
            5 => Self::U32,
            6 => Self::I32,
            7 => Self::U64,
            8 => Self::I64,
            9 => Self::F16,
            10 => Self::F32,
            11 => Self::F64,
            12 => Self::String,
            13 => Self::Vec2,
            14 => Self::Vec3,
            15 => Self::Vec4,
            16 => Self::Quat,
            17 => Self::Mat4,
            18 => Self::Enum,
            19 => Self::Element,
            20 => Self::Reference,
            21 => Self::Array,
            22 => Self::Map,
            _ => Self::Unknown,
        }
    }

    /// Returns true for integer and floating point kinds.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::U8
                | Self::I8
                | Self::U16
                | Self::I16
                | Self::U32
                | Self::I32
                | Self::U64
                | Self::I64
                | Self::F16
                | Self::F32
                | Self::F64
        )
    }

    /// Returns true for kinds that hold elements (directly or in a collection).
    #[inline]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Array | Self::Map)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A dynamic field value.
///
/// This is the closed variant set every accessor, visitor and archive walk
/// dispatches on.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F16(f16),
    F32(f32),
    F64(f64),
    String(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Quat(Quat),
    Mat4(Mat4),
    /// In-memory integral enumeration value
    Enum(i32),
    /// Enumeration as persisted: symbolic name (`A|B` for bitfields)
    Symbol(String),
    Element(Option<ElementPtr>),
    Reference(Uid),
    /// Item kind plus items
    Array(ValueKind, Vec<Value>),
    /// Key kind, value kind, pairs in key order
    Map(ValueKind, ValueKind, Vec<(Value, Value)>),
}

impl Value {
    /// Kind of this value (also the on-disk tag).
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::U8(_) => ValueKind::U8,
            Self::I8(_) => ValueKind::I8,
            Self::U16(_) => ValueKind::U16,
            Self::I16(_) => ValueKind::I16,
            Self::U32(_) => ValueKind::U32,
            Self::I32(_) => ValueKind::I32,
            Self::U64(_) => ValueKind::U64,
            Self::I64(_) => ValueKind::I64,
            Self::F16(_) => ValueKind::F16,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::String(_) => ValueKind::String,
            Self::Vec2(_) => ValueKind::Vec2,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Vec4(_) => ValueKind::Vec4,
            Self::Quat(_) => ValueKind::Quat,
            Self::Mat4(_) => ValueKind::Mat4,
            Self::Enum(_) | Self::Symbol(_) => ValueKind::Enum,
            Self::Element(_) => ValueKind::Element,
            Self::Reference(_) => ValueKind::Reference,
            Self::Array(..) => ValueKind::Array,
            Self::Map(..) => ValueKind::Map,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer kind widened to i64 (u64 values above i64::MAX fail).
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::U8(v) => Some(v.into()),
            Self::I8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::I16(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::I64(v) => Some(v),
            Self::Enum(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Any numeric kind widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F16(v) => Some(v.to_f64()),
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Try to get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::Symbol(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get a nested element.
    pub fn as_element(&self) -> Option<&ElementPtr> {
        match self {
            Self::Element(Some(e)) => Some(e),
            _ => None,
        }
    }

    /// Try to get collection items.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(_, items) => Some(items),
            _ => None,
        }
    }

    /// True for empty collections, which archives do not write.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Self::Array(_, items) => items.is_empty(),
            Self::Map(_, _, pairs) => pairs.is_empty(),
            _ => false,
        }
    }

    /// Convert between numeric kinds (and bool), used when a stored field
    /// changed its primitive type between versions.
    pub fn cast(&self, kind: ValueKind) -> Option<Value> {
        if self.kind() == kind {
            return Some(self.clone());
        }
        let value = match (self, kind) {
            (Self::Bool(b), k) if k.is_numeric() => return Self::U8(u8::from(*b)).cast(k),
            (v, ValueKind::Bool) => Self::Bool(v.as_f64()? != 0.0),
            (v, ValueKind::F16) => Self::F16(f16::from_f64(v.as_f64()?)),
            (v, ValueKind::F32) => Self::F32(v.as_f64()? as f32),
            (v, ValueKind::F64) => Self::F64(v.as_f64()?),
            (v, k) if k.is_numeric() => {
                let i = match v {
                    Self::F16(_) | Self::F32(_) | Self::F64(_) => v.as_f64()? as i64,
                    Self::U64(u) => *u as i64,
                    _ => v.as_i64()?,
                };
                match k {
                    ValueKind::U8 => Self::U8(u8::try_from(i).ok()?),
                    ValueKind::I8 => Self::I8(i8::try_from(i).ok()?),
                    ValueKind::U16 => Self::U16(u16::try_from(i).ok()?),
                    ValueKind::I16 => Self::I16(i16::try_from(i).ok()?),
                    ValueKind::U32 => Self::U32(u32::try_from(i).ok()?),
                    ValueKind::I32 => Self::I32(i32::try_from(i).ok()?),
                    ValueKind::U64 => Self::U64(u64::try_from(i).ok()?),
                    ValueKind::I64 => Self::I64(i),
                    _ => return None,
                }
            }
            _ => return None,
        };
        Some(value)
    }
}

fn conversion(expected: ValueKind, actual: &Value) -> Error {
    Error::ValueConversion {
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    }
}

// === Typed conversions ===

/// Rust types that can back a reflected field.
///
/// Implemented for primitives, `String`, glam vectors, element handles,
/// [`Uid`] references and `Vec`/`BTreeMap` of field values. Enumerations
/// go through [`ReflectEnum`](crate::reflect::ReflectEnum) instead.
pub trait FieldValue: Sized + Send + Sync + 'static {
    /// Kind of values produced by [`to_value`](Self::to_value).
    fn kind() -> ValueKind;

    /// Snapshot the value.
    fn to_value(&self) -> Value;

    /// Rebuild from a dynamic value.
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! impl_field_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldValue for $t {
                #[inline]
                fn kind() -> ValueKind {
                    ValueKind::$variant
                }

                #[inline]
                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(conversion(ValueKind::$variant, &other)),
                    }
                }
            }
        )*
    };
}

impl_field_value! {
    bool => Bool,
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f16 => F16,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Quat => Quat,
    Mat4 => Mat4,
    Uid => Reference,
}

impl FieldValue for Option<ElementPtr> {
    fn kind() -> ValueKind {
        ValueKind::Element
    }

    fn to_value(&self) -> Value {
        Value::Element(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Element(e) => Ok(e),
            other => Err(conversion(ValueKind::Element, &other)),
        }
    }
}

impl FieldValue for ElementPtr {
    fn kind() -> ValueKind {
        ValueKind::Element
    }

    fn to_value(&self) -> Value {
        Value::Element(Some(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Element(Some(e)) => Ok(e),
            Value::Element(None) => Err(Error::ValueConversion {
                expected: ValueKind::Element.to_string(),
                actual: "missing element".to_owned(),
            }),
            other => Err(conversion(ValueKind::Element, &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::Array
    }

    fn to_value(&self) -> Value {
        Value::Array(T::kind(), self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(_, items) => items.into_iter().map(T::from_value).collect(),
            other => Err(conversion(ValueKind::Array, &other)),
        }
    }
}

impl<K, V> FieldValue for BTreeMap<K, V>
where
    K: FieldValue + Ord,
    V: FieldValue,
{
    fn kind() -> ValueKind {
        ValueKind::Map
    }

    fn to_value(&self) -> Value {
        Value::Map(
            K::kind(),
            V::kind(),
            self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(_, _, pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => Err(conversion(ValueKind::Map, &other)),
        }
    }
}
