//! Field descriptors: one per reflected struct member.

use std::any::{Any, TypeId};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use super::{Enumeration, Value, ValueKind};
use crate::util::Result;

pub(crate) type Getter = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;
pub(crate) type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;

/// Per-field behaviour flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldFlags(u32);

impl FieldFlags {
    pub const NONE: Self = Self(0);
    /// Never written to archives
    pub const DISCARD: Self = Self(1 << 0);
    /// Written even when equal to the default
    pub const FORCE: Self = Self(1 << 1);
    /// Hidden from editors and inspection dumps
    pub const HIDE: Self = Self(1 << 2);
    /// Editors must not modify
    pub const READ_ONLY: Self = Self(1 << 3);

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FieldFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FieldFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Type a nested element field is constrained to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementConstraint {
    pub type_id: TypeId,
    pub rust_name: &'static str,
}

/// Immutable description of one field of a reflected type.
///
/// Accessors operate on an instance of the *declaring* type; descriptors
/// of derived types project the instance down their base chain first
/// (see [`TypeDescriptor::read_field`](super::TypeDescriptor::read_field)).
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) declaring_type: String,
    pub(crate) declaring_type_id: TypeId,
    pub(crate) kind: ValueKind,
    pub(crate) flags: FieldFlags,
    pub(crate) default: Option<Value>,
    pub(crate) enumeration: Option<Arc<Enumeration>>,
    pub(crate) element_type: Option<ElementConstraint>,
    pub(crate) getter: Getter,
    pub(crate) setter: Setter,
}

impl FieldDescriptor {
    /// Field name as persisted.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaration index within the declaring type.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the type that declared this field.
    #[inline]
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Value kind.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Behaviour flags.
    #[inline]
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Value of this field in a default-constructed instance of the
    /// declaring type. Derived types may default it differently; see
    /// [`TypeDescriptor::default_of`](super::TypeDescriptor::default_of).
    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Enumeration for enum fields.
    #[inline]
    pub fn enumeration(&self) -> Option<&Arc<Enumeration>> {
        self.enumeration.as_ref()
    }

    /// Declared element type for element fields.
    #[inline]
    pub fn element_type(&self) -> Option<ElementConstraint> {
        self.element_type
    }

    /// Read from an instance of the declaring type.
    pub fn get(&self, instance: &dyn Any) -> Option<Value> {
        (self.getter)(instance)
    }

    /// Write to an instance of the declaring type.
    pub fn set(&self, instance: &mut dyn Any, value: Value) -> Result<()> {
        (self.setter)(instance, value)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .finish()
    }
}
