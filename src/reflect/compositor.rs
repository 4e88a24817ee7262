//! Compositor - the builder a type's `enumerate_class` declares its fields on.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use super::field::{ElementConstraint, Getter, Setter};
use super::{Enumeration, FieldDescriptor, FieldFlags, FieldValue, Reflect, ReflectEnum, Value, ValueKind};
use crate::util::{Error, Result};

pub(crate) type Upcast = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
pub(crate) type UpcastMut = Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

// Pin closures to the higher-ranked signatures above.
fn upcast_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any>,
{
    f
}

fn upcast_mut_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any>,
{
    f
}

/// Link from a type to the base struct it embeds.
///
/// Types form inheritance chains by composition: a `Light` embeds a
/// `Transform`, which embeds a `SceneNode`. The link tells the registry how
/// to reach the embedded base so base fields and hooks apply to derived
/// instances.
pub struct BaseLink<T> {
    pub(crate) type_id: TypeId,
    pub(crate) rust_name: &'static str,
    pub(crate) upcast: Upcast,
    pub(crate) upcast_mut: UpcastMut,
    _marker: PhantomData<fn(T)>,
}

impl<T: Reflect> BaseLink<T> {
    /// Link `T` to its embedded base `B`.
    pub fn new<B: Reflect>(get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        Self {
            type_id: TypeId::of::<B>(),
            rust_name: std::any::type_name::<B>(),
            upcast: Arc::new(upcast_fn(move |any| {
                any.downcast_ref::<T>().map(|t| get(t) as &dyn Any)
            })),
            upcast_mut: Arc::new(upcast_mut_fn(move |any| {
                any.downcast_mut::<T>().map(|t| get_mut(t) as &mut dyn Any)
            })),
            _marker: PhantomData,
        }
    }
}

/// Chainable settings for a field just added to a [`Compositor`].
pub struct FieldBuilder<'a> {
    field: &'a mut FieldDescriptor,
}

impl FieldBuilder<'_> {
    /// Set behaviour flags.
    pub fn flags(self, flags: FieldFlags) -> Self {
        self.field.flags |= flags;
        self
    }

    /// Constrain a nested element field to instances of `U` (or derived).
    pub fn element_type<U: Reflect>(self) -> Self {
        self.field.element_type = Some(ElementConstraint {
            type_id: TypeId::of::<U>(),
            rust_name: std::any::type_name::<U>(),
        });
        self
    }
}

/// Collects field declarations for `T`.
///
/// Default values are captured from `T::default()`.
pub struct Compositor<T> {
    type_name: String,
    defaults: T,
    fields: Vec<FieldDescriptor>,
    enumerations: Vec<Arc<Enumeration>>,
}

impl<T: Reflect> Compositor<T> {
    pub(crate) fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            defaults: T::default(),
            fields: Vec::new(),
            enumerations: Vec::new(),
        }
    }

    /// Name the type is being registered under.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declare a field backed by `F`.
    pub fn add_field<F: FieldValue>(
        &mut self,
        name: &str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> FieldBuilder<'_> {
        let getter: Getter = Arc::new(move |any: &dyn Any| any.downcast_ref::<T>().map(|t| get(t).to_value()));
        let field_name = name.to_owned();
        let setter: Setter = Arc::new(move |any: &mut dyn Any, value: Value| -> Result<()> {
            let target = any.downcast_mut::<T>().ok_or_else(|| wrong_instance::<T>(&field_name))?;
            *get_mut(target) = F::from_value(value)?;
            Ok(())
        });
        let default = Some(get(&self.defaults).to_value());
        self.push(name, F::kind(), default, None, getter, setter)
    }

    /// Declare a nested element field constrained to `U`.
    pub fn add_element_field<U: Reflect, F: FieldValue>(
        &mut self,
        name: &str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> FieldBuilder<'_> {
        self.add_field(name, get, get_mut).element_type::<U>()
    }

    /// Declare an enumeration field; values persist by symbolic name.
    pub fn add_enumeration_field<E: ReflectEnum>(
        &mut self,
        name: &str,
        get: fn(&T) -> &E,
        get_mut: fn(&mut T) -> &mut E,
    ) -> FieldBuilder<'_> {
        let enumeration = Arc::new(E::enumeration());
        self.enumerations.push(Arc::clone(&enumeration));

        let getter: Getter = Arc::new(move |any: &dyn Any| {
            any.downcast_ref::<T>().map(|t| Value::Enum(get(t).to_i32()))
        });
        let field_name = name.to_owned();
        let lookup = Arc::clone(&enumeration);
        let setter: Setter = Arc::new(move |any: &mut dyn Any, value: Value| -> Result<()> {
            let raw = match &value {
                Value::Enum(v) => Some(*v),
                Value::Symbol(s) => lookup.decode(s),
                other => other.as_i64().and_then(|v| i32::try_from(v).ok()),
            };
            let parsed = raw.and_then(E::from_i32).ok_or_else(|| Error::ValueConversion {
                expected: lookup.name().to_owned(),
                actual: format!("{value:?}"),
            })?;
            let target = any.downcast_mut::<T>().ok_or_else(|| wrong_instance::<T>(&field_name))?;
            *get_mut(target) = parsed;
            Ok(())
        });
        let default = Some(Value::Enum(get(&self.defaults).to_i32()));
        self.push(name, ValueKind::Enum, default, Some(enumeration), getter, setter)
    }

    fn push(
        &mut self,
        name: &str,
        kind: ValueKind,
        default: Option<Value>,
        enumeration: Option<Arc<Enumeration>>,
        getter: Getter,
        setter: Setter,
    ) -> FieldBuilder<'_> {
        let index = self.fields.len();
        self.fields.push(FieldDescriptor {
            name: name.to_owned(),
            index,
            declaring_type: self.type_name.clone(),
            declaring_type_id: TypeId::of::<T>(),
            kind,
            flags: FieldFlags::NONE,
            default,
            enumeration,
            element_type: None,
            getter,
            setter,
        });
        FieldBuilder {
            field: &mut self.fields[index],
        }
    }

    pub(crate) fn finish(self) -> Result<(Vec<FieldDescriptor>, Vec<Arc<Enumeration>>)> {
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::DuplicateField {
                    type_name: self.type_name,
                    field: field.name.clone(),
                });
            }
        }
        Ok((self.fields, self.enumerations))
    }
}

fn wrong_instance<T>(field: &str) -> Error {
    Error::InvalidCast {
        expected: std::any::type_name::<T>().to_owned(),
        actual: format!("instance passed to field '{field}'"),
    }
}
