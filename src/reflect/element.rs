//! Elements: shared, introspectable instances of registered types.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use super::{FieldDescriptor, Reflect, TypeDescriptor, Value};
use crate::util::{Error, Result, Uid};

type Data = Box<dyn Any + Send + Sync>;

struct ElementCell {
    uid: Uid,
    class: Arc<TypeDescriptor>,
    data: RwLock<Data>,
}

/// Reference-counted handle to an element.
///
/// Cloning the handle shares the element; [`deep_clone`](Self::deep_clone)
/// copies it. Equality is identity.
#[derive(Clone)]
pub struct ElementPtr(Arc<ElementCell>);

/// One step of [`ElementPtr::visit`].
#[derive(Debug)]
pub enum Visit<'a> {
    /// Entering an element; `depth` is 0 for the root.
    Element { element: &'a ElementPtr, depth: usize },
    /// A field value of the element last entered at `depth`.
    Field {
        owner: &'a ElementPtr,
        field: &'a FieldDescriptor,
        value: &'a Value,
        depth: usize,
    },
}

impl ElementPtr {
    pub(crate) fn from_parts(uid: Uid, class: Arc<TypeDescriptor>, data: Data) -> Self {
        Self(Arc::new(ElementCell {
            uid,
            class,
            data: RwLock::new(data),
        }))
    }

    /// Stable identity, persisted by archives.
    #[inline]
    pub fn uid(&self) -> Uid {
        self.0.uid
    }

    /// Dynamic type descriptor.
    #[inline]
    pub fn class(&self) -> &Arc<TypeDescriptor> {
        &self.0.class
    }

    /// Registered name of the dynamic type.
    #[inline]
    pub fn type_name(&self) -> &str {
        self.0.class.name()
    }

    /// True when both handles share one element.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// True when the dynamic type is `U` or descends from it.
    pub fn has_type<U: Reflect>(&self) -> bool {
        self.0.class.has_type(TypeId::of::<U>())
    }

    /// True when the dynamic type is `class` or descends from it.
    pub fn has_class(&self, class: &TypeDescriptor) -> bool {
        self.0.class.is_a(class)
    }

    /// Borrow the element as `U`, walking the base chain.
    ///
    /// Returns `None` when the dynamic type is not `U` or derived from it.
    pub fn try_cast<U: Reflect>(&self) -> Option<MappedRwLockReadGuard<'_, U>> {
        if !self.has_type::<U>() {
            return None;
        }
        let class = &self.0.class;
        RwLockReadGuard::try_map(self.0.data.read(), |data| {
            class
                .project(&**data, TypeId::of::<U>())
                .and_then(|level| level.downcast_ref::<U>())
        })
        .ok()
    }

    /// Mutably borrow the element as `U`, walking the base chain.
    pub fn try_cast_mut<U: Reflect>(&self) -> Option<MappedRwLockWriteGuard<'_, U>> {
        if !self.has_type::<U>() {
            return None;
        }
        let class = &self.0.class;
        RwLockWriteGuard::try_map(self.0.data.write(), |data| {
            class
                .project_mut(&mut **data, TypeId::of::<U>())
                .and_then(|level| level.downcast_mut::<U>())
        })
        .ok()
    }

    /// [`try_cast`](Self::try_cast) reporting failure as [`Error::InvalidCast`].
    pub fn cast<U: Reflect>(&self) -> Result<MappedRwLockReadGuard<'_, U>> {
        self.try_cast::<U>().ok_or_else(|| self.invalid_cast::<U>())
    }

    /// [`try_cast_mut`](Self::try_cast_mut) reporting failure as [`Error::InvalidCast`].
    pub fn cast_mut<U: Reflect>(&self) -> Result<MappedRwLockWriteGuard<'_, U>> {
        self.try_cast_mut::<U>().ok_or_else(|| self.invalid_cast::<U>())
    }

    fn invalid_cast<U>(&self) -> Error {
        Error::InvalidCast {
            expected: std::any::type_name::<U>().to_owned(),
            actual: self.type_name().to_owned(),
        }
    }

    pub(crate) fn data(&self) -> RwLockReadGuard<'_, Data> {
        self.0.data.read()
    }

    pub(crate) fn data_mut(&self) -> RwLockWriteGuard<'_, Data> {
        self.0.data.write()
    }

    fn field(&self, name: &str) -> Result<&Arc<FieldDescriptor>> {
        self.0
            .class
            .find_field(name)
            .ok_or_else(|| Error::FieldNotFound {
                type_name: self.type_name().to_owned(),
                field: name.to_owned(),
            })
    }

    /// Read a field by name.
    pub fn get_field(&self, name: &str) -> Result<Value> {
        let field = self.field(name)?;
        let data = self.0.data.read();
        self.0
            .class
            .read_field(&**data, field)
            .ok_or_else(|| Error::FieldNotFound {
                type_name: self.type_name().to_owned(),
                field: name.to_owned(),
            })
    }

    /// Write a field by name.
    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        let field = Arc::clone(self.field(name)?);
        let mut data = self.0.data.write();
        self.0.class.write_field(&mut **data, &field, value)
    }

    /// Snapshot every field, base first.
    ///
    /// Nested elements in the snapshot are shared handles, not copies.
    pub fn values(&self) -> Vec<(Arc<FieldDescriptor>, Value)> {
        let class = &self.0.class;
        let data = self.0.data.read();
        class
            .all_fields()
            .iter()
            .filter_map(|f| class.read_field(&**data, f).map(|v| (Arc::clone(f), v)))
            .collect()
    }

    /// Elements owned directly by this element's fields.
    pub fn children(&self) -> Vec<ElementPtr> {
        let mut out = Vec::new();
        for (_, value) in self.values() {
            collect_elements(&value, &mut out);
        }
        out
    }

    /// Copy this element and every element it owns.
    ///
    /// Copies get fresh uids. Fields not declared through the compositor
    /// take their default values. [`Uid`] references are copied verbatim.
    pub fn deep_clone(&self) -> Result<ElementPtr> {
        self.deep_clone_guarded(&mut HashSet::new())
    }

    fn deep_clone_guarded(&self, active: &mut HashSet<Uid>) -> Result<ElementPtr> {
        if !active.insert(self.uid()) {
            return Err(Error::OwnershipCycle(format!("{} {}", self.type_name(), self.uid())));
        }
        let class = &self.0.class;
        let mut data = class.create()?;
        for (field, value) in self.values() {
            let value = clone_value(value, active)?;
            class.write_field(&mut *data, &field, value)?;
        }
        active.remove(&self.uid());
        Ok(ElementPtr::from_parts(Uid::generate(), Arc::clone(class), data))
    }

    /// Deep field-wise equality; nested elements compare by content.
    pub fn field_equals(&self, other: &ElementPtr) -> bool {
        if Self::ptr_eq(self, other) {
            return true;
        }
        if self.0.class.type_id() != other.0.class.type_id() {
            return false;
        }
        let ours = self.values();
        let theirs = other.values();
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(&theirs)
                .all(|((_, a), (_, b))| values_equal(a, b))
    }

    /// Walk this element and everything it owns, depth first.
    pub fn visit(&self, visitor: &mut dyn FnMut(Visit<'_>)) {
        self.visit_at(0, visitor, &mut HashSet::new());
    }

    fn visit_at(&self, depth: usize, visitor: &mut dyn FnMut(Visit<'_>), active: &mut HashSet<Uid>) {
        if !active.insert(self.uid()) {
            return;
        }
        visitor(Visit::Element { element: self, depth });
        for (field, value) in self.values() {
            visitor(Visit::Field {
                owner: self,
                field: &field,
                value: &value,
                depth,
            });
            let mut nested = Vec::new();
            collect_elements(&value, &mut nested);
            for child in nested {
                child.visit_at(depth + 1, visitor, active);
            }
        }
        active.remove(&self.uid());
    }
}

fn collect_elements(value: &Value, out: &mut Vec<ElementPtr>) {
    match value {
        Value::Element(Some(e)) => out.push(e.clone()),
        Value::Array(_, items) => items.iter().for_each(|v| collect_elements(v, out)),
        Value::Map(_, _, pairs) => pairs.iter().for_each(|(k, v)| {
            collect_elements(k, out);
            collect_elements(v, out);
        }),
        _ => {}
    }
}

fn clone_value(value: Value, active: &mut HashSet<Uid>) -> Result<Value> {
    Ok(match value {
        Value::Element(Some(e)) => Value::Element(Some(e.deep_clone_guarded(active)?)),
        Value::Array(kind, items) => Value::Array(
            kind,
            items
                .into_iter()
                .map(|v| clone_value(v, active))
                .collect::<Result<_>>()?,
        ),
        Value::Map(key, val, pairs) => {
            let mut cloned = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                cloned.push((clone_value(k, active)?, clone_value(v, active)?));
            }
            Value::Map(key, val, cloned)
        }
        other => other,
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Element(Some(x)), Value::Element(Some(y))) => x.field_equals(y),
        (Value::Array(ka, xs), Value::Array(kb, ys)) => {
            ka == kb && xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(ka, va, xs), Value::Map(kb, vb, ys)) => {
            ka == kb
                && va == vb
                && xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|((k1, v1), (k2, v2))| values_equal(k1, k2) && values_equal(v1, v2))
        }
        _ => a == b,
    }
}

impl PartialEq for ElementPtr {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for ElementPtr {}

impl fmt::Debug for ElementPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementPtr")
            .field("type", &self.type_name())
            .field("uid", &self.uid())
            .finish()
    }
}
