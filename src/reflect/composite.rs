//! Type descriptors: the immutable schema of one registered type.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::compositor::{Upcast, UpcastMut};
use super::{Compositor, Enumeration, FieldDescriptor, FieldFlags, PostLoadContext, Reflect, Value};
use crate::util::{Error, Result};

pub(crate) type Factory = Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;
type ComponentHook = Arc<dyn Fn(&mut dyn Any, &str, &Value) -> bool + Send + Sync>;
type PostLoadHook = Arc<dyn Fn(&mut dyn Any, &mut PostLoadContext<'_>) -> Result<()> + Send + Sync>;

/// Registry-assigned class index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    /// Raw index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Schema of one registered type.
///
/// A descriptor owns only the fields its level declares and links to the
/// base descriptor; [`all_fields`](Self::all_fields) is the flattened,
/// base-first view archives and editors walk.
pub struct TypeDescriptor {
    name: String,
    class_id: ClassId,
    type_id: TypeId,
    rust_name: &'static str,
    base: Option<Arc<TypeDescriptor>>,
    upcast: Option<Upcast>,
    upcast_mut: Option<UpcastMut>,
    fields: Vec<Arc<FieldDescriptor>>,
    all_fields: Vec<Arc<FieldDescriptor>>,
    /// `T::default()` values, parallel to `all_fields`
    defaults: Vec<Option<Value>>,
    factory: Option<Factory>,
    process_component: ComponentHook,
    post_load: PostLoadHook,
}

impl TypeDescriptor {
    /// Run `T::enumerate_class` and assemble the descriptor.
    ///
    /// `base` must be the registered descriptor of `T::base()`'s target.
    pub(crate) fn build<T: Reflect>(
        name: &str,
        class_id: ClassId,
        base: Option<Arc<TypeDescriptor>>,
        instantiable: bool,
    ) -> Result<(Self, Vec<Arc<Enumeration>>)> {
        let mut compositor = Compositor::<T>::new(name);
        T::enumerate_class(&mut compositor);
        let (own, enumerations) = compositor.finish()?;

        let mut all_fields = base
            .as_ref()
            .map(|b| b.all_fields.clone())
            .unwrap_or_default();
        let mut fields = Vec::with_capacity(own.len());
        for field in own {
            if all_fields.iter().any(|f| f.name == field.name) {
                return Err(Error::DuplicateField {
                    type_name: name.to_owned(),
                    field: field.name,
                });
            }
            let field = Arc::new(field);
            all_fields.push(Arc::clone(&field));
            fields.push(field);
        }

        let (upcast, upcast_mut) = match T::base() {
            Some(link) => (Some(link.upcast), Some(link.upcast_mut)),
            None => (None, None),
        };

        let factory: Option<Factory> = instantiable
            .then(|| Arc::new(|| Box::new(T::default()) as Box<dyn Any + Send + Sync>) as Factory);

        let process_component: ComponentHook = Arc::new(|any: &mut dyn Any, field: &str, value: &Value| {
            any.downcast_mut::<T>()
                .is_some_and(|t| t.process_component(field, value))
        });
        let post_load: PostLoadHook =
            Arc::new(|any: &mut dyn Any, ctx: &mut PostLoadContext<'_>| -> Result<()> {
                match any.downcast_mut::<T>() {
                    Some(t) => t.post_load(ctx),
                    None => Ok(()),
                }
            });

        let mut descriptor = Self {
            name: name.to_owned(),
            class_id,
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            base,
            upcast,
            upcast_mut,
            fields,
            all_fields,
            defaults: Vec::new(),
            factory,
            process_component,
            post_load,
        };

        // Base fields take the defaults this type's constructor gives them.
        let instance = T::default();
        let defaults = descriptor
            .all_fields
            .iter()
            .map(|f| descriptor.read_field(&instance, f))
            .collect();
        descriptor.defaults = defaults;
        Ok((descriptor, enumerations))
    }

    /// Registered name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry-assigned index.
    #[inline]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Rust type backing this descriptor.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name, for diagnostics.
    #[inline]
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Base descriptor.
    #[inline]
    pub fn base(&self) -> Option<&Arc<TypeDescriptor>> {
        self.base.as_ref()
    }

    /// True when registered without a factory.
    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.factory.is_none()
    }

    /// Fields declared by this level only.
    #[inline]
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    /// Every field including inherited ones, base first.
    #[inline]
    pub fn all_fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.all_fields
    }

    /// Look up a field by name anywhere in the chain.
    pub fn find_field(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.all_fields.iter().find(|f| f.name == name)
    }

    /// This descriptor followed by its bases, most derived first.
    pub fn chain(&self) -> impl Iterator<Item = &TypeDescriptor> {
        std::iter::successors(Some(self), |d| d.base.as_deref())
    }

    /// True when this type is `type_id` or descends from it.
    pub fn has_type(&self, type_id: TypeId) -> bool {
        self.chain().any(|d| d.type_id == type_id)
    }

    /// True when this type is `other` or descends from it.
    pub fn is_a(&self, other: &TypeDescriptor) -> bool {
        self.has_type(other.type_id)
    }

    /// Instantiate the backing Rust type with its defaults.
    pub fn create(&self) -> Result<Box<dyn Any + Send + Sync>> {
        self.factory
            .as_ref()
            .map(|f| f())
            .ok_or_else(|| Error::AbstractInstantiation(self.name.clone()))
    }

    /// Project an instance of this type down to the embedded `target` level.
    pub fn project<'a>(&self, instance: &'a dyn Any, target: TypeId) -> Option<&'a dyn Any> {
        let mut current = instance;
        let mut desc = self;
        loop {
            if desc.type_id == target {
                return Some(current);
            }
            let upcast = desc.upcast.as_ref()?;
            current = upcast(current)?;
            desc = desc.base.as_deref()?;
        }
    }

    /// Mutable [`project`](Self::project).
    pub fn project_mut<'a>(&self, instance: &'a mut dyn Any, target: TypeId) -> Option<&'a mut dyn Any> {
        let mut current = instance;
        let mut desc = self;
        loop {
            if desc.type_id == target {
                return Some(current);
            }
            let upcast = desc.upcast_mut.as_ref()?;
            current = upcast(current)?;
            desc = desc.base.as_deref()?;
        }
    }

    /// Value of `field` in a default-constructed instance of this type.
    ///
    /// Differs from [`FieldDescriptor::default_value`] when this type's
    /// `Default` overrides a base field.
    pub fn default_of(&self, field: &FieldDescriptor) -> Option<&Value> {
        let i = self
            .all_fields
            .iter()
            .position(|f| std::ptr::eq(Arc::as_ptr(f), field))?;
        self.defaults.get(i)?.as_ref()
    }

    /// True when `value` equals this type's default for `field` and the
    /// field is not forced.
    pub fn is_default(&self, field: &FieldDescriptor, value: &Value) -> bool {
        !field.flags().contains(FieldFlags::FORCE) && self.default_of(field) == Some(value)
    }

    /// Read `field` (declared here or by a base) from an instance of this type.
    pub fn read_field(&self, instance: &dyn Any, field: &FieldDescriptor) -> Option<Value> {
        let target = self.project(instance, field.declaring_type_id)?;
        field.get(target)
    }

    /// Write `field` (declared here or by a base) on an instance of this type.
    pub fn write_field(&self, instance: &mut dyn Any, field: &FieldDescriptor, value: Value) -> Result<()> {
        let target = self
            .project_mut(instance, field.declaring_type_id)
            .ok_or_else(|| Error::InvalidCast {
                expected: field.declaring_type.clone(),
                actual: self.name.clone(),
            })?;
        field.set(target, value)
    }

    /// Offer a stray value to each level's `process_component`, most
    /// derived first. Returns `true` once a level claims it.
    pub(crate) fn offer_component(&self, instance: &mut dyn Any, field: &str, value: &Value) -> bool {
        if (self.process_component)(&mut *instance, field, value) {
            return true;
        }
        match (&self.base, &self.upcast_mut) {
            (Some(base), Some(upcast)) => match upcast(instance) {
                Some(inner) => base.offer_component(inner, field, value),
                None => false,
            },
            _ => false,
        }
    }

    /// Run every level's `post_load`, base level first.
    pub(crate) fn run_post_load(&self, instance: &mut dyn Any, ctx: &mut PostLoadContext<'_>) -> Result<()> {
        if let (Some(base), Some(upcast)) = (&self.base, &self.upcast_mut) {
            if let Some(inner) = upcast(&mut *instance) {
                base.run_post_load(inner, ctx)?;
            }
        }
        (self.post_load)(instance, ctx)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("class_id", &self.class_id)
            .field("base", &self.base.as_ref().map(|b| b.name.as_str()))
            .field("fields", &self.fields.len())
            .field("is_abstract", &self.is_abstract())
            .finish()
    }
}
