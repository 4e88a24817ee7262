//! Registry of reflected types and enumerations.
//!
//! A registry is an ordinary value built during start-up. Registration needs
//! `&mut`, so once built it can be shared as `&Registry` or `Arc<Registry>`
//! without further locking.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{ClassId, ElementPtr, Enumeration, Reflect, ReflectEnum, TypeDescriptor};
use crate::util::{Error, Result, Uid};

/// Maps type names and Rust types to their descriptors.
#[derive(Debug, Default)]
pub struct Registry {
    classes: Vec<Arc<TypeDescriptor>>,
    by_name: HashMap<String, ClassId>,
    by_type: HashMap<TypeId, ClassId>,
    enumerations: HashMap<String, Arc<Enumeration>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instantiable type.
    pub fn register_class<T: Reflect>(&mut self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.register::<T>(name, true)
    }

    /// Register a type that can only be a base of other types.
    pub fn register_abstract<T: Reflect>(&mut self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.register::<T>(name, false)
    }

    fn register<T: Reflect>(&mut self, name: &str, instantiable: bool) -> Result<Arc<TypeDescriptor>> {
        let type_id = TypeId::of::<T>();
        if self.by_name.contains_key(name) {
            return Err(Error::DuplicateType(name.to_owned()));
        }
        if let Some(existing) = self.by_type.get(&type_id) {
            let existing = &self.classes[existing.0 as usize];
            return Err(Error::DuplicateType(format!(
                "{} (already registered as '{}')",
                name,
                existing.name()
            )));
        }

        let base = match T::base() {
            Some(link) => {
                let id = self.by_type.get(&link.type_id).ok_or_else(|| Error::BaseNotRegistered {
                    type_name: name.to_owned(),
                    base: link.rust_name.to_owned(),
                })?;
                Some(Arc::clone(&self.classes[id.0 as usize]))
            }
            None => None,
        };

        let class_id = ClassId(self.classes.len() as u32);
        let (descriptor, enumerations) = TypeDescriptor::build::<T>(name, class_id, base, instantiable)?;
        for enumeration in enumerations {
            self.enumerations
                .entry(enumeration.name().to_owned())
                .or_insert(enumeration);
        }

        debug!(
            "Registered type '{}' {} ({} fields, base: {:?})",
            name,
            class_id,
            descriptor.fields().len(),
            descriptor.base().map(|b| b.name())
        );

        let descriptor = Arc::new(descriptor);
        self.classes.push(Arc::clone(&descriptor));
        self.by_name.insert(name.to_owned(), class_id);
        self.by_type.insert(type_id, class_id);
        Ok(descriptor)
    }

    /// Register an enumeration outside of any field declaration.
    pub fn register_enumeration<E: ReflectEnum>(&mut self) -> Arc<Enumeration> {
        let name = E::enumeration_name();
        Arc::clone(
            self.enumerations
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(E::enumeration())),
        )
    }

    /// Look up an enumeration by name.
    pub fn get_enumeration(&self, name: &str) -> Option<&Arc<Enumeration>> {
        self.enumerations.get(name)
    }

    /// Look up a descriptor by registered name.
    pub fn get_class(&self, name: &str) -> Result<&Arc<TypeDescriptor>> {
        self.find_class(name)
            .ok_or_else(|| Error::UnknownType(name.to_owned()))
    }

    /// Look up a descriptor by registered name, without an error.
    pub fn find_class(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.by_name.get(name).map(|id| &self.classes[id.0 as usize])
    }

    /// Look up the descriptor of a Rust type.
    pub fn get_class_of<T: Reflect>(&self) -> Result<&Arc<TypeDescriptor>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|id| &self.classes[id.0 as usize])
            .ok_or_else(|| Error::UnknownType(std::any::type_name::<T>().to_owned()))
    }

    /// Class id assigned to a Rust type.
    pub fn get_type<T: Reflect>(&self) -> Result<ClassId> {
        self.get_class_of::<T>().map(|c| c.class_id())
    }

    /// Look up a descriptor by class id.
    pub fn get_class_by_id(&self, id: ClassId) -> Option<&Arc<TypeDescriptor>> {
        self.classes.get(id.0 as usize)
    }

    /// All descriptors in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> {
        self.classes.iter()
    }

    /// Descriptors that descend from `name` (excluding itself).
    pub fn derived_classes(&self, name: &str) -> Result<Vec<Arc<TypeDescriptor>>> {
        let base = self.get_class(name)?;
        Ok(self
            .classes
            .iter()
            .filter(|c| c.class_id() != base.class_id() && c.is_a(base))
            .cloned()
            .collect())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Instantiate a type by name with a fresh uid.
    pub fn create_instance(&self, name: &str) -> Result<ElementPtr> {
        let class = self.get_class(name)?;
        self.instantiate(class, Uid::generate())
    }

    /// Instantiate a descriptor with the given uid.
    pub(crate) fn instantiate(&self, class: &Arc<TypeDescriptor>, uid: Uid) -> Result<ElementPtr> {
        let data = class.create()?;
        Ok(ElementPtr::from_parts(uid, Arc::clone(class), data))
    }

    /// Instantiate `T` with its defaults.
    pub fn create<T: Reflect>(&self) -> Result<ElementPtr> {
        self.wrap(T::default())
    }

    /// Wrap an existing value as an element with a fresh uid.
    ///
    /// Works for abstract types too: only factory instantiation is refused.
    pub fn wrap<T: Reflect>(&self, value: T) -> Result<ElementPtr> {
        let class = self.get_class_of::<T>()?;
        Ok(ElementPtr::from_parts(Uid::generate(), Arc::clone(class), Box::new(value)))
    }
}
