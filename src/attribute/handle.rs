//! Typed handles for reading and editing attributes.

use std::marker::PhantomData;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use super::{Attribute, AttributeCollection};
use crate::reflect::{ElementPtr, Reflect, Registry};
use crate::util::{Error, Result};

fn is_enabled(attribute: &ElementPtr) -> bool {
    attribute
        .try_cast::<Attribute>()
        .is_some_and(|base| base.is_enabled())
}

fn check_enabled(attribute: &ElementPtr) -> Result<()> {
    if is_enabled(attribute) {
        Ok(())
    } else {
        Err(Error::DisabledAttribute(attribute.type_name().to_owned()))
    }
}

/// Read-only access to the `T` attribute of a collection.
pub struct AttributeViewer<T> {
    type_name: String,
    attribute: Option<ElementPtr>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Reflect> AttributeViewer<T> {
    /// Look up `T`; with `use_default`, bind a detached default instance
    /// when the collection has none.
    pub fn new(collection: &AttributeCollection, registry: &Registry, use_default: bool) -> Result<Self> {
        let type_name = registry.get_class_of::<T>()?.name().to_owned();
        let attribute = match collection.get_attribute::<T>() {
            Some(found) => Some(found.clone()),
            None if use_default => Some(registry.create::<T>()?),
            None => None,
        };
        Ok(Self {
            type_name,
            attribute,
            _marker: PhantomData,
        })
    }

    /// True when bound to an attribute.
    pub fn is_valid(&self) -> bool {
        self.attribute.is_some()
    }

    /// True when bound to an enabled attribute.
    pub fn is_enabled(&self) -> bool {
        self.attribute.as_ref().is_some_and(is_enabled)
    }

    /// The bound element.
    pub fn element(&self) -> Option<&ElementPtr> {
        self.attribute.as_ref()
    }

    /// Borrow the attribute.
    ///
    /// Fails with [`Error::MissingAttribute`] when unbound and
    /// [`Error::DisabledAttribute`] when disabled.
    pub fn get(&self) -> Result<MappedRwLockReadGuard<'_, T>> {
        let attribute = self
            .attribute
            .as_ref()
            .ok_or_else(|| Error::MissingAttribute(self.type_name.clone()))?;
        check_enabled(attribute)?;
        attribute.cast::<T>()
    }
}

/// Mutable access to the `T` attribute of a collection.
///
/// Binding follows copy-on-write: an attribute owned by another collection
/// (a shared default) is deep-copied, an attribute owned by this collection
/// or by none is edited in place, and a missing attribute is created.
/// Changes become visible through the collection after [`commit`](Self::commit).
pub struct AttributeEditor<'a, T> {
    collection: &'a mut AttributeCollection,
    attribute: ElementPtr,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Reflect> AttributeEditor<'a, T> {
    /// Bind an editor to `collection`.
    pub fn new(collection: &'a mut AttributeCollection, registry: &Registry) -> Result<Self> {
        let attribute = match collection.get_attribute::<T>() {
            Some(existing) => {
                let owner = existing.cast::<Attribute>()?.collection();
                match owner {
                    Some(owner) if owner != collection.id() => existing.deep_clone()?,
                    _ => {
                        existing
                            .cast_mut::<Attribute>()?
                            .set_collection(Some(collection.id()));
                        existing.clone()
                    }
                }
            }
            None => registry.create::<T>()?,
        };
        Ok(Self {
            collection,
            attribute,
            _marker: PhantomData,
        })
    }

    /// The bound element.
    pub fn element(&self) -> &ElementPtr {
        &self.attribute
    }

    /// True when the bound attribute is enabled.
    pub fn is_enabled(&self) -> bool {
        is_enabled(&self.attribute)
    }

    /// Enable or disable the bound attribute.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.attribute.cast_mut::<Attribute>()?.set_enabled(enabled);
        Ok(())
    }

    /// Borrow the attribute; fails with [`Error::DisabledAttribute`] when disabled.
    pub fn get(&self) -> Result<MappedRwLockReadGuard<'_, T>> {
        check_enabled(&self.attribute)?;
        self.attribute.cast::<T>()
    }

    /// Mutably borrow the attribute; fails with [`Error::DisabledAttribute`] when disabled.
    pub fn get_mut(&mut self) -> Result<MappedRwLockWriteGuard<'_, T>> {
        check_enabled(&self.attribute)?;
        self.attribute.cast_mut::<T>()
    }

    /// Enable the attribute and store it in the collection.
    pub fn commit(self) -> Result<ElementPtr> {
        self.attribute.cast_mut::<Attribute>()?.set_enabled(true);
        self.collection.set_attribute(self.attribute.clone())?;
        Ok(self.attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{BaseLink, Compositor};

    #[derive(Default)]
    struct Outline {
        attribute: Attribute,
        width: f32,
    }

    impl Reflect for Outline {
        fn enumerate_class(comp: &mut Compositor<Self>) {
            comp.add_field("m_Width", |o| &o.width, |o| &mut o.width);
        }

        fn base() -> Option<BaseLink<Self>> {
            Some(BaseLink::new(|o: &Outline| &o.attribute, |o: &mut Outline| &mut o.attribute))
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        crate::attribute::register_types(&mut registry).unwrap();
        registry.register_class::<Outline>("Outline").unwrap();
        registry
    }

    #[test]
    fn test_viewer_missing_and_default() {
        let registry = registry();
        let collection = AttributeCollection::default();

        let viewer = collection.view::<Outline>(&registry, false).unwrap();
        assert!(!viewer.is_valid());
        assert!(matches!(viewer.get(), Err(Error::MissingAttribute(_))));

        let viewer = collection.view::<Outline>(&registry, true).unwrap();
        assert!(viewer.is_valid());
        assert_eq!(viewer.get().unwrap().width, 0.0);
        assert!(collection.attributes().is_empty());
    }

    #[test]
    fn test_editor_creates_and_commits() {
        let registry = registry();
        let mut collection = AttributeCollection::default();

        let mut editor = collection.edit::<Outline>(&registry).unwrap();
        editor.get_mut().unwrap().width = 2.0;
        let committed = editor.commit().unwrap();

        let viewer = collection.view::<Outline>(&registry, false).unwrap();
        assert_eq!(viewer.element(), Some(&committed));
        assert_eq!(viewer.get().unwrap().width, 2.0);
    }

    #[test]
    fn test_disabled_attribute() {
        let registry = registry();
        let mut collection = AttributeCollection::default();
        collection.edit::<Outline>(&registry).unwrap().commit().unwrap();

        let mut editor = collection.edit::<Outline>(&registry).unwrap();
        editor.set_enabled(false).unwrap();
        assert!(matches!(editor.get_mut(), Err(Error::DisabledAttribute(_))));
        drop(editor);

        let viewer = collection.view::<Outline>(&registry, false).unwrap();
        assert!(viewer.is_valid());
        assert!(!viewer.is_enabled());
        assert!(matches!(viewer.get(), Err(Error::DisabledAttribute(_))));

        collection.edit::<Outline>(&registry).unwrap().commit().unwrap();
        assert!(collection.view::<Outline>(&registry, false).unwrap().is_enabled());
    }

    #[test]
    fn test_editor_copies_shared_attribute() {
        let registry = registry();
        let mut defaults = AttributeCollection::default();
        let shared = registry
            .wrap(Outline {
                width: 1.0,
                ..Default::default()
            })
            .unwrap();
        defaults.set_attribute(shared.clone()).unwrap();

        let mut node = AttributeCollection::default();
        node.share_attribute(shared.clone()).unwrap();
        assert_eq!(node.get_attribute::<Outline>(), Some(&shared));

        let mut editor = node.edit::<Outline>(&registry).unwrap();
        assert_ne!(editor.element(), &shared);
        editor.get_mut().unwrap().width = 5.0;
        editor.commit().unwrap();

        assert_eq!(shared.cast::<Outline>().unwrap().width, 1.0);
        assert_eq!(defaults.view::<Outline>(&registry, false).unwrap().get().unwrap().width, 1.0);
        assert_eq!(node.view::<Outline>(&registry, false).unwrap().get().unwrap().width, 5.0);
    }
}
