//! Attribute collections.

use std::any::TypeId;
use std::fmt;

use tracing::{debug, warn};

use super::{Attribute, AttributeEditor, AttributeViewer};
use crate::reflect::{Compositor, ElementPtr, PostLoadContext, Reflect, Registry, Value};
use crate::util::{Error, Result, Uid};

/// What happened to an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeEvent {
    Added,
    Removed,
    Changed,
}

/// Notification passed to collection listeners.
#[derive(Debug)]
pub struct AttributeChange<'a> {
    pub event: AttributeEvent,
    /// Id of the collection raising the event
    pub collection: Uid,
    pub attribute: &'a ElementPtr,
}

/// Callback registered with [`AttributeCollection::add_listener`].
pub type AttributeListener = Box<dyn Fn(&AttributeChange<'_>) + Send + Sync>;

/// At most one attribute per attribute type.
///
/// Collections are usually embedded as the base of scene types. Only the
/// attribute list is persisted; the collection id, modified flag and
/// listeners are runtime state.
pub struct AttributeCollection {
    id: Uid,
    attributes: Vec<ElementPtr>,
    modified: bool,
    listeners: Vec<AttributeListener>,
}

impl Default for AttributeCollection {
    fn default() -> Self {
        Self {
            id: Uid::generate(),
            attributes: Vec::new(),
            modified: false,
            listeners: Vec::new(),
        }
    }
}

impl AttributeCollection {
    /// Runtime id attributes use to refer back to their owner.
    #[inline]
    pub fn id(&self) -> Uid {
        self.id
    }

    /// Attributes in insertion order.
    #[inline]
    pub fn attributes(&self) -> &[ElementPtr] {
        &self.attributes
    }

    /// True after any insertion, removal or change notification.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Register a listener for added/removed/changed events.
    pub fn add_listener(&mut self, listener: impl Fn(&AttributeChange<'_>) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn raise(&mut self, event: AttributeEvent, attribute: &ElementPtr) {
        self.modified = true;
        let change = AttributeChange {
            event,
            collection: self.id,
            attribute,
        };
        for listener in &self.listeners {
            listener(&change);
        }
    }

    fn position_of(&self, type_id: TypeId) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| a.class().type_id() == type_id)
    }

    /// Attribute of exactly type `T`.
    pub fn get_attribute<T: Reflect>(&self) -> Option<&ElementPtr> {
        self.position_of(TypeId::of::<T>()).map(|i| &self.attributes[i])
    }

    /// Attribute whose dynamic type is registered as `name`.
    pub fn get_attribute_by_name(&self, name: &str) -> Option<&ElementPtr> {
        self.attributes.iter().find(|a| a.type_name() == name)
    }

    /// True when an attribute of exactly type `T` is present.
    pub fn contains_attribute<T: Reflect>(&self) -> bool {
        self.position_of(TypeId::of::<T>()).is_some()
    }

    /// Insert `attribute` and claim it, replacing any attribute of the same
    /// dynamic type.
    pub fn set_attribute(&mut self, attribute: ElementPtr) -> Result<()> {
        self.insert(attribute, true)
    }

    /// Insert `attribute` after validating it: an attribute of the same type
    /// must not already be present.
    pub fn add_attribute(&mut self, attribute: ElementPtr) -> Result<()> {
        self.validate(&attribute)?;
        if self.position_of(attribute.class().type_id()).is_some() {
            return Err(Error::InvalidAttribute(format!(
                "'{}' is a duplicate (an attribute of that type is already present)",
                attribute.type_name()
            )));
        }
        self.insert(attribute, true)
    }

    /// Insert an attribute owned by another collection without claiming it.
    ///
    /// Editing it through [`AttributeEditor`] copies it first.
    pub fn share_attribute(&mut self, attribute: ElementPtr) -> Result<()> {
        self.insert(attribute, false)
    }

    fn validate(&self, attribute: &ElementPtr) -> Result<()> {
        if !attribute.has_type::<Attribute>() {
            return Err(Error::InvalidAttribute(format!(
                "'{}' is not an attribute type",
                attribute.type_name()
            )));
        }
        if attribute.class().is_abstract() {
            return Err(Error::InvalidAttribute(format!(
                "'{}' is abstract",
                attribute.type_name()
            )));
        }
        Ok(())
    }

    fn insert(&mut self, attribute: ElementPtr, claim: bool) -> Result<()> {
        self.validate(&attribute)?;
        if claim {
            attribute.cast_mut::<Attribute>()?.set_collection(Some(self.id));
        }

        match self.position_of(attribute.class().type_id()) {
            Some(i) if self.attributes[i] == attribute => Ok(()),
            Some(i) => {
                let old = std::mem::replace(&mut self.attributes[i], attribute.clone());
                self.release(&old);
                self.raise(AttributeEvent::Changed, &attribute);
                Ok(())
            }
            None => {
                self.attributes.push(attribute.clone());
                self.raise(AttributeEvent::Added, &attribute);
                Ok(())
            }
        }
    }

    // Drop our claim on an attribute leaving the collection.
    fn release(&self, attribute: &ElementPtr) {
        if let Some(mut base) = attribute.try_cast_mut::<Attribute>() {
            if base.collection() == Some(self.id) {
                base.set_collection(None);
            }
        }
    }

    /// Remove the attribute of exactly type `T`.
    pub fn remove_attribute<T: Reflect>(&mut self) -> Option<ElementPtr> {
        let i = self.position_of(TypeId::of::<T>())?;
        Some(self.remove_at(i))
    }

    /// Remove the attribute registered as `name`.
    pub fn remove_attribute_by_name(&mut self, name: &str) -> Option<ElementPtr> {
        let i = self.attributes.iter().position(|a| a.type_name() == name)?;
        Some(self.remove_at(i))
    }

    fn remove_at(&mut self, index: usize) -> ElementPtr {
        let attribute = self.attributes.remove(index);
        self.release(&attribute);
        self.raise(AttributeEvent::Removed, &attribute);
        attribute
    }

    /// Remove every attribute, raising one event per attribute.
    pub fn clear(&mut self) {
        while !self.attributes.is_empty() {
            self.remove_at(self.attributes.len() - 1);
        }
    }

    /// True when every enabled attribute of `other` has a counterpart here.
    pub fn is_subset(&self, other: &AttributeCollection) -> bool {
        other.attributes.iter().all(|a| {
            let enabled = a.try_cast::<Attribute>().is_some_and(|b| b.is_enabled());
            !enabled || self.position_of(a.class().type_id()).is_some()
        })
    }

    /// Raise a changed event after editing an attribute in place.
    pub fn notify_changed(&mut self, attribute: &ElementPtr) {
        self.raise(AttributeEvent::Changed, attribute);
    }

    /// Start editing the `T` attribute.
    pub fn edit<T: Reflect>(&mut self, registry: &Registry) -> Result<AttributeEditor<'_, T>> {
        AttributeEditor::new(self, registry)
    }

    /// Read the `T` attribute; with `use_default`, a missing attribute reads
    /// as a throwaway default instance.
    pub fn view<T: Reflect>(&self, registry: &Registry, use_default: bool) -> Result<AttributeViewer<T>> {
        AttributeViewer::new(self, registry, use_default)
    }

    // Legacy archives stored attributes as `m_Components`.
    fn absorb_legacy(&mut self, value: &Value) -> bool {
        let mut absorbed = Vec::new();
        match value {
            Value::Array(_, items) => absorbed.extend(items.iter().filter_map(Value::as_element).cloned()),
            Value::Map(_, _, pairs) => absorbed.extend(pairs.iter().filter_map(|(_, v)| v.as_element()).cloned()),
            _ => return false,
        }
        for attribute in absorbed {
            if !attribute.has_type::<Attribute>() {
                warn!("Dropping legacy component of non-attribute type {}", attribute.type_name());
                continue;
            }
            match self.position_of(attribute.class().type_id()) {
                Some(i) => self.attributes[i] = attribute,
                None => self.attributes.push(attribute),
            }
        }
        true
    }
}

impl Reflect for AttributeCollection {
    fn enumerate_class(comp: &mut Compositor<Self>) {
        comp.add_element_field::<Attribute, _>("m_Attributes", |c| &c.attributes, |c| &mut c.attributes);
    }

    fn process_component(&mut self, field: &str, value: &Value) -> bool {
        if field == "m_Components" {
            debug!("Absorbing legacy m_Components into collection {}", self.id);
            return self.absorb_legacy(value);
        }
        false
    }

    fn post_load(&mut self, _ctx: &mut PostLoadContext<'_>) -> Result<()> {
        for attribute in &self.attributes {
            attribute.cast_mut::<Attribute>()?.set_collection(Some(self.id));
        }
        Ok(())
    }
}

impl fmt::Debug for AttributeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeCollection")
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .field("modified", &self.modified)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
