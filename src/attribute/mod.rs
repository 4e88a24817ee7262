//! Attribute composition: optional, independently enabled capabilities.
//!
//! An [`AttributeCollection`] holds at most one attribute per attribute type.
//! Attribute types embed [`Attribute`] as their base, which carries the
//! enabled flag and the back-reference to the owning collection.
//!
//! Reading goes through [`AttributeViewer`]; writing goes through
//! [`AttributeEditor`], which copies attributes shared from another
//! collection before modifying them.

mod collection;
mod handle;

pub use collection::{AttributeChange, AttributeCollection, AttributeEvent, AttributeListener};
pub use handle::{AttributeEditor, AttributeViewer};

use crate::reflect::{Compositor, Reflect, Registry};
use crate::util::{Result, Uid};

/// Base state shared by every attribute type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    enabled: bool,
    collection: Option<Uid>,
}

impl Default for Attribute {
    fn default() -> Self {
        Self {
            enabled: true,
            collection: None,
        }
    }
}

impl Attribute {
    /// Whether the attribute takes effect.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the attribute.
    #[inline]
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Id of the owning collection, if claimed.
    #[inline]
    pub fn collection(&self) -> Option<Uid> {
        self.collection
    }

    pub(crate) fn set_collection(&mut self, collection: Option<Uid>) {
        self.collection = collection;
    }
}

impl Reflect for Attribute {
    fn enumerate_class(comp: &mut Compositor<Self>) {
        comp.add_field("m_Enabled", |a| &a.enabled, |a| &mut a.enabled);
    }
}

/// Register [`Attribute`] and [`AttributeCollection`].
///
/// Call before registering any attribute type or any type embedding a
/// collection.
pub fn register_types(registry: &mut Registry) -> Result<()> {
    registry.register_abstract::<Attribute>("Attribute")?;
    registry.register_class::<AttributeCollection>("AttributeCollection")?;
    Ok(())
}
