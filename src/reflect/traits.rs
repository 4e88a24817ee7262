//! The capability set every reflected type implements.

use std::collections::HashMap;

use super::{BaseLink, Compositor, ElementPtr, Registry, Value};
use crate::util::{Result, Uid};

/// A type the registry can describe, instantiate and archive.
///
/// Each level of a composition chain implements this for its own struct:
/// it declares only its own fields, names its embedded base through
/// [`base`](Self::base), and handles only its own legacy data. The registry
/// walks the chain so every level's fields and hooks apply to derived
/// instances.
///
/// ```ignore
/// #[derive(Default)]
/// struct Light {
///     transform: Transform,
///     color: glam::Vec3,
///     cast_shadows: bool,
/// }
///
/// impl Reflect for Light {
///     fn enumerate_class(comp: &mut Compositor<Self>) {
///         comp.add_field("m_Color", |l| &l.color, |l| &mut l.color);
///         comp.add_field("m_CastShadows", |l| &l.cast_shadows, |l| &mut l.cast_shadows);
///     }
///
///     fn base() -> Option<BaseLink<Self>> {
///         Some(BaseLink::new(|l: &Light| &l.transform, |l: &mut Light| &mut l.transform))
///     }
/// }
/// ```
pub trait Reflect: Default + Send + Sync + 'static {
    /// Declare this level's fields.
    fn enumerate_class(compositor: &mut Compositor<Self>);

    /// Embedded base type, if any. The base must be registered first.
    fn base() -> Option<BaseLink<Self>> {
        None
    }

    /// Absorb a stored value whose field no longer exists (or changed
    /// kind) at this level. Return `true` when claimed.
    fn process_component(&mut self, _field: &str, _value: &Value) -> bool {
        false
    }

    /// Runs once after the whole graph containing this element was read.
    fn post_load(&mut self, _ctx: &mut PostLoadContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Context handed to [`Reflect::post_load`].
///
/// Resolves uid references against everything loaded by the same read and
/// collects elements synthesized from legacy data.
pub struct PostLoadContext<'a> {
    registry: &'a Registry,
    index: &'a HashMap<Uid, ElementPtr>,
    current: Uid,
    created: Vec<ElementPtr>,
}

impl<'a> PostLoadContext<'a> {
    pub(crate) fn new(registry: &'a Registry, index: &'a HashMap<Uid, ElementPtr>) -> Self {
        Self {
            registry,
            index,
            current: Uid::NULL,
            created: Vec::new(),
        }
    }

    pub(crate) fn set_current(&mut self, uid: Uid) {
        self.current = uid;
    }

    pub(crate) fn into_created(self) -> Vec<ElementPtr> {
        self.created
    }

    /// Registry the load runs against, for creating new elements.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Uid of the element whose hook is running.
    ///
    /// Resolving this uid yields the element itself, whose lock is held by
    /// the running hook.
    pub fn current(&self) -> Uid {
        self.current
    }

    /// Find a loaded element by uid.
    pub fn resolve(&self, uid: Uid) -> Option<ElementPtr> {
        self.index.get(&uid).cloned()
    }

    /// Append a synthesized element to the load result.
    pub fn add_element(&mut self, element: ElementPtr) {
        self.created.push(element);
    }

    /// Elements synthesized so far.
    pub fn created(&self) -> &[ElementPtr] {
        &self.created
    }
}
