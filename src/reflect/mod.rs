//! Runtime type information: registry, descriptors, values and elements.

mod composite;
mod compositor;
mod element;
mod enumeration;
mod field;
mod registry;
mod traits;
mod value;

pub use composite::{ClassId, TypeDescriptor};
pub use compositor::{BaseLink, Compositor, FieldBuilder};
pub use element::{ElementPtr, Visit};
pub use enumeration::{Enumeration, EnumerationElement, ReflectEnum};
pub use field::{ElementConstraint, FieldDescriptor, FieldFlags};
pub use registry::Registry;
pub use traits::{PostLoadContext, Reflect};
pub use value::{FieldValue, Value, ValueKind};
