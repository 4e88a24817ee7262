//! # Reflect
//!
//! Runtime reflection and binary serialization for statically typed Rust
//! structs: a type registry, field and enumeration descriptors, shared
//! introspectable elements, attribute composition, and a byte-order aware
//! archive format that tolerates schema changes between versions.
//!
//! ## Modules
//!
//! - [`util`] - Errors, byte order, element ids
//! - [`reflect`] - Registry, descriptors, values and elements
//! - [`attribute`] - Attribute collections with copy-on-write editing
//! - [`stream`] - Byte streams with explicit byte order and encoding
//! - [`archive`] - Binary archives and JSON inspection
//!
//! ## Example
//!
//! ```ignore
//! use reflect::prelude::*;
//!
//! #[derive(Default)]
//! struct Camera {
//!     fov: f32,
//! }
//!
//! impl Reflect for Camera {
//!     fn enumerate_class(comp: &mut Compositor<Self>) {
//!         comp.add_field("m_Fov", |c| &c.fov, |c| &mut c.fov);
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register_class::<Camera>("Camera")?;
//!
//! let camera = registry.create::<Camera>()?;
//! camera.cast_mut::<Camera>()?.fov = 60.0;
//! Archive::to_file(&registry, &[camera], "camera.rb", ArchiveOptions::default())?;
//! ```

pub mod archive;
pub mod attribute;
pub mod reflect;
pub mod stream;
pub mod util;

// Re-export commonly used types
pub use util::{Error, Result, Uid};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archive::{Archive, ArchiveOptions, ArchiveStatus};
    pub use crate::attribute::{Attribute, AttributeCollection, AttributeEditor, AttributeViewer};
    pub use crate::reflect::{
        BaseLink, Compositor, ElementPtr, Enumeration, FieldFlags, PostLoadContext, Reflect, ReflectEnum,
        Registry, Value, ValueKind,
    };
    pub use crate::stream::{FileMode, FileStream, Stream};
    pub use crate::util::{ByteOrder, CharacterEncoding, Error, Result, Uid};
}
