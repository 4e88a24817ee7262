//! Utility types shared by every layer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`ByteOrder`] / [`CharacterEncoding`] - Stream negotiation
//! - [`Uid`] - Element identity

mod byte_order;
mod error;
mod uid;

pub use byte_order::*;
pub use error::*;
pub use uid::*;
