//! Error types for the reflection engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for registry, element, attribute, stream and archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Type name (or Rust type) is not registered
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// Attempted to instantiate an abstract type
    #[error("Cannot instantiate abstract type: {0}")]
    AbstractInstantiation(String),

    /// Type registered twice (by name or by Rust type)
    #[error("Type already registered: {0}")]
    DuplicateType(String),

    /// Field name declared twice in one type chain
    #[error("Duplicate field '{field}' in type {type_name}")]
    DuplicateField { type_name: String, field: String },

    /// Derived type registered before its base
    #[error("Base type of {type_name} is not registered yet (register {base} first)")]
    BaseNotRegistered { type_name: String, base: String },

    /// Attribute handle is not bound to any attribute
    #[error("Attribute is missing: {0}")]
    MissingAttribute(String),

    /// Attribute handle is bound to a disabled attribute
    #[error("Attribute is disabled: {0}")]
    DisabledAttribute(String),

    /// Attribute rejected by a collection (duplicate, abstract or not an attribute)
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Stream channel failure, carries the OS error text
    #[error("Stream I/O error ({context}): {message}")]
    StreamIo { context: String, message: String },

    /// On-disk value tag disagrees with the declared field kind
    #[error("Schema mismatch for field '{field}': expected {expected}, got {actual}")]
    SchemaMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// Element is not of the requested type
    #[error("Invalid cast: {actual} is not a {expected}")]
    InvalidCast { expected: String, actual: String },

    /// Dynamic value cannot be converted to the requested Rust type
    #[error("Value conversion failed: expected {expected}, got {actual}")]
    ValueConversion { expected: String, actual: String },

    /// Field not found by name
    #[error("Field not found: {type_name}::{field}")]
    FieldNotFound { type_name: String, field: String },

    /// Archive contained no element of the requested type
    #[error("No element of type {type_name} in {path}")]
    ElementNotFound { type_name: String, path: PathBuf },

    /// Element embeds itself through by-value edges
    #[error("Ownership cycle through element {0}")]
    OwnershipCycle(String),

    /// Archive or stream used outside its state machine
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Body checksum does not match the header
    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum { stored: u32, computed: u32 },

    /// Byte order mark is neither 0xFEFF nor 0xFFFE
    #[error("Invalid byte order mark: {0:#06x}")]
    InvalidByteOrderMark(u16),

    /// Archive written by a newer format version
    #[error("Unsupported archive version: {found} (current: {current})")]
    UnsupportedVersion { found: u32, current: u32 },

    /// Unknown character encoding byte
    #[error("Unknown character encoding: {0}")]
    UnknownEncoding(u8),

    /// Invalid data structure in a stream
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// I/O error outside of a stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON inspection dump failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a stream error from an I/O error, keeping the OS text.
    pub fn stream(context: impl Into<String>, err: &std::io::Error) -> Self {
        Self::StreamIo {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Create a schema mismatch error.
    pub fn mismatch(field: impl Into<String>, expected: impl ToString, actual: impl ToString) -> Self {
        Self::SchemaMismatch {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// True for the attribute handle errors that editors surface as validation messages.
    pub fn is_attribute_error(&self) -> bool {
        matches!(self, Self::MissingAttribute(_) | Self::DisabledAttribute(_))
    }
}

/// Result type alias for reflection operations.
pub type Result<T> = std::result::Result<T, Error>;
