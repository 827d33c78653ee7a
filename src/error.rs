//! Error types for forward reference selection.
//!
//! This module provides structured error types using thiserror that can be
//! converted for the optional Python bindings.

use thiserror::Error;

/// Main error type for xrefsel operations.
#[derive(Debug, Error)]
pub enum XrefError {
    /// Malformed range: reversed bounds or endpoints in different spaces
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Two addresses from different spaces were compared or combined
    #[error("Address space mismatch: {left} vs {right}")]
    AddressSpaceMismatch { left: String, right: String },

    /// Offset arithmetic left the bounds of the address space
    #[error("Address out of bounds in space '{space}': {message}")]
    AddressOutOfBounds { space: String, message: String },

    /// Lookup of an address space that was never registered
    #[error("Unknown address space: {0}")]
    UnknownAddressSpace(String),

    /// Registering a second space under an existing name
    #[error("Duplicate address space: {0}")]
    DuplicateAddressSpace(String),

    /// Textual address could not be parsed
    #[error("Cannot parse address '{input}': {message}")]
    AddressParse { input: String, message: String },

    /// Unit record that cannot be read or fails validation
    #[error("Corrupt code unit at {address}: {reason}")]
    CorruptUnit { address: String, reason: String },

    /// Unit that would overlap one already in the listing
    #[error("Code unit at {address} overlaps existing unit at {existing}")]
    OverlappingUnit { address: String, existing: String },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for xrefsel operations
pub type Result<T> = std::result::Result<T, XrefError>;

impl XrefError {
    /// True for errors a best-effort walk may skip past.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, XrefError::CorruptUnit { .. })
    }
}

/// Convert xrefsel errors to PyO3 exceptions
#[cfg(feature = "python-ext")]
impl From<XrefError> for pyo3::PyErr {
    fn from(err: XrefError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyException, PyIOError, PyValueError};

        match err {
            XrefError::Io(e) => PyIOError::new_err(e.to_string()),
            XrefError::InvalidRange(msg) | XrefError::Config(msg) => PyValueError::new_err(msg),
            XrefError::AddressParse { .. }
            | XrefError::UnknownAddressSpace(_)
            | XrefError::AddressSpaceMismatch { .. } => PyValueError::new_err(err.to_string()),
            _ => PyException::new_err(err.to_string()),
        }
    }
}
