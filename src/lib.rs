//! Forward reference selection for binary-analysis listings.
//!
//! Given a cursor location or selection in a program listing, compute the
//! coalesced set of memory addresses that the selected code units reference
//! directly.

/// Analysis over program listings
pub mod analysis;
/// Configuration
pub mod config;
/// Core data types module
pub mod core;
/// Error types
pub mod error;
/// Logging and tracing
pub mod logging;

#[cfg(feature = "python-ext")]
pub mod python_bindings;

pub use crate::analysis::forward_refs::{
    collect_forward_targets, compute_forward_selection, ForwardRefReport,
    ForwardReferenceCollector,
};
pub use crate::analysis::listing::{Listing, ListingSnapshot};
pub use crate::config::{CollectorConfig, LoggingConfig, XrefConfig};
pub use crate::core::{Address, AddressRange, AddressSet, AddressSpaceKind, AddressSpaces};
pub use crate::error::{Result, XrefError};

/// A Python module implemented in Rust.
#[cfg(feature = "python-ext")]
#[pyo3::pymodule]
fn xrefsel(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    python_bindings::register_python_bindings(m.py(), m)
}
