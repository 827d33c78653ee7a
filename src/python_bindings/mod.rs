//! Python bindings for forward reference selection.
//!
//! Host adapters written in Python hand over a JSON listing and the current
//! selection, and receive the forward selection back as address pairs.

pub mod analysis;

use pyo3::prelude::*;

/// Register all Python bindings with the module.
pub fn register_python_bindings(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<crate::core::address_space::AddressSpaceKind>()?;
    analysis::register_analysis_bindings(py, m)?;
    Ok(())
}
