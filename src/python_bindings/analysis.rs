//! Python bindings for reference selection.

use pyo3::prelude::*;

use crate::analysis::forward_refs::ForwardReferenceCollector;
use crate::analysis::listing::ListingSnapshot;
use crate::config::CollectorConfig;
use crate::core::address_set::AddressSet;
use crate::core::address_space::AddressSpaces;

/// Register analysis-related Python bindings.
pub fn register_analysis_bindings(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    let analysis_mod = pyo3::types::PyModule::new(py, "analysis")?;
    analysis_mod.add_function(wrap_pyfunction!(forward_selection_py, &analysis_mod)?)?;
    analysis_mod.add_function(wrap_pyfunction!(init_logging_py, &analysis_mod)?)?;
    m.add_submodule(&analysis_mod)?;
    Ok(())
}

/// Forward references of a selection over a JSON listing.
///
/// Args:
///     listing_json: JSON array of unit records (str)
///     selection: list of (start, end) address strings such as "ram:0x401000"
///     bits: width of the default ram space (int)
///     max_units: optional cap on visited units (int)
///
/// Returns:
///     list[tuple[str, str]]: coalesced target ranges, ascending
#[pyfunction]
#[pyo3(name = "forward_selection")]
#[pyo3(signature = (listing_json, selection, bits=32, max_units=None))]
fn forward_selection_py(
    listing_json: &str,
    selection: Vec<(String, String)>,
    bits: u8,
    max_units: Option<usize>,
) -> PyResult<Vec<(String, String)>> {
    let spaces = AddressSpaces::standard(bits)?;
    let listing = ListingSnapshot::from_json(&spaces, listing_json)?;

    let mut input = AddressSet::new();
    for (start, end) in &selection {
        input.add_range(&spaces.parse_address(start)?, &spaces.parse_address(end)?)?;
    }

    let config = CollectorConfig {
        max_units,
        ..CollectorConfig::default()
    };
    config.validate()?;
    let collector = ForwardReferenceCollector::new(config);
    let targets = collector.collect(&listing, &input);
    Ok(targets
        .ranges()
        .map(|r| (r.start.to_string(), r.end.to_string()))
        .collect())
}

/// Initialize logging from Python
#[pyfunction]
#[pyo3(name = "init_logging")]
#[pyo3(signature = (json=false))]
fn init_logging_py(json: bool) -> PyResult<()> {
    if json {
        crate::logging::init_tracing_json();
    } else {
        crate::logging::init_tracing();
    }
    Ok(())
}
