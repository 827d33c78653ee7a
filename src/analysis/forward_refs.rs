//! Forward reference selection.
//!
//! Given a listing and an input address set, walk every code unit that
//! intersects the input and gather the destinations of its outgoing
//! references into a new coalesced `AddressSet`. Only destinations in
//! memory spaces are kept; register, stack, constant and external targets
//! are dropped. References are followed one hop only.

use serde::Serialize;
use tracing::{debug, debug_span, trace, warn};

use crate::analysis::listing::Listing;
use crate::config::CollectorConfig;
use crate::core::address_set::AddressSet;
use crate::core::code_unit::CodeUnit;
use crate::error::{Result, XrefError};

/// Outcome of a forward reference walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwardRefReport {
    /// Memory destinations of all visited units
    pub targets: AddressSet,
    /// Units read successfully
    pub units_visited: usize,
    /// Units the listing could not read
    pub units_skipped: usize,
    /// References inspected across visited units
    pub references_seen: usize,
    /// References dropped because their destination is not memory
    pub references_filtered: usize,
    /// Walk stopped at `CollectorConfig::max_units`
    pub truncated: bool,
}

impl ForwardRefReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| XrefError::Serialization(e.to_string()))
    }
}

/// Collects forward reference targets from a listing.
#[derive(Debug, Clone, Default)]
pub struct ForwardReferenceCollector {
    config: CollectorConfig,
}

impl ForwardReferenceCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Memory addresses referenced by the units intersecting `input`.
    pub fn collect<L: Listing>(&self, listing: &L, input: &AddressSet) -> AddressSet {
        self.collect_report(listing, input).targets
    }

    /// Like [`collect`](Self::collect), with counters describing the walk.
    ///
    /// Unreadable units are counted and skipped; they never fail the walk.
    pub fn collect_report<L: Listing>(&self, listing: &L, input: &AddressSet) -> ForwardRefReport {
        let span = debug_span!("forward_refs", input_ranges = input.num_ranges());
        let _guard = span.enter();

        let mut report = ForwardRefReport::default();
        if input.is_empty() {
            return report;
        }

        for item in listing.code_units(input, true) {
            if self
                .config
                .max_units
                .is_some_and(|max| report.units_visited >= max)
            {
                report.truncated = true;
                break;
            }

            let unit = match item {
                Ok(unit) => unit,
                Err(err) => {
                    report.units_skipped += 1;
                    if self.config.warn_on_corrupt {
                        warn!(error = %err, "skipping unreadable code unit");
                    }
                    continue;
                }
            };
            report.units_visited += 1;

            let references = unit.references_from();
            trace!(unit = %unit.min_address(), references = references.len(), "visiting unit");
            for reference in references {
                report.references_seen += 1;
                if reference.is_memory_destination() {
                    report.targets.add(reference.to_address());
                } else {
                    report.references_filtered += 1;
                }
            }
        }

        debug!(
            units_visited = report.units_visited,
            units_skipped = report.units_skipped,
            references_seen = report.references_seen,
            references_filtered = report.references_filtered,
            target_ranges = report.targets.num_ranges(),
            truncated = report.truncated,
            "forward reference walk complete"
        );
        report
    }
}

/// Memory addresses directly referenced from the units intersecting `input`.
///
/// An empty input yields an empty set.
pub fn collect_forward_targets<L: Listing>(listing: &L, input: &AddressSet) -> AddressSet {
    ForwardReferenceCollector::default().collect(listing, input)
}

/// Entry point for host adapters: the selection that "select forward
/// references" should produce for the current cursor or selection.
///
/// A cursor location is passed as a one-address set, e.g.
/// `AddressSet::from(address)`.
pub fn compute_forward_selection<L: Listing>(listing: &L, input: &AddressSet) -> AddressSet {
    collect_forward_targets(listing, input)
}
