//! Common test utilities and helpers.
//!
//! Builds small listings over the standard address space layout so
//! integration tests can describe programs as a table of units.

#![allow(dead_code)]

use xrefsel::core::code_unit::Unit;
use xrefsel::core::reference::{Reference, ReferenceKind};
use xrefsel::{Address, AddressSet, AddressSpaces, ListingSnapshot};

/// Listing under construction plus the spaces it uses.
pub struct ProgramBuilder {
    pub spaces: AddressSpaces,
    pub listing: ListingSnapshot,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            spaces: AddressSpaces::standard(32).expect("standard spaces"),
            listing: ListingSnapshot::new(),
        }
    }

    pub fn addr(&self, text: &str) -> Address {
        self.spaces.parse_address(text).expect("valid address")
    }

    /// Add an instruction at `start` whose references all originate at
    /// its first byte.
    pub fn instruction(
        &mut self,
        start: &str,
        length: u64,
        targets: &[(&str, ReferenceKind)],
    ) -> &mut Self {
        let start = self.addr(start);
        let references = targets
            .iter()
            .map(|(to, kind)| Reference::new(start.clone(), self.addr(to), *kind))
            .collect();
        let unit = Unit::instruction(start, length, "insn", references).expect("valid unit");
        self.listing.add_unit(unit).expect("non-overlapping unit");
        self
    }

    /// Add a data item whose references all originate at its first byte.
    pub fn data(&mut self, start: &str, length: u64, targets: &[&str]) -> &mut Self {
        let start = self.addr(start);
        let references = targets
            .iter()
            .map(|to| Reference::new(start.clone(), self.addr(to), ReferenceKind::Data))
            .collect();
        let unit = Unit::data(start, length, "pointer", references).expect("valid unit");
        self.listing.add_unit(unit).expect("non-overlapping unit");
        self
    }

    pub fn point(&self, text: &str) -> AddressSet {
        AddressSet::from(self.addr(text))
    }

    pub fn range(&self, start: &str, end: &str) -> AddressSet {
        let mut set = AddressSet::new();
        set.add_range(&self.addr(start), &self.addr(end))
            .expect("valid range");
        set
    }
}

/// Intervals of a set as `(start, end)` offset pairs.
pub fn offsets(set: &AddressSet) -> Vec<(u64, u64)> {
    set.ranges()
        .map(|r| (r.start.offset, r.end.offset))
        .collect()
}
