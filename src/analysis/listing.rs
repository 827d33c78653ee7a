//! Program listings: the unit index consulted by reference walks.
//!
//! `Listing` is the seam between the collectors and whatever owns the
//! program model. `ListingSnapshot` is an immutable, in-memory
//! implementation that answers range-intersection queries over units keyed
//! by start address. Snapshots can be decoded from JSON unit records; records
//! that fail validation are kept as corrupt entries so a walk reports them
//! in place instead of losing them silently.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::sync::Arc;
use tracing::warn;

use crate::core::address::Address;
use crate::core::address_range::AddressRange;
use crate::core::address_set::{AddressRangeIter, AddressSet};
use crate::core::address_space::{AddressSpace, AddressSpaces};
use crate::core::code_unit::{CodeUnit, Unit, UnitKind};
use crate::core::reference::{Reference, ReferenceKind, SourceType};
use crate::error::{Result, XrefError};

/// Iterator returned by [`Listing::code_units`].
pub type CodeUnits<'a, U> = Box<dyn Iterator<Item = Result<&'a U>> + 'a>;

/// A unit index over a program listing.
pub trait Listing {
    type Unit: CodeUnit;

    /// Units whose span intersects `set`, each at most once.
    ///
    /// Ascending by start address when `forward`, descending otherwise.
    /// Units that cannot be read are yielded as `Err(CorruptUnit)` in their
    /// position so callers can skip them and continue.
    fn code_units<'a>(&'a self, set: &'a AddressSet, forward: bool) -> CodeUnits<'a, Self::Unit>;
}

// A corrupt entry occupies only its start address; its recorded length is
// not trusted.
#[derive(Debug, Clone)]
enum UnitEntry {
    Valid(Unit),
    Corrupt { start: Address, reason: String },
}

impl UnitEntry {
    fn end_offset(&self) -> u64 {
        match self {
            UnitEntry::Valid(unit) => unit.max_address().offset,
            UnitEntry::Corrupt { start, .. } => start.offset,
        }
    }

    fn is_corrupt(&self) -> bool {
        matches!(self, UnitEntry::Corrupt { .. })
    }

    fn start(&self) -> &Address {
        match self {
            UnitEntry::Valid(unit) => unit.min_address(),
            UnitEntry::Corrupt { start, .. } => start,
        }
    }

    fn as_result(&self) -> Result<&Unit> {
        match self {
            UnitEntry::Valid(unit) => Ok(unit),
            UnitEntry::Corrupt { start, reason, .. } => Err(XrefError::CorruptUnit {
                address: start.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Serialized reference inside a [`UnitRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Origin inside the unit; defaults to the unit start
    #[serde(default)]
    pub from: Option<String>,
    pub to: String,
    pub kind: ReferenceKind,
    #[serde(default)]
    pub source: SourceType,
    #[serde(default)]
    pub operand_index: Option<u8>,
    #[serde(default)]
    pub primary: bool,
}

/// Serialized unit, as exported by a disassembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub address: String,
    pub length: u64,
    #[serde(flatten)]
    pub kind: UnitKind,
    #[serde(default)]
    pub references: Vec<ReferenceRecord>,
}

impl UnitRecord {
    fn decode(&self, spaces: &AddressSpaces, start: &Address) -> Result<Unit> {
        let mut references = Vec::with_capacity(self.references.len());
        for record in &self.references {
            let from = match &record.from {
                Some(text) => spaces.parse_address(text)?,
                None => start.clone(),
            };
            let to = spaces.parse_address(&record.to)?;
            let mut reference = Reference::new(from, to, record.kind).with_source(record.source);
            reference.operand_index = record.operand_index;
            reference.primary = record.primary;
            references.push(reference);
        }
        Unit::new(start.clone(), self.length, self.kind.clone(), references)
    }
}

/// Immutable in-memory listing keyed by space and unit start offset.
#[derive(Debug, Clone, Default)]
pub struct ListingSnapshot {
    spaces: BTreeMap<Arc<AddressSpace>, BTreeMap<u64, UnitEntry>>,
    corrupt: usize,
}

/// Start offsets of the entries overlapping `[start, end]`.
fn overlapping(units: &BTreeMap<u64, UnitEntry>, start: u64, end: u64) -> Vec<u64> {
    let mut keys = Vec::new();
    if let Some((&s, entry)) = units.range(..start).next_back() {
        if entry.end_offset() >= start {
            keys.push(s);
        }
    }
    keys.extend(units.range(start..=end).map(|(&s, _)| s));
    keys
}

impl ListingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit, rejecting any overlap with units already present.
    pub fn add_unit(&mut self, unit: Unit) -> Result<()> {
        self.insert_entry(UnitEntry::Valid(unit), false)
    }

    /// Insert an entry. With `lenient`, collisions involving corrupt entries
    /// resolve in favour of the valid unit instead of failing; a collision
    /// between two valid units always fails.
    fn insert_entry(&mut self, entry: UnitEntry, lenient: bool) -> Result<()> {
        let start = entry.start().clone();
        let end = entry.end_offset();
        let units = self.spaces.entry(Arc::clone(&start.space)).or_default();

        let keys = overlapping(units, start.offset, end);
        if let Some(first) = keys.first() {
            let only_corrupt = keys.iter().all(|k| units[k].is_corrupt());
            if lenient && entry.is_corrupt() {
                warn!(
                    address = %start,
                    existing = %units[first].start(),
                    "dropping corrupt record that overlaps another unit"
                );
                return Ok(());
            }
            if !(lenient && only_corrupt) {
                return Err(XrefError::OverlappingUnit {
                    address: start.to_string(),
                    existing: units[first].start().to_string(),
                });
            }
            for key in &keys {
                units.remove(key);
            }
            self.corrupt -= keys.len();
            warn!(
                address = %start,
                evicted = keys.len(),
                "valid unit replaces overlapping corrupt records"
            );
        }

        if entry.is_corrupt() {
            self.corrupt += 1;
        }
        units.insert(start.offset, entry);
        Ok(())
    }

    /// Build a snapshot from decoded unit records.
    ///
    /// A record whose start address cannot be parsed, or two valid records
    /// that overlap, fail the whole load. Records that are otherwise invalid
    /// are kept as one-address corrupt entries; a corrupt entry never blocks a
    /// valid unit.
    pub fn from_records(spaces: &AddressSpaces, records: &[UnitRecord]) -> Result<Self> {
        let mut snapshot = Self::new();
        for record in records {
            let start = spaces.parse_address(&record.address)?;
            let entry = match record.decode(spaces, &start) {
                Ok(unit) => UnitEntry::Valid(unit),
                Err(err) => {
                    warn!(address = %start, error = %err, "retaining corrupt unit record");
                    UnitEntry::Corrupt {
                        start,
                        reason: err.to_string(),
                    }
                }
            };
            snapshot.insert_entry(entry, true)?;
        }
        Ok(snapshot)
    }

    /// Decode a JSON array of unit records.
    pub fn from_json(spaces: &AddressSpaces, json_str: &str) -> Result<Self> {
        let records: Vec<UnitRecord> =
            serde_json::from_str(json_str).map_err(|e| XrefError::Serialization(e.to_string()))?;
        Self::from_records(spaces, &records)
    }

    /// Number of entries, corrupt ones included.
    pub fn len(&self) -> usize {
        self.spaces.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn corrupt_count(&self) -> usize {
        self.corrupt
    }

    /// The unit starting exactly at `addr`.
    pub fn unit_at(&self, addr: &Address) -> Option<Result<&Unit>> {
        self.spaces
            .get(&addr.space)?
            .get(&addr.offset)
            .map(UnitEntry::as_result)
    }

    /// The unit whose span holds `addr`.
    pub fn unit_containing(&self, addr: &Address) -> Option<Result<&Unit>> {
        self.spaces
            .get(&addr.space)?
            .range(..=addr.offset)
            .next_back()
            .filter(|&(_, entry)| entry.end_offset() >= addr.offset)
            .map(|(_, entry)| entry.as_result())
    }

    fn units_intersecting(
        &self,
        range: &AddressRange,
    ) -> Option<btree_map::Range<'_, u64, UnitEntry>> {
        let units = self.spaces.get(range.space())?;
        let (s, e) = (range.start.offset, range.end.offset);
        let lo = match units.range(..s).next_back() {
            Some((&start, entry)) if entry.end_offset() >= s => start,
            _ => s,
        };
        Some(units.range(lo..=e))
    }
}

impl Listing for ListingSnapshot {
    type Unit = Unit;

    fn code_units<'a>(&'a self, set: &'a AddressSet, forward: bool) -> CodeUnits<'a, Unit> {
        Box::new(CodeUnitIter {
            listing: self,
            ranges: if forward { set.ranges() } else { set.ranges_rev() },
            current: None,
            forward,
            last: None,
        })
    }
}

/// Walks the units of a snapshot that intersect an address set.
struct CodeUnitIter<'a> {
    listing: &'a ListingSnapshot,
    ranges: AddressRangeIter<'a>,
    current: Option<btree_map::Range<'a, u64, UnitEntry>>,
    forward: bool,
    // A unit spanning two input ranges is found once per range.
    last: Option<&'a Address>,
}

impl<'a> Iterator for CodeUnitIter<'a> {
    type Item = Result<&'a Unit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(units) = self.current.as_mut() {
                let next = if self.forward {
                    units.next()
                } else {
                    units.next_back()
                };
                if let Some((_, entry)) = next {
                    let start = entry.start();
                    if self.last == Some(start) {
                        continue;
                    }
                    self.last = Some(start);
                    return Some(entry.as_result());
                }
                self.current = None;
            }
            let range = self.ranges.next()?;
            self.current = self.listing.units_intersecting(&range);
        }
    }
}
