//! Coalescing address sets.
//!
//! `AddressSet` stores a set of addresses as closed intervals per address
//! space. After every mutation the intervals of each space are ascending,
//! disjoint and non-adjacent: inserting an address that touches or overlaps
//! an existing interval extends that interval instead of adding a new one.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;

use crate::core::address::Address;
use crate::core::address_range::AddressRange;
use crate::core::address_space::AddressSpace;
use crate::error::{Result, XrefError};

/// Canonical intervals of a single space, keyed by start offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SpaceRanges {
    ranges: BTreeMap<u64, u64>,
}

impl SpaceRanges {
    /// Insert `[start, end]`, absorbing every interval it touches.
    fn insert(&mut self, start: u64, end: u64) {
        let mut lo = start;
        let mut hi = end;

        if let Some((&s, &e)) = self.ranges.range(..=start).next_back() {
            if e.saturating_add(1) >= start {
                lo = s;
                hi = hi.max(e);
            }
        }

        let limit = hi.saturating_add(1);
        let absorbed: Vec<(u64, u64)> = self
            .ranges
            .range(lo..=limit)
            .map(|(&s, &e)| (s, e))
            .collect();
        for (s, e) in absorbed {
            hi = hi.max(e);
            self.ranges.remove(&s);
        }
        self.ranges.insert(lo, hi);
    }

    /// Remove `[start, end]`, splitting intervals that straddle a bound.
    fn remove(&mut self, start: u64, end: u64) {
        let mut hits = Vec::new();
        if let Some((&s, &e)) = self.ranges.range(..start).next_back() {
            if e >= start {
                hits.push((s, e));
            }
        }
        hits.extend(self.ranges.range(start..=end).map(|(&s, &e)| (s, e)));

        for (s, e) in hits {
            self.ranges.remove(&s);
            if s < start {
                self.ranges.insert(s, start - 1);
            }
            if e > end {
                self.ranges.insert(end + 1, e);
            }
        }
    }

    fn find(&self, offset: u64) -> Option<(u64, u64)> {
        self.ranges
            .range(..=offset)
            .next_back()
            .filter(|&(_, &e)| e >= offset)
            .map(|(&s, &e)| (s, e))
    }

    fn intersects(&self, start: u64, end: u64) -> bool {
        self.find(start).is_some() || self.ranges.range(start..=end).next().is_some()
    }
}

/// A set of addresses stored as coalesced closed intervals.
///
/// Intervals never cross an address space. Spaces are keyed by their full
/// identity and kept in `AddressSpace` order (id first), so iteration is
/// ascending by space and then by offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<AddressRange>", try_from = "Vec<AddressRange>")]
pub struct AddressSet {
    spaces: BTreeMap<Arc<AddressSpace>, SpaceRanges>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn space_entry(&mut self, space: &Arc<AddressSpace>) -> &mut SpaceRanges {
        self.spaces.entry(Arc::clone(space)).or_default()
    }

    /// Insert the single address `addr`.
    pub fn add(&mut self, addr: &Address) {
        self.space_entry(&addr.space).insert(addr.offset, addr.offset);
    }

    /// Insert the closed range `[start, end]`.
    ///
    /// # Errors
    /// Returns `InvalidRange` if the endpoints are in different spaces or
    /// `start > end`. The set is unchanged on error.
    pub fn add_range(&mut self, start: &Address, end: &Address) -> Result<()> {
        let range = AddressRange::new(start.clone(), end.clone())?;
        self.add_address_range(&range);
        Ok(())
    }

    pub fn add_address_range(&mut self, range: &AddressRange) {
        self.space_entry(range.space())
            .insert(range.start.offset, range.end.offset);
    }

    /// Union `other` into this set.
    pub fn add_set(&mut self, other: &AddressSet) {
        for range in other.ranges() {
            self.add_address_range(&range);
        }
    }

    /// Remove every address in `[start, end]` from the set.
    pub fn delete_range(&mut self, start: &Address, end: &Address) -> Result<()> {
        let range = AddressRange::new(start.clone(), end.clone())?;
        let space = range.space();
        if let Some(entry) = self.spaces.get_mut(space) {
            entry.remove(range.start.offset, range.end.offset);
            if entry.ranges.is_empty() {
                self.spaces.remove(space);
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.spaces.clear();
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.range_containing(addr).is_some()
    }

    /// The interval holding `addr`, if any.
    pub fn range_containing(&self, addr: &Address) -> Option<AddressRange> {
        let entry = self.spaces.get(&addr.space)?;
        let (s, e) = entry.find(addr.offset)?;
        Some(AddressRange::from_offsets(&addr.space, s, e))
    }

    /// Whether any address of `range` is in the set.
    pub fn intersects(&self, range: &AddressRange) -> bool {
        self.spaces
            .get(range.space())
            .is_some_and(|entry| entry.intersects(range.start.offset, range.end.offset))
    }

    /// Addresses present in both sets.
    pub fn intersect(&self, other: &AddressSet) -> AddressSet {
        let mut out = AddressSet::new();
        for range in self.ranges() {
            let Some(entry) = other.spaces.get(range.space()) else {
                continue;
            };
            if let Some((_, e)) = entry.find(range.start.offset) {
                out.add_address_range(&AddressRange::from_offsets(
                    range.space(),
                    range.start.offset,
                    e.min(range.end.offset),
                ));
            }
            for (&s, &e) in entry.ranges.range(range.start.offset..=range.end.offset) {
                out.add_address_range(&AddressRange::from_offsets(
                    range.space(),
                    s,
                    e.min(range.end.offset),
                ));
            }
        }
        out
    }

    /// Ascending iteration over the intervals of the set.
    ///
    /// Each call starts a fresh walk from the lowest interval.
    pub fn ranges(&self) -> AddressRangeIter<'_> {
        AddressRangeIter::new(self, false)
    }

    /// Descending iteration over the intervals of the set.
    pub fn ranges_rev(&self) -> AddressRangeIter<'_> {
        AddressRangeIter::new(self, true)
    }

    pub fn num_ranges(&self) -> usize {
        self.spaces.values().map(|entry| entry.ranges.len()).sum()
    }

    /// Total number of addresses covered by the set.
    pub fn num_addresses(&self) -> u128 {
        self.ranges().map(|range| range.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn min_address(&self) -> Option<Address> {
        self.ranges().next().map(|range| range.start)
    }

    pub fn max_address(&self) -> Option<Address> {
        self.ranges_rev().next().map(|range| range.end)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| XrefError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON string
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| XrefError::Serialization(e.to_string()))
    }

    /// Serialize to binary
    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| XrefError::Serialization(e.to_string()))
    }

    /// Deserialize from binary
    pub fn from_bincode(data: &[u8]) -> Result<Self> {
        bincode::serde::decode_from_slice(data, bincode::config::standard())
            .map(|(set, _)| set)
            .map_err(|e| XrefError::Serialization(e.to_string()))
    }
}

impl From<Address> for AddressSet {
    fn from(addr: Address) -> Self {
        let mut set = AddressSet::new();
        set.add(&addr);
        set
    }
}

impl From<AddressRange> for AddressSet {
    fn from(range: AddressRange) -> Self {
        let mut set = AddressSet::new();
        set.add_address_range(&range);
        set
    }
}

impl FromIterator<Address> for AddressSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut set = AddressSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Address> for AddressSet {
    fn extend<I: IntoIterator<Item = Address>>(&mut self, iter: I) {
        for addr in iter {
            self.add(&addr);
        }
    }
}

impl From<AddressSet> for Vec<AddressRange> {
    fn from(set: AddressSet) -> Self {
        set.ranges().collect()
    }
}

impl TryFrom<Vec<AddressRange>> for AddressSet {
    type Error = XrefError;

    fn try_from(ranges: Vec<AddressRange>) -> Result<Self> {
        let mut set = AddressSet::new();
        for range in ranges {
            // Re-validate: deserialized ranges bypass the constructor.
            let range = AddressRange::new(
                Address::new(range.start.space, range.start.offset)?,
                Address::new(range.end.space, range.end.offset)?,
            )?;
            set.add_address_range(&range);
        }
        Ok(set)
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, range) in self.ranges().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", range)?;
        }
        f.write_str("}")
    }
}

/// Iterator over the intervals of an [`AddressSet`].
///
/// Holds a shared borrow of the set, so the set cannot change mid-walk.
pub struct AddressRangeIter<'a> {
    spaces: btree_map::Iter<'a, Arc<AddressSpace>, SpaceRanges>,
    current: Option<(&'a Arc<AddressSpace>, btree_map::Iter<'a, u64, u64>)>,
    reverse: bool,
}

impl<'a> AddressRangeIter<'a> {
    fn new(set: &'a AddressSet, reverse: bool) -> Self {
        Self {
            spaces: set.spaces.iter(),
            current: None,
            reverse,
        }
    }
}

impl Iterator for AddressRangeIter<'_> {
    type Item = AddressRange;

    fn next(&mut self) -> Option<AddressRange> {
        loop {
            if let Some((space, ranges)) = self.current.as_mut() {
                let item = if self.reverse {
                    ranges.next_back()
                } else {
                    ranges.next()
                };
                if let Some((&s, &e)) = item {
                    return Some(AddressRange::from_offsets(*space, s, e));
                }
            }
            let (space, entry) = if self.reverse {
                self.spaces.next_back()
            } else {
                self.spaces.next()
            }?;
            self.current = Some((space, entry.ranges.iter()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address_space::{AddressSpaceKind, AddressSpaces};

    struct Fixture {
        spaces: AddressSpaces,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                spaces: AddressSpaces::standard(32).unwrap(),
            }
        }

        fn at(&self, text: &str) -> Address {
            self.spaces.parse_address(text).unwrap()
        }

        fn ram(&self, offset: u64) -> Address {
            Address::new(self.spaces.get("ram").unwrap(), offset).unwrap()
        }
    }

    fn offsets(set: &AddressSet) -> Vec<(u64, u64)> {
        set.ranges()
            .map(|r| (r.start.offset, r.end.offset))
            .collect()
    }

    #[test]
    fn test_empty_set() {
        let set = AddressSet::new();
        assert!(set.is_empty());
        assert_eq!(set.num_ranges(), 0);
        assert_eq!(set.num_addresses(), 0);
        assert!(set.min_address().is_none());
        assert_eq!(set.ranges().count(), 0);
        assert_eq!(set.to_string(), "{}");
    }

    #[test]
    fn test_adjacent_points_coalesce() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add(&fx.ram(0x100));
        set.add(&fx.ram(0x101));
        assert_eq!(offsets(&set), vec![(0x100, 0x101)]);

        // Touching on the low side
        set.add(&fx.ram(0xff));
        assert_eq!(offsets(&set), vec![(0xff, 0x101)]);
    }

    #[test]
    fn test_gap_keeps_intervals_apart() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add(&fx.ram(0x100));
        set.add(&fx.ram(0x102));
        assert_eq!(offsets(&set), vec![(0x100, 0x100), (0x102, 0x102)]);

        // Filling the hole bridges both neighbours
        set.add(&fx.ram(0x101));
        assert_eq!(offsets(&set), vec![(0x100, 0x102)]);
    }

    #[test]
    fn test_range_absorbs_many() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        for off in [0x10, 0x20, 0x30, 0x40, 0x60] {
            set.add(&fx.ram(off));
        }
        set.add_range(&fx.ram(0x15), &fx.ram(0x3f)).unwrap();
        assert_eq!(offsets(&set), vec![(0x10, 0x10), (0x15, 0x40), (0x60, 0x60)]);
        assert_eq!(set.num_addresses(), 1 + (0x40 - 0x15 + 1) + 1);
    }

    #[test]
    fn test_idempotent_insertion() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add_range(&fx.ram(0x10), &fx.ram(0x20)).unwrap();
        set.add(&fx.ram(0x40));
        let before = set.clone();
        set.add_range(&fx.ram(0x10), &fx.ram(0x20)).unwrap();
        set.add(&fx.ram(0x40));
        set.add(&fx.ram(0x15));
        assert_eq!(set, before);
    }

    #[test]
    fn test_invalid_ranges() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        let err = set
            .add_range(&fx.at("ram:0x10"), &fx.at("register:0x20"))
            .unwrap_err();
        assert!(matches!(err, XrefError::InvalidRange(_)));
        let err = set.add_range(&fx.ram(0x20), &fx.ram(0x10)).unwrap_err();
        assert!(matches!(err, XrefError::InvalidRange(_)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_space_boundaries() {
        let mut spaces = AddressSpaces::new();
        let ram = spaces.register("ram", AddressSpaceKind::Ram, 64).unwrap();
        let top = Address::new(Arc::clone(&ram), u64::MAX).unwrap();
        let zero = Address::new(Arc::clone(&ram), 0).unwrap();

        let mut set = AddressSet::new();
        set.add(&top);
        set.add(&top.previous().unwrap());
        set.add(&zero);
        set.add(&zero.next().unwrap());
        assert_eq!(offsets(&set), vec![(0, 1), (u64::MAX - 1, u64::MAX)]);

        set.add_range(&zero, &top).unwrap();
        assert_eq!(set.num_ranges(), 1);
        assert_eq!(set.num_addresses(), u128::from(u64::MAX) + 1);
    }

    #[test]
    fn test_spaces_stay_separate() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add(&fx.at("stack:0x10"));
        set.add(&fx.at("ram:0x10"));
        set.add(&fx.at("ram:0x11"));
        let ranges: Vec<String> = set.ranges().map(|r| r.to_string()).collect();
        assert_eq!(
            ranges,
            vec!["[ram:00000010, ram:00000011]", "[stack:00000010, stack:00000010]"]
        );
        assert!(set.contains(&fx.at("stack:0x10")));
        assert!(!set.contains(&fx.at("stack:0x11")));
        assert_eq!(set.max_address().unwrap(), fx.at("stack:0x10"));
    }

    #[test]
    fn test_spaces_with_shared_id_stay_separate() {
        let fx = Fixture::new();
        let mut other = AddressSpaces::new();
        let code = other.register("code", AddressSpaceKind::Code, 32).unwrap();
        assert_eq!(code.id, fx.spaces.get("ram").unwrap().id);

        let ram_addr = fx.ram(0x10);
        let code_addr = Address::new(Arc::clone(&code), 0x11).unwrap();
        let mut set = AddressSet::new();
        set.add(&ram_addr);
        set.add(&code_addr);

        assert_eq!(set.num_ranges(), 2);
        assert!(set.contains(&code_addr));
        assert!(!set.contains(&Address::new(code, 0x10).unwrap()));
        assert_eq!(set.range_containing(&code_addr).unwrap().space().name, "code");
        assert_eq!(
            set.to_string(),
            "{[code:00000011, code:00000011] [ram:00000010, ram:00000010]}"
        );

        let restored = AddressSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let fx = Fixture::new();
        let set: AddressSet = [0x1, 0x5, 0x9].into_iter().map(|o| fx.ram(o)).collect();
        let first: Vec<_> = set.ranges().collect();
        let second: Vec<_> = set.ranges().collect();
        assert_eq!(first, second);
        let mut reversed: Vec<_> = set.ranges_rev().collect();
        reversed.reverse();
        assert_eq!(first, reversed);
    }

    #[test]
    fn test_delete_range_splits() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add_range(&fx.ram(0x10), &fx.ram(0x30)).unwrap();
        set.add(&fx.ram(0x40));
        set.delete_range(&fx.ram(0x18), &fx.ram(0x1f)).unwrap();
        assert_eq!(offsets(&set), vec![(0x10, 0x17), (0x20, 0x30), (0x40, 0x40)]);

        set.delete_range(&fx.ram(0x0), &fx.ram(0x100)).unwrap();
        assert!(set.is_empty());
        assert_eq!(set, AddressSet::new());
    }

    #[test]
    fn test_range_containing_and_intersects() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add_range(&fx.ram(0x10), &fx.ram(0x1f)).unwrap();
        let r = set.range_containing(&fx.ram(0x18)).unwrap();
        assert_eq!((r.start.offset, r.end.offset), (0x10, 0x1f));
        assert!(set.range_containing(&fx.ram(0x20)).is_none());

        let probe = AddressRange::new(fx.ram(0x0), fx.ram(0x10)).unwrap();
        assert!(set.intersects(&probe));
        let probe = AddressRange::new(fx.ram(0x1c), fx.ram(0x40)).unwrap();
        assert!(set.intersects(&probe));
        let probe = AddressRange::new(fx.ram(0x20), fx.ram(0x40)).unwrap();
        assert!(!set.intersects(&probe));
    }

    #[test]
    fn test_intersect_and_union() {
        let fx = Fixture::new();
        let mut a = AddressSet::new();
        a.add_range(&fx.ram(0x10), &fx.ram(0x2f)).unwrap();
        a.add_range(&fx.ram(0x40), &fx.ram(0x4f)).unwrap();
        let mut b = AddressSet::new();
        b.add_range(&fx.ram(0x20), &fx.ram(0x44)).unwrap();
        b.add(&fx.ram(0x4f));

        let both = a.intersect(&b);
        assert_eq!(offsets(&both), vec![(0x20, 0x2f), (0x40, 0x44), (0x4f, 0x4f)]);

        let mut union = a.clone();
        union.add_set(&b);
        assert_eq!(offsets(&union), vec![(0x10, 0x4f)]);
    }

    #[test]
    fn test_serialization() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add_range(&fx.ram(0x10), &fx.ram(0x1f)).unwrap();
        set.add(&fx.at("stack:0x8"));

        let json = set.to_json().unwrap();
        assert_eq!(AddressSet::from_json(&json).unwrap(), set);

        let bin = set.to_bincode().unwrap();
        assert_eq!(AddressSet::from_bincode(&bin).unwrap(), set);
    }

    #[test]
    fn test_deserialize_rejects_reversed_range() {
        let fx = Fixture::new();
        let bad = AddressRange {
            start: fx.ram(0x20),
            end: fx.ram(0x10),
        };
        let json = serde_json::to_string(&vec![bad]).unwrap();
        assert!(AddressSet::from_json(&json).is_err());
    }

    #[test]
    fn test_display() {
        let fx = Fixture::new();
        let mut set = AddressSet::new();
        set.add(&fx.ram(0x1000));
        set.add(&fx.ram(0x1001));
        set.add(&fx.ram(0x2000));
        assert_eq!(
            set.to_string(),
            "{[ram:00001000, ram:00001001] [ram:00002000, ram:00002000]}"
        );
    }
}
