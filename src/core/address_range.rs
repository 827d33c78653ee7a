//! AddressRange types for binary analysis.
//!
//! This module provides the AddressRange type: a closed interval
//! `[start, end]` of addresses inside a single address space. Closed bounds
//! let a range reach the last offset of a 64-bit space.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::address::Address;
use crate::core::address_space::AddressSpace;
use crate::error::{Result, XrefError};

/// A closed, contiguous interval of addresses in one space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    /// First address of the range (inclusive)
    pub start: Address,
    /// Last address of the range (inclusive)
    pub end: Address,
}

impl AddressRange {
    /// Create a new AddressRange.
    ///
    /// # Errors
    /// Returns `InvalidRange` if the endpoints lie in different spaces or
    /// `start` is greater than `end`.
    pub fn new(start: Address, end: Address) -> Result<Self> {
        if !start.same_space(&end) {
            return Err(XrefError::InvalidRange(format!(
                "range endpoints {} and {} are in different address spaces",
                start, end
            )));
        }
        if start.offset > end.offset {
            return Err(XrefError::InvalidRange(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        Ok(AddressRange { start, end })
    }

    /// A single-address range `[addr, addr]`.
    pub fn point(addr: Address) -> Self {
        AddressRange {
            end: addr.clone(),
            start: addr,
        }
    }

    /// Build a range from a start address and a byte length.
    ///
    /// # Errors
    /// Returns `InvalidRange` for a zero length, and `AddressOutOfBounds`
    /// when the range would run past the end of the space.
    pub fn from_length(start: Address, length: u64) -> Result<Self> {
        if length == 0 {
            return Err(XrefError::InvalidRange(format!(
                "zero-length range at {}",
                start
            )));
        }
        let end = start.add(length - 1)?;
        Ok(AddressRange { start, end })
    }

    pub(crate) fn from_offsets(space: &Arc<AddressSpace>, start: u64, end: u64) -> Self {
        AddressRange {
            start: Address {
                space: Arc::clone(space),
                offset: start,
            },
            end: Address {
                space: Arc::clone(space),
                offset: end,
            },
        }
    }

    pub fn space(&self) -> &Arc<AddressSpace> {
        &self.start.space
    }

    /// Number of addresses covered. Exact for a whole 64-bit space.
    pub fn len(&self) -> u128 {
        u128::from(self.end.offset - self.start.offset) + 1
    }

    /// Closed ranges always hold at least one address.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: &Address) -> bool {
        addr.same_space(&self.start)
            && addr.offset >= self.start.offset
            && addr.offset <= self.end.offset
    }

    pub fn overlaps(&self, other: &AddressRange) -> bool {
        self.start.same_space(&other.start)
            && self.start.offset <= other.end.offset
            && other.start.offset <= self.end.offset
    }

    pub fn intersection(&self, other: &AddressRange) -> Option<AddressRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self::from_offsets(
            self.space(),
            self.start.offset.max(other.start.offset),
            self.end.offset.min(other.end.offset),
        ))
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
