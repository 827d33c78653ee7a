//! Code units: instructions and defined data in a program listing.
//!
//! A code unit occupies a contiguous, closed span of memory addresses and
//! owns the references that originate from it. Units never overlap within a
//! listing.

use serde::{Deserialize, Serialize};

use crate::core::address::Address;
use crate::core::address_range::AddressRange;
use crate::core::reference::Reference;
use crate::error::{Result, XrefError};

/// Read-only view of a unit as consumed by reference walks.
pub trait CodeUnit {
    /// First address of the unit.
    fn min_address(&self) -> &Address;
    /// Last address of the unit.
    fn max_address(&self) -> &Address;
    /// Outgoing references, in no particular order.
    fn references_from(&self) -> &[Reference];
}

/// What a unit holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitKind {
    /// A decoded instruction
    Instruction { mnemonic: String },
    /// A defined data item
    Data { data_type: String },
}

/// A unit owned by a listing snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    range: AddressRange,
    kind: UnitKind,
    references: Vec<Reference>,
}

impl Unit {
    /// Create a unit of `length` bytes at `start`.
    ///
    /// # Errors
    /// Returns `CorruptUnit` when the span is empty, leaves its space, lies
    /// outside memory, or a reference does not originate inside the span.
    pub fn new(
        start: Address,
        length: u64,
        kind: UnitKind,
        references: Vec<Reference>,
    ) -> Result<Self> {
        let corrupt = |reason: String| XrefError::CorruptUnit {
            address: start.to_string(),
            reason,
        };
        if !start.is_memory() {
            return Err(corrupt(format!(
                "unit must live in memory, not the {} space",
                start.space.kind
            )));
        }
        let range = AddressRange::from_length(start.clone(), length)
            .map_err(|e| corrupt(e.to_string()))?;
        for reference in &references {
            if !range.contains(&reference.from) {
                return Err(corrupt(format!(
                    "reference from {} lies outside the unit",
                    reference.from
                )));
            }
            reference.validate().map_err(|e| corrupt(e.to_string()))?;
        }
        Ok(Unit {
            range,
            kind,
            references,
        })
    }

    pub fn instruction(
        start: Address,
        length: u64,
        mnemonic: &str,
        references: Vec<Reference>,
    ) -> Result<Self> {
        Self::new(
            start,
            length,
            UnitKind::Instruction {
                mnemonic: mnemonic.to_string(),
            },
            references,
        )
    }

    pub fn data(
        start: Address,
        length: u64,
        data_type: &str,
        references: Vec<Reference>,
    ) -> Result<Self> {
        Self::new(
            start,
            length,
            UnitKind::Data {
                data_type: data_type.to_string(),
            },
            references,
        )
    }

    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    pub fn range(&self) -> &AddressRange {
        &self.range
    }

    pub fn length(&self) -> u64 {
        self.range.end.offset - self.range.start.offset + 1
    }

    pub fn is_instruction(&self) -> bool {
        matches!(self.kind, UnitKind::Instruction { .. })
    }
}

impl CodeUnit for Unit {
    fn min_address(&self) -> &Address {
        &self.range.start
    }

    fn max_address(&self) -> &Address {
        &self.range.end
    }

    fn references_from(&self) -> &[Reference] {
        &self.references
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address_space::AddressSpaces;
    use crate::core::reference::ReferenceKind;

    #[test]
    fn test_instruction_unit() {
        let spaces = AddressSpaces::standard(32).unwrap();
        let start = spaces.parse_address("ram:0x401000").unwrap();
        let target = spaces.parse_address("ram:0x402000").unwrap();
        let reference = Reference::new(start.clone(), target, ReferenceKind::Call);
        let unit = Unit::instruction(start.clone(), 5, "call", vec![reference]).unwrap();

        assert_eq!(unit.min_address(), &start);
        assert_eq!(unit.max_address().offset, 0x401004);
        assert_eq!(unit.length(), 5);
        assert!(unit.is_instruction());
        assert_eq!(unit.references_from().len(), 1);
    }

    #[test]
    fn test_zero_length_is_corrupt() {
        let spaces = AddressSpaces::standard(32).unwrap();
        let start = spaces.parse_address("ram:0x10").unwrap();
        let err = Unit::data(start, 0, "byte", vec![]).unwrap_err();
        assert!(matches!(err, XrefError::CorruptUnit { .. }));
    }

    #[test]
    fn test_reference_outside_unit_is_corrupt() {
        let spaces = AddressSpaces::standard(32).unwrap();
        let start = spaces.parse_address("ram:0x10").unwrap();
        let elsewhere = spaces.parse_address("ram:0x20").unwrap();
        let target = spaces.parse_address("ram:0x30").unwrap();
        let reference = Reference::new(elsewhere, target, ReferenceKind::Data);
        let err = Unit::data(start, 4, "dword", vec![reference]).unwrap_err();
        assert!(matches!(err, XrefError::CorruptUnit { .. }));
    }

    #[test]
    fn test_unit_outside_memory_is_corrupt() {
        let spaces = AddressSpaces::standard(32).unwrap();
        let start = spaces.parse_address("stack:0x10").unwrap();
        assert!(Unit::data(start, 4, "dword", vec![]).is_err());
    }
}
