//! Address types for binary analysis.
//!
//! An `Address` is an offset tagged with the address space it belongs to.
//! Addresses are ordered only within a single space; comparing addresses
//! from different spaces is an error rather than an arbitrary ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::core::address_space::AddressSpace;
use crate::error::{Result, XrefError};

/// A location in one of a program's address spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// The space this offset is interpreted in
    pub space: Arc<AddressSpace>,
    /// The numeric offset within the space
    pub offset: u64,
}

impl Address {
    /// Create a new Address.
    ///
    /// # Errors
    /// Returns `AddressOutOfBounds` if `offset` exceeds the space width.
    pub fn new(space: Arc<AddressSpace>, offset: u64) -> Result<Self> {
        if offset > space.max_offset() {
            return Err(XrefError::AddressOutOfBounds {
                space: space.name.clone(),
                message: format!(
                    "offset {:#x} exceeds maximum {:#x}",
                    offset,
                    space.max_offset()
                ),
            });
        }
        Ok(Address { space, offset })
    }

    /// Whether this address lies in addressable program memory.
    pub fn is_memory(&self) -> bool {
        self.space.is_memory()
    }

    pub fn same_space(&self, other: &Address) -> bool {
        self.space == other.space
    }

    /// Order two addresses of the same space.
    ///
    /// # Errors
    /// Returns `AddressSpaceMismatch` for addresses in different spaces.
    pub fn compare(&self, other: &Address) -> Result<Ordering> {
        self.require_same_space(other)?;
        Ok(self.offset.cmp(&other.offset))
    }

    /// Absolute distance in bytes between two addresses of the same space.
    pub fn distance(&self, other: &Address) -> Result<u64> {
        self.require_same_space(other)?;
        Ok(self.offset.abs_diff(other.offset))
    }

    /// Add a byte offset, staying inside the space.
    pub fn add(&self, delta: u64) -> Result<Self> {
        let offset = self
            .offset
            .checked_add(delta)
            .ok_or_else(|| self.out_of_bounds("addition overflow"))?;
        Self::new(Arc::clone(&self.space), offset)
    }

    /// Subtract a byte offset, staying inside the space.
    pub fn sub(&self, delta: u64) -> Result<Self> {
        let offset = self
            .offset
            .checked_sub(delta)
            .ok_or_else(|| self.out_of_bounds("subtraction underflow"))?;
        Self::new(Arc::clone(&self.space), offset)
    }

    /// The following address, or `None` at the top of the space.
    pub fn next(&self) -> Option<Self> {
        self.add(1).ok()
    }

    /// The preceding address, or `None` at offset zero.
    pub fn previous(&self) -> Option<Self> {
        self.sub(1).ok()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| XrefError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let addr: Address =
            serde_json::from_str(json_str).map_err(|e| XrefError::Serialization(e.to_string()))?;
        Self::new(addr.space, addr.offset)
    }

    pub(crate) fn require_same_space(&self, other: &Address) -> Result<()> {
        if self.same_space(other) {
            Ok(())
        } else {
            Err(XrefError::AddressSpaceMismatch {
                left: self.to_string(),
                right: other.to_string(),
            })
        }
    }

    fn out_of_bounds(&self, message: &str) -> XrefError {
        XrefError::AddressOutOfBounds {
            space: self.space.name.clone(),
            message: format!("{} at {}", message, self),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:0width$x}",
            self.space.name,
            self.offset,
            width = self.space.display_width()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address_space::{AddressSpaceKind, AddressSpaces};

    fn spaces() -> AddressSpaces {
        AddressSpaces::standard(32).unwrap()
    }

    #[test]
    fn test_address_creation() {
        let spaces = spaces();
        let ram = spaces.get("ram").unwrap();
        let addr = Address::new(ram, 0x401000).unwrap();
        assert_eq!(addr.offset, 0x401000);
        assert!(addr.is_memory());
        assert_eq!(addr.to_string(), "ram:00401000");
    }

    #[test]
    fn test_offset_bounds() {
        let mut spaces = AddressSpaces::new();
        let small = spaces.register("io", AddressSpaceKind::Ram, 16).unwrap();
        assert!(Address::new(Arc::clone(&small), 0xFFFF).is_ok());
        assert!(matches!(
            Address::new(small, 0x10000),
            Err(XrefError::AddressOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_arithmetic() {
        let spaces = spaces();
        let addr = spaces.parse_address("ram:0x401000").unwrap();
        assert_eq!(addr.add(0x10).unwrap().offset, 0x401010);
        assert_eq!(addr.sub(0x1000).unwrap().offset, 0x400000);
        assert!(addr.sub(0x401001).is_err());

        let top = spaces.parse_address("ram:0xffffffff").unwrap();
        assert!(top.next().is_none());
        assert_eq!(top.previous().unwrap().offset, 0xFFFF_FFFE);
        let zero = spaces.parse_address("ram:0").unwrap();
        assert!(zero.previous().is_none());
    }

    #[test]
    fn test_same_space_ordering() {
        let spaces = spaces();
        let a = spaces.parse_address("ram:0x1000").unwrap();
        let b = spaces.parse_address("ram:0x2000").unwrap();
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
        assert_eq!(a.compare(&a).unwrap(), Ordering::Equal);
        assert_eq!(a.distance(&b).unwrap(), 0x1000);
    }

    #[test]
    fn test_cross_space_comparison_rejected() {
        let spaces = spaces();
        let mem = spaces.parse_address("ram:0x1000").unwrap();
        let reg = spaces.parse_address("register:0x1000").unwrap();
        assert!(matches!(
            mem.compare(&reg),
            Err(XrefError::AddressSpaceMismatch { .. })
        ));
        assert!(mem.distance(&reg).is_err());
        assert_ne!(mem, reg);
    }

    #[test]
    fn test_json_serialization() {
        let spaces = spaces();
        let addr = spaces.parse_address("stack:0x20").unwrap();
        let json_str = addr.to_json().unwrap();
        let restored = Address::from_json(&json_str).unwrap();
        assert_eq!(addr, restored);
        assert!(!restored.is_memory());
    }
}
