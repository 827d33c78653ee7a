//! Core data types for reference selection.
//!
//! Addresses and address spaces, coalescing address sets, references, and
//! the code units that own them.

pub mod address;
pub mod address_range;
pub mod address_set;
pub mod address_space;
pub mod code_unit;
pub mod reference;

pub use address::Address;
pub use address_range::AddressRange;
pub use address_set::{AddressRangeIter, AddressSet};
pub use address_space::{AddressSpace, AddressSpaceKind, AddressSpaces};
pub use code_unit::{CodeUnit, Unit, UnitKind};
pub use reference::{Reference, ReferenceKind, SourceType};
