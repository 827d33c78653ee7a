//! AddressSpace types for binary analysis.
//!
//! This module provides the AddressSpace type that represents named addressing
//! domains of a program (RAM, overlays, registers, stack, constants, external
//! linkage) and the `AddressSpaces` registry that owns them and parses
//! textual addresses.

#[cfg(feature = "python-ext")]
use pyo3::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::address::Address;
use crate::error::{Result, XrefError};

/// The kind of address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "python-ext", pyclass(eq, eq_int))]
pub enum AddressSpaceKind {
    /// Loaded, byte-addressable memory
    Ram,
    /// Separate code memory (Harvard architectures)
    Code,
    /// Non-loaded memory such as file headers or debug sections
    Other,
    /// Overlay placed over another memory space
    Overlay,
    /// Processor registers
    Register,
    /// Function-relative stack frame offsets
    Stack,
    /// Constant/immediate values
    Constant,
    /// Linkage to external libraries
    External,
    /// Temporary values of the intermediate language
    Unique,
}

impl AddressSpaceKind {
    /// Whether addresses of this kind denote addressable program memory.
    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            AddressSpaceKind::Ram
                | AddressSpaceKind::Code
                | AddressSpaceKind::Other
                | AddressSpaceKind::Overlay
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressSpaceKind::Ram => "ram",
            AddressSpaceKind::Code => "code",
            AddressSpaceKind::Other => "other",
            AddressSpaceKind::Overlay => "overlay",
            AddressSpaceKind::Register => "register",
            AddressSpaceKind::Stack => "stack",
            AddressSpaceKind::Constant => "constant",
            AddressSpaceKind::External => "external",
            AddressSpaceKind::Unique => "unique",
        }
    }
}

impl fmt::Display for AddressSpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named addressing domain within a program.
///
/// Two addresses are comparable only when their spaces are equal in every
/// field; spaces from different registries may share an id. Ordering is by
/// id first. The bit width bounds the largest offset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddressSpace {
    /// Registry-assigned identifier, also the ordering key between spaces
    pub id: u16,
    /// The name of this address space
    pub name: String,
    /// The kind of address space this represents
    pub kind: AddressSpaceKind,
    /// Offset width in bits (8..=64)
    pub bits: u8,
}

impl AddressSpace {
    /// Create a new AddressSpace.
    ///
    /// # Errors
    /// Returns an error if the name is blank or `bits` is outside 8..=64.
    pub fn new(id: u16, name: &str, kind: AddressSpaceKind, bits: u8) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(XrefError::Config(
                "address space name cannot be empty".to_string(),
            ));
        }
        if !(8..=64).contains(&bits) {
            return Err(XrefError::Config(format!(
                "address space '{}' has unsupported width of {} bits",
                name, bits
            )));
        }
        Ok(AddressSpace {
            id,
            name: name.to_string(),
            kind,
            bits,
        })
    }

    /// Largest valid offset in this space.
    pub fn max_offset(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    pub fn is_memory(&self) -> bool {
        self.kind.is_memory()
    }

    /// Hex digits used when rendering offsets in this space.
    pub(crate) fn display_width(&self) -> usize {
        (self.bits as usize).div_ceil(4)
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {}-bit)", self.name, self.kind, self.bits)
    }
}

/// Registry of the address spaces known to a program.
///
/// The first registered memory space becomes the default space used when
/// parsing bare offsets.
#[derive(Debug, Clone, Default)]
pub struct AddressSpaces {
    spaces: Vec<Arc<AddressSpace>>,
    by_name: HashMap<String, usize>,
    default_index: Option<usize>,
}

impl AddressSpaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conventional layout: `ram`, `register`, `stack`, `const`,
    /// `EXTERNAL` and `unique`, with `ram` as the default space.
    pub fn standard(bits: u8) -> Result<Self> {
        let mut spaces = Self::new();
        spaces.register("ram", AddressSpaceKind::Ram, bits)?;
        spaces.register("register", AddressSpaceKind::Register, 32)?;
        spaces.register("stack", AddressSpaceKind::Stack, bits)?;
        spaces.register("const", AddressSpaceKind::Constant, 64)?;
        spaces.register("EXTERNAL", AddressSpaceKind::External, 32)?;
        spaces.register("unique", AddressSpaceKind::Unique, 32)?;
        Ok(spaces)
    }

    /// Register a new space and return a shared handle to it.
    pub fn register(
        &mut self,
        name: &str,
        kind: AddressSpaceKind,
        bits: u8,
    ) -> Result<Arc<AddressSpace>> {
        if self.by_name.contains_key(name) {
            return Err(XrefError::DuplicateAddressSpace(name.to_string()));
        }
        let id = u16::try_from(self.spaces.len())
            .map_err(|_| XrefError::Config("too many address spaces".to_string()))?;
        let space = Arc::new(AddressSpace::new(id, name, kind, bits)?);
        let index = self.spaces.len();
        self.spaces.push(Arc::clone(&space));
        self.by_name.insert(name.to_string(), index);
        if self.default_index.is_none() && kind.is_memory() {
            self.default_index = Some(index);
        }
        Ok(space)
    }

    /// Look up a space by name.
    pub fn get(&self, name: &str) -> Option<Arc<AddressSpace>> {
        self.by_name
            .get(name)
            .map(|&index| Arc::clone(&self.spaces[index]))
    }

    /// Look up a space by name, failing when it is unknown.
    pub fn require(&self, name: &str) -> Result<Arc<AddressSpace>> {
        self.get(name)
            .ok_or_else(|| XrefError::UnknownAddressSpace(name.to_string()))
    }

    pub fn by_id(&self, id: u16) -> Option<Arc<AddressSpace>> {
        self.spaces.get(id as usize).cloned()
    }

    pub fn default_space(&self) -> Option<Arc<AddressSpace>> {
        self.default_index.map(|index| Arc::clone(&self.spaces[index]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AddressSpace>> {
        self.spaces.iter()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Parse `space:offset` or a bare offset in the default space.
    ///
    /// Offsets are hexadecimal with or without a `0x` prefix.
    pub fn parse_address(&self, text: &str) -> Result<Address> {
        let parse_err = |message: &str| XrefError::AddressParse {
            input: text.to_string(),
            message: message.to_string(),
        };
        let trimmed = text.trim();
        let (space, offset_text) = match trimmed.rsplit_once(':') {
            Some((name, rest)) => (self.require(name)?, rest),
            None => (
                self.default_space()
                    .ok_or_else(|| parse_err("no default memory space registered"))?,
                trimmed,
            ),
        };
        let digits = offset_text
            .strip_prefix("0x")
            .or_else(|| offset_text.strip_prefix("0X"))
            .unwrap_or(offset_text);
        if digits.is_empty() {
            return Err(parse_err("missing offset"));
        }
        let offset = u64::from_str_radix(digits, 16).map_err(|e| parse_err(&e.to_string()))?;
        Address::new(space, offset)
    }
}
