//! Reference type for representing cross-references in binary analysis.
//!
//! A Reference is a directed edge from a code unit to a destination address.
//! Destinations may live in any address space; only references whose
//! destination is a memory address are eligible for memory navigation.

use serde::{Deserialize, Serialize};

use crate::core::address::Address;
use crate::error::{Result, XrefError};

/// Enum representing the kind of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Unconditional function call
    Call,
    /// Conditional function call
    ConditionalCall,
    /// Unconditional jump
    Jump,
    /// Conditional branch
    ConditionalJump,
    /// Flow into the next unit
    Fallthrough,
    /// Memory read
    Read,
    /// Memory write
    Write,
    /// Memory read and write
    ReadWrite,
    /// Plain data pointer
    Data,
    /// Parameter passed to a call
    Param,
    /// Indirect flow through a pointer
    Indirection,
    /// Thunk to another function
    Thunk,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &str {
        match self {
            ReferenceKind::Call => "call",
            ReferenceKind::ConditionalCall => "conditional_call",
            ReferenceKind::Jump => "jump",
            ReferenceKind::ConditionalJump => "conditional_jump",
            ReferenceKind::Fallthrough => "fallthrough",
            ReferenceKind::Read => "read",
            ReferenceKind::Write => "write",
            ReferenceKind::ReadWrite => "read_write",
            ReferenceKind::Data => "data",
            ReferenceKind::Param => "param",
            ReferenceKind::Indirection => "indirection",
            ReferenceKind::Thunk => "thunk",
        }
    }

    /// Control-flow references (calls, jumps, fallthrough, thunks).
    pub fn is_flow(&self) -> bool {
        matches!(
            self,
            ReferenceKind::Call
                | ReferenceKind::ConditionalCall
                | ReferenceKind::Jump
                | ReferenceKind::ConditionalJump
                | ReferenceKind::Fallthrough
                | ReferenceKind::Indirection
                | ReferenceKind::Thunk
        )
    }

    pub fn is_data(&self) -> bool {
        !self.is_flow()
    }
}

/// Who created a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceType {
    /// Created by the disassembler
    #[default]
    Default,
    /// Created by an analysis pass
    Analysis,
    /// Read from the program file
    Imported,
    /// Created by hand
    UserDefined,
}

/// Represents a cross-reference from a code unit to another address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Address inside the unit the reference originates from
    pub from: Address,
    /// Destination of the reference
    pub to: Address,
    /// Kind of the reference (e.g., Call, Read, etc.)
    pub kind: ReferenceKind,
    /// Who produced this reference
    #[serde(default)]
    pub source: SourceType,
    /// Operand the reference was derived from, `None` for mnemonic references
    #[serde(default)]
    pub operand_index: Option<u8>,
    /// Whether this is the primary reference of its operand
    #[serde(default)]
    pub primary: bool,
}

impl Reference {
    /// Create a new reference with default source and no operand.
    pub fn new(from: Address, to: Address, kind: ReferenceKind) -> Self {
        Reference {
            from,
            to,
            kind,
            source: SourceType::Default,
            operand_index: None,
            primary: false,
        }
    }

    pub fn with_source(mut self, source: SourceType) -> Self {
        self.source = source;
        self
    }

    pub fn with_operand(mut self, operand_index: u8, primary: bool) -> Self {
        self.operand_index = Some(operand_index);
        self.primary = primary;
        self
    }

    pub fn origin(&self) -> &Address {
        &self.from
    }

    pub fn to_address(&self) -> &Address {
        &self.to
    }

    /// Whether the destination is an address in program memory rather than a
    /// register, stack slot, constant or external location.
    pub fn is_memory_destination(&self) -> bool {
        self.to.is_memory()
    }

    /// Validate the reference.
    pub fn validate(&self) -> Result<()> {
        if !self.from.is_memory() {
            return Err(XrefError::InvalidRange(format!(
                "reference source {} is not a memory address",
                self.from
            )));
        }
        if self.primary && self.operand_index.is_none() {
            return Err(XrefError::InvalidRange(format!(
                "primary reference at {} has no operand",
                self.from
            )));
        }
        Ok(())
    }

    /// Serialize to JSON string
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| XrefError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON string
    pub fn from_json_string(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| XrefError::Serialization(e.to_string()))
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.kind.as_str())
    }
}
