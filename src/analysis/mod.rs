//! Analysis over program listings.
//!
//! `listing` defines the unit index that walks consult and an immutable
//! snapshot implementation of it; `forward_refs` gathers the memory targets
//! of the units in a selection.

pub mod forward_refs;
pub mod listing;
