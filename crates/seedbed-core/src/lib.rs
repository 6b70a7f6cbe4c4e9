//! Core contracts shared across seedbed crates.
//!
//! Defines the in-memory table model (`Table`, `Row`, `Value`), the running
//! per-column occurrence tally used for ordinal derivation (`CountReport`),
//! and the error taxonomy every pipeline stage reports through.

pub mod count;
pub mod error;
pub mod redaction;
pub mod table;
pub mod value;

pub use count::{CountDeltas, CountReport};
pub use error::{Error, Result};
pub use redaction::redact_secret;
pub use table::{Row, Table};
pub use value::Value;
