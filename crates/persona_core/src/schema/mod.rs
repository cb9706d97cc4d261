//! Attribute schema and layout migration.
//!
//! # Responsibility
//! - Own the registry of recognized person attributes.
//! - Convert persisted records from older attribute layouts.
//!
//! # Invariants
//! - Attribute maps stay dynamic; the schema only decides what is displayed
//!   and which visibility keys are legal.

pub mod fields;
pub mod migrate;
