//! Document persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the document store the core resolves references through.
//! - Isolate SQLite details from service orchestration.
//!
//! # Invariants
//! - Missing documents are `Ok(None)` on reads and `NotFound` on writes.

pub mod document_repo;
pub mod name_tables;
