//! Person journal domain model.
//!
//! # Responsibility
//! - Define the canonical shape of a person record and its owned collections.
//! - Define weak references to external documents.
//!
//! # Invariants
//! - A person record owns its attributes, relationships, currency and
//!   offerings; external actors/documents are referenced, never owned.
//! - Record-local ids (relationships, offerings) are unique within the record.

pub mod actor_link;
pub mod document;
pub mod offering;
pub mod person;
pub mod relationship;

use uuid::Uuid;

/// Generates a record-local id for relationships and offerings.
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}
