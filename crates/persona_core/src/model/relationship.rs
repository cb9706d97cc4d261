//! Relationship records and the per-person relationship store.
//!
//! # Responsibility
//! - Own the ordered relationship list of one person record.
//! - Gate which documents may become relationship targets.
//!
//! # Invariants
//! - Relationship ids are unique within one store.
//! - At most one relationship per target document.
//! - Targets are journal-entry level references, never pages.

use crate::error::ValidationError;
use crate::model::document::{Document, DocumentKind, DocumentRef};
use crate::model::new_record_id;
use serde::{Deserialize, Serialize};

/// Journal sheet types that may be linked as relationships.
pub const SUPPORTED_RELATIONSHIP_SHEETS: &[&str] =
    &["organization", "person", "place", "shop", "quest", "poi"];

/// Directed, weakly referenced link from a person to another journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub target_ref: DocumentRef,
    /// Free-form relationship kind ("ally", "sister", ...). Empty by default.
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub note: String,
    /// Hidden from players.
    #[serde(default)]
    pub hidden: bool,
}

/// Ordered relationship list owned by one person record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipStore {
    entries: Vec<Relationship>,
}

impl RelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a relationship to `target` with a freshly generated id.
    ///
    /// `owner` is the person document holding this store.
    ///
    /// # Errors
    /// - `UnsupportedRelationshipTarget` when `target` is not a journal entry
    ///   with a supported sheet type.
    /// - `SelfRelationship` when `target` is `owner`.
    /// - `DuplicateRelationship` when `target` is already linked.
    pub fn add(
        &mut self,
        owner: &DocumentRef,
        target: &Document,
    ) -> Result<Relationship, ValidationError> {
        let target_ref = &target.doc_ref;
        let supported = target_ref.kind() == DocumentKind::JournalEntry
            && target
                .sheet_type
                .as_deref()
                .is_some_and(|sheet| SUPPORTED_RELATIONSHIP_SHEETS.contains(&sheet));
        if !supported {
            return Err(ValidationError::UnsupportedRelationshipTarget(
                target_ref.clone(),
            ));
        }
        if target_ref == owner {
            return Err(ValidationError::SelfRelationship(target_ref.clone()));
        }
        if self.find_by_target(target_ref).is_some() {
            return Err(ValidationError::DuplicateRelationship(target_ref.clone()));
        }

        let mut id = new_record_id();
        while self.get(&id).is_some() {
            id = new_record_id();
        }

        let relationship = Relationship {
            id,
            target_ref: target_ref.clone(),
            kind: String::new(),
            note: String::new(),
            hidden: false,
        };
        self.entries.push(relationship.clone());
        Ok(relationship)
    }

    /// Removes by id. Missing ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Removes the relationship pointing at `target`, if any.
    pub fn remove_by_target(&mut self, target: &DocumentRef) -> Option<Relationship> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.target_ref == target)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Relationship> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }

    pub fn find_by_target(&self, target: &DocumentRef) -> Option<&Relationship> {
        self.entries.iter().find(|entry| &entry.target_ref == target)
    }

    /// Flips the hidden flag. Returns the new value, `None` for unknown ids.
    pub fn toggle_hidden(&mut self, id: &str) -> Option<bool> {
        let entry = self.get_mut(id)?;
        entry.hidden = !entry.hidden;
        Some(entry.hidden)
    }

    /// Relationships in insertion order.
    pub fn list(&self) -> &[Relationship] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Relationship>> for RelationshipStore {
    fn from(entries: Vec<Relationship>) -> Self {
        Self { entries }
    }
}
