//! Drop payload decoding and target resolution.
//!
//! # Responsibility
//! - Decode host drag-drop payloads into typed requests.
//! - Resolve what a drop means for a person sheet: link an actor, add a
//!   relationship, or draft an offering.
//!
//! # Invariants
//! - A journal page drop always resolves to its parent journal entry.
//! - Only items embedded in an actor can be offered.
//! - Resolution never writes to the store.

use crate::error::ValidationError;
use crate::model::actor_link::ActorRef;
use crate::model::document::{Document, DocumentKind, DocumentRef};
use crate::model::offering::{OfferedItem, OfferingDraft};
use crate::repo::document_repo::DocumentStore;
use crate::service::person_service::SheetError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Drop payload exactly as sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct RawDropPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(alias = "ref")]
    uuid: String,
}

/// Decoded drop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropRequest {
    pub doc_ref: DocumentRef,
}

impl DropRequest {
    /// Decodes `{ "type": ..., "uuid": ... }` JSON text.
    ///
    /// # Errors
    /// - `MalformedPayload` for invalid JSON or a `type` that disagrees with
    ///   the referenced document kind.
    /// - `UnsupportedDropType` for document types the sheet ignores.
    pub fn parse(payload: &str) -> Result<Self, ValidationError> {
        let raw: RawDropPayload = serde_json::from_str(payload)
            .map_err(|err| ValidationError::MalformedPayload(err.to_string()))?;

        let kind = match DocumentKind::parse(raw.kind.trim()) {
            Some(
                kind @ (DocumentKind::Actor
                | DocumentKind::JournalEntry
                | DocumentKind::JournalEntryPage
                | DocumentKind::Item),
            ) => kind,
            _ => return Err(ValidationError::UnsupportedDropType(raw.kind)),
        };

        let doc_ref = DocumentRef::parse(&raw.uuid)?;
        if doc_ref.kind() != kind {
            return Err(ValidationError::MalformedPayload(format!(
                "drop type `{kind}` does not match reference {doc_ref}"
            )));
        }
        Ok(Self { doc_ref })
    }
}

/// What a drop resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedDrop {
    Actor(Document),
    /// Journal entry to relate; pages are already resolved to their parent.
    Relationship(Document),
    Offering(OfferingDraft),
}

/// Resolves a drop request through the document store.
pub fn resolve_drop<S: DocumentStore>(
    store: &S,
    request: &DropRequest,
) -> Result<ResolvedDrop, SheetError> {
    let doc_ref = &request.doc_ref;
    match doc_ref.kind() {
        DocumentKind::Actor => Ok(ResolvedDrop::Actor(require(store, doc_ref)?)),
        DocumentKind::JournalEntry => Ok(ResolvedDrop::Relationship(require(store, doc_ref)?)),
        DocumentKind::JournalEntryPage => {
            let page = require(store, doc_ref)?;
            let parent = page
                .doc_ref
                .parent()
                .ok_or_else(|| ValidationError::UnresolvedReference(doc_ref.clone()))?;
            Ok(ResolvedDrop::Relationship(require(store, &parent)?))
        }
        DocumentKind::Item => {
            let item = require(store, doc_ref)?;
            let owner = item
                .doc_ref
                .parent()
                .filter(|parent| parent.kind() == DocumentKind::Actor)
                .ok_or_else(|| ValidationError::ItemNotActorOwned(doc_ref.to_string()))?;
            let actor = require(store, &owner)?;
            Ok(ResolvedDrop::Offering(offering_draft(&actor, &item)))
        }
        DocumentKind::RollTable => Err(ValidationError::UnsupportedDropType(
            doc_ref.kind().to_string(),
        )
        .into()),
    }
}

fn offering_draft(actor: &Document, item: &Document) -> OfferingDraft {
    let actor_ref = ActorRef::from_document(actor);
    OfferingDraft {
        items: vec![OfferedItem {
            id: item.doc_ref.id().to_string(),
            item_name: item.name.clone(),
            actor_id: actor_ref.id.clone(),
            actor_name: actor_ref.name.clone(),
            qty: 1,
        }],
        actor: actor_ref,
        currency: BTreeMap::new(),
    }
}

fn require<S: DocumentStore>(store: &S, doc_ref: &DocumentRef) -> Result<Document, SheetError> {
    store
        .get(doc_ref)?
        .ok_or_else(|| ValidationError::UnresolvedReference(doc_ref.clone()).into())
}
