//! Submit payload reconciliation.
//!
//! # Responsibility
//! - Merge partial sheet submissions onto the current person record.
//!
//! # Invariants
//! - Attributes merge per key; absent keys keep their current value.
//! - Relationship edits merge per field by relationship id; edits for ids not
//!   present in the current record are dropped.
//! - Every other present top-level field replaces the current value; an
//!   explicit `actor: null` clears the link.
//! - A submitted `schemaVersion` is ignored; migration owns the version.
//! - The current record is never mutated; a new record is returned.

use crate::model::actor_link::ActorRef;
use crate::model::offering::OfferingWorkflow;
use crate::model::person::{AttributeKey, AttributeValue, PersonRecord};
use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Partial edit of one relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelationshipPatch {
    pub kind: Option<String>,
    pub note: Option<String>,
    pub hidden: Option<bool>,
}

/// Partial person record as submitted by the sheet form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonPatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub attributes: Option<BTreeMap<AttributeKey, AttributeValue>>,
    pub attribute_visibility: Option<BTreeMap<AttributeKey, bool>>,
    /// Relationship edits keyed by relationship id.
    pub relationships: Option<BTreeMap<String, RelationshipPatch>>,
    /// `Some(None)` when the payload sets `actor` to null.
    #[serde(deserialize_with = "present")]
    pub actor: Option<Option<ActorRef>>,
    pub currency: Option<BTreeMap<String, f64>>,
    pub offerings: Option<OfferingWorkflow>,
    /// Accepted so it does not land in `extra`; never applied.
    pub schema_version: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PersonPatch {
    /// Decodes the host's nested submit payload.
    pub fn from_json(payload: &Value) -> Result<Self, serde_json::Error> {
        PersonPatch::deserialize(payload)
    }
}

/// Distinguishes an explicit null from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Merges `incoming` onto `current`.
pub fn reconcile(current: &PersonRecord, incoming: &PersonPatch) -> PersonRecord {
    let mut next = current.clone();

    if let Some(attributes) = &incoming.attributes {
        for (key, value) in attributes {
            next.attributes.insert(key.clone(), value.clone());
        }
    }

    if let Some(edits) = &incoming.relationships {
        for (id, edit) in edits {
            let Some(relationship) = next.relationships.get_mut(id) else {
                debug!(
                    "event=person_submit module=service status=skip reason=unknown_relationship id={}",
                    id
                );
                continue;
            };
            if let Some(kind) = &edit.kind {
                relationship.kind = kind.clone();
            }
            if let Some(note) = &edit.note {
                relationship.note = note.clone();
            }
            if let Some(hidden) = edit.hidden {
                relationship.hidden = hidden;
            }
        }
    }

    if let Some(name) = &incoming.name {
        next.name = name.clone();
    }
    if let Some(image) = &incoming.image {
        next.image = image.clone();
    }
    if let Some(visibility) = &incoming.attribute_visibility {
        next.attribute_visibility = visibility.clone();
    }
    match &incoming.actor {
        Some(Some(actor)) => {
            next.actor_link.link(actor.clone());
        }
        Some(None) => {
            next.actor_link.unlink();
            next.undecoded.actor = None;
        }
        None => {}
    }
    if let Some(currency) = &incoming.currency {
        next.currency = currency.clone();
        next.undecoded.currency.clear();
    }
    if let Some(offerings) = &incoming.offerings {
        next.offerings = offerings.clone();
    }
    for (key, value) in &incoming.extra {
        next.extra.insert(key.clone(), value.clone());
    }

    next
}
