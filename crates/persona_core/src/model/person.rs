//! Person record: the root entity owned by a person journal entry.
//!
//! # Invariants
//! - Every key in `attribute_visibility` is declared by the current attribute
//!   schema once the record went through migration.
//! - Attribute keys unknown to the schema are kept inert in `attributes`.

use crate::model::actor_link::ActorLink;
use crate::model::offering::OfferingWorkflow;
use crate::model::relationship::RelationshipStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute key as declared by the attribute schema.
pub type AttributeKey = String;

/// Attribute values are JSON scalars; strings in the current layout.
pub type AttributeValue = Value;

/// Canonical person record persisted in the journal entry body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub attributes: BTreeMap<AttributeKey, AttributeValue>,
    /// Per-key "shown" flag, independent of the value.
    #[serde(default)]
    pub attribute_visibility: BTreeMap<AttributeKey, bool>,
    #[serde(default)]
    pub relationships: RelationshipStore,
    #[serde(default, rename = "actor")]
    pub actor_link: ActorLink,
    #[serde(default)]
    pub currency: BTreeMap<String, f64>,
    #[serde(default)]
    pub offerings: OfferingWorkflow,
    /// Attribute layout version this record was normalized to.
    #[serde(default)]
    pub schema_version: u32,
    /// Top-level keys this version does not interpret; kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
    /// Persisted values that failed to decode. Not part of any view.
    #[serde(skip)]
    pub undecoded: UndecodedSections,
}

/// Raw persisted values this version could not decode, written back untouched
/// so a load never destroys data it does not understand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndecodedSections {
    /// Non-object `attributes` value.
    pub attributes: Option<Value>,
    pub relationships: Vec<Value>,
    pub offerings: Vec<Value>,
    pub actor: Option<Value>,
    /// Non-numeric currency amounts.
    pub currency: BTreeMap<String, Value>,
}

impl UndecodedSections {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_none()
            && self.relationships.is_empty()
            && self.offerings.is_empty()
            && self.actor.is_none()
            && self.currency.is_empty()
    }
}

impl PersonRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute rendered as text; `None` when absent or blank.
    pub fn attribute_text(&self, key: &str) -> Option<String> {
        let text = match self.attributes.get(key)? {
            Value::String(value) => value.trim().to_string(),
            Value::Number(value) => value.to_string(),
            Value::Bool(value) => value.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<AttributeKey>, value: impl Into<String>) {
        self.attributes
            .insert(key.into(), Value::String(value.into()));
    }

    /// Whether the attribute is marked shown. Unknown keys are hidden.
    pub fn is_attribute_shown(&self, key: &str) -> bool {
        self.attribute_visibility.get(key).copied().unwrap_or(false)
    }

    /// Replaces the display name; blank names are ignored.
    pub fn apply_name(&mut self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.name = trimmed.to_string();
        true
    }

    /// Sets one currency amount.
    pub fn set_currency(&mut self, currency_id: impl Into<String>, amount: f64) {
        let currency_id = currency_id.into();
        self.undecoded.currency.remove(&currency_id);
        self.currency.insert(currency_id, amount);
    }

    /// Persistable body: the record plus every undecoded section.
    ///
    /// Raw `attributes` survive only while no attribute was set, and a raw
    /// `actor` only while no actor is linked.
    pub fn to_body(&self) -> Result<Value, serde_json::Error> {
        let mut body = serde_json::to_value(self)?;
        if self.undecoded.is_empty() {
            return Ok(body);
        }
        let Some(object) = body.as_object_mut() else {
            return Ok(body);
        };

        if let Some(raw) = &self.undecoded.attributes {
            if self.attributes.is_empty() {
                object.insert("attributes".to_string(), raw.clone());
            }
        }
        if let Some(raw) = &self.undecoded.actor {
            if !self.actor_link.is_linked() {
                object.insert("actor".to_string(), raw.clone());
            }
        }
        append_raw(object, "relationships", &self.undecoded.relationships);
        append_raw(object, "offerings", &self.undecoded.offerings);
        if let Some(Value::Object(currency)) = object.get_mut("currency") {
            for (key, raw) in &self.undecoded.currency {
                currency.entry(key.clone()).or_insert_with(|| raw.clone());
            }
        }
        Ok(body)
    }
}

fn append_raw(object: &mut serde_json::Map<String, Value>, section: &str, raw: &[Value]) {
    if raw.is_empty() {
        return;
    }
    if let Some(Value::Array(entries)) = object.get_mut(section) {
        entries.extend(raw.iter().cloned());
    }
}
