//! Attribute layout migration for persisted person records.
//!
//! # Responsibility
//! - Decode a persisted person body in any known attribute layout.
//! - Normalize it to the current layout and report whether it must be written
//!   back to the document store.
//!
//! # Invariants
//! - Layout detection is an explicit decode in fixed priority order:
//!   versioned objects, then legacy fields, then current.
//! - Migration never fails; unrecognized shapes pass through unconverted.
//! - After migration every `attribute_visibility` key is a schema field id.

use crate::model::actor_link::ActorRef;
use crate::model::document::{DocumentKind, DocumentRef};
use crate::model::offering::Offering;
use crate::model::person::PersonRecord;
use crate::model::relationship::Relationship;
use crate::schema::fields::AttributeSchema;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Layout version of records that still carry a legacy `fields` map.
pub const LEGACY_FIELDS_VERSION: u32 = 0;

/// Attribute layout detected on load.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeLayout {
    /// `attributes` entries embed visibility as `{value, hidden}`.
    Versioned(Map<String, Value>),
    /// No `attributes` map; a legacy `fields` map describes visibility.
    LegacyFields(Map<String, Value>),
    /// Already in the current layout (or nothing to convert).
    Current(Map<String, Value>),
}

impl AttributeLayout {
    /// Decodes the attribute layout of a persisted body.
    pub fn decode(body: &Map<String, Value>) -> Self {
        match body.get("attributes") {
            Some(Value::Object(attributes)) => {
                if attributes.values().any(is_versioned_entry) {
                    Self::Versioned(attributes.clone())
                } else {
                    Self::Current(attributes.clone())
                }
            }
            _ => match body.get("fields") {
                Some(Value::Object(fields)) => Self::LegacyFields(fields.clone()),
                _ => Self::Current(Map::new()),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Versioned(_) => "versioned",
            Self::LegacyFields(_) => "legacy_fields",
            Self::Current(_) => "current",
        }
    }
}

/// Result of loading a persisted person body.
#[derive(Debug, Clone, PartialEq)]
pub struct MigratedRecord {
    pub record: PersonRecord,
    /// The normalized record differs from what is persisted.
    pub write_back: bool,
}

/// Normalizes a persisted person body to the current layout.
pub fn migrate(schema: &AttributeSchema, raw: &Value) -> MigratedRecord {
    let empty = Map::new();
    let body = raw.as_object().unwrap_or(&empty);
    let layout = AttributeLayout::decode(body);
    let layout_label = layout.label();

    let (mut record, mut write_back) = decode_sections(body);
    if let Some(raw) = body
        .get("attributes")
        .filter(|value| !value.is_object() && !value.is_null())
    {
        warn!("event=person_migrate module=schema status=skip reason=attributes_not_a_map");
        record.undecoded.attributes = Some(raw.clone());
    }

    match layout {
        AttributeLayout::Versioned(attributes) => {
            for (key, value) in attributes {
                match split_versioned_entry(&value) {
                    Some((inner, shown)) => {
                        record.attributes.insert(key.clone(), inner);
                        record.attribute_visibility.insert(key, shown);
                    }
                    None => {
                        record.attributes.insert(key, value);
                    }
                }
            }
            write_back = true;
        }
        AttributeLayout::LegacyFields(fields) => {
            for field in schema.current_fields() {
                let legacy_keys = std::iter::once(field.id).chain(field.aliases.iter().copied());
                let flat = legacy_keys
                    .clone()
                    .find_map(|key| body.get(key).filter(|value| is_scalar(value)).cloned());
                let entry = legacy_keys.clone().find_map(|key| fields.get(key));

                let value = flat
                    .or_else(|| entry.filter(|value| is_scalar(value)).cloned())
                    .unwrap_or_else(|| Value::String(String::new()));
                record.attributes.insert(field.id.to_string(), value);

                if let Some(entry) = entry {
                    let shown = match entry {
                        Value::Object(object) => object.get("value").is_some_and(is_truthy),
                        other => is_truthy(other),
                    };
                    record
                        .attribute_visibility
                        .insert(field.id.to_string(), shown);
                }
            }
            record.extra.remove("fields");
            for field in schema.current_fields() {
                record.extra.remove(field.id);
                for alias in field.aliases {
                    record.extra.remove(*alias);
                }
            }
            write_back = true;
        }
        AttributeLayout::Current(attributes) => {
            record.attributes.extend(attributes);
        }
    }

    write_back |= rename_aliases(schema, &mut record);
    write_back |= drop_stale_visibility(schema, &mut record);

    if record.schema_version != schema.version() {
        record.schema_version = schema.version();
        write_back = true;
    }

    if write_back {
        info!(
            "event=person_migrate module=schema status=ok layout={} attributes={} write_back=true",
            layout_label,
            record.attributes.len()
        );
    }

    MigratedRecord { record, write_back }
}

fn is_versioned_entry(value: &Value) -> bool {
    match value {
        Value::Object(object) => object.contains_key("value") || object.contains_key("hidden"),
        _ => false,
    }
}

fn split_versioned_entry(value: &Value) -> Option<(Value, bool)> {
    if !is_versioned_entry(value) {
        return None;
    }
    let object = value.as_object()?;
    let inner = object
        .get("value")
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));
    let hidden = object.get("hidden").is_some_and(is_truthy);
    Some((inner, !hidden))
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn rename_aliases(schema: &AttributeSchema, record: &mut PersonRecord) -> bool {
    let mut changed = false;

    let alias_keys: Vec<String> = record
        .attributes
        .keys()
        .filter(|key| schema.resolve_alias(key).is_some())
        .cloned()
        .collect();
    for alias in alias_keys {
        let Some(target) = schema.resolve_alias(&alias) else {
            continue;
        };
        if record.attribute_text(target).is_some() {
            // Current key wins; the alias stays inert.
            continue;
        }
        if let Some(value) = record.attributes.remove(&alias) {
            record.attributes.insert(target.to_string(), value);
            changed = true;
        }
    }

    let alias_flags: Vec<String> = record
        .attribute_visibility
        .keys()
        .filter(|key| schema.resolve_alias(key).is_some())
        .cloned()
        .collect();
    for alias in alias_flags {
        let Some(target) = schema.resolve_alias(&alias) else {
            continue;
        };
        if let Some(shown) = record.attribute_visibility.remove(&alias) {
            record
                .attribute_visibility
                .entry(target.to_string())
                .or_insert(shown);
            changed = true;
        }
    }

    changed
}

fn drop_stale_visibility(schema: &AttributeSchema, record: &mut PersonRecord) -> bool {
    let before = record.attribute_visibility.len();
    record.attribute_visibility.retain(|key, _| {
        let known = schema.contains(key);
        if !known {
            warn!(
                "event=person_migrate module=schema status=skip reason=unknown_visibility_key key={}",
                key
            );
        }
        known
    });
    before != record.attribute_visibility.len()
}

/// Decodes every non-attribute section independently so one malformed section
/// cannot take the whole record down. Entries that do not decode are kept in
/// `record.undecoded` and written back untouched.
///
/// Returns the record and whether a legacy section shape was converted.
fn decode_sections(body: &Map<String, Value>) -> (PersonRecord, bool) {
    let mut record = PersonRecord::default();
    let mut converted = false;

    if let Some(Value::String(name)) = body.get("name") {
        record.name = name.clone();
    }
    if let Some(Value::String(image)) = body.get("image") {
        record.image = image.clone();
    }

    if let Some(Value::Object(flags)) = body.get("attributeVisibility") {
        for (key, value) in flags {
            // Older sheet settings stored `{shown: bool}` per key.
            let shown = match value {
                Value::Object(object) => object.get("shown").is_some_and(is_truthy),
                other => is_truthy(other),
            };
            record.attribute_visibility.insert(key.clone(), shown);
        }
    }

    let (relationships, raw_relationships) = decode_list::<Relationship>(body, "relationships");
    record.relationships = relationships.into();
    record.undecoded.relationships = raw_relationships;

    let (offerings, raw_offerings) = decode_list::<Offering>(body, "offerings");
    record.offerings = offerings.into();
    record.undecoded.offerings = raw_offerings;

    match body.get("actor") {
        None | Some(Value::Null) => {}
        Some(Value::String(uuid)) => match actor_from_uuid(uuid) {
            // Early records stored only the actor uuid.
            Some(actor) => {
                record.actor_link.link(actor);
                converted = true;
            }
            None => record.undecoded.actor = Some(Value::String(uuid.clone())),
        },
        Some(value) => match decode_section::<ActorRef>("actor", value) {
            Some(actor) => {
                record.actor_link.link(actor);
            }
            None => record.undecoded.actor = Some(value.clone()),
        },
    }

    if let Some(Value::Object(currency)) = body.get("currency") {
        for (key, value) in currency {
            match value.as_f64() {
                Some(amount) => {
                    record.currency.insert(key.clone(), amount);
                }
                None => {
                    record.undecoded.currency.insert(key.clone(), value.clone());
                }
            }
        }
    }

    record.schema_version = body
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .and_then(|version| u32::try_from(version).ok())
        .unwrap_or(LEGACY_FIELDS_VERSION);

    const KNOWN: &[&str] = &[
        "name",
        "image",
        "attributes",
        "attributeVisibility",
        "relationships",
        "actor",
        "currency",
        "offerings",
        "schemaVersion",
    ];
    record.extra = body
        .iter()
        .filter(|(key, _)| !KNOWN.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    (record, converted)
}

/// Snapshot placeholder for an actor stored as a bare uuid. Name and image
/// are filled from the live actor document on load.
fn actor_from_uuid(uuid: &str) -> Option<ActorRef> {
    let doc_ref = DocumentRef::parse(uuid.trim()).ok()?;
    if doc_ref.kind() != DocumentKind::Actor {
        return None;
    }
    Some(ActorRef {
        id: doc_ref.id().to_string(),
        name: String::new(),
        img: String::new(),
    })
}

fn decode_list<T: DeserializeOwned>(
    body: &Map<String, Value>,
    section: &str,
) -> (Vec<T>, Vec<Value>) {
    let mut decoded = Vec::new();
    let mut raw = Vec::new();
    if let Some(Value::Array(entries)) = body.get(section) {
        for entry in entries {
            match decode_section::<T>(section, entry) {
                Some(value) => decoded.push(value),
                None => raw.push(entry.clone()),
            }
        }
    }
    (decoded, raw)
}

fn decode_section<T: DeserializeOwned>(section: &str, value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            warn!(
                "event=person_load module=schema status=skip reason=undecodable_section section={} error={}",
                section, err
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{migrate, AttributeLayout};
    use crate::schema::fields::{AttributeSchema, CURRENT_SCHEMA_VERSION};
    use serde_json::json;

    #[test]
    fn decode_prefers_versioned_over_legacy_fields() {
        let body = json!({
            "attributes": {"race": {"value": "Elf", "hidden": false}},
            "fields": {"race": {"value": true}}
        });
        let layout = AttributeLayout::decode(body.as_object().unwrap());
        assert_eq!(layout.label(), "versioned");

        let body = json!({"fields": {"race": {"value": true}}});
        let layout = AttributeLayout::decode(body.as_object().unwrap());
        assert_eq!(layout.label(), "legacy_fields");

        let body = json!({"attributes": {"race": "Elf"}});
        let layout = AttributeLayout::decode(body.as_object().unwrap());
        assert_eq!(layout.label(), "current");
    }

    #[test]
    fn versioned_entries_split_into_value_and_visibility() {
        let schema = AttributeSchema::person();
        let raw = json!({
            "name": "Ada",
            "attributes": {
                "race": {"value": "Elf", "hidden": false},
                "gender": {"value": "Female", "hidden": true},
                "age": "120"
            },
            "schemaVersion": 1
        });

        let migrated = migrate(&schema, &raw);
        let record = migrated.record;
        assert!(migrated.write_back);
        assert_eq!(record.attributes["race"], "Elf");
        assert_eq!(record.attributes["gender"], "Female");
        assert_eq!(record.attributes["age"], "120");
        assert_eq!(record.attribute_visibility.get("race"), Some(&true));
        assert_eq!(record.attribute_visibility.get("gender"), Some(&false));
        assert_eq!(record.attribute_visibility.get("age"), None);
        assert_eq!(record.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn unrecognized_object_entries_pass_through() {
        let schema = AttributeSchema::person();
        let raw = json!({
            "attributes": {
                "race": {"value": "Elf"},
                "custom": {"color": "red"}
            }
        });

        let record = migrate(&schema, &raw).record;
        assert_eq!(record.attributes["race"], "Elf");
        assert_eq!(record.attributes["custom"], json!({"color": "red"}));
        assert_eq!(record.attribute_visibility.get("race"), Some(&true));
        assert!(!record.attribute_visibility.contains_key("custom"));
    }

    #[test]
    fn legacy_fields_convert_for_every_schema_key() {
        let schema = AttributeSchema::person();
        let raw = json!({
            "fields": {
                "race": {"value": true},
                "gender": {"value": false},
                "hair": "Red"
            },
            "race": "Dwarf"
        });

        let migrated = migrate(&schema, &raw);
        let record = migrated.record;
        assert!(migrated.write_back);
        for field in schema.current_fields() {
            assert!(record.attributes.contains_key(field.id), "missing {}", field.id);
        }
        assert_eq!(record.attributes["race"], "Dwarf");
        assert_eq!(record.attributes["hair"], "Red");
        assert_eq!(record.attributes["eyes"], "");
        assert_eq!(record.attribute_visibility.get("race"), Some(&true));
        assert_eq!(record.attribute_visibility.get("gender"), Some(&false));
        assert_eq!(record.attribute_visibility.get("hair"), Some(&true));
        assert_eq!(record.attribute_visibility.get("eyes"), None);
        assert!(!record.extra.contains_key("race"));
        assert!(!record.extra.contains_key("fields"));
    }

    #[test]
    fn aliases_and_stale_visibility_are_normalized() {
        let schema = AttributeSchema::person();
        let raw = json!({
            "attributes": {"ancestry": "Halfling", "mood": "grumpy"},
            "attributeVisibility": {"ancestry": true, "mood": true, "age": {"shown": true}},
            "schemaVersion": 2
        });

        let migrated = migrate(&schema, &raw);
        let record = migrated.record;
        assert!(migrated.write_back);
        assert_eq!(record.attributes["race"], "Halfling");
        assert!(!record.attributes.contains_key("ancestry"));
        assert_eq!(record.attributes["mood"], "grumpy");
        assert_eq!(record.attribute_visibility.get("race"), Some(&true));
        assert_eq!(record.attribute_visibility.get("age"), Some(&true));
        assert!(!record.attribute_visibility.contains_key("mood"));
    }

    #[test]
    fn current_records_need_no_write_back() {
        let schema = AttributeSchema::person();
        let raw = json!({
            "name": "Ada",
            "attributes": {"race": "Elf"},
            "attributeVisibility": {"race": true},
            "schemaVersion": CURRENT_SCHEMA_VERSION
        });

        let migrated = migrate(&schema, &raw);
        assert!(!migrated.write_back);
        assert_eq!(migrated.record.name, "Ada");

        let again = migrate(&schema, &serde_json::to_value(&migrated.record).unwrap());
        assert!(!again.write_back);
        assert_eq!(again.record, migrated.record);
    }

    #[test]
    fn malformed_sections_do_not_fail_migration() {
        let schema = AttributeSchema::person();
        let raw = json!({
            "name": "Ada",
            "attributes": "not a map",
            "relationships": [{"id": "r1"}, {"id": "r2", "targetRef": "JournalEntry.t2"}],
            "actor": 42,
            "currency": {"gp": 3, "sp": "lots"}
        });

        let record = migrate(&schema, &raw).record;
        assert_eq!(record.name, "Ada");
        assert_eq!(record.relationships.len(), 1);
        assert!(!record.actor_link.is_linked());
        assert_eq!(record.currency.get("gp"), Some(&3.0));
        assert!(!record.currency.contains_key("sp"));

        assert_eq!(record.undecoded.attributes, Some(json!("not a map")));
        assert_eq!(record.undecoded.relationships, vec![json!({"id": "r1"})]);
        assert_eq!(record.undecoded.actor, Some(json!(42)));
        assert_eq!(record.undecoded.currency.get("sp"), Some(&json!("lots")));

        let body = record.to_body().unwrap();
        assert_eq!(body["attributes"], "not a map");
        assert_eq!(body["relationships"].as_array().unwrap().len(), 2);
        assert_eq!(body["actor"], 42);
        assert_eq!(body["currency"]["sp"], "lots");
    }

    #[test]
    fn actor_stored_as_uuid_becomes_a_snapshot() {
        let schema = AttributeSchema::person();
        let raw = json!({
            "name": "Ada",
            "actor": "Actor.smith",
            "schemaVersion": CURRENT_SCHEMA_VERSION
        });

        let migrated = migrate(&schema, &raw);
        assert!(migrated.write_back);
        let actor = migrated.record.actor_link.stored().unwrap();
        assert_eq!(actor.id, "smith");
        assert!(actor.name.is_empty());
        assert!(migrated.record.undecoded.actor.is_none());
    }

    #[test]
    fn unparsable_actor_uuid_is_kept_raw() {
        let schema = AttributeSchema::person();
        let raw = json!({"actor": "JournalEntry.abc"});

        let record = migrate(&schema, &raw).record;
        assert!(!record.actor_link.is_linked());
        assert_eq!(record.undecoded.actor, Some(json!("JournalEntry.abc")));
    }

    #[test]
    fn non_object_body_migrates_to_empty_record() {
        let schema = AttributeSchema::person();
        let migrated = migrate(&schema, &json!(null));
        assert!(migrated.write_back);
        assert!(migrated.record.attributes.is_empty());
    }
}
