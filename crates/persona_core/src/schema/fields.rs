//! Attribute schema registry and field projections.
//!
//! # Responsibility
//! - Declare the ordered set of recognized person attributes.
//! - Project a record's shown attributes for the sheet.
//! - Declare the currency registry shown next to attributes.
//!
//! # Invariants
//! - Field ids are unique; aliases never collide with field ids.
//! - `fieldlist` only yields fields explicitly marked shown.

use crate::model::person::{AttributeValue, PersonRecord};
use serde::Serialize;
use serde_json::Value;

/// Layout version written by the current migration.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// One declared attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub id: &'static str,
    pub name: &'static str,
    /// Wide layout instead of a single column.
    pub full: bool,
    /// Keys used for this field by earlier layouts.
    pub aliases: &'static [&'static str],
}

const fn field(id: &'static str, name: &'static str, full: bool) -> FieldDef {
    FieldDef {
        id,
        name,
        full,
        aliases: &[],
    }
}

const PERSON_FIELDS: &[FieldDef] = &[
    FieldDef {
        id: "race",
        name: "Race",
        full: false,
        aliases: &["ancestry"],
    },
    field("gender", "Gender", false),
    field("age", "Age", false),
    field("eyes", "Eyes", false),
    field("skin", "Skin", false),
    field("hair", "Hair", false),
    field("life", "Life", false),
    field("profession", "Profession", false),
    field("voice", "Voice", false),
    field("faction", "Faction", false),
    field("height", "Height", false),
    field("weight", "Weight", false),
    field("traits", "Traits", true),
    field("ideals", "Ideals", true),
    field("bonds", "Bonds", true),
    field("flaws", "Flaws", true),
    field("longterm", "Long-term Goals", true),
    field("shortterm", "Short-term Goals", true),
    field("beliefs", "Beliefs", true),
    field("secret", "Secret", true),
];

/// Currency shown on the person sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyDef {
    pub id: &'static str,
    pub name: &'static str,
}

const DEFAULT_CURRENCIES: &[CurrencyDef] = &[
    CurrencyDef { id: "pp", name: "Platinum" },
    CurrencyDef { id: "gp", name: "Gold" },
    CurrencyDef { id: "ep", name: "Electrum" },
    CurrencyDef { id: "sp", name: "Silver" },
    CurrencyDef { id: "cp", name: "Copper" },
];

/// Shown attribute as rendered by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub id: String,
    pub name: String,
    pub value: AttributeValue,
    pub full: bool,
}

/// Currency amount as rendered by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyView {
    pub id: String,
    pub name: String,
    pub value: f64,
}

/// Ordered registry of recognized attribute keys plus display metadata.
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    fields: &'static [FieldDef],
    currencies: &'static [CurrencyDef],
}

impl Default for AttributeSchema {
    fn default() -> Self {
        Self::person()
    }
}

impl AttributeSchema {
    /// Schema used by person journal entries.
    pub fn person() -> Self {
        Self {
            fields: PERSON_FIELDS,
            currencies: DEFAULT_CURRENCIES,
        }
    }

    /// Declared fields in display order.
    pub fn current_fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    pub fn currencies(&self) -> &'static [CurrencyDef] {
        self.currencies
    }

    pub fn version(&self) -> u32 {
        CURRENT_SCHEMA_VERSION
    }

    pub fn field(&self, id: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.field(id).is_some()
    }

    /// Current field id for a legacy alias.
    pub fn resolve_alias(&self, key: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|field| field.aliases.contains(&key))
            .map(|field| field.id)
    }

    /// Shown fields in schema order with their current values.
    ///
    /// Keys missing from `attribute_visibility` are hidden.
    pub fn fieldlist(&self, record: &PersonRecord) -> Vec<FieldView> {
        self.fields
            .iter()
            .filter(|field| record.is_attribute_shown(field.id))
            .map(|field| FieldView {
                id: field.id.to_string(),
                name: field.name.to_string(),
                value: record
                    .attributes
                    .get(field.id)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new())),
                full: field.full,
            })
            .collect()
    }

    /// Currency amounts in registry order; missing values read as zero.
    pub fn currency_view(&self, record: &PersonRecord) -> Vec<CurrencyView> {
        self.currencies
            .iter()
            .map(|currency| CurrencyView {
                id: currency.id.to_string(),
                name: currency.name.to_string(),
                value: record.currency.get(currency.id).copied().unwrap_or(0.0),
            })
            .collect()
    }
}
