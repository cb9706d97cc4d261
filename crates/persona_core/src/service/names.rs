//! Random person name generation from race-scoped name tables.
//!
//! # Invariants
//! - Table lookup order: `<race> First Name`, then `<race> Name` (single part,
//!   no last name), then `Human First Name`; last names come from
//!   `<race> Last Name`, then `Human Last Name`.
//! - Generation never writes; callers apply the returned name themselves.

use crate::host::NameTableProvider;
use crate::model::person::PersonRecord;

/// Race used when the record carries none.
pub const DEFAULT_RACE: &str = "Human";

const GENERIC_FIRST_TABLE: &str = "Human First Name";
const GENERIC_LAST_TABLE: &str = "Human Last Name";

/// Drawn name parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedName {
    pub first: Option<String>,
    pub last: Option<String>,
}

impl GeneratedName {
    /// Display form: parts joined by one space, empty parts skipped.
    pub fn full(&self) -> String {
        [self.first.as_deref(), self.last.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Race key for name tables: `race`, then `ancestry`, then `Human`.
pub fn race_key(record: &PersonRecord) -> String {
    record
        .attribute_text("race")
        .or_else(|| record.attribute_text("ancestry"))
        .unwrap_or_else(|| DEFAULT_RACE.to_string())
}

/// Draws a name for `race`. `None` when no table resolves or every draw is
/// empty.
pub fn generate_name(provider: &dyn NameTableProvider, race: &str) -> Option<GeneratedName> {
    let (first_table, single_part) =
        match provider.find_table_ignore_case(&format!("{race} First Name")) {
            Some(table) => (Some(table), false),
            None => match provider.find_table_ignore_case(&format!("{race} Name")) {
                Some(table) => (Some(table), true),
                None => (provider.find_table(GENERIC_FIRST_TABLE), false),
            },
        };

    let last_table = if single_part {
        None
    } else {
        provider
            .find_table_ignore_case(&format!("{race} Last Name"))
            .or_else(|| provider.find_table(GENERIC_LAST_TABLE))
    };

    let first = first_table.and_then(|table| provider.draw(&table));
    let last = last_table.and_then(|table| provider.draw(&table));
    if first.is_none() && last.is_none() {
        return None;
    }
    Some(GeneratedName { first, last })
}
