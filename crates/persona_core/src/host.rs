//! Collaborator contracts supplied by the host environment.
//!
//! # Responsibility
//! - Describe permission checks and random name tables as explicit interfaces.
//! - Provide simple implementations for the FFI layer and tests.
//!
//! # Invariants
//! - Core code never reaches for ambient host globals; collaborators are
//!   passed into each call.

use crate::model::document::DocumentRef;
use std::collections::BTreeMap;

/// Viewer permission level on a document, ordered from least to most access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    None,
    Limited,
    Observer,
    Owner,
}

impl PermissionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Limited => "limited",
            Self::Observer => "observer",
            Self::Owner => "owner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "limited" => Some(Self::Limited),
            "observer" => Some(Self::Observer),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

/// Answers "what may the current viewer do with this document".
pub trait PermissionOracle {
    fn level(&self, entity: &DocumentRef) -> PermissionLevel;

    fn has_at_least(&self, entity: &DocumentRef, level: PermissionLevel) -> bool {
        self.level(entity) >= level
    }
}

/// Fixed viewer level with optional per-document overrides.
#[derive(Debug, Clone)]
pub struct StaticPermissionOracle {
    default_level: PermissionLevel,
    overrides: BTreeMap<DocumentRef, PermissionLevel>,
}

impl StaticPermissionOracle {
    pub fn new(default_level: PermissionLevel) -> Self {
        Self {
            default_level,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, entity: DocumentRef, level: PermissionLevel) -> Self {
        self.overrides.insert(entity, level);
        self
    }
}

impl PermissionOracle for StaticPermissionOracle {
    fn level(&self, entity: &DocumentRef) -> PermissionLevel {
        self.overrides
            .get(entity)
            .copied()
            .unwrap_or(self.default_level)
    }
}

/// Handle to a random name table found by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTable {
    pub id: String,
    pub name: String,
}

/// External random-draw service for name tables.
pub trait NameTableProvider {
    /// Whether any name table pack is installed.
    fn is_available(&self) -> bool;

    /// Finds a table by exact display name.
    fn find_table(&self, name: &str) -> Option<NameTable>;

    /// Finds a table by display name ignoring ASCII case.
    fn find_table_ignore_case(&self, name: &str) -> Option<NameTable>;

    /// Draws one result; `None` when the table yields nothing.
    fn draw(&self, table: &NameTable) -> Option<String>;
}
