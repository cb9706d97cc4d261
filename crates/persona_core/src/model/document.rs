//! Weak document references and the store-facing document envelope.
//!
//! # Responsibility
//! - Parse and format host uuid strings (`<Kind>.<id>` and embedded forms).
//! - Describe what the document store hands back for a reference.
//!
//! # Invariants
//! - A `DocumentRef` never owns the target; resolution always goes through a
//!   store lookup and absence is a normal outcome.
//! - Embedded references only exist as `JournalEntry.<id>.JournalEntryPage.<id>`
//!   and `Actor.<id>.Item.<id>`.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

static DOCUMENT_UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(Actor|JournalEntry|Item|RollTable)\.([A-Za-z0-9_-]+)(?:\.(JournalEntryPage|Item)\.([A-Za-z0-9_-]+))?$",
    )
    .expect("valid document uuid regex")
});

/// Sheet type carried by person journal entries.
pub const PERSON_SHEET_TYPE: &str = "person";

/// Document kinds the core knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Actor,
    JournalEntry,
    JournalEntryPage,
    Item,
    RollTable,
}

impl DocumentKind {
    /// Stable host-side name, also used as the uuid prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actor => "Actor",
            Self::JournalEntry => "JournalEntry",
            Self::JournalEntryPage => "JournalEntryPage",
            Self::Item => "Item",
            Self::RollTable => "RollTable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Actor" => Some(Self::Actor),
            "JournalEntry" => Some(Self::JournalEntry),
            "JournalEntryPage" => Some(Self::JournalEntryPage),
            "Item" => Some(Self::Item),
            "RollTable" => Some(Self::RollTable),
            _ => None,
        }
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-owning reference to an external document, keyed by its host uuid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentRef {
    kind: DocumentKind,
    uuid: String,
}

impl DocumentRef {
    /// Builds a top-level reference (`<Kind>.<id>`).
    ///
    /// Embedded kinds must be built with [`DocumentRef::embedded`].
    pub fn new(kind: DocumentKind, id: &str) -> Result<Self, ValidationError> {
        Self::parse(&format!("{}.{id}", kind.as_str()))
    }

    /// Builds a reference to a document embedded in `parent`.
    pub fn embedded(
        parent: &DocumentRef,
        kind: DocumentKind,
        id: &str,
    ) -> Result<Self, ValidationError> {
        Self::parse(&format!("{}.{}.{id}", parent.uuid, kind.as_str()))
    }

    /// Parses a host uuid string.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        let caps = DOCUMENT_UUID_RE
            .captures(trimmed)
            .ok_or_else(|| ValidationError::MalformedReference(trimmed.to_string()))?;

        let root = caps
            .get(1)
            .and_then(|m| DocumentKind::parse(m.as_str()))
            .ok_or_else(|| ValidationError::MalformedReference(trimmed.to_string()))?;

        let kind = match caps.get(3).map(|m| m.as_str()) {
            None => root,
            Some("JournalEntryPage") if root == DocumentKind::JournalEntry => {
                DocumentKind::JournalEntryPage
            }
            Some("Item") if root == DocumentKind::Actor => DocumentKind::Item,
            Some(_) => return Err(ValidationError::MalformedReference(trimmed.to_string())),
        };

        Ok(Self {
            kind,
            uuid: trimmed.to_string(),
        })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Full host uuid.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Document id (last uuid segment).
    pub fn id(&self) -> &str {
        self.uuid.rsplit('.').next().unwrap_or(self.uuid.as_str())
    }

    /// Containing document for embedded references.
    pub fn parent(&self) -> Option<DocumentRef> {
        let segments: Vec<&str> = self.uuid.split('.').collect();
        if segments.len() != 4 {
            return None;
        }
        let kind = DocumentKind::parse(segments[0])?;
        Some(Self {
            kind,
            uuid: format!("{}.{}", segments[0], segments[1]),
        })
    }
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uuid)
    }
}

impl TryFrom<String> for DocumentRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentRef> for String {
    fn from(value: DocumentRef) -> Self {
        value.uuid
    }
}

/// Document envelope returned by the store.
///
/// `body` is the document's own data; for person journal entries it holds the
/// persisted person record (possibly in a legacy layout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "uuid")]
    pub doc_ref: DocumentRef,
    pub name: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub sheet_type: Option<String>,
    #[serde(default)]
    pub body: Value,
}

impl Document {
    pub fn new(doc_ref: DocumentRef, name: impl Into<String>) -> Self {
        Self {
            doc_ref,
            name: name.into(),
            img: String::new(),
            sheet_type: None,
            body: Value::Null,
        }
    }

    pub fn with_img(mut self, img: impl Into<String>) -> Self {
        self.img = img.into();
        self
    }

    pub fn with_sheet_type(mut self, sheet_type: impl Into<String>) -> Self {
        self.sheet_type = Some(sheet_type.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Whether this is a journal entry rendered with the person sheet.
    pub fn is_person(&self) -> bool {
        self.doc_ref.kind() == DocumentKind::JournalEntry
            && self.sheet_type.as_deref() == Some(PERSON_SHEET_TYPE)
    }
}
