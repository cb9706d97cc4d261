//! Document store contract with in-memory and SQLite implementations.
//!
//! # Responsibility
//! - Resolve weak document references to documents.
//! - Persist person bodies written back by the core.
//!
//! # Invariants
//! - The store is authoritative; callers re-read instead of caching.
//! - `update` deep-merges objects and replaces every other value.
//! - Writes to missing documents fail with `RepoError::NotFound`.

use crate::db::DbError;
use crate::model::document::{Document, DocumentKind, DocumentRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DOCUMENT_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    img,
    sheet_type,
    body
FROM documents";

pub type RepoResult<T> = Result<T, RepoError>;

/// Document persistence errors.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(DocumentRef),
    InvalidData(String),
    Serde(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(doc_ref) => write!(f, "document not found: {doc_ref}"),
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
            Self::Serde(err) => write!(f, "document body encoding failed: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serde(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Abstract document persistence consumed by the core.
pub trait DocumentStore {
    fn get(&self, doc_ref: &DocumentRef) -> RepoResult<Option<Document>>;

    /// All documents of one kind, ordered by name then uuid.
    fn list(&self, kind: DocumentKind) -> RepoResult<Vec<Document>>;

    /// Creates or replaces a document.
    fn put(&self, document: &Document) -> RepoResult<()>;

    /// Deep-merges `patch` into the document body.
    fn update(&self, doc_ref: &DocumentRef, patch: &Value) -> RepoResult<()>;

    /// Sets one top-level body key.
    fn set_field(&self, doc_ref: &DocumentRef, key: &str, value: Value) -> RepoResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn get(&self, doc_ref: &DocumentRef) -> RepoResult<Option<Document>> {
        (**self).get(doc_ref)
    }

    fn list(&self, kind: DocumentKind) -> RepoResult<Vec<Document>> {
        (**self).list(kind)
    }

    fn put(&self, document: &Document) -> RepoResult<()> {
        (**self).put(document)
    }

    fn update(&self, doc_ref: &DocumentRef, patch: &Value) -> RepoResult<()> {
        (**self).update(doc_ref, patch)
    }

    fn set_field(&self, doc_ref: &DocumentRef, key: &str, value: Value) -> RepoResult<()> {
        (**self).set_field(doc_ref, key, value)
    }
}

/// Deep merge used by `DocumentStore::update`.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_patch(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn set_body_field(body: &mut Value, key: &str, value: Value) {
    if !body.is_object() {
        *body = Value::Object(Map::new());
    }
    if let Value::Object(object) = body {
        object.insert(key.to_string(), value);
    }
}

/// Process-local store for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RefCell<BTreeMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-seeded with `documents`.
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        {
            let mut map = store.documents.borrow_mut();
            for document in documents {
                map.insert(document.doc_ref.uuid().to_string(), document);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }

    fn modify(
        &self,
        doc_ref: &DocumentRef,
        apply: impl FnOnce(&mut Value),
    ) -> RepoResult<()> {
        let mut documents = self.documents.borrow_mut();
        let document = documents
            .get_mut(doc_ref.uuid())
            .ok_or_else(|| RepoError::NotFound(doc_ref.clone()))?;
        apply(&mut document.body);
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, doc_ref: &DocumentRef) -> RepoResult<Option<Document>> {
        Ok(self.documents.borrow().get(doc_ref.uuid()).cloned())
    }

    fn list(&self, kind: DocumentKind) -> RepoResult<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .documents
            .borrow()
            .values()
            .filter(|document| document.doc_ref.kind() == kind)
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.doc_ref.cmp(&b.doc_ref)));
        Ok(documents)
    }

    fn put(&self, document: &Document) -> RepoResult<()> {
        self.documents
            .borrow_mut()
            .insert(document.doc_ref.uuid().to_string(), document.clone());
        Ok(())
    }

    fn update(&self, doc_ref: &DocumentRef, patch: &Value) -> RepoResult<()> {
        self.modify(doc_ref, |body| merge_patch(body, patch))
    }

    fn set_field(&self, doc_ref: &DocumentRef, key: &str, value: Value) -> RepoResult<()> {
        self.modify(doc_ref, |body| set_body_field(body, key, value))
    }
}

/// SQLite-backed document store.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Wraps a connection returned by `db::open_db*` (migrations applied).
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write_body(&self, doc_ref: &DocumentRef, body: &Value) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET
                body = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![serde_json::to_string(body)?, doc_ref.uuid()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(doc_ref.clone()));
        }
        Ok(())
    }

    fn require(&self, doc_ref: &DocumentRef) -> RepoResult<Document> {
        self.get(doc_ref)?
            .ok_or_else(|| RepoError::NotFound(doc_ref.clone()))
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn get(&self, doc_ref: &DocumentRef) -> RepoResult<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let row = stmt
            .query_row([doc_ref.uuid()], |row| Ok(RawDocumentRow::read(row)))
            .optional()?;
        match row {
            Some(raw) => Ok(Some(raw?.into_document()?)),
            None => Ok(None),
        }
    }

    fn list(&self, kind: DocumentKind) -> RepoResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DOCUMENT_SELECT_SQL} WHERE kind = ?1 ORDER BY name ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([kind.as_str()])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(RawDocumentRow::read(row)?.into_document()?);
        }
        Ok(documents)
    }

    fn put(&self, document: &Document) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO documents (uuid, kind, name, img, parent_uuid, sheet_type, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(uuid) DO UPDATE SET
                name = excluded.name,
                img = excluded.img,
                sheet_type = excluded.sheet_type,
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                document.doc_ref.uuid(),
                document.doc_ref.kind().as_str(),
                document.name.as_str(),
                document.img.as_str(),
                document.doc_ref.parent().map(|parent| parent.uuid().to_string()),
                document.sheet_type.as_deref(),
                serde_json::to_string(&document.body)?,
            ],
        )?;
        Ok(())
    }

    fn update(&self, doc_ref: &DocumentRef, patch: &Value) -> RepoResult<()> {
        let mut body = self.require(doc_ref)?.body;
        merge_patch(&mut body, patch);
        self.write_body(doc_ref, &body)
    }

    fn set_field(&self, doc_ref: &DocumentRef, key: &str, value: Value) -> RepoResult<()> {
        let mut body = self.require(doc_ref)?.body;
        set_body_field(&mut body, key, value);
        self.write_body(doc_ref, &body)
    }
}

struct RawDocumentRow {
    uuid: String,
    name: String,
    img: String,
    sheet_type: Option<String>,
    body: String,
}

impl RawDocumentRow {
    fn read(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            uuid: row.get("uuid")?,
            name: row.get("name")?,
            img: row.get("img")?,
            sheet_type: row.get("sheet_type")?,
            body: row.get("body")?,
        })
    }

    fn into_document(self) -> RepoResult<Document> {
        let doc_ref = DocumentRef::parse(&self.uuid).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid `{}` in documents.uuid", self.uuid))
        })?;
        let body = serde_json::from_str(&self.body).map_err(|err| {
            RepoError::InvalidData(format!("invalid JSON body for `{}`: {err}", self.uuid))
        })?;
        Ok(Document {
            doc_ref,
            name: self.name,
            img: self.img,
            sheet_type: self.sheet_type,
            body,
        })
    }
}
