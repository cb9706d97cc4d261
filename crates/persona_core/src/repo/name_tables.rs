//! Name tables backed by `RollTable` documents.
//!
//! A roll table body lists its results as strings or `{ "text": ... }`
//! objects:
//!
//! ```json
//! { "results": ["Aelar", { "text": "Berrian" }] }
//! ```

use crate::host::{NameTable, NameTableProvider};
use crate::model::document::{Document, DocumentKind, DocumentRef};
use crate::repo::document_repo::DocumentStore;
use log::warn;
use rand::seq::SliceRandom;
use serde_json::Value;

/// Name table provider reading roll tables from a document store.
pub struct DocumentNameTables<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> DocumentNameTables<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn tables(&self) -> Vec<Document> {
        match self.store.list(DocumentKind::RollTable) {
            Ok(tables) => tables,
            Err(err) => {
                warn!(
                    "event=name_tables module=repo status=error error_code=list_failed error={}",
                    err
                );
                Vec::new()
            }
        }
    }

    fn find_by(&self, matches: impl Fn(&str) -> bool) -> Option<NameTable> {
        self.tables()
            .into_iter()
            .find(|table| matches(table.name.as_str()))
            .map(|table| NameTable {
                id: table.doc_ref.id().to_string(),
                name: table.name,
            })
    }
}

impl<S: DocumentStore> NameTableProvider for DocumentNameTables<S> {
    fn is_available(&self) -> bool {
        !self.tables().is_empty()
    }

    fn find_table(&self, name: &str) -> Option<NameTable> {
        self.find_by(|candidate| candidate == name)
    }

    fn find_table_ignore_case(&self, name: &str) -> Option<NameTable> {
        self.find_by(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    fn draw(&self, table: &NameTable) -> Option<String> {
        let doc_ref = DocumentRef::new(DocumentKind::RollTable, &table.id).ok()?;
        let document = self.store.get(&doc_ref).ok()??;
        let results = table_results(&document.body);
        results.choose(&mut rand::thread_rng()).cloned()
    }
}

fn table_results(body: &Value) -> Vec<String> {
    let Some(Value::Array(entries)) = body.get("results") else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Object(object) => object
                .get("text")
                .and_then(Value::as_str)
                .map(|text| text.trim().to_string()),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect()
}
