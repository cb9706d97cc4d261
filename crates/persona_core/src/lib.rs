//! Core domain logic for person journal sheets.
//! This crate owns attribute schema, migration, relationships, actor links,
//! offerings and submit reconciliation; hosts only render and relay input.

pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;

pub use config::{default_log_level, CoreConfig, LoggingConfig};
pub use error::ValidationError;
pub use host::{
    NameTable, NameTableProvider, PermissionLevel, PermissionOracle, StaticPermissionOracle,
};
pub use logging::{init_logging, logging_status};
pub use model::actor_link::{ActorLink, ActorRef, UnlinkOutcome};
pub use model::document::{Document, DocumentKind, DocumentRef};
pub use model::offering::{
    OfferedItem, Offering, OfferingAction, OfferingDraft, OfferingStatus, OfferingWorkflow,
};
pub use model::person::PersonRecord;
pub use model::relationship::{Relationship, RelationshipStore};
pub use repo::document_repo::{
    DocumentStore, InMemoryDocumentStore, RepoError, RepoResult, SqliteDocumentStore,
};
pub use repo::name_tables::DocumentNameTables;
pub use schema::fields::{AttributeSchema, FieldView};
pub use schema::migrate::{migrate, MigratedRecord};
pub use service::names::GeneratedName;
pub use service::person_service::{DropOutcome, PersonService, SheetData, SheetError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
