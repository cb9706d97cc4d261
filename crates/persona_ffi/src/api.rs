//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose person sheet use-cases to Dart via FRB.
//! - Translate core errors into a single response envelope.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Payloads cross the boundary as JSON text.
//! - The database path is resolved once per process from `PERSONA_DB_PATH`.

use log::warn;
use persona_core::db::open_db;
use persona_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CoreConfig, DocumentNameTables, DocumentRef, LoggingConfig, NameTableProvider, OfferingAction,
    OfferingDraft, PermissionLevel, PersonService, SheetError, SqliteDocumentStore,
    StaticPermissionOracle, UnlinkOutcome, ValidationError,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(&LoggingConfig::new(level, log_dir)) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Response envelope for person sheet calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
    /// JSON result; `null` on failure or when there is nothing to return.
    pub payload_json: String,
}

impl PersonResponse {
    fn success(message: impl Into<String>, payload: &impl Serialize) -> Self {
        match serde_json::to_string(payload) {
            Ok(payload_json) => Self {
                ok: true,
                message: message.into(),
                payload_json,
            },
            Err(err) => Self::failure(format!("response encoding failed: {err}")),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            payload_json: "null".to_string(),
        }
    }
}

/// Loads the sheet read model for a viewer.
///
/// `viewer_level` is one of `none|limited|observer|owner`.
#[flutter_rust_bridge::frb(sync)]
pub fn person_sheet(person_uuid: String, viewer_level: String) -> PersonResponse {
    let Some(level) = PermissionLevel::parse(&viewer_level) else {
        return PersonResponse::failure(format!(
            "person_sheet failed: unsupported viewer level `{}`",
            viewer_level.trim()
        ));
    };
    with_person_service("person_sheet", &person_uuid, |service, person| {
        let oracle = StaticPermissionOracle::new(level);
        let names = DocumentNameTables::new(service.store());
        let names: &dyn NameTableProvider = &names;
        service.sheet_data(person, &oracle, Some(names))
    })
}

/// Applies a drag-drop payload (`{"type": ..., "uuid": ...}`) as the owner.
///
/// Item drops return an offering draft the host confirms through
/// [`person_propose_offering`].
#[flutter_rust_bridge::frb(sync)]
pub fn person_drop(person_uuid: String, payload_json: String) -> PersonResponse {
    with_person_service("person_drop", &person_uuid, |service, person| {
        let oracle = StaticPermissionOracle::new(PermissionLevel::Owner);
        service.handle_drop(person, &payload_json, &oracle)
    })
}

/// Reconciles a nested partial record onto the stored person.
#[flutter_rust_bridge::frb(sync)]
pub fn person_submit(person_uuid: String, payload_json: String) -> PersonResponse {
    with_person_service("person_submit", &person_uuid, |service, person| {
        let payload = serde_json::from_str(&payload_json)
            .map_err(|err| ValidationError::MalformedPayload(err.to_string()))?;
        service.submit(person, &payload)
    })
}

/// Removes a relationship by id; `payload_json` is `true` when one was removed.
#[flutter_rust_bridge::frb(sync)]
pub fn person_remove_relationship(person_uuid: String, relationship_id: String) -> PersonResponse {
    with_person_service("person_remove_relationship", &person_uuid, |service, person| {
        service.remove_relationship(person, relationship_id.trim())
    })
}

/// Clears the actor link; `payload_json` is `true` when the portrait should
/// be removed.
#[flutter_rust_bridge::frb(sync)]
pub fn person_unlink_actor(person_uuid: String) -> PersonResponse {
    with_person_service("person_unlink_actor", &person_uuid, |service, person| {
        service
            .unlink_actor(person)
            .map(|outcome| outcome == UnlinkOutcome::RemovePortrait)
    })
}

/// Records a confirmed offering draft.
#[flutter_rust_bridge::frb(sync)]
pub fn person_propose_offering(person_uuid: String, draft_json: String) -> PersonResponse {
    with_person_service("person_propose_offering", &person_uuid, |service, person| {
        let draft: OfferingDraft = serde_json::from_str(&draft_json)
            .map_err(|err| ValidationError::MalformedPayload(err.to_string()))?;
        service.propose_offering(person, draft)
    })
}

/// Applies `accept|reject|cancel` to an offering.
#[flutter_rust_bridge::frb(sync)]
pub fn person_transition_offering(
    person_uuid: String,
    offering_id: String,
    action: String,
) -> PersonResponse {
    let Some(action) = OfferingAction::parse(&action) else {
        return PersonResponse::failure(format!(
            "person_transition_offering failed: unsupported action `{}`",
            action.trim()
        ));
    };
    with_person_service("person_transition_offering", &person_uuid, |service, person| {
        service.transition_offering(person, offering_id.trim(), action)
    })
}

/// Flips an offering's hidden flag; `payload_json` is the new flag, or
/// `null` for an unknown offering id.
#[flutter_rust_bridge::frb(sync)]
pub fn person_toggle_offering_hidden(person_uuid: String, offering_id: String) -> PersonResponse {
    with_person_service("person_toggle_offering_hidden", &person_uuid, |service, person| {
        service.toggle_offering_hidden(person, offering_id.trim())
    })
}

/// Draws a name proposal; nothing is written until [`person_apply_name`].
#[flutter_rust_bridge::frb(sync)]
pub fn person_generate_name(person_uuid: String) -> PersonResponse {
    with_person_service("person_generate_name", &person_uuid, |service, person| {
        let names = DocumentNameTables::new(service.store());
        service
            .generate_name(person, &names)
            .map(|generated| generated.map(|name| name.full()))
    })
}

/// Applies a confirmed name.
#[flutter_rust_bridge::frb(sync)]
pub fn person_apply_name(person_uuid: String, name: String) -> PersonResponse {
    with_person_service("person_apply_name", &person_uuid, |service, person| {
        service.apply_name(person, &name)
    })
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| CoreConfig::from_env().db_path)
        .clone()
}

fn with_person_service<T: Serialize>(
    op: &str,
    person_uuid: &str,
    f: impl FnOnce(&PersonService<SqliteDocumentStore<'_>>, &DocumentRef) -> Result<T, SheetError>,
) -> PersonResponse {
    let person = match DocumentRef::parse(person_uuid.trim()) {
        Ok(person) => person,
        Err(err) => return PersonResponse::failure(format!("{op} failed: {err}")),
    };
    let conn = match open_db(resolve_db_path()) {
        Ok(conn) => conn,
        Err(err) => return PersonResponse::failure(format!("{op} failed: database open: {err}")),
    };
    let service = PersonService::new(SqliteDocumentStore::new(&conn));

    match f(&service, &person) {
        Ok(value) => PersonResponse::success(format!("{op} ok."), &value),
        Err(err) => {
            warn!(
                "event=ffi_call module=ffi status=error op={} error_code={}",
                op,
                error_code(&err)
            );
            PersonResponse::failure(format!("{op} failed: {err}"))
        }
    }
}

fn error_code(err: &SheetError) -> &'static str {
    match err {
        SheetError::Validation(_) => "validation",
        SheetError::InvalidTransition { .. } => "invalid_transition",
        SheetError::ReadOnly(_) => "read_only",
        SheetError::PersonNotFound(_) => "person_not_found",
        SheetError::NotAPerson(_) => "not_a_person",
        SheetError::Repo(_) => "repo",
    }
}
