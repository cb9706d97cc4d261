//! Person sheet use-case service.
//!
//! # Responsibility
//! - Load person records through the document store, migrating and writing
//!   back legacy layouts.
//! - Apply sheet operations (drops, submits, relationship/actor/offering
//!   actions) and persist the result.
//! - Build the read model the presentation host renders.
//!
//! # Invariants
//! - Every operation re-reads the record; nothing is cached across calls.
//! - Failed operations perform no writes beyond a pending migration
//!   write-back.
//! - Operations that only propose a value (name generation, offering drafts)
//!   never write.

use crate::error::ValidationError;
use crate::host::{NameTableProvider, PermissionLevel, PermissionOracle};
use crate::model::actor_link::{ActorLink, ActorRef, UnlinkOutcome};
use crate::model::document::{Document, DocumentKind, DocumentRef};
use crate::model::offering::{
    Offering, OfferingAction, OfferingDraft, OfferingError, OfferingStatus,
};
use crate::model::person::PersonRecord;
use crate::model::relationship::Relationship;
use crate::repo::document_repo::{DocumentStore, RepoError};
use crate::schema::fields::{AttributeSchema, CurrencyView, FieldView};
use crate::schema::migrate::{migrate, MigratedRecord};
use crate::service::drop::{resolve_drop, DropRequest, ResolvedDrop};
use crate::service::names::{self, GeneratedName};
use crate::service::reconcile::{reconcile, PersonPatch};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for person sheet use-cases.
#[derive(Debug)]
pub enum SheetError {
    /// Rejected input; nothing changed.
    Validation(ValidationError),
    /// Offering is not in `Proposed` state; nothing changed.
    InvalidTransition {
        id: String,
        from: OfferingStatus,
        action: OfferingAction,
    },
    /// Viewer may not edit this person.
    ReadOnly(DocumentRef),
    PersonNotFound(DocumentRef),
    /// Document exists but is not a person journal entry.
    NotAPerson(DocumentRef),
    Repo(RepoError),
}

impl Display for SheetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidTransition { id, from, action } => write!(
                f,
                "cannot {} offering {id}: already {}",
                action.as_str(),
                from.as_str()
            ),
            Self::ReadOnly(doc_ref) => write!(f, "person is read-only for this viewer: {doc_ref}"),
            Self::PersonNotFound(doc_ref) => write!(f, "person not found: {doc_ref}"),
            Self::NotAPerson(doc_ref) => write!(f, "document is not a person: {doc_ref}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SheetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for SheetError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for SheetError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<serde_json::Error> for SheetError {
    fn from(value: serde_json::Error) -> Self {
        Self::Repo(RepoError::Serde(value))
    }
}

/// Relationship row with its target resolved for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipView {
    pub id: String,
    pub target_ref: DocumentRef,
    pub name: String,
    pub img: String,
    pub sheet_type: Option<String>,
    pub kind: String,
    pub note: String,
    pub hidden: bool,
}

/// Everything the host needs to render a person sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetData {
    pub record: PersonRecord,
    pub fields: Vec<FieldView>,
    pub relationships: Vec<RelationshipView>,
    pub actor: Option<ActorRef>,
    pub can_view_actor: bool,
    pub currency: Vec<CurrencyView>,
    pub offerings: Vec<Offering>,
    pub has_relationships: usize,
    pub has_offerings: usize,
    pub has_name_tables: bool,
    /// The load migrated a legacy layout and wrote it back.
    pub migrated: bool,
}

/// Result of a successful drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum DropOutcome {
    ActorLinked(ActorRef),
    RelationshipAdded(Relationship),
    /// Host should open its offering dialog; nothing was persisted.
    OfferingDraft(OfferingDraft),
}

/// Person sheet facade over a document store.
pub struct PersonService<S: DocumentStore> {
    store: S,
    schema: AttributeSchema,
}

impl<S: DocumentStore> PersonService<S> {
    /// Creates a service with the default person schema.
    pub fn new(store: S) -> Self {
        Self::with_schema(store, AttributeSchema::person())
    }

    pub fn with_schema(store: S, schema: AttributeSchema) -> Self {
        Self { store, schema }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Loads and migrates a person record, writing back when required.
    pub fn load(&self, person: &DocumentRef) -> Result<MigratedRecord, SheetError> {
        let (_, migrated) = self.load_document(person)?;
        Ok(migrated)
    }

    /// Builds the sheet read model for the current viewer.
    pub fn sheet_data(
        &self,
        person: &DocumentRef,
        oracle: &dyn PermissionOracle,
        names: Option<&dyn NameTableProvider>,
    ) -> Result<SheetData, SheetError> {
        let (_, MigratedRecord { record, write_back }) = self.load_document(person)?;

        let relationships = self.relationship_views(person, &record, oracle)?;
        let actor = self.visible_actor(&record, oracle)?;
        let owner = oracle.has_at_least(person, PermissionLevel::Owner);
        let offerings: Vec<Offering> = record
            .offerings
            .list()
            .iter()
            .filter(|offering| owner || !offering.hidden)
            .cloned()
            .collect();

        Ok(SheetData {
            fields: self.schema.fieldlist(&record),
            currency: self.schema.currency_view(&record),
            has_relationships: relationships.len(),
            has_offerings: offerings.len(),
            can_view_actor: actor.is_some(),
            has_name_tables: names.is_some_and(|provider| provider.is_available()),
            relationships,
            actor,
            offerings,
            migrated: write_back,
            record,
        })
    }

    /// Shown attributes in schema order.
    pub fn fieldlist(&self, person: &DocumentRef) -> Result<Vec<FieldView>, SheetError> {
        let (_, migrated) = self.load_document(person)?;
        Ok(self.schema.fieldlist(&migrated.record))
    }

    /// Linked actor refreshed from its live document, if the viewer may see it.
    ///
    /// A linked actor that no longer exists resolves to `None`.
    pub fn visible_actor(
        &self,
        record: &PersonRecord,
        oracle: &dyn PermissionOracle,
    ) -> Result<Option<ActorRef>, SheetError> {
        let Some(stored) = record.actor_link.stored() else {
            return Ok(None);
        };
        let Ok(actor_ref) = DocumentRef::new(DocumentKind::Actor, &stored.id) else {
            return Ok(None);
        };
        let Some(actor) = self.store.get(&actor_ref)? else {
            debug!(
                "event=actor_resolve module=service status=skip reason=actor_missing actor={}",
                actor_ref
            );
            return Ok(None);
        };

        let live = ActorLink::from(Some(ActorRef::from_document(&actor)));
        Ok(live.resolve(oracle.level(&actor_ref)).cloned())
    }

    /// Relationship rows whose targets still exist and are visible.
    ///
    /// Hidden rows are only listed for viewers owning the person.
    pub fn relationship_views(
        &self,
        person: &DocumentRef,
        record: &PersonRecord,
        oracle: &dyn PermissionOracle,
    ) -> Result<Vec<RelationshipView>, SheetError> {
        let owner = oracle.has_at_least(person, PermissionLevel::Owner);
        let mut views = Vec::with_capacity(record.relationships.len());

        for relationship in record.relationships.list() {
            if relationship.hidden && !owner {
                continue;
            }
            let Some(target) = self.store.get(&relationship.target_ref)? else {
                continue;
            };
            if !oracle.has_at_least(&target.doc_ref, PermissionLevel::Limited) {
                continue;
            }
            views.push(RelationshipView {
                id: relationship.id.clone(),
                target_ref: relationship.target_ref.clone(),
                name: target.name,
                img: target.img,
                sheet_type: target.sheet_type,
                kind: relationship.kind.clone(),
                note: relationship.note.clone(),
                hidden: relationship.hidden,
            });
        }

        Ok(views)
    }

    /// Applies a host drop payload to the person sheet.
    ///
    /// Actor drops link the actor and adopt its name and image; journal
    /// entry/page drops add a relationship; item drops return an offering
    /// draft without writing.
    pub fn handle_drop(
        &self,
        person: &DocumentRef,
        payload: &str,
        oracle: &dyn PermissionOracle,
    ) -> Result<DropOutcome, SheetError> {
        if !oracle.has_at_least(person, PermissionLevel::Owner) {
            return Err(SheetError::ReadOnly(person.clone()));
        }

        let request = DropRequest::parse(payload).inspect_err(|err| {
            warn!(
                "event=person_drop module=service status=error error_code=invalid_payload error={}",
                err
            );
        })?;

        match resolve_drop(&self.store, &request)? {
            ResolvedDrop::Actor(actor) => self.link_actor(person, &actor),
            ResolvedDrop::Relationship(target) => self
                .add_relationship(person, &target)
                .map(DropOutcome::RelationshipAdded),
            ResolvedDrop::Offering(draft) => Ok(DropOutcome::OfferingDraft(draft)),
        }
    }

    fn link_actor(&self, person: &DocumentRef, actor: &Document) -> Result<DropOutcome, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;

        let snapshot = ActorRef::from_document(actor);
        let replaced = record.actor_link.link(snapshot.clone()).is_some();
        record.name = actor.name.clone();
        record.image = actor.img.clone();
        self.persist(document, &record)?;

        info!(
            "event=actor_link module=service status=ok person={} actor={} replaced={}",
            person, actor.doc_ref, replaced
        );
        Ok(DropOutcome::ActorLinked(snapshot))
    }

    /// Adds a relationship from `person` to `target`, mirroring it on the
    /// target when the target is itself a person.
    pub fn add_relationship(
        &self,
        person: &DocumentRef,
        target: &Document,
    ) -> Result<Relationship, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        let relationship = record.relationships.add(person, target)?;
        self.persist(document.clone(), &record)?;

        let mut mirrored = false;
        if target.is_person() {
            let (target_document, MigratedRecord { record: mut other, .. }) =
                self.load_document(&target.doc_ref)?;
            if other.relationships.find_by_target(person).is_none() {
                other.relationships.add(&target.doc_ref, &document)?;
                self.persist(target_document, &other)?;
                mirrored = true;
            }
        }

        info!(
            "event=relationship_add module=service status=ok person={} target={} mirrored={}",
            person, target.doc_ref, mirrored
        );
        Ok(relationship)
    }

    /// Removes a relationship by id. Unknown ids return `Ok(false)`.
    pub fn remove_relationship(&self, person: &DocumentRef, id: &str) -> Result<bool, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        let Some(removed) = record.relationships.remove(id) else {
            debug!(
                "event=relationship_remove module=service status=skip reason=not_found person={}",
                person
            );
            return Ok(false);
        };
        self.persist(document, &record)?;

        let mut mirrored = false;
        if let Some(target) = self.store.get(&removed.target_ref)? {
            if target.is_person() {
                let (target_document, MigratedRecord { record: mut other, .. }) =
                    self.load_document(&target.doc_ref)?;
                if other.relationships.remove_by_target(person).is_some() {
                    self.persist(target_document, &other)?;
                    mirrored = true;
                }
            }
        }

        info!(
            "event=relationship_remove module=service status=ok person={} target={} mirrored={}",
            person, removed.target_ref, mirrored
        );
        Ok(true)
    }

    /// Flips a relationship's hidden flag. Unknown ids return `Ok(None)`.
    pub fn toggle_relationship_hidden(
        &self,
        person: &DocumentRef,
        id: &str,
    ) -> Result<Option<bool>, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        let Some(hidden) = record.relationships.toggle_hidden(id) else {
            return Ok(None);
        };
        self.persist(document, &record)?;
        Ok(Some(hidden))
    }

    /// Clears the actor link, including an undecodable stored actor value.
    pub fn unlink_actor(&self, person: &DocumentRef) -> Result<UnlinkOutcome, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        let mut outcome = record.actor_link.unlink();
        if record.undecoded.actor.take().is_some() {
            outcome = UnlinkOutcome::RemovePortrait;
        }
        if outcome == UnlinkOutcome::RemovePortrait {
            self.persist(document, &record)?;
            info!("event=actor_unlink module=service status=ok person={}", person);
        }
        Ok(outcome)
    }

    /// Reconciles a host submit payload onto the stored record and persists it.
    pub fn submit(&self, person: &DocumentRef, payload: &Value) -> Result<PersonRecord, SheetError> {
        let patch = PersonPatch::from_json(payload)
            .map_err(|err| ValidationError::MalformedPayload(err.to_string()))?;
        let (document, MigratedRecord { record, .. }) = self.load_document(person)?;

        let mut next = reconcile(&record, &patch);
        let schema = &self.schema;
        next.attribute_visibility.retain(|key, _| schema.contains(key));
        self.persist(document, &next)?;

        info!(
            "event=person_submit module=service status=ok person={} attributes={} relationships={}",
            person,
            patch.attributes.as_ref().map_or(0, |edits| edits.len()),
            patch.relationships.as_ref().map_or(0, |edits| edits.len())
        );
        Ok(next)
    }

    /// Records a confirmed offering draft as a new `Proposed` offering.
    pub fn propose_offering(
        &self,
        person: &DocumentRef,
        draft: OfferingDraft,
    ) -> Result<Offering, SheetError> {
        for item in &draft.items {
            self.require_actor_item(&item.actor_id, &item.id)?;
        }

        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        let offering = record
            .offerings
            .propose(draft.actor, draft.items, draft.currency)?
            .clone();
        self.persist(document, &record)?;

        info!(
            "event=offering_propose module=service status=ok person={} items={}",
            person,
            offering.items.len()
        );
        Ok(offering)
    }

    /// Moves a `Proposed` offering to a terminal state.
    ///
    /// Unknown ids return `Ok(None)`. Settlement is left to the economy system.
    pub fn transition_offering(
        &self,
        person: &DocumentRef,
        id: &str,
        action: OfferingAction,
    ) -> Result<Option<Offering>, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        let offering = match record.offerings.transition(id, action) {
            Ok(offering) => offering.clone(),
            Err(OfferingError::NotFound(_)) => {
                debug!(
                    "event=offering_transition module=service status=skip reason=not_found person={}",
                    person
                );
                return Ok(None);
            }
            Err(OfferingError::InvalidTransition { id, from, action }) => {
                warn!(
                    "event=offering_transition module=service status=error error_code=invalid_transition from={} action={}",
                    from.as_str(),
                    action.as_str()
                );
                return Err(SheetError::InvalidTransition { id, from, action });
            }
        };
        self.persist(document, &record)?;

        info!(
            "event=offering_transition module=service status=ok person={} action={} status={}",
            person,
            action.as_str(),
            offering.status.as_str()
        );
        Ok(Some(offering))
    }

    pub fn accept_offering(
        &self,
        person: &DocumentRef,
        id: &str,
    ) -> Result<Option<Offering>, SheetError> {
        self.transition_offering(person, id, OfferingAction::Accept)
    }

    pub fn reject_offering(
        &self,
        person: &DocumentRef,
        id: &str,
    ) -> Result<Option<Offering>, SheetError> {
        self.transition_offering(person, id, OfferingAction::Reject)
    }

    pub fn cancel_offering(
        &self,
        person: &DocumentRef,
        id: &str,
    ) -> Result<Option<Offering>, SheetError> {
        self.transition_offering(person, id, OfferingAction::Cancel)
    }

    /// Flips an offering's hidden flag. Unknown ids return `Ok(None)`.
    pub fn toggle_offering_hidden(
        &self,
        person: &DocumentRef,
        id: &str,
    ) -> Result<Option<bool>, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        let Some(hidden) = record.offerings.toggle_hidden(id) else {
            return Ok(None);
        };
        self.persist(document, &record)?;
        Ok(Some(hidden))
    }

    /// Deletes an offering row. Unknown ids return `Ok(false)`.
    pub fn remove_offering(&self, person: &DocumentRef, id: &str) -> Result<bool, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        if record.offerings.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(document, &record)?;
        Ok(true)
    }

    /// Draws a name for the person's race without applying it.
    pub fn generate_name(
        &self,
        person: &DocumentRef,
        names: &dyn NameTableProvider,
    ) -> Result<Option<GeneratedName>, SheetError> {
        let (_, migrated) = self.load_document(person)?;
        let race = names::race_key(&migrated.record);
        let generated = names::generate_name(names, &race);

        info!(
            "event=name_generate module=service status={} person={}",
            if generated.is_some() { "ok" } else { "skip" },
            person
        );
        Ok(generated)
    }

    /// Applies a previously generated (or typed) name.
    pub fn apply_name(&self, person: &DocumentRef, name: &str) -> Result<bool, SheetError> {
        let (document, MigratedRecord { mut record, .. }) = self.load_document(person)?;
        if !record.apply_name(name) {
            return Ok(false);
        }
        self.persist(document, &record)?;
        Ok(true)
    }

    /// Offered items must still sit in an existing actor's inventory.
    fn require_actor_item(&self, actor_id: &str, item_id: &str) -> Result<(), SheetError> {
        let not_owned = || ValidationError::ItemNotActorOwned(format!("{actor_id}/{item_id}"));
        let Ok(owner) = DocumentRef::new(DocumentKind::Actor, actor_id) else {
            return Err(not_owned().into());
        };
        let Ok(item) = DocumentRef::embedded(&owner, DocumentKind::Item, item_id) else {
            return Err(not_owned().into());
        };
        match self.store.get(&item)? {
            Some(_) => Ok(()),
            None => Err(not_owned().into()),
        }
    }

    fn load_document(
        &self,
        person: &DocumentRef,
    ) -> Result<(Document, MigratedRecord), SheetError> {
        let document = self
            .store
            .get(person)?
            .ok_or_else(|| SheetError::PersonNotFound(person.clone()))?;
        if !document.is_person() {
            return Err(SheetError::NotAPerson(person.clone()));
        }

        let mut migrated = migrate(&self.schema, &document.body);
        if migrated.record.name.is_empty() {
            migrated.record.name = document.name.clone();
        }
        if migrated.write_back {
            self.refresh_actor_snapshot(&mut migrated.record)?;
            self.persist(document.clone(), &migrated.record)?;
        }
        debug!(
            "event=person_load module=service status=ok person={} write_back={}",
            person, migrated.write_back
        );
        Ok((document, migrated))
    }

    /// Fills an id-only actor snapshot from the live actor document.
    fn refresh_actor_snapshot(&self, record: &mut PersonRecord) -> Result<(), SheetError> {
        let Some(stored) = record.actor_link.stored() else {
            return Ok(());
        };
        if !stored.name.is_empty() {
            return Ok(());
        }
        let Ok(actor_ref) = DocumentRef::new(DocumentKind::Actor, &stored.id) else {
            return Ok(());
        };
        if let Some(actor) = self.store.get(&actor_ref)? {
            record.actor_link.link(ActorRef::from_document(&actor));
        }
        Ok(())
    }

    fn persist(&self, mut document: Document, record: &PersonRecord) -> Result<(), SheetError> {
        document.body = record.to_body()?;
        if !record.name.is_empty() {
            document.name = record.name.clone();
        }
        if !record.image.is_empty() {
            document.img = record.image.clone();
        }
        self.store.put(&document)?;
        Ok(())
    }
}
