//! Linked actor snapshot for a person record.

use crate::host::PermissionLevel;
use crate::model::document::Document;
use serde::{Deserialize, Serialize};

/// Denormalized snapshot of an external actor taken at link time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub img: String,
}

impl ActorRef {
    /// Snapshot of an actor document.
    pub fn from_document(document: &Document) -> Self {
        Self {
            id: document.doc_ref.id().to_string(),
            name: document.name.clone(),
            img: document.img.clone(),
        }
    }
}

/// What the host should do after an unlink request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    /// Link removed; drop the actor portrait element.
    RemovePortrait,
    /// Nothing was linked.
    NotLinked,
}

/// At most one linked actor per person record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorLink {
    actor: Option<ActorRef>,
}

impl ActorLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current link, returning the previous snapshot.
    pub fn link(&mut self, actor: ActorRef) -> Option<ActorRef> {
        self.actor.replace(actor)
    }

    /// Returns the stored snapshot when the viewer may observe the actor.
    ///
    /// Read-time filter only: stored data is never touched.
    pub fn resolve(&self, viewer: PermissionLevel) -> Option<&ActorRef> {
        if viewer >= PermissionLevel::Observer {
            self.actor.as_ref()
        } else {
            None
        }
    }

    /// Clears the link.
    pub fn unlink(&mut self) -> UnlinkOutcome {
        match self.actor.take() {
            Some(_) => UnlinkOutcome::RemovePortrait,
            None => UnlinkOutcome::NotLinked,
        }
    }

    /// Stored snapshot without permission filtering.
    pub fn stored(&self) -> Option<&ActorRef> {
        self.actor.as_ref()
    }

    pub fn is_linked(&self) -> bool {
        self.actor.is_some()
    }
}

impl From<Option<ActorRef>> for ActorLink {
    fn from(actor: Option<ActorRef>) -> Self {
        Self { actor }
    }
}
