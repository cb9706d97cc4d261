//! User-facing validation errors.
//!
//! # Invariants
//! - A `ValidationError` always aborts the operation before any state change.

use crate::model::document::DocumentRef;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected input from the presentation host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Drop/submit payload is not valid JSON or misses required keys.
    MalformedPayload(String),
    /// Document uuid does not follow `<Kind>.<id>` forms.
    MalformedReference(String),
    /// Drop payload `type` is not handled by the person sheet.
    UnsupportedDropType(String),
    /// Reference did not resolve through the document store.
    UnresolvedReference(DocumentRef),
    /// Relationship target is not a journal entry of a supported sheet type.
    UnsupportedRelationshipTarget(DocumentRef),
    /// Relationship target is the record itself.
    SelfRelationship(DocumentRef),
    /// A relationship to the target already exists.
    DuplicateRelationship(DocumentRef),
    /// Offered item does not come from an actor inventory.
    ItemNotActorOwned(String),
    /// Offering carries neither items nor currency.
    EmptyOffering,
    /// Offered item quantity must be positive.
    InvalidQuantity { item_id: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPayload(details) => write!(f, "malformed payload: {details}"),
            Self::MalformedReference(value) => write!(f, "malformed document reference: `{value}`"),
            Self::UnsupportedDropType(value) => write!(f, "unsupported drop type: `{value}`"),
            Self::UnresolvedReference(doc_ref) => write!(f, "document not found: {doc_ref}"),
            Self::UnsupportedRelationshipTarget(doc_ref) => {
                write!(f, "document cannot be used as a relationship: {doc_ref}")
            }
            Self::SelfRelationship(doc_ref) => {
                write!(f, "a person cannot be related to itself: {doc_ref}")
            }
            Self::DuplicateRelationship(doc_ref) => {
                write!(f, "relationship already exists: {doc_ref}")
            }
            Self::ItemNotActorOwned(item) => {
                write!(f, "offerings must come from an actor: {item}")
            }
            Self::EmptyOffering => write!(f, "offering must contain items or currency"),
            Self::InvalidQuantity { item_id } => {
                write!(f, "offered quantity must be positive for item {item_id}")
            }
        }
    }
}

impl Error for ValidationError {}
