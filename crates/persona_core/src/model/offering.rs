//! Offering exchange workflow.
//!
//! # Responsibility
//! - Record proposed item/currency exchanges with external actors.
//! - Drive the `Proposed -> {Accepted, Rejected, Cancelled}` state machine.
//!
//! # Invariants
//! - Only `Proposed` offerings transition; terminal states are immutable.
//! - Failed transitions leave every offering untouched.
//! - Settlement of accepted offerings belongs to the economy system, not here.

use crate::error::ValidationError;
use crate::model::actor_link::ActorRef;
use crate::model::new_record_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Offering lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingStatus {
    Proposed,
    Accepted,
    Rejected,
    Cancelled,
}

impl OfferingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Proposed)
    }
}

/// Transition requested on a proposed offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferingAction {
    Accept,
    Reject,
    Cancel,
}

impl OfferingAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    fn target(self) -> OfferingStatus {
        match self {
            Self::Accept => OfferingStatus::Accepted,
            Self::Reject => OfferingStatus::Rejected,
            Self::Cancel => OfferingStatus::Cancelled,
        }
    }
}

/// One inventory item offered by an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferedItem {
    pub id: String,
    pub item_name: String,
    /// Source actor owning the item. Empty means not actor-owned.
    pub actor_id: String,
    pub actor_name: String,
    pub qty: u32,
}

/// Proposed exchange between the person and an external actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub id: String,
    pub actor: ActorRef,
    #[serde(default)]
    pub items: Vec<OfferedItem>,
    #[serde(default)]
    pub currency: BTreeMap<String, f64>,
    pub status: OfferingStatus,
    #[serde(default)]
    pub hidden: bool,
}

/// Unconfirmed offering built from an item drop, awaiting the host dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingDraft {
    pub actor: ActorRef,
    #[serde(default)]
    pub items: Vec<OfferedItem>,
    #[serde(default)]
    pub currency: BTreeMap<String, f64>,
}

/// Offering workflow failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferingError {
    NotFound(String),
    InvalidTransition {
        id: String,
        from: OfferingStatus,
        action: OfferingAction,
    },
}

impl Display for OfferingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "offering not found: {id}"),
            Self::InvalidTransition { id, from, action } => write!(
                f,
                "cannot {} offering {id}: already {}",
                action.as_str(),
                from.as_str()
            ),
        }
    }
}

impl Error for OfferingError {}

/// Ordered offering list owned by one person record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferingWorkflow {
    offerings: Vec<Offering>,
}

impl OfferingWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new `Proposed` offering.
    ///
    /// # Errors
    /// - `EmptyOffering` when there is nothing to exchange.
    /// - `ItemNotActorOwned` when an item has no source actor.
    /// - `InvalidQuantity` when an item quantity is zero.
    pub fn propose(
        &mut self,
        actor: ActorRef,
        items: Vec<OfferedItem>,
        currency: BTreeMap<String, f64>,
    ) -> Result<&Offering, ValidationError> {
        let currency: BTreeMap<String, f64> = currency
            .into_iter()
            .filter(|(_, amount)| *amount != 0.0)
            .collect();
        if items.is_empty() && currency.is_empty() {
            return Err(ValidationError::EmptyOffering);
        }
        for item in &items {
            if item.actor_id.trim().is_empty() {
                return Err(ValidationError::ItemNotActorOwned(item.id.clone()));
            }
            if item.qty == 0 {
                return Err(ValidationError::InvalidQuantity {
                    item_id: item.id.clone(),
                });
            }
        }

        self.offerings.push(Offering {
            id: new_record_id(),
            actor,
            items,
            currency,
            status: OfferingStatus::Proposed,
            hidden: false,
        });
        let index = self.offerings.len() - 1;
        Ok(&self.offerings[index])
    }

    pub fn accept(&mut self, id: &str) -> Result<&Offering, OfferingError> {
        self.transition(id, OfferingAction::Accept)
    }

    pub fn reject(&mut self, id: &str) -> Result<&Offering, OfferingError> {
        self.transition(id, OfferingAction::Reject)
    }

    pub fn cancel(&mut self, id: &str) -> Result<&Offering, OfferingError> {
        self.transition(id, OfferingAction::Cancel)
    }

    /// Applies `action` to a `Proposed` offering.
    pub fn transition(
        &mut self,
        id: &str,
        action: OfferingAction,
    ) -> Result<&Offering, OfferingError> {
        let offering = self
            .offerings
            .iter_mut()
            .find(|offering| offering.id == id)
            .ok_or_else(|| OfferingError::NotFound(id.to_string()))?;

        if offering.status.is_terminal() {
            return Err(OfferingError::InvalidTransition {
                id: id.to_string(),
                from: offering.status,
                action,
            });
        }

        offering.status = action.target();
        Ok(offering)
    }

    /// Flips the hidden flag; returns the new value.
    pub fn toggle_hidden(&mut self, id: &str) -> Option<bool> {
        let offering = self.offerings.iter_mut().find(|offering| offering.id == id)?;
        offering.hidden = !offering.hidden;
        Some(offering.hidden)
    }

    /// Deletes an offering row regardless of status.
    pub fn remove(&mut self, id: &str) -> Option<Offering> {
        let index = self.offerings.iter().position(|offering| offering.id == id)?;
        Some(self.offerings.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Offering> {
        self.offerings.iter().find(|offering| offering.id == id)
    }

    pub fn list(&self) -> &[Offering] {
        &self.offerings
    }

    pub fn len(&self) -> usize {
        self.offerings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offerings.is_empty()
    }
}

impl From<Vec<Offering>> for OfferingWorkflow {
    fn from(offerings: Vec<Offering>) -> Self {
        Self { offerings }
    }
}

#[cfg(test)]
mod tests {
    use super::{OfferedItem, OfferingAction, OfferingError, OfferingStatus, OfferingWorkflow};
    use crate::error::ValidationError;
    use crate::model::actor_link::ActorRef;
    use std::collections::BTreeMap;

    fn merchant() -> ActorRef {
        ActorRef {
            id: "merchant".to_string(),
            name: "Merchant".to_string(),
            img: "merchant.png".to_string(),
        }
    }

    fn sword() -> OfferedItem {
        OfferedItem {
            id: "sword".to_string(),
            item_name: "Longsword".to_string(),
            actor_id: "merchant".to_string(),
            actor_name: "Merchant".to_string(),
            qty: 1,
        }
    }

    fn proposed(workflow: &mut OfferingWorkflow) -> String {
        workflow
            .propose(merchant(), vec![sword()], BTreeMap::new())
            .unwrap()
            .id
            .clone()
    }

    #[test]
    fn propose_appends_proposed_offering() {
        let mut workflow = OfferingWorkflow::new();
        let id = proposed(&mut workflow);

        let offering = workflow.get(&id).unwrap();
        assert_eq!(offering.status, OfferingStatus::Proposed);
        assert_eq!(offering.items, vec![sword()]);
        assert_eq!(workflow.len(), 1);
    }

    #[test]
    fn propose_rejects_free_floating_items() {
        let mut workflow = OfferingWorkflow::new();
        let mut loose = sword();
        loose.actor_id = String::new();

        let err = workflow
            .propose(merchant(), vec![loose], BTreeMap::new())
            .unwrap_err();
        assert_eq!(err, ValidationError::ItemNotActorOwned("sword".to_string()));
        assert!(workflow.is_empty());
    }

    #[test]
    fn propose_rejects_empty_and_zero_quantity() {
        let mut workflow = OfferingWorkflow::new();
        let zero_gold = BTreeMap::from([("gp".to_string(), 0.0)]);
        assert_eq!(
            workflow.propose(merchant(), Vec::new(), zero_gold).unwrap_err(),
            ValidationError::EmptyOffering
        );

        let mut none = sword();
        none.qty = 0;
        assert!(matches!(
            workflow.propose(merchant(), vec![none], BTreeMap::new()),
            Err(ValidationError::InvalidQuantity { .. })
        ));
        assert!(workflow.is_empty());
    }

    #[test]
    fn currency_only_offering_is_allowed() {
        let mut workflow = OfferingWorkflow::new();
        let gold = BTreeMap::from([("gp".to_string(), 25.0)]);
        let offering = workflow.propose(merchant(), Vec::new(), gold).unwrap();
        assert_eq!(offering.currency.get("gp"), Some(&25.0));
    }

    #[test]
    fn each_transition_succeeds_once_from_proposed() {
        for action in [
            OfferingAction::Accept,
            OfferingAction::Reject,
            OfferingAction::Cancel,
        ] {
            let mut workflow = OfferingWorkflow::new();
            let id = proposed(&mut workflow);

            let status = workflow.transition(&id, action).unwrap().status;
            assert!(status.is_terminal());

            let err = workflow.transition(&id, action).unwrap_err();
            assert!(matches!(err, OfferingError::InvalidTransition { .. }));
            assert_eq!(workflow.get(&id).unwrap().status, status);
        }
    }

    #[test]
    fn reject_after_accept_keeps_accepted() {
        let mut workflow = OfferingWorkflow::new();
        let id = proposed(&mut workflow);

        workflow.accept(&id).unwrap();
        let err = workflow.reject(&id).unwrap_err();
        assert_eq!(
            err,
            OfferingError::InvalidTransition {
                id: id.clone(),
                from: OfferingStatus::Accepted,
                action: OfferingAction::Reject,
            }
        );
        assert_eq!(workflow.get(&id).unwrap().status, OfferingStatus::Accepted);
    }

    #[test]
    fn unknown_offering_is_not_found() {
        let mut workflow = OfferingWorkflow::new();
        assert_eq!(
            workflow.cancel("missing").unwrap_err(),
            OfferingError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn toggle_hidden_flips_and_ignores_unknown_ids() {
        let mut workflow = OfferingWorkflow::new();
        let id = proposed(&mut workflow);

        assert!(!workflow.get(&id).unwrap().hidden);
        assert_eq!(workflow.toggle_hidden(&id), Some(true));
        assert!(workflow.get(&id).unwrap().hidden);
        assert_eq!(workflow.toggle_hidden(&id), Some(false));
        assert_eq!(workflow.toggle_hidden("missing"), None);
    }

    #[test]
    fn parses_actions() {
        assert_eq!(OfferingAction::parse("accept"), Some(OfferingAction::Accept));
        assert_eq!(OfferingAction::parse(" cancel "), Some(OfferingAction::Cancel));
        assert_eq!(OfferingAction::parse("settle"), None);
    }
}
