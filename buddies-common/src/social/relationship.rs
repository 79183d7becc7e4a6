use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ErrorCategory;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuddyStatus {
    Pending,
    Accepted,
    Blocked,
}

impl BuddyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuddyStatus::Pending => "pending",
            BuddyStatus::Accepted => "accepted",
            BuddyStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for BuddyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BuddyStatus {
    type Err = RelationshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BuddyStatus::Pending),
            "accepted" => Ok(BuddyStatus::Accepted),
            "blocked" => Ok(BuddyStatus::Blocked),
            _ => Err(RelationshipError::UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Block,
}

impl Decision {
    pub fn resulting_status(&self) -> BuddyStatus {
        match self {
            Decision::Accept => BuddyStatus::Accepted,
            Decision::Block => BuddyStatus::Blocked,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RelationshipError {
    SelfRequest,
    AlreadyExists,
    NotAuthorized,
    InvalidState(BuddyStatus),
    DoesNotExist,
    UnknownStatus(String),
}

impl RelationshipError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelationshipError::SelfRequest => ErrorCategory::Validation,
            RelationshipError::AlreadyExists => ErrorCategory::StateConflict,
            RelationshipError::NotAuthorized => ErrorCategory::Authorization,
            RelationshipError::InvalidState(_) => ErrorCategory::StateConflict,
            RelationshipError::DoesNotExist => ErrorCategory::NotFound,
            RelationshipError::UnknownStatus(_) => ErrorCategory::ServiceUnavailable,
        }
    }
}

impl std::error::Error for RelationshipError {}

impl fmt::Display for RelationshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipError::SelfRequest => {
                write!(f, "RelationshipError: Users cannot send a buddy request to themselves")
            }
            RelationshipError::AlreadyExists => {
                write!(f, "RelationshipError: A relationship already exists between these users")
            }
            RelationshipError::NotAuthorized => {
                write!(f, "RelationshipError: User is not a permitted party for this action")
            }
            RelationshipError::InvalidState(status) => {
                write!(f, "RelationshipError: Relationship is {status}, not pending")
            }
            RelationshipError::DoesNotExist => {
                write!(f, "RelationshipError: Relationship or user does not exist")
            }
            RelationshipError::UnknownStatus(status) => {
                write!(f, "RelationshipError: Stored status '{status}' is not recognized")
            }
        }
    }
}

/// A relationship row as stored, with the parsed status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Relationship {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: BuddyStatus,
}

impl Relationship {
    /// Normalizes the row from the perspective of `viewer`, who must be one of the two
    /// parties.
    pub fn link_for(&self, viewer: Uuid) -> Option<BuddyLink> {
        let other_user_id = if viewer == self.requester_id {
            self.recipient_id
        } else if viewer == self.recipient_id {
            self.requester_id
        } else {
            return None;
        };

        Some(BuddyLink {
            relationship_id: self.id,
            other_user_id,
            requested_by_viewer: viewer == self.requester_id,
            status: self.status,
        })
    }
}

/// A relationship seen from one side. Views built on the buddies table only ever expose
/// this, so callers never need to know which column they occupy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct BuddyLink {
    pub relationship_id: Uuid,
    pub other_user_id: Uuid,
    pub requested_by_viewer: bool,
    pub status: BuddyStatus,
}

impl BuddyLink {
    pub fn other_party(&self) -> Uuid {
        self.other_user_id
    }
}

/// `existing` is whatever row is stored for the unordered pair, in either direction.
pub fn check_send_request(
    requester_id: Uuid,
    recipient_id: Uuid,
    existing: Option<&Relationship>,
) -> Result<(), RelationshipError> {
    if requester_id == recipient_id {
        return Err(RelationshipError::SelfRequest);
    }

    if existing.is_some() {
        return Err(RelationshipError::AlreadyExists);
    }

    Ok(())
}

pub fn check_respond(
    relationship: &Relationship,
    responder_id: Uuid,
    decision: Decision,
) -> Result<BuddyStatus, RelationshipError> {
    if responder_id != relationship.recipient_id {
        return Err(RelationshipError::NotAuthorized);
    }

    if relationship.status != BuddyStatus::Pending {
        return Err(RelationshipError::InvalidState(relationship.status));
    }

    Ok(decision.resulting_status())
}

pub fn check_cancel(relationship: &Relationship, canceller_id: Uuid) -> Result<(), RelationshipError> {
    if canceller_id != relationship.requester_id {
        return Err(RelationshipError::NotAuthorized);
    }

    if relationship.status != BuddyStatus::Pending {
        return Err(RelationshipError::InvalidState(relationship.status));
    }

    Ok(())
}
