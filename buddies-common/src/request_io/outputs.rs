use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::social::pickup::SelectOutcome;
use crate::social::relationship::{BuddyStatus, Relationship};

#[derive(Clone, Debug, Serialize)]
pub struct OutputRelationship {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: BuddyStatus,
}

impl From<Relationship> for OutputRelationship {
    fn from(relationship: Relationship) -> Self {
        Self {
            id: relationship.id,
            requester_id: relationship.requester_id,
            recipient_id: relationship.recipient_id,
            status: relationship.status,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputClaim {
    pub pickup_id: Uuid,
    pub post_id: Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct OutputSelection {
    pub post_id: Uuid,
    pub selected_buddy_id: Uuid,
    pub outcome: SelectOutcome,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputUnreadCount {
    pub count: i64,
}
