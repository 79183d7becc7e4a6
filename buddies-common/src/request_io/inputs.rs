use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::social::proximity::{Coordinates, NearbyQuery};
use crate::social::relationship::Decision;
use crate::validators::{self, Validity};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub country: Option<String>,
    pub city: Option<String>,
}

impl InputLocation {
    pub fn validate(&self) -> Validity {
        if let Validity::Invalid(msg) = validators::validate_coordinates(self.latitude, self.longitude)
        {
            return Validity::Invalid(msg);
        }

        for name in [&self.country, &self.city].into_iter().flatten() {
            if let Validity::Invalid(msg) = validators::validate_location_name(name) {
                return Validity::Invalid(msg);
            }
        }

        Validity::Valid
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InputNearbyQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl InputNearbyQuery {
    /// Coordinates are only used when both halves are present and valid.
    pub fn coordinates(&self) -> Result<Option<Coordinates>, &'static str> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                if let Validity::Invalid(msg) = validators::validate_coordinates(latitude, longitude)
                {
                    return Err(msg);
                }

                Ok(Some(Coordinates {
                    latitude,
                    longitude,
                }))
            }
            (None, None) => Ok(None),
            _ => Err("Latitude and longitude must be provided together"),
        }
    }

    pub fn query(&self) -> NearbyQuery {
        NearbyQuery {
            search: self.search.clone(),
            limit: self.limit,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputUserId {
    pub user_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputRelationshipId {
    pub relationship_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputBuddyRequestResponse {
    pub relationship_id: Uuid,
    pub decision: Decision,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputBuddyRequestPost {
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl InputBuddyRequestPost {
    pub fn validate(&self) -> Validity {
        if let Validity::Invalid(msg) = validators::validate_post_content(&self.content) {
            return Validity::Invalid(msg);
        }

        validators::validate_tags(&self.tags)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputPostId {
    pub post_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputBuddySelection {
    pub post_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputNotificationId {
    pub notification_id: Uuid,
}
