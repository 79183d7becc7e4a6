use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::profiles;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,

    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_updated_at: Option<SystemTime>,

    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewProfile<'a> {
    pub id: Uuid,
    pub full_name: Option<&'a str>,
    pub username: Option<&'a str>,
    pub country: Option<&'a str>,
    pub city: Option<&'a str>,
    pub created_at: SystemTime,
}

/// The columns the matcher and the buddy lists need to show another user.
#[derive(Clone, Debug, Serialize, Deserialize, Queryable)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileSummary {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Queryable)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StoredLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country: Option<String>,
    pub city: Option<String>,
}
