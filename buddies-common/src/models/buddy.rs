use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::buddies;

/// A directed proposal between two users. `user_id` sent the request and `buddy_id`
/// received it.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = buddies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Buddy {
    pub id: Uuid,
    pub user_id: Uuid,
    pub buddy_id: Uuid,
    pub status: String,
    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = buddies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBuddy<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub buddy_id: Uuid,
    pub status: &'a str,
    pub created_at: SystemTime,
}
