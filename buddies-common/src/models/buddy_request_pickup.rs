use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::post::Post;
use crate::schema::buddy_request_pickups;

#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Post, foreign_key = post_id))]
#[diesel(table_name = buddy_request_pickups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BuddyRequestPickup {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = buddy_request_pickups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBuddyRequestPickup {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub created_at: SystemTime,
}
