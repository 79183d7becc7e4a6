use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::posts;

pub const BUDDY_REQUEST_POST_TYPE: &str = "buddy_request";

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_type: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub selected_buddy_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPost<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_type: &'a str,
    pub content: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub video_url: Option<&'a str>,
    pub selected_buddy_id: Option<Uuid>,
    pub tags: &'a [String],
    pub created_at: SystemTime,
}
