use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::notifications;

pub const BUDDY_REQUEST_NOTIFICATION: &str = "buddy_request";
pub const BUDDY_ACCEPTED_NOTIFICATION: &str = "buddy_accepted";
pub const BUDDY_REQUEST_PICKUP_NOTIFICATION: &str = "buddy_request_pickup";
pub const BUDDY_SELECTED_NOTIFICATION: &str = "buddy_selected";

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewNotification<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: &'a str,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: SystemTime,
}
