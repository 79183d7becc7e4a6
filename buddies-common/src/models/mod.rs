pub mod buddy;
pub mod buddy_request_pickup;
pub mod job_registry_item;
pub mod notification;
pub mod post;
pub mod profile;
