mod clear_old_notifications;
mod expire_stale_locations;

pub use clear_old_notifications::ClearOldNotificationsJob;
pub use expire_stale_locations::ExpireStaleLocationsJob;

use buddies_common::db::DaoError;

use async_trait::async_trait;
use std::fmt;

#[derive(Debug)]
pub enum JobError {
    DaoFailure(DaoError),
    NotReady,
}

impl std::error::Error for JobError {}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::DaoFailure(e) => write!(f, "JobError: {e}"),
            JobError::NotReady => {
                write!(f, "JobError: Attempted execution before job was ready")
            }
        }
    }
}

impl From<DaoError> for JobError {
    fn from(e: DaoError) -> Self {
        JobError::DaoFailure(e)
    }
}

#[async_trait]
pub trait Job: Send {
    fn name(&self) -> &'static str;
    fn is_ready(&self) -> bool;
    async fn execute(&mut self) -> Result<(), JobError>;
}
