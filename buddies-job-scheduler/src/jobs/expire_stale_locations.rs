use buddies_common::db::profile::Dao as ProfileDao;
use buddies_common::db::DbAsyncPool;

use async_trait::async_trait;
use std::time::Duration;

use crate::jobs::{Job, JobError};

/// Forgets positions that haven't been refreshed within `max_location_age` so that
/// users who stopped sharing their location drop out of nearby searches.
pub struct ExpireStaleLocationsJob {
    db_async_pool: DbAsyncPool,
    max_location_age: Duration,
    is_running: bool,
}

impl ExpireStaleLocationsJob {
    pub fn new(db_async_pool: DbAsyncPool, max_location_age: Duration) -> Self {
        Self {
            db_async_pool,
            max_location_age,
            is_running: false,
        }
    }
}

#[async_trait]
impl Job for ExpireStaleLocationsJob {
    fn name(&self) -> &'static str {
        "Expire Stale Locations"
    }

    fn is_ready(&self) -> bool {
        !self.is_running
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        self.is_running = true;

        let result = ProfileDao::new(&self.db_async_pool)
            .clear_stale_locations(self.max_location_age)
            .await;

        self.is_running = false;

        let cleared = result?;
        log::info!("Cleared {} stale locations", cleared);

        Ok(())
    }
}
