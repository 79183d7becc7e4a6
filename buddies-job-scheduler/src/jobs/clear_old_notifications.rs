use buddies_common::db::notification::Dao as NotificationDao;
use buddies_common::db::DbAsyncPool;

use async_trait::async_trait;
use std::time::Duration;

use crate::jobs::{Job, JobError};

pub struct ClearOldNotificationsJob {
    db_async_pool: DbAsyncPool,
    max_notification_age: Duration,
    is_running: bool,
}

impl ClearOldNotificationsJob {
    pub fn new(db_async_pool: DbAsyncPool, max_notification_age: Duration) -> Self {
        Self {
            db_async_pool,
            max_notification_age,
            is_running: false,
        }
    }
}

#[async_trait]
impl Job for ClearOldNotificationsJob {
    fn name(&self) -> &'static str {
        "Clear Old Notifications"
    }

    fn is_ready(&self) -> bool {
        !self.is_running
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        self.is_running = true;

        let result = NotificationDao::new(&self.db_async_pool)
            .clear_old_read_notifications(self.max_notification_age)
            .await;

        self.is_running = false;

        let deleted = result?;
        log::info!("Deleted {} old read notifications", deleted);

        Ok(())
    }
}
