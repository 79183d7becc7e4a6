use diesel::{dsl, ExpressionMethods, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::notification::{NewNotification, Notification};

use crate::schema::notifications as notification_fields;
use crate::schema::notifications::dsl::notifications;

/// Inserts a notification on an existing connection so it commits or rolls back together
/// with the change that caused it.
pub(crate) async fn insert_notification(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    notification_type: &str,
    data: serde_json::Value,
) -> Result<Uuid, diesel::result::Error> {
    let new_notification = NewNotification {
        id: Uuid::now_v7(),
        user_id,
        notification_type,
        data,
        read: false,
        created_at: SystemTime::now(),
    };

    dsl::insert_into(notifications)
        .values(&new_notification)
        .execute(conn)
        .await?;

    Ok(new_notification.id)
}

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// Newest first.
    pub async fn get_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(notifications
            .filter(notification_fields::user_id.eq(user_id))
            .order((
                notification_fields::created_at.desc(),
                notification_fields::id.desc(),
            ))
            .load::<Notification>(&mut conn)
            .await?)
    }

    pub async fn get_unread_count(&self, user_id: Uuid) -> Result<i64, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(notifications
            .filter(notification_fields::user_id.eq(user_id))
            .filter(notification_fields::read.eq(false))
            .count()
            .get_result::<i64>(&mut conn)
            .await?)
    }

    /// Fails with `NotFound` if the notification doesn't exist or belongs to someone else.
    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let affected_row_count = diesel::update(
            notifications
                .find(notification_id)
                .filter(notification_fields::user_id.eq(user_id)),
        )
        .set(notification_fields::read.eq(true))
        .execute(&mut conn)
        .await?;

        if affected_row_count == 0 {
            return Err(DaoError::QueryFailure(diesel::result::Error::NotFound));
        }

        Ok(())
    }

    pub async fn clear_old_read_notifications(
        &self,
        max_notification_age: Duration,
    ) -> Result<usize, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(diesel::delete(
            notifications
                .filter(notification_fields::read.eq(true))
                .filter(
                    notification_fields::created_at
                        .lt(SystemTime::now() - max_notification_age),
                ),
        )
        .execute(&mut conn)
        .await?)
    }
}
