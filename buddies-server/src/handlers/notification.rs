use buddies_common::db::{self, DbAsyncPool};
use buddies_common::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use buddies_common::request_io::inputs::InputNotificationId;
use buddies_common::request_io::outputs::OutputUnreadCount;

use actix_web::{web, HttpResponse};

use crate::handlers::error::HttpErrorResponse;
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

pub async fn all(
    db_async_pool: web::Data<DbAsyncPool>,
    user_access_token: VerifiedToken<Access, FromHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let notifications = db::notification::Dao::new(&db_async_pool)
        .get_notifications(user_access_token.0.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to get notifications"))?;

    Ok(HttpResponse::Ok().json(notifications))
}

pub async fn unread_count(
    db_async_pool: web::Data<DbAsyncPool>,
    user_access_token: VerifiedToken<Access, FromHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let count = db::notification::Dao::new(&db_async_pool)
        .get_unread_count(user_access_token.0.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to count unread notifications"))?;

    Ok(HttpResponse::Ok().json(OutputUnreadCount { count }))
}

pub async fn mark_read(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    notification: web::Json<InputNotificationId>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_id = user_access_token.0.user_id;

    db::notification::Dao::new(&db_async_pool)
        .mark_read(notification.notification_id, user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to mark notification as read"))?;

    feed.publish(ChangeEvent::new(
        Table::Notifications,
        ChangeKind::Update,
        notification.notification_id,
        &[user_id],
    ));

    Ok(HttpResponse::Ok().finish())
}
