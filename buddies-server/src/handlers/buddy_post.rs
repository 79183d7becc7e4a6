use buddies_common::db::{self, DbAsyncPool};
use buddies_common::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use buddies_common::request_io::inputs::{InputBuddyRequestPost, InputBuddySelection, InputPostId};
use buddies_common::request_io::outputs::{OutputClaim, OutputSelection};
use buddies_common::social::pickup::SelectOutcome;
use buddies_common::validators::Validity;

use actix_web::{web, HttpResponse};
use std::borrow::Cow;

use crate::handlers::error::{ErrorType, HttpErrorResponse};
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

pub async fn create(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    new_post: web::Json<InputBuddyRequestPost>,
) -> Result<HttpResponse, HttpErrorResponse> {
    if let Validity::Invalid(msg) = new_post.validate() {
        return Err(HttpErrorResponse::InvalidInput(
            ErrorType::InvalidInput,
            Cow::Borrowed(msg),
        ));
    }

    let owner_id = user_access_token.0.user_id;

    let post = db::pickup::Dao::new(&db_async_pool)
        .create_buddy_request_post(
            owner_id,
            new_post.content.trim(),
            new_post.image_url.as_deref(),
            new_post.video_url.as_deref(),
            &new_post.tags,
        )
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to create buddy request post"))?;

    feed.publish(ChangeEvent::new(
        Table::Posts,
        ChangeKind::Insert,
        post.id,
        &[owner_id],
    ));

    Ok(HttpResponse::Created().json(post))
}

pub async fn pickups(
    db_async_pool: web::Data<DbAsyncPool>,
    _user_access_token: VerifiedToken<Access, FromHeader>,
    post: web::Query<InputPostId>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let claims = db::pickup::Dao::new(&db_async_pool)
        .list_claims(post.post_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to get claims"))?;

    Ok(HttpResponse::Ok().json(claims))
}

pub async fn claim(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    post: web::Json<InputPostId>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let claimant_id = user_access_token.0.user_id;

    let receipt = db::pickup::Dao::new(&db_async_pool)
        .claim(post.post_id, claimant_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to claim buddy request"))?;

    feed.publish(ChangeEvent::new(
        Table::BuddyRequestPickups,
        ChangeKind::Insert,
        receipt.pickup.id,
        &[claimant_id, receipt.owner_id],
    ));
    feed.publish(ChangeEvent::new(
        Table::Notifications,
        ChangeKind::Insert,
        receipt.notification_id,
        &[receipt.owner_id],
    ));

    Ok(HttpResponse::Created().json(OutputClaim {
        pickup_id: receipt.pickup.id,
        post_id: receipt.pickup.post_id,
    }))
}

pub async fn select(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    selection: web::Json<InputBuddySelection>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let owner_id = user_access_token.0.user_id;

    let receipt = db::pickup::Dao::new(&db_async_pool)
        .select(selection.post_id, owner_id, selection.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to select buddy"))?;

    if receipt.outcome == SelectOutcome::Selected {
        feed.publish(ChangeEvent::new(
            Table::Posts,
            ChangeKind::Update,
            selection.post_id,
            &[owner_id, selection.user_id],
        ));
    }

    if let Some(notification_id) = receipt.notification_id {
        feed.publish(ChangeEvent::new(
            Table::Notifications,
            ChangeKind::Insert,
            notification_id,
            &[selection.user_id],
        ));
    }

    Ok(HttpResponse::Ok().json(OutputSelection {
        post_id: selection.post_id,
        selected_buddy_id: selection.user_id,
        outcome: receipt.outcome,
    }))
}
