use buddies_common::db::{self, DaoError, DbAsyncPool};
use buddies_common::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use buddies_common::request_io::inputs::{
    InputBuddyRequestResponse, InputNearbyQuery, InputRelationshipId, InputUserId,
};
use buddies_common::request_io::outputs::OutputRelationship;
use buddies_common::social::proximity::MatchError;
use buddies_common::social::relationship::Relationship;

use actix_web::{web, HttpResponse};
use std::borrow::Cow;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::error::{ErrorType, HttpErrorResponse};
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;
use crate::views::{BuddyView, BuddyViewCache, Lookup};

pub async fn nearby(
    db_async_pool: web::Data<DbAsyncPool>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    query: web::Query<InputNearbyQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let requested = query
        .coordinates()
        .map_err(|msg| HttpErrorResponse::InvalidInput(ErrorType::InvalidInput, Cow::Borrowed(msg)))?;

    let nearby = match db::profile::Dao::new(&db_async_pool)
        .find_nearby_buddies(user_access_token.0.user_id, requested, &query.query())
        .await
    {
        Ok(n) => n,
        Err(DaoError::Match(e)) => return Err(e.into()),
        Err(e) => {
            log::error!("{e}");
            return Err(MatchError::MatchServiceUnavailable.into());
        }
    };

    Ok(HttpResponse::Ok().json(nearby))
}

pub async fn send_request(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    cache: web::Data<BuddyViewCache>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    recipient: web::Json<InputUserId>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let change = db::buddy::Dao::new(&db_async_pool)
        .send_request(user_access_token.0.user_id, recipient.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to send buddy request"))?;

    publish_relationship_change(
        &feed,
        &cache,
        ChangeKind::Insert,
        &change.relationship,
    );

    if let Some(notification_id) = change.notification_id {
        publish_notification(&feed, notification_id, change.relationship.recipient_id);
    }

    Ok(HttpResponse::Created().json(OutputRelationship::from(change.relationship)))
}

pub async fn cancel_request(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    cache: web::Data<BuddyViewCache>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    relationship: web::Json<InputRelationshipId>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let cancelled = db::buddy::Dao::new(&db_async_pool)
        .cancel_request(relationship.relationship_id, user_access_token.0.user_id)
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to cancel buddy request"))?;

    publish_relationship_change(&feed, &cache, ChangeKind::Delete, &cancelled);

    Ok(HttpResponse::Ok().finish())
}

pub async fn respond(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    cache: web::Data<BuddyViewCache>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    response: web::Json<InputBuddyRequestResponse>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let change = db::buddy::Dao::new(&db_async_pool)
        .respond(
            response.relationship_id,
            user_access_token.0.user_id,
            response.decision,
        )
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to respond to buddy request"))?;

    publish_relationship_change(
        &feed,
        &cache,
        ChangeKind::Update,
        &change.relationship,
    );

    if let Some(notification_id) = change.notification_id {
        publish_notification(&feed, notification_id, change.relationship.requester_id);
    }

    Ok(HttpResponse::Ok().json(OutputRelationship::from(change.relationship)))
}

pub async fn all_pending(
    db_async_pool: web::Data<DbAsyncPool>,
    cache: web::Data<BuddyViewCache>,
    user_access_token: VerifiedToken<Access, FromHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let entries = load_view(
        &db_async_pool,
        &cache,
        user_access_token.0.user_id,
        BuddyView::PendingRequests,
    )
    .await?;

    Ok(HttpResponse::Ok().json(&*entries))
}

pub async fn all(
    db_async_pool: web::Data<DbAsyncPool>,
    cache: web::Data<BuddyViewCache>,
    user_access_token: VerifiedToken<Access, FromHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let entries = load_view(
        &db_async_pool,
        &cache,
        user_access_token.0.user_id,
        BuddyView::Buddies,
    )
    .await?;

    Ok(HttpResponse::Ok().json(&*entries))
}

async fn load_view(
    db_async_pool: &DbAsyncPool,
    cache: &BuddyViewCache,
    user_id: Uuid,
    view: BuddyView,
) -> Result<Arc<Vec<db::buddy::BuddyEntry>>, HttpErrorResponse> {
    let ticket = match cache.lookup(user_id, view) {
        Lookup::Hit(entries) => return Ok(entries),
        Lookup::Miss(ticket) => ticket,
    };

    let dao = db::buddy::Dao::new(db_async_pool);
    let entries = match view {
        BuddyView::PendingRequests => dao.get_pending_requests(user_id).await,
        BuddyView::Buddies => dao.get_buddies(user_id).await,
    }
    .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to get buddy list"))?;

    let entries = Arc::new(entries);
    cache.fill(ticket, Arc::clone(&entries));

    Ok(entries)
}

// The listener task does the same invalidation, but it runs asynchronously. Doing it here
// too means the caller's next read already sees its own change.
fn publish_relationship_change(
    feed: &ChangeFeed,
    cache: &BuddyViewCache,
    kind: ChangeKind,
    relationship: &Relationship,
) {
    let parties = [relationship.requester_id, relationship.recipient_id];

    for user_id in parties {
        cache.invalidate_user(user_id);
    }

    feed.publish(ChangeEvent::new(
        Table::Buddies,
        kind,
        relationship.id,
        &parties,
    ));
}

fn publish_notification(feed: &ChangeFeed, notification_id: Uuid, user_id: Uuid) {
    feed.publish(ChangeEvent::new(
        Table::Notifications,
        ChangeKind::Insert,
        notification_id,
        &[user_id],
    ));
}
