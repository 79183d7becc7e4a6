use diesel::result::DatabaseErrorKind;
use diesel::{dsl, ExpressionMethods, JoinOnDsl, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::notification::insert_notification;
use crate::db::{DaoError, DbAsyncPool};
use crate::models::buddy_request_pickup::{BuddyRequestPickup, NewBuddyRequestPickup};
use crate::models::notification::{
    BUDDY_REQUEST_PICKUP_NOTIFICATION, BUDDY_SELECTED_NOTIFICATION,
};
use crate::models::post::{NewPost, Post, BUDDY_REQUEST_POST_TYPE};
use crate::models::profile::ProfileSummary;
use crate::social::pickup::{self, ClaimError, PostClaimState, SelectOutcome};

use crate::schema::buddy_request_pickups as pickup_fields;
use crate::schema::buddy_request_pickups::dsl::buddy_request_pickups;
use crate::schema::posts as post_fields;
use crate::schema::posts::dsl::posts;
use crate::schema::profiles as profile_fields;
use crate::schema::profiles::dsl::profiles;

#[derive(Clone, Debug, Serialize)]
pub struct ClaimEntry {
    pub user: ProfileSummary,
    pub claimed_at: SystemTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct PostClaims {
    pub post_id: Uuid,
    pub owner_id: Uuid,
    pub selected_buddy_id: Option<Uuid>,
    pub claims: Vec<ClaimEntry>,
    pub remaining_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct ClaimReceipt {
    pub pickup: BuddyRequestPickup,
    pub owner_id: Uuid,
    pub notification_id: Uuid,
}

#[derive(Clone, Copy, Debug)]
pub struct SelectReceipt {
    pub outcome: SelectOutcome,
    pub notification_id: Option<Uuid>,
}

/// Locks the post row for the rest of the transaction and reads its claim state. Every
/// claim or selection on a post goes through here first, so they run one at a time.
async fn lock_claim_state(
    conn: &mut AsyncPgConnection,
    post_id: Uuid,
) -> Result<PostClaimState, DaoError> {
    let post = posts
        .find(post_id)
        .for_update()
        .first::<Post>(conn)
        .await
        .optional()?
        .ok_or(ClaimError::PostDoesNotExist)?;

    if post.post_type != BUDDY_REQUEST_POST_TYPE {
        return Err(ClaimError::NotABuddyRequest.into());
    }

    let claimant_ids = buddy_request_pickups
        .select(pickup_fields::user_id)
        .filter(pickup_fields::post_id.eq(post_id))
        .order(pickup_fields::created_at.asc())
        .load::<Uuid>(conn)
        .await?;

    Ok(PostClaimState {
        owner_id: post.user_id,
        selected_buddy_id: post.selected_buddy_id,
        claimant_ids,
    })
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

    pub async fn create_buddy_request_post(
        &self,
        owner_id: Uuid,
        content: &str,
        image_url: Option<&str>,
        video_url: Option<&str>,
        tags: &[String],
    ) -> Result<Post, DaoError> {
        let new_post = NewPost {
            id: Uuid::now_v7(),
            user_id: owner_id,
            post_type: BUDDY_REQUEST_POST_TYPE,
            content: Some(content),
            image_url,
            video_url,
            selected_buddy_id: None,
            tags,
            created_at: SystemTime::now(),
        };

        let mut conn = self.db_async_pool.get().await?;
        Ok(dsl::insert_into(posts)
            .values(&new_post)
            .get_result::<Post>(&mut conn)
            .await?)
    }

    // Runs at read committed so that the claim count is read after the post lock is held,
    // not from a snapshot taken before it.
    pub async fn claim(&self, post_id: Uuid, user_id: Uuid) -> Result<ClaimReceipt, DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        let result = db_connection
            .build_transaction()
            .read_committed()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let state = lock_claim_state(conn, post_id).await?;
                    pickup::check_claim(&state, user_id)?;

                    let new_pickup = NewBuddyRequestPickup {
                        id: Uuid::now_v7(),
                        post_id,
                        user_id,
                        created_at: SystemTime::now(),
                    };

                    let pickup = dsl::insert_into(buddy_request_pickups)
                        .values(&new_pickup)
                        .get_result::<BuddyRequestPickup>(conn)
                        .await?;

                    let notification_id = insert_notification(
                        conn,
                        state.owner_id,
                        BUDDY_REQUEST_PICKUP_NOTIFICATION,
                        serde_json::json!({
                            "post_id": post_id,
                            "claimant_id": user_id,
                        }),
                    )
                    .await?;

                    Ok(ClaimReceipt {
                        pickup,
                        owner_id: state.owner_id,
                        notification_id,
                    })
                })
            })
            .await;

        result.map_err(|e| match e.violation_kind() {
            Some(DatabaseErrorKind::UniqueViolation) => ClaimError::AlreadyClaimed.into(),
            _ => e,
        })
    }

    pub async fn select(
        &self,
        post_id: Uuid,
        owner_id: Uuid,
        chosen_user_id: Uuid,
    ) -> Result<SelectReceipt, DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .read_committed()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let state = lock_claim_state(conn, post_id).await?;
                    let outcome = pickup::check_select(&state, owner_id, chosen_user_id)?;

                    if outcome == SelectOutcome::Unchanged {
                        return Ok(SelectReceipt {
                            outcome,
                            notification_id: None,
                        });
                    }

                    let affected_row_count = dsl::update(
                        posts
                            .find(post_id)
                            .filter(post_fields::selected_buddy_id.is_null()),
                    )
                    .set(post_fields::selected_buddy_id.eq(chosen_user_id))
                    .execute(conn)
                    .await?;

                    if affected_row_count == 0 {
                        return Err(ClaimError::AlreadyDecided.into());
                    }

                    let notification_id = insert_notification(
                        conn,
                        chosen_user_id,
                        BUDDY_SELECTED_NOTIFICATION,
                        serde_json::json!({
                            "post_id": post_id,
                            "owner_id": owner_id,
                        }),
                    )
                    .await?;

                    Ok(SelectReceipt {
                        outcome,
                        notification_id: Some(notification_id),
                    })
                })
            })
            .await
    }

    /// The post's selection and its claimants in claim order.
    pub async fn list_claims(&self, post_id: Uuid) -> Result<PostClaims, DaoError> {
        let mut conn = self.db_async_pool.get().await?;

        let post = posts
            .find(post_id)
            .first::<Post>(&mut conn)
            .await
            .optional()?
            .ok_or(ClaimError::PostDoesNotExist)?;

        if post.post_type != BUDDY_REQUEST_POST_TYPE {
            return Err(ClaimError::NotABuddyRequest.into());
        }

        let claims = buddy_request_pickups
            .inner_join(profiles.on(profile_fields::id.eq(pickup_fields::user_id)))
            .select((
                (
                    profile_fields::id,
                    profile_fields::full_name,
                    profile_fields::username,
                    profile_fields::avatar_url,
                ),
                pickup_fields::created_at,
            ))
            .filter(pickup_fields::post_id.eq(post_id))
            .order(pickup_fields::created_at.asc())
            .load::<(ProfileSummary, SystemTime)>(&mut conn)
            .await?
            .into_iter()
            .map(|(user, claimed_at)| ClaimEntry { user, claimed_at })
            .collect::<Vec<_>>();

        Ok(PostClaims {
            post_id,
            owner_id: post.user_id,
            selected_buddy_id: post.selected_buddy_id,
            remaining_capacity: pickup::PICKUP_CAPACITY.saturating_sub(claims.len()),
            claims,
        })
    }
}
