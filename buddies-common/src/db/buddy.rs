use diesel::result::DatabaseErrorKind;
use diesel::{dsl, BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use std::collections::HashMap;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::notification::insert_notification;
use crate::db::{DaoError, DbAsyncPool};
use crate::models::buddy::{Buddy, NewBuddy};
use crate::models::notification::{BUDDY_ACCEPTED_NOTIFICATION, BUDDY_REQUEST_NOTIFICATION};
use crate::models::profile::ProfileSummary;
use crate::social::relationship::{
    self, BuddyLink, BuddyStatus, Decision, Relationship, RelationshipError,
};

use crate::schema::buddies as buddy_fields;
use crate::schema::buddies::dsl::buddies;
use crate::schema::profiles as profile_fields;
use crate::schema::profiles::dsl::profiles;

/// A relationship as one of its parties sees it, with the other party's profile.
#[derive(Clone, Debug, Serialize)]
pub struct BuddyEntry {
    #[serde(flatten)]
    pub link: BuddyLink,
    pub other_user: Option<ProfileSummary>,
    pub created_at: SystemTime,
}

/// The result of a mutation, with the notification it produced, if any.
#[derive(Clone, Copy, Debug)]
pub struct RelationshipChange {
    pub relationship: Relationship,
    pub notification_id: Option<Uuid>,
}

impl TryFrom<Buddy> for Relationship {
    type Error = RelationshipError;

    fn try_from(row: Buddy) -> Result<Self, Self::Error> {
        Ok(Relationship {
            id: row.id,
            requester_id: row.user_id,
            recipient_id: row.buddy_id,
            status: row.status.parse()?,
        })
    }
}

async fn find_pair(
    conn: &mut AsyncPgConnection,
    user_a: Uuid,
    user_b: Uuid,
) -> Result<Option<Buddy>, diesel::result::Error> {
    buddies
        .filter(
            (buddy_fields::user_id.eq(user_a).and(buddy_fields::buddy_id.eq(user_b)))
                .or(buddy_fields::user_id.eq(user_b).and(buddy_fields::buddy_id.eq(user_a))),
        )
        .first::<Buddy>(conn)
        .await
        .optional()
}

async fn lock_relationship(
    conn: &mut AsyncPgConnection,
    relationship_id: Uuid,
) -> Result<Relationship, DaoError> {
    let row = buddies
        .find(relationship_id)
        .for_update()
        .first::<Buddy>(conn)
        .await
        .optional()?
        .ok_or(RelationshipError::DoesNotExist)?;

    Ok(Relationship::try_from(row)?)
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

    pub async fn send_request(
        &self,
        requester_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<RelationshipChange, DaoError> {
        relationship::check_send_request(requester_id, recipient_id, None)?;

        let mut db_connection = self.db_async_pool.get().await?;

        let result = db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let existing = find_pair(conn, requester_id, recipient_id)
                        .await?
                        .map(Relationship::try_from)
                        .transpose()?;

                    relationship::check_send_request(
                        requester_id,
                        recipient_id,
                        existing.as_ref(),
                    )?;

                    let new_buddy = NewBuddy {
                        id: Uuid::now_v7(),
                        user_id: requester_id,
                        buddy_id: recipient_id,
                        status: BuddyStatus::Pending.as_str(),
                        created_at: SystemTime::now(),
                    };

                    dsl::insert_into(buddies)
                        .values(&new_buddy)
                        .execute(conn)
                        .await?;

                    let notification_id = insert_notification(
                        conn,
                        recipient_id,
                        BUDDY_REQUEST_NOTIFICATION,
                        serde_json::json!({
                            "relationship_id": new_buddy.id,
                            "requester_id": requester_id,
                        }),
                    )
                    .await?;

                    Ok(RelationshipChange {
                        relationship: Relationship {
                            id: new_buddy.id,
                            requester_id,
                            recipient_id,
                            status: BuddyStatus::Pending,
                        },
                        notification_id: Some(notification_id),
                    })
                })
            })
            .await;

        // A concurrent request for the same pair loses on the unordered-pair index, and a
        // recipient without a profile fails the foreign key
        result.map_err(|e| match e.violation_kind() {
            Some(DatabaseErrorKind::UniqueViolation) => RelationshipError::AlreadyExists.into(),
            Some(DatabaseErrorKind::ForeignKeyViolation) => RelationshipError::DoesNotExist.into(),
            _ => e,
        })
    }

    pub async fn respond(
        &self,
        relationship_id: Uuid,
        responder_id: Uuid,
        decision: Decision,
    ) -> Result<RelationshipChange, DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let mut relationship = lock_relationship(conn, relationship_id).await?;
                    let new_status =
                        relationship::check_respond(&relationship, responder_id, decision)?;

                    dsl::update(buddies.find(relationship_id))
                        .set(buddy_fields::status.eq(new_status.as_str()))
                        .execute(conn)
                        .await?;

                    let notification_id = if new_status == BuddyStatus::Accepted {
                        Some(
                            insert_notification(
                                conn,
                                relationship.requester_id,
                                BUDDY_ACCEPTED_NOTIFICATION,
                                serde_json::json!({
                                    "relationship_id": relationship.id,
                                    "buddy_id": relationship.recipient_id,
                                }),
                            )
                            .await?,
                        )
                    } else {
                        None
                    };

                    relationship.status = new_status;
                    Ok(RelationshipChange {
                        relationship,
                        notification_id,
                    })
                })
            })
            .await
    }

    /// Withdraws a request that hasn't been answered yet.
    pub async fn cancel_request(
        &self,
        relationship_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Relationship, DaoError> {
        let mut db_connection = self.db_async_pool.get().await?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                Box::pin(async move {
                    let relationship = lock_relationship(conn, relationship_id).await?;
                    relationship::check_cancel(&relationship, requester_id)?;

                    diesel::delete(buddies.find(relationship_id))
                        .execute(conn)
                        .await?;

                    Ok(relationship)
                })
            })
            .await
    }

    #[cfg(test)]
    pub async fn get_relationship(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Option<Relationship>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let row = find_pair(&mut conn, user_a, user_b).await?;

        Ok(row.map(Relationship::try_from).transpose()?)
    }

    /// Requests waiting for `user_id` to answer, oldest first.
    pub async fn get_pending_requests(&self, user_id: Uuid) -> Result<Vec<BuddyEntry>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let rows = buddies
            .filter(buddy_fields::buddy_id.eq(user_id))
            .filter(buddy_fields::status.eq(BuddyStatus::Pending.as_str()))
            .order(buddy_fields::created_at.asc())
            .load::<Buddy>(&mut conn)
            .await?;

        entries_for_viewer(&mut conn, rows, user_id).await
    }

    /// Accepted relationships on either side. This is also the chat roster.
    pub async fn get_buddies(&self, user_id: Uuid) -> Result<Vec<BuddyEntry>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let rows = buddies
            .filter(
                buddy_fields::user_id
                    .eq(user_id)
                    .or(buddy_fields::buddy_id.eq(user_id)),
            )
            .filter(buddy_fields::status.eq(BuddyStatus::Accepted.as_str()))
            .order(buddy_fields::created_at.desc())
            .load::<Buddy>(&mut conn)
            .await?;

        entries_for_viewer(&mut conn, rows, user_id).await
    }
}

async fn entries_for_viewer(
    conn: &mut AsyncPgConnection,
    rows: Vec<Buddy>,
    viewer: Uuid,
) -> Result<Vec<BuddyEntry>, DaoError> {
    let mut links = Vec::with_capacity(rows.len());
    for row in rows {
        let created_at = row.created_at;
        let relationship = Relationship::try_from(row)?;

        if let Some(link) = relationship.link_for(viewer) {
            links.push((link, created_at));
        }
    }

    let other_ids: Vec<Uuid> = links.iter().map(|(link, _)| link.other_party()).collect();
    let mut summaries: HashMap<Uuid, ProfileSummary> = profiles
        .select((
            profile_fields::id,
            profile_fields::full_name,
            profile_fields::username,
            profile_fields::avatar_url,
        ))
        .filter(profile_fields::id.eq_any(&other_ids))
        .load::<ProfileSummary>(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(links
        .into_iter()
        .map(|(link, created_at)| BuddyEntry {
            other_user: summaries.remove(&link.other_party()),
            link,
            created_at,
        })
        .collect())
}
