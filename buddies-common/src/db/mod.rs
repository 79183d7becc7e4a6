use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::bb8::Pool as AsyncPool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use std::fmt;
use std::time::Duration;

use crate::social::pickup::ClaimError;
use crate::social::proximity::MatchError;
use crate::social::relationship::RelationshipError;

pub mod buddy;
pub mod job_registry;
pub mod notification;
pub mod pickup;
pub mod profile;

pub type DbAsyncPool = AsyncPool<AsyncPgConnection>;
pub type DbAsyncConnection =
    bb8::PooledConnection<'static, AsyncDieselConnectionManager<AsyncPgConnection>>;

pub async fn create_db_async_pool(
    database_uri: &str,
    max_db_connections: u32,
    idle_timeout: Duration,
) -> DbAsyncPool {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_uri);
    AsyncPool::builder()
        .max_size(max_db_connections)
        .idle_timeout(Some(idle_timeout))
        .build(config)
        .await
        .expect("Failed to create async DB pool")
}

#[derive(Debug)]
pub enum DaoError {
    DbAsyncPoolFailure(String),
    QueryFailure(DieselError),
    Match(MatchError),
    Relationship(RelationshipError),
    Claim(ClaimError),
}

impl DaoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DaoError::QueryFailure(DieselError::NotFound))
    }

    /// The kind of constraint violation, if the query was rejected by one.
    pub fn violation_kind(&self) -> Option<&DatabaseErrorKind> {
        match self {
            DaoError::QueryFailure(DieselError::DatabaseError(kind, _)) => Some(kind),
            _ => None,
        }
    }
}

impl std::error::Error for DaoError {}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoError::DbAsyncPoolFailure(e) => {
                write!(f, "DaoError: Failed to obtain async DB connection: {e}")
            }
            DaoError::QueryFailure(e) => {
                write!(f, "DaoError: Query failed: {e}")
            }
            DaoError::Match(e) => write!(f, "DaoError: {e}"),
            DaoError::Relationship(e) => write!(f, "DaoError: {e}"),
            DaoError::Claim(e) => write!(f, "DaoError: {e}"),
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<bb8::RunError<E>> for DaoError {
    fn from(error: bb8::RunError<E>) -> Self {
        DaoError::DbAsyncPoolFailure(error.to_string())
    }
}

impl From<DieselError> for DaoError {
    fn from(error: DieselError) -> Self {
        DaoError::QueryFailure(error)
    }
}

impl From<MatchError> for DaoError {
    fn from(error: MatchError) -> Self {
        DaoError::Match(error)
    }
}

impl From<RelationshipError> for DaoError {
    fn from(error: RelationshipError) -> Self {
        DaoError::Relationship(error)
    }
}

impl From<ClaimError> for DaoError {
    fn from(error: ClaimError) -> Self {
        DaoError::Claim(error)
    }
}

#[cfg(test)]
pub mod test_utils {
    use diesel::dsl;
    use once_cell::sync::Lazy;
    use std::time::{Duration, SystemTime};
    use uuid::Uuid;

    use crate::db::{create_db_async_pool, DbAsyncConnection, DbAsyncPool};
    use crate::models::post::{NewPost, BUDDY_REQUEST_POST_TYPE};
    use crate::models::profile::NewProfile;
    use crate::schema::posts::dsl::posts;
    use crate::schema::profiles::dsl::profiles;

    const DB_USERNAME_VAR: &str = "BUDDIES_DB_USERNAME";
    const DB_PASSWORD_VAR: &str = "BUDDIES_DB_PASSWORD";
    const DB_HOSTNAME_VAR: &str = "BUDDIES_DB_HOSTNAME";
    const DB_PORT_VAR: &str = "BUDDIES_DB_PORT";
    const DB_NAME_VAR: &str = "BUDDIES_DB_NAME";
    const DB_MAX_CONNECTIONS_VAR: &str = "BUDDIES_DB_MAX_CONNECTIONS";

    pub static DB_ASYNC_POOL: Lazy<DbAsyncPool> = Lazy::new(|| {
        let username = env_or_panic(DB_USERNAME_VAR);
        let password = env_or_panic(DB_PASSWORD_VAR);
        let hostname = env_or_panic(DB_HOSTNAME_VAR);
        let port = env_or_panic(DB_PORT_VAR);
        let db_name = env_or_panic(DB_NAME_VAR);

        let max_connections = env_or_parse(DB_MAX_CONNECTIONS_VAR, 48u32);

        let db_uri = format!(
            "postgres://{}:{}@{}:{}/{}",
            username, password, hostname, port, db_name
        );

        futures::executor::block_on(create_db_async_pool(
            &db_uri,
            max_connections,
            Duration::from_secs(30),
        ))
    });

    pub fn db_async_pool() -> &'static DbAsyncPool {
        &DB_ASYNC_POOL
    }

    pub async fn db_async_conn() -> DbAsyncConnection {
        DB_ASYNC_POOL
            .get()
            .await
            .expect("Failed to obtain pooled DB connection for tests")
    }

    /// Country codes are randomized per test so that matching tests never see profiles
    /// created by other tests running against the same database.
    pub fn unique_country() -> String {
        format!("T-{}", Uuid::now_v7().simple())
    }

    #[derive(Default)]
    pub struct TestProfile<'a> {
        pub country: Option<&'a str>,
        pub city: Option<&'a str>,
        pub coordinates: Option<(f64, f64)>,
    }

    pub async fn create_profile(profile: TestProfile<'_>) -> Uuid {
        let id = Uuid::now_v7();
        let username = format!("lifter_{}", id.simple());

        let new_profile = NewProfile {
            id,
            full_name: Some("Test Lifter"),
            username: Some(&username),
            country: profile.country,
            city: profile.city,
            created_at: SystemTime::now(),
        };

        let mut conn = db_async_conn().await;
        diesel_async::RunQueryDsl::execute(
            dsl::insert_into(profiles).values(&new_profile),
            &mut conn,
        )
        .await
        .expect("Failed to insert profile");

        if let Some((latitude, longitude)) = profile.coordinates {
            super::profile::Dao::new(db_async_pool())
                .update_location(id, latitude, longitude, None, None)
                .await
                .expect("Failed to set profile location");
        }

        id
    }

    pub async fn create_buddy_request_post(owner_id: Uuid) -> Uuid {
        let id = Uuid::now_v7();
        let tags: Vec<String> = Vec::new();

        let new_post = NewPost {
            id,
            user_id: owner_id,
            post_type: BUDDY_REQUEST_POST_TYPE,
            content: Some("Need a spotter for heavy bench tonight"),
            image_url: None,
            video_url: None,
            selected_buddy_id: None,
            tags: &tags,
            created_at: SystemTime::now(),
        };

        let mut conn = db_async_conn().await;
        diesel_async::RunQueryDsl::execute(dsl::insert_into(posts).values(&new_post), &mut conn)
            .await
            .expect("Failed to insert post");

        id
    }

    fn env_or_panic(key: &str) -> String {
        std::env::var(key).unwrap_or_else(|_| panic!("Environment variable {key} must be set"))
    }

    fn env_or_parse<T>(key: &str, default: T) -> T
    where
        T: std::str::FromStr,
    {
        std::env::var(key)
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(default)
    }
}
