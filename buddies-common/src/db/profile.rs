use diesel::{AsChangeset, ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::db::{DaoError, DbAsyncPool};
use crate::models::profile::StoredLocation;
use crate::social::proximity::{
    self, Coordinates, MatchError, MatchOrigin, NearbyCandidate, NearbyQuery, NearbyUser,
};

use crate::schema::profiles as profile_fields;
use crate::schema::profiles::dsl::profiles;

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::profiles)]
struct LocationChanges<'a> {
    latitude: Option<f64>,
    longitude: Option<f64>,
    country: Option<&'a str>,
    city: Option<&'a str>,
    location_updated_at: Option<SystemTime>,
}

type CandidateRow = (
    Uuid,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
);

pub struct Dao {
    db_async_pool: DbAsyncPool,
}

impl Dao {
    pub fn new(db_async_pool: &DbAsyncPool) -> Self {
        Self {
            db_async_pool: db_async_pool.clone(),
        }
    }

    /// Overwrites the user's location. Country and city are left untouched when `None`.
    pub async fn update_location(
        &self,
        user_id: Uuid,
        latitude: f64,
        longitude: f64,
        country: Option<&str>,
        city: Option<&str>,
    ) -> Result<(), DaoError> {
        let changes = LocationChanges {
            latitude: Some(latitude),
            longitude: Some(longitude),
            country,
            city,
            location_updated_at: Some(SystemTime::now()),
        };

        let mut conn = self.db_async_pool.get().await?;
        let affected_row_count = diesel::update(profiles.find(user_id))
            .set(&changes)
            .execute(&mut conn)
            .await?;

        if affected_row_count == 0 {
            return Err(DaoError::QueryFailure(diesel::result::Error::NotFound));
        }

        Ok(())
    }

    pub async fn get_location(&self, user_id: Uuid) -> Result<StoredLocation, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        Ok(profiles
            .select((
                profile_fields::latitude,
                profile_fields::longitude,
                profile_fields::country,
                profile_fields::city,
            ))
            .find(user_id)
            .first::<StoredLocation>(&mut conn)
            .await?)
    }

    /// Profiles in `country` that have a known position, other than `user_id`.
    pub async fn get_match_candidates(
        &self,
        user_id: Uuid,
        country: &str,
    ) -> Result<Vec<NearbyCandidate>, DaoError> {
        let mut conn = self.db_async_pool.get().await?;
        let rows = profiles
            .select((
                profile_fields::id,
                profile_fields::full_name,
                profile_fields::username,
                profile_fields::bio,
                profile_fields::avatar_url,
                profile_fields::country,
                profile_fields::city,
                profile_fields::latitude,
                profile_fields::longitude,
            ))
            .filter(profile_fields::country.eq(country))
            .filter(profile_fields::id.ne(user_id))
            .filter(profile_fields::latitude.is_not_null())
            .filter(profile_fields::longitude.is_not_null())
            .order(profile_fields::id)
            .load::<CandidateRow>(&mut conn)
            .await?;

        let candidates = rows
            .into_iter()
            .filter_map(
                |(id, full_name, username, bio, avatar_url, country, city, lat, lon)| {
                    Some(NearbyCandidate {
                        user_id: id,
                        full_name,
                        username,
                        bio,
                        avatar_url,
                        country,
                        city,
                        coordinates: Coordinates {
                            latitude: lat?,
                            longitude: lon?,
                        },
                    })
                },
            )
            .collect();

        Ok(candidates)
    }

    /// Users near `user_id`, nearest first. `requested` overrides the stored position for
    /// this lookup only.
    pub async fn find_nearby_buddies(
        &self,
        user_id: Uuid,
        requested: Option<Coordinates>,
        query: &NearbyQuery,
    ) -> Result<Vec<NearbyUser>, DaoError> {
        let stored = self.get_location(user_id).await.map_err(|e| {
            if e.is_not_found() {
                DaoError::Match(MatchError::LocationUnavailable)
            } else {
                e
            }
        })?;

        let stored_coordinates = match (stored.latitude, stored.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };

        let origin = MatchOrigin {
            user_id,
            coordinates: Coordinates::resolve(requested, stored_coordinates)?,
            country: stored.country,
            city: stored.city,
        };

        let Some(country) = origin.country.as_deref() else {
            return Ok(Vec::new());
        };

        let candidates = self.get_match_candidates(user_id, country).await?;
        Ok(proximity::rank_candidates(&origin, candidates, query))
    }

    /// Forgets positions that haven't been refreshed within `max_location_age`.
    pub async fn clear_stale_locations(
        &self,
        max_location_age: Duration,
    ) -> Result<usize, DaoError> {
        let cutoff = SystemTime::now() - max_location_age;

        let mut conn = self.db_async_pool.get().await?;
        let cleared = diesel::update(
            profiles.filter(profile_fields::location_updated_at.lt(cutoff)),
        )
        .set((
            profile_fields::latitude.eq(None::<f64>),
            profile_fields::longitude.eq(None::<f64>),
            profile_fields::location_updated_at.eq(None::<SystemTime>),
        ))
        .execute(&mut conn)
        .await?;

        Ok(cleared)
    }
}
