use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::ErrorCategory;

const EARTH_RADIUS_KM: f64 = 6371.0;

pub const DEFAULT_NEARBY_LIMIT: usize = 50;
pub const MAX_NEARBY_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchError {
    LocationUnavailable,
    MatchServiceUnavailable,
}

impl MatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MatchError::LocationUnavailable => ErrorCategory::Validation,
            MatchError::MatchServiceUnavailable => ErrorCategory::ServiceUnavailable,
        }
    }
}

impl std::error::Error for MatchError {}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::LocationUnavailable => {
                write!(f, "MatchError: No location is known for the requesting user")
            }
            MatchError::MatchServiceUnavailable => {
                write!(f, "MatchError: Candidate lookup failed")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Picks the coordinates sent with the request, falling back to the stored ones.
    pub fn resolve(
        requested: Option<Coordinates>,
        stored: Option<Coordinates>,
    ) -> Result<Coordinates, MatchError> {
        requested.or(stored).ok_or(MatchError::LocationUnavailable)
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

#[derive(Clone, Debug)]
pub struct MatchOrigin {
    pub user_id: Uuid,
    pub coordinates: Coordinates,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NearbyCandidate {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub coordinates: Coordinates,
}

#[derive(Clone, Debug, Serialize)]
pub struct NearbyUser {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub distance_km: f64,
}

#[derive(Clone, Debug, Default)]
pub struct NearbyQuery {
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// Whether a candidate in `country`/`city` is a match for the origin.
///
/// A shared country is sufficient; a shared city is only a refinement of it. Users without
/// a country never match.
pub fn is_location_match(
    origin: &MatchOrigin,
    country: Option<&str>,
    city: Option<&str>,
) -> bool {
    let Some(origin_country) = origin.country.as_deref() else {
        return false;
    };

    let country_match = country == Some(origin_country);
    let city_match = origin.city.is_some() && city == origin.city.as_deref();

    (city_match && country_match) || country_match
}

/// Applies the matching policy to candidates that already carry a distance and orders them
/// nearest first. The sort is stable, so equal distances keep their incoming order.
pub fn select_matches(origin: &MatchOrigin, mut scored: Vec<NearbyUser>) -> Vec<NearbyUser> {
    scored.retain(|candidate| {
        candidate.user_id != origin.user_id
            && is_location_match(origin, candidate.country.as_deref(), candidate.city.as_deref())
    });

    scored.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    scored
}

/// Scores every candidate against the origin, applies the matching policy, and then the
/// optional name search and result limit.
pub fn rank_candidates(
    origin: &MatchOrigin,
    candidates: Vec<NearbyCandidate>,
    query: &NearbyQuery,
) -> Vec<NearbyUser> {
    let scored = candidates
        .into_iter()
        .map(|c| NearbyUser {
            distance_km: origin.coordinates.haversine_km(&c.coordinates),
            user_id: c.user_id,
            full_name: c.full_name,
            username: c.username,
            bio: c.bio,
            avatar_url: c.avatar_url,
            country: c.country,
            city: c.city,
        })
        .collect();

    let mut matches = select_matches(origin, scored);

    if let Some(search) = query.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            let search = search.to_lowercase();
            matches.retain(|m| {
                let contains = |s: &Option<String>| {
                    s.as_deref()
                        .map(|s| s.to_lowercase().contains(&search))
                        .unwrap_or(false)
                };

                contains(&m.full_name) || contains(&m.username)
            });
        }
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_NEARBY_LIMIT)
        .min(MAX_NEARBY_LIMIT);
    matches.truncate(limit);

    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(country: Option<&str>, city: Option<&str>) -> MatchOrigin {
        MatchOrigin {
            user_id: Uuid::now_v7(),
            coordinates: Coordinates {
                latitude: 40.7128,
                longitude: -74.0060,
            },
            country: country.map(String::from),
            city: city.map(String::from),
        }
    }

    fn scored(country: &str, city: &str, distance_km: f64) -> NearbyUser {
        NearbyUser {
            user_id: Uuid::now_v7(),
            full_name: None,
            username: None,
            bio: None,
            avatar_url: None,
            country: Some(String::from(country)),
            city: Some(String::from(city)),
            distance_km,
        }
    }

    fn candidate(name: &str, country: &str, city: &str, coords: (f64, f64)) -> NearbyCandidate {
        NearbyCandidate {
            user_id: Uuid::now_v7(),
            full_name: Some(String::from(name)),
            username: Some(name.to_lowercase().replace(' ', "_")),
            bio: None,
            avatar_url: None,
            country: Some(String::from(country)),
            city: Some(String::from(city)),
            coordinates: Coordinates {
                latitude: coords.0,
                longitude: coords.1,
            },
        }
    }

    #[test]
    fn test_country_match_required_and_sorted_by_distance() {
        let origin = origin(Some("US"), Some("NYC"));

        let candidates = vec![
            scored("US", "NYC", 2.0),
            scored("US", "LA", 400.0),
            scored("CA", "NYC", 1.0),
        ];

        let matches = select_matches(&origin, candidates);
        let distances: Vec<f64> = matches.iter().map(|m| m.distance_km).collect();

        assert_eq!(distances, vec![2.0, 400.0]);
    }

    #[test]
    fn test_requester_is_excluded() {
        let origin = origin(Some("US"), Some("NYC"));
        let mut me = scored("US", "NYC", 0.0);
        me.user_id = origin.user_id;

        let matches = select_matches(&origin, vec![me, scored("US", "NYC", 3.0)]);

        assert_eq!(matches.len(), 1);
        assert_ne!(matches[0].user_id, origin.user_id);
    }

    #[test]
    fn test_equal_distances_keep_incoming_order() {
        let origin = origin(Some("US"), None);
        let a = scored("US", "NYC", 5.0);
        let b = scored("US", "LA", 5.0);
        let c = scored("US", "SF", 1.0);
        let (a_id, b_id, c_id) = (a.user_id, b.user_id, c.user_id);

        let matches = select_matches(&origin, vec![a, b, c]);
        let ids: Vec<Uuid> = matches.iter().map(|m| m.user_id).collect();

        assert_eq!(ids, vec![c_id, a_id, b_id]);
    }

    #[test]
    fn test_origin_without_country_matches_nobody() {
        let origin = origin(None, Some("NYC"));
        let matches = select_matches(&origin, vec![scored("US", "NYC", 1.0)]);

        assert!(matches.is_empty());
    }

    #[test]
    fn test_city_is_not_required() {
        let origin = origin(Some("US"), Some("NYC"));

        assert!(is_location_match(&origin, Some("US"), Some("NYC")));
        assert!(is_location_match(&origin, Some("US"), Some("LA")));
        assert!(is_location_match(&origin, Some("US"), None));
        assert!(!is_location_match(&origin, Some("CA"), Some("NYC")));
        assert!(!is_location_match(&origin, None, Some("NYC")));
    }

    #[test]
    fn test_haversine() {
        let new_york = Coordinates {
            latitude: 40.7128,
            longitude: -74.0060,
        };
        let los_angeles = Coordinates {
            latitude: 34.0522,
            longitude: -118.2437,
        };

        let distance = new_york.haversine_km(&los_angeles);
        assert!((distance - 3936.0).abs() < 10.0, "distance was {distance}");
        assert_eq!(new_york.haversine_km(&new_york), 0.0);
        assert!((los_angeles.haversine_km(&new_york) - distance).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_coordinates() {
        let requested = Coordinates {
            latitude: 1.0,
            longitude: 2.0,
        };
        let stored = Coordinates {
            latitude: 3.0,
            longitude: 4.0,
        };

        assert_eq!(
            Coordinates::resolve(Some(requested), Some(stored)).unwrap(),
            requested
        );
        assert_eq!(Coordinates::resolve(None, Some(stored)).unwrap(), stored);
        assert_eq!(
            Coordinates::resolve(None, None).unwrap_err(),
            MatchError::LocationUnavailable
        );
        assert_eq!(
            MatchError::LocationUnavailable.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            MatchError::MatchServiceUnavailable.category(),
            ErrorCategory::ServiceUnavailable
        );
    }

    #[test]
    fn test_rank_candidates_computes_distances_and_filters() {
        let origin = origin(Some("US"), Some("NYC"));

        let candidates = vec![
            candidate("Far Away", "US", "LA", (34.0522, -118.2437)),
            candidate("Next Door", "US", "NYC", (40.7130, -74.0070)),
            candidate("Over Border", "CA", "Toronto", (43.6532, -79.3832)),
            candidate("Philly Lifter", "US", "Philadelphia", (39.9526, -75.1652)),
        ];

        let matches = rank_candidates(&origin, candidates, &NearbyQuery::default());
        let names: Vec<&str> = matches
            .iter()
            .map(|m| m.full_name.as_deref().unwrap())
            .collect();

        assert_eq!(names, vec!["Next Door", "Philly Lifter", "Far Away"]);
        assert!(matches[0].distance_km < 1.0);
    }

    #[test]
    fn test_rank_candidates_search_and_limit() {
        let origin = origin(Some("US"), Some("NYC"));

        let candidates = vec![
            candidate("Alice Squat", "US", "NYC", (40.72, -74.0)),
            candidate("Bob Bench", "US", "NYC", (40.73, -74.0)),
            candidate("alicia deadlift", "US", "NYC", (40.74, -74.0)),
        ];

        let query = NearbyQuery {
            search: Some(String::from("  ALIC ")),
            limit: None,
        };
        let matches = rank_candidates(&origin, candidates.clone(), &query);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].full_name.as_deref(), Some("Alice Squat"));

        let query = NearbyQuery {
            search: Some(String::from("bob_")),
            limit: None,
        };
        let matches = rank_candidates(&origin, candidates.clone(), &query);
        assert_eq!(matches.len(), 1);

        let query = NearbyQuery {
            search: None,
            limit: Some(1),
        };
        let matches = rank_candidates(&origin, candidates.clone(), &query);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].full_name.as_deref(), Some("Alice Squat"));

        let query = NearbyQuery {
            search: None,
            limit: Some(10_000),
        };
        assert_eq!(rank_candidates(&origin, candidates, &query).len(), 3);
    }
}
