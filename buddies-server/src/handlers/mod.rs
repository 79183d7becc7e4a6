pub mod buddy;
pub mod buddy_post;
pub mod changes;
pub mod health;
pub mod notification;
pub mod profile;

pub mod error {
    use buddies_common::db::DaoError;
    use buddies_common::social::pickup::ClaimError;
    use buddies_common::social::proximity::MatchError;
    use buddies_common::social::relationship::RelationshipError;
    use buddies_common::social::ErrorCategory;
    use buddies_common::token::TokenError;

    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use serde::{Deserialize, Serialize};
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
    pub enum ErrorType {
        // 400
        IncorrectlyFormed,
        InvalidInput,
        LocationUnavailable,
        SelfRequest,
        SelfClaim,
        NotAClaimant,
        NotABuddyRequest,

        // 401
        BadToken,
        TokenExpired,
        TokenMissing,
        WrongTokenType,

        // 403
        NotAuthorized,

        // 404
        DoesNotExist,

        // 409
        AlreadyExists,
        InvalidState,
        AlreadyClaimed,
        PostDecided,
        AlreadyDecided,
        CapacityReached,

        // 503
        ServiceUnavailable,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ServerErrorResponse {
        pub err_type: ErrorType,
        pub err_message: String,
    }

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 400
        IncorrectlyFormed(Cow<'static, str>),
        InvalidInput(ErrorType, Cow<'static, str>),

        // 401
        BadToken(Cow<'static, str>),
        TokenExpired(Cow<'static, str>),
        TokenMissing(Cow<'static, str>),
        WrongTokenType(Cow<'static, str>),

        // 403
        NotAuthorized(Cow<'static, str>),

        // 404
        DoesNotExist(Cow<'static, str>),

        // 409
        StateConflict(ErrorType, Cow<'static, str>),
        CapacityReached(Cow<'static, str>),

        // 503
        ServiceUnavailable(Cow<'static, str>),
    }

    impl HttpErrorResponse {
        /// Maps a database failure onto a response. Domain rule violations keep their own
        /// error type and a missing row becomes a 404. A pool or query failure is logged and
        /// reported as the store being unavailable, described by `context`.
        pub fn from_dao(err: DaoError, context: &'static str) -> Self {
            match err {
                DaoError::Match(e) => e.into(),
                DaoError::Relationship(e) => e.into(),
                DaoError::Claim(e) => e.into(),
                e if e.is_not_found() => {
                    HttpErrorResponse::DoesNotExist(Cow::Borrowed("Requested resource not found"))
                }
                e => {
                    log::error!("{context}: {e}");
                    HttpErrorResponse::ServiceUnavailable(Cow::Borrowed(context))
                }
            }
        }

        fn from_category(
            category: ErrorCategory,
            err_type: ErrorType,
            msg: Cow<'static, str>,
        ) -> Self {
            match category {
                ErrorCategory::Validation => HttpErrorResponse::InvalidInput(err_type, msg),
                ErrorCategory::Authorization => HttpErrorResponse::NotAuthorized(msg),
                ErrorCategory::StateConflict => HttpErrorResponse::StateConflict(err_type, msg),
                ErrorCategory::Capacity => HttpErrorResponse::CapacityReached(msg),
                ErrorCategory::NotFound => HttpErrorResponse::DoesNotExist(msg),
                ErrorCategory::ServiceUnavailable => HttpErrorResponse::ServiceUnavailable(msg),
            }
        }
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let server_error: ServerErrorResponse = self.into();
            write!(f, "{:?}", server_error)
        }
    }

    impl From<&HttpErrorResponse> for ServerErrorResponse {
        fn from(resp: &HttpErrorResponse) -> Self {
            match resp {
                // 400
                HttpErrorResponse::IncorrectlyFormed(msg) => ServerErrorResponse {
                    err_type: ErrorType::IncorrectlyFormed,
                    err_message: format!("Incorrectly formed request: {msg}"),
                },
                HttpErrorResponse::InvalidInput(err_type, msg) => ServerErrorResponse {
                    err_type: *err_type,
                    err_message: format!("Invalid input: {msg}"),
                },

                // 401
                HttpErrorResponse::BadToken(msg) => ServerErrorResponse {
                    err_type: ErrorType::BadToken,
                    err_message: format!("Bad token: {msg}"),
                },
                HttpErrorResponse::TokenExpired(msg) => ServerErrorResponse {
                    err_type: ErrorType::TokenExpired,
                    err_message: format!("Token expired: {msg}"),
                },
                HttpErrorResponse::TokenMissing(msg) => ServerErrorResponse {
                    err_type: ErrorType::TokenMissing,
                    err_message: format!("Token missing: {msg}"),
                },
                HttpErrorResponse::WrongTokenType(msg) => ServerErrorResponse {
                    err_type: ErrorType::WrongTokenType,
                    err_message: format!("Wrong token type: {msg}"),
                },

                // 403
                HttpErrorResponse::NotAuthorized(msg) => ServerErrorResponse {
                    err_type: ErrorType::NotAuthorized,
                    err_message: format!("Not authorized: {msg}"),
                },

                // 404
                HttpErrorResponse::DoesNotExist(msg) => ServerErrorResponse {
                    err_type: ErrorType::DoesNotExist,
                    err_message: format!("Does not exist: {msg}"),
                },

                // 409
                HttpErrorResponse::StateConflict(err_type, msg) => ServerErrorResponse {
                    err_type: *err_type,
                    err_message: format!("State conflict: {msg}"),
                },
                HttpErrorResponse::CapacityReached(msg) => ServerErrorResponse {
                    err_type: ErrorType::CapacityReached,
                    err_message: format!("Capacity reached: {msg}"),
                },

                // 503
                HttpErrorResponse::ServiceUnavailable(msg) => ServerErrorResponse {
                    err_type: ErrorType::ServiceUnavailable,
                    err_message: format!("Service unavailable: {msg}"),
                },
            }
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code()).json(ServerErrorResponse::from(self))
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::IncorrectlyFormed(_) | HttpErrorResponse::InvalidInput(_, _) => {
                    StatusCode::BAD_REQUEST
                }
                HttpErrorResponse::BadToken(_)
                | HttpErrorResponse::TokenExpired(_)
                | HttpErrorResponse::TokenMissing(_)
                | HttpErrorResponse::WrongTokenType(_) => StatusCode::UNAUTHORIZED,
                HttpErrorResponse::NotAuthorized(_) => StatusCode::FORBIDDEN,
                HttpErrorResponse::DoesNotExist(_) => StatusCode::NOT_FOUND,
                HttpErrorResponse::StateConflict(_, _) | HttpErrorResponse::CapacityReached(_) => {
                    StatusCode::CONFLICT
                }
                HttpErrorResponse::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            }
        }
    }

    impl From<TokenError> for HttpErrorResponse {
        fn from(err: TokenError) -> Self {
            match err {
                TokenError::TokenInvalid => {
                    HttpErrorResponse::BadToken(Cow::Borrowed("Invalid token"))
                }
                TokenError::TokenExpired => {
                    HttpErrorResponse::TokenExpired(Cow::Borrowed("Token expired"))
                }
                TokenError::TokenMissing => {
                    HttpErrorResponse::TokenMissing(Cow::Borrowed("Missing token"))
                }
                TokenError::WrongTokenType => {
                    HttpErrorResponse::WrongTokenType(Cow::Borrowed("Wrong token type"))
                }
            }
        }
    }

    impl From<MatchError> for HttpErrorResponse {
        fn from(err: MatchError) -> Self {
            let err_type = match err {
                MatchError::LocationUnavailable => ErrorType::LocationUnavailable,
                MatchError::MatchServiceUnavailable => ErrorType::ServiceUnavailable,
            };

            let msg = match err {
                MatchError::LocationUnavailable => "No location is known for this user",
                MatchError::MatchServiceUnavailable => "Failed to look up nearby users",
            };

            Self::from_category(err.category(), err_type, Cow::Borrowed(msg))
        }
    }

    impl From<RelationshipError> for HttpErrorResponse {
        fn from(err: RelationshipError) -> Self {
            let (err_type, msg) = match &err {
                RelationshipError::SelfRequest => (
                    ErrorType::SelfRequest,
                    Cow::Borrowed("Cannot send a buddy request to yourself"),
                ),
                RelationshipError::AlreadyExists => (
                    ErrorType::AlreadyExists,
                    Cow::Borrowed("A relationship with this user already exists"),
                ),
                RelationshipError::NotAuthorized => (
                    ErrorType::NotAuthorized,
                    Cow::Borrowed("User is not permitted to change this relationship"),
                ),
                RelationshipError::InvalidState(status) => (
                    ErrorType::InvalidState,
                    Cow::Owned(format!("Relationship is {status}, not pending")),
                ),
                RelationshipError::DoesNotExist => (
                    ErrorType::DoesNotExist,
                    Cow::Borrowed("Relationship or user not found"),
                ),
                RelationshipError::UnknownStatus(status) => {
                    log::error!("Stored relationship has unrecognized status '{status}'");
                    (
                        ErrorType::ServiceUnavailable,
                        Cow::Borrowed("Relationship could not be read"),
                    )
                }
            };

            Self::from_category(err.category(), err_type, msg)
        }
    }

    impl From<ClaimError> for HttpErrorResponse {
        fn from(err: ClaimError) -> Self {
            let (err_type, msg) = match err {
                ClaimError::SelfClaim => (ErrorType::SelfClaim, "Cannot claim your own post"),
                ClaimError::AlreadyClaimed => {
                    (ErrorType::AlreadyClaimed, "User has already claimed this post")
                }
                ClaimError::CapacityExceeded => (
                    ErrorType::CapacityReached,
                    "Post has reached its maximum number of claims",
                ),
                ClaimError::PostDecided => {
                    (ErrorType::PostDecided, "The owner has already selected a buddy")
                }
                ClaimError::NotOwner => (
                    ErrorType::NotAuthorized,
                    "Only the post owner may select a buddy",
                ),
                ClaimError::NotAClaimant => (
                    ErrorType::NotAClaimant,
                    "Selected user has not claimed this post",
                ),
                ClaimError::AlreadyDecided => (
                    ErrorType::AlreadyDecided,
                    "A different buddy has already been selected",
                ),
                ClaimError::NotABuddyRequest => {
                    (ErrorType::NotABuddyRequest, "Post is not a buddy request")
                }
                ClaimError::PostDoesNotExist => (ErrorType::DoesNotExist, "Post not found"),
            };

            Self::from_category(err.category(), err_type, Cow::Borrowed(msg))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use actix_web::body::to_bytes;
        use actix_web::ResponseError;
        use buddies_common::social::relationship::BuddyStatus;

        #[test]
        fn test_status_codes() {
            let cases: [(HttpErrorResponse, StatusCode); 8] = [
                (MatchError::LocationUnavailable.into(), StatusCode::BAD_REQUEST),
                (
                    MatchError::MatchServiceUnavailable.into(),
                    StatusCode::SERVICE_UNAVAILABLE,
                ),
                (RelationshipError::SelfRequest.into(), StatusCode::BAD_REQUEST),
                (RelationshipError::NotAuthorized.into(), StatusCode::FORBIDDEN),
                (
                    RelationshipError::InvalidState(BuddyStatus::Accepted).into(),
                    StatusCode::CONFLICT,
                ),
                (RelationshipError::DoesNotExist.into(), StatusCode::NOT_FOUND),
                (ClaimError::CapacityExceeded.into(), StatusCode::CONFLICT),
                (TokenError::TokenExpired.into(), StatusCode::UNAUTHORIZED),
            ];

            for (resp, status) in cases {
                assert_eq!(resp.status_code(), status, "{resp}");
            }
        }

        #[test]
        fn test_capacity_and_conflict_are_distinguishable() {
            let capacity: HttpErrorResponse = ClaimError::CapacityExceeded.into();
            let conflict: HttpErrorResponse = ClaimError::AlreadyClaimed.into();

            assert_eq!(capacity.status_code(), conflict.status_code());
            assert_eq!(
                ServerErrorResponse::from(&capacity).err_type,
                ErrorType::CapacityReached
            );
            assert_eq!(
                ServerErrorResponse::from(&conflict).err_type,
                ErrorType::AlreadyClaimed
            );
        }

        #[test]
        fn test_dao_not_found() {
            let resp = HttpErrorResponse::from_dao(
                DaoError::QueryFailure(diesel::result::Error::NotFound),
                "Failed to do the thing",
            );
            assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);

            let resp = HttpErrorResponse::from_dao(
                DaoError::Claim(ClaimError::NotOwner),
                "Failed to do the thing",
            );
            assert_eq!(resp.status_code(), StatusCode::FORBIDDEN);
        }

        #[test]
        fn test_store_failures_are_service_unavailable() {
            let failures = [
                DaoError::DbAsyncPoolFailure(String::from("timed out waiting for connection")),
                DaoError::QueryFailure(diesel::result::Error::BrokenTransactionManager),
                DaoError::QueryFailure(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::SerializationFailure,
                    Box::new(String::from("could not serialize access")),
                )),
            ];

            for failure in failures {
                let resp = HttpErrorResponse::from_dao(failure, "Failed to claim buddy request");

                assert_eq!(resp.status_code(), StatusCode::SERVICE_UNAVAILABLE);
                let body = ServerErrorResponse::from(&resp);
                assert_eq!(body.err_type, ErrorType::ServiceUnavailable);
                assert!(body.err_message.contains("Failed to claim buddy request"));
            }
        }

        #[actix_web::test]
        async fn test_error_body() {
            let resp = HttpErrorResponse::from(ClaimError::PostDecided).error_response();
            assert_eq!(resp.status(), StatusCode::CONFLICT);

            let body = to_bytes(resp.into_body()).await.unwrap();
            let body: ServerErrorResponse = serde_json::from_slice(&body).unwrap();

            assert_eq!(body.err_type, ErrorType::PostDecided);
            assert!(body.err_message.contains("already selected"));
        }
    }
}
