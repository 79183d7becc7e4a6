use buddies_common::token::auth_token::{AuthToken, AuthTokenClaims, AuthTokenType};
use buddies_common::token::{DecodedToken, Token, TokenError};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures::future;
use std::marker::PhantomData;

use crate::env;
use crate::handlers::error::HttpErrorResponse;
use crate::middleware::{into_actix_error_res, TokenLocation};

pub trait RequestAuthTokenType {
    fn token_name() -> &'static str;
    fn token_type() -> AuthTokenType;
}

pub struct Access {}

impl RequestAuthTokenType for Access {
    fn token_name() -> &'static str {
        "AccessToken"
    }
    fn token_type() -> AuthTokenType {
        AuthTokenType::Access
    }
}

type AuthDecodedToken = DecodedToken<<AuthToken as Token>::Claims, <AuthToken as Token>::Verifier>;

/// Claims of a token whose signature, type, and expiration have all been checked. The
/// `user_id` in here is the caller's identity for every route that extracts one.
#[derive(Debug)]
pub struct VerifiedToken<T: RequestAuthTokenType, L: TokenLocation>(
    pub AuthTokenClaims,
    PhantomData<(T, L)>,
);

impl<T, L> FromRequest for VerifiedToken<T, L>
where
    T: RequestAuthTokenType,
    L: TokenLocation,
{
    type Error = HttpErrorResponse;
    type Future = future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let decoded_token = match into_actix_error_res(get_and_decode_token::<T, L>(req)) {
            Ok(t) => t,
            Err(e) => return future::err(e),
        };

        let claims = match into_actix_error_res(verify_token(&decoded_token, T::token_type())) {
            Ok(c) => c,
            Err(e) => return future::err(e),
        };

        future::ok(VerifiedToken(claims, PhantomData))
    }
}

#[inline]
fn get_and_decode_token<T, L>(req: &HttpRequest) -> Result<AuthDecodedToken, TokenError>
where
    T: RequestAuthTokenType,
    L: TokenLocation,
{
    let token = L::get_from_request(req, T::token_name()).ok_or(TokenError::TokenMissing)?;
    AuthToken::decode(token)
}

#[inline]
fn verify_token(
    decoded_token: &AuthDecodedToken,
    expected_type: AuthTokenType,
) -> Result<AuthTokenClaims, TokenError> {
    let claims = decoded_token.verify(&env::CONF.token_signing_key)?;

    if claims.token_type != expected_type {
        return Err(TokenError::WrongTokenType);
    }

    Ok(claims.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::test::TestRequest;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use uuid::Uuid;

    use crate::middleware::{FromHeader, FromQuery};

    fn sign(user_id: Uuid, token_type: AuthTokenType, lifetime: Duration, key: &[u8]) -> String {
        let claims = AuthTokenClaims {
            user_id,
            expiration: (SystemTime::now() + lifetime)
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            token_type,
        };

        AuthToken::sign_new(&claims, key).unwrap()
    }

    fn expired(user_id: Uuid) -> String {
        let claims = AuthTokenClaims {
            user_id,
            expiration: (SystemTime::now() - Duration::from_secs(60))
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            token_type: AuthTokenType::Access,
        };

        AuthToken::sign_new(&claims, &env::CONF.token_signing_key).unwrap()
    }

    #[actix_web::test]
    async fn test_verified_from_header() {
        let user_id = Uuid::now_v7();
        let token = sign(
            user_id,
            AuthTokenType::Access,
            Duration::from_secs(60),
            &env::CONF.token_signing_key,
        );

        let req = TestRequest::default()
            .insert_header(("AccessToken", token.as_str()))
            .to_http_request();

        let verified = VerifiedToken::<Access, FromHeader>::from_request(&req, &mut Payload::None)
            .await
            .unwrap();
        assert_eq!(verified.0.user_id, user_id);
        assert_eq!(verified.0.token_type, AuthTokenType::Access);

        let req = TestRequest::default()
            .uri(&format!("/test?AccessToken={token}"))
            .to_http_request();

        let verified = VerifiedToken::<Access, FromQuery>::from_request(&req, &mut Payload::None)
            .await
            .unwrap();
        assert_eq!(verified.0.user_id, user_id);

        // Token is in the query, not the header
        assert!(matches!(
            VerifiedToken::<Access, FromHeader>::from_request(&req, &mut Payload::None).await,
            Err(HttpErrorResponse::TokenMissing(_))
        ));
    }

    #[actix_web::test]
    async fn test_rejected_tokens() {
        let user_id = Uuid::now_v7();

        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            VerifiedToken::<Access, FromHeader>::from_request(&req, &mut Payload::None).await,
            Err(HttpErrorResponse::TokenMissing(_))
        ));

        let refresh = sign(
            user_id,
            AuthTokenType::Refresh,
            Duration::from_secs(60),
            &env::CONF.token_signing_key,
        );
        let req = TestRequest::default()
            .insert_header(("AccessToken", refresh.as_str()))
            .to_http_request();
        assert!(matches!(
            VerifiedToken::<Access, FromHeader>::from_request(&req, &mut Payload::None).await,
            Err(HttpErrorResponse::WrongTokenType(_))
        ));

        let req = TestRequest::default()
            .insert_header(("AccessToken", expired(user_id).as_str()))
            .to_http_request();
        assert!(matches!(
            VerifiedToken::<Access, FromHeader>::from_request(&req, &mut Payload::None).await,
            Err(HttpErrorResponse::TokenExpired(_))
        ));

        let forged = sign(
            user_id,
            AuthTokenType::Access,
            Duration::from_secs(60),
            &[0; 64],
        );
        let req = TestRequest::default()
            .insert_header(("AccessToken", forged.as_str()))
            .to_http_request();
        assert!(matches!(
            VerifiedToken::<Access, FromHeader>::from_request(&req, &mut Payload::None).await,
            Err(HttpErrorResponse::BadToken(_))
        ));

        let req = TestRequest::default()
            .insert_header(("AccessToken", "not a token"))
            .to_http_request();
        assert!(matches!(
            VerifiedToken::<Access, FromHeader>::from_request(&req, &mut Payload::None).await,
            Err(HttpErrorResponse::BadToken(_))
        ));
    }
}
