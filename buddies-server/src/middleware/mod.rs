pub mod auth;

use buddies_common::token::TokenError;

use actix_web::HttpRequest;
use std::borrow::Cow;

use crate::handlers::error::HttpErrorResponse;

pub trait TokenLocation {
    fn get_from_request<'a>(req: &'a HttpRequest, key: &str) -> Option<&'a str>;
}

pub struct FromQuery {}
pub struct FromHeader {}

impl TokenLocation for FromQuery {
    fn get_from_request<'a>(req: &'a HttpRequest, key: &str) -> Option<&'a str> {
        req.query_string().split('&').find_map(|pair| {
            let (name, value) = pair.split_once('=')?;

            if name == key && !value.is_empty() {
                Some(value)
            } else {
                None
            }
        })
    }
}

impl TokenLocation for FromHeader {
    fn get_from_request<'a>(req: &'a HttpRequest, key: &str) -> Option<&'a str> {
        let header = req.headers().get(key)?;
        header.to_str().ok()
    }
}

#[inline(always)]
fn into_actix_error_res<T>(result: Result<T, TokenError>) -> Result<T, HttpErrorResponse> {
    match result {
        Ok(t) => Ok(t),
        Err(TokenError::TokenInvalid) => {
            Err(HttpErrorResponse::BadToken(Cow::Borrowed("Token is invalid")))
        }
        Err(TokenError::TokenExpired) => Err(HttpErrorResponse::TokenExpired(Cow::Borrowed(
            "Token is expired",
        ))),
        Err(TokenError::TokenMissing) => Err(HttpErrorResponse::TokenMissing(Cow::Borrowed(
            "Token is missing",
        ))),
        Err(TokenError::WrongTokenType) => Err(HttpErrorResponse::WrongTokenType(Cow::Borrowed(
            "Incorrect token type",
        ))),
    }
}
