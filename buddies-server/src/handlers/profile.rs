use buddies_common::db::{profile, DbAsyncPool};
use buddies_common::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Table};
use buddies_common::request_io::inputs::InputLocation;
use buddies_common::validators::Validity;

use actix_web::{web, HttpResponse};
use std::borrow::Cow;

use crate::handlers::error::{ErrorType, HttpErrorResponse};
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

pub async fn update_location(
    db_async_pool: web::Data<DbAsyncPool>,
    feed: web::Data<ChangeFeed>,
    user_access_token: VerifiedToken<Access, FromHeader>,
    location: web::Json<InputLocation>,
) -> Result<HttpResponse, HttpErrorResponse> {
    if let Validity::Invalid(msg) = location.validate() {
        return Err(HttpErrorResponse::InvalidInput(
            ErrorType::InvalidInput,
            Cow::Borrowed(msg),
        ));
    }

    let user_id = user_access_token.0.user_id;

    profile::Dao::new(&db_async_pool)
        .update_location(
            user_id,
            location.latitude,
            location.longitude,
            location.country.as_deref(),
            location.city.as_deref(),
        )
        .await
        .map_err(|e| HttpErrorResponse::from_dao(e, "Failed to update location"))?;

    feed.publish(ChangeEvent::new(
        Table::Profiles,
        ChangeKind::Update,
        user_id,
        &[user_id],
    ));

    Ok(HttpResponse::Ok().finish())
}
