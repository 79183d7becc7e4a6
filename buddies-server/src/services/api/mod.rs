use actix_web::web::*;
use std::borrow::Cow;

use crate::handlers::error::HttpErrorResponse;

mod buddy;
mod buddy_post;
mod changes;
mod health;
mod notification;
mod profile;

const MAX_JSON_BODY_BYTES: usize = 64 * 1024;

pub fn configure(cfg: &mut ServiceConfig) {
    let json_config = JsonConfig::default()
        .limit(MAX_JSON_BODY_BYTES)
        .error_handler(|err, _req| {
            HttpErrorResponse::IncorrectlyFormed(Cow::Owned(err.to_string())).into()
        });

    let query_config = QueryConfig::default().error_handler(|err, _req| {
        HttpErrorResponse::IncorrectlyFormed(Cow::Owned(err.to_string())).into()
    });

    cfg.service(
        scope("/api")
            .app_data(json_config)
            .app_data(query_config)
            .configure(profile::configure)
            .configure(buddy::configure)
            .configure(buddy_post::configure)
            .configure(notification::configure)
            .configure(changes::configure)
            .configure(health::configure),
    );
}
