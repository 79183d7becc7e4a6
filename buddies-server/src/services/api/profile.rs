use actix_web::web::*;

use crate::handlers::profile;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/profile")
            .service(resource("/location").route(put().to(profile::update_location))),
    );
}
