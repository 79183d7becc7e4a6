use actix_web::web::*;

use crate::handlers::changes;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(resource("/changes").route(get().to(changes::stream)));
}
