use actix_web::web::*;

use crate::handlers::buddy_post;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/buddy_post")
            .service(resource("").route(post().to(buddy_post::create)))
            .service(resource("/pickups").route(get().to(buddy_post::pickups)))
            .service(resource("/pickup").route(post().to(buddy_post::claim)))
            .service(resource("/selection").route(put().to(buddy_post::select))),
    );
}
