use actix_web::web::*;

use crate::handlers::buddy;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/buddy")
            .service(resource("/nearby").route(get().to(buddy::nearby)))
            .service(
                resource("/request")
                    .route(post().to(buddy::send_request))
                    .route(delete().to(buddy::cancel_request)),
            )
            .service(resource("/request/respond").route(put().to(buddy::respond)))
            .service(resource("/request/all_pending").route(get().to(buddy::all_pending)))
            .service(resource("/all").route(get().to(buddy::all))),
    );
}
