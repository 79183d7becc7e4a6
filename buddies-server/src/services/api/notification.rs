use actix_web::web::*;

use crate::handlers::notification;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/notification")
            .service(resource("/all").route(get().to(notification::all)))
            .service(resource("/unread_count").route(get().to(notification::unread_count)))
            .service(resource("/read").route(put().to(notification::mark_read))),
    );
}
