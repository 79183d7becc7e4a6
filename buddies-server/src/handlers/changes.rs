//! Server-sent events for the changes a user needs to refresh their views.

use buddies_common::realtime::{ChangeEvent, ChangeFeed, FeedError, Filter, Subscription, Table};

use actix_web::http::header;
use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use futures::stream::{self, Stream, StreamExt};
use uuid::Uuid;

use crate::handlers::error::HttpErrorResponse;
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromHeader;

const STREAMED_TABLES: [Table; 4] = [
    Table::Buddies,
    Table::Notifications,
    Table::BuddyRequestPickups,
    Table::Posts,
];

pub async fn stream(
    feed: web::Data<ChangeFeed>,
    user_access_token: VerifiedToken<Access, FromHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_id = user_access_token.0.user_id;
    log::debug!("Opening change stream for user {user_id}");

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(change_stream(&feed, user_id)))
}

fn change_stream(
    feed: &ChangeFeed,
    user_id: Uuid,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    let subscriptions = STREAMED_TABLES
        .into_iter()
        .map(|table| subscription_frames(feed.subscribe(table, Filter::User(user_id))));

    // The comment line lets clients know the stream is live before the first change
    stream::once(async { Ok(Bytes::from_static(b": connected\n\n")) })
        .chain(stream::select_all(subscriptions))
}

fn subscription_frames(
    subscription: Subscription,
) -> std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, actix_web::Error>>>> {
    Box::pin(stream::unfold(subscription, |mut subscription| async move {
        let frame = match subscription.recv().await {
            Ok(event) => event_frame(&event),
            Err(FeedError::Lagged(count)) => {
                log::warn!(
                    "Change stream for {:?} missed {count} events, asking client to resync",
                    subscription.table()
                );
                Bytes::from_static(b"data: {\"resync\":true}\n\n")
            }
            Err(FeedError::Closed) => return None,
        };

        Some((Ok(frame), subscription))
    }))
}

fn event_frame(event: &ChangeEvent) -> Bytes {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            log::error!("Failed to serialize change event: {e}");
            return Bytes::from_static(b"data: {\"resync\":true}\n\n");
        }
    };

    Bytes::from(format!("data: {json}\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use buddies_common::realtime::ChangeKind;

    use actix_web::body::MessageBody;
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::App;
    use std::pin::Pin;
    use std::time::Duration;

    use crate::handlers::test_utils;

    async fn next_chunk<B>(body: &mut B) -> String
    where
        B: MessageBody + Unpin,
        B::Error: std::fmt::Debug,
    {
        let chunk = tokio::time::timeout(
            Duration::from_secs(5),
            futures::future::poll_fn(|cx| Pin::new(&mut *body).poll_next(cx)),
        )
        .await
        .expect("Timed out waiting for a change frame")
        .expect("Change stream ended")
        .unwrap();

        String::from_utf8(chunk.to_vec()).unwrap()
    }

    #[actix_web::test]
    async fn test_stream_delivers_own_changes() {
        let feed = web::Data::new(ChangeFeed::default());
        let app = test::init_service(
            App::new()
                .app_data(feed.clone())
                .configure(crate::services::api::configure),
        )
        .await;

        let user_id = Uuid::now_v7();
        let other_user_id = Uuid::now_v7();

        let req = TestRequest::get()
            .uri("/api/changes")
            .insert_header((
                "AccessToken",
                test_utils::gen_access_token(user_id).as_str(),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        for table in STREAMED_TABLES {
            assert_eq!(feed.subscriber_count(table, Filter::User(user_id)), 1);
        }

        let mut body = resp.into_body();
        assert_eq!(next_chunk(&mut body).await, ": connected\n\n");

        // Someone else's change is filtered out before it reaches this stream
        feed.publish(ChangeEvent::new(
            Table::Buddies,
            ChangeKind::Insert,
            Uuid::now_v7(),
            &[other_user_id],
        ));

        let row_id = Uuid::now_v7();
        feed.publish(ChangeEvent::new(
            Table::Notifications,
            ChangeKind::Insert,
            row_id,
            &[user_id],
        ));

        let frame = next_chunk(&mut body).await;
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));

        let json: serde_json::Value =
            serde_json::from_str(frame.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["table"], "notifications");
        assert_eq!(json["kind"], "INSERT");
        assert_eq!(json["row_id"], serde_json::json!(row_id));

        drop(body);

        for table in STREAMED_TABLES {
            assert_eq!(feed.subscriber_count(table, Filter::User(user_id)), 0);
        }
    }

    #[actix_web::test]
    async fn test_lagging_stream_asks_for_resync() {
        let feed = web::Data::new(ChangeFeed::new(2));
        let app = test::init_service(
            App::new()
                .app_data(feed.clone())
                .configure(crate::services::api::configure),
        )
        .await;

        let user_id = Uuid::now_v7();

        let req = TestRequest::get()
            .uri("/api/changes")
            .insert_header((
                "AccessToken",
                test_utils::gen_access_token(user_id).as_str(),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let mut body = resp.into_body();
        assert_eq!(next_chunk(&mut body).await, ": connected\n\n");

        for _ in 0..5 {
            feed.publish(ChangeEvent::new(
                Table::Posts,
                ChangeKind::Update,
                Uuid::now_v7(),
                &[user_id],
            ));
        }

        assert_eq!(next_chunk(&mut body).await, "data: {\"resync\":true}\n\n");
    }

    #[actix_web::test]
    async fn test_stream_requires_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ChangeFeed::default()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::get().uri("/api/changes").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
