/// Integration tests for optimistic like toggling
///
/// Test Coverage:
/// - Optimistic flip before the remote call returns
/// - Rollback to pre-toggle values on remote failure
/// - Sequential and concurrent double toggles
/// - Anonymous viewers
/// - Local and remote state converging across failures
mod common;

use common::{harness, seed_post, BASE_TS};
use feed_client::clients::memory::StoreOp;
use feed_client::clients::ClientError;
use feed_client::FeedError;
use futures::poll;
use tokio_test::assert_pending;
use serde_json::json;

fn local(h: &common::Harness, post_id: &str) -> (bool, u64) {
    let item = h.app.feed.get(post_id).expect("post cached");
    (item.liked, item.post.like_count)
}

fn remote_likes(h: &common::Harness, post_id: &str) -> serde_json::Value {
    h.store.document("posts", post_id).expect("post stored")["likes"].clone()
}

#[tokio::test]
async fn test_failed_toggle_settles_back_to_previous_count() {
    let h = harness(true, 20);
    seed_post(&h.store, "P", 3, BASE_TS);
    h.app.feed.refresh().await.unwrap();
    assert_eq!(local(&h, "P"), (false, 3));

    h.store.pause();
    let mut toggle = Box::pin(h.app.likes.toggle_like("P", Some("u1")));
    assert_pending!(poll!(&mut toggle));

    // Optimistic state is visible while the remote call is in flight
    assert_eq!(local(&h, "P"), (true, 4));

    h.store
        .fail_next(StoreOp::Create, ClientError::Conflict("contended".into()));
    h.store.resume();

    let err = toggle.await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(local(&h, "P"), (false, 3));
    assert_eq!(remote_likes(&h, "P"), json!(3));
}

#[tokio::test]
async fn test_double_toggle_round_trips() {
    let h = harness(true, 20);
    seed_post(&h.store, "P", 3, BASE_TS);
    h.app.feed.refresh().await.unwrap();

    assert!(h.app.likes.toggle_like("P", Some("u1")).await.unwrap());
    assert_eq!(local(&h, "P"), (true, 4));
    assert!(h.app.likes.has_liked("P", Some("u1")).await.unwrap());

    assert!(!h.app.likes.toggle_like("P", Some("u1")).await.unwrap());
    assert_eq!(local(&h, "P"), (false, 3));
    assert_eq!(remote_likes(&h, "P"), json!(3));
    assert!(!h.app.likes.has_liked("P", Some("u1")).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_double_toggle_converges() {
    let h = harness(true, 20);
    seed_post(&h.store, "P", 3, BASE_TS);
    h.app.feed.refresh().await.unwrap();
    h.store.yield_each_call(true);

    let (first, second) = tokio::join!(
        h.app.likes.toggle_like("P", Some("u1")),
        h.app.likes.toggle_like("P", Some("u1")),
    );

    assert_eq!(first, Ok(true));
    assert_eq!(second, Ok(false));
    assert_eq!(local(&h, "P"), (false, 3));
    assert_eq!(remote_likes(&h, "P"), json!(3));
    assert_eq!(h.store.count("likes"), 0);
}

#[tokio::test]
async fn test_anonymous_toggle_fails_without_mutation() {
    let h = harness(false, 20);
    seed_post(&h.store, "P", 3, BASE_TS);
    h.app.feed.refresh().await.unwrap();

    assert_eq!(
        h.app.likes.toggle_like("P", None).await,
        Err(FeedError::Unauthenticated)
    );
    assert_eq!(local(&h, "P"), (false, 3));
    assert_eq!(remote_likes(&h, "P"), json!(3));
    assert!(!h.app.likes.has_liked("P", None).await.unwrap());
    assert_eq!(h.store.calls(StoreOp::Get), 0);
}

#[tokio::test]
async fn test_unlike_at_zero_never_goes_negative() {
    let h = harness(true, 20);
    // Record exists but the counter was never bumped
    seed_post(&h.store, "P", 0, BASE_TS);
    h.store.seed(
        "likes",
        "P_u1",
        json!({ "postId": "P", "userId": "u1", "createdAt": BASE_TS }),
    );
    h.app.feed.refresh().await.unwrap();
    assert_eq!(local(&h, "P"), (true, 0));

    assert!(!h.app.likes.toggle_like("P", Some("u1")).await.unwrap());
    assert_eq!(local(&h, "P"), (false, 0));
    assert_eq!(remote_likes(&h, "P"), json!(0));
}

#[tokio::test]
async fn test_local_state_tracks_remote_across_failures() {
    let h = harness(true, 20);
    seed_post(&h.store, "P", 5, BASE_TS);
    h.app.feed.refresh().await.unwrap();

    for round in 0..12 {
        if round % 3 == 2 {
            let op = if round % 2 == 0 {
                StoreOp::Increment
            } else {
                StoreOp::Delete
            };
            h.store
                .fail_next(op, ClientError::Unavailable(format!("round {}", round)));
        }

        let _ = h.app.likes.toggle_like("P", Some("u1")).await;

        let liked_remote = h.app.likes.has_liked("P", Some("u1")).await.unwrap();
        let count_remote = remote_likes(&h, "P").as_i64().unwrap();
        assert!(count_remote >= 0, "round {}", round);
        assert_eq!(
            local(&h, "P"),
            (liked_remote, count_remote as u64),
            "round {}",
            round
        );
    }
}

#[tokio::test]
async fn test_likes_are_per_user() {
    let h = harness(true, 20);
    seed_post(&h.store, "P", 0, BASE_TS);

    h.app.likes.toggle_like("P", Some("u1")).await.unwrap();
    h.app.likes.toggle_like("P", Some("u2")).await.unwrap();
    assert_eq!(remote_likes(&h, "P"), json!(2));

    let liked = h
        .app
        .likes
        .batch_has_liked(&["P".to_string()], Some("u3"))
        .await
        .unwrap();
    assert!(!liked["P"]);
}
