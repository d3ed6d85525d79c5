/// Integration tests for feed pagination and the shared feed cache
mod common;

use common::{harness, seed_post, seed_posts, BASE_TS};
use feed_client::domain::{FeedCursor, FeedPage, ImageSource};
use std::collections::HashSet;

fn ids(page: &FeedPage) -> Vec<String> {
    page.posts.iter().map(|post| post.id.clone()).collect()
}

#[tokio::test]
async fn test_exactly_page_size_posts_has_no_cursor() {
    let h = harness(true, 20);
    seed_posts(&h.store, 20);

    let page = h.app.feed.fetch_page(None, 20).await.unwrap();
    assert_eq!(page.posts.len(), 20);
    assert!(page.next_cursor.is_none());
    assert!(!h.app.feed.has_more());
}

#[tokio::test]
async fn test_one_more_post_yields_cursor() {
    let h = harness(true, 20);
    seed_posts(&h.store, 21);

    let first = h.app.feed.fetch_page(None, 20).await.unwrap();
    let cursor = first.next_cursor.clone().expect("cursor");
    let second = h.app.feed.fetch_page(Some(&cursor), 20).await.unwrap();

    assert_eq!(ids(&second), vec!["p000"]);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_walking_the_feed_never_repeats_posts() {
    let h = harness(true, 20);
    seed_posts(&h.store, 45);

    let mut seen = HashSet::new();
    let mut previous_ts = i64::MAX;
    let mut pages = 0;
    loop {
        let page = h.app.feed.load_more().await.unwrap();
        if page.posts.is_empty() {
            break;
        }
        pages += 1;
        for post in &page.posts {
            assert!(seen.insert(post.id.clone()), "{} repeated", post.id);
            let ts = post.created_at.timestamp_micros();
            assert!(ts < previous_ts, "feed not strictly descending at {}", post.id);
            previous_ts = ts;
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 45);
    assert_eq!(h.app.feed.len(), 45);
}

#[tokio::test]
async fn test_ties_keep_store_insertion_order() {
    let h = harness(true, 2);
    for id in ["a", "b", "c"] {
        seed_post(&h.store, id, 0, BASE_TS);
    }

    let first = h.app.feed.load_more().await.unwrap();
    let second = h.app.feed.load_more().await.unwrap();
    assert_eq!(ids(&first), vec!["a", "b"]);
    assert_eq!(ids(&second), vec!["c"]);
}

#[tokio::test]
async fn test_same_cursor_returns_same_page_after_new_post() {
    let h = harness(true, 5);
    seed_posts(&h.store, 12);

    let first = h.app.feed.fetch_page(None, 5).await.unwrap();
    let cursor = first.next_cursor.clone().unwrap();
    let page = h.app.feed.fetch_page(Some(&cursor), 5).await.unwrap();

    let user = h.app.session.current_user().unwrap();
    h.app
        .composer
        .submit(
            Some(&user),
            "newest",
            vec![ImageSource::Url("https://x.test/new.jpg".into())],
        )
        .await
        .unwrap();

    let again = h.app.feed.fetch_page(Some(&cursor), 5).await.unwrap();
    assert_eq!(ids(&again), ids(&page));
    assert_eq!(again.next_cursor, page.next_cursor);
}

#[tokio::test]
async fn test_cursor_survives_serialization() {
    let h = harness(true, 3);
    seed_posts(&h.store, 7);

    let first = h.app.feed.fetch_page(None, 3).await.unwrap();
    let json = serde_json::to_value(&first).unwrap();
    let token = json["nextCursor"].as_str().expect("opaque cursor string");

    let cursor = FeedCursor::decode(token).unwrap();
    let second = h.app.feed.fetch_page(Some(&cursor), 3).await.unwrap();
    assert_eq!(ids(&second), vec!["p003", "p002", "p001"]);
}

#[tokio::test]
async fn test_composed_post_tops_the_feed_without_duplicates() {
    let h = harness(true, 20);
    seed_posts(&h.store, 3);
    h.app.feed.refresh().await.unwrap();

    let user = h.app.session.current_user().unwrap();
    let post = h
        .app
        .composer
        .submit(
            Some(&user),
            "fresh",
            vec![ImageSource::File {
                name: "fresh.jpg".into(),
                bytes: vec![1, 2],
            }],
        )
        .await
        .unwrap();

    h.app.feed.refresh().await.unwrap();
    let snapshot = h.app.feed.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot[0].post.id, post.id);
    assert_eq!(snapshot[0].post.author_name, "User u1");
}

#[tokio::test]
async fn test_page_size_is_clamped() {
    let h = harness(true, 20);
    seed_posts(&h.store, 150);

    let page = h.app.feed.fetch_page(None, 500).await.unwrap();
    assert_eq!(page.posts.len(), 100);
    assert!(page.next_cursor.is_some());

    let page = h.app.feed.fetch_page(None, 0).await.unwrap();
    assert_eq!(page.posts.len(), 1);
}

#[tokio::test]
async fn test_sign_out_clears_cached_feed() {
    let h = harness(true, 20);
    seed_posts(&h.store, 3);
    h.app.feed.refresh().await.unwrap();
    assert_eq!(h.app.feed.len(), 3);

    h.app.session.sign_out().await.unwrap();
    h.app.apply_auth_state(&h.app.session.state());
    assert!(h.app.feed.is_empty());
    assert!(h.app.feed.has_more());
}
