//! Shared fixtures for feed-client integration tests
#![allow(dead_code)]

use feed_client::clients::memory::{MemoryDocumentStore, MemoryIdentity, MemoryMediaClient};
use feed_client::config::{AppConfig, Config, FeedConfig, LogFormat, LoggingConfig, MediaConfig};
use feed_client::domain::AuthUser;
use feed_client::services::{AppContext, Clients};
use serde_json::json;
use std::sync::Arc;

pub const BASE_TS: i64 = 1_700_000_000_000_000;

pub struct Harness {
    pub store: Arc<MemoryDocumentStore>,
    pub identity: Arc<MemoryIdentity>,
    pub media: Arc<MemoryMediaClient>,
    pub app: AppContext,
}

pub fn test_config(page_size: usize) -> Config {
    Config {
        app: AppConfig {
            env: "test".to_string(),
            placeholder_avatar_url: "/placeholder-avatar.png".to_string(),
        },
        feed: FeedConfig { page_size },
        media: MediaConfig {
            base_url: "https://media.test".to_string(),
            upload_folder: "posts".to_string(),
        },
        logging: LoggingConfig {
            format: LogFormat::Pretty,
        },
    }
}

pub fn account(uid: &str) -> AuthUser {
    let mut user = AuthUser::new(uid);
    user.display_name = Some(format!("User {}", uid));
    user
}

/// App wired to in-memory backends, signed in as `u1` unless `signed_in` is false
pub fn harness(signed_in: bool, page_size: usize) -> Harness {
    let store = Arc::new(MemoryDocumentStore::new());
    let identity = Arc::new(if signed_in {
        MemoryIdentity::signed_in(account("u1"))
    } else {
        MemoryIdentity::new(account("u1"))
    });
    let media = Arc::new(MemoryMediaClient::new("https://media.test"));

    let app = AppContext::new(
        test_config(page_size),
        Clients {
            identity: identity.clone(),
            store: store.clone(),
            media: media.clone(),
        },
    );
    app.session.start();
    app.apply_auth_state(&app.session.state());

    Harness {
        store,
        identity,
        media,
        app,
    }
}

/// Seed `count` posts `p000..`, one microsecond apart, oldest first
pub fn seed_posts(store: &MemoryDocumentStore, count: usize) {
    for i in 0..count {
        store.seed(
            "posts",
            &format!("p{:03}", i),
            json!({
                "authorId": "author",
                "authorName": "Author",
                "content": format!("post {}", i),
                "imageURLs": ["https://media.test/x.jpg"],
                "likes": 0,
                "createdAt": BASE_TS + i as i64,
            }),
        );
    }
}

pub fn seed_post(store: &MemoryDocumentStore, id: &str, likes: i64, created_at: i64) {
    store.seed(
        "posts",
        id,
        json!({
            "authorId": "author",
            "authorName": "Author",
            "likes": likes,
            "createdAt": created_at,
        }),
    );
}
