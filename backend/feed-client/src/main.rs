/// Feed client demo entry point
///
/// Runs a scripted session against in-memory backends:
/// - sign in and load the first feed page
/// - like a post, compose a post, edit the profile
/// - print the resulting feed as JSON
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use feed_client::{
    clients::memory::{MemoryDocumentStore, MemoryIdentity, MemoryMediaClient},
    config::Config,
    domain::{AuthUser, ImageSource, ProfileUpdate},
    services::{AppContext, Clients, Route},
    telemetry::init_tracing,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

fn seed_posts(store: &MemoryDocumentStore, count: usize) {
    let start = Utc::now() - Duration::hours(count as i64);
    for i in 0..count {
        let author = if i % 3 == 0 { "demo-user" } else { "friend" };
        store.seed(
            "posts",
            &format!("seed-{:03}", i),
            json!({
                "authorId": author,
                "authorName": if author == "demo-user" { "Demo" } else { "A Friend" },
                "content": format!("Seeded post #{}", i),
                "imageURLs": [format!("https://picsum.photos/seed/{}/600", i)],
                "likes": (i * 7) % 5,
                "createdAt": (start + Duration::hours(i as i64)).timestamp_micros(),
            }),
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.logging.format);
    info!(env = %config.app.env, page_size = config.feed.page_size, "Starting feed client");

    let mut account = AuthUser::new("demo-user");
    account.email = Some("demo@example.com".to_string());
    account.display_name = Some("Demo".to_string());

    let store = Arc::new(MemoryDocumentStore::new());
    seed_posts(&store, 30);
    let identity = Arc::new(MemoryIdentity::deferred(account));
    let media = Arc::new(MemoryMediaClient::new(config.media.base_url.clone()));

    let app = AppContext::new(
        config,
        Clients {
            identity: identity.clone(),
            store,
            media,
        },
    );
    let follower = app.start();
    let mut navigator = app.navigator(Route::Feed);

    identity.resolve_session(false);
    app.session.resolved().await;
    navigator.on_auth_change();
    info!(route = navigator.current().path(), "Session resolved");

    let user = app.session.sign_in().await.context("Sign-in failed")?;
    app.apply_auth_state(&app.session.state());
    navigator
        .navigate(Route::Feed)
        .context("Navigation refused")?;

    let first = app.feed.refresh().await.context("Failed to load feed")?;
    let second = app.feed.load_more().await.context("Failed to load more")?;
    info!(
        first = first.posts.len(),
        second = second.posts.len(),
        has_more = app.feed.has_more(),
        "Feed loaded"
    );

    if let Some(target) = first.posts.first() {
        let liked = app.likes.toggle_like(&target.id, Some(&user.uid)).await?;
        info!(post_id = %target.id, liked, "Toggled like");

        match app
            .comments
            .add_comment(&target.id, Some(&user), "Lovely shot!")
            .await
        {
            Ok(comment) => info!(comment_id = %comment.id, "Commented"),
            Err(err) => warn!(error = %err, "Comment failed: {}", err.user_message()),
        }
    }

    navigator
        .navigate(Route::CreatePost)
        .context("Navigation refused")?;
    let post = app
        .composer
        .submit(
            Some(&user),
            "Hello from the demo",
            vec![ImageSource::File {
                name: "hello.jpg".to_string(),
                bytes: vec![0xff, 0xd8, 0xff],
            }],
        )
        .await?;
    info!(post_id = %post.id, "Composed post");

    navigator
        .navigate(Route::Profile)
        .context("Navigation refused")?;
    let profile = app
        .profile
        .save(
            app.session.current_user().as_ref(),
            ProfileUpdate {
                display_name: Some("Demo Renamed".to_string()),
                bio: Some("Taking pictures of things".to_string()),
                ..Default::default()
            },
        )
        .await?;
    let own_posts = app.profile.posts(&profile.id, None).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "profile": profile,
            "ownPosts": own_posts.posts.len(),
            "feed": app.feed.snapshot(),
            "hasMore": app.feed.has_more(),
        }))?
    );

    app.session.sign_out().await?;
    app.apply_auth_state(&app.session.state());
    if let Some(route) = navigator.on_auth_change() {
        info!(route = route.path(), "Redirected after sign-out");
    }
    follower.abort();

    Ok(())
}
