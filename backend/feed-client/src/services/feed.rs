/// Feed cache shared by every view of a session.
///
/// Pages fetched from the store are merged into one cache keyed by post id.
/// Entries with like operations in flight keep their optimistic like fields
/// when a page containing them is merged again.
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{AuthUser, AuthorSnapshot, FeedCursor, FeedItem, FeedPage, LikeSnapshot, Post};
use crate::error::FeedResult;
use crate::repository::{LikeRepository, PostRepository};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

pub fn clamp_page_size(page_size: usize) -> usize {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

struct CachedPost {
    post: Post,
    liked: bool,
    pending_likes: usize,
}

impl CachedPost {
    fn item(&self) -> FeedItem {
        FeedItem {
            post: self.post.clone(),
            liked: self.liked,
        }
    }

    fn like_snapshot(&self) -> LikeSnapshot {
        LikeSnapshot {
            liked: self.liked,
            like_count: self.post.like_count,
        }
    }
}

#[derive(Default)]
struct FeedState {
    entries: HashMap<String, CachedPost>,
    /// Post ids, newest first
    order: Vec<String>,
    next_cursor: Option<FeedCursor>,
    loaded: bool,
    exhausted: bool,
    /// Bumped by `reset`; responses carrying an older epoch are dropped
    epoch: u64,
    viewer: Option<AuthUser>,
}

impl FeedState {
    fn viewer_author(&self) -> Option<AuthorSnapshot> {
        self.viewer.as_ref().map(AuthUser::author_snapshot)
    }

    /// Merge fetched posts and return them as the cache now shows them
    fn merge(&mut self, posts: &[Post], liked: &HashMap<String, bool>) -> Vec<Post> {
        let author = self.viewer_author();
        let mut merged = Vec::with_capacity(posts.len());
        let mut added = false;

        for post in posts {
            let mut post = post.clone();
            if let Some(author) = &author {
                post.apply_author(author);
            }
            let liked_now = liked.get(&post.id).copied().unwrap_or(false);

            match self.entries.get_mut(&post.id) {
                Some(entry) if entry.pending_likes > 0 => {
                    post.like_count = entry.post.like_count;
                    entry.post = post.clone();
                }
                Some(entry) => {
                    entry.post = post.clone();
                    entry.liked = liked_now;
                }
                None => {
                    self.order.push(post.id.clone());
                    self.entries.insert(
                        post.id.clone(),
                        CachedPost {
                            post: post.clone(),
                            liked: liked_now,
                            pending_likes: 0,
                        },
                    );
                    added = true;
                }
            }
            merged.push(post);
        }

        if added {
            let entries = &self.entries;
            // Stable: ties keep the order in which the store returned them
            self.order.sort_by(|a, b| {
                let a = entries.get(a).map(|entry| entry.post.created_at);
                let b = entries.get(b).map(|entry| entry.post.created_at);
                b.cmp(&a)
            });
        }

        merged
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.next_cursor = None;
        self.loaded = false;
        self.exhausted = false;
        self.epoch += 1;
    }
}

struct FeedInner {
    posts: PostRepository,
    likes: LikeRepository,
    page_size: usize,
    state: RwLock<FeedState>,
}

/// Shared feed cache. Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct FeedStore {
    inner: Arc<FeedInner>,
}

impl FeedStore {
    pub fn new(posts: PostRepository, likes: LikeRepository, page_size: usize) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                posts,
                likes,
                page_size: clamp_page_size(page_size),
                state: RwLock::new(FeedState::default()),
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Fetch one page after `cursor` and merge it into the cache.
    ///
    /// `next_cursor` is `None` once the end of the feed is reached, including
    /// when the last page is exactly `page_size` long.
    pub async fn fetch_page(
        &self,
        cursor: Option<&FeedCursor>,
        page_size: usize,
    ) -> FeedResult<FeedPage> {
        let (epoch, viewer_id) = self.begin_read();

        let page = self
            .inner
            .posts
            .list_page(cursor, clamp_page_size(page_size))
            .await?;
        let liked = self.liked_flags(viewer_id.as_deref(), &page.posts).await?;

        let mut state = self.inner.state.write();
        if state.epoch != epoch {
            debug!(posts = page.posts.len(), "Discarding page fetched before feed reset");
            return Ok(page);
        }

        let posts = state.merge(&page.posts, &liked);

        // Only the first load or the continuation of the current cursor moves pagination
        let continues = cursor.is_some() && cursor == state.next_cursor.as_ref();
        if !state.loaded || continues {
            state.next_cursor = page.next_cursor.clone();
            state.exhausted = page.next_cursor.is_none();
            state.loaded = true;
        }

        debug!(
            fetched = posts.len(),
            cached = state.order.len(),
            has_more = page.next_cursor.is_some(),
            "Merged feed page"
        );

        Ok(FeedPage {
            posts,
            next_cursor: page.next_cursor,
        })
    }

    /// Fetch the page after the stored cursor; empty once the feed is exhausted
    pub async fn load_more(&self) -> FeedResult<FeedPage> {
        let cursor = {
            let state = self.inner.state.read();
            if state.loaded && state.exhausted {
                return Ok(FeedPage::empty());
            }
            state.next_cursor.clone()
        };
        self.fetch_page(cursor.as_ref(), self.inner.page_size).await
    }

    /// Re-fetch the newest page, merging it into what is already cached
    pub async fn refresh(&self) -> FeedResult<FeedPage> {
        self.fetch_page(None, self.inner.page_size).await
    }

    /// Posts written by `author_id`, newest first. Cached copies are refreshed
    /// but the page does not enter the feed order.
    pub async fn posts_by_author(
        &self,
        author_id: &str,
        cursor: Option<&FeedCursor>,
        page_size: usize,
    ) -> FeedResult<FeedPage> {
        let (epoch, _) = self.begin_read();
        let mut page = self
            .inner
            .posts
            .list_by_author(author_id, cursor, clamp_page_size(page_size))
            .await?;

        let mut state = self.inner.state.write();
        if state.epoch != epoch {
            return Ok(page);
        }

        let author = state.viewer_author();
        for post in &mut page.posts {
            if let Some(author) = &author {
                post.apply_author(author);
            }
            if let Some(entry) = state.entries.get_mut(&post.id) {
                if entry.pending_likes > 0 {
                    post.like_count = entry.post.like_count;
                }
                entry.post = post.clone();
            }
        }

        Ok(page)
    }

    pub fn snapshot(&self) -> Vec<FeedItem> {
        let state = self.inner.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(CachedPost::item)
            .collect()
    }

    pub fn get(&self, post_id: &str) -> Option<FeedItem> {
        self.inner.state.read().entries.get(post_id).map(CachedPost::item)
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        let state = self.inner.state.read();
        !state.loaded || !state.exhausted
    }

    /// Drop every cached page. Responses to requests issued before the reset
    /// are discarded when they arrive.
    pub fn reset(&self) {
        self.inner.state.write().clear();
        info!("Feed cache reset");
    }

    /// Switch the user the cache is rendered for. A different user starts
    /// from an empty cache since like flags are per user.
    pub fn set_viewer(&self, viewer: Option<AuthUser>) {
        let mut state = self.inner.state.write();
        let previous = state.viewer.as_ref().map(|user| user.uid.clone());
        let next = viewer.as_ref().map(|user| user.uid.clone());
        if previous != next {
            state.clear();
            info!(viewer = ?next, "Feed viewer changed");
        }

        state.viewer = viewer;
        if let Some(author) = state.viewer_author() {
            for entry in state.entries.values_mut() {
                entry.post.apply_author(&author);
            }
        }
    }

    /// Override denormalised author fields on every cached post by `author`
    pub fn apply_author_profile(&self, author: &AuthorSnapshot) {
        let mut state = self.inner.state.write();
        if let Some(viewer) = state.viewer.as_mut() {
            if viewer.uid == author.author_id {
                viewer.display_name = Some(author.author_name.clone());
                viewer.photo_url = author.author_photo_url.clone();
            }
        }

        let mut updated = 0usize;
        for entry in state.entries.values_mut() {
            if entry.post.author_id == author.author_id {
                entry.post.apply_author(author);
                updated += 1;
            }
        }
        debug!(author_id = %author.author_id, updated, "Applied author profile to cached posts");
    }

    /// Put a freshly created post at the top of the feed
    pub fn prepend(&self, mut post: Post) {
        let mut state = self.inner.state.write();
        if let Some(author) = state.viewer_author() {
            post.apply_author(&author);
        }

        let id = post.id.clone();
        match state.entries.get_mut(&id) {
            Some(entry) => entry.post = post,
            None => {
                state.entries.insert(
                    id.clone(),
                    CachedPost {
                        post,
                        liked: false,
                        pending_likes: 0,
                    },
                );
                state.order.insert(0, id);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Optimistic like state, driven by the like coordinator
    // ------------------------------------------------------------------------

    /// Flip the cached like fields. Returns the cache epoch and the previous
    /// fields, or `None` when the post is not cached.
    pub(crate) fn begin_like(&self, post_id: &str) -> Option<(u64, LikeSnapshot)> {
        let mut state = self.inner.state.write();
        let epoch = state.epoch;
        let entry = state.entries.get_mut(post_id)?;

        let prev = entry.like_snapshot();
        let next = prev.toggled();
        entry.liked = next.liked;
        entry.post.like_count = next.like_count;
        entry.pending_likes += 1;
        Some((epoch, prev))
    }

    /// Show like fields computed by the like coordinator
    pub(crate) fn show_like(&self, epoch: u64, post_id: &str, shown: LikeSnapshot) {
        let mut state = self.inner.state.write();
        if state.epoch != epoch {
            return;
        }
        if let Some(entry) = state.entries.get_mut(post_id) {
            entry.liked = shown.liked;
            entry.post.like_count = shown.like_count;
        }
    }

    /// Mark one like operation finished
    pub(crate) fn settle_like(&self, epoch: u64, post_id: &str) {
        let mut state = self.inner.state.write();
        if state.epoch != epoch {
            return;
        }
        if let Some(entry) = state.entries.get_mut(post_id) {
            entry.pending_likes = entry.pending_likes.saturating_sub(1);
        }
    }

    /// Adopt a remote like state for a post with no like operation in flight
    pub(crate) fn reconcile_like(&self, post_id: &str, remote: LikeSnapshot) {
        let mut state = self.inner.state.write();
        if let Some(entry) = state.entries.get_mut(post_id) {
            if entry.pending_likes == 0 {
                entry.liked = remote.liked;
                entry.post.like_count = remote.like_count;
            }
        }
    }

    fn begin_read(&self) -> (u64, Option<String>) {
        let state = self.inner.state.read();
        (
            state.epoch,
            state.viewer.as_ref().map(|user| user.uid.clone()),
        )
    }

    async fn liked_flags(
        &self,
        viewer_id: Option<&str>,
        posts: &[Post],
    ) -> FeedResult<HashMap<String, bool>> {
        match viewer_id {
            Some(uid) if !posts.is_empty() => {
                let ids: Vec<String> = posts.iter().map(|post| post.id.clone()).collect();
                Ok(self.inner.likes.batch_check_liked(uid, &ids).await?)
            }
            _ => Ok(HashMap::new()),
        }
    }
}
