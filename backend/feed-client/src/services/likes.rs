/// Like coordinator
///
/// A toggle flips the cached like fields immediately, then runs the remote
/// sequence (check record, delete + decrement or create + increment).
/// Toggles on the same (post, user) run their remote sequence one at a time
/// in call order. When one fails or is dropped, every toggle queued behind
/// it fails with the same error. The cache always shows the last remote
/// state confirmed for the pair with the surviving pending toggles applied
/// on top.
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::clients::ClientResult;
use crate::domain::{LikeSnapshot, PendingOp};
use crate::error::{FeedError, FeedResult};
use crate::repository::{LikeRepository, PostRepository};
use crate::services::feed::FeedStore;

type SlotKey = (String, String);

/// Tickets strictly between `after` and `before` were queued behind a
/// toggle that failed with `err`
struct Poison {
    after: u64,
    before: u64,
    err: FeedError,
}

/// Cached like fields for one (post, user)
struct SlotView {
    epoch: u64,
    confirmed: LikeSnapshot,
    /// Tickets whose optimistic flip is still shown
    live: BTreeSet<u64>,
}

#[derive(Default)]
struct SlotState {
    next_ticket: u64,
    in_flight: usize,
    poisoned: Vec<Poison>,
    view: Option<SlotView>,
}

impl SlotState {
    fn poison_for(&self, ticket: u64) -> Option<&FeedError> {
        self.poisoned
            .iter()
            .find(|p| p.after < ticket && ticket < p.before)
            .map(|p| &p.err)
    }

    fn shown(&self) -> Option<(u64, LikeSnapshot)> {
        let view = self.view.as_ref()?;
        let flips = view
            .live
            .iter()
            .filter(|ticket| self.poison_for(**ticket).is_none())
            .count();
        let shown = (0..flips).fold(view.confirmed, |snapshot, _| snapshot.toggled());
        Some((view.epoch, shown))
    }
}

/// Per (post, user) queue
#[derive(Default)]
struct LikeSlot {
    turn: Arc<AsyncMutex<()>>,
    state: Mutex<SlotState>,
}

struct LikeInner {
    likes: LikeRepository,
    posts: PostRepository,
    feed: FeedStore,
    slots: Mutex<HashMap<SlotKey, Arc<LikeSlot>>>,
}

#[derive(Clone)]
pub struct LikeCoordinator {
    inner: Arc<LikeInner>,
}

impl LikeCoordinator {
    pub fn new(likes: LikeRepository, posts: PostRepository, feed: FeedStore) -> Self {
        Self {
            inner: Arc::new(LikeInner {
                likes,
                posts,
                feed,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Toggle the user's like on a post and return the resulting liked state.
    ///
    /// The cached post reflects the toggle before this future first yields.
    /// On failure the cached post drops this toggle's flip and shows the last
    /// confirmed remote state.
    pub async fn toggle_like(&self, post_id: &str, user_id: Option<&str>) -> FeedResult<bool> {
        let user_id = user_id.ok_or(FeedError::Unauthenticated)?;

        let mut toggle = PendingToggle::enter(self.inner.clone(), post_id, user_id, true);
        toggle.wait_turn().await;

        if let Some(err) = toggle.poisoned() {
            debug!(post_id, user_id, "Dropping toggle queued behind a failed one");
            toggle.abandon();
            return Err(err);
        }

        match self.inner.apply_remote(post_id, user_id).await {
            Ok(remote) => {
                debug!(post_id, user_id, liked = remote.liked, likes = remote.like_count, "Like toggled");
                toggle.commit(remote);
                Ok(remote.liked)
            }
            Err(err) => {
                let err = FeedError::from(err);
                warn!(post_id, user_id, error = %err, "Like toggle failed, rolling back");
                toggle.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Anonymous viewers never have a like record
    pub async fn has_liked(&self, post_id: &str, user_id: Option<&str>) -> FeedResult<bool> {
        match user_id {
            Some(user_id) => Ok(self.inner.likes.exists(post_id, user_id).await?),
            None => Ok(false),
        }
    }

    pub async fn batch_has_liked(
        &self,
        post_ids: &[String],
        user_id: Option<&str>,
    ) -> FeedResult<HashMap<String, bool>> {
        match user_id {
            Some(user_id) => Ok(self.inner.likes.batch_check_liked(user_id, post_ids).await?),
            None => Ok(post_ids.iter().map(|id| (id.clone(), false)).collect()),
        }
    }

    #[cfg(test)]
    fn active_slots(&self) -> usize {
        self.inner.slots.lock().len()
    }
}

impl LikeInner {
    async fn apply_remote(&self, post_id: &str, user_id: &str) -> ClientResult<LikeSnapshot> {
        if self.likes.exists(post_id, user_id).await? {
            if !self.likes.delete(post_id, user_id).await? {
                // Removed concurrently elsewhere; the counter was already adjusted
                let like_count = self.posts.like_count(post_id).await?;
                return Ok(LikeSnapshot {
                    liked: false,
                    like_count,
                });
            }

            match self.posts.decrement_likes(post_id).await {
                Ok(like_count) => Ok(LikeSnapshot {
                    liked: false,
                    like_count,
                }),
                Err(err) => {
                    if let Err(undo) = self.likes.create(post_id, user_id).await {
                        warn!(post_id, user_id, error = %undo, "Failed to restore like record");
                    }
                    Err(err)
                }
            }
        } else {
            if !self.likes.create(post_id, user_id).await? {
                let like_count = self.posts.like_count(post_id).await?;
                return Ok(LikeSnapshot {
                    liked: true,
                    like_count,
                });
            }

            match self.posts.increment_likes(post_id).await {
                Ok(like_count) => Ok(LikeSnapshot {
                    liked: true,
                    like_count,
                }),
                Err(err) => {
                    if let Err(undo) = self.likes.delete(post_id, user_id).await {
                        warn!(post_id, user_id, error = %undo, "Failed to remove like record");
                    }
                    Err(err)
                }
            }
        }
    }

    async fn read_remote(&self, post_id: &str, user_id: &str) -> ClientResult<LikeSnapshot> {
        let liked = self.likes.exists(post_id, user_id).await?;
        let like_count = self.posts.like_count(post_id).await?;
        Ok(LikeSnapshot { liked, like_count })
    }

    /// Re-read the remote like state once the queue for the pair reaches it
    fn spawn_reconcile(self: Arc<Self>, (post_id, user_id): SlotKey) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(%post_id, "No runtime to reconcile like state");
            return;
        };
        handle.spawn(async move {
            let mut marker = PendingToggle::enter(self.clone(), &post_id, &user_id, false);
            marker.wait_turn().await;
            match self.read_remote(&post_id, &user_id).await {
                Ok(remote) => marker.commit(remote),
                Err(err) => warn!(%post_id, error = %err, "Like state reconcile failed"),
            }
        });
    }
}

/// One toggle between its optimistic flip and settlement. Dropping it
/// unsettled counts as a cancellation.
struct PendingToggle {
    inner: Arc<LikeInner>,
    key: SlotKey,
    slot: Arc<LikeSlot>,
    ticket: u64,
    /// Cache epoch of the optimistic flip, `None` when nothing was flipped
    epoch: Option<u64>,
    op: PendingOp<()>,
    turn: Option<OwnedMutexGuard<()>>,
    settled: bool,
}

impl PendingToggle {
    /// Take a ticket and, with `flip`, apply the optimistic flip in one step
    fn enter(inner: Arc<LikeInner>, post_id: &str, user_id: &str, flip: bool) -> Self {
        let key = (post_id.to_string(), user_id.to_string());

        let (slot, ticket, epoch) = {
            let mut slots = inner.slots.lock();
            let slot = slots.entry(key.clone()).or_default().clone();
            let mut state = slot.state.lock();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.in_flight += 1;

            let local = if flip { inner.feed.begin_like(post_id) } else { None };
            if let Some((epoch, prev)) = local {
                let mut view = match state.view.take() {
                    Some(view) if view.epoch == epoch => view,
                    _ => SlotView {
                        epoch,
                        confirmed: prev,
                        live: BTreeSet::new(),
                    },
                };
                view.live.insert(ticket);
                state.view = Some(view);
                if let Some((epoch, shown)) = state.shown() {
                    inner.feed.show_like(epoch, post_id, shown);
                }
            }
            drop(state);
            (slot, ticket, local.map(|(epoch, _)| epoch))
        };

        let mut op = PendingOp::Idle;
        if flip {
            op.begin(());
        }

        Self {
            inner,
            key,
            slot,
            ticket,
            epoch,
            op,
            turn: None,
            settled: false,
        }
    }

    async fn wait_turn(&mut self) {
        let turn = self.slot.turn.clone().lock_owned().await;
        self.turn = Some(turn);
    }

    fn poisoned(&self) -> Option<FeedError> {
        self.slot.state.lock().poison_for(self.ticket).cloned()
    }

    fn commit(&mut self, remote: LikeSnapshot) {
        self.op.commit();
        self.leave(Some(remote));
    }

    /// Fail this toggle and every toggle queued behind it
    fn fail(&mut self, err: FeedError) {
        self.op.roll_back();
        {
            let mut state = self.slot.state.lock();
            let before = state.next_ticket;
            state.poisoned.push(Poison {
                after: self.ticket,
                before,
                err,
            });
        }
        self.leave(None);
    }

    fn abandon(&mut self) {
        self.op.roll_back();
        self.leave(None);
    }

    fn leave(&mut self, remote: Option<LikeSnapshot>) {
        if self.settled {
            return;
        }
        self.settled = true;

        let mut slots = self.inner.slots.lock();
        let mut state = self.slot.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        if let Some(epoch) = self.epoch {
            self.inner.feed.settle_like(epoch, &self.key.0);
        }
        if let Some(view) = state.view.as_mut() {
            view.live.remove(&self.ticket);
            if let Some(remote) = remote {
                view.confirmed = remote;
            }
        }

        match (state.shown(), remote) {
            (Some((epoch, shown)), _) => self.inner.feed.show_like(epoch, &self.key.0, shown),
            (None, Some(remote)) if state.in_flight == 0 => {
                self.inner.feed.reconcile_like(&self.key.0, remote)
            }
            _ => {}
        }

        if state.in_flight == 0 {
            drop(state);
            if slots
                .get(&self.key)
                .map_or(false, |slot| Arc::ptr_eq(slot, &self.slot))
            {
                slots.remove(&self.key);
            }
        }
    }
}

impl Drop for PendingToggle {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.op.is_pending() {
            // Holding the turn means the remote sequence was cut short
            let interrupted = self.turn.is_some();
            info!(post_id = %self.key.0, interrupted, "Like toggle dropped before settling");
            self.fail(FeedError::Cancelled);
            if interrupted {
                self.inner.clone().spawn_reconcile(self.key.clone());
            }
        } else {
            self.leave(None);
        }
    }
}
