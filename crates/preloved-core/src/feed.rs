//! Client-side feed buffer.
//!
//! Sits between the swipe UI and the recommender: serves the head of a local
//! queue, records swipe decisions, refills the queue when it runs low and
//! flushes likes back to the recommender in batches.
//!
//! All state lives behind one mutex that is only held for short synchronous
//! sections, never across a network call, so every operation takes `&self`
//! and the buffer can be shared with spawned refill/flush tasks.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::decision::{Decision, DecisionKind, FeedbackKind, FeedbackPayload};
use crate::error::Result;
use crate::item::Item;
use crate::recommender::{fetch_items, Recommender, DEFAULT_FETCH_CONCURRENCY};

pub const DEFAULT_LOW_WATER_MARK: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// Refill when fewer than this many items are queued.
    pub low_water_mark: usize,
    /// Number of candidates requested per refill.
    pub batch_size: usize,
    pub fetch_concurrency: usize,
    /// Feedback type sent for a like.
    pub like_feedback_type: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            like_feedback_type: FeedbackKind::Star.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoUser,
    AboveLowWater,
    Exhausted,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillOutcome {
    /// The fetch completed and this many new items were queued.
    Appended(usize),
    /// The recommender returned no candidates; further refills are skipped.
    Exhausted,
    /// No request was made.
    Skipped(SkipReason),
    /// The session was reset while the request was in flight.
    Discarded,
}

/// Point-in-time view of the buffer, for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub user_id: Option<String>,
    pub current: Option<Item>,
    pub queue_len: usize,
    pub pending_likes: usize,
    pub exhausted: bool,
    pub fetching: bool,
    pub flushing: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    user_id: Option<String>,
    /// Bumped on every reset; stamps in-flight requests.
    generation: u64,
    queue: VecDeque<Item>,
    pending: Vec<Decision>,
    /// Items already decided this session.
    seen: HashSet<String>,
    exhausted: bool,
    fetching: bool,
    flushing: bool,
}

#[derive(Clone, Copy)]
enum Flight {
    Fetch,
    Flush,
}

/// Clears an in-flight flag when dropped, unless the session moved on.
struct InFlightGuard<'a> {
    state: &'a Mutex<FeedState>,
    flush_idle: &'a Notify,
    generation: u64,
    flight: Flight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = lock(self.state);
            if state.generation == self.generation {
                match self.flight {
                    Flight::Fetch => state.fetching = false,
                    Flight::Flush => state.flushing = false,
                }
            }
        }
        if let Flight::Flush = self.flight {
            self.flush_idle.notify_waiters();
        }
    }
}

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FeedBuffer<R: ?Sized> {
    recommender: Arc<R>,
    settings: FeedSettings,
    state: Mutex<FeedState>,
    /// Signalled whenever a flush finishes.
    flush_idle: Notify,
}

impl<R> FeedBuffer<R>
where
    R: Recommender + ?Sized,
{
    /// Create an empty buffer with no active user.
    pub fn new(recommender: Arc<R>, settings: FeedSettings) -> Self {
        Self {
            recommender,
            settings,
            state: Mutex::new(FeedState::default()),
            flush_idle: Notify::new(),
        }
    }

    pub fn recommender(&self) -> &Arc<R> {
        &self.recommender
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        lock(&self.state)
    }

    pub fn current_item(&self) -> Option<Item> {
        self.state().queue.front().cloned()
    }

    pub fn queue_len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn pending_likes(&self) -> usize {
        self.state().pending.len()
    }

    pub fn pending_decisions(&self) -> Vec<Decision> {
        self.state().pending.clone()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state().exhausted
    }

    pub fn is_fetching(&self) -> bool {
        self.state().fetching
    }

    pub fn user_id(&self) -> Option<String> {
        self.state().user_id.clone()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.state();
        FeedSnapshot {
            user_id: state.user_id.clone(),
            current: state.queue.front().cloned(),
            queue_len: state.queue.len(),
            pending_likes: state.pending.len(),
            exhausted: state.exhausted,
            fetching: state.fetching,
            flushing: state.flushing,
        }
    }

    /// True when the next refill check would actually hit the recommender.
    pub fn needs_refill(&self) -> bool {
        let state = self.state();
        state.user_id.is_some()
            && state.queue.len() < self.settings.low_water_mark
            && !state.exhausted
            && !state.fetching
    }

    /// Record a like for the item at the head of the queue.
    ///
    /// Returns `false` and changes nothing if `item` is not the head.
    pub fn record_like(&self, item: &Item) -> bool {
        self.record(item, DecisionKind::Like)
    }

    /// Drop the head of the queue without recording feedback.
    pub fn record_skip(&self, item: &Item) -> bool {
        self.record(item, DecisionKind::Skip)
    }

    fn record(&self, item: &Item, kind: DecisionKind) -> bool {
        let mut state = self.state();

        if state.user_id.is_none() {
            tracing::warn!(item_id = %item.id(), ?kind, "Swipe recorded with no active user");
            return false;
        }

        let head_matches = state.queue.front().map(Item::id) == Some(item.id());
        if !head_matches {
            tracing::warn!(
                item_id = %item.id(),
                head = ?state.queue.front().map(Item::id),
                ?kind,
                "Swipe does not match the head of the queue"
            );
            return false;
        }

        let Some(head) = state.queue.pop_front() else {
            return false;
        };
        state.seen.insert(head.id().to_string());
        if kind == DecisionKind::Like {
            state.pending.push(Decision::new(head.id(), kind));
        }
        tracing::debug!(item_id = %head.id(), ?kind, remaining = state.queue.len(), "Recorded swipe");
        true
    }

    /// Record a like, then check whether the queue needs refilling.
    pub async fn like(&self, item: &Item) -> bool {
        let recorded = self.record_like(item);
        if recorded {
            self.refill_quietly().await;
        }
        recorded
    }

    /// Record a skip, then check whether the queue needs refilling.
    pub async fn skip(&self, item: &Item) -> bool {
        let recorded = self.record_skip(item);
        if recorded {
            self.refill_quietly().await;
        }
        recorded
    }

    async fn refill_quietly(&self) {
        // Failures are logged by refill_if_needed and retried on the next trigger.
        let _ = self.refill_if_needed().await;
    }

    /// Fetch more candidates if the queue is below the low-water mark.
    ///
    /// At most one fetch is in flight at a time; overlapping calls return
    /// `Skipped(InFlight)` immediately. A response that arrives after the
    /// session was reset is thrown away.
    pub async fn refill_if_needed(&self) -> Result<RefillOutcome> {
        let (user_id, generation) = {
            let mut state = self.state();
            let Some(user_id) = state.user_id.clone() else {
                return Ok(RefillOutcome::Skipped(SkipReason::NoUser));
            };
            if state.queue.len() >= self.settings.low_water_mark {
                return Ok(RefillOutcome::Skipped(SkipReason::AboveLowWater));
            }
            if state.exhausted {
                return Ok(RefillOutcome::Skipped(SkipReason::Exhausted));
            }
            if state.fetching {
                return Ok(RefillOutcome::Skipped(SkipReason::InFlight));
            }
            state.fetching = true;
            (user_id, state.generation)
        };
        let _guard = InFlightGuard {
            state: &self.state,
            flush_idle: &self.flush_idle,
            generation,
            flight: Flight::Fetch,
        };

        let ids = match self
            .recommender
            .recommend(&user_id, self.settings.batch_size)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Refill failed");
                return Err(e);
            }
        };

        let items = if ids.is_empty() {
            Vec::new()
        } else {
            fetch_items(&*self.recommender, &ids, self.settings.fetch_concurrency).await
        };

        let outcome = {
            let mut state = self.state();
            if state.generation != generation {
                tracing::debug!(user_id = %user_id, "Discarding refill for a previous session");
                RefillOutcome::Discarded
            } else if ids.is_empty() {
                tracing::info!(user_id = %user_id, "Recommender has no more items");
                state.exhausted = true;
                RefillOutcome::Exhausted
            } else {
                let mut appended = 0;
                for item in items {
                    let duplicate = state.seen.contains(item.id())
                        || state.queue.iter().any(|queued| queued.id() == item.id());
                    if !duplicate {
                        state.queue.push_back(item);
                        appended += 1;
                    }
                }
                tracing::debug!(
                    user_id = %user_id,
                    requested = ids.len(),
                    appended,
                    queued = state.queue.len(),
                    "Refilled feed"
                );
                RefillOutcome::Appended(appended)
            }
        };
        Ok(outcome)
    }

    /// Submit every pending like as one feedback batch.
    ///
    /// Returns `true` when nothing is left to send. On failure the pending
    /// likes are kept so a later call resubmits the same decisions. Returns
    /// `false` straight away if another flush is in flight.
    pub async fn flush_likes(&self) -> bool {
        self.try_flush().await.unwrap_or(false)
    }

    /// Like [`flush_likes`](Self::flush_likes), but waits for a flush that is
    /// already in flight and then sends whatever it left pending.
    pub async fn flush_likes_when_idle(&self) -> bool {
        loop {
            // Registered before the flag is checked so a flush finishing in
            // between still wakes us.
            let idle = self.flush_idle.notified();
            match self.try_flush().await {
                Some(flushed) => return flushed,
                None => {
                    tracing::debug!("Waiting for in-flight flush");
                    idle.await;
                }
            }
        }
    }

    /// `None` when another flush holds the flag.
    async fn try_flush(&self) -> Option<bool> {
        let (generation, batch) = {
            let mut state = self.state();
            if state.pending.is_empty() {
                return Some(true);
            }
            let Some(user_id) = state.user_id.clone() else {
                tracing::warn!(pending = state.pending.len(), "Flush requested with no active user");
                return Some(false);
            };
            if state.flushing {
                tracing::debug!("Flush already in progress");
                return None;
            }
            state.flushing = true;

            let batch: Vec<FeedbackPayload> = state
                .pending
                .iter()
                .map(|d| d.to_feedback(&user_id, &self.settings.like_feedback_type))
                .collect();
            (state.generation, batch)
        };
        let _guard = InFlightGuard {
            state: &self.state,
            flush_idle: &self.flush_idle,
            generation,
            flight: Flight::Flush,
        };

        match self.recommender.insert_feedback(&batch).await {
            Ok(()) => {
                let mut state = self.state();
                if state.generation == generation {
                    let flushed = batch.len().min(state.pending.len());
                    state.pending.drain(..flushed);
                }
                tracing::info!(count = batch.len(), "Flushed likes");
                Some(true)
            }
            Err(e) => {
                tracing::warn!(count = batch.len(), error = %e, "Failed to flush likes");
                Some(false)
            }
        }
    }

    /// Allow refills again after the recommender reported no more items.
    pub fn rearm(&self) {
        let mut state = self.state();
        if state.exhausted {
            tracing::debug!("Re-arming exhausted feed");
            state.exhausted = false;
        }
    }

    /// Start a fresh session for `user_id`, dropping all state of the previous one.
    pub fn reset_for_user(&self, user_id: &str) {
        self.reset(Some(user_id.to_string()));
        tracing::info!(user_id, "Feed reset for user");
    }

    /// Drop all session state and leave no active user.
    pub fn end_session(&self) {
        self.reset(None);
        tracing::info!("Feed session ended");
    }

    fn reset(&self, user_id: Option<String>) {
        let mut state = self.state();
        if !state.pending.is_empty() {
            tracing::warn!(
                dropped = state.pending.len(),
                "Discarding unflushed likes on session reset"
            );
        }
        let generation = state.generation.wrapping_add(1);
        *state = FeedState {
            user_id,
            generation,
            ..FeedState::default()
        };
        drop(state);
        self.flush_idle.notify_waiters();
    }
}
