pub mod gorse;

pub use gorse::GorseClient;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::decision::FeedbackPayload;
use crate::error::Result;
use crate::item::{Item, RawItem};

/// Default number of item lookups allowed in flight during hydration.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// User record for `POST /api/user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewUser {
    pub user_id: String,
    pub labels: Vec<String>,
    pub subscribe: Vec<String>,
    pub comment: String,
}

/// The recommendation service, seen from the client.
///
/// Candidate lists are returned as bare item identifiers in ranked order;
/// use [`fetch_items`] to turn them into displayable [`Item`]s.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, user_id: &str, n: usize) -> Result<Vec<String>>;

    async fn item(&self, item_id: &str) -> Result<RawItem>;

    /// Submit a batch of feedback. The batch is accepted or rejected as a whole.
    async fn insert_feedback(&self, feedback: &[FeedbackPayload]) -> Result<()>;

    async fn popular(&self, n: usize, category: Option<&str>) -> Result<Vec<String>>;

    async fn latest(&self, n: usize) -> Result<Vec<String>>;

    async fn insert_user(&self, user: &NewUser) -> Result<()>;
}

/// Look up item details for `ids` with at most `concurrency` requests in flight.
///
/// Results keep the order of `ids`. Lookups that fail are logged and left
/// out; the rest of the batch is still returned.
pub async fn fetch_items<R>(recommender: &R, ids: &[String], concurrency: usize) -> Vec<Item>
where
    R: Recommender + ?Sized,
{
    stream::iter(ids.iter().cloned())
        .map(|id| async move {
            let result = recommender.item(&id).await;
            (id, result)
        })
        .buffered(concurrency.max(1))
        .filter_map(|(id, result)| async move {
            match result {
                Ok(mut raw) => {
                    if raw.item_id.is_empty() {
                        raw.item_id = id;
                    }
                    Some(Item::from_raw(raw))
                }
                Err(e) => {
                    tracing::warn!(item_id = %id, error = %e, "Dropping item that failed to load");
                    None
                }
            }
        })
        .collect()
        .await
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory recommender used by the feed and onboarding tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use reqwest::StatusCode;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::error::RecommenderError;

    fn unavailable() -> RecommenderError {
        RecommenderError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "down".to_string(),
        }
    }

    #[derive(Default)]
    pub struct FakeRecommender {
        /// Successive responses to `recommend`; empty once drained.
        pub batches: Mutex<VecDeque<Vec<String>>>,
        pub missing_items: Mutex<Vec<String>>,
        pub labels: Mutex<HashMap<String, serde_json::Value>>,
        pub popular_ids: Vec<String>,
        pub latest_ids: Vec<String>,
        pub fail_recommend: Mutex<bool>,
        pub fail_feedback: Mutex<bool>,
        pub recommend_calls: AtomicUsize,
        pub item_calls: AtomicUsize,
        pub feedback_batches: Mutex<Vec<Vec<FeedbackPayload>>>,
        pub users: Mutex<Vec<NewUser>>,
        /// When set, `recommend` and `insert_feedback` wait for a permit.
        pub gate: Option<Arc<Semaphore>>,
    }

    impl FakeRecommender {
        pub fn with_batches(batches: Vec<Vec<&str>>) -> Self {
            Self {
                batches: Mutex::new(
                    batches
                        .into_iter()
                        .map(|b| b.into_iter().map(String::from).collect())
                        .collect(),
                ),
                ..Default::default()
            }
        }

        pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub fn recommend_calls(&self) -> usize {
            self.recommend_calls.load(Ordering::SeqCst)
        }

        pub fn submitted(&self) -> Vec<Vec<FeedbackPayload>> {
            self.feedback_batches.lock().unwrap().clone()
        }

        async fn wait_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
        }
    }

    #[async_trait]
    impl Recommender for FakeRecommender {
        async fn recommend(&self, _user_id: &str, n: usize) -> Result<Vec<String>> {
            self.recommend_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_gate().await;
            if *self.fail_recommend.lock().unwrap() {
                return Err(unavailable());
            }
            let mut batch = self.batches.lock().unwrap().pop_front().unwrap_or_default();
            batch.truncate(n);
            Ok(batch)
        }

        async fn item(&self, item_id: &str) -> Result<RawItem> {
            self.item_calls.fetch_add(1, Ordering::SeqCst);
            if self.missing_items.lock().unwrap().iter().any(|m| m == item_id) {
                return Err(RecommenderError::Status {
                    status: StatusCode::NOT_FOUND,
                    body: String::new(),
                });
            }
            Ok(RawItem {
                item_id: item_id.to_string(),
                labels: self.labels.lock().unwrap().get(item_id).cloned(),
                comment: Some(format!("Item {item_id}")),
                ..Default::default()
            })
        }

        async fn insert_feedback(&self, feedback: &[FeedbackPayload]) -> Result<()> {
            self.wait_gate().await;
            if *self.fail_feedback.lock().unwrap() {
                return Err(unavailable());
            }
            self.feedback_batches.lock().unwrap().push(feedback.to_vec());
            Ok(())
        }

        async fn popular(&self, n: usize, _category: Option<&str>) -> Result<Vec<String>> {
            Ok(self.popular_ids.iter().take(n).cloned().collect())
        }

        async fn latest(&self, n: usize) -> Result<Vec<String>> {
            Ok(self.latest_ids.iter().take(n).cloned().collect())
        }

        async fn insert_user(&self, user: &NewUser) -> Result<()> {
            self.users.lock().unwrap().push(user.clone());
            Ok(())
        }
    }
}
