//! Mock login and cold-start helpers.
//!
//! There is no real authentication: logging in registers the user with the
//! recommender and hands back popular items to show while personalised
//! recommendations warm up.

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::decision::{FeedbackKind, FeedbackPayload};
use crate::error::Result;
use crate::item::Item;
use crate::recommender::{fetch_items, NewUser, Recommender, DEFAULT_FETCH_CONCURRENCY};

pub const NEW_USER_LABEL: &str = "new_user";
pub const DEFAULT_INITIAL_ITEMS: usize = 20;
/// Size of the latest-items pool cold-start likes are drawn from.
const SEED_POOL_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub user: User,
    pub initial_items: Vec<Item>,
}

/// Item shelves shown next to the swipe card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shelf {
    Popular,
    Latest,
    Category(String),
}

impl Shelf {
    pub fn title(&self) -> String {
        match self {
            Shelf::Popular => "Trending now".to_string(),
            Shelf::Latest => "New in".to_string(),
            Shelf::Category(category) => format!("Trending now in {}", category),
        }
    }
}

#[derive(Serialize)]
struct UserComment<'a> {
    name: &'a str,
    #[serde(rename = "createdAt")]
    created_at: String,
}

/// Register `username` with the recommender and fetch popular items for cold start.
pub async fn login<R>(recommender: &R, username: &str, initial_n: usize) -> Result<LoginResponse>
where
    R: Recommender + ?Sized,
{
    let username = username.trim();
    let comment = serde_json::to_string(&UserComment {
        name: username,
        created_at: Utc::now().to_rfc3339(),
    })?;

    let new_user = NewUser {
        user_id: username.to_string(),
        labels: vec![NEW_USER_LABEL.to_string()],
        subscribe: Vec::new(),
        comment,
    };

    if let Err(e) = recommender.insert_user(&new_user).await {
        tracing::error!(user_id = %username, error = %e, "Login failed");
        return Err(e);
    }

    let initial_items = browse(recommender, &Shelf::Popular, initial_n).await?;
    tracing::info!(user_id = %username, initial = initial_items.len(), "User logged in");

    Ok(LoginResponse {
        user: User {
            id: username.to_string(),
            name: username.to_string(),
        },
        initial_items,
    })
}

/// Fetch and hydrate one shelf of items.
pub async fn browse<R>(recommender: &R, shelf: &Shelf, n: usize) -> Result<Vec<Item>>
where
    R: Recommender + ?Sized,
{
    let ids = match shelf {
        Shelf::Popular => recommender.popular(n, None).await?,
        Shelf::Latest => recommender.latest(n).await?,
        Shelf::Category(category) => recommender.popular(n, Some(category)).await?,
    };
    Ok(fetch_items(recommender, &ids, DEFAULT_FETCH_CONCURRENCY).await)
}

/// Give a brand-new user something to be recommended from by liking `n`
/// random recent items. Returns the liked item ids.
pub async fn seed_initial_likes<R>(recommender: &R, user_id: &str, n: usize) -> Result<Vec<String>>
where
    R: Recommender + ?Sized,
{
    let mut pool = recommender.latest(SEED_POOL_SIZE).await?;
    pool.shuffle(&mut rand::rng());
    pool.truncate(n);

    if pool.is_empty() {
        return Ok(pool);
    }

    let feedback: Vec<FeedbackPayload> = pool
        .iter()
        .map(|item_id| FeedbackPayload::now(FeedbackKind::Star, user_id, item_id))
        .collect();

    if let Err(e) = recommender.insert_feedback(&feedback).await {
        tracing::error!(user_id, error = %e, "Failed to seed initial likes");
        return Err(e);
    }
    tracing::info!(user_id, count = pool.len(), "Seeded initial likes");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommender::testing::FakeRecommender;
    use std::collections::HashSet;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[tokio::test]
    async fn test_login_registers_user_and_returns_popular() {
        let fake = FakeRecommender {
            popular_ids: ids("p", 30),
            ..Default::default()
        };

        let response = login(&fake, " alice ", DEFAULT_INITIAL_ITEMS).await.unwrap();

        assert_eq!(response.user.id, "alice");
        assert_eq!(response.initial_items.len(), DEFAULT_INITIAL_ITEMS);
        assert_eq!(response.initial_items[0].id(), "p0");

        let users = fake.users.lock().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, "alice");
        assert_eq!(users[0].labels, vec![NEW_USER_LABEL]);
        let comment: serde_json::Value = serde_json::from_str(&users[0].comment).unwrap();
        assert_eq!(comment["name"], "alice");
        assert!(comment["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_seed_initial_likes_picks_distinct_latest_items() {
        let fake = FakeRecommender {
            latest_ids: ids("l", 50),
            ..Default::default()
        };

        let liked = seed_initial_likes(&fake, "alice", 10).await.unwrap();
        assert_eq!(liked.len(), 10);
        assert_eq!(liked.iter().collect::<HashSet<_>>().len(), 10);

        let submitted = fake.submitted();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].iter().all(|f| f.feedback_type == "star" && f.user_id == "alice"));
        let sent: Vec<&String> = submitted[0].iter().map(|f| &f.item_id).collect();
        assert_eq!(sent, liked.iter().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_seed_with_empty_catalog_sends_nothing() {
        let fake = FakeRecommender::default();
        assert!(seed_initial_likes(&fake, "alice", 10).await.unwrap().is_empty());
        assert!(fake.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_browse_shelves() {
        let fake = FakeRecommender {
            popular_ids: ids("p", 3),
            latest_ids: ids("l", 3),
            ..Default::default()
        };
        let latest = browse(&fake, &Shelf::Latest, 2).await.unwrap();
        assert_eq!(latest.iter().map(Item::id).collect::<Vec<_>>(), vec!["l0", "l1"]);

        let jewelry = browse(&fake, &Shelf::Category("jewelry".to_string()), 5).await.unwrap();
        assert_eq!(jewelry.len(), 3);
        assert_eq!(Shelf::Category("jewelry".to_string()).title(), "Trending now in jewelry");
    }
}
