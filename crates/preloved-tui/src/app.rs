use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::widgets::ListState;
use tokio::sync::mpsc;

use preloved_core::onboarding::{self, DEFAULT_INITIAL_ITEMS};
use preloved_core::{
    Config, FeedBuffer, FeedSnapshot, GorseClient, Item, LoginResponse, RecommenderError,
    RefillOutcome, Shelf, User,
};

use crate::tui::{AppEvent, FeedEvent};

/// Number of random recent items liked when seeding a cold-start profile.
const SEED_LIKES: usize = 10;
/// Items per browse shelf.
const SHELF_ITEMS: usize = 10;
const FEATURED_CATEGORY: &str = "Jewelry";

/// Status-line text for a failed recommender call.
fn describe_error(e: &RecommenderError) -> String {
    if e.is_transient() {
        format!("recommender unavailable, will retry ({})", e)
    } else {
        e.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Swipe,
    Liked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Login state
    pub login_input: String,
    pub login_pending: bool,
    pub user: Option<User>,

    // Feed
    pub feed: Arc<FeedBuffer<GorseClient>>,
    pub liked: Vec<Item>,
    pub liked_state: ListState,
    /// Browse shelves in display order; filled as they load.
    pub shelves: Vec<(Shelf, Vec<Item>)>,
    pub seeding: bool,

    // Status line
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    config: Config,
    /// Where the last user is remembered; `None` disables it.
    last_user_path: Option<PathBuf>,
    last_flush: Instant,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: Config, client: GorseClient, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        let feed = Arc::new(FeedBuffer::new(Arc::new(client), config.feed_settings()));
        let login_input = config.last_user.clone().unwrap_or_default();

        Self {
            should_quit: false,
            screen: Screen::Login,
            input_mode: InputMode::Editing,

            login_input,
            login_pending: false,
            user: None,

            feed,
            liked: Vec::new(),
            liked_state: ListState::default(),
            shelves: Vec::new(),
            seeding: false,

            status: None,
            animation_frame: 0,

            config,
            last_user_path: Config::path().ok(),
            last_flush: Instant::now(),
            events,
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.feed.snapshot()
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    // Login

    pub fn submit_login(&mut self) {
        let username = self.login_input.trim().to_string();
        if username.is_empty() {
            self.set_status("Enter a username to start swiping");
            return;
        }
        if self.login_pending {
            return;
        }

        self.login_pending = true;
        self.set_status(format!("Logging in as {}", username));

        let feed = self.feed.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = onboarding::login(feed.recommender().as_ref(), &username, DEFAULT_INITIAL_ITEMS)
                .await
                .map_err(|e| describe_error(&e));
            let _ = tx.send(AppEvent::Feed(FeedEvent::LoggedIn(result)));
        });
    }

    fn on_logged_in(&mut self, response: LoginResponse) {
        self.feed.reset_for_user(&response.user.id);
        if let Some(path) = &self.last_user_path {
            if let Err(e) = Config::save_last_user_to(path, &response.user.id) {
                tracing::warn!(error = %e, "Could not remember last user");
            }
        }

        self.set_status(format!("Welcome, {}!", response.user.name));
        self.user = Some(response.user);
        self.shelves = vec![
            (Shelf::Popular, response.initial_items),
            (Shelf::Category(FEATURED_CATEGORY.to_string()), Vec::new()),
            (Shelf::Latest, Vec::new()),
        ];
        self.liked.clear();
        self.liked_state = ListState::default();
        self.screen = Screen::Swipe;
        self.input_mode = InputMode::Normal;
        self.last_flush = Instant::now();
        self.spawn_refill();
        for (shelf, items) in &self.shelves {
            if items.is_empty() {
                self.spawn_shelf(shelf.clone());
            }
        }
    }

    /// Flush what we can, then return to the login screen.
    pub async fn logout(&mut self) {
        if !self.feed.flush_likes_when_idle().await {
            tracing::warn!(pending = self.feed.pending_likes(), "Logging out with unflushed likes");
        }
        self.feed.end_session();
        self.user = None;
        self.liked.clear();
        self.shelves.clear();
        self.screen = Screen::Login;
        self.input_mode = InputMode::Editing;
        self.set_status("Logged out");
    }

    // Swiping

    pub fn like_current(&mut self) {
        let Some(item) = self.feed.current_item() else {
            return;
        };
        if self.feed.record_like(&item) {
            self.liked.push(item);
            self.after_swipe();
        }
    }

    pub fn skip_current(&mut self) {
        let Some(item) = self.feed.current_item() else {
            return;
        };
        if self.feed.record_skip(&item) {
            self.after_swipe();
        }
    }

    fn after_swipe(&mut self) {
        self.status = None;
        if self.feed.needs_refill() {
            self.spawn_refill();
        }
    }

    // Background feed work

    pub fn spawn_refill(&self) {
        let feed = self.feed.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = feed.refill_if_needed().await.map_err(|e| describe_error(&e));
            let _ = tx.send(AppEvent::Feed(FeedEvent::Refilled(result)));
        });
    }

    fn spawn_shelf(&self, shelf: Shelf) {
        let feed = self.feed.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = onboarding::browse(feed.recommender().as_ref(), &shelf, SHELF_ITEMS)
                .await
                .map_err(|e| describe_error(&e));
            let _ = tx.send(AppEvent::Feed(FeedEvent::ShelfLoaded(shelf, result)));
        });
    }

    /// Pull-to-refresh: retry the recommender even if it ran dry earlier.
    pub fn refresh(&mut self) {
        self.feed.rearm();
        self.spawn_refill();
    }

    pub fn spawn_flush(&mut self) {
        self.last_flush = Instant::now();
        if self.feed.pending_likes() == 0 {
            return;
        }
        let feed = self.feed.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let flushed = feed.flush_likes().await;
            let _ = tx.send(AppEvent::Feed(FeedEvent::Flushed(flushed)));
        });
    }

    pub fn spawn_seed(&mut self) {
        let Some(user) = self.user.clone() else {
            return;
        };
        if self.seeding {
            return;
        }
        self.seeding = true;
        self.set_status("Seeding your style profile");

        let feed = self.feed.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = onboarding::seed_initial_likes(feed.recommender().as_ref(), &user.id, SEED_LIKES)
                .await
                .map(|liked| liked.len())
                .map_err(|e| describe_error(&e));
            let _ = tx.send(AppEvent::Feed(FeedEvent::Seeded(result)));
        });
    }

    pub fn on_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::LoggedIn(result) => {
                self.login_pending = false;
                match result {
                    Ok(response) => self.on_logged_in(response),
                    Err(e) => self.set_status(format!("Login failed: {}", e)),
                }
            }
            FeedEvent::Refilled(Ok(RefillOutcome::Exhausted)) => {
                self.set_status("You've seen everything for now");
            }
            FeedEvent::Refilled(Ok(RefillOutcome::Appended(n))) => {
                tracing::debug!(appended = n, "Refill finished");
            }
            FeedEvent::Refilled(Ok(_)) => {}
            FeedEvent::Refilled(Err(e)) => {
                self.set_status(format!("Could not load more items: {}", e));
            }
            FeedEvent::ShelfLoaded(shelf, Ok(items)) => {
                // Shelves of a previous session no longer have a slot.
                if let Some(slot) = self.shelves.iter_mut().find(|(s, _)| *s == shelf) {
                    slot.1 = items;
                }
            }
            FeedEvent::ShelfLoaded(shelf, Err(e)) => {
                tracing::warn!(shelf = %shelf.title(), error = %e, "Could not load shelf");
            }
            FeedEvent::Flushed(true) => {
                self.set_status("Likes saved");
            }
            FeedEvent::Flushed(false) => {
                self.set_status("Could not save likes, will retry");
            }
            FeedEvent::Seeded(result) => {
                self.seeding = false;
                match result {
                    Ok(n) => {
                        self.set_status(format!("Seeded {} likes", n));
                        // New feedback may unlock recommendations after exhaustion.
                        self.refresh();
                    }
                    Err(e) => self.set_status(format!("Seeding failed: {}", e)),
                }
            }
        }
    }

    pub fn tick(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;

        if self.user.is_none() {
            return;
        }
        let interval = Duration::from_secs(self.config.flush_interval_secs.max(1));
        if self.last_flush.elapsed() >= interval {
            self.spawn_flush();
            if self.feed.needs_refill() {
                self.spawn_refill();
            }
        }
    }

    // Views

    pub fn toggle_liked_view(&mut self) {
        self.screen = match self.screen {
            Screen::Swipe => {
                if self.liked_state.selected().is_none() && !self.liked.is_empty() {
                    self.liked_state.select(Some(0));
                }
                Screen::Liked
            }
            Screen::Liked => Screen::Swipe,
            Screen::Login => Screen::Login,
        };
    }

    pub fn liked_nav_down(&mut self) {
        let len = self.liked.len();
        if len > 0 {
            let i = self.liked_state.selected().unwrap_or(0);
            self.liked_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn liked_nav_up(&mut self) {
        let i = self.liked_state.selected().unwrap_or(0);
        self.liked_state.select(Some(i.saturating_sub(1)));
    }

    pub fn liked_total(&self) -> f64 {
        self.liked.iter().map(|item| item.price).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preloved_core::Recommender;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Config::default(), GorseClient::new("http://127.0.0.1:1"), tx);
        app.last_user_path = None;
        app
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(Item::id).collect()
    }

    #[tokio::test]
    async fn test_starts_on_login_with_last_user() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = Config {
            last_user: Some("alice".to_string()),
            ..Config::default()
        };
        let app = App::new(config, GorseClient::new("http://127.0.0.1:1"), tx);

        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.login_input, "alice");
    }

    #[tokio::test]
    async fn test_empty_login_is_rejected() {
        let mut app = app();
        app.login_input = "   ".to_string();
        app.submit_login();
        assert!(!app.login_pending);
        assert!(app.status.is_some());
    }

    #[tokio::test]
    async fn test_liked_navigation_and_total() {
        let mut app = app();
        let mut dress = Item::new("1");
        dress.price = 20.0;
        let mut boots = Item::new("2");
        boots.price = 35.5;
        app.liked = vec![dress, boots];
        app.screen = Screen::Swipe;

        app.toggle_liked_view();
        assert_eq!(app.screen, Screen::Liked);
        assert_eq!(app.liked_state.selected(), Some(0));

        app.liked_nav_down();
        app.liked_nav_down();
        assert_eq!(app.liked_state.selected(), Some(1));
        app.liked_nav_up();
        assert_eq!(app.liked_state.selected(), Some(0));
        assert_eq!(app.liked_total(), 55.5);
    }

    #[tokio::test]
    async fn test_swipes_without_items_do_nothing() {
        let mut app = app();
        app.like_current();
        app.skip_current();
        assert!(app.liked.is_empty());
    }

    #[tokio::test]
    async fn test_login_lays_out_shelves_and_fills_them_as_they_load() {
        let mut app = app();
        app.on_feed_event(FeedEvent::LoggedIn(Ok(LoginResponse {
            user: User {
                id: "alice".to_string(),
                name: "alice".to_string(),
            },
            initial_items: vec![Item::new("pop-1")],
        })));

        assert_eq!(app.screen, Screen::Swipe);
        let titles: Vec<String> = app.shelves.iter().map(|(s, _)| s.title()).collect();
        assert_eq!(titles, vec!["Trending now", "Trending now in Jewelry", "New in"]);
        assert_eq!(ids(&app.shelves[0].1), vec!["pop-1"]);
        assert!(app.shelves[2].1.is_empty());

        app.on_feed_event(FeedEvent::ShelfLoaded(Shelf::Latest, Ok(vec![Item::new("new-1")])));
        assert_eq!(ids(&app.shelves[2].1), vec!["new-1"]);

        app.on_feed_event(FeedEvent::ShelfLoaded(
            Shelf::Category("Jewelry".to_string()),
            Err("down".to_string()),
        ));
        assert!(app.shelves[1].1.is_empty());
    }

    #[tokio::test]
    async fn test_shelf_arriving_after_logout_is_ignored() {
        let mut app = app();
        app.on_feed_event(FeedEvent::ShelfLoaded(Shelf::Latest, Ok(vec![Item::new("new-1")])));
        assert!(app.shelves.is_empty());
    }

    #[tokio::test]
    async fn test_describe_error_marks_transient_failures() {
        let unreachable = GorseClient::new("http://127.0.0.1:1")
            .recommend("alice", 1)
            .await
            .unwrap_err();
        assert!(describe_error(&unreachable).starts_with("recommender unavailable, will retry"));

        let invalid = RecommenderError::InvalidUrl("gorse".to_string());
        assert_eq!(describe_error(&invalid), "invalid recommender url: gorse");
    }
}
