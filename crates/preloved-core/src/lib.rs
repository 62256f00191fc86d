pub mod config;
pub mod decision;
pub mod error;
pub mod feed;
pub mod item;
pub mod onboarding;
pub mod recommender;

// Re-export main types for convenience
pub use config::Config;
pub use decision::{Decision, DecisionKind, FeedbackKind, FeedbackPayload};
pub use error::RecommenderError;
pub use feed::{FeedBuffer, FeedSettings, FeedSnapshot, RefillOutcome, SkipReason};
pub use item::{Item, RawItem};
pub use onboarding::{LoginResponse, Shelf, User};
pub use recommender::{fetch_items, GorseClient, NewUser, Recommender};
