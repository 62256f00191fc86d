use reqwest::StatusCode;

/// Failures talking to the recommender.
///
/// Every variant is recoverable from the feed's point of view: the caller
/// keeps its state and may retry later.
#[derive(Debug, thiserror::Error)]
pub enum RecommenderError {
    #[error("recommender request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("recommender returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("could not decode recommender response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid recommender url: {0}")]
    InvalidUrl(String),
}

impl RecommenderError {
    /// True for failures worth retrying later (network, 5xx, throttling).
    pub fn is_transient(&self) -> bool {
        match self {
            RecommenderError::Http(_) => true,
            RecommenderError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            RecommenderError::Decode(_) | RecommenderError::InvalidUrl(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommenderError>;
