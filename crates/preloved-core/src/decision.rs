//! Swipe decisions and the feedback records sent to the recommender.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// What the user did with a shown item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionKind {
    Like,
    Skip,
}

/// A swipe, frozen at the moment it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    item_id: String,
    kind: DecisionKind,
    at: DateTime<Utc>,
}

impl Decision {
    pub fn new(item_id: impl Into<String>, kind: DecisionKind) -> Self {
        Self::at(item_id, kind, Utc::now())
    }

    pub fn at(item_id: impl Into<String>, kind: DecisionKind, at: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
            at,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn to_feedback(&self, user_id: &str, feedback_type: &str) -> FeedbackPayload {
        FeedbackPayload {
            feedback_type: feedback_type.to_string(),
            user_id: user_id.to_string(),
            item_id: self.item_id.clone(),
            timestamp: self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Feedback types understood by the recommender.
///
/// A like is sent as `star`, an explicit rejection as `hide`. Skips are not
/// reported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Star,
    Hide,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Star => "star",
            FeedbackKind::Hide => "hide",
        }
    }
}

/// One record of a `POST /api/feedback` batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedbackPayload {
    pub feedback_type: String,
    pub user_id: String,
    pub item_id: String,
    pub timestamp: String,
}

impl FeedbackPayload {
    pub fn now(kind: FeedbackKind, user_id: &str, item_id: &str) -> Self {
        Decision::new(item_id, DecisionKind::Like).to_feedback(user_id, kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_feedback_wire_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let decision = Decision::at("item-9", DecisionKind::Like, at);
        let payload = decision.to_feedback("alice", "star");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["FeedbackType"], "star");
        assert_eq!(json["UserId"], "alice");
        assert_eq!(json["ItemId"], "item-9");
        assert_eq!(json["Timestamp"], "2024-03-01T12:30:00.000Z");
    }

    #[test]
    fn test_feedback_kind_wire_names() {
        assert_eq!(FeedbackKind::Star.as_str(), "star");
        assert_eq!(FeedbackKind::Hide.as_str(), "hide");
    }
}
