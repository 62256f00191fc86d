use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{NewUser, Recommender};
use crate::config::Config;
use crate::decision::FeedbackPayload;
use crate::error::{RecommenderError, Result};
use crate::item::RawItem;

/// Gorse returns candidates either as bare ids or as scored records.
#[derive(Deserialize)]
#[serde(untagged)]
enum Candidate {
    Id(String),
    Scored(ScoredId),
}

#[derive(Deserialize)]
struct ScoredId {
    #[serde(rename = "Id", alias = "id")]
    id: String,
}

impl Candidate {
    fn into_id(self) -> String {
        match self {
            Candidate::Id(id) => id,
            Candidate::Scored(scored) => scored.id,
        }
    }
}

/// HTTP client for a Gorse recommender.
#[derive(Clone)]
pub struct GorseClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GorseClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if !config.api_url.starts_with("http://") && !config.api_url.starts_with("https://") {
            return Err(RecommenderError::InvalidUrl(config.api_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL under `/api`. Each segment is percent-encoded, so ids
    /// containing `/`, `?` or `#` stay inside their own path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RecommenderError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| RecommenderError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RecommenderError::Status { status, body });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn candidates(&self, request: RequestBuilder) -> Result<Vec<String>> {
        let candidates: Option<Vec<Candidate>> = self.get_json(request).await?;
        Ok(candidates
            .unwrap_or_default()
            .into_iter()
            .map(Candidate::into_id)
            .collect())
    }
}

#[async_trait]
impl Recommender for GorseClient {
    async fn recommend(&self, user_id: &str, n: usize) -> Result<Vec<String>> {
        let url = self.url(&["recommend", user_id])?;
        tracing::debug!(user_id, n, "Requesting recommendations");
        self.candidates(self.client.get(url).query(&[("n", n)])).await
    }

    async fn item(&self, item_id: &str) -> Result<RawItem> {
        let url = self.url(&["item", item_id])?;
        self.get_json(self.client.get(url)).await
    }

    async fn insert_feedback(&self, feedback: &[FeedbackPayload]) -> Result<()> {
        let url = self.url(&["feedback"])?;
        tracing::debug!(count = feedback.len(), "Submitting feedback batch");
        self.send(self.client.post(url).json(feedback)).await?;
        Ok(())
    }

    async fn popular(&self, n: usize, category: Option<&str>) -> Result<Vec<String>> {
        let mut request = self.client.get(self.url(&["popular"])?).query(&[("n", n)]);
        if let Some(category) = category {
            request = request.query(&[("category", category)]);
        }
        self.candidates(request).await
    }

    async fn latest(&self, n: usize) -> Result<Vec<String>> {
        self.candidates(self.client.get(self.url(&["latest"])?).query(&[("n", n)]))
            .await
    }

    async fn insert_user(&self, user: &NewUser) -> Result<()> {
        self.send(self.client.post(self.url(&["user"])?).json(user)).await?;
        Ok(())
    }
}
