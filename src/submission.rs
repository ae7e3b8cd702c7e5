//! Generation job dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SubmissionError;
use crate::form::{ContentMode, FormState, MediaSource};
use crate::store::UserSession;

/// Body posted to the job webhook: the whole form plus who sent it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub content_mode: ContentMode,
    pub media_source: MediaSource,
    pub video_url: Option<String>,
    pub script_text: String,
    pub profile_url: String,
    pub target_audience: String,
    pub tweet_count: u32,
    pub max_chars_per_tweet: u32,
    pub niches: Vec<String>,
    pub style_tags: Vec<String>,
    pub tone: String,
    pub hobbies: String,
    pub age: Option<u32>,
    pub gender: String,
    pub extra_context: String,
    #[serde(rename = "user_email")]
    pub user_email: String,
    #[serde(rename = "user_id")]
    pub user_id: Uuid,
}

impl JobPayload {
    pub fn new(form: &FormState, user: &UserSession) -> Self {
        Self {
            content_mode: form.content_mode,
            media_source: form.media_source,
            video_url: match form.content_mode {
                ContentMode::Video => form.media_remote_url.clone(),
                ContentMode::Text => None,
            },
            script_text: form.script_text.clone(),
            profile_url: form.profile_url.clone(),
            target_audience: form.target_audience.clone(),
            tweet_count: form.tweet_count.get(),
            max_chars_per_tweet: form.max_chars_per_tweet,
            niches: form.niches.iter().map(String::from).collect(),
            style_tags: form.style_tags.iter().map(String::from).collect(),
            tone: form.tone.clone(),
            hobbies: form.hobbies.clone(),
            age: form.age,
            gender: form.gender.clone(),
            extra_context: form.extra_context.clone(),
            user_email: user.email.clone(),
            user_id: user.user_id,
        }
    }
}

/// Acknowledgement from the job endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReceipt {
    pub status: u16,
    /// Response body, when it was JSON.
    pub body: Option<serde_json::Value>,
}

/// Remote endpoint that accepts generation jobs.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, payload: &JobPayload) -> Result<JobReceipt, SubmissionError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Dispatcher that posts JSON to a webhook.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl JobDispatcher for WebhookDispatcher {
    async fn dispatch(&self, payload: &JobPayload) -> Result<JobReceipt, SubmissionError> {
        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            tracing::error!(status = status.as_u16(), error = %message, "Job webhook rejected submission");
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(JobReceipt {
            status: status.as_u16(),
            body: serde_json::from_str(&text).ok(),
        })
    }
}
