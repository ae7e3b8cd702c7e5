//! Code issuer reached through the verification webhook.

use async_trait::async_trait;

use crate::error::VerificationError;

/// Marker the issuer uses to recognise code traffic.
const CODE_REQUEST: &str = "code request";

/// Remote service that issues and checks email codes.
///
/// The outcome of a check is not returned here; the issuer writes it to the
/// record store, where it becomes readable some time later.
#[async_trait]
pub trait CodeIssuer: Send + Sync {
    /// Send a fresh code to `email`.
    async fn request_code(&self, email: &str) -> Result<(), VerificationError>;

    /// Hand `code` to the issuer for checking.
    async fn submit_code(&self, email: &str, code: &str) -> Result<(), VerificationError>;
}

/// Issuer behind an HTTP webhook.
pub struct WebhookCodeIssuer {
    client: reqwest::Client,
    url: String,
}

impl WebhookCodeIssuer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn post(&self, body: serde_json::Value) -> Result<(), String> {
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("webhook returned {}", resp.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl CodeIssuer for WebhookCodeIssuer {
    async fn request_code(&self, email: &str) -> Result<(), VerificationError> {
        self.post(serde_json::json!({
            "email": email,
            "code_request": CODE_REQUEST,
        }))
        .await
        .map_err(|reason| VerificationError::RequestFailed { reason })
    }

    async fn submit_code(&self, email: &str, code: &str) -> Result<(), VerificationError> {
        self.post(serde_json::json!({
            "email": email,
            "code": code,
            "code_request": CODE_REQUEST,
        }))
        .await
        .map_err(|reason| VerificationError::CheckFailed { reason })
    }
}
