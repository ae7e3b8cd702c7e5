//! Sign-up, sign-in and code-verified password reset.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AccountError, StoreError, SubmissionError};
use crate::store::{GeneratedContent, IdentityStore, RecordStore, UserPreferences, UserSession};
use crate::verification::{VerificationProtocol, VerificationStatus};

/// Minimum length of a new password, in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Account screens' logic over the identity store and verification protocol.
pub struct AccountFlows {
    identity: Arc<dyn IdentityStore>,
    verification: Arc<VerificationProtocol>,
}

impl AccountFlows {
    pub fn new(identity: Arc<dyn IdentityStore>, verification: Arc<VerificationProtocol>) -> Self {
        Self {
            identity,
            verification,
        }
    }

    pub async fn sign_up(
        &self,
        full_name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<UserSession, AccountError> {
        if full_name.trim().is_empty() || email.trim().is_empty() || password.expose_secret().is_empty() {
            return Err(AccountError::Invalid("Please fill in all fields".into()));
        }
        let session = self
            .identity
            .sign_up(full_name.trim(), email.trim(), password)
            .await?;
        info!(user_id = %session.user_id, "Account created");
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<UserSession, AccountError> {
        if email.trim().is_empty() || password.expose_secret().is_empty() {
            return Err(AccountError::Invalid("Please enter your email and password".into()));
        }
        Ok(self.identity.sign_in(email.trim(), password).await?)
    }

    /// Send a reset code to `email`.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AccountError::Invalid("Please enter your email address".into()));
        }
        self.verification.request(email).await?;
        Ok(())
    }

    /// Check the emailed code. Takes the full settle window.
    pub async fn verify_reset_code(&self, code: &str) -> Result<VerificationStatus, AccountError> {
        Ok(self.verification.submit_code(code).await?)
    }

    /// Set a new password once the reset code has been verified.
    pub async fn reset_password(
        &self,
        password: &SecretString,
        confirmation: &SecretString,
    ) -> Result<(), AccountError> {
        let Some(email) = self.verification.verified_email().await else {
            return Err(AccountError::NotVerified);
        };
        if password.expose_secret().chars().count() < MIN_PASSWORD_CHARS {
            return Err(AccountError::Invalid(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters long"
            )));
        }
        if password.expose_secret() != confirmation.expose_secret() {
            return Err(AccountError::Invalid("Passwords do not match".into()));
        }

        self.identity.update_password(password).await?;
        self.verification.close().await;
        info!(email = %email, "Password reset");
        Ok(())
    }
}

/// Endpoint told when a generated row has been deleted.
#[async_trait]
pub trait DeletionNotifier: Send + Sync {
    async fn notify_deleted(&self, id: Uuid) -> Result<(), SubmissionError>;
}

/// Posts `{"id": ...}` to a webhook.
pub struct WebhookDeletionNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookDeletionNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl DeletionNotifier for WebhookDeletionNotifier {
    async fn notify_deleted(&self, id: Uuid) -> Result<(), SubmissionError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "id": id }))
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        Ok(())
    }
}

/// Generated content and preferences of the signed-in user.
pub struct UserRecords {
    identity: Arc<dyn IdentityStore>,
    records: Arc<dyn RecordStore>,
    notifier: Option<Arc<dyn DeletionNotifier>>,
}

impl UserRecords {
    pub fn new(identity: Arc<dyn IdentityStore>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            identity,
            records,
            notifier: None,
        }
    }

    /// Report each deletion to `notifier` after the row is gone.
    pub fn with_deletion_notifier(mut self, notifier: Arc<dyn DeletionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    async fn user(&self) -> Result<UserSession, AccountError> {
        Ok(self
            .identity
            .current_session()
            .await?
            .ok_or(StoreError::NoSession)?)
    }

    /// Generated content, newest first.
    pub async fn history(&self) -> Result<Vec<GeneratedContent>, AccountError> {
        let user = self.user().await?;
        Ok(self.records.list_generated(&user.email).await?)
    }

    /// Delete one of the user's generated rows.
    ///
    /// A failed notification is reported even though the row is already gone.
    pub async fn delete(&self, id: Uuid) -> Result<(), AccountError> {
        let user = self.user().await?;
        let owned = self
            .records
            .list_generated(&user.email)
            .await?
            .iter()
            .any(|row| row.id == id);
        if !owned {
            return Err(StoreError::NotFound {
                entity: "generated_tweets".into(),
                id: id.to_string(),
            }
            .into());
        }
        self.records.delete_generated(id).await?;
        info!(%id, "Generated content deleted");

        if let Some(notifier) = &self.notifier {
            notifier.notify_deleted(id).await.map_err(|e| {
                warn!(%id, error = %e, "Deletion webhook failed");
                AccountError::Notification(e)
            })?;
        }
        Ok(())
    }

    /// Stored preferences, or the defaults when none were saved yet.
    pub async fn preferences(&self) -> Result<UserPreferences, AccountError> {
        let user = self.user().await?;
        Ok(self
            .records
            .get_preferences(&user.email)
            .await?
            .unwrap_or_else(|| UserPreferences::defaults_for(&user.email)))
    }

    pub async fn save_preferences(&self, mut prefs: UserPreferences) -> Result<(), AccountError> {
        let user = self.user().await?;
        prefs.user_email = user.email;
        self.records.upsert_preferences(&prefs).await?;
        Ok(())
    }
}
