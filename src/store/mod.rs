//! Identity and record stores.
//!
//! Two async traits cover everything the intake core reads or writes
//! remotely: [`IdentityStore`] for the signed-in session and
//! [`RecordStore`] for preference, verification and generated-content rows.

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

/// Status column of a verification row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationRecordStatus {
    Pending,
    Success,
    #[serde(other)]
    Failed,
}

/// Row of `email_verifications`, written by the issuer after a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub email: String,
    pub code: String,
    pub status: VerificationRecordStatus,
}

/// Dashboard theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// Row of `user_preferences`, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_email: String,
    pub theme: Theme,
    pub accent_color: String,
}

impl UserPreferences {
    pub fn defaults_for(email: &str) -> Self {
        Self {
            user_email: email.to_string(),
            theme: Theme::default(),
            accent_color: "#a855f7".to_string(),
        }
    }
}

/// Processing state of a generation job's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Completed,
    Failed,
}

/// Row of `generated_tweets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub id: Uuid,
    pub user_email: String,
    pub tweets_content: String,
    pub created_at: DateTime<Utc>,
    pub status: GenerationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_title: Option<String>,
}

/// Authentication provider.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// The current session, if someone is signed in.
    async fn current_session(&self) -> Result<Option<UserSession>, StoreError>;

    async fn sign_up(
        &self,
        full_name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<UserSession, StoreError>;

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<UserSession, StoreError>;

    /// Change the signed-in user's password.
    async fn update_password(&self, password: &SecretString) -> Result<(), StoreError>;
}

/// Row storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ── Verification ────────────────────────────────────────────────

    /// Look up the verification row for `email`, narrowed to `code` when given.
    async fn find_verification(
        &self,
        email: &str,
        code: Option<&str>,
    ) -> Result<Option<VerificationRecord>, StoreError>;

    // ── Preferences ─────────────────────────────────────────────────

    async fn get_preferences(&self, email: &str) -> Result<Option<UserPreferences>, StoreError>;

    async fn upsert_preferences(&self, prefs: &UserPreferences) -> Result<(), StoreError>;

    // ── Generated content ───────────────────────────────────────────

    async fn insert_generated(&self, row: &GeneratedContent) -> Result<(), StoreError>;

    /// Rows for `user_email`, newest first.
    async fn list_generated(&self, user_email: &str) -> Result<Vec<GeneratedContent>, StoreError>;

    async fn delete_generated(&self, id: Uuid) -> Result<(), StoreError>;
}
