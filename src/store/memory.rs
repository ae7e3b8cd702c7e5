//! In-memory store for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    GeneratedContent, IdentityStore, RecordStore, UserPreferences, UserSession, VerificationRecord,
    VerificationRecordStatus,
};
use crate::error::StoreError;

struct Account {
    session: UserSession,
    password: SecretString,
}

/// Identity and record store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<String>>,
    verifications: RwLock<Vec<VerificationRecord>>,
    preferences: RwLock<HashMap<String, UserPreferences>>,
    generated: RwLock<Vec<GeneratedContent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a signed-in account.
    pub async fn with_signed_in(email: &str, password: &str) -> Result<Self, StoreError> {
        let store = Self::new();
        let password = SecretString::from(password.to_string());
        store.sign_up("", email, &password).await?;
        Ok(store)
    }

    /// Write or replace the verification row for `email`.
    pub async fn set_verification(&self, email: &str, code: &str, status: VerificationRecordStatus) {
        let mut rows = self.verifications.write().await;
        rows.retain(|r| r.email != email);
        rows.push(VerificationRecord {
            email: email.to_string(),
            code: code.to_string(),
            status,
        });
    }

    pub async fn sign_out(&self) {
        *self.current.write().await = None;
    }

    /// Check a password without touching the session (test helper).
    pub async fn password_matches(&self, email: &str, password: &str) -> bool {
        self.accounts
            .read()
            .await
            .get(email)
            .is_some_and(|a| a.password.expose_secret() == password)
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn current_session(&self) -> Result<Option<UserSession>, StoreError> {
        let Some(email) = self.current.read().await.clone() else {
            return Ok(None);
        };
        Ok(self
            .accounts
            .read()
            .await
            .get(&email)
            .map(|a| a.session.clone()))
    }

    async fn sign_up(
        &self,
        full_name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<UserSession, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(StoreError::Auth("User already registered".into()));
        }
        let session = UserSession {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
        };
        accounts.insert(
            email.to_string(),
            Account {
                session: session.clone(),
                password: password.clone(),
            },
        );
        *self.current.write().await = Some(email.to_string());
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<UserSession, StoreError> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(email)
            .filter(|a| a.password.expose_secret() == password.expose_secret())
            .ok_or_else(|| StoreError::Auth("Invalid login credentials".into()))?;
        *self.current.write().await = Some(email.to_string());
        Ok(account.session.clone())
    }

    async fn update_password(&self, password: &SecretString) -> Result<(), StoreError> {
        let email = self.current.read().await.clone().ok_or(StoreError::NoSession)?;
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&email).ok_or(StoreError::NoSession)?;
        account.password = password.clone();
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_verification(
        &self,
        email: &str,
        code: Option<&str>,
    ) -> Result<Option<VerificationRecord>, StoreError> {
        Ok(self
            .verifications
            .read()
            .await
            .iter()
            .find(|r| r.email == email && code.is_none_or(|c| r.code == c))
            .cloned())
    }

    async fn get_preferences(&self, email: &str) -> Result<Option<UserPreferences>, StoreError> {
        Ok(self.preferences.read().await.get(email).cloned())
    }

    async fn upsert_preferences(&self, prefs: &UserPreferences) -> Result<(), StoreError> {
        self.preferences
            .write()
            .await
            .insert(prefs.user_email.clone(), prefs.clone());
        Ok(())
    }

    async fn insert_generated(&self, row: &GeneratedContent) -> Result<(), StoreError> {
        self.generated.write().await.push(row.clone());
        Ok(())
    }

    async fn list_generated(&self, user_email: &str) -> Result<Vec<GeneratedContent>, StoreError> {
        let mut rows: Vec<_> = self
            .generated
            .read()
            .await
            .iter()
            .filter(|r| r.user_email == user_email)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn delete_generated(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.generated.write().await;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() == before {
            return Err(StoreError::NotFound {
                entity: "generated_tweets".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
