//! Supabase REST backend (GoTrue auth + PostgREST tables).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    GeneratedContent, IdentityStore, RecordStore, UserPreferences, UserSession, VerificationRecord,
};
use crate::config::EndpointConfig;
use crate::error::StoreError;

const VERIFICATIONS_TABLE: &str = "email_verifications";
const PREFERENCES_TABLE: &str = "user_preferences";
const GENERATED_TABLE: &str = "generated_tweets";

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: String,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl AuthUser {
    fn into_session(self) -> UserSession {
        let full_name = self
            .user_metadata
            .get("full_name")
            .or_else(|| self.user_metadata.get("name"))
            .and_then(|v| v.as_str())
            .map(String::from);
        UserSession {
            user_id: self.id,
            email: self.email,
            full_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    user: Option<AuthUser>,
}

/// Error shapes returned by GoTrue and PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

struct SignedIn {
    session: UserSession,
    access_token: SecretString,
}

/// HTTP client for a Supabase project.
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    signed_in: RwLock<Option<SignedIn>>,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, anon_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key,
            signed_in: RwLock::new(None),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(config.supabase_url.clone(), config.supabase_anon_key.clone())
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Bearer token: the user's access token when signed in, else the anon key.
    async fn bearer(&self) -> String {
        match self.signed_in.read().await.as_ref() {
            Some(s) => s.access_token.expose_secret().to_string(),
            None => self.anon_key.expose_secret().to_string(),
        }
    }

    async fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(self.bearer().await)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(text);
        Err(StoreError::Status { status, message })
    }

    async fn authenticate(&self, url: String, body: serde_json::Value) -> Result<UserSession, StoreError> {
        let req = self
            .client
            .post(url)
            .header("apikey", self.anon_key.expose_secret())
            .json(&body);
        let resp = self.send(req).await.map_err(|e| match e {
            StoreError::Status { message, .. } => StoreError::Auth(message),
            other => other,
        })?;
        let parsed: AuthResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let user = parsed
            .user
            .ok_or_else(|| StoreError::Auth("response carried no user".into()))?;
        let session = user.into_session();

        if let Some(token) = parsed.access_token {
            *self.signed_in.write().await = Some(SignedIn {
                session: session.clone(),
                access_token: SecretString::from(token),
            });
        }
        tracing::info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }
}

#[async_trait]
impl IdentityStore for SupabaseClient {
    async fn current_session(&self) -> Result<Option<UserSession>, StoreError> {
        Ok(self.signed_in.read().await.as_ref().map(|s| s.session.clone()))
    }

    async fn sign_up(
        &self,
        full_name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<UserSession, StoreError> {
        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
            "data": { "full_name": full_name },
        });
        self.authenticate(self.auth_url("signup"), body).await
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<UserSession, StoreError> {
        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
        });
        self.authenticate(self.auth_url("token?grant_type=password"), body)
            .await
    }

    async fn update_password(&self, password: &SecretString) -> Result<(), StoreError> {
        if self.signed_in.read().await.is_none() {
            return Err(StoreError::NoSession);
        }
        let req = self
            .request(reqwest::Method::PUT, self.auth_url("user"))
            .await
            .json(&serde_json::json!({ "password": password.expose_secret() }));
        self.send(req).await?;
        Ok(())
    }
}

async fn rows<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>, StoreError> {
    resp.json()
        .await
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn find_verification(
        &self,
        email: &str,
        code: Option<&str>,
    ) -> Result<Option<VerificationRecord>, StoreError> {
        let mut query = vec![
            ("select", "email,code,status".to_string()),
            ("email", format!("eq.{email}")),
            ("limit", "1".to_string()),
        ];
        if let Some(code) = code {
            query.push(("code", format!("eq.{code}")));
        }
        let req = self
            .request(reqwest::Method::GET, self.table_url(VERIFICATIONS_TABLE))
            .await
            .query(&query);
        let found: Vec<VerificationRecord> = rows(self.send(req).await?).await?;
        Ok(found.into_iter().next())
    }

    async fn get_preferences(&self, email: &str) -> Result<Option<UserPreferences>, StoreError> {
        let req = self
            .request(reqwest::Method::GET, self.table_url(PREFERENCES_TABLE))
            .await
            .query(&[
                ("select", "user_email,theme,accent_color".to_string()),
                ("user_email", format!("eq.{email}")),
                ("limit", "1".to_string()),
            ]);
        let found: Vec<UserPreferences> = rows(self.send(req).await?).await?;
        Ok(found.into_iter().next())
    }

    async fn upsert_preferences(&self, prefs: &UserPreferences) -> Result<(), StoreError> {
        let req = self
            .request(reqwest::Method::POST, self.table_url(PREFERENCES_TABLE))
            .await
            .header("Prefer", "resolution=merge-duplicates")
            .json(prefs);
        self.send(req).await?;
        Ok(())
    }

    async fn insert_generated(&self, row: &GeneratedContent) -> Result<(), StoreError> {
        let req = self
            .request(reqwest::Method::POST, self.table_url(GENERATED_TABLE))
            .await
            .json(row);
        self.send(req).await?;
        Ok(())
    }

    async fn list_generated(&self, user_email: &str) -> Result<Vec<GeneratedContent>, StoreError> {
        let req = self
            .request(reqwest::Method::GET, self.table_url(GENERATED_TABLE))
            .await
            .query(&[
                ("select", "*".to_string()),
                ("user_email", format!("eq.{user_email}")),
                ("order", "created_at.desc".to_string()),
            ]);
        rows(self.send(req).await?).await
    }

    async fn delete_generated(&self, id: Uuid) -> Result<(), StoreError> {
        let req = self
            .request(reqwest::Method::DELETE, self.table_url(GENERATED_TABLE))
            .await
            .query(&[("id", format!("eq.{id}"))]);
        self.send(req).await?;
        Ok(())
    }
}
