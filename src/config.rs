//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default upload size cap (100 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Fixed waits and bounds used by the asynchronous flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Wait between issuing a code check and reading the verification record.
    pub verify_settle: Duration,
    /// How long a failed verification stays in `failure` before returning to `idle`.
    pub verify_failure_reset: Duration,
    /// Code checks allowed before a resend is required.
    pub verify_max_attempts: u32,
    /// Minimum time between starting a submission and reporting success.
    pub submit_floor: Duration,
    /// How long the "upload complete" signal stays visible.
    pub upload_banner: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            verify_settle: Duration::from_secs(10),
            verify_failure_reset: Duration::from_secs(3),
            verify_max_attempts: 3,
            submit_floor: Duration::from_secs(20),
            upload_banner: Duration::from_secs(3),
        }
    }
}

/// Upload acceptance rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
    /// Entries containing `/` match a MIME type, others match a `.ext` suffix.
    /// `None` accepts any type.
    pub allowed_types: Option<Vec<String>>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: None,
        }
    }
}

/// Remote collaborators.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub supabase_url: String,
    pub supabase_anon_key: SecretString,
    pub job_webhook_url: String,
    pub verify_webhook_url: String,
    /// Told about deleted generated content. Defaults to the verification webhook.
    pub delete_webhook_url: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_upload_preset: String,
}

impl EndpointConfig {
    /// Cloudinary video upload endpoint for the configured account.
    pub fn cloudinary_upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/video/upload",
            self.cloudinary_cloud_name
        )
    }
}

/// Full intake configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub endpoints: EndpointConfig,
    pub timings: Timings,
    pub upload: UploadLimits,
    /// Block final submission until the user's email has been verified.
    pub require_verified_email: bool,
}

impl IntakeConfig {
    /// Load configuration from `AUTOSCRIPT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let verify_webhook_url = required("AUTOSCRIPT_VERIFY_WEBHOOK_URL")?;
        let endpoints = EndpointConfig {
            supabase_url: required("AUTOSCRIPT_SUPABASE_URL")?,
            supabase_anon_key: SecretString::from(required("AUTOSCRIPT_SUPABASE_ANON_KEY")?),
            job_webhook_url: required("AUTOSCRIPT_JOB_WEBHOOK_URL")?,
            delete_webhook_url: lookup("AUTOSCRIPT_DELETE_WEBHOOK_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| verify_webhook_url.clone()),
            verify_webhook_url,
            cloudinary_cloud_name: required("AUTOSCRIPT_CLOUDINARY_CLOUD_NAME")?,
            cloudinary_upload_preset: required("AUTOSCRIPT_CLOUDINARY_UPLOAD_PRESET")?,
        };

        let defaults = Timings::default();
        let secs = |key: &str, default: Duration| {
            parse_or(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };
        let timings = Timings {
            verify_settle: secs("AUTOSCRIPT_VERIFY_SETTLE_SECS", defaults.verify_settle)?,
            verify_failure_reset: secs("AUTOSCRIPT_VERIFY_RESET_SECS", defaults.verify_failure_reset)?,
            verify_max_attempts: parse_or(
                &lookup,
                "AUTOSCRIPT_VERIFY_MAX_ATTEMPTS",
                defaults.verify_max_attempts,
            )?,
            submit_floor: secs("AUTOSCRIPT_SUBMIT_FLOOR_SECS", defaults.submit_floor)?,
            upload_banner: secs("AUTOSCRIPT_UPLOAD_BANNER_SECS", defaults.upload_banner)?,
        };

        let allowed_types = lookup("AUTOSCRIPT_UPLOAD_ALLOWED_TYPES").map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });
        let upload = UploadLimits {
            max_bytes: parse_or(&lookup, "AUTOSCRIPT_UPLOAD_MAX_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            allowed_types: allowed_types.filter(|types| !types.is_empty()),
        };

        let require_verified_email =
            parse_or(&lookup, "AUTOSCRIPT_REQUIRE_VERIFIED_EMAIL", false)?;

        Ok(Self {
            endpoints,
            timings,
            upload,
            require_verified_email,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}
