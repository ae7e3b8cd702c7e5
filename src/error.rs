//! Error types for the intake core.
//!
//! Every error here is recoverable: each one leaves the wizard in a state the
//! user can retry from, with their entered data intact.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Media upload errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("File {name} is {size} bytes, limit is {limit}")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("File {name} has a type that is not allowed")]
    InvalidType { name: String },

    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },
}

impl UploadError {
    /// Message shown next to the upload control.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::FileTooLarge { .. } => "File size must be less than 100 MB",
            Self::InvalidType { .. } => "Invalid file type",
            Self::TransferFailed { .. } => "Failed to upload video",
        }
    }
}

/// Code verification errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("No verification in progress")]
    NoSession,

    #[error("Verification code must be {expected} characters")]
    MalformedCode { expected: usize },

    #[error("Code request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Code check failed: {reason}")]
    CheckFailed { reason: String },

    #[error("No successful verification record after {settle:?}")]
    NotVerified { settle: Duration },

    #[error("Maximum attempts ({max}) reached")]
    AttemptsExhausted { max: u32 },
}

impl VerificationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoSession => "Request a verification code first",
            Self::MalformedCode { .. } => "Enter the 6-digit code from your email",
            Self::RequestFailed { .. } => "Failed to send a new code",
            Self::CheckFailed { .. } | Self::NotVerified { .. } => "Invalid verification code",
            Self::AttemptsExhausted { .. } => "Maximum attempts reached. Please request a new code.",
        }
    }
}

/// Job submission errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Job endpoint unreachable: {0}")]
    Transport(String),

    #[error("Job endpoint rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl SubmissionError {
    pub fn user_message(&self) -> &'static str {
        "Failed to generate tweets. Please try again."
    }
}

/// Identity and record store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not signed in")]
    NoSession,

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Wizard controller errors.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("No signed-in user")]
    NotSignedIn,

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WizardError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotSignedIn => "Please sign in to continue".to_string(),
            Self::InvalidValue { message, .. } => message.clone(),
            Self::Upload(e) => e.user_message().to_string(),
            Self::Verification(e) => e.user_message().to_string(),
            Self::Submission(e) => e.user_message().to_string(),
            Self::Store(e) => e.to_string(),
        }
    }
}

/// Account flow errors (sign-up, sign-in, password reset).
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Invalid(String),

    #[error("Email has not been verified")]
    NotVerified,

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Webhook notification failed")]
    Notification(#[source] SubmissionError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
