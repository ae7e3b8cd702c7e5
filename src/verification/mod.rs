//! Email code verification over an eventually consistent issuer.
//!
//! The issuer exposes no synchronous verify call: a code is handed to it,
//! and some time later it writes the outcome to the record store. Each check
//! therefore waits out a fixed settle window before reading the record back.
//!
//! Status progresses `Idle → Pending → {Success, Failure}`. A failure drops
//! back to `Idle` once the reset window has passed, unless the attempt budget
//! is spent, in which case only [`VerificationProtocol::resend_code`] clears it.

pub mod webhook;

pub use webhook::{CodeIssuer, WebhookCodeIssuer};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Timings;
use crate::error::VerificationError;
use crate::store::{RecordStore, VerificationRecordStatus};

/// Length of an issued code.
pub const CODE_LENGTH: usize = 6;

/// Where a verification exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failure,
}

impl VerificationStatus {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, target),
            (Idle, Pending) | (Failure, Pending) | (Pending, Success) | (Pending, Failure) | (Failure, Idle)
        )
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        write!(f, "{s}")
    }
}

/// Read-only view of the current exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationSnapshot {
    pub email: String,
    pub code: String,
    pub attempts: u32,
    pub status: VerificationStatus,
    /// Attempt budget spent; only a resend helps now.
    pub exhausted: bool,
}

#[derive(Debug)]
struct Session {
    id: u64,
    email: String,
    code: String,
    attempts: u32,
    status: VerificationStatus,
    failed_at: Option<Instant>,
}

impl Session {
    fn transition(&mut self, target: VerificationStatus) {
        if !self.status.can_transition_to(target) {
            warn!(from = %self.status, to = %target, "Unexpected verification transition");
        }
        self.status = target;
    }

    /// Drop a stale failure back to idle once the reset window has passed.
    fn settle(&mut self, now: Instant, timings: &Timings) {
        if self.status != VerificationStatus::Failure || self.attempts >= timings.verify_max_attempts {
            return;
        }
        if self
            .failed_at
            .is_some_and(|at| now >= at + timings.verify_failure_reset)
        {
            self.transition(VerificationStatus::Idle);
            self.failed_at = None;
        }
    }

    fn snapshot(&self, timings: &Timings) -> VerificationSnapshot {
        VerificationSnapshot {
            email: self.email.clone(),
            code: self.code.clone(),
            attempts: self.attempts,
            status: self.status,
            exhausted: self.attempts >= timings.verify_max_attempts,
        }
    }
}

/// Drives one verification exchange at a time.
pub struct VerificationProtocol {
    issuer: Arc<dyn CodeIssuer>,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    timings: Timings,
    session: RwLock<Option<Session>>,
    last_id: AtomicU64,
}

impl VerificationProtocol {
    pub fn new(
        issuer: Arc<dyn CodeIssuer>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        timings: Timings,
    ) -> Self {
        Self {
            issuer,
            records,
            clock,
            timings,
            session: RwLock::new(None),
            last_id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Ask the issuer for a code and open a fresh exchange for `email`.
    pub async fn request(&self, email: &str) -> Result<(), VerificationError> {
        self.issuer.request_code(email).await?;
        let id = self.next_id();
        *self.session.write().await = Some(Session {
            id,
            email: email.to_string(),
            code: String::new(),
            attempts: 0,
            status: VerificationStatus::Idle,
            failed_at: None,
        });
        info!(session = id, "Verification code requested");
        Ok(())
    }

    /// Current state, with an expired failure already reset to idle.
    pub async fn snapshot(&self) -> Option<VerificationSnapshot> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut()?;
        session.settle(self.clock.now(), &self.timings);
        Some(session.snapshot(&self.timings))
    }

    pub async fn status(&self) -> VerificationStatus {
        self.snapshot()
            .await
            .map(|s| s.status)
            .unwrap_or_default()
    }

    /// The email of an exchange that ended in success.
    pub async fn verified_email(&self) -> Option<String> {
        self.snapshot()
            .await
            .filter(|s| s.status == VerificationStatus::Success)
            .map(|s| s.email)
    }

    /// Check `code`: hand it to the issuer, wait out the settle window, then
    /// read the verification record.
    ///
    /// A call while a check is pending, after success, or with the attempt
    /// budget spent changes nothing.
    pub async fn submit_code(&self, code: &str) -> Result<VerificationStatus, VerificationError> {
        let code = code.trim();
        if code.chars().count() != CODE_LENGTH {
            return Err(VerificationError::MalformedCode {
                expected: CODE_LENGTH,
            });
        }

        let (id, email, attempt) = {
            let mut guard = self.session.write().await;
            let session = guard.as_mut().ok_or(VerificationError::NoSession)?;
            session.settle(self.clock.now(), &self.timings);

            if matches!(
                session.status,
                VerificationStatus::Pending | VerificationStatus::Success
            ) {
                debug!(status = %session.status, "Ignoring code submission");
                return Ok(session.status);
            }
            if session.attempts >= self.timings.verify_max_attempts {
                return Err(VerificationError::AttemptsExhausted {
                    max: self.timings.verify_max_attempts,
                });
            }

            session.attempts += 1;
            session.code = code.to_string();
            session.failed_at = None;
            session.transition(VerificationStatus::Pending);
            (session.id, session.email.clone(), session.attempts)
        };

        info!(session = id, attempt, "Checking verification code");
        let outcome = self.check(&email, code).await;

        let mut guard = self.session.write().await;
        let session = match guard.as_mut() {
            Some(session) if session.id == id => session,
            other => {
                debug!(session = id, "Discarding result for superseded verification session");
                return Ok(other.map(|s| s.status).unwrap_or_default());
            }
        };

        match outcome {
            Ok(()) => {
                session.transition(VerificationStatus::Success);
                info!(session = id, attempt, "Email verified");
                Ok(VerificationStatus::Success)
            }
            Err(e) => {
                session.transition(VerificationStatus::Failure);
                session.failed_at = Some(self.clock.now());
                if session.attempts >= self.timings.verify_max_attempts {
                    warn!(session = id, attempts = session.attempts, "Verification attempts exhausted");
                } else {
                    warn!(session = id, attempt, error = %e, "Verification failed");
                }
                Err(e)
            }
        }
    }

    async fn check(&self, email: &str, code: &str) -> Result<(), VerificationError> {
        self.issuer.submit_code(email, code).await?;
        self.clock.sleep(self.timings.verify_settle).await;

        match self.records.find_verification(email, Some(code)).await {
            Ok(Some(record)) if record.status == VerificationRecordStatus::Success => Ok(()),
            Ok(_) => Err(VerificationError::NotVerified {
                settle: self.timings.verify_settle,
            }),
            Err(e) => Err(VerificationError::CheckFailed {
                reason: e.to_string(),
            }),
        }
    }

    /// Send a fresh code and start the attempt budget over.
    ///
    /// A failed resend leaves the exchange untouched. A check still in flight
    /// is discarded once it returns.
    pub async fn resend_code(&self) -> Result<(), VerificationError> {
        let email = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.email.clone())
            .ok_or(VerificationError::NoSession)?;

        if let Err(e) = self.issuer.request_code(&email).await {
            warn!(error = %e, "Failed to resend verification code");
            return Err(e);
        }

        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_mut().filter(|s| s.email == email) {
            session.id = self.next_id();
            session.attempts = 0;
            session.code.clear();
            session.status = VerificationStatus::Idle;
            session.failed_at = None;
            info!(session = session.id, "Verification code resent");
        }
        Ok(())
    }

    /// Tear down the exchange. Results of any in-flight check are discarded.
    pub async fn close(&self) {
        if let Some(session) = self.session.write().await.take() {
            debug!(session = session.id, "Verification session closed");
        }
    }
}
