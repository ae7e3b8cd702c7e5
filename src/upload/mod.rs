//! Upload pipeline: one media transfer at a time, with progress events.
//!
//! Transfers run as spawned tasks and report back over a channel as
//! [`UploadEvent`]s tagged with the [`SessionId`] they belong to. The wizard
//! controller drains those events and feeds them to [`UploadPipeline::apply`],
//! which drops anything tagged with a session that is no longer current.

pub mod cloudinary;
pub mod media;

pub use cloudinary::{CloudinaryStore, ObjectStore};
pub use media::{LocalPreview, MediaFile, PreviewRegistry};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::UploadLimits;
use crate::error::UploadError;

/// Monotonically increasing id of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

/// What happened to a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEventKind {
    /// Percentage of bytes handed to the transport, 0..=100.
    Progress(u8),
    /// Transfer finished; carries the durable URL.
    Completed(String),
    Failed(String),
}

/// Event emitted by a transfer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    pub session_id: SessionId,
    pub kind: UploadEventKind,
}

/// Sender handed to an [`ObjectStore`] for progress reporting.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    session_id: SessionId,
    tx: mpsc::UnboundedSender<UploadEvent>,
}

impl ProgressSink {
    /// Report `sent` of `total` bytes.
    pub fn report(&self, sent: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            ((sent.min(total) as f64 / total as f64) * 100.0).round() as u8
        };
        self.emit(UploadEventKind::Progress(percent));
    }

    fn emit(&self, kind: UploadEventKind) {
        // The pipeline may already be gone; nothing to tell then.
        let _ = self.tx.send(UploadEvent {
            session_id: self.session_id,
            kind,
        });
    }
}

/// Lifecycle of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Transferring,
    Completed { url: String },
    Failed { reason: String },
}

/// The single active upload.
#[derive(Debug)]
pub struct UploadSession {
    pub id: SessionId,
    pub file: MediaFile,
    pub progress: u8,
    pub state: UploadState,
    preview: Option<LocalPreview>,
}

impl UploadSession {
    pub fn preview_url(&self) -> Option<String> {
        self.preview.as_ref().map(LocalPreview::url)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, UploadState::Failed { .. })
    }
}

/// Effect of an accepted event, for the controller to write into the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadUpdate {
    Progress { percent: u8, reached_full: bool },
    Completed { url: String },
    Failed(UploadError),
}

/// Manages at most one active transfer.
pub struct UploadPipeline {
    store: Arc<dyn ObjectStore>,
    limits: UploadLimits,
    previews: PreviewRegistry,
    last_id: u64,
    session: Option<UploadSession>,
    transfers: Vec<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
    events_rx: mpsc::UnboundedReceiver<UploadEvent>,
}

impl UploadPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, limits: UploadLimits) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            limits,
            previews: PreviewRegistry::new(),
            last_id: 0,
            session: None,
            transfers: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Validate `file` and start transferring it, replacing any current session.
    ///
    /// A rejected file leaves the current session untouched.
    pub fn start(&mut self, file: MediaFile) -> Result<SessionId, UploadError> {
        if let Err(e) = file.check(&self.limits) {
            warn!(file = %file.name(), size = file.size(), error = %e, "Upload rejected");
            return Err(e);
        }

        self.last_id += 1;
        let id = SessionId(self.last_id);
        if let Some(old) = self.session.take() {
            debug!(old = %old.id, new = %id, "Superseding upload session");
        }

        info!(session_id = %id, file = %file.name(), size = file.size(), "Upload started");
        let preview = self.previews.acquire(&file);
        self.session = Some(UploadSession {
            id,
            file: file.clone(),
            progress: 0,
            state: UploadState::Transferring,
            preview: Some(preview),
        });

        let sink = ProgressSink {
            session_id: id,
            tx: self.events_tx.clone(),
        };
        let store = Arc::clone(&self.store);
        self.transfers.retain(|t| !t.is_finished());
        self.transfers.push(tokio::spawn(async move {
            match store.upload(&file, sink.clone()).await {
                Ok(url) => sink.emit(UploadEventKind::Completed(url)),
                Err(e) => sink.emit(UploadEventKind::Failed(e.to_string())),
            }
        }));

        Ok(id)
    }

    /// Restart the current session's file after a failure.
    pub fn retry(&mut self) -> Option<Result<SessionId, UploadError>> {
        let file = self
            .session
            .as_ref()
            .filter(|s| s.is_failed())
            .map(|s| s.file.clone())?;
        Some(self.start(file))
    }

    /// Drop the current session and its preview.
    ///
    /// An in-flight transfer keeps running, but its events are ignored.
    pub fn clear(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(session_id = %session.id, "Upload session cleared");
        }
    }

    /// Wait for the next event from any transfer.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events_rx.recv().await
    }

    /// Take an already queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<UploadEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Apply an event to the current session. Stale events return `None`.
    pub fn apply(&mut self, event: UploadEvent) -> Option<UploadUpdate> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.id == event.session_id)
        else {
            debug!(session_id = %event.session_id, "Ignoring event for stale upload session");
            return None;
        };

        if session.state != UploadState::Transferring {
            debug!(session_id = %session.id, "Ignoring event for settled upload session");
            return None;
        }

        match event.kind {
            UploadEventKind::Progress(percent) => {
                let percent = percent.min(100);
                if percent <= session.progress {
                    return None;
                }
                session.progress = percent;
                Some(UploadUpdate::Progress {
                    percent,
                    reached_full: percent == 100,
                })
            }
            UploadEventKind::Completed(url) => {
                info!(session_id = %session.id, url = %url, "Upload completed");
                session.progress = 100;
                session.state = UploadState::Completed { url: url.clone() };
                session.preview = None;
                Some(UploadUpdate::Completed { url })
            }
            UploadEventKind::Failed(reason) => {
                warn!(session_id = %session.id, reason = %reason, "Upload failed");
                session.state = UploadState::Failed {
                    reason: reason.clone(),
                };
                Some(UploadUpdate::Failed(UploadError::TransferFailed { reason }))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, event: UploadEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Drop for UploadPipeline {
    fn drop(&mut self) {
        for transfer in &self.transfers {
            transfer.abort();
        }
    }
}
