//! Local media files and their preview handles.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use crate::config::UploadLimits;
use crate::error::UploadError;

/// A file the user picked or dropped.
#[derive(Debug, Clone)]
pub struct MediaFile {
    id: Uuid,
    name: String,
    mime: String,
    data: Arc<Vec<u8>>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mime: mime.into(),
            data: Arc::new(data),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn bytes(&self) -> &Arc<Vec<u8>> {
        &self.data
    }

    /// `.ext` suffix the way a browser file picker reports it.
    pub fn extension(&self) -> String {
        format!(".{}", self.name.rsplit('.').next().unwrap_or_default())
    }

    /// Check size and type against the configured limits.
    pub fn check(&self, limits: &UploadLimits) -> Result<(), UploadError> {
        if self.size() > limits.max_bytes {
            return Err(UploadError::FileTooLarge {
                name: self.name.clone(),
                size: self.size(),
                limit: limits.max_bytes,
            });
        }
        if let Some(allowed) = &limits.allowed_types {
            let ext = self.extension();
            let ok = allowed.iter().any(|entry| {
                if entry.contains('/') {
                    *entry == self.mime
                } else {
                    *entry == ext
                }
            });
            if !ok {
                return Err(UploadError::InvalidType {
                    name: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl PartialEq for MediaFile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Tracks live preview handles so hosts can confirm nothing leaks.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashSet<Uuid>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preview for `file`. Released when the handle is dropped.
    pub fn acquire(&self, file: &MediaFile) -> LocalPreview {
        let id = Uuid::new_v4();
        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id);
        debug!(preview = %id, file = %file.name(), "Preview acquired");
        LocalPreview {
            id,
            registry: self.clone(),
        }
    }

    /// Number of previews not yet released.
    pub fn live(&self) -> usize {
        self.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn release(&self, id: Uuid) {
        if self
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
        {
            debug!(preview = %id, "Preview released");
        }
    }
}

/// Handle to a locally rendered preview of a media file.
#[derive(Debug)]
pub struct LocalPreview {
    id: Uuid,
    registry: PreviewRegistry,
}

impl LocalPreview {
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl Drop for LocalPreview {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
