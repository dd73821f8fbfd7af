//! Model storage and download tracking
//!
//! Owns the models root directory, one subdirectory per model id. A
//! model counts as downloaded exactly when its directory exists; the
//! downloader only renames a directory into place once the artifact and
//! metadata are fully written, so this check never observes a partial
//! download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use super::downloader::run_download;
use super::source::{ArtifactSource, HttpArtifactSource};
use super::types::{DownloadState, ModelDescriptor};
use crate::error::EngineError;

pub struct ModelManager {
    models_dir: PathBuf,
    source: Arc<dyn ArtifactSource>,
    /// Per-model download state, shared with concurrent progress queries.
    states: DashMap<String, DownloadState>,
    /// Cancellation tokens for active attempts.
    cancel_tokens: DashMap<String, CancellationToken>,
}

impl ModelManager {
    /// Manager downloading over HTTP into `models_dir`. The directory is
    /// created lazily on first download.
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self::with_source(models_dir, Arc::new(HttpArtifactSource::new()))
    }

    /// Manager with a custom artifact source.
    pub fn with_source(models_dir: impl Into<PathBuf>, source: Arc<dyn ArtifactSource>) -> Self {
        let models_dir = models_dir.into();
        info!("models directory: {:?}", models_dir);
        Self {
            models_dir,
            source,
            states: DashMap::new(),
            cancel_tokens: DashMap::new(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Directory holding a model's artifact and metadata.
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir.join(model_id)
    }

    /// Resolved path of a descriptor's artifact file.
    pub fn model_path(&self, descriptor: &ModelDescriptor) -> PathBuf {
        self.model_dir(&descriptor.id).join(&descriptor.filename)
    }

    /// True iff the artifact directory exists for `model_id`.
    pub fn is_downloaded(&self, model_id: &str) -> bool {
        self.model_dir(model_id).is_dir()
    }

    /// Progress fraction in [0.0, 1.0] for `model_id`.
    pub fn download_progress(&self, model_id: &str) -> f64 {
        self.download_state(model_id).progress
    }

    /// Snapshot of the download record for `model_id`.
    pub fn download_state(&self, model_id: &str) -> DownloadState {
        if let Some(state) = self.states.get(model_id) {
            return state.clone();
        }
        DownloadState {
            progress: if self.is_downloaded(model_id) { 1.0 } else { 0.0 },
            ..DownloadState::default()
        }
    }

    /// Download a model's artifact. A no-op success if already
    /// downloaded; rejects a second call while an attempt for the same
    /// id is in flight.
    pub async fn download(&self, descriptor: &ModelDescriptor) -> Result<(), EngineError> {
        if self.is_downloaded(&descriptor.id) {
            info!("model '{}' already downloaded", descriptor.id);
            return Ok(());
        }

        // Claim the attempt atomically with respect to same-id callers.
        {
            let mut state = self.states.entry(descriptor.id.clone()).or_default();
            if state.in_progress {
                warn!("model '{}' is already being downloaded", descriptor.id);
                return Err(EngineError::DownloadFailed(format!(
                    "model '{}' is already being downloaded",
                    descriptor.id
                )));
            }
            *state = DownloadState {
                progress: 0.0,
                in_progress: true,
                error: None,
            };
        }

        let cancel = CancellationToken::new();
        self.cancel_tokens
            .insert(descriptor.id.clone(), cancel.clone());
        info!("starting download of model '{}'", descriptor.id);

        let result = run_download(
            &self.models_dir,
            descriptor,
            self.source.as_ref(),
            &cancel,
            |fraction| {
                if let Some(mut state) = self.states.get_mut(&descriptor.id) {
                    // Monotonic within the attempt.
                    if fraction > state.progress {
                        state.progress = fraction;
                    }
                }
            },
        )
        .await;

        self.cancel_tokens.remove(&descriptor.id);
        match &result {
            Ok(()) => {
                self.states.insert(
                    descriptor.id.clone(),
                    DownloadState {
                        progress: 1.0,
                        in_progress: false,
                        error: None,
                    },
                );
                info!("download complete: {}", descriptor.id);
            }
            Err(e) => {
                self.states.insert(
                    descriptor.id.clone(),
                    DownloadState {
                        progress: 0.0,
                        in_progress: false,
                        error: Some(e.to_string()),
                    },
                );
                warn!("download failed for '{}': {}", descriptor.id, e);
            }
        }
        result
    }

    /// Signal the in-flight attempt for `model_id` to stop. No-op when
    /// nothing is downloading.
    pub fn cancel_download(&self, model_id: &str) {
        if let Some(token) = self.cancel_tokens.get(model_id) {
            token.cancel();
            info!("cancellation requested for model '{}'", model_id);
        } else {
            warn!("no active download for model '{}'", model_id);
        }
    }

    /// Remove a downloaded model's directory.
    pub async fn delete_model(&self, model_id: &str) -> Result<(), EngineError> {
        let dir = self.model_dir(model_id);
        if !dir.exists() {
            return Err(EngineError::NotFound(model_id.to_string()));
        }
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| {
                EngineError::DownloadFailed(format!("failed to delete model directory: {}", e))
            })?;
        self.states.remove(model_id);
        info!("deleted model '{}'", model_id);
        Ok(())
    }
}
