//! Error types for the chat engine
//!
//! Every error here is recoverable: download and load failures clean up
//! after themselves, and generation failures return the session to Ready.

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced across the engine's caller boundary.
#[derive(Debug, Clone, Serialize, Error)]
pub enum EngineError {
    /// Model artifact directory does not exist; download it first.
    #[error("model '{0}' is not downloaded")]
    ModelNotDownloaded(String),

    /// Model directory exists but the expected artifact file is missing.
    #[error("model artifact missing: {0}")]
    ArtifactMissing(String),

    /// The backend rejected the artifact, or a model is already loaded.
    #[error("failed to load model: {0}")]
    LoadFailed(String),

    /// Operation requires a loaded model with no generation in flight.
    #[error("no model is loaded and ready")]
    ModelNotLoaded,

    /// Generation aborted mid-stream; the session is back in Ready.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Download aborted or rejected; partial artifacts were removed.
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// Delete of a model that is not on disk.
    #[error("model '{0}' not found")]
    NotFound(String),
}
