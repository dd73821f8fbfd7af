//! Model manager types

use serde::{Deserialize, Serialize};

use crate::template::TemplateFamily;

/// Immutable catalog entry describing a downloadable model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique identifier, also the artifact directory name.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Human-readable download size, e.g. "2.4 GB".
    pub size: String,
    /// Expected artifact size in bytes, used for download progress.
    pub size_bytes: u64,
    /// Parameter count, e.g. "3.8B".
    pub params: String,
    /// Short description shown in the model picker.
    pub description: String,
    /// Repository the artifact is published under.
    pub repo_url: String,
    /// Artifact filename inside the model directory.
    pub filename: String,
    /// Quantization tag, e.g. "Q4_K_M".
    pub quantization: String,
    /// Prompt format, resolved when the catalog is defined.
    pub template_family: TemplateFamily,
}

impl ModelDescriptor {
    /// Direct download URL for the artifact.
    pub fn download_url(&self) -> String {
        format!("{}/resolve/main/{}", self.repo_url, self.filename)
    }
}

/// Mutable per-model download record.
///
/// A model is downloaded iff its artifact directory exists on disk, so
/// membership in the downloaded set is not tracked here. Progress is
/// monotonically non-decreasing within one attempt and resets to zero
/// when an attempt fails or is cancelled.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadState {
    /// Progress fraction in [0.0, 1.0].
    pub progress: f64,
    /// True while a download attempt is running.
    pub in_progress: bool,
    /// Message from the most recent failed attempt, if any.
    pub error: Option<String>,
}
