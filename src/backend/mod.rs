//! Inference backend boundary
//!
//! The numeric inference kernel is an external collaborator. This module
//! defines the seam the session drives: a backend loads an artifact into
//! a completion handle, and the handle produces raw token fragments until
//! the stream ends or `stop` is called. Handles release their resources
//! on drop.

pub mod mock;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use mock::MockBackend;

/// Sampling options forwarded to the backend when a completion starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

/// Factory for loaded models.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logging (e.g. "llama.cpp", "mock").
    fn name(&self) -> &'static str;

    /// Load the artifact at `path` and return a handle for completions.
    async fn load_model(&self, path: &Path) -> anyhow::Result<Box<dyn CompletionHandle>>;
}

/// One loaded model, able to run one completion at a time.
#[async_trait]
pub trait CompletionHandle: Send + Sync {
    /// Begin generating from `prompt`. Any previous completion state is
    /// discarded.
    async fn start_completion(
        &mut self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> anyhow::Result<()>;

    /// Next raw text fragment. `Ok(None)` signals end of stream.
    async fn next_fragment(&mut self) -> anyhow::Result<Option<String>>;

    /// True once the current completion has produced its last fragment.
    fn is_finished(&self) -> bool;

    /// Ask the backend to stop the in-flight completion promptly.
    async fn stop(&mut self);
}
