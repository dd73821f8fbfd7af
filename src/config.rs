//! Engine configuration

use std::path::PathBuf;

use crate::backend::GenerationOptions;

/// System prompt injected as the leading turn of every rendered prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant running on-device. \
    Format your responses using markdown for better readability. \
    Use **bold** for emphasis, `code` for inline code, ```language for code blocks, \
    bullet points with -, and proper headings with #.";

/// Number of most recent history turns included when rendering a prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Configuration for [`ChatEngine`](crate::ChatEngine) and its session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory where model artifacts are stored, one subdirectory per
    /// model id. Created lazily on first download.
    pub models_dir: PathBuf,
    /// System prompt prepended to every conversation.
    pub system_prompt: String,
    /// How many recent turns to keep when rendering a prompt.
    pub history_window: usize,
    /// Sampling options forwarded to the backend.
    pub generation: GenerationOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            generation: GenerationOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Config rooted at an explicit models directory.
    pub fn with_models_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            ..Self::default()
        }
    }
}

/// Platform data directory fallback for model storage.
fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("arcan")
        .join("models")
}
