//! On-device LLM chat engine
//!
//! The core pipeline behind a local chat app: a catalog of downloadable
//! models, a download manager that materializes their artifacts, a chat
//! template engine that renders conversations into model-specific
//! prompts, a token filter that cleans raw backend output, and an
//! inference session that ties them into a cancellable, ordered stream
//! of response chunks.
//!
//! The numeric inference kernel is an external collaborator behind the
//! [`backend::InferenceBackend`] trait; [`backend::MockBackend`] ships
//! in-crate for tests and kernel-free runs. Rendering and conversation
//! persistence are caller concerns.

pub mod backend;
pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod model_manager;
pub mod session;
pub mod stream;
pub mod template;

pub use backend::{GenerationOptions, InferenceBackend, MockBackend};
pub use chat::{Conversation, Message, Role};
pub use config::EngineConfig;
pub use engine::ChatEngine;
pub use error::EngineError;
pub use model_manager::{catalog, DownloadState, ModelDescriptor, ModelManager};
pub use session::{InferenceSession, SessionState};
pub use stream::{ChunkStream, FilterConfig, TokenFilter};
pub use template::TemplateFamily;
