//! Chat engine facade
//!
//! Single entry point tying the catalog, download manager and inference
//! session together behind the surface the app layer talks to.

use std::sync::Arc;

use crate::backend::InferenceBackend;
use crate::chat::Message;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model_manager::{catalog, DownloadState, ModelDescriptor, ModelManager};
use crate::session::{InferenceSession, SessionState};
use crate::stream::ChunkStream;

pub struct ChatEngine {
    config: EngineConfig,
    manager: Arc<ModelManager>,
    session: InferenceSession,
}

impl ChatEngine {
    /// Engine downloading over HTTP and generating through `backend`.
    pub fn new(config: EngineConfig, backend: Arc<dyn InferenceBackend>) -> Self {
        let manager = Arc::new(ModelManager::new(config.models_dir.clone()));
        Self::with_manager(config, backend, manager)
    }

    /// Engine with a caller-provided model manager (custom artifact
    /// source or shared storage).
    pub fn with_manager(
        config: EngineConfig,
        backend: Arc<dyn InferenceBackend>,
        manager: Arc<ModelManager>,
    ) -> Self {
        let session = InferenceSession::new(backend, manager.clone(), config.clone());
        Self {
            config,
            manager,
            session,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// All selectable models.
    pub fn catalog(&self) -> &'static [ModelDescriptor] {
        catalog::catalog()
    }

    pub fn is_downloaded(&self, model_id: &str) -> bool {
        self.manager.is_downloaded(model_id)
    }

    pub fn download_progress(&self, model_id: &str) -> f64 {
        self.manager.download_progress(model_id)
    }

    pub fn download_state(&self, model_id: &str) -> DownloadState {
        self.manager.download_state(model_id)
    }

    pub async fn download(&self, descriptor: &ModelDescriptor) -> Result<(), EngineError> {
        self.manager.download(descriptor).await
    }

    pub fn cancel_download(&self, model_id: &str) {
        self.manager.cancel_download(model_id)
    }

    /// Delete a downloaded model, unloading it first when it is the
    /// active one.
    pub async fn delete_model(&self, model_id: &str) -> Result<(), EngineError> {
        if self
            .session
            .active_model()
            .await
            .is_some_and(|m| m.id == model_id)
        {
            self.session.unload().await;
        }
        self.manager.delete_model(model_id).await
    }

    pub async fn load_model(&self, descriptor: &ModelDescriptor) -> Result<(), EngineError> {
        self.session.load(descriptor).await
    }

    /// Send a user message and stream back cleaned response chunks.
    pub async fn send_message(
        &self,
        text: &str,
        history: &[Message],
    ) -> Result<ChunkStream, EngineError> {
        self.session.generate(text, history).await
    }

    /// Stop the in-flight generation, if any.
    pub async fn stop_generation(&self) {
        self.session.cancel().await
    }

    pub async fn unload_model(&self) {
        self.session.unload().await
    }

    pub async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    pub async fn active_model(&self) -> Option<ModelDescriptor> {
        self.session.active_model().await
    }
}
