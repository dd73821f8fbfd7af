//! Inference session
//!
//! Owns the loaded backend handle and at most one in-flight generation.
//! State moves Unloaded -> Loading -> Ready -> Generating -> Ready, with
//! Unloaded reachable again from Ready or Generating. The session, not
//! the caller, enforces the single-generation invariant.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::backend::{CompletionHandle, GenerationOptions, InferenceBackend};
use crate::chat::Message;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model_manager::{ModelDescriptor, ModelManager};
use crate::stream::{ChunkStream, TokenFilter};

/// Buffered chunks between the generation task and the consumer.
const CHUNK_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Generating,
}

/// One loaded model and its generation loop.
pub struct InferenceSession {
    backend: Arc<dyn InferenceBackend>,
    manager: Arc<ModelManager>,
    config: EngineConfig,
    inner: Arc<RwLock<SessionInner>>,
}

struct SessionInner {
    state: SessionState,
    active: Option<ModelDescriptor>,
    /// Present in Ready; moved into the generation task while Generating.
    handle: Option<Box<dyn CompletionHandle>>,
    cancel: Option<CancellationToken>,
}

impl InferenceSession {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        manager: Arc<ModelManager>,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            manager,
            config,
            inner: Arc::new(RwLock::new(SessionInner {
                state: SessionState::Unloaded,
                active: None,
                handle: None,
                cancel: None,
            })),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn active_model(&self) -> Option<ModelDescriptor> {
        self.inner.read().await.active.clone()
    }

    /// Load a downloaded model. Valid only from Unloaded.
    pub async fn load(&self, descriptor: &ModelDescriptor) -> Result<(), EngineError> {
        let path = {
            let mut inner = self.inner.write().await;
            if inner.state != SessionState::Unloaded {
                return Err(EngineError::LoadFailed(
                    "a model is already loaded".to_string(),
                ));
            }
            if !self.manager.is_downloaded(&descriptor.id) {
                return Err(EngineError::ModelNotDownloaded(descriptor.id.clone()));
            }
            let path = self.manager.model_path(descriptor);
            if !path.exists() {
                return Err(EngineError::ArtifactMissing(path.display().to_string()));
            }
            inner.state = SessionState::Loading;
            path
        };

        info!(
            "loading model '{}' from {:?} via {} backend",
            descriptor.id,
            path,
            self.backend.name()
        );
        match self.backend.load_model(&path).await {
            Ok(handle) => {
                let mut inner = self.inner.write().await;
                if inner.state != SessionState::Loading {
                    return Err(EngineError::LoadFailed("load was interrupted".to_string()));
                }
                inner.handle = Some(handle);
                inner.active = Some(descriptor.clone());
                inner.state = SessionState::Ready;
                info!("model '{}' loaded", descriptor.id);
                Ok(())
            }
            Err(e) => {
                let mut inner = self.inner.write().await;
                inner.state = SessionState::Unloaded;
                error!("failed to load model '{}': {}", descriptor.id, e);
                Err(EngineError::LoadFailed(e.to_string()))
            }
        }
    }

    /// Start a generation for `user_text` against `history`. Valid only
    /// from Ready; at most one generation runs per session.
    pub async fn generate(
        &self,
        user_text: &str,
        history: &[Message],
    ) -> Result<ChunkStream, EngineError> {
        let (handle, descriptor, cancel) = {
            let mut inner = self.inner.write().await;
            if inner.state != SessionState::Ready {
                return Err(EngineError::ModelNotLoaded);
            }
            let handle = inner.handle.take().ok_or(EngineError::ModelNotLoaded)?;
            let descriptor = inner.active.clone().ok_or(EngineError::ModelNotLoaded)?;
            let cancel = CancellationToken::new();
            inner.cancel = Some(cancel.clone());
            inner.state = SessionState::Generating;
            (handle, descriptor, cancel)
        };

        let prompt = descriptor.template_family.render(
            &self.config.system_prompt,
            history,
            user_text,
            self.config.history_window,
        );
        debug!(
            "rendered {:?} prompt for '{}' ({} chars)",
            descriptor.template_family,
            descriptor.id,
            prompt.chars().count()
        );

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let options = self.config.generation.clone();
        let inner = self.inner.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut handle = handle;
            if let Err(e) =
                drive_generation(handle.as_mut(), &prompt, &options, &task_cancel, &tx).await
            {
                error!("generation failed: {}", e);
                let _ = tx.send(Err(e)).await;
            }

            let mut inner = inner.write().await;
            inner.cancel = None;
            if inner.state == SessionState::Generating {
                // Normal wind-down: hand the model back for the next turn.
                inner.handle = Some(handle);
                inner.state = SessionState::Ready;
            }
            // Otherwise the session was unloaded mid-generation and the
            // handle is released here.
        });

        Ok(ChunkStream::new(rx, cancel))
    }

    /// Signal the in-flight generation to stop. No-op outside Generating.
    pub async fn cancel(&self) {
        let inner = self.inner.read().await;
        if inner.state == SessionState::Generating {
            if let Some(cancel) = &inner.cancel {
                cancel.cancel();
                info!("generation cancel requested");
            }
        } else {
            debug!("cancel with no generation in flight");
        }
    }

    /// Release the backend handle and return to Unloaded. Cancels any
    /// in-flight generation first. Idempotent.
    pub async fn unload(&self) {
        let mut inner = self.inner.write().await;
        if inner.state == SessionState::Unloaded {
            return;
        }
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        inner.handle = None;
        inner.active = None;
        inner.state = SessionState::Unloaded;
        info!("model unloaded");
    }
}

/// Pump backend fragments through the filter into the chunk channel.
async fn drive_generation(
    handle: &mut dyn CompletionHandle,
    prompt: &str,
    options: &GenerationOptions,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<Result<String, EngineError>>,
) -> Result<(), EngineError> {
    let mut filter = TokenFilter::default();

    handle
        .start_completion(prompt, options)
        .await
        .map_err(|e| EngineError::GenerationFailed(e.to_string()))?;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => None,
            fragment = handle.next_fragment() => Some(fragment),
        };
        let Some(fragment) = next else {
            // Cancelled: tell the backend to stop, then wind down.
            handle.stop().await;
            break;
        };
        match fragment {
            Ok(None) => break,
            Ok(Some(text)) => {
                if let Some(chunk) = filter.push(&text) {
                    if tx.send(Ok(chunk)).await.is_err() {
                        // Consumer dropped the stream; stop the backend
                        // rather than generating into the void.
                        handle.stop().await;
                        break;
                    }
                }
            }
            Err(e) => {
                handle.stop().await;
                return Err(EngineError::GenerationFailed(e.to_string()));
            }
        }
    }

    if let Some(rest) = filter.finish() {
        let _ = tx.send(Ok(rest)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::backend::MockBackend;
    use crate::model_manager::{catalog, StaticArtifactSource};

    fn write_artifact(models_dir: &Path, descriptor: &ModelDescriptor) {
        let dir = models_dir.join(&descriptor.id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(&descriptor.filename), b"gguf").unwrap();
    }

    fn session_with(backend: MockBackend, dir: &TempDir) -> (InferenceSession, ModelDescriptor) {
        let _ = env_logger::builder().is_test(true).try_init();
        let descriptor = catalog::catalog()[0].clone();
        let manager = Arc::new(ModelManager::with_source(
            dir.path(),
            Arc::new(StaticArtifactSource::default()),
        ));
        let config = EngineConfig::with_models_dir(dir.path());
        let session = InferenceSession::new(Arc::new(backend), manager, config);
        (session, descriptor)
    }

    async fn ready_session(
        backend: MockBackend,
        dir: &TempDir,
    ) -> (InferenceSession, ModelDescriptor) {
        let (session, descriptor) = session_with(backend, dir);
        write_artifact(dir.path(), &descriptor);
        session.load(&descriptor).await.unwrap();
        (session, descriptor)
    }

    async fn drain(stream: &mut ChunkStream) -> (String, Option<EngineError>) {
        let mut text = String::new();
        let mut error = None;
        while let Some(item) = stream.next_chunk().await {
            match item {
                Ok(chunk) => text.push_str(&chunk),
                Err(e) => error = Some(e),
            }
        }
        (text, error)
    }

    #[tokio::test]
    async fn load_requires_downloaded_model() {
        let dir = tempdir().unwrap();
        let (session, descriptor) = session_with(MockBackend::new(), &dir);

        let err = session.load(&descriptor).await.unwrap_err();
        assert!(matches!(err, EngineError::ModelNotDownloaded(_)));
        assert_eq!(session.state().await, SessionState::Unloaded);
    }

    #[tokio::test]
    async fn load_requires_artifact_file() {
        let dir = tempdir().unwrap();
        let (session, descriptor) = session_with(MockBackend::new(), &dir);
        // Directory without the artifact file inside.
        std::fs::create_dir_all(dir.path().join(&descriptor.id)).unwrap();

        let err = session.load(&descriptor).await.unwrap_err();
        assert!(matches!(err, EngineError::ArtifactMissing(_)));
    }

    #[tokio::test]
    async fn rejected_load_returns_to_unloaded() {
        let dir = tempdir().unwrap();
        let (session, descriptor) = session_with(MockBackend::rejecting_loads(), &dir);
        write_artifact(dir.path(), &descriptor);

        let err = session.load(&descriptor).await.unwrap_err();
        assert!(matches!(err, EngineError::LoadFailed(_)));
        assert_eq!(session.state().await, SessionState::Unloaded);
    }

    #[tokio::test]
    async fn second_load_is_rejected() {
        let dir = tempdir().unwrap();
        let (session, descriptor) = ready_session(MockBackend::new(), &dir).await;

        let err = session.load(&descriptor).await.unwrap_err();
        assert!(matches!(err, EngineError::LoadFailed(_)));
        assert_eq!(session.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn generate_streams_cleaned_chunks_in_order() {
        let dir = tempdir().unwrap();
        let backend = MockBackend::with_fragments([
            "<|assistant|>",
            "The answer is ",
            "forty-two, naturally ",
            "and without doubt.",
            "<|end|>",
        ]);
        let (session, _descriptor) = ready_session(backend, &dir).await;

        let mut stream = session.generate("question", &[]).await.unwrap();
        let (text, error) = drain(&mut stream).await;
        assert!(error.is_none());
        assert_eq!(text, "The answer is forty-two, naturally and without doubt.");
        assert_eq!(session.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn generate_requires_ready_session() {
        let dir = tempdir().unwrap();
        let (session, _descriptor) = session_with(MockBackend::new(), &dir);

        let err = session.generate("hello", &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::ModelNotLoaded));
    }

    #[tokio::test]
    async fn only_one_generation_at_a_time() {
        let dir = tempdir().unwrap();
        let fragments: Vec<String> = (0..300).map(|i| format!("word{} ", i)).collect();
        let (session, _descriptor) =
            ready_session(MockBackend::with_fragments(fragments), &dir).await;

        // Leave the stream unconsumed so the generation stays in flight.
        let mut stream = session.generate("go", &[]).await.unwrap();
        assert_eq!(session.state().await, SessionState::Generating);

        let second = session.generate("again", &[]).await;
        assert!(matches!(second, Err(EngineError::ModelNotLoaded)));

        session.cancel().await;
        drain(&mut stream).await;
        assert_eq!(session.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn cancel_returns_session_to_ready() {
        let dir = tempdir().unwrap();
        let fragments: Vec<String> = (0..300).map(|i| format!("word{} ", i)).collect();
        let (session, _descriptor) =
            ready_session(MockBackend::with_fragments(fragments), &dir).await;

        let mut stream = session.generate("go", &[]).await.unwrap();
        // Let the generation produce something before cancelling.
        let first = stream.next_chunk().await.unwrap().unwrap();
        assert!(!first.is_empty());

        session.cancel().await;
        let (_rest, error) = drain(&mut stream).await;
        assert!(error.is_none());
        assert_eq!(session.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn cancel_without_generation_is_noop() {
        let dir = tempdir().unwrap();
        let (session, _descriptor) = ready_session(MockBackend::new(), &dir).await;
        session.cancel().await;
        assert_eq!(session.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn generation_error_surfaces_once_and_leaves_ready() {
        let dir = tempdir().unwrap();
        let backend =
            MockBackend::with_fragments(["one ", "two ", "three "]).failing_after(2);
        let (session, _descriptor) = ready_session(backend, &dir).await;

        let mut stream = session.generate("go", &[]).await.unwrap();
        let mut errors = 0;
        while let Some(item) = stream.next_chunk().await {
            if item.is_err() {
                errors += 1;
            }
        }
        assert_eq!(errors, 1);
        assert_eq!(session.state().await, SessionState::Ready);

        // The session is usable again without reloading.
        let mut retry = session.generate("go", &[]).await.unwrap();
        drain(&mut retry).await;
    }

    #[tokio::test]
    async fn unload_is_idempotent_and_reachable_from_generating() {
        let dir = tempdir().unwrap();
        let fragments: Vec<String> = (0..300).map(|i| format!("word{} ", i)).collect();
        let (session, _descriptor) =
            ready_session(MockBackend::with_fragments(fragments), &dir).await;

        let mut stream = session.generate("go", &[]).await.unwrap();
        session.unload().await;
        assert_eq!(session.state().await, SessionState::Unloaded);
        drain(&mut stream).await;

        session.unload().await;
        assert_eq!(session.state().await, SessionState::Unloaded);
        assert!(session.active_model().await.is_none());

        let err = session.generate("go", &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::ModelNotLoaded));
    }

    #[tokio::test]
    async fn echoed_prompt_is_filtered_clean() {
        let dir = tempdir().unwrap();
        // Echo mode replays the rendered prompt, so the visible output
        // must come back with every template control token stripped.
        let (session, _descriptor) = ready_session(MockBackend::new(), &dir).await;

        let history = vec![Message::user("earlier question")];
        let mut stream = session.generate("current question", &history).await.unwrap();
        let (text, error) = drain(&mut stream).await;

        assert!(error.is_none());
        assert!(text.contains("current question"));
        assert!(!text.contains("<|"), "control tokens leaked: {:?}", text);
        assert_eq!(session.state().await, SessionState::Ready);
    }
}
