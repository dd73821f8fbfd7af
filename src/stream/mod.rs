//! Streaming output
//!
//! `TokenFilter` cleans raw backend fragments; `ChunkStream` is the
//! ordered, cancellable sequence of cleaned chunks handed to the caller.

pub mod filter;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

pub use filter::{FilterConfig, FilterState, TokenFilter};

/// A cancellable stream of cleaned text chunks from one generation.
///
/// Chunks arrive strictly in generation order. The stream ends after the
/// final flushed chunk, or after a single terminal error. Dropping the
/// stream cancels the generation.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::Receiver<Result<String, EngineError>>,
    cancel: CancellationToken,
}

impl ChunkStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<Result<String, EngineError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { rx, cancel }
    }

    /// Receive the next chunk, or `None` once the generation is over.
    pub async fn next_chunk(&mut self) -> Option<Result<String, EngineError>> {
        self.rx.recv().await
    }

    /// Ask the generation to stop. The stream still yields whatever the
    /// filter flushes before ending.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ChunkStream {
    type Item = Result<String, EngineError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
