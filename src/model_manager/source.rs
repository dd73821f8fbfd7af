//! Artifact byte sources
//!
//! Where download bytes come from. The HTTP source streams from the
//! descriptor's published URL; the static source serves bytes from
//! memory for tests and offline runs.

use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use super::types::ModelDescriptor;

/// Stream of artifact bytes.
pub type ByteStream = BoxStream<'static, anyhow::Result<Bytes>>;

/// Opens artifact byte streams for download attempts.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Open a stream for the descriptor's artifact, with the total byte
    /// count when known.
    async fn fetch(&self, descriptor: &ModelDescriptor)
        -> anyhow::Result<(ByteStream, Option<u64>)>;
}

/// Streams artifacts over HTTP from the descriptor's download URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpArtifactSource;

impl HttpArtifactSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(
        &self,
        descriptor: &ModelDescriptor,
    ) -> anyhow::Result<(ByteStream, Option<u64>)> {
        // Large artifacts; allow up to an hour per download.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3600))
            .build()
            .context("failed to create HTTP client")?;

        let url = descriptor.download_url();
        let response = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to start download from {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("download failed with status: {}", response.status()));
        }

        let total = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed();
        Ok((stream, total))
    }
}

/// Serves a fixed chunk sequence, optionally pausing between chunks and
/// optionally failing partway through.
#[derive(Debug, Clone, Default)]
pub struct StaticArtifactSource {
    chunks: Vec<Bytes>,
    chunk_delay: Duration,
    fail_after: Option<usize>,
}

impl StaticArtifactSource {
    pub fn new<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sleep between chunks so cancellation can land mid-attempt.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Fail the stream after yielding `count` chunks.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

#[async_trait]
impl ArtifactSource for StaticArtifactSource {
    async fn fetch(
        &self,
        _descriptor: &ModelDescriptor,
    ) -> anyhow::Result<(ByteStream, Option<u64>)> {
        let total: u64 = self.chunks.iter().map(|c| c.len() as u64).sum();
        let delay = self.chunk_delay;
        let fail_after = self.fail_after;
        let chunks = self.chunks.clone();

        let stream = futures_util::stream::iter(chunks.into_iter().enumerate())
            .then(move |(index, chunk)| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if fail_after.is_some_and(|limit| index >= limit) {
                    return Err(anyhow!("artifact source failure"));
                }
                Ok(chunk)
            })
            .boxed();
        Ok((stream, Some(total)))
    }
}
