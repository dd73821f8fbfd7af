//! Download attempt logic
//!
//! One attempt writes the artifact and its metadata sidecar into a
//! staging directory, then renames it into place. The model directory
//! therefore only ever exists fully written; a failed or cancelled
//! attempt removes the staging directory and leaves nothing behind.

use std::path::Path;

use chrono::Utc;
use futures_util::StreamExt;
use log::{debug, info};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

use super::source::ArtifactSource;
use super::types::ModelDescriptor;
use crate::error::EngineError;

/// Metadata sidecar written next to the artifact.
pub const METADATA_FILE: &str = "model_info.json";

/// Suffix of the staging directory used while an attempt is running.
pub(crate) const STAGING_SUFFIX: &str = ".partial";

/// Run one download attempt for `descriptor`.
///
/// `on_progress` is called with a fraction in [0.0, 1.0] as bytes land.
pub(crate) async fn run_download<F>(
    models_dir: &Path,
    descriptor: &ModelDescriptor,
    source: &dyn ArtifactSource,
    cancel: &CancellationToken,
    on_progress: F,
) -> Result<(), EngineError>
where
    F: Fn(f64),
{
    let staging_dir = models_dir.join(format!("{}{}", descriptor.id, STAGING_SUFFIX));
    let final_dir = models_dir.join(&descriptor.id);

    let result = download_into(
        &staging_dir,
        &final_dir,
        descriptor,
        source,
        cancel,
        &on_progress,
    )
    .await;

    if result.is_err() {
        // Leave no partial artifact behind.
        let _ = tokio::fs::remove_dir_all(&staging_dir).await;
    }
    result
}

async fn download_into<F>(
    staging_dir: &Path,
    final_dir: &Path,
    descriptor: &ModelDescriptor,
    source: &dyn ArtifactSource,
    cancel: &CancellationToken,
    on_progress: &F,
) -> Result<(), EngineError>
where
    F: Fn(f64),
{
    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(|e| EngineError::DownloadFailed(format!("failed to create model directory: {}", e)))?;

    let (mut stream, total) = source
        .fetch(descriptor)
        .await
        .map_err(|e| EngineError::DownloadFailed(e.to_string()))?;
    let total = total.unwrap_or(descriptor.size_bytes).max(1);

    let artifact_path = staging_dir.join(&descriptor.filename);
    let file = tokio::fs::File::create(&artifact_path)
        .await
        .map_err(|e| EngineError::DownloadFailed(format!("failed to create artifact file: {}", e)))?;
    let mut file = BufWriter::new(file);

    let mut downloaded: u64 = 0;
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(EngineError::DownloadFailed("download cancelled".to_string()));
            }
            chunk = stream.next() => chunk,
        };
        let chunk = match chunk {
            None => break,
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(EngineError::DownloadFailed(e.to_string())),
        };

        file.write_all(&chunk)
            .await
            .map_err(|e| EngineError::DownloadFailed(format!("failed to write chunk: {}", e)))?;
        downloaded += chunk.len() as u64;

        let fraction = (downloaded as f64 / total as f64).min(1.0);
        debug!(
            "download progress for '{}': {:.1}% ({}/{} bytes)",
            descriptor.id,
            fraction * 100.0,
            downloaded,
            total
        );
        on_progress(fraction);
    }

    file.flush()
        .await
        .map_err(|e| EngineError::DownloadFailed(format!("failed to flush artifact: {}", e)))?;
    drop(file);

    write_metadata(staging_dir, descriptor).await?;

    // Publish: the directory rename is the commit point.
    tokio::fs::rename(staging_dir, final_dir)
        .await
        .map_err(|e| EngineError::DownloadFailed(format!("failed to publish model directory: {}", e)))?;

    on_progress(1.0);
    info!(
        "downloaded model '{}' ({} bytes) to {:?}",
        descriptor.id, downloaded, final_dir
    );
    Ok(())
}

async fn write_metadata(dir: &Path, descriptor: &ModelDescriptor) -> Result<(), EngineError> {
    let metadata = serde_json::json!({
        "id": descriptor.id,
        "name": descriptor.name,
        "file": descriptor.filename,
        "downloaded_at": Utc::now().to_rfc3339(),
    });
    let body = serde_json::to_vec_pretty(&metadata)
        .map_err(|e| EngineError::DownloadFailed(format!("failed to serialize metadata: {}", e)))?;
    tokio::fs::write(dir.join(METADATA_FILE), body)
        .await
        .map_err(|e| EngineError::DownloadFailed(format!("failed to write metadata: {}", e)))
}
