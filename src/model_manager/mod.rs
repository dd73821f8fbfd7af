//! Model acquisition lifecycle
//!
//! Catalog of selectable models plus the download manager that
//! materializes their artifacts on disk.
//!
//! Module structure:
//! - types.rs: ModelDescriptor, DownloadState
//! - catalog.rs: curated model registry
//! - source.rs: artifact byte sources (HTTP, in-memory)
//! - downloader.rs: single download attempt with staged publish
//! - manager.rs: ModelManager state tracking and operations

pub mod catalog;
pub mod downloader;
pub mod manager;
pub mod source;
pub mod types;

pub use catalog::{catalog, find};
pub use downloader::METADATA_FILE;
pub use manager::ModelManager;
pub use source::{ArtifactSource, ByteStream, HttpArtifactSource, StaticArtifactSource};
pub use types::{DownloadState, ModelDescriptor};
