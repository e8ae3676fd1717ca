//! Image storage and thumbnail derivation
//!
//! This module keeps two filesystem artifacts consistent with each other:
//! the canonical image exactly as uploaded, and a fixed-size square thumbnail
//! derived from it.
//!
//! # Architecture
//!
//! - [`ImageStore`] is the name-addressed store handlers talk to;
//!   [`LocalImageStore`] implements it over two local directories.
//! - [`ThumbnailGenerator`] is the pure file-to-file transform;
//!   [`ThumbnailEngine`] implements it with the `image` crate.
//! - [`KeyedLocks`] serializes operations on one name.
//!
//! # Examples
//!
//! ```rust,no_run
//! use picstore::name::ImageName;
//! use picstore::storage::{ImageStore, LocalImageStore, RasterFormat, ThumbnailEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = Arc::new(ThumbnailEngine::new(100, RasterFormat::Jpeg));
//! let store = LocalImageStore::new("/srv/static/images", "/srv/static/thumbnails", engine)?;
//!
//! // Repair anything a crash left behind
//! store.reconcile().await?;
//!
//! let name = ImageName::normalize("dog", RasterFormat::Jpeg)?;
//! let upload = tokio::fs::File::open("/tmp/upload.jpg").await?;
//! store.append(&name, Box::pin(upload)).await?;
//!
//! store.delete(&name).await;
//! # Ok(())
//! # }
//! ```

mod format;
mod locks;
mod manager;
pub mod thumbnail;
mod traits;
mod types;

pub use format::RasterFormat;
pub use locks::{KeyGuard, KeyedLocks};
pub use manager::{LocalImageStore, DEFAULT_GENERATION_LIMIT};
pub use thumbnail::{center_crop, ThumbnailEngine};
pub use traits::{ImageStore, ThumbnailGenerator, UploadStream};
pub use types::{
    Artifact, Cleanup, CleanupFailure, ReconcileReport, StorageError, StorageResult,
};
