//! Storage trait definitions

use super::types::{Cleanup, StorageResult};
use crate::name::ImageName;
use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Byte source of unknown length consumed by [`ImageStore::append`]
pub type UploadStream<'a> = Pin<Box<dyn AsyncRead + Send + 'a>>;

/// Derives a thumbnail file from a canonical image file
///
/// Implementations are synchronous and CPU-bound; the storage manager runs
/// them on the blocking thread pool. Every failure must come back as an
/// error value, never as a panic or process exit.
#[cfg_attr(test, mockall::automock)]
pub trait ThumbnailGenerator: Send + Sync {
    /// Reads `source` and writes the derived image to `destination`,
    /// creating or truncating it
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `source` cannot be opened or `destination` cannot be written (`StorageError::Io`)
    /// - `source` is not a valid image (`StorageError::Decode`)
    /// - the derived image cannot be encoded (`StorageError::Encode`)
    fn execute(&self, source: &Path, destination: &Path) -> StorageResult<()>;
}

/// Name-addressed store of canonical images and their thumbnails
///
/// # Implementation Requirements
///
/// Implementations must:
/// - Serialize all operations on the same name
/// - Never expose a thumbnail that was not derived from the canonical file
///   currently stored under the same name
/// - Leave no artifact for a name whose append failed
///
/// # Examples
///
/// ```rust,no_run
/// use picstore::name::ImageName;
/// use picstore::storage::{ImageStore, LocalImageStore, RasterFormat, ThumbnailEngine};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let engine = ThumbnailEngine::new(100, RasterFormat::Jpeg);
/// let store = LocalImageStore::new("/srv/images", "/srv/thumbnails", Arc::new(engine))?;
///
/// let name = ImageName::normalize("dog", RasterFormat::Jpeg)?;
/// let file = tokio::fs::File::open("dog.jpg").await?;
/// store.append(&name, Box::pin(file)).await?;
///
/// let cleanup = store.delete(&name).await;
/// assert!(cleanup.is_clean());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `stream` as the canonical image for `name` and derives its thumbnail
    ///
    /// # Errors
    ///
    /// Returns an error if the upload cannot be written, decoded or derived,
    /// or if it was cancelled. No artifact remains for `name` afterwards.
    async fn append_cancellable(
        &self,
        name: &ImageName,
        stream: UploadStream<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// [`ImageStore::append_cancellable`] without a cancellation signal
    ///
    /// # Errors
    ///
    /// See [`ImageStore::append_cancellable`].
    async fn append(&self, name: &ImageName, stream: UploadStream<'_>) -> StorageResult<()> {
        self.append_cancellable(name, stream, &CancellationToken::new())
            .await
    }

    /// Removes both artifacts for `name`
    ///
    /// Missing files are not failures. Other removal failures are reported in
    /// the returned [`Cleanup`] but never fail the call.
    async fn delete(&self, name: &ImageName) -> Cleanup;
}
