//! Local filesystem image store
//!
//! Canonical images and thumbnails live in two sibling roots under identical
//! basenames:
//!
//! ```text
//! /srv/static/
//! ├── images/
//! │   └── dog.jpg          <- bytes exactly as uploaded
//! └── thumbnails/
//!     └── dog.jpg          <- square thumbnail derived from images/dog.jpg
//! ```
//!
//! Both artifacts are written to hidden temporary files next to their final
//! location and renamed into place only after the thumbnail has been derived,
//! so readers of the final paths never see a partially written file.
//! Operations on the same name are serialized.

use super::locks::KeyedLocks;
use super::traits::{ImageStore, ThumbnailGenerator, UploadStream};
use super::types::{
    Artifact, Cleanup, CleanupFailure, ReconcileReport, StorageError, StorageResult,
};
use crate::name::ImageName;
use async_trait::async_trait;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempPath};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default number of thumbnails derived concurrently
pub const DEFAULT_GENERATION_LIMIT: usize = 4;

const TEMP_SUFFIX: &str = ".tmp";

/// Image store backed by two local directories
///
/// # Examples
///
/// ```rust,no_run
/// use picstore::name::ImageName;
/// use picstore::storage::{ImageStore, LocalImageStore, RasterFormat, ThumbnailEngine};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let engine = Arc::new(ThumbnailEngine::new(100, RasterFormat::Jpeg));
/// let store = LocalImageStore::new("./static/images", "./static/thumbnails", engine)?
///     .with_generation_limit(2);
///
/// let name = ImageName::normalize("dog.jpg", RasterFormat::Jpeg)?;
/// store.append(&name, Box::pin(&b"..."[..])).await?;
///
/// // Files are now at ./static/images/dog.jpg and ./static/thumbnails/dog.jpg
/// assert!(store.contains(&name).await);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalImageStore {
    images: PathBuf,
    thumbnails: PathBuf,
    generator: Arc<dyn ThumbnailGenerator>,
    locks: KeyedLocks,
    /// Bounds concurrent thumbnail derivation
    permits: Arc<Semaphore>,
}

impl fmt::Debug for LocalImageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalImageStore")
            .field("images", &self.images)
            .field("thumbnails", &self.thumbnails)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl LocalImageStore {
    /// Creates a store over the given roots, creating them if needed
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A root exists but is not a directory (`StorageError::InvalidPath`)
    /// - Both roots are the same directory (`StorageError::InvalidPath`)
    /// - A root cannot be created (`StorageError::Io`)
    pub fn new(
        images: impl Into<PathBuf>,
        thumbnails: impl Into<PathBuf>,
        generator: Arc<dyn ThumbnailGenerator>,
    ) -> StorageResult<Self> {
        let images = images.into();
        let thumbnails = thumbnails.into();
        if images == thumbnails {
            return Err(StorageError::InvalidPath(format!(
                "images and thumbnails share the directory {}",
                images.display()
            )));
        }
        // Synchronous checks are fine during initialization
        for root in [&images, &thumbnails] {
            if root.exists() && !root.is_dir() {
                return Err(StorageError::InvalidPath(format!(
                    "{} is not a directory",
                    root.display()
                )));
            }
            std::fs::create_dir_all(root)?;
        }

        Ok(Self {
            images,
            thumbnails,
            generator,
            locks: KeyedLocks::new(),
            permits: Arc::new(Semaphore::new(DEFAULT_GENERATION_LIMIT)),
        })
    }

    /// Sets how many thumbnails may be derived at the same time (minimum 1)
    #[must_use]
    pub fn with_generation_limit(mut self, limit: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Root directory of canonical images
    #[must_use]
    pub fn images_dir(&self) -> &Path {
        &self.images
    }

    /// Root directory of thumbnails
    #[must_use]
    pub fn thumbnails_dir(&self) -> &Path {
        &self.thumbnails
    }

    /// Final path of the canonical image for `name`
    #[must_use]
    pub fn image_path(&self, name: &ImageName) -> PathBuf {
        self.images.join(name.as_str())
    }

    /// Final path of the thumbnail for `name`
    #[must_use]
    pub fn thumbnail_path(&self, name: &ImageName) -> PathBuf {
        self.thumbnails.join(name.as_str())
    }

    /// Whether both artifacts for `name` are present
    pub async fn contains(&self, name: &ImageName) -> bool {
        let image = fs::try_exists(self.image_path(name)).await.unwrap_or(false);
        let thumbnail = fs::try_exists(self.thumbnail_path(name)).await.unwrap_or(false);
        image && thumbnail
    }

    /// Streams the upload into a hidden temporary file in the images root
    async fn write_canonical(
        &self,
        name: &ImageName,
        mut stream: UploadStream<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<TempPath> {
        let (file, path) = temp_file(&self.images, name)?.into_parts();
        let mut file = fs::File::from_std(file);

        let copied = tokio::select! {
            result = tokio::io::copy(&mut stream, &mut file) => result?,
            () = cancel.cancelled() => return Err(StorageError::Cancelled),
        };
        file.flush().await?;
        file.sync_all().await?;

        debug!(bytes = copied, "Canonical image staged");
        Ok(path)
    }

    /// Runs the generator on the blocking pool into a hidden temporary file
    /// in the thumbnails root
    async fn derive_thumbnail(
        &self,
        name: &ImageName,
        source: &Path,
        cancel: &CancellationToken,
    ) -> StorageResult<TempPath> {
        let destination = temp_file(&self.thumbnails, name)?.into_temp_path();

        let permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|e| StorageError::Worker(e.to_string()))?
            }
            () = cancel.cancelled() => return Err(StorageError::Cancelled),
        };
        let generator = Arc::clone(&self.generator);
        let src = source.to_path_buf();
        let dst = destination.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            generator.execute(&src, &dst)
        })
        .await
        .map_err(|e| StorageError::Worker(e.to_string()))??;

        debug!("Thumbnail derived");
        Ok(destination)
    }

    async fn write_pair(
        &self,
        name: &ImageName,
        stream: UploadStream<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        let canonical = self.write_canonical(name, stream, cancel).await?;
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let thumbnail = self.derive_thumbnail(name, &canonical, cancel).await?;
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        // The previous thumbnail goes before the canonical file is replaced,
        // so no reader or crash ever pairs a new canonical with an old
        // thumbnail. A canonical without thumbnail is rebuilt by reconcile().
        match fs::remove_file(self.thumbnail_path(name)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        canonical.persist(self.image_path(name))?;
        thumbnail.persist(self.thumbnail_path(name))?;
        Ok(())
    }

    /// Removes both final artifacts, collecting failures other than not-found
    async fn remove_pair(&self, name: &ImageName) -> Cleanup {
        let mut cleanup = Cleanup::default();
        for (artifact, path) in [
            (Artifact::Canonical, self.image_path(name)),
            (Artifact::Thumbnail, self.thumbnail_path(name)),
        ] {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(%artifact, path = %path.display(), "Removed artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(error) => {
                    warn!(%artifact, path = %path.display(), %error, "Failed to remove artifact");
                    cleanup.failures.push(CleanupFailure {
                        artifact,
                        path,
                        error,
                    });
                }
            }
        }
        cleanup
    }

    /// Repairs state left behind by a crash
    ///
    /// - removes leftover temporary files in both roots
    /// - rebuilds missing thumbnails, discarding the canonical file when its
    ///   content cannot be decoded; host failures leave it in place and are
    ///   reported as `failed`
    /// - removes thumbnails whose canonical file is gone
    ///
    /// Files whose names are not valid basenames are left alone. Each name is
    /// locked while it is examined, so this is safe to run while serving.
    ///
    /// # Errors
    ///
    /// Returns an error if a root directory cannot be listed.
    #[instrument(skip(self), fields(images = %self.images.display()))]
    pub async fn reconcile(&self) -> StorageResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        report.temp_files_removed += self.sweep_temp_files(&self.images).await?;
        report.temp_files_removed += self.sweep_temp_files(&self.thumbnails).await?;

        for name in list_names(&self.images).await? {
            let _guard = self.locks.lock(name.as_str()).await;
            let canonical = self.image_path(&name);
            if fs::try_exists(self.thumbnail_path(&name)).await? {
                continue;
            }
            match self.rebuild_thumbnail(&name, &canonical).await {
                Ok(()) => {
                    info!(name = %name, "Rebuilt missing thumbnail");
                    report.regenerated.push(name.to_string());
                }
                Err(error) if error.is_content_error() => {
                    warn!(name = %name, %error, "Image can't be decoded, discarding it");
                    if self.remove_pair(&name).await.is_clean() {
                        report.discarded.push(name.to_string());
                    } else {
                        report.failed.push(name.to_string());
                    }
                }
                Err(error) => {
                    warn!(name = %name, %error, "Thumbnail rebuild failed, keeping image");
                    report.failed.push(name.to_string());
                }
            }
        }

        for name in list_names(&self.thumbnails).await? {
            let _guard = self.locks.lock(name.as_str()).await;
            if fs::try_exists(self.image_path(&name)).await? {
                continue;
            }
            match fs::remove_file(self.thumbnail_path(&name)).await {
                Ok(()) => {
                    info!(name = %name, "Removed orphaned thumbnail");
                    report.orphaned_thumbnails.push(name.to_string());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(error) => warn!(name = %name, %error, "Failed to remove orphaned thumbnail"),
            }
        }

        if !report.is_noop() {
            info!(?report, "Reconcile repaired storage");
        }
        Ok(report)
    }

    async fn rebuild_thumbnail(&self, name: &ImageName, canonical: &Path) -> StorageResult<()> {
        let thumbnail = self
            .derive_thumbnail(name, canonical, &CancellationToken::new())
            .await?;
        thumbnail.persist(self.thumbnail_path(name))?;
        Ok(())
    }

    /// Removes hidden temporary files, waiting for the owning name's lock so
    /// that in-flight appends keep their files
    async fn sweep_temp_files(&self, dir: &Path) -> StorageResult<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(owner) = file_name.to_str().and_then(temp_owner) else {
                continue;
            };
            let _guard = self.locks.lock(owner).await;
            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(path = %entry.path().display(), "Removed leftover temporary file");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(error) => warn!(path = %entry.path().display(), %error, "Failed to remove temporary file"),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    #[instrument(skip_all, fields(name = %name))]
    async fn append_cancellable(
        &self,
        name: &ImageName,
        stream: UploadStream<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        let _guard = self.locks.lock(name.as_str()).await;

        match self.write_pair(name, stream, cancel).await {
            Ok(()) => {
                info!("Stored image and thumbnail");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Append failed, rolling back");
                // Temporary files are already gone; clear any previous pair
                let cleanup = self.remove_pair(name).await;
                if !cleanup.is_clean() {
                    warn!(failures = cleanup.failures.len(), "Rollback left artifacts behind");
                }
                Err(err)
            }
        }
    }

    #[instrument(skip_all, fields(name = %name))]
    async fn delete(&self, name: &ImageName) -> Cleanup {
        let _guard = self.locks.lock(name.as_str()).await;
        let cleanup = self.remove_pair(name).await;
        if cleanup.is_clean() {
            info!("Deleted image");
        }
        cleanup
    }
}

/// Creates `.<name>.<random>.tmp` in `dir`
fn temp_file(dir: &Path, name: &ImageName) -> std::io::Result<NamedTempFile> {
    let prefix = format!(".{name}.");
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(TEMP_SUFFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    builder.tempfile_in(dir)
}

/// Name whose append created the temporary file `file_name`, if it is one
fn temp_owner(file_name: &str) -> Option<&str> {
    let inner = file_name.strip_prefix('.')?.strip_suffix(TEMP_SUFFIX)?;
    let (owner, _random) = inner.rsplit_once('.')?;
    (!owner.is_empty()).then_some(owner)
}

/// Valid, visible basenames of regular files in `dir`
async fn list_names(dir: &Path) -> StorageResult<Vec<ImageName>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str().and_then(ImageName::from_stored) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
