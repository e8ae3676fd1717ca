//! Shared application state

use crate::config::PicstoreConfig;
use crate::storage::{ImageStore, RasterFormat};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    /// Store uploads are written to
    pub store: Arc<dyn ImageStore>,

    /// Raster format uploads must be in
    pub format: RasterFormat,

    /// Client used to fetch remote images
    pub http: reqwest::Client,

    /// Directory served under `/static/images`
    pub images_dir: PathBuf,

    /// Directory served under `/static/thumbnails`
    pub thumbnails_dir: PathBuf,

    /// Largest accepted request body (and remote download)
    pub body_limit: usize,

    /// Cancelled when the server shuts down; in-flight appends observe it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Builds state for `store` using the HTTP and format settings in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(store: Arc<dyn ImageStore>, config: &PicstoreConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch.timeout())
            .user_agent(concat!("picstore/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            store,
            format: config.thumbnails.format,
            http,
            images_dir: config.storage.images_dir.clone(),
            thumbnails_dir: config.storage.thumbnails_dir.clone(),
            body_limit: config.server.body_limit_bytes,
            shutdown: CancellationToken::new(),
        })
    }

    /// Replaces the shutdown token
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("format", &self.format)
            .field("images_dir", &self.images_dir)
            .field("thumbnails_dir", &self.thumbnails_dir)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}
