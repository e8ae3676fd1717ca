//! picstore: image ingestion with consistent canonical and thumbnail artifacts
//!
//! Every stored image is a pair of files sharing one basename: the canonical
//! image exactly as uploaded, and a square thumbnail derived from it. The pair
//! is either fully present or fully absent, and the thumbnail always matches
//! the canonical file it sits next to.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use picstore::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     picstore::observability::init("info")?;
//!
//!     let config = PicstoreConfig::load(None)?;
//!     let store = config.build_store()?;
//!     store.reconcile().await?;
//!
//!     let app = router(AppState::new(Arc::new(store), &config)?);
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod name;
pub mod observability;
pub mod state;
pub mod storage;

/// Commonly used types
pub mod prelude {
    //! ```rust
    //! use picstore::prelude::*;
    //! ```

    pub use crate::config::PicstoreConfig;
    pub use crate::error::ApiError;
    pub use crate::handlers::{router, Uploaded};
    pub use crate::name::{ImageName, NameError};
    pub use crate::state::AppState;
    pub use crate::storage::{
        Cleanup, ImageStore, LocalImageStore, RasterFormat, ReconcileReport, StorageError,
        ThumbnailEngine, ThumbnailGenerator,
    };
}
