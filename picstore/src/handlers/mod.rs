//! HTTP surface
//!
//! | Method   | Path                   | Purpose                                  |
//! |----------|------------------------|------------------------------------------|
//! | `POST`   | `/upload`              | Ingest an image (JSON, multipart or URL) |
//! | `DELETE` | `/images/{name}`       | Remove an image and its thumbnail        |
//! | `GET`    | `/static/images/*`     | Canonical images                         |
//! | `GET`    | `/static/thumbnails/*` | Thumbnails                               |

mod images;
mod upload;

use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use upload::Uploaded;

/// Public URL prefix of canonical images
pub const IMAGES_ROUTE: &str = "/static/images";

/// Public URL prefix of thumbnails
pub const THUMBNAILS_ROUTE: &str = "/static/thumbnails";

/// Builds the application router
///
/// # Example
///
/// ```rust,no_run
/// use picstore::config::PicstoreConfig;
/// use picstore::handlers::router;
/// use picstore::state::AppState;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = PicstoreConfig::load(None)?;
/// let store = Arc::new(config.build_store()?);
/// let app = router(AppState::new(store, &config)?);
///
/// let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn router(state: AppState) -> Router {
    let images = ServeDir::new(&state.images_dir);
    let thumbnails = ServeDir::new(&state.thumbnails_dir);

    Router::new()
        .route("/upload", post(upload::upload))
        .route("/images/{name}", delete(images::remove))
        .nest_service(IMAGES_ROUTE, images)
        .nest_service(THUMBNAILS_ROUTE, thumbnails)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(state.body_limit)),
        )
        .with_state(state)
}
