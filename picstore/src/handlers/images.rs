//! `DELETE /images/{name}`

use crate::error::ApiError;
use crate::name::ImageName;
use crate::state::AppState;
use axum::extract::{Path, State};
use http::StatusCode;
use tracing::warn;

/// Removes an image and its thumbnail
///
/// Best effort: responds 204 even when some artifact could not be removed.
pub(super) async fn remove(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let name = ImageName::normalize(&raw, state.format)?;
    let cleanup = state.store.delete(&name).await;
    for failure in &cleanup.failures {
        warn!(
            %name,
            artifact = %failure.artifact,
            path = %failure.path.display(),
            error = %failure.error,
            "Artifact left behind after delete"
        );
    }
    Ok(StatusCode::NO_CONTENT)
}
