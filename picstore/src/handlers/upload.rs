//! `POST /upload`

use super::{IMAGES_ROUTE, THUMBNAILS_ROUTE};
use crate::error::{ApiError, BodyLimitExceeded};
use crate::name::ImageName;
use crate::state::AppState;
use crate::storage::UploadStream;
use axum::body::HttpBody;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::{Form, Json};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use futures_util::{future, stream, Stream, StreamExt, TryStreamExt};
use http::{header, StatusCode};
use mime::Mime;
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

/// Response body of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uploaded {
    /// Normalized basename the image is stored under
    pub name: String,
    /// Public URL of the canonical image
    pub image: String,
    /// Public URL of the thumbnail
    pub thumbnail: String,
}

impl Uploaded {
    fn new(name: &ImageName) -> Self {
        Self {
            name: name.to_string(),
            image: format!("{IMAGES_ROUTE}/{name}"),
            thumbnail: format!("{THUMBNAILS_ROUTE}/{name}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonUpload {
    name: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct FormUpload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

/// Dispatches on the request content type
#[instrument(skip_all)]
pub(super) async fn upload(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<Uploaded>), ApiError> {
    if is_empty(&request) {
        return Err(ApiError::EmptyBody);
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mime: Mime = content_type
        .parse()
        .map_err(|_| ApiError::UnsupportedMediaType(content_type.clone()))?;

    let essence = mime.essence_str();
    let name = if essence == mime::APPLICATION_JSON.essence_str() {
        from_json(&state, request).await?
    } else if essence == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
        from_url(&state, request).await?
    } else if essence == mime::MULTIPART_FORM_DATA.essence_str() {
        from_multipart(&state, request).await?
    } else {
        return Err(ApiError::UnsupportedMediaType(content_type));
    };

    Ok((StatusCode::CREATED, Json(Uploaded::new(&name))))
}

fn is_empty(request: &Request) -> bool {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    declared == Some(0) || request.body().size_hint().exact() == Some(0)
}

/// Extractor rejections become 413 when the body limit tripped, 400 otherwise
fn rejected(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(message)
    }
}

async fn store(state: &AppState, name: &ImageName, stream: UploadStream<'_>) -> Result<(), ApiError> {
    let cancel = state.shutdown.child_token();
    state
        .store
        .append_cancellable(name, stream, &cancel)
        .await
        .map_err(ApiError::from_upload)
}

/// `{ "name": "...", "data": "<base64>" }`
async fn from_json(state: &AppState, request: Request) -> Result<ImageName, ApiError> {
    let Json(payload) = Json::<JsonUpload>::from_request(request, &())
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?;

    let name = ImageName::normalize(&payload.name, state.format)?;
    let data = BASE64_STANDARD
        .decode(payload.data.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 in 'data': {e}")))?;
    if data.is_empty() {
        return Err(ApiError::EmptyBody);
    }

    debug!(%name, bytes = data.len(), "Embedded upload");
    store(state, &name, Box::pin(io::Cursor::new(data))).await?;
    Ok(name)
}

/// `name=...&url=...`, the image is downloaded from `url`
async fn from_url(state: &AppState, request: Request) -> Result<ImageName, ApiError> {
    let Form(form) = Form::<FormUpload>::from_request(request, &())
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?;

    let name = ImageName::normalize(&form.name, state.format)?;
    let raw_url = form.url.trim();
    if raw_url.is_empty() {
        return Err(ApiError::BadRequest("Missing field 'url'".to_string()));
    }
    let url = reqwest::Url::parse(raw_url)
        .map_err(|e| ApiError::BadRequest(format!("Invalid url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!(
            "Unsupported url scheme '{}'",
            url.scheme()
        )));
    }

    debug!(%name, %url, "Fetching remote image");
    let response = state.http.get(url).send().await?.error_for_status()?;
    if let Some(length) = response.content_length() {
        if length == 0 {
            return Err(ApiError::EmptyBody);
        }
        if length > u64::try_from(state.body_limit).unwrap_or(u64::MAX) {
            return Err(ApiError::PayloadTooLarge);
        }
    }

    let body = limited(response.bytes_stream().map_err(io::Error::other), state.body_limit);
    store(state, &name, Box::pin(StreamReader::new(body))).await?;
    Ok(name)
}

/// Fails the stream with [`BodyLimitExceeded`] once more than `limit` bytes
/// have passed through, whatever the upstream declared
fn limited<S>(body: S, limit: usize) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    let mut received = 0usize;
    body.map(move |chunk| {
        let chunk = chunk?;
        received = received.saturating_add(chunk.len());
        if received > limit {
            return Err(io::Error::other(BodyLimitExceeded { limit }));
        }
        Ok(chunk)
    })
}

/// Multipart form with a `data` file part and an optional `name` field
///
/// The file part is streamed straight into storage, so a `name` field must
/// precede `data`. A `name` (or second `data`) arriving later is rejected and
/// the just-stored image removed again.
async fn from_multipart(state: &AppState, request: Request) -> Result<ImageName, ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?;
    let mut requested: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?
    {
        match field.name() {
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| rejected(e.status(), e.body_text()))?;
                requested = Some(text).filter(|text| !text.trim().is_empty());
            }
            Some("data") => {
                let name = match requested.as_deref() {
                    Some(raw) => ImageName::normalize(raw, state.format)?,
                    None => ImageName::from_upload_filename(
                        field.file_name().unwrap_or_default(),
                        state.format,
                    )?,
                };

                let first = loop {
                    match field
                        .chunk()
                        .await
                        .map_err(|e| rejected(e.status(), e.body_text()))?
                    {
                        None => return Err(ApiError::EmptyBody),
                        Some(chunk) if chunk.is_empty() => {}
                        Some(chunk) => break chunk,
                    }
                };

                debug!(%name, "Multipart upload");
                let body = stream::once(future::ready(Ok::<Bytes, io::Error>(first)))
                    .chain(field.map_err(io::Error::other));
                store(state, &name, Box::pin(StreamReader::new(body))).await?;
                return reject_late_fields(state, &mut multipart, name).await;
            }
            _ => {}
        }
    }

    Err(ApiError::BadRequest("Missing multipart field 'data'".to_string()))
}

/// Checks the fields after the stored `data` part
async fn reject_late_fields(
    state: &AppState,
    multipart: &mut Multipart,
    name: ImageName,
) -> Result<ImageName, ApiError> {
    let late = loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some(field_name @ ("name" | "data")) => break Some(field_name.to_string()),
                _ => {}
            },
            Ok(None) => break None,
            Err(e) => break Some(e.body_text()),
        }
    };

    let Some(reason) = late else {
        return Ok(name);
    };
    state.store.delete(&name).await;
    Err(ApiError::BadRequest(match reason.as_str() {
        "name" => "Multipart field 'name' must precede 'data'".to_string(),
        "data" => "Multipart upload must carry a single 'data' part".to_string(),
        _ => reason,
    }))
}
