use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use stowage_core::AppError;

#[utoipa::path(
    get,
    path = "/thumbnails/{width}/{height}/{link}",
    tag = "thumbnails",
    params(
        ("width" = u32, Path, description = "Thumbnail width, 0 to derive it from the height"),
        ("height" = u32, Path, description = "Thumbnail height, 0 to derive it from the width"),
        ("link" = String, Path, description = "Link of the original, relative to the original folder")
    ),
    responses(
        (status = 200, description = "Thumbnail image", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 403, description = "Size not allowed or original is not an image", body = ErrorResponse),
        (status = 404, description = "Original not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_thumbnail(
    State(state): State<Arc<AppState>>,
    Path((width, height, link)): Path<(u32, u32, String)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let thumbnail = state.thumbnails.derive(width, height, &link).await?;

    tracing::debug!(
        link = %link,
        width = width,
        height = height,
        generated = thumbnail.generated,
        path = %thumbnail.path.display(),
        "Serving thumbnail"
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, thumbnail.content_type)
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from(thumbnail.bytes))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}
