//! OpenAPI documentation.

use axum::Json;
use utoipa::OpenApi;

use crate::error;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage API",
        version = "0.1.0",
        description = "Serves resized variants of stored images. A variant is generated on first request and read from disk afterwards."
    ),
    paths(
        handlers::thumbnail::get_thumbnail,
        handlers::health::health_check,
    ),
    components(schemas(error::ErrorResponse, handlers::health::HealthResponse)),
    tags(
        (name = "thumbnails", description = "On-demand image thumbnails"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
