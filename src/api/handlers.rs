use axum::{body::Bytes, extract::State, Json};
use tracing::info;
use utoipa::OpenApi;

use super::{
    dto::{ErrorResponse, LastUpdateResponse, ReadingDto, StatusResponse, SubmitReadingRequest},
    errors::AppError,
};
use crate::{readings::parse_fields, store::ReadingStore};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Submit the latest sensor reading.
///
/// The body is parsed here rather than through the `Json` extractor so every
/// malformed body gets the same `400 {"error": ...}` response.
#[utoipa::path(
    post,
    path = "/readings",
    request_body(content = SubmitReadingRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Reading accepted", body = StatusResponse),
        (status = 400, description = "Body is not a JSON object of scalar fields", body = ErrorResponse),
        (status = 500, description = "Storage fault", body = ErrorResponse),
    ),
    tag = "readings"
)]
pub async fn submit_reading(
    State(store): State<ReadingStore>,
    body: Bytes,
) -> Result<Json<StatusResponse>, AppError> {
    let fields = parse_fields(&body)?;
    let reading = store.put(fields).await?;

    info!(
        timestamp = %reading.timestamp(),
        fields = reading.fields().len(),
        "Reading received"
    );
    Ok(Json(StatusResponse::ok()))
}

/// Fetch the most recently accepted reading.
#[utoipa::path(
    get,
    path = "/readings",
    responses(
        (status = 200, description = "Current reading", body = ReadingDto),
        (status = 404, description = "No reading received yet", body = ErrorResponse),
    ),
    tag = "readings"
)]
pub async fn get_current_reading(
    State(store): State<ReadingStore>,
) -> Result<Json<ReadingDto>, AppError> {
    let reading = store.current().await?;
    Ok(Json(reading.into()))
}

/// Fetch the retained history, oldest first. Empty before the first reading.
#[utoipa::path(
    get,
    path = "/readings/history",
    responses(
        (status = 200, description = "Reading history, oldest first", body = Vec<ReadingDto>),
    ),
    tag = "readings"
)]
pub async fn get_history(State(store): State<ReadingStore>) -> Json<Vec<ReadingDto>> {
    Json(store.history().await.into_iter().map(Into::into).collect())
}

/// Fetch the ingestion time of the current reading.
#[utoipa::path(
    get,
    path = "/readings/last-update",
    responses(
        (status = 200, description = "Timestamp of the current reading, or null", body = LastUpdateResponse),
    ),
    tag = "readings"
)]
pub async fn get_last_update(State(store): State<ReadingStore>) -> Json<LastUpdateResponse> {
    Json(LastUpdateResponse {
        timestamp: store.last_update().await,
    })
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = StatusResponse),
    ),
    tag = "system"
)]
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(submit_reading, get_current_reading, get_history, get_last_update, health),
    components(schemas(
        ReadingDto,
        SubmitReadingRequest,
        StatusResponse,
        LastUpdateResponse,
        ErrorResponse
    )),
    tags(
        (name = "readings", description = "Sensor reading ingestion and retrieval"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Air Station API",
        version = "0.1.0",
        description = "Ingestion and retrieval of environmental sensor readings"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
