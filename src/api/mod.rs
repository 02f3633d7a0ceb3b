pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::store::ReadingStore;
use handlers::ApiDoc;

pub fn router(store: ReadingStore) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/readings",
            get(handlers::get_current_reading).post(handlers::submit_reading),
        )
        .route("/readings/history", get(handlers::get_history))
        .route("/readings/last-update", get(handlers::get_last_update))
        // Legacy dashboard paths. Error bodies use `error`, not the old `erro`.
        .route(
            "/dados",
            get(handlers::get_current_reading).post(handlers::submit_reading),
        )
        .route("/historico", get(handlers::get_history))
        .with_state(store)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(CorsLayer::permissive())
}
