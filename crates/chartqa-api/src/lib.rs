//! chartqa API - HTTP server
//!
//! Serves the prompt endpoints, health probes, the OpenAPI document,
//! and the pre-built frontend from the static directory.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{http::HeaderValue, routing::get, Json, Router};
use chartqa_core::ServerConfig;
use handlers::{health, prompt};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        prompt::prompt_get,
        prompt::prompt_post,
        prompt::prompt_agent_get,
        prompt::prompt_agent_post,
        health::health_check,
        health::readiness_check,
    ),
    components(schemas(prompt::QuestionParams, prompt::PromptResponse, error::ApiError)),
    tags(
        (name = "prompt", description = "Free-form and data-grounded questions"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// CORS policy: any origin unless `cors_origins` lists specific ones
pub fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() {
        return Some(layer.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;
    let index = ServeFile::new(server.index_path());
    let assets = ServeDir::new(&server.static_dir);
    let cors = cors_layer(server);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", routes::api_routes())
        .route_service("/", index)
        .fallback_service(assets)
        .layer(tower::util::option_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
