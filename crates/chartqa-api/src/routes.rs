//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::prompt;
use crate::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create `/api` routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Free-form questions
        .route("/prompt", get(prompt::prompt_get).post(prompt::prompt_post))
        // Questions about the data file
        .route(
            "/prompt-agent",
            get(prompt::prompt_agent_get).post(prompt::prompt_agent_post),
        )
}
