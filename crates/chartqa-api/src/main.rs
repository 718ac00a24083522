//! chartqa API Server
//!
//! Serves the chat frontend and answers questions either directly through
//! the language model or through the tabular agent over the data file.
//!
//! Author: hephaex@gmail.com

use chartqa_api::{create_router, state::AppState};
use chartqa_core::config::{AppConfig, LoggingConfig};
use std::sync::Arc;

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins; a configured level only applies to our own crates
    let level_configured =
        std::env::var("LOG_LEVEL").is_ok() || logging.level != LoggingConfig::default().level;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if level_configured {
            format!(
                "chartqa_api={level},chartqa_agent={level},chartqa_llm={level},tower_http={level}",
                level = logging.level
            )
            .into()
        } else {
            "chartqa_api=debug,tower_http=debug".into()
        }
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration, refusing to start");
        return Err(e.into());
    }

    let addr = config.server.addr();

    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        api_key = if config.llm.openai_api_key.is_some() { "present" } else { "absent" },
        "Language model configured"
    );
    tracing::info!(
        data = %config.agent.data_path.display(),
        max_iterations = config.agent.max_iterations,
        "Tabular agent configured"
    );
    let origins = if config.server.cors_origins.is_empty() {
        "*".to_string()
    } else {
        config.server.cors_origins.join(",")
    };
    tracing::info!(enabled = config.server.cors_enabled, %origins, "CORS configured");
    if !config.agent.data_path.is_file() {
        tracing::warn!(
            data = %config.agent.data_path.display(),
            "Data file not found; /api/prompt-agent will fail until it exists"
        );
    }

    // Create application state
    let state = Arc::new(AppState::from_config(config)?);
    let static_dir = state.config.server.static_dir.clone();

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("chartqa API Server starting on http://{}", addr);
    tracing::info!("Serving frontend from {}", static_dir.display());
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
