//! Prompt handlers
//!
//! Both endpoints accept the question as `?question=` on GET and as a JSON
//! body on POST, and answer with `{"prompt", "response"}`.
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, State},
    Json,
};
use chartqa_core::AnswerService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::{IntoParams, ToSchema};

/// JSON body extractor whose rejections become structured `AppError`s
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections become structured `AppError`s
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Question input, from the query string or the JSON body
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuestionParams {
    /// The user's question
    #[schema(example = "Which region has the highest average life expectancy?")]
    pub question: String,
}

/// Prompt response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PromptResponse {
    /// The question as received
    #[schema(example = "Which region has the highest average life expectancy?")]
    pub prompt: String,

    /// The answer text
    #[schema(example = "Europe & Central Asia has the highest average life expectancy.")]
    pub response: String,
}

async fn answer_with(
    state: &AppState,
    service: &dyn AnswerService,
    question: String,
) -> Result<Json<PromptResponse>, AppError> {
    state.increment_requests();
    let start = Instant::now();
    let mode = service.mode();

    tracing::debug!(%mode, question = %question, "Prompt received");

    let response = service.answer(&question).await.map_err(|e| {
        tracing::error!(%mode, error = %e, "Answer service failed");
        AppError::from(e)
    })?;

    tracing::info!(
        %mode,
        question_chars = question.chars().count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Prompt answered"
    );

    Ok(Json(PromptResponse {
        prompt: question,
        response,
    }))
}

/// Ask the language model directly (query string)
#[utoipa::path(
    get,
    path = "/api/prompt",
    tag = "prompt",
    params(QuestionParams),
    responses(
        (status = 200, description = "Answer generated", body = PromptResponse),
        (status = 400, description = "Missing question", body = crate::error::ApiError),
        (status = 502, description = "Language model failed", body = crate::error::ApiError)
    )
)]
pub async fn prompt_get(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<QuestionParams>,
) -> Result<Json<PromptResponse>, AppError> {
    answer_with(&state, state.prompt_service.as_ref(), params.question).await
}

/// Ask the language model directly (JSON body)
#[utoipa::path(
    post,
    path = "/api/prompt",
    tag = "prompt",
    request_body = QuestionParams,
    responses(
        (status = 200, description = "Answer generated", body = PromptResponse),
        (status = 400, description = "Missing or malformed question", body = crate::error::ApiError),
        (status = 502, description = "Language model failed", body = crate::error::ApiError)
    )
)]
pub async fn prompt_post(
    State(state): State<Arc<AppState>>,
    ApiJson(params): ApiJson<QuestionParams>,
) -> Result<Json<PromptResponse>, AppError> {
    answer_with(&state, state.prompt_service.as_ref(), params.question).await
}

/// Ask the tabular agent about the data file (query string)
#[utoipa::path(
    get,
    path = "/api/prompt-agent",
    tag = "prompt",
    params(QuestionParams),
    responses(
        (status = 200, description = "Answer generated", body = PromptResponse),
        (status = 400, description = "Missing question", body = crate::error::ApiError),
        (status = 500, description = "Data file unusable", body = crate::error::ApiError),
        (status = 502, description = "Language model failed", body = crate::error::ApiError)
    )
)]
pub async fn prompt_agent_get(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<QuestionParams>,
) -> Result<Json<PromptResponse>, AppError> {
    answer_with(&state, state.agent_service.as_ref(), params.question).await
}

/// Ask the tabular agent about the data file (JSON body)
#[utoipa::path(
    post,
    path = "/api/prompt-agent",
    tag = "prompt",
    request_body = QuestionParams,
    responses(
        (status = 200, description = "Answer generated", body = PromptResponse),
        (status = 400, description = "Missing or malformed question", body = crate::error::ApiError),
        (status = 500, description = "Data file unusable", body = crate::error::ApiError),
        (status = 502, description = "Language model failed", body = crate::error::ApiError)
    )
)]
pub async fn prompt_agent_post(
    State(state): State<Arc<AppState>>,
    ApiJson(params): ApiJson<QuestionParams>,
) -> Result<Json<PromptResponse>, AppError> {
    answer_with(&state, state.agent_service.as_ref(), params.question).await
}
