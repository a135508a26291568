//! The HTTP adapter: `GET /ping` and `POST /products?mode=sequential|concurrent`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::config::SharedConfig;
use crate::error::PipelineError;
use crate::runtime_options::RuntimeOptions;
use crate::stages::domain::{RequestProducts, ResponseProducts};
use crate::stages::{enrichment, topology};
use crate::value::Value;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Live configuration, read fresh on every request.
    pub config: SharedConfig,
}

#[derive(Debug, Deserialize)]
struct ModeQuery {
    mode: Option<String>,
}

/// Builds the application's route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/products", post(process_products))
        .with_state(state)
}

async fn ping() -> &'static str {
    "pong"
}

async fn process_products(
    State(state): State<AppState>,
    Query(query): Query<ModeQuery>,
    Json(request): Json<RequestProducts>,
) -> Result<Json<ResponseProducts>, ApiError> {
    let mode = query.mode.unwrap_or_else(|| "sequential".to_owned());
    tracing::info!(
        products = request.products.len(),
        processing_mode = %mode,
        "processing products"
    );

    let response = if mode == "concurrent" {
        process_concurrent(&state, request).await?
    } else {
        enrichment::process_sequential(&request).await?
    };

    Ok(Json(response))
}

async fn process_concurrent(
    state: &AppState,
    request: RequestProducts,
) -> Result<ResponseProducts, PipelineError> {
    let options = Arc::new(RuntimeOptions::new().with_default_max_p(state.config.workers()));
    let pipeline = topology::enrichment_pipeline(Some(state.config.workers()));
    let result = crate::pipeline::run(options, &pipeline, Value::new(request), false).await?;
    result.downcast::<ResponseProducts>()
}

/// Wraps a [`PipelineError`] so it renders as a `{"error": "..."}` body with the right status.
struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Stage(_) | PipelineError::Panic(_) | PipelineError::TypeMismatch { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
