//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::error::AppError;
use crate::imagegen::{BatchParams, GenerateParams};
use crate::service::ServiceStats;

pub async fn root() -> &'static str {
    "Image Generation Proxy"
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    params: Result<Query<GenerateParams>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(params) = params.map_err(|r| AppError::InvalidParams(r.body_text()))?;
    state.service.generate(&params).await.map(Json).map_err(|e| {
        tracing::error!("Failed to generate: {:?}", e);
        e
    })
}

pub async fn batch(
    State(state): State<Arc<AppState>>,
    params: Result<Json<BatchParams>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(params) = params.map_err(|r| AppError::InvalidParams(r.body_text()))?;
    state.service.batch(&params).await.map(Json).map_err(|e| {
        tracing::error!("Failed to run batch: {:?}", e);
        e
    })
}

pub async fn info(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state.service.info().await.map(Json)
}

pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state.service.reload().await.map(Json)
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<ServiceStats> {
    Json(state.service.stats())
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            AppError::Backend { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
