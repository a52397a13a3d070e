//! Thin HTTP client for the image generation backend.
//!
//! - `generate` sends `GenerateParams` as query parameters to `GET /generate`.
//! - `batch` posts `BatchParams` as JSON to `/batch`.
//! - `info` fetches `/info`; `reload` posts to `/reload`.
//!
//! Response bodies belong to the backend and are returned as raw JSON.
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::imagegen::params::{BatchParams, GenerateParams};

#[derive(Clone, Debug)]
pub struct ImageClient {
    client: Client,
    base_url: String,
}

impl ImageClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        ImageClient { client: Client::new(), base_url: base }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate a single image.
    pub async fn generate(&self, params: &GenerateParams) -> AppResult<Value> {
        let url = format!("{}/generate", self.base_url);
        tracing::info!(%url, prompt = %params.prompt, "requesting generation");
        self.send_json(self.client.get(&url).query(params), "generate").await
    }

    /// Generate one image per prompt in a single backend call.
    pub async fn batch(&self, params: &BatchParams) -> AppResult<Value> {
        let url = format!("{}/batch", self.base_url);
        tracing::info!(%url, prompts = params.prompts.len(), "requesting batch generation");
        self.send_json(self.client.post(&url).json(params), "batch").await
    }

    /// Model and pipeline information reported by the backend.
    pub async fn info(&self) -> AppResult<Value> {
        let url = format!("{}/info", self.base_url);
        self.send_json(self.client.get(&url), "info").await
    }

    /// Ask the backend to reload its model.
    pub async fn reload(&self) -> AppResult<Value> {
        let url = format!("{}/reload", self.base_url);
        tracing::info!(%url, "requesting model reload");
        self.send_json(self.client.post(&url), "reload").await
    }

    async fn send_json(&self, request: RequestBuilder, endpoint: &str) -> AppResult<Value> {
        let response = request.send().await.map_err(AppError::HttpClient)?;

        let status = response.status();
        if status.is_success() {
            let json = response.json().await.map_err(AppError::HttpClient)?;
            tracing::debug!(endpoint, "backend response: {:?}", json);
            Ok(json)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            tracing::error!(endpoint, status = status.as_u16(), %body, "backend request failed");
            Err(AppError::Backend { status: status.as_u16(), body })
        }
    }
}
