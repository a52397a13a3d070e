//! Image generation client library
//!
//! Modules:
//! - `orchestration`: Bounded-concurrency queue, time/size-bounded cache,
//!   canonical cache keys and the retry decorator.
//! - `imagegen`: Thin client for the generation backend and its parameters.
//! - `service`: Composes client, retry, queue and cache.
//! - `api`: Axum HTTP handlers and router used by the proxy binary.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `ImageClient`,
//! `GenerationService`, `RequestQueue` and `ResultCache`.
pub mod api;
pub mod config;
pub mod error;
pub mod imagegen;
pub mod orchestration;
pub mod service;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use imagegen::{BatchParams, GenerateParams, ImageClient};
pub use orchestration::{create_key, RequestQueue, ResultCache, RetryPolicy};
pub use service::GenerationService;

use std::sync::Arc;

/// Wire up a service from configuration.
pub fn service_from_config(config: &Config) -> GenerationService {
    GenerationService::new(
        ImageClient::new(config.imagegen_url.clone()),
        RequestQueue::new(config.max_concurrent),
        Arc::new(ResultCache::new(config.cache_ttl, config.cache_max_size)),
        config.retry_policy(),
    )
}
