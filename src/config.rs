//! Env-driven configuration for the proxy, the CLI and the library.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults are provided for convenience during development.
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::orchestration::RetryPolicy;

const ENV_VARS: &[&str] = &[
    "IMAGEGEN_URL",
    "MAX_CONCURRENT",
    "CACHE_TTL_MS",
    "CACHE_MAX_SIZE",
    "RETRY_ATTEMPTS",
    "RETRY_BASE_DELAY_MS",
    "API_HOST",
    "API_PORT",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub imagegen_url: String,
    pub max_concurrent: usize,
    pub cache_ttl: Duration,
    pub cache_max_size: usize,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `new` uses the process env.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        Ok(Config {
            imagegen_url: text("IMAGEGEN_URL", "http://localhost:8000"),
            max_concurrent: parse_var(&lookup, "MAX_CONCURRENT", 3)?,
            cache_ttl: Duration::from_millis(parse_var(&lookup, "CACHE_TTL_MS", 300_000)?),
            cache_max_size: parse_var(&lookup, "CACHE_MAX_SIZE", 100)?,
            retry_attempts: parse_var(&lookup, "RETRY_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(parse_var(&lookup, "RETRY_BASE_DELAY_MS", 1000)?),
            api_host: text("API_HOST", "127.0.0.1"),
            api_port: parse_var(&lookup, "API_PORT", 8189)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }

    pub fn log_env_vars() {
        for name in ENV_VARS {
            let value = env::var(name).unwrap_or_else(|_| "<unset>".to_string());
            tracing::info!("{}: {}", name, value);
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}={:?}: {}", name, raw, e))),
    }
}
