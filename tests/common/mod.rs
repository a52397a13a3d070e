//! In-process stand-in for the generation backend.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use imagegen_client::{GenerationService, ImageClient, RequestQueue, ResultCache, RetryPolicy};

#[derive(Default)]
pub struct Backend {
    pub generate_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub reload_calls: AtomicUsize,
    /// Number of upcoming generate calls answered with 503.
    pub fail_next: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    /// Artificial latency for generate, in milliseconds.
    pub latency_ms: AtomicUsize,
}

impl Backend {
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

async fn generate(
    State(backend): State<Arc<Backend>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    backend.generate_calls.fetch_add(1, Ordering::SeqCst);
    let now = backend.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    backend.peak_in_flight.fetch_max(now, Ordering::SeqCst);

    let latency = backend.latency_ms.load(Ordering::SeqCst) as u64;
    if latency > 0 {
        tokio::time::sleep(Duration::from_millis(latency)).await;
    }
    backend.in_flight.fetch_sub(1, Ordering::SeqCst);

    let failing = backend
        .fail_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "model busy".to_string()));
    }

    let prompt = query.get("prompt").cloned().unwrap_or_default();
    if prompt == "reject" {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "prompt rejected".to_string()));
    }
    Ok(Json(json!({
        "prompt": prompt,
        "seed": query.get("seed"),
        "image": "iVBORw0KGgo=",
    })))
}

async fn batch(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    backend.batch_calls.fetch_add(1, Ordering::SeqCst);
    let count = body["prompts"].as_array().map(|a| a.len()).unwrap_or(0);
    Json(json!({ "images": vec!["iVBORw0KGgo="; count] }))
}

async fn info() -> Json<Value> {
    Json(json!({ "model": "test-diffusion", "device": "cpu" }))
}

async fn reload(State(backend): State<Arc<Backend>>) -> Json<Value> {
    backend.reload_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "reloaded" }))
}

/// Serve a fresh backend on an ephemeral port, returning it and its base URL.
pub fn spawn_backend() -> (Arc<Backend>, String) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/generate", get(generate))
        .route("/batch", post(batch))
        .route("/info", get(info))
        .route("/reload", post(reload))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(async move {
        server.await.unwrap();
    });
    (backend, format!("http://{}", addr))
}

pub fn service(base_url: &str, max_concurrent: usize) -> GenerationService {
    GenerationService::new(
        ImageClient::new(base_url),
        RequestQueue::new(max_concurrent),
        Arc::new(ResultCache::new(Duration::from_secs(60), 16)),
        RetryPolicy::new(3, Duration::from_millis(5)),
    )
}
