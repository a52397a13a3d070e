//! Generation service: routes backend calls through retry, the request queue
//! and the result cache.
//!
//! Every collaborator is passed in by the caller, so several services can
//! share one queue or cache, or use their own.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::imagegen::{BatchParams, GenerateParams, ImageClient};
use crate::orchestration::{create_key, with_retry, RequestQueue, ResultCache, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub running: usize,
    pub pending: usize,
    pub max_concurrent: usize,
    pub cached: usize,
}

#[derive(Clone, Debug)]
pub struct GenerationService {
    client: ImageClient,
    queue: RequestQueue,
    cache: Arc<ResultCache<Value>>,
    retry: RetryPolicy,
    /// Bumped by every successful reload. Held while a result is written to
    /// the cache so a reload cannot interleave between the check and the set.
    epoch: Arc<Mutex<u64>>,
}

impl GenerationService {
    pub fn new(
        client: ImageClient,
        queue: RequestQueue,
        cache: Arc<ResultCache<Value>>,
        retry: RetryPolicy,
    ) -> Self {
        GenerationService {
            client,
            queue,
            cache,
            retry,
            epoch: Arc::new(Mutex::new(0)),
        }
    }

    pub fn client(&self) -> &ImageClient {
        &self.client
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn cache(&self) -> &ResultCache<Value> {
        &self.cache
    }

    /// Generate one image, answering from cache when the same parameters were
    /// generated recently. Only successes are cached.
    pub async fn generate(&self, params: &GenerateParams) -> AppResult<Value> {
        params.validate()?;
        let key = create_key(params)?;
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(%key, "generate served from cache");
            return Ok(hit);
        }

        let started_in = *self.lock_epoch();
        let client = self.client.clone();
        let params = params.clone();
        let op = with_retry(
            self.retry.clone(),
            move || {
                let client = client.clone();
                let params = params.clone();
                async move { client.generate(&params).await }
            },
            AppError::is_transient,
        );
        let value = self.queue.submit(op).await.map_err(AppError::from)?;

        let epoch = self.lock_epoch();
        if *epoch == started_in {
            self.cache.set(key, value.clone());
        } else {
            tracing::debug!(%key, "model reloaded mid-request, result not cached");
        }
        Ok(value)
    }

    /// Batch generation goes through the queue but is never cached.
    pub async fn batch(&self, params: &BatchParams) -> AppResult<Value> {
        params.validate()?;
        let client = self.client.clone();
        let params = params.clone();
        let op = with_retry(
            self.retry.clone(),
            move || {
                let client = client.clone();
                let params = params.clone();
                async move { client.batch(&params).await }
            },
            AppError::is_transient,
        );
        self.queue.submit(op).await.map_err(AppError::from)
    }

    pub async fn info(&self) -> AppResult<Value> {
        self.client.info().await
    }

    /// Reload the backend model. Cached results were produced by the previous
    /// model, so the cache is cleared on success.
    pub async fn reload(&self) -> AppResult<Value> {
        let value = self.client.reload().await?;
        {
            let mut epoch = self.lock_epoch();
            *epoch += 1;
            self.cache.clear();
        }
        tracing::info!("model reloaded, result cache cleared");
        Ok(value)
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            running: self.queue.running(),
            pending: self.queue.pending(),
            max_concurrent: self.queue.max_concurrent(),
            cached: self.cache.len(),
        }
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
