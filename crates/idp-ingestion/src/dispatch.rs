//! Work fan-out: either hand the whole batch to an external job runner, or
//! process it inline with a bounded-concurrency worker pool.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Capability trait for submitting a batch to an external job runner (e.g. a
/// Databricks job run). No production backend ships with this crate.
#[async_trait]
pub trait WorkerDispatcher: Send + Sync {
    async fn dispatch(&self, payloads: Vec<Value>) -> Result<(), String>;
}

/// Null-object default: no external job runner wired, dispatch is a no-op
/// that reports success (the caller is expected to use inline processing
/// instead when this is the active dispatcher).
#[derive(Debug, Default)]
pub struct NullWorkerDispatcher;

#[async_trait]
impl WorkerDispatcher for NullWorkerDispatcher {
    async fn dispatch(&self, _payloads: Vec<Value>) -> Result<(), String> {
        Ok(())
    }
}

/// Processes payloads inline, bounded to a fixed concurrency cap.
pub struct BoundedWorkerPool {
    semaphore: Arc<Semaphore>,
}

impl BoundedWorkerPool {
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Runs `handler` for each payload, bounded to this pool's concurrency
    /// cap. Per-payload failures are collected rather than aborting siblings.
    pub async fn process<F, Fut>(&self, payloads: Vec<Value>, handler: F) -> Vec<Result<(), String>>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send,
    {
        let handler = Arc::new(handler);
        let mut tasks = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let permit = Arc::clone(&self.semaphore);
            let handler = Arc::clone(&handler);
            tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                handler(payload).await
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(join_err) => results.push(Err(join_err.to_string())),
            }
        }
        results
    }
}
