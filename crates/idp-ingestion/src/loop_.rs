//! The ingestion loop: long-polls a queue, routes each message, persists
//! metadata, fans work out, and acknowledges what succeeded.

use crate::config::IngestionConfig;
use crate::dispatch::{BoundedWorkerPool, WorkerDispatcher};
use crate::error::IngestionError;
use crate::queue::{QueueMessage, SqsClient};
use crate::sink::{MetadataRecord, MetadataSink, RoutingRecord};
use idp_router::DocumentRouter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const OBJECT_KEY_PATHS: [&[&str]; 4] = [
    &["s3", "object", "key"],
    &["object_key"],
    &["objectKey"],
    &["source_path"],
];

pub struct IngestionLoop {
    config: IngestionConfig,
    queue: Arc<dyn SqsClient>,
    router: Arc<DocumentRouter>,
    sink: Arc<dyn MetadataSink>,
    dispatcher: Option<Arc<dyn WorkerDispatcher>>,
    worker_pool: BoundedWorkerPool,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub batches_processed: u32,
    pub messages_routed: u32,
    pub messages_skipped: u32,
}

impl IngestionLoop {
    #[must_use]
    pub fn new(
        config: IngestionConfig,
        queue: Arc<dyn SqsClient>,
        router: Arc<DocumentRouter>,
        sink: Arc<dyn MetadataSink>,
        dispatcher: Option<Arc<dyn WorkerDispatcher>>,
        inline_concurrency: usize,
    ) -> Self {
        Self {
            config,
            queue,
            router,
            sink,
            dispatcher,
            worker_pool: BoundedWorkerPool::new(inline_concurrency),
        }
    }

    /// Runs until `max_batches` is reached (if configured), or forever.
    pub async fn run(&self) -> Result<CycleReport, IngestionError> {
        let mut report = CycleReport::default();

        loop {
            if let Some(max_batches) = self.config.max_batches {
                if report.batches_processed >= max_batches {
                    break;
                }
            }

            let batch_report = self.run_cycle().await?;
            report.batches_processed += 1;
            report.messages_routed += batch_report.messages_routed;
            report.messages_skipped += batch_report.messages_skipped;
        }

        Ok(report)
    }

    /// Executes a single receive-route-persist-dispatch-delete cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, IngestionError> {
        let mut report = CycleReport::default();

        let overrides = self.router.refresh_overrides().await;

        let visibility_timeout = self.config.wait_time_seconds + self.config.visibility_timeout_buffer;
        let messages = self
            .queue
            .receive_batch(&self.config.queue_url, self.config.max_batch_size.min(10), self.config.wait_time_seconds, visibility_timeout)
            .await
            .map_err(IngestionError::QueueReceive)?;

        if messages.is_empty() {
            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_seconds as u64)).await;
            return Ok(report);
        }

        let mut acknowledged = Vec::new();
        let mut metadata_records = Vec::new();
        let mut routing_records = Vec::new();
        let mut dispatch_payloads = Vec::new();

        for message in messages {
            let Some(object_key) = extract_object_key(&message.body) else {
                log::warn!("message {} has no resolvable object key; skipping without ack", message.message_id);
                report.messages_skipped += 1;
                continue;
            };

            let analysis = match self.router.route(message.body.clone(), &object_key, &overrides).await {
                Ok(analysis) => analysis,
                Err(err) => {
                    log::error!("routing failed for message {}: {err}", message.message_id);
                    report.messages_skipped += 1;
                    continue;
                }
            };

            metadata_records.push(MetadataRecord::from_analysis(
                Some(object_key.clone()),
                message.message_id.clone(),
                message.sns_topic.clone(),
                self.config.queue_url.clone(),
                &analysis,
            ));
            routing_records.push(RoutingRecord {
                source_path: object_key.clone(),
                analysis: analysis.clone(),
            });
            dispatch_payloads.push(dispatch_payload(&message, &object_key, &analysis));
            acknowledged.push(message.receipt_handle);
            report.messages_routed += 1;
        }

        self.sink
            .append_metadata(metadata_records)
            .await
            .map_err(IngestionError::SinkAppend)?;
        self.sink
            .append_routing(routing_records)
            .await
            .map_err(IngestionError::SinkAppend)?;

        if !dispatch_payloads.is_empty() {
            if self.config.dispatch_job_id.is_some() {
                if let Some(dispatcher) = &self.dispatcher {
                    dispatcher.dispatch(dispatch_payloads).await.map_err(IngestionError::Dispatch)?;
                }
            } else {
                let results = self
                    .worker_pool
                    .process(dispatch_payloads, |payload| async move {
                        log::debug!("processed payload inline: {payload}");
                        Ok(())
                    })
                    .await;
                for result in results {
                    if let Err(err) = result {
                        log::error!("inline worker failed: {err}");
                    }
                }
            }
        }

        if !acknowledged.is_empty() {
            self.queue
                .delete_batch(&self.config.queue_url, &acknowledged)
                .await
                .map_err(IngestionError::QueueDelete)?;
        }

        Ok(report)
    }
}

fn extract_object_key(body: &Value) -> Option<String> {
    for path in OBJECT_KEY_PATHS {
        let mut current = body;
        let mut found = true;
        for segment in path {
            match current.get(segment) {
                Some(next) => current = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            if let Some(key) = current.as_str() {
                return Some(key.to_string());
            }
        }
    }
    None
}

fn dispatch_payload(message: &QueueMessage, object_key: &str, analysis: &idp_router::DocumentAnalysis) -> Value {
    serde_json::json!({
        "message_id": message.message_id,
        "object_key": object_key,
        "strategy": analysis.strategy,
        "category": analysis.category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::NullWorkerDispatcher;
    use crate::queue::InMemorySqsQueue;
    use crate::sink::InMemoryMetadataSink;
    use idp_router::{DocumentRouter, HeuristicLayoutAnalyser, LayoutAnalyser, NullPdfStructuralSource, OverrideProvider, PdfStructuralLayoutAnalyser, ResolverChain, RouterConfig};
    use serde_json::json;

    fn config() -> IngestionConfig {
        IngestionConfig {
            queue_url: "https://example.com/q".to_string(),
            region: "us-east-1".to_string(),
            max_batch_size: 10,
            visibility_timeout_buffer: 120,
            wait_time_seconds: 0,
            poll_interval_seconds: 0,
            max_batches: Some(1),
            dispatch_job_id: None,
            metadata_table: "t".to_string(),
        }
    }

    fn router() -> Arc<DocumentRouter> {
        let analyser: Box<dyn LayoutAnalyser> = Box::new(PdfStructuralLayoutAnalyser::new(Box::new(NullPdfStructuralSource), Box::new(HeuristicLayoutAnalyser)));
        Arc::new(DocumentRouter::new(RouterConfig::default(), ResolverChain::new(vec![]), analyser, OverrideProvider::new()))
    }

    fn message(id: &str, object_key: &str) -> QueueMessage {
        QueueMessage {
            message_id: id.to_string(),
            receipt_handle: format!("receipt-{id}"),
            body: json!({"object_key": object_key}),
            sns_topic: None,
        }
    }

    #[tokio::test]
    async fn routes_persists_and_acknowledges_messages() {
        let queue = Arc::new(InMemorySqsQueue::new());
        queue.enqueue(message("1", "invoices/a.pdf"));
        let sink = Arc::new(InMemoryMetadataSink::new());

        let ingestion_loop = IngestionLoop::new(config(), queue.clone(), router(), sink.clone(), Some(Arc::new(NullWorkerDispatcher)), 2);
        let report = ingestion_loop.run_cycle().await.unwrap();

        assert_eq!(report.messages_routed, 1);
        assert_eq!(sink.metadata_records().len(), 1);
        assert_eq!(sink.routing_records().len(), 1);
        assert_eq!(queue.deleted_receipt_handles().len(), 1);
    }

    #[tokio::test]
    async fn messages_without_an_object_key_are_skipped_without_ack() {
        let queue = Arc::new(InMemorySqsQueue::new());
        queue.enqueue(QueueMessage {
            message_id: "1".to_string(),
            receipt_handle: "receipt-1".to_string(),
            body: json!({"unrelated": true}),
            sns_topic: None,
        });
        let sink = Arc::new(InMemoryMetadataSink::new());

        let ingestion_loop = IngestionLoop::new(config(), queue.clone(), router(), sink, Some(Arc::new(NullWorkerDispatcher)), 2);
        let report = ingestion_loop.run_cycle().await.unwrap();

        assert_eq!(report.messages_skipped, 1);
        assert!(queue.deleted_receipt_handles().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let queue = Arc::new(InMemorySqsQueue::new());
        let sink = Arc::new(InMemoryMetadataSink::new());
        let ingestion_loop = IngestionLoop::new(config(), queue, router(), sink, Some(Arc::new(NullWorkerDispatcher)), 2);
        let report = ingestion_loop.run_cycle().await.unwrap();
        assert_eq!(report.messages_routed, 0);
        assert_eq!(report.messages_skipped, 0);
    }
}
