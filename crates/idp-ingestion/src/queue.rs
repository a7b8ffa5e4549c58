//! Queue abstraction: receive a bounded batch of messages, delete acknowledged
//! ones. No retry/backoff is modelled here — AWS SDK clients already retry
//! transport-level failures per their own configuration.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: Value,
    pub sns_topic: Option<String>,
}

#[async_trait]
pub trait SqsClient: Send + Sync {
    async fn receive_batch(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait_time_seconds: u32,
        visibility_timeout: u32,
    ) -> Result<Vec<QueueMessage>, String>;

    async fn delete_batch(&self, queue_url: &str, receipt_handles: &[String]) -> Result<(), String>;
}

/// Production [`SqsClient`] backed by the AWS SDK. `MaxNumberOfMessages` is
/// clamped to SQS's hard limit of 10 regardless of the configured batch size.
pub struct AwsSqsClient {
    client: aws_sdk_sqs::Client,
}

impl AwsSqsClient {
    #[must_use]
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
        Self::new(aws_sdk_sqs::Client::new(&config))
    }
}

#[async_trait]
impl SqsClient for AwsSqsClient {
    async fn receive_batch(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait_time_seconds: u32,
        visibility_timeout: u32,
    ) -> Result<Vec<QueueMessage>, String> {
        let response = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages.min(10) as i32)
            .wait_time_seconds(wait_time_seconds as i32)
            .visibility_timeout(visibility_timeout as i32)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let messages = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let message_id = m.message_id?;
                let receipt_handle = m.receipt_handle?;
                let body_str = m.body.unwrap_or_default();
                let body: Value = serde_json::from_str(&body_str).unwrap_or(Value::Null);
                let sns_topic = body.get("TopicArn").and_then(Value::as_str).map(String::from);
                Some(QueueMessage {
                    message_id,
                    receipt_handle,
                    body,
                    sns_topic,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete_batch(&self, queue_url: &str, receipt_handles: &[String]) -> Result<(), String> {
        if receipt_handles.is_empty() {
            return Ok(());
        }

        let mut request = self.client.delete_message_batch().queue_url(queue_url);
        for (idx, handle) in receipt_handles.iter().enumerate() {
            let entry = aws_sdk_sqs::types::DeleteMessageBatchRequestEntry::builder()
                .id(idx.to_string())
                .receipt_handle(handle)
                .build()
                .map_err(|e| e.to_string())?;
            request = request.entries(entry);
        }
        request.send().await.map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// In-memory queue used by tests and local development.
#[derive(Default)]
pub struct InMemorySqsQueue {
    messages: Mutex<VecDeque<QueueMessage>>,
    deleted: Mutex<Vec<String>>,
}

impl InMemorySqsQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, message: QueueMessage) {
        self.messages.lock().unwrap().push_back(message);
    }

    pub fn deleted_receipt_handles(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqsClient for InMemorySqsQueue {
    async fn receive_batch(
        &self,
        _queue_url: &str,
        max_messages: u32,
        _wait_time_seconds: u32,
        _visibility_timeout: u32,
    ) -> Result<Vec<QueueMessage>, String> {
        let mut queue = self.messages.lock().unwrap();
        let count = (max_messages.min(10) as usize).min(queue.len());
        Ok(queue.drain(..count).collect())
    }

    async fn delete_batch(&self, _queue_url: &str, receipt_handles: &[String]) -> Result<(), String> {
        self.deleted.lock().unwrap().extend(receipt_handles.iter().cloned());
        Ok(())
    }
}
