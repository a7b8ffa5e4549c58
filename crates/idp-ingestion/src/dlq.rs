//! Dead-letter queue inspection and replay. `peek_dlq_messages` reads without
//! consuming (visibility timeout reset to 0 after each receive);
//! `replay_dead_letter_queue` drains the DLQ into a target queue, deleting
//! only messages that were successfully re-sent.

use crate::queue::{QueueMessage, SqsClient};
use std::time::Duration;

pub async fn peek_dlq_messages(client: &dyn SqsClient, dlq_url: &str, limit: u32, wait_time_seconds: u32) -> Result<Vec<QueueMessage>, String> {
    let mut messages = Vec::new();
    let mut remaining = limit;

    while remaining > 0 {
        let batch_size = remaining.min(10);
        let batch = client.receive_batch(dlq_url, batch_size, wait_time_seconds, 0).await?;
        if batch.is_empty() {
            break;
        }
        remaining -= batch.len() as u32;
        messages.extend(batch);
    }

    Ok(messages)
}

/// Capability trait for sending a message onto a queue, distinct from
/// [`SqsClient`]'s batch-receive/delete surface since replay only ever sends
/// one message at a time.
#[async_trait::async_trait]
pub trait QueueSender: Send + Sync {
    async fn send_message(&self, queue_url: &str, body: &serde_json::Value) -> Result<(), String>;
}

pub struct ReplayOptions {
    pub limit: Option<u32>,
    pub batch_size: u32,
    pub wait_time_seconds: u32,
    pub throttle: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            limit: None,
            batch_size: 10,
            wait_time_seconds: 2,
            throttle: Duration::ZERO,
        }
    }
}

/// Replays DLQ messages into `target_queue_url`. A per-message send failure
/// is logged and the message is left in the DLQ (not deleted); successfully
/// replayed messages are deleted from the DLQ one at a time.
pub async fn replay_dead_letter_queue(
    receiver: &dyn SqsClient,
    sender: &dyn QueueSender,
    dlq_url: &str,
    target_queue_url: &str,
    options: ReplayOptions,
) -> Result<u32, String> {
    let mut replayed = 0u32;

    loop {
        if let Some(limit) = options.limit {
            if replayed >= limit {
                break;
            }
        }

        let request_batch_size = options.batch_size.min(10);
        let messages = receiver
            .receive_batch(dlq_url, request_batch_size, options.wait_time_seconds, options.wait_time_seconds.max(30))
            .await?;
        if messages.is_empty() {
            break;
        }

        for message in messages {
            if let Some(limit) = options.limit {
                if replayed >= limit {
                    break;
                }
            }

            if let Err(err) = sender.send_message(target_queue_url, &message.body).await {
                log::error!("failed to replay message {}: {err}", message.message_id);
                continue;
            }

            if let Err(err) = receiver.delete_batch(dlq_url, std::slice::from_ref(&message.receipt_handle)).await {
                log::error!("replayed message {} but failed to delete it from the DLQ: {err}", message.message_id);
            }
            replayed += 1;

            if !options.throttle.is_zero() {
                tokio::time::sleep(options.throttle).await;
            }
        }
    }

    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemorySqsQueue;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn message(id: &str) -> QueueMessage {
        QueueMessage {
            message_id: id.to_string(),
            receipt_handle: format!("receipt-{id}"),
            body: json!({"object_key": "a.pdf"}),
            sns_topic: None,
        }
    }

    struct RecordingSender {
        sent: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl QueueSender for RecordingSender {
        async fn send_message(&self, _queue_url: &str, body: &serde_json::Value) -> Result<(), String> {
            self.sent.lock().unwrap().push(body.clone());
            Ok(())
        }
    }

    struct FailingSender;
    #[async_trait]
    impl QueueSender for FailingSender {
        async fn send_message(&self, _queue_url: &str, _body: &serde_json::Value) -> Result<(), String> {
            Err("send failed".to_string())
        }
    }

    #[tokio::test]
    async fn peek_does_not_delete_messages() {
        let queue = InMemorySqsQueue::new();
        queue.enqueue(message("1"));
        queue.enqueue(message("2"));
        let peeked = peek_dlq_messages(&queue, "dlq", 10, 2).await.unwrap();
        assert_eq!(peeked.len(), 2);
        assert!(queue.deleted_receipt_handles().is_empty());
    }

    #[tokio::test]
    async fn replay_deletes_only_successfully_sent_messages() {
        let dlq = InMemorySqsQueue::new();
        dlq.enqueue(message("1"));
        dlq.enqueue(message("2"));
        let sender = RecordingSender { sent: Mutex::new(vec![]) };
        let replayed = replay_dead_letter_queue(&dlq, &sender, "dlq", "main", ReplayOptions::default()).await.unwrap();
        assert_eq!(replayed, 2);
        assert_eq!(dlq.deleted_receipt_handles().len(), 2);
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_send_leaves_message_in_dlq() {
        let dlq = InMemorySqsQueue::new();
        dlq.enqueue(message("1"));
        let replayed = replay_dead_letter_queue(&dlq, &FailingSender, "dlq", "main", ReplayOptions::default()).await.unwrap();
        assert_eq!(replayed, 0);
        assert!(dlq.deleted_receipt_handles().is_empty());
    }

    #[tokio::test]
    async fn respects_replay_limit() {
        let dlq = InMemorySqsQueue::new();
        for i in 0..5 {
            dlq.enqueue(message(&i.to_string()));
        }
        let sender = RecordingSender { sent: Mutex::new(vec![]) };
        let options = ReplayOptions { limit: Some(2), ..ReplayOptions::default() };
        let replayed = replay_dead_letter_queue(&dlq, &sender, "dlq", "main", options).await.unwrap();
        assert_eq!(replayed, 2);
    }
}
