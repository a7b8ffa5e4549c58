use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("queue receive failed: {0}")]
    QueueReceive(String),
    #[error("queue delete failed: {0}")]
    QueueDelete(String),
    #[error("metadata sink append failed: {0}")]
    SinkAppend(String),
    #[error("worker dispatch failed: {0}")]
    Dispatch(String),
    #[error("routing failed for message {message_id}: {source}")]
    Routing {
        message_id: String,
        #[source]
        source: idp_router::RouterError,
    },
}
