pub mod config;
pub mod dispatch;
pub mod dlq;
pub mod error;
pub mod loop_;
pub mod queue;
pub mod sink;

pub use config::IngestionConfig;
pub use dispatch::{BoundedWorkerPool, NullWorkerDispatcher, WorkerDispatcher};
pub use dlq::{peek_dlq_messages, replay_dead_letter_queue, QueueSender, ReplayOptions};
pub use error::IngestionError;
pub use loop_::{CycleReport, IngestionLoop};
pub use queue::{AwsSqsClient, InMemorySqsQueue, QueueMessage, SqsClient};
pub use sink::{InMemoryMetadataSink, MetadataRecord, MetadataSink, RoutingRecord};
