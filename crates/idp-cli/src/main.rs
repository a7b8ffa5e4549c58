//! Command-line entry point for the ingestion and routing pipeline.
//!
//! Three subcommands exercise the core end-to-end: `run` drives the
//! long-polling ingestion loop, `route` runs a single message body through
//! the router for inspection, and `replay-dlq` drains a dead-letter queue
//! back onto its source queue.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use idp_ingestion::{AwsSqsClient, IngestionConfig, IngestionLoop, InMemoryMetadataSink, NullWorkerDispatcher};
use idp_router::{
    DocumentRouter, EnvSource, HeuristicLayoutAnalyser, LayoutAnalyser, ModelBackedLayoutAnalyser, NullLayoutModelClient, NullPdfStructuralSource,
    OverrideProvider, PdfStructuralLayoutAnalyser, ReqwestLayoutModelClient, ResolverChain, RouterConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "idp", about = "Document ingestion and routing pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion loop against the queue named by INGESTION_QUEUE_URL.
    Run,
    /// Route a single JSON message body (read from a file, or stdin with `-`)
    /// and print the resulting analysis.
    Route {
        /// Path to a JSON file containing the SQS message body, or `-` for stdin.
        body: PathBuf,
        /// Object key to route, if not derivable from the body.
        #[arg(long)]
        object_key: Option<String>,
    },
    /// Replay a dead-letter queue back onto its source queue.
    ReplayDlq {
        #[arg(long)]
        dlq_url: String,
        #[arg(long)]
        target_queue_url: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0.0)]
        throttle_seconds: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run => run().await,
        Command::Route { body, object_key } => route(body, object_key).await,
        Command::ReplayDlq {
            dlq_url,
            target_queue_url,
            limit,
            throttle_seconds,
        } => replay_dlq(dlq_url, target_queue_url, limit, throttle_seconds).await,
    }
}

fn build_layout_analyser() -> Box<dyn LayoutAnalyser> {
    let heuristic: Box<dyn LayoutAnalyser> = Box::new(HeuristicLayoutAnalyser);
    let pdf_structural: Box<dyn LayoutAnalyser> = Box::new(PdfStructuralLayoutAnalyser::new(Box::new(NullPdfStructuralSource), heuristic));

    match std::env::var("LAYOUT_MODEL_ENDPOINT") {
        Ok(endpoint) => {
            let mut client = ReqwestLayoutModelClient::new(endpoint);
            if let Ok(api_key) = std::env::var("LAYOUT_MODEL_API_KEY") {
                client = client.with_api_key(api_key);
            }
            if let Ok(raw) = std::env::var("LAYOUT_MODEL_TIMEOUT_SECONDS") {
                match raw.parse::<u64>() {
                    Ok(seconds) => client = client.with_timeout(Duration::from_secs(seconds)),
                    Err(_) => log::warn!("LAYOUT_MODEL_TIMEOUT_SECONDS is not a valid integer: {raw}"),
                }
            }
            Box::new(ModelBackedLayoutAnalyser::new(Box::new(client), pdf_structural))
        }
        Err(_) => Box::new(ModelBackedLayoutAnalyser::new(Box::new(NullLayoutModelClient), pdf_structural)),
    }
}

fn build_router() -> Result<DocumentRouter> {
    let router_config = RouterConfig::from_env().map_err(anyhow::Error::msg).context("loading router configuration")?;
    let overrides = OverrideProvider::new().with_secret_source(Box::new(EnvSource::new("PARSER_STRATEGY_OVERRIDES")));
    Ok(DocumentRouter::new(router_config, ResolverChain::with_inline_default(), build_layout_analyser(), overrides))
}

async fn run() -> Result<()> {
    let config = IngestionConfig::from_env().map_err(anyhow::Error::msg).context("loading ingestion configuration")?;
    let queue = Arc::new(AwsSqsClient::from_env().await);
    let router = Arc::new(build_router()?);
    let sink = Arc::new(InMemoryMetadataSink::new());

    let ingestion_loop = IngestionLoop::new(config, queue, router, sink, Some(Arc::new(NullWorkerDispatcher)), 8);
    let report = ingestion_loop.run().await.context("ingestion loop failed")?;
    log::info!(
        "ingestion finished: {} batches, {} routed, {} skipped",
        report.batches_processed,
        report.messages_routed,
        report.messages_skipped
    );
    Ok(())
}

async fn route(body_path: PathBuf, object_key: Option<String>) -> Result<()> {
    let raw = if body_path.as_os_str() == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading message body from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&body_path).with_context(|| format!("reading {}", body_path.display()))?
    };
    let body: serde_json::Value = serde_json::from_str(&raw).context("message body is not valid JSON")?;

    let key = object_key
        .or_else(|| body.get("object_key").and_then(serde_json::Value::as_str).map(String::from))
        .context("no object key supplied and none found in the message body")?;

    let router = build_router()?;
    let overrides = router.refresh_overrides().await;
    let analysis = router.route(body, &key, &overrides).await.context("routing failed")?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

async fn replay_dlq(dlq_url: String, target_queue_url: String, limit: Option<u32>, throttle_seconds: f64) -> Result<()> {
    use idp_ingestion::{peek_dlq_messages, replay_dead_letter_queue, QueueSender, ReplayOptions};
    use std::time::Duration;

    struct SqsQueueSender {
        client: aws_sdk_sqs::Client,
    }

    #[async_trait::async_trait]
    impl QueueSender for SqsQueueSender {
        async fn send_message(&self, queue_url: &str, body: &serde_json::Value) -> Result<(), String> {
            self.client
                .send_message()
                .queue_url(queue_url)
                .message_body(body.to_string())
                .send()
                .await
                .map_err(|e| e.to_string())?;
            Ok(())
        }
    }

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
    let sqs_client = aws_sdk_sqs::Client::new(&sdk_config);
    let receiver = idp_ingestion::AwsSqsClient::new(sqs_client.clone());
    let sender = SqsQueueSender { client: sqs_client };

    let preview = peek_dlq_messages(&receiver, &dlq_url, limit.unwrap_or(10), 2).await.map_err(anyhow::Error::msg)?;
    log::info!("{} message(s) currently visible on the DLQ", preview.len());

    let options = ReplayOptions {
        limit,
        throttle: Duration::from_secs_f64(throttle_seconds.max(0.0)),
        ..ReplayOptions::default()
    };
    let replayed = replay_dead_letter_queue(&receiver, &sender, &dlq_url, &target_queue_url, options)
        .await
        .map_err(anyhow::Error::msg)?;
    println!("replayed {replayed} message(s)");
    Ok(())
}
