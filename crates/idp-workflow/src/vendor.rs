//! A thin retrying wrapper around a vendor document-analysis client (e.g.
//! Azure Document Intelligence), matching the reference service's linear
//! backoff: `retry_backoff_seconds * attempt` between attempts.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Capability trait for a vendor analysis client. `analyze` submits raw
/// document bytes and returns the vendor's analyze-result payload.
#[async_trait]
pub trait VendorAnalyzeClient: Send + Sync {
    async fn analyze(&self, document: &[u8], content_type: Option<&str>) -> Result<Value, String>;
}

pub struct VendorAnalysisService {
    client: Box<dyn VendorAnalyzeClient>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl VendorAnalysisService {
    #[must_use]
    pub fn new(client: Box<dyn VendorAnalyzeClient>, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            client,
            max_retries,
            retry_backoff,
        }
    }

    pub async fn analyze(&self, document: &[u8], content_type: Option<&str>) -> Result<Value, String> {
        let mut attempt = 0u32;
        loop {
            match self.client.analyze(document, content_type).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        log::error!("vendor analysis failed after {attempt} attempts: {err}");
                        return Err(err);
                    }
                    let sleep_for = self.retry_backoff * attempt;
                    log::warn!("vendor analysis call failed ({err}); retrying in {sleep_for:?}");
                    tokio::time::sleep(sleep_for).await;
                }
            }
        }
    }
}
