use idp_adapters::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("vendor analysis failed after retries: {0}")]
    VendorAnalysisFailed(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("result store failed: {0}")]
    Store(String),
}
