pub mod enrichment;
pub mod error;
pub mod store;
pub mod summarizer;
pub mod vendor;
pub mod workflow;

pub use enrichment::{EnrichmentDispatcher, EnrichmentProvider, EnrichmentRequest, EnrichmentResponse, RawEnrichmentEntry};
pub use error::WorkflowError;
pub use store::{DocumentResultStore, InMemoryDocumentResultStore};
pub use summarizer::{DefaultDocumentSummarizer, DocumentSummarizer, ModelSummary, NullSummaryModelClient, SummaryModelClient};
pub use vendor::{VendorAnalysisService, VendorAnalyzeClient};
pub use workflow::{DocumentIntelligenceWorkflow, ProcessRequest, WorkflowConfig, WorkflowResult};
