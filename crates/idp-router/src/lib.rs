pub mod error;
pub mod layout;
pub mod mime;
pub mod model;
pub mod overrides;
pub mod resolver;
pub mod router;

pub use error::RouterError;
pub use layout::{
    EmailStructuralLayoutAnalyser, HeuristicLayoutAnalyser, LayoutAnalyser, LayoutModelClient, ModelBackedLayoutAnalyser,
    NullLayoutModelClient, NullPdfStructuralSource, PdfStructuralLayoutAnalyser, PdfStructuralSource, ReqwestLayoutModelClient,
};
pub use model::{
    DocumentAnalysis, DocumentCategory, DocumentDescriptor, DocumentProfile, OverrideSet, PageMetrics, ParserStrategy,
    PatternOverride, RouterConfig, RoutingMode, StrategyConfig,
};
pub use overrides::{EnvSource, NullSecretSource, NullTableSource, OverrideProvider, SecretSource, TableSource};
pub use resolver::{ContentResolver, InlineContentResolver, NullObjectStore, ObjectStore, ObjectStoreContentResolver, ResolverChain};
pub use router::DocumentRouter;
