//! Vendor parser adapters: pure `payload -> CanonicalDocument` transforms, one
//! per upstream extraction source, plus an ensemble adapter that fans out to a
//! named registry of them and merges the results.

pub mod azure;
pub mod base;
pub mod email;
pub mod ensemble;
pub mod structural_pdf;
pub mod vision;

pub use azure::AzureDocumentIntelligenceAdapter;
pub use base::{
    camel_to_snake, get_array, get_f64_list, get_field, get_str, get_u32, normalise_confidence,
    snake_to_camel, AdapterError, ParserAdapter,
};
pub use email::EmailParserAdapter;
pub use ensemble::EnsembleAdapter;
pub use structural_pdf::StructuralPdfAdapter;
pub use vision::VisionAdapter;
