//! Canonical document schema for the document intelligence ingestion core.
//!
//! This crate owns the provider-agnostic value types every parser adapter emits
//! and every downstream consumer (workflow, denormaliser, enrichment dispatcher)
//! reads. It has no knowledge of routing, queues, or any particular vendor's
//! payload shape — see `idp-router` and `idp-adapters` for those.

pub mod denorm;
pub mod schema;

pub use denorm::{canonical_to_denorm_records, DenormRecord, DenormRecordType};
pub use schema::{
    BoundingRegion, CanonicalDocument, CanonicalTable, CanonicalTableCell, CanonicalTextSpan,
    ConfidenceSignal, DocumentAttachment, DocumentEnrichment, DocumentSummary,
    ExtractionProvenance, PageSegment, StructuredField, VisualDescription, SCHEMA_VERSION,
};
