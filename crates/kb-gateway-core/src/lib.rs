//! KB Gateway: Core library.
//! Upstream client, document pass-through operations, and knowledge-base aggregation
//! for the document-retrieval gateway.

pub mod client;
pub mod config;
pub mod documents;
pub mod error;
pub mod knowledge_bases;

pub use client::{CallMethod, FileAttachment, UpstreamClient, UpstreamRequest};
pub use config::{ConfigError, GatewayConfig};
pub use documents::{
    delete_document, document_filter, ingest, ingest_form_fields, list_documents, query,
    IngestRequest, QueryRequest,
};
pub use error::{GatewayError, GatewayResult};
pub use knowledge_bases::{
    aggregate, list_knowledge_bases, KnowledgeBaseSummary, UNKNOWN_TIME, UNKNOWN_TITLE,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
