//! Document operations: ingest, delete, query, list. Each is a single upstream call
//! with the organization / knowledge-base metadata applied on the way through.

use crate::client::{FileAttachment, UpstreamClient, UpstreamRequest};
use crate::error::GatewayResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Ingest mode requested from the upstream service.
pub const INGEST_MODE: &str = "fast";

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub organization_id: String,
    pub knowledge_base_id: String,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub partition: Option<String>,
    pub file: FileAttachment,
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "knowledgeBase_id")]
    pub knowledge_base_id: String,
    pub query: String,
}

/// Form fields sent alongside the file: `mode`, `metadata` (a JSON string holding the
/// organization and knowledge-base ids), and the optional fields that are non-empty.
pub fn ingest_form_fields(request: &IngestRequest) -> Map<String, Value> {
    let metadata = json!({
        "organization_id": request.organization_id,
        "knowledgeBase_id": request.knowledge_base_id,
    });

    let mut fields = Map::new();
    fields.insert("mode".into(), Value::String(INGEST_MODE.into()));
    fields.insert("metadata".into(), Value::String(metadata.to_string()));

    let optional = [
        ("external_id", &request.external_id),
        ("name", &request.name),
        ("partition", &request.partition),
    ];
    for (key, value) in optional {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            fields.insert(key.into(), Value::String(v.to_string()));
        }
    }
    fields
}

/// Upload a document with organization / knowledge-base metadata.
pub async fn ingest(client: &UpstreamClient, request: IngestRequest) -> GatewayResult<Value> {
    let fields = ingest_form_fields(&request);
    tracing::info!(
        organization_id = %request.organization_id,
        knowledge_base_id = %request.knowledge_base_id,
        file_name = %request.file.file_name,
        bytes = request.file.bytes.len(),
        "Ingesting document"
    );
    client
        .call(
            UpstreamRequest::post(&["documents"])
                .with_payload(Value::Object(fields))
                .with_file(request.file),
        )
        .await
}

pub async fn delete_document(client: &UpstreamClient, document_id: &str) -> GatewayResult<Value> {
    client
        .call(UpstreamRequest::delete(&["documents", document_id]))
        .await
}

/// Semantic retrieval scoped to one knowledge base. Ranking is the upstream's.
pub async fn query(client: &UpstreamClient, request: &QueryRequest) -> GatewayResult<Value> {
    let payload = json!({
        "filter": { "knowledgeBase_id": request.knowledge_base_id },
        "query": request.query,
    });
    client
        .call(UpstreamRequest::post(&["retrievals"]).with_payload(payload))
        .await
}

/// Metadata filter for listing. An empty knowledge-base id counts as absent.
pub fn document_filter(organization_id: &str, knowledge_base_id: Option<&str>) -> Value {
    let org = json!({ "organization_id": { "$eq": organization_id } });
    match knowledge_base_id.filter(|kb| !kb.is_empty()) {
        Some(kb) => json!({
            "$and": [
                org,
                { "knowledgeBase_id": { "$eq": kb } },
            ]
        }),
        None => org,
    }
}

/// Documents visible to the organization, optionally narrowed to one knowledge base.
pub async fn list_documents(
    client: &UpstreamClient,
    organization_id: &str,
    knowledge_base_id: Option<&str>,
) -> GatewayResult<Vec<Value>> {
    let filter = document_filter(organization_id, knowledge_base_id);
    let response = client
        .call(UpstreamRequest::get(&["documents"]).with_query("filter", filter.to_string()))
        .await?;
    Ok(documents_of(response))
}

/// `documents` array of a listing response; empty when missing or malformed.
fn documents_of(response: Value) -> Vec<Value> {
    match response {
        Value::Object(mut map) => match map.remove("documents") {
            Some(Value::Array(docs)) => docs,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
