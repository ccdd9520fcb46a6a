//! Knowledge-base aggregation: knowledge bases are not upstream entities; they are
//! synthesized from the `knowledgeBase_id` metadata of an organization's documents.

use crate::client::UpstreamClient;
use crate::documents::list_documents;
use crate::error::GatewayResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_TIME: &str = "Unknown Time";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseSummary {
    #[serde(rename = "knowledgeBase_id")]
    pub knowledge_base_id: String,
    pub title: String,
    pub creation_time: String,
}

/// One summary per distinct `metadata.knowledgeBase_id`, in first-seen order. The first
/// document seen for an id supplies its title and creation time.
pub fn aggregate(documents: &[Value]) -> Vec<KnowledgeBaseSummary> {
    let mut seen = HashSet::new();
    let mut summaries = Vec::new();

    for doc in documents {
        let Some(metadata) = doc.get("metadata").and_then(Value::as_object) else {
            continue;
        };
        let Some(kb_id) = metadata
            .get("knowledgeBase_id")
            .filter(|v| is_truthy(v))
            .and_then(text_of)
        else {
            continue;
        };
        if !seen.insert(kb_id.clone()) {
            continue;
        }
        summaries.push(KnowledgeBaseSummary {
            knowledge_base_id: kb_id,
            title: metadata
                .get("kb_title")
                .and_then(text_of)
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            creation_time: metadata
                .get("kb_creation_time")
                .and_then(text_of)
                .unwrap_or_else(|| UNKNOWN_TIME.to_string()),
        });
    }
    summaries
}

// Only null counts as missing; non-string values keep their JSON text.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// Ids that are null, false, zero or empty name no knowledge base.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Knowledge bases of an organization. Aborts without partial result when the
/// document listing fails.
pub async fn list_knowledge_bases(
    client: &UpstreamClient,
    organization_id: &str,
) -> GatewayResult<Vec<KnowledgeBaseSummary>> {
    let documents = list_documents(client, organization_id, None).await?;
    let summaries = aggregate(&documents);
    tracing::info!(
        organization_id = %organization_id,
        documents = documents.len(),
        knowledge_bases = summaries.len(),
        "Aggregated knowledge bases"
    );
    Ok(summaries)
}
