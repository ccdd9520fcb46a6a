//! KB Gateway: HTTP front for the document-retrieval API.
//! Ingest, delete, query and list documents; knowledge bases synthesized from document metadata.

use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use kb_gateway_core::{
    FileAttachment, GatewayConfig, GatewayError, IngestRequest, KnowledgeBaseSummary,
    QueryRequest, UpstreamClient,
};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILE_NAME: &str = "upload";
const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

struct AppState {
    client: UpstreamClient,
}

#[derive(Deserialize)]
struct ListDocumentsParams {
    organization_id: String,
    #[serde(default, rename = "knowledgeBase_id")]
    knowledge_base_id: Option<String>,
}

#[derive(Deserialize)]
struct KnowledgeBaseParams {
    organization_id: String,
}

/// `GatewayError` rendered as `{"detail": ...}` with its status code.
struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "detail": self.0.message }))).into_response()
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[kb-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("[kb-gateway] {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        client: UpstreamClient::new(&config),
    });
    let app = router(state, config.max_upload_bytes);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("[kb-gateway] cannot bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "[kb-gateway] v{} listening on {} (upstream {})",
        kb_gateway_core::version(),
        config.bind_addr,
        config.base_url()
    );

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("[kb-gateway] server error: {}", e);
        std::process::exit(1);
    }
}

fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest_handler))
        .route("/documents", get(list_documents_handler))
        .route("/documents/:document_id", delete(delete_document_handler))
        .route("/query", post(query_handler))
        .route("/knowledge-bases", get(list_knowledge_bases_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_traffic))
}

async fn log_traffic(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        target: "kb_gateway::http",
        %method,
        %path,
        %peer,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

async fn health() -> &'static str {
    "OK"
}

/// POST /ingest: multipart form (organization_id, knowledgeBase_id, optional
/// external_id / name / partition, file) forwarded as a document upload.
async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart =
        multipart.map_err(|e| GatewayError::invalid_request(e.body_text()))?;

    let mut organization_id = None;
    let mut knowledge_base_id = None;
    let mut external_id = None;
    let mut name = None;
    let mut partition = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        GatewayError::invalid_request(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        if field_name == "file" {
            let file_name = field
                .file_name()
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_FILE_NAME)
                .to_string();
            let content_type = field
                .content_type()
                .unwrap_or(DEFAULT_FILE_CONTENT_TYPE)
                .to_string();
            let bytes = field.bytes().await.map_err(|e| {
                GatewayError::invalid_request(format!("Failed to read file data: {}", e))
            })?;
            file = Some(FileAttachment {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let slot = match field_name.as_str() {
            "organization_id" => &mut organization_id,
            "knowledgeBase_id" => &mut knowledge_base_id,
            "external_id" => &mut external_id,
            "name" => &mut name,
            "partition" => &mut partition,
            _ => continue,
        };
        let text = field.text().await.map_err(|e| {
            GatewayError::invalid_request(format!("Failed to read field {}: {}", field_name, e))
        })?;
        *slot = Some(text);
    }

    let request = IngestRequest {
        organization_id: required(organization_id, "organization_id")?,
        knowledge_base_id: required(knowledge_base_id, "knowledgeBase_id")?,
        external_id,
        name,
        partition,
        file: file.ok_or_else(|| GatewayError::invalid_request("Missing form field: file"))?,
    };

    let result = kb_gateway_core::ingest(&state.client, request).await?;
    Ok(Json(result))
}

fn required(value: Option<String>, field: &str) -> Result<String, GatewayError> {
    value.ok_or_else(|| GatewayError::invalid_request(format!("Missing form field: {}", field)))
}

/// DELETE /documents/:document_id
async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let result = kb_gateway_core::delete_document(&state.client, &document_id).await?;
    Ok(Json(result))
}

/// POST /query: `{knowledgeBase_id, query}` → upstream retrieval result.
async fn query_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body.map_err(|e| GatewayError::invalid_request(e.body_text()))?;
    let result = kb_gateway_core::query(&state.client, &request).await?;
    Ok(Json(result))
}

/// GET /documents?organization_id=..&knowledgeBase_id=..
async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListDocumentsParams>, QueryRejection>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let Query(params) = params.map_err(|e| GatewayError::invalid_request(e.body_text()))?;
    let documents = kb_gateway_core::list_documents(
        &state.client,
        &params.organization_id,
        params.knowledge_base_id.as_deref(),
    )
    .await?;
    Ok(Json(documents))
}

/// GET /knowledge-bases?organization_id=..
async fn list_knowledge_bases_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<KnowledgeBaseParams>, QueryRejection>,
) -> Result<Json<Vec<KnowledgeBaseSummary>>, ApiError> {
    let Query(params) = params.map_err(|e| GatewayError::invalid_request(e.body_text()))?;
    let summaries =
        kb_gateway_core::list_knowledge_bases(&state.client, &params.organization_id).await?;
    Ok(Json(summaries))
}
