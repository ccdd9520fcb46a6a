//! Upstream client: one outbound call to the document-retrieval API per invocation.
//! Bearer auth from config, JSON or multipart bodies, latency logging, unified errors.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{Duration, Instant};

const JSON_MIME: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMethod {
    Get,
    Post,
    Delete,
}

impl fmt::Display for CallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallMethod::Get => "GET",
            CallMethod::Post => "POST",
            CallMethod::Delete => "DELETE",
        })
    }
}

/// File part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Description of one upstream call. Path segments are appended to the base URL
/// and percent-encoded individually.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: CallMethod,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub payload: Option<Value>,
    pub file: Option<FileAttachment>,
}

impl UpstreamRequest {
    pub fn new(method: CallMethod, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            payload: None,
            file: None,
        }
    }

    pub fn get(segments: &[&str]) -> Self {
        Self::new(CallMethod::Get, segments)
    }

    pub fn post(segments: &[&str]) -> Self {
        Self::new(CallMethod::Post, segments)
    }

    pub fn delete(segments: &[&str]) -> Self {
        Self::new(CallMethod::Delete, segments)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// JSON body, or the text fields of the form when a file is attached.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.file = Some(file);
        self
    }
}

/// Client for the upstream document-retrieval API. Cheap to clone; clones share
/// the connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: String,
    api_token: String,
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &GatewayConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: config.base_url().to_string(),
            api_token: config.api_token.clone(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform the call and normalize the outcome: parsed JSON on success, `{}` for an
    /// empty body, `GatewayError` carrying the upstream status otherwise.
    pub async fn call(&self, request: UpstreamRequest) -> GatewayResult<Value> {
        let url = self.url_for(&request.segments)?;
        let method = request.method;
        let builder = self.build(url.clone(), request)?;

        let start = Instant::now();
        let outcome = Self::execute(builder).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                tracing::info!(
                    target: "kb_gateway::upstream",
                    url = %url,
                    method = %method,
                    elapsed_ms,
                    "Upstream request completed"
                );
                if let Some(size) = value.as_ref().map(response_chars) {
                    tracing::info!(target: "kb_gateway::upstream", size, "Upstream response size (characters)");
                }
                Ok(value.unwrap_or_else(|| Value::Object(Map::new())))
            }
            Err(err) => {
                tracing::warn!(
                    target: "kb_gateway::upstream",
                    url = %url,
                    method = %method,
                    elapsed_ms,
                    status = err.status_code,
                    "Upstream request FAILED"
                );
                Err(err)
            }
        }
    }

    fn url_for(&self, segments: &[String]) -> GatewayResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            GatewayError::new(
                GatewayError::UNREACHABLE_STATUS,
                format!("Invalid upstream base URL {}: {}", self.base_url, e),
            )
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::new(
                    GatewayError::UNREACHABLE_STATUS,
                    format!("Upstream base URL cannot take a path: {}", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn build(
        &self,
        url: reqwest::Url,
        request: UpstreamRequest,
    ) -> GatewayResult<reqwest::RequestBuilder> {
        let builder = match request.method {
            CallMethod::Get => self.http.get(url),
            CallMethod::Post => self.http.post(url),
            CallMethod::Delete => self.http.delete(url),
        }
        .bearer_auth(&self.api_token)
        .header(ACCEPT, JSON_MIME);

        let builder = if request.query.is_empty() {
            builder
        } else {
            builder.query(&request.query)
        };

        let builder = match (request.method, request.file) {
            // multipart: the transport writes Content-Type with the boundary
            (CallMethod::Post, Some(file)) => {
                builder.multipart(multipart_form(request.payload.as_ref(), file)?)
            }
            (CallMethod::Post, None) => builder
                .header(CONTENT_TYPE, JSON_MIME)
                .json(&request.payload.unwrap_or_else(|| Value::Object(Map::new()))),
            _ => builder.header(CONTENT_TYPE, JSON_MIME),
        };
        Ok(builder)
    }

    /// `Ok(None)` when the upstream answered 2xx with an empty body.
    async fn execute(builder: reqwest::RequestBuilder) -> GatewayResult<Option<Value>> {
        let res = builder
            .send()
            .await
            .map_err(|e| GatewayError::transport(&e))?;
        let status = res.status();
        let text = res.text().await.map_err(|e| GatewayError::transport(&e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .map(|v| v.to_string())
                .unwrap_or(text);
            return Err(GatewayError::upstream(status.as_u16(), detail));
        }

        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(GatewayError::invalid_response)
    }
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn response_chars(value: &Value) -> usize {
    value.to_string().chars().count()
}

/// Form fields from the payload object (strings verbatim, other values as JSON text)
/// plus the `file` part.
fn multipart_form(payload: Option<&Value>, file: FileAttachment) -> GatewayResult<Form> {
    let mut form = Form::new();
    if let Some(fields) = payload.and_then(Value::as_object) {
        for (key, value) in fields {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form = form.text(key.clone(), text);
        }
    }
    let part = Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&file.content_type)
        .map_err(|e| {
            GatewayError::invalid_request(format!(
                "Invalid file content type {}: {}",
                file.content_type, e
            ))
        })?;
    Ok(form.part("file", part))
}
