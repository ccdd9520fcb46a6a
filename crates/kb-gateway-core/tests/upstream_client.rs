//! Upstream client against a simulated document-retrieval API.
//!
//! Run with: `cargo test -p kb_gateway_core --test upstream_client`

use kb_gateway_core::{FileAttachment, GatewayConfig, UpstreamClient, UpstreamRequest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> UpstreamClient {
    UpstreamClient::new(&GatewayConfig::new(server.uri(), "test-token"))
}

#[tokio::test]
async fn get_sends_auth_accept_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", "application/json"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "documents": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client_for(&server)
        .call(UpstreamRequest::get(&["documents"]).with_query("page", "2"))
        .await
        .expect("get succeeds");
    assert_eq!(value, json!({ "documents": [] }));
}

#[tokio::test]
async fn post_without_file_sends_json_body() {
    let server = MockServer::start().await;
    let payload = json!({ "query": "what is lung cancer?" });
    Mock::given(method("POST"))
        .and(path("/retrievals"))
        .and(header("content-type", "application/json"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scored_chunks": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client_for(&server)
        .call(UpstreamRequest::post(&["retrievals"]).with_payload(payload))
        .await
        .expect("post succeeds");
    assert_eq!(value["scored_chunks"], json!([]));
}

#[tokio::test]
async fn post_with_file_sends_multipart_with_boundary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "doc-1" })))
        .mount(&server)
        .await;

    let file = FileAttachment {
        file_name: "notes.txt".into(),
        content_type: "text/plain".into(),
        bytes: b"hello upstream".to_vec(),
    };
    let value = client_for(&server)
        .call(
            UpstreamRequest::post(&["documents"])
                .with_payload(json!({ "mode": "fast", "count": 3 }))
                .with_file(file),
        )
        .await
        .expect("upload succeeds");
    assert_eq!(value["id"], "doc-1");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"mode\"\r\n\r\nfast\r\n"));
    assert!(body.contains("name=\"count\"\r\n\r\n3\r\n"));
    assert!(body.contains("name=\"file\"; filename=\"notes.txt\""));
    assert!(body.contains("Content-Type: text/plain"));
    assert!(body.contains("hello upstream"));
}

#[tokio::test]
async fn empty_success_body_is_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/documents/doc-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let value = client_for(&server)
        .call(UpstreamRequest::delete(&["documents", "doc-1"]))
        .await
        .expect("delete succeeds");
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn whitespace_body_is_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .mount(&server)
        .await;

    let value = client_for(&server)
        .call(UpstreamRequest::get(&["documents"]))
        .await
        .expect("get succeeds");
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn non_2xx_keeps_status_and_json_detail() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/documents/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Document not found" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call(UpstreamRequest::delete(&["documents", "missing"]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, 404);
    assert!(err.message.contains("Document not found"));
    assert!(err.message.starts_with("Error from upstream API:"));
}

#[tokio::test]
async fn non_2xx_falls_back_to_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call(UpstreamRequest::post(&["retrievals"]).with_payload(json!({})))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, 503);
    assert!(err.message.contains("upstream overloaded"));
}

#[tokio::test]
async fn success_with_non_json_body_is_502() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call(UpstreamRequest::get(&["documents"]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, 502);
}

#[tokio::test]
async fn unreachable_upstream_is_500() {
    let client = UpstreamClient::new(&GatewayConfig::new("http://127.0.0.1:1", "test-token"));
    let err = client
        .call(UpstreamRequest::get(&["documents"]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code, 500);
    assert!(err.message.starts_with("Error from upstream API:"));
}
