use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use genspark_proxy::config::{CookiePool, ProxyConfig};
use genspark_proxy::server::{routes, AppState};
use genspark_proxy::upstream::{ASK_PATH, DELETE_PATH, UPLOAD_SLOT_PATH};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIE: &str = "session_id=test";
const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

const STREAM_BODY: &str = concat!(
    "data: {\"type\":\"project_start\",\"id\":\"p1\"}\n\n",
    "data: {\"type\":\"message_field_delta\",\"field_name\":\"session_state.answer\",\"delta\":\"Hel\"}\n\n",
    "data: {\"type\":\"message_field_delta\",\"field_name\":\"session_state.steps\",\"delta\":\"thinking\"}\n\n",
    "data: {\"type\":\"message_field_delta\",\"field_name\":\"session_state.answer\",\"delta\":\"lo\"}\n\n",
    "data: {\"type\":\"message_result\",\"content\":\"Hello\"}\n\n",
);

struct Reply {
    status: StatusCode,
    content_type: String,
    body: String,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// Payloads of the `data: ...` frames, in order.
    fn frames(&self) -> Vec<&str> {
        self.body
            .split("\n\n")
            .filter(|f| !f.is_empty())
            .map(|f| f.strip_prefix("data: ").unwrap())
            .collect()
    }
}

fn config(base_url: &str, auto_delete_chat: bool) -> ProxyConfig {
    ProxyConfig {
        port: 0,
        base_url: base_url.to_string(),
        request_timeout_secs: 30,
        auto_delete_chat,
        cookies: CookiePool::new([COOKIE]),
        models: vec!["gpt-4o".to_string(), "o1".to_string()],
    }
}

async fn send(config: ProxyConfig, req: test::TestRequest) -> Reply {
    let state = AppState::new(config).unwrap();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = test::read_body(resp).await;

    Reply {
        status,
        content_type,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

fn chat(body: Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/v1/chat/completions")
        .set_json(body)
}

async fn requests_to(server: &MockServer, request_path: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .collect()
}

async fn ask_body(server: &MockServer) -> Value {
    let asks = requests_to(server, ASK_PATH).await;
    assert_eq!(asks.len(), 1);
    serde_json::from_slice(&asks[0].body).unwrap()
}

/// Deletes run on a background task; give it a moment.
async fn wait_for_delete(server: &MockServer) -> Option<wiremock::Request> {
    for _ in 0..100 {
        if let Some(r) = requests_to(server, DELETE_PATH).await.into_iter().next() {
            return Some(r);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

async fn mount_result(server: &MockServer, content: &str) {
    let body = format!(
        "data: {{\"type\":\"project_start\",\"id\":\"p9\"}}\n\ndata: {{\"type\":\"message_result\",\"content\":\"{}\"}}\n\n",
        content
    );
    Mock::given(method("POST"))
        .and(path(ASK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

#[actix_web::test]
async fn health_returns_ok() {
    let server = MockServer::start().await;
    let reply = send(
        config(&server.uri(), false),
        test::TestRequest::get().uri("/health"),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "OK");
}

#[actix_web::test]
async fn models_lists_configured_ids() {
    let server = MockServer::start().await;
    let reply = send(
        config(&server.uri(), false),
        test::TestRequest::get().uri("/v1/models"),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json(),
        json!({
            "object": "list",
            "data": [
                {"id": "gpt-4o", "object": "model"},
                {"id": "o1", "object": "model"}
            ]
        })
    );
}

#[actix_web::test]
async fn streaming_translates_deltas_and_deletes_project() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ASK_PATH))
        .and(header("accept", "text/event-stream"))
        .and(header("cookie", COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_raw(STREAM_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DELETE_PATH))
        .and(query_param("project_id", "p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 0})))
        .mount(&server)
        .await;

    let reply = send(
        config(&server.uri(), true),
        chat(json!({
            "model": "gpt-4o",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}]
        })),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.content_type.starts_with("text/event-stream"));

    let frames = reply.frames();
    assert_eq!(frames.len(), 4, "frames: {:?}", frames);

    let chunks: Vec<Value> = frames[..3]
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .collect();
    assert_eq!(chunks[0]["object"], "chat.completion.chunk");
    assert_eq!(chunks[0]["model"], "gpt-4o");
    assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "Hel");
    assert!(chunks[0]["choices"][0]["finish_reason"].is_null());
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "lo");
    assert_eq!(chunks[2]["choices"][0]["delta"], json!({}));
    assert_eq!(chunks[2]["choices"][0]["finish_reason"], "stop");
    assert_eq!(chunks[0]["id"], chunks[2]["id"]);
    assert_eq!(frames[3], "[DONE]");

    let delete = wait_for_delete(&server).await.expect("delete call");
    assert_eq!(
        delete.headers.get("cookie").and_then(|v| v.to_str().ok()),
        Some(COOKIE)
    );
}

#[actix_web::test]
async fn streaming_without_auto_delete_leaves_project() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ASK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(STREAM_BODY, "text/event-stream"))
        .mount(&server)
        .await;

    let reply = send(
        config(&server.uri(), false),
        chat(json!({
            "model": "gpt-4o",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}]
        })),
    )
    .await;
    assert_eq!(reply.frames().last().copied(), Some("[DONE]"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(requests_to(&server, DELETE_PATH).await.is_empty());
}

#[actix_web::test]
async fn non_streaming_aggregates_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ASK_PATH))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(STREAM_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let reply = send(
        config(&server.uri(), false),
        chat(json!({
            "model": "claude-3-5-sonnet",
            "messages": [{"role": "user", "content": "hi"}]
        })),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "claude-3-5-sonnet");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
}

#[actix_web::test]
async fn non_streaming_without_result_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ASK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\":\"project_start\",\"id\":\"p1\"}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let reply = send(
        config(&server.uri(), false),
        chat(json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json(), json!({"error": "No valid response content"}));
}

#[actix_web::test]
async fn upstream_error_status_surfaces_as_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ASK_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let reply = send(
        config(&server.uri(), true),
        chat(json!({
            "model": "gpt-4o",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}]
        })),
    )
    .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = reply.json()["error"].as_str().unwrap().to_string();
    assert!(error.contains("500"), "error: {}", error);
    assert!(requests_to(&server, DELETE_PATH).await.is_empty());
}

#[actix_web::test]
async fn url_image_is_inlined_as_jpeg_data_uri() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG))
        .mount(&server)
        .await;
    mount_result(&server, "a cat").await;

    let image_url = format!("{}/cat.jpg", server.uri());
    let reply = send(
        config(&server.uri(), false),
        chat(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "describe images"},
                {"role": "user", "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": image_url}}
                ]}
            ]
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let ask = ask_body(&server).await;
    assert_eq!(ask["type"], "COPILOT_MOA_CHAT");
    assert_eq!(ask["extra_data"]["models"], json!(["gpt-4o"]));
    assert_eq!(ask["messages"][0], json!({"role": "system", "content": "describe images"}));
    assert_eq!(
        ask["messages"][1]["content"][0],
        json!({"type": "text", "text": "what is this?"})
    );
    assert_eq!(
        ask["messages"][1]["content"][1]["image_url"]["url"],
        format!("data:image/jpeg;base64,{}", STANDARD.encode(JPEG))
    );
    assert!(requests_to(&server, UPLOAD_SLOT_PATH).await.is_empty());
}

#[actix_web::test]
async fn large_inline_image_is_accepted_and_inlined() {
    let server = MockServer::start().await;
    mount_result(&server, "a big cat").await;

    let mut jpeg = JPEG.to_vec();
    jpeg.resize(2_000_000, 0x42);
    let reference = format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg));

    let reply = send(
        config(&server.uri(), false),
        chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": reference}}
            ]}]
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "body: {}", reply.body);

    let ask = ask_body(&server).await;
    assert_eq!(
        ask["messages"][0]["content"][0]["image_url"]["url"],
        reference.as_str()
    );
}

#[actix_web::test]
async fn non_image_attachment_is_uploaded_as_private_file() {
    let server = MockServer::start().await;
    let pdf = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n1 0 obj\n".to_vec();

    Mock::given(method("GET"))
        .and(path(UPLOAD_SLOT_PATH))
        .and(header("cookie", COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "upload_image_url": format!("{}/blob/f1?sig=x", server.uri()),
                "private_storage_url": "https://storage.example.com/f1"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/blob/f1"))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_result(&server, "a document").await;

    let reference = format!("data:application/pdf;base64,{}", STANDARD.encode(&pdf));
    let reply = send(
        config(&server.uri(), false),
        chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": reference}}
            ]}]
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let uploads = requests_to(&server, "/blob/f1").await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].body, pdf);

    let ask = ask_body(&server).await;
    assert_eq!(
        ask["messages"][0]["content"][0],
        json!({
            "type": "private_file",
            "private_file": {
                "name": "file",
                "type": "application/pdf",
                "size": pdf.len(),
                "ext": "pdf",
                "private_storage_url": "https://storage.example.com/f1"
            }
        })
    );
}

#[actix_web::test]
async fn unreachable_image_is_forwarded_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_result(&server, "no image").await;

    let image_url = format!("{}/missing.png", server.uri());
    let reply = send(
        config(&server.uri(), false),
        chat(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": [
                {"type": "image_url", "image_url": {"url": image_url}}
            ]}]
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let ask = ask_body(&server).await;
    assert_eq!(ask["messages"][0]["content"][0]["image_url"]["url"], image_url);
}

#[actix_web::test]
async fn missing_cookies_is_503() {
    let server = MockServer::start().await;
    let mut config = config(&server.uri(), false);
    config.cookies = CookiePool::default();

    let reply = send(
        config,
        chat(json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(reply.json()["error"].is_string());
    assert!(requests_to(&server, ASK_PATH).await.is_empty());
}

#[actix_web::test]
async fn malformed_request_is_400_json() {
    let server = MockServer::start().await;
    let reply = send(
        config(&server.uri(), false),
        chat(json!({"messages": "not a list"})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].is_string());
}
