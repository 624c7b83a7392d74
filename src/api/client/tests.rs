use super::*;
use crate::api::error::{MSG_TIMEOUT, STATUS_NETWORK, STATUS_TIMEOUT};
use crate::utils::test_utils::{MockResponse, MockServer};
use serde_json::json;

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.config()).expect("client should build")
}

#[tokio::test]
async fn json_success_is_wrapped_in_envelope() {
    let server = MockServer::one(MockResponse::json(200, json!({"status": "ok"}))).await;
    let client = client_for(&server);

    let response = client
        .request("/health", RequestOptions::default())
        .await
        .expect("request should succeed");

    assert!(response.success);
    assert_eq!(response.error, None);
    assert_eq!(response.data, ResponseBody::Json(json!({"status": "ok"})));
}

#[tokio::test]
async fn non_json_success_is_returned_as_text() {
    let server = MockServer::one(MockResponse::text(200, "pong")).await;
    let client = client_for(&server);

    let response = client
        .request("/ping", RequestOptions::default())
        .await
        .expect("request should succeed");
    assert_eq!(response.data, ResponseBody::Text("pong".to_string()));

    let typed: ApiResponse<String> = client.get("/ping").await.expect("text decodes as string");
    assert_eq!(typed.data, "pong");
}

#[tokio::test]
async fn base_url_and_path_join_with_single_slash() {
    let server = MockServer::one(MockResponse::json(200, json!({}))).await;
    let config = ServiceConfig::try_from(crate::api::config::ServiceSettings {
        base_url: format!("{}/", server.base_url),
        ..Default::default()
    })
    .unwrap();
    let client = ApiClient::new(&config).unwrap();
    assert!(!client.base_url().ends_with('/'));

    let _: ApiResponse<Value> = client.get("/providers").await.unwrap();
    let _: ApiResponse<Value> = client.get("providers").await.unwrap();

    let requests = server.requests().await;
    assert_eq!(requests[0].target, "/providers");
    assert_eq!(requests[1].target, "/providers");
}

#[tokio::test]
async fn default_headers_and_bearer_token_are_sent() {
    let server = MockServer::one(MockResponse::json(200, json!({}))).await;
    let client = client_for(&server);
    client.set_api_key("sk-test");

    let _: ApiResponse<Value> = client.post("/chat", &json!({"message": "hi"})).await.unwrap();

    let request = server.last_request().await;
    assert_eq!(request.method, "POST");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
    assert_eq!(request.json(), json!({"message": "hi"}));
}

#[tokio::test]
async fn clearing_the_key_removes_the_header_entirely() {
    let server = MockServer::one(MockResponse::json(200, json!({}))).await;
    let client = client_for(&server);

    client.set_api_key("sk-test");
    client.clear_api_key();
    let _: ApiResponse<Value> = client.get("/providers").await.unwrap();

    let request = server.last_request().await;
    assert_eq!(request.header("authorization"), None);
    assert!(!client.has_api_key());
}

#[test]
fn caller_headers_override_defaults_and_skip_auth_wins() {
    let config = ServiceConfig::new("http://localhost:8000")
        .unwrap()
        .with_api_key(Some("sk-default".to_string()));
    let client = ApiClient::new(&config).unwrap();

    let overridden = client
        .build_headers(&RequestOptions {
            headers: vec![
                ("content-type".to_string(), "text/plain".to_string()),
                ("X-Trace".to_string(), "abc".to_string()),
            ],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(overridden.get(CONTENT_TYPE).unwrap(), "text/plain");
    assert_eq!(overridden.get("x-trace").unwrap(), "abc");
    assert_eq!(overridden.get(AUTHORIZATION).unwrap(), "Bearer sk-default");

    let skipped = client
        .build_headers(&RequestOptions {
            headers: vec![("Authorization".to_string(), "Bearer caller".to_string())],
            skip_auth: true,
            ..Default::default()
        })
        .unwrap();
    assert!(skipped.get(AUTHORIZATION).is_none());
}

#[tokio::test]
async fn health_check_never_sends_credentials() {
    let server = MockServer::one(MockResponse::json(
        200,
        json!({"status": "healthy", "timestamp": "2025-01-01T00:00:00Z"}),
    ))
    .await;
    let client = client_for(&server);
    client.set_api_key("sk-test");

    let response = client.health().await.unwrap();
    assert_eq!(response.data.status.as_deref(), Some("healthy"));

    let request = server.last_request().await;
    assert_eq!(request.path(), "/health");
    assert_eq!(request.header("authorization"), None);
}

#[tokio::test]
async fn http_error_with_json_message() {
    let server = MockServer::one(MockResponse::json(
        404,
        json!({"message": "not found", "code": "missing"}),
    ))
    .await;
    let client = client_for(&server);

    let err = client.get::<Value>("/providers/x/models").await.unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(err.message, "not found");
    assert_eq!(err.code.as_deref(), Some("missing"));
    assert_eq!(
        err.details,
        Some(json!({"message": "not found", "code": "missing"}))
    );
}

#[tokio::test]
async fn http_error_without_message_uses_status_line() {
    let server = MockServer::one(MockResponse::json(503, json!({"detail": "down"}))).await;
    let client = client_for(&server);

    let err = client.get::<Value>("/providers").await.unwrap_err();
    assert_eq!(err.status, 503);
    assert_eq!(err.message, "HTTP 503: Service Unavailable");
}

#[tokio::test]
async fn http_error_with_text_body() {
    let server = MockServer::start(vec![
        MockResponse::text(500, "kaboom"),
        MockResponse::text(502, ""),
    ])
    .await;
    let client = client_for(&server);

    let err = client.get::<Value>("/a").await.unwrap_err();
    assert_eq!(err.message, "kaboom");
    assert_eq!(err.details, Some(json!({"message": "kaboom"})));

    let err = client.get::<Value>("/b").await.unwrap_err();
    assert_eq!(err.message, "Bad Gateway");
}

#[tokio::test]
async fn unreadable_error_body_falls_back_to_status_text() {
    let server = MockServer::one(MockResponse::text(502, "partial").truncated(64)).await;
    let client = client_for(&server);

    let err = client.get::<Value>("/providers").await.unwrap_err();
    assert_eq!(err.status, 502);
    assert_eq!(err.message, "Bad Gateway");
    assert_eq!(err.details, Some(json!({"message": "Bad Gateway"})));
}

#[tokio::test]
async fn slow_response_times_out_with_408() {
    let server = MockServer::one(
        MockResponse::json(200, json!({})).delayed(Duration::from_millis(800)),
    )
    .await;
    let client = client_for(&server);

    let started = std::time::Instant::now();
    let err = client
        .request(
            "/slow",
            RequestOptions {
                timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.status, STATUS_TIMEOUT);
    assert_eq!(err.message, MSG_TIMEOUT);
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[tokio::test]
async fn connection_failure_is_status_zero() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&ServiceConfig::new(&format!("http://{addr}")).unwrap()).unwrap();
    let err = client.get::<Value>("/health").await.unwrap_err();

    assert_eq!(err.status, STATUS_NETWORK);
    assert!(!err.message.is_empty());
    assert!(err.is_network());
}

#[tokio::test]
async fn query_pairs_are_encoded() {
    let server = MockServer::one(MockResponse::json(200, json!({"chats": []}))).await;
    let client = client_for(&server);

    let _: ApiResponse<Value> = client
        .get_with(
            "/chat/history",
            RequestOptions {
                query: vec![
                    ("page".to_string(), "2".to_string()),
                    ("limit".to_string(), "10".to_string()),
                ],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let request = server.last_request().await;
    assert_eq!(request.path(), "/chat/history");
    assert_eq!(request.query(), Some("page=2&limit=10"));
}

#[tokio::test]
async fn undecodable_payload_is_a_decode_error() {
    let server = MockServer::one(MockResponse::json(200, json!({"unexpected": true}))).await;
    let client = client_for(&server);

    let err = client.get::<Vec<String>>("/providers").await.unwrap_err();
    assert_eq!(err.status, STATUS_NETWORK);
    assert_eq!(err.code.as_deref(), Some("decode_error"));
}
