//! End-to-end request flow through the gateway.

use std::time::Duration;

use gateway_core::config::GatewayConfig;
use gateway_core::routing::FilterConfig;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn proxies_to_backend() {
    let backend = common::start_mock_backend("hello from backend").await;

    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("web", "/", &[backend]));
    let gateway = common::start_gateway(config).await;

    let res = common::client().get(gateway.url("/anything")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-backend"], backend.to_string().as_str());
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hello from backend");
}

#[tokio::test]
async fn unmatched_path_is_404() {
    let backend = common::start_mock_backend("api").await;

    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("api", "/api", &[backend]));
    let gateway = common::start_gateway(config).await;

    let res = common::client().get(gateway.url("/other")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NO_ROUTE");
}

#[tokio::test]
async fn rule_without_backends_is_503() {
    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("empty", "/", &[]));
    let gateway = common::start_gateway(config).await;

    let res = common::client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NO_BACKEND");
}

#[tokio::test]
async fn required_auth() {
    let backend = common::start_mock_backend("secret").await;

    let mut rule = common::rule("private", "/", &[backend]);
    rule.filters.push(FilterConfig::new("auth", json!({ "required": true })));
    let mut config = GatewayConfig::default();
    config.rules.push(rule);
    let gateway = common::start_gateway(config).await;
    let client = common::client();

    let res = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(res.headers()["www-authenticate"], "Bearer");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let res = client
        .get(gateway.url("/"))
        .bearer_auth("token-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "secret");
}

#[tokio::test]
async fn slow_backend_times_out_with_504() {
    let backend = common::start_slow_backend(Duration::from_secs(5)).await;

    let mut rule = common::rule("slow", "/", &[backend]);
    rule.filters.push(FilterConfig::new("proxy", json!({ "timeout_ms": 200 })));
    let mut config = GatewayConfig::default();
    config.rules.push(rule);
    let gateway = common::start_gateway(config).await;

    let res = common::client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 504);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "GATEWAY_TIMEOUT");
}

#[tokio::test]
async fn request_id_reaches_backend_and_client() {
    let backend = common::start_echo_backend().await;

    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("echo", "/", &[backend]));
    let gateway = common::start_gateway(config).await;

    let res = common::client()
        .get(gateway.url("/echo"))
        .header("x-request-id", "trace-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "trace-123");
    assert_eq!(res.text().await.unwrap(), "trace-123");
}

#[tokio::test]
async fn round_robin_across_backends() {
    let a = common::start_mock_backend("a").await;
    let b = common::start_mock_backend("b").await;

    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("web", "/", &[a, b]));
    let gateway = common::start_gateway(config).await;
    let client = common::client();

    let mut bodies = Vec::new();
    for _ in 0..4 {
        let res = client.get(gateway.url("/")).send().await.unwrap();
        bodies.push(res.text().await.unwrap());
    }
    assert_eq!(bodies, vec!["a", "b", "a", "b"]);
}

#[tokio::test]
async fn connection_close_is_honoured() {
    let backend = common::start_mock_backend("bye").await;

    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("web", "/", &[backend]));
    let gateway = common::start_gateway(config).await;

    let res = common::client()
        .get(gateway.url("/"))
        .header("connection", "close")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["connection"], "close");
}

#[tokio::test]
async fn reload_swaps_rules() {
    let old = common::start_mock_backend("old").await;
    let new = common::start_mock_backend("new").await;

    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("v1", "/", &[old]));
    let gateway = common::start_gateway(config).await;
    let client = common::client();

    let res = client.get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "old");

    let mut updated = GatewayConfig::default();
    updated.rules.push(common::rule("v2", "/", &[new]));
    gateway.config_updates.send(updated).unwrap();

    let mut body = String::new();
    for _ in 0..50 {
        body = client.get(gateway.url("/")).send().await.unwrap().text().await.unwrap();
        if body == "new" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(body, "new");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = GatewayConfig::default();
    config.listener.max_body_bytes = 16;
    config.rules.push(common::rule("web", "/", &[backend]));
    let gateway = common::start_gateway(config).await;

    let res = common::client()
        .post(gateway.url("/upload"))
        .body(vec![b'x'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn head_keeps_backend_content_length() {
    let backend = common::start_mock_backend("hello from backend").await;

    let mut config = GatewayConfig::default();
    config.rules.push(common::rule("web", "/", &[backend]));
    let gateway = common::start_gateway(config).await;

    let res = common::client().head(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-length"], "hello from backend".len().to_string().as_str());
}

#[tokio::test]
async fn request_deadline_covers_whole_chain() {
    let backend = common::start_slow_backend(Duration::from_secs(10)).await;

    let mut rule = common::rule("slow", "/", &[backend]);
    rule.filters.push(FilterConfig::new("proxy", json!({ "timeout_ms": 30_000 })));
    let mut config = GatewayConfig::default();
    config.timeouts.request_secs = 1;
    config.rules.push(rule);
    let gateway = common::start_gateway(config).await;

    let started = std::time::Instant::now();
    let res = common::client().get(gateway.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 504);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "GATEWAY_TIMEOUT");
    assert!(started.elapsed() < Duration::from_secs(5));
}
