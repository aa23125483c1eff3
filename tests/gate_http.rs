//! End-to-end behavior of a gated endpoint, driven through the router.

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ALLOW, CACHE_CONTROL, CONTENT_LENGTH,
    CONTENT_TYPE, ORIGIN,
};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use rest_bridge::gate::VerificationConfig;
use rest_bridge::http::response::NO_CACHE;
use rest_bridge::http::X_REQUEST_ID;

mod common;
use common::{body_string, connect_from, post, server_with, signed_uri, RecordingForwarder, Reply};

const CLIENT: &str = "10.0.0.5:41000";

fn signed_config() -> VerificationConfig {
    VerificationConfig {
        key: Some(b"k1".to_vec()),
        secret: Some(b"s".to_vec()),
        timestamp_delta_limit: 300,
        ..VerificationConfig::default()
    }
}

#[tokio::test]
async fn test_unsigned_post_reaches_forwarder() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder.clone()).router();

    let response = app
        .oneshot(post("/publish", r#"{"topic":"t","args":[1]}"#, CLIENT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    assert_eq!(response.headers()[CACHE_CONTROL], NO_CACHE);
    let events = forwarder.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(serde_json::Value::Object(events[0].clone()), json!({"topic": "t", "args": [1]}));
}

#[tokio::test]
async fn test_preflight_ignores_configuration() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let config = VerificationConfig {
        require_tls: true,
        require_ip: vec!["192.168.0.0/16".parse().unwrap()],
        post_body_limit: 1,
        ..signed_config()
    };
    let app = server_with("/publish", config, forwarder.clone()).router();

    let mut request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/publish")
        .header(ORIGIN, "https://app.example")
        .header(ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    connect_from(&mut request, CLIENT);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[ALLOW], "POST,PUT,OPTIONS");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST,PUT,OPTIONS");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
    assert_eq!(body_string(response).await, "");
    assert_eq!(forwarder.count(), 0);
}

#[tokio::test]
async fn test_other_methods_rejected_with_common_headers() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder).router();

    let mut request = Request::builder().method(Method::GET).uri("/publish").body(Body::empty()).unwrap();
    connect_from(&mut request, CLIENT);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(
        body_string(response).await,
        "HTTP/GET not allowed (only HTTP/POST or HTTP/PUT)\n"
    );
}

#[tokio::test]
async fn test_put_is_accepted() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder.clone()).router();

    let mut request = post("/publish", "{}", CLIENT);
    *request.method_mut() = Method::PUT;
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(forwarder.count(), 1);
}

#[tokio::test]
async fn test_signed_request_ip_policy() {
    let body = r#"{"topic":"t","args":[1]}"#;
    let config = VerificationConfig {
        require_ip: vec!["10.0.0.0/24".parse().unwrap()],
        ..signed_config()
    };
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", config, forwarder.clone()).router();

    let allowed = app
        .clone()
        .oneshot(post(&signed_uri("/publish", "k1", "s", body), body, "10.0.0.5:41000"))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    let denied = app
        .oneshot(post(&signed_uri("/publish", "k1", "s", body), body, "10.0.1.5:41000"))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(denied).await, "request denied based on IP address\n");
    assert_eq!(forwarder.count(), 1);
}

#[tokio::test]
async fn test_signed_endpoint_requires_fields() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", signed_config(), forwarder.clone()).router();

    let response = app.oneshot(post("/publish", "{}", CLIENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("mandatory"));
    assert_eq!(forwarder.count(), 0);
}

#[tokio::test]
async fn test_wrong_secret_is_unauthorized() {
    let body = "{}";
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", signed_config(), forwarder.clone()).router();

    let response = app
        .oneshot(post(&signed_uri("/publish", "k1", "not-s", body), body, CLIENT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, "invalid request signature\n");
    assert_eq!(forwarder.count(), 0);
}

#[tokio::test]
async fn test_length_mismatch_beats_valid_signature() {
    let body = "{}";
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", signed_config(), forwarder.clone()).router();

    let mut request = post(&signed_uri("/publish", "k1", "s", body), body, CLIENT);
    request.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(3u64));
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("different to Content-Length"));
    assert_eq!(forwarder.count(), 0);
}

#[tokio::test]
async fn test_body_limit_checked_before_signature() {
    let config = VerificationConfig {
        post_body_limit: 4,
        ..signed_config()
    };
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", config, forwarder).router();

    let response = app.oneshot(post("/publish", r#"{"a":1}"#, CLIENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_payload_decoding() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder.clone()).router();

    let invalid_utf8 = app
        .clone()
        .oneshot(post("/publish", vec![b'"', 0xff, 0xfe, b'"'], CLIENT))
        .await
        .unwrap();
    assert_eq!(invalid_utf8.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(invalid_utf8).await.contains("invalid UTF-8"));

    let not_json = app.clone().oneshot(post("/publish", "hello", CLIENT)).await.unwrap();
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(not_json).await.contains("must be valid JSON"));

    let array = app.oneshot(post("/publish", "[1,2]", CLIENT)).await.unwrap();
    assert_eq!(array.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(array).await.contains("must be a JSON dict"));

    assert_eq!(forwarder.count(), 0);
}

#[tokio::test]
async fn test_wrong_content_type() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder).router();

    let mut request = post("/publish", "{}", CLIENT);
    request.headers_mut().insert(CONTENT_TYPE, "text/plain".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("bad content type"));
}

#[tokio::test]
async fn test_deferred_forward_completes_response() {
    let forwarder = RecordingForwarder::new(Reply::Deferred);
    let app = server_with("/call", VerificationConfig::default(), forwarder.clone()).router();

    let response = app.oneshot(post("/call", r#"{"procedure":"p"}"#, CLIENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"{"procedure":"p"}"#);
}

#[tokio::test]
async fn test_deferred_forward_failure_is_internal_error() {
    let forwarder = RecordingForwarder::new(Reply::DeferredFailure);
    let app = server_with("/call", VerificationConfig::default(), forwarder).router();

    let response = app.oneshot(post("/call", "{}", CLIENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(body_string(response).await, "Unhandled server error.\n");
}

#[tokio::test]
async fn test_tls_required_on_plain_connection() {
    let config = VerificationConfig {
        require_tls: true,
        ..VerificationConfig::default()
    };
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", config, forwarder).router();

    let response = app.oneshot(post("/publish", "{}", CLIENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "request denied because not using TLS\n");
}

/// A JSON object body of roughly `size` bytes.
fn oversized_body(size: usize) -> String {
    format!(r#"{{"pad":"{}"}}"#, "a".repeat(size))
}

#[tokio::test]
async fn test_preflight_with_oversized_body() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder).router();

    let mut request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/publish")
        .body(Body::from(oversized_body(3 * 1024 * 1024)))
        .unwrap();
    connect_from(&mut request, CLIENT);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ALLOW], "POST,PUT,OPTIONS");
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_get_with_oversized_body_is_method_not_allowed() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder).router();

    let mut request = Request::builder()
        .method(Method::GET)
        .uri("/publish")
        .body(Body::from(oversized_body(3 * 1024 * 1024)))
        .unwrap();
    connect_from(&mut request, CLIENT);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_zero_body_limit_reads_past_listener_cap() {
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", VerificationConfig::default(), forwarder.clone()).router();

    let response = app
        .oneshot(post("/publish", oversized_body(3 * 1024 * 1024), CLIENT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(forwarder.count(), 1);
}

#[tokio::test]
async fn test_listener_cap_applies_when_endpoint_is_limited() {
    let config = VerificationConfig {
        post_body_limit: 1024,
        ..VerificationConfig::default()
    };
    let forwarder = RecordingForwarder::new(Reply::Immediate);
    let app = server_with("/publish", config, forwarder.clone()).router();

    let response = app
        .oneshot(post("/publish", oversized_body(3 * 1024 * 1024), CLIENT))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(forwarder.count(), 0);
}

#[tokio::test]
async fn test_forwarder_panic_is_internal_error() {
    let forwarder = RecordingForwarder::new(Reply::Panic);
    let app = server_with("/publish", VerificationConfig::default(), forwarder).router();

    let response = app.oneshot(post("/publish", "{}", CLIENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(body_string(response).await, "Unhandled server error.\n");
}
