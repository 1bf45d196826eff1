mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::*;
use request_gate::auth::{sign_stripe_payload, unix_now};
use request_gate::http::GateServer;

fn app(h: &Harness) -> Router {
    GateServer::build_router(&h.config, h.pipeline.clone())
}

fn get(path: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri(path)
        .header(header::USER_AGENT, BROWSER_UA)
        .header("x-forwarded-for", "198.51.100.20")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_a_public_route() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
    assert_eq!(h.verifier.calls(), 0);
}

#[tokio::test]
async fn health_still_refuses_bots_and_foreign_origins() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::USER_AGENT, GOOGLEBOT_UA)
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "bot_signature_match");

    let response = app(&h)
        .oneshot(
            get("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "origin_not_allowlisted");
}

#[tokio::test]
async fn health_is_rate_limited() {
    let h = Harness::new();
    let router = app(&h);
    let mut statuses = Vec::new();
    for _ in 0..4 {
        let response = router
            .clone()
            .oneshot(get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );
}

#[tokio::test]
async fn admitted_request_carries_context() {
    let h = Harness::new();
    let token = h.token("user-42", Some("dev@company.com"));
    let response = app(&h)
        .oneshot(
            get("/api/data")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::ORIGIN, APP_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], APP_ORIGIN);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["path"], "/api/data");
    assert_eq!(body["identity"]["subject_id"], "user-42");
    assert_eq!(body["identity"]["email"], "dev@company.com");
    assert_eq!(body["origin_allowed"], true);
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn denial_is_json_with_reason() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(get("/api/data").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"error": "auth_header_missing", "status": 401}));
}

#[tokio::test]
async fn bot_denial_over_http() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/public/page")
                .header(header::USER_AGENT, GOOGLEBOT_UA)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "bot_signature_match");
}

#[tokio::test]
async fn preflight_gets_cors_headers() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(
            get("/api/data")
                .method("OPTIONS")
                .header(header::ORIGIN, APP_ORIGIN)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], APP_ORIGIN);
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert!(headers.contains_key(header::ACCESS_CONTROL_MAX_AGE));
}

#[tokio::test]
async fn rate_limited_response_has_retry_after() {
    let h = Harness::new();
    let router = app(&h);
    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(get("/public/page").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .oneshot(get("/public/page").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(json_body(response).await["error"], "rate_exceeded");
}

#[tokio::test]
async fn webhook_signature_checked_over_raw_body() {
    let h = Harness::new();
    let body = r#"{"id":"evt_1","type":"invoice.paid"}"#;
    let signature = sign_stripe_payload(WEBHOOK_SECRET.as_bytes(), unix_now(), body.as_bytes());

    let response = app(&h)
        .oneshot(
            get("/api/stripe/webhooks")
                .method("POST")
                .header("stripe-signature", &signature)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.verifier.calls(), 0);

    let response = app(&h)
        .oneshot(
            get("/api/stripe/webhooks")
                .method("POST")
                .header("stripe-signature", &signature)
                .body(Body::from(r#"{"id":"evt_1","type":"invoice.voided"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "signature_invalid");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(
            get("/auth/sign-in")
                .method("POST")
                .body(Body::from(vec![b'a'; 4096]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["error"], "body_too_large");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(get("/internal/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "unknown_route");
}

#[tokio::test]
async fn spoofed_forwarded_for_hops_share_one_rate_key() {
    let h = Harness::new();
    let router = app(&h);
    let mut admitted = 0;
    for i in 0..20 {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/public/page")
                    .header(header::USER_AGENT, BROWSER_UA)
                    .header("x-forwarded-for", format!("10.9.9.{i}, 198.51.100.20"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        if response.status() == StatusCode::OK {
            admitted += 1;
        } else {
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        }
    }
    assert_eq!(admitted, 3);
}
