use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use rihla_api::{build_app, ApiConfig};
use rihla_core::ResponseTemplates;
use serde_json::{json, Value};
use tower::ServiceExt;

fn config() -> ApiConfig {
    ApiConfig {
        reply_delay: Duration::from_millis(1000),
        ..ApiConfig::default()
    }
}

fn app() -> Router {
    build_app(&config()).expect("app should build")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_metrics() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["metrics"]["queries_total"], 0);
}

#[tokio::test]
async fn cities_are_listed_in_roster_order() {
    let response = app().oneshot(get("/v1/cities")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    assert_eq!(
        parsed["cities"],
        json!(["Casablanca", "Rabat", "Marrakech", "Tangier", "El Jadida"])
    );
}

#[tokio::test]
async fn chat_returns_travel_options() {
    let response = app()
        .oneshot(post_json(
            "/v1/chat",
            json!({ "text": "What's the best way to get from Casablanca to Rabat?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    assert_eq!(parsed["kind"], "travel_options");
    assert_eq!(parsed["origin"], "Casablanca");
    assert_eq!(parsed["destination"], "Rabat");
    assert!(parsed["reply_text"]
        .as_str()
        .unwrap()
        .starts_with("🚗 Travel options from Casablanca to Rabat:"));
}

#[tokio::test]
async fn chat_falls_back_for_unknown_city() {
    let response = app()
        .oneshot(post_json("/v1/chat", json!({ "text": "Tell me about Fez" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    assert_eq!(parsed["kind"], "fallback");
    assert!(parsed.get("origin").is_none());
    assert_eq!(parsed["reply_text"], ResponseTemplates::default().fallback);
}

#[tokio::test]
async fn chat_rejects_blank_text() {
    let response = app()
        .oneshot(post_json("/v1/chat", json!({ "text": "   " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let parsed = read_json(response).await;
    assert_eq!(parsed["error"], "empty_text");
}

#[tokio::test]
async fn chat_rejects_missing_text_field_as_json() {
    let response = app()
        .oneshot(post_json("/v1/chat", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let parsed = read_json(response).await;
    assert_eq!(parsed["error"], "invalid_body");
    assert!(parsed["message"].as_str().unwrap().contains("text"));
}

#[tokio::test]
async fn malformed_message_body_is_reported_as_json() {
    let app = app();
    let created = read_json(
        app.clone()
            .oneshot(post_json("/v1/conversations", json!({})))
            .await
            .unwrap(),
    )
    .await;
    let id = created["conversation_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/conversations/{id}/messages"))
                .header("content-type", "application/json")
                .body(Body::from("{\"text\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "invalid_body");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let response = app().oneshot(get("/v1/cities")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/cities")
                .header("x-request-id", "trip-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trip-42");
}

#[tokio::test(start_paused = true)]
async fn conversation_flow_appends_delayed_reply() {
    let app = app();

    let created = app
        .clone()
        .oneshot(post_json("/v1/conversations", json!({})))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = read_json(created).await;
    let id = created["conversation_id"].as_str().unwrap().to_string();
    assert_eq!(created["messages"][0]["is_user"], false);
    assert_eq!(
        created["messages"][0]["text"],
        ResponseTemplates::default().welcome
    );

    let submitted = app
        .clone()
        .oneshot(post_json(
            &format!("/v1/conversations/{id}/messages"),
            json!({ "text": "Show me train options from Rabat to Tangier" }),
        ))
        .await
        .unwrap();
    assert_eq!(submitted.status(), StatusCode::ACCEPTED);
    let submitted = read_json(submitted).await;
    assert_eq!(submitted["messages"].as_array().unwrap().len(), 2);
    assert_eq!(submitted["messages"][1]["is_user"], true);

    tokio::time::sleep(Duration::from_millis(1001)).await;

    let fetched = app
        .clone()
        .oneshot(get(&format!("/v1/conversations/{id}")))
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched = read_json(fetched).await;
    let messages = fetched["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["is_user"], false);
    assert!(messages[2]["text"]
        .as_str()
        .unwrap()
        .starts_with("🚗 Travel options from Rabat to Tangier:"));
}

#[tokio::test(start_paused = true)]
async fn blank_message_is_not_appended() {
    let app = app();
    let created = read_json(
        app.clone()
            .oneshot(post_json("/v1/conversations", json!({})))
            .await
            .unwrap(),
    )
    .await;
    let id = created["conversation_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/v1/conversations/{id}/messages"),
            json!({ "text": "\n\t " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let fetched = read_json(
        app.oneshot(get(&format!("/v1/conversations/{id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(fetched["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn deleted_conversation_is_gone() {
    let app = app();
    let created = read_json(
        app.clone()
            .oneshot(post_json("/v1/conversations", json!({})))
            .await
            .unwrap(),
    )
    .await;
    let id = created["conversation_id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(post_json(
            &format!("/v1/conversations/{id}/messages"),
            json!({ "text": "Casablanca El Jadida" }),
        ))
        .await
        .unwrap();

    let deleted = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/conversations/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    tokio::time::sleep(Duration::from_secs(2)).await;

    let fetched = app
        .oneshot(get(&format!("/v1/conversations/{id}")))
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(fetched).await["error"], "conversation_not_found");
}

#[tokio::test(start_paused = true)]
async fn idle_conversation_is_evicted_to_make_room() {
    let app = build_app(&ApiConfig {
        max_conversations: 1,
        conversation_idle: Duration::from_secs(60),
        ..config()
    })
    .expect("app should build");

    let first = app
        .clone()
        .oneshot(post_json("/v1/conversations", json!({})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let id = read_json(first).await["conversation_id"]
        .as_str()
        .unwrap()
        .to_string();

    let refused = app
        .clone()
        .oneshot(post_json("/v1/conversations", json!({})))
        .await
        .unwrap();
    assert_eq!(refused.status(), StatusCode::SERVICE_UNAVAILABLE);

    tokio::time::sleep(Duration::from_secs(61)).await;

    let second = app
        .clone()
        .oneshot(post_json("/v1/conversations", json!({})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CREATED);

    let stale = app
        .oneshot(get(&format!("/v1/conversations/{id}")))
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let uri = format!("/v1/conversations/{}", uuid::Uuid::new_v4());
    let response = app().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rate_limit_applies_per_ip_but_not_to_health() {
    let app = build_app(&ApiConfig {
        rate_limit_max: 2,
        ..config()
    })
    .expect("app should build");

    let request = || {
        Request::builder()
            .uri("/v1/cities")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(read_json(limited).await["error"], "rate_limited");

    let health = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
