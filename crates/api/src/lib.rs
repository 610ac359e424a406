mod config;
mod rate_limit;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use rihla_chat::{is_submittable, ChatError, ConversationRegistry, ReplyScheduler, Submission};
use rihla_core::{City, Interpretation, Message, QueryInterpreter};
use rihla_observability::AppMetrics;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

pub use crate::config::ApiConfig;
use crate::rate_limit::IpRateLimiter;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub conversations: ConversationRegistry,
    pub metrics: Arc<AppMetrics>,
    pub limiter: IpRateLimiter,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    conversations: usize,
    metrics: rihla_observability::MetricsSnapshot,
}

#[derive(Debug, Serialize)]
struct CitiesResponse {
    cities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct TextRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply_text: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    conversation_id: Uuid,
    messages: Vec<Message>,
}

pub fn build_state(config: &ApiConfig) -> Result<ApiState> {
    let metrics = AppMetrics::shared();
    let templates = config.load_templates()?;
    let interpreter =
        Arc::new(QueryInterpreter::new(templates).context("invalid response templates")?);
    let scheduler = ReplyScheduler::new(interpreter, metrics.clone(), config.reply_delay);

    Ok(ApiState {
        conversations: ConversationRegistry::new(
            scheduler,
            config.max_conversations,
            config.conversation_idle,
        ),
        metrics,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
    })
}

pub fn build_app(config: &ApiConfig) -> Result<Router> {
    Ok(build_router(build_state(config)?))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/cities", get(cities))
        .route("/v1/chat", post(chat))
        .route("/v1/conversations", post(create_conversation))
        .route(
            "/v1/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/v1/conversations/:id/messages", post(post_message))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        conversations: state.conversations.len(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn cities() -> impl IntoResponse {
    Json(CitiesResponse {
        cities: City::ALL.iter().map(|city| city.display_name()).collect(),
    })
}

async fn chat(
    State(state): State<ApiState>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body_response(rejection),
    };

    if !is_submittable(&request.text) {
        state.metrics.inc_rejected_submission();
        return blank_text_response();
    }

    let (interpretation, reply_text) = state.conversations.scheduler().answer(&request.text);
    let (origin, destination) = match interpretation {
        Interpretation::TravelOptions {
            origin,
            destination,
        } => (
            Some(origin.display_name()),
            Some(destination.display_name()),
        ),
        Interpretation::Fallback => (None, None),
    };

    (
        StatusCode::OK,
        Json(ChatResponse {
            reply_text,
            kind: interpretation.kind(),
            origin,
            destination,
        }),
    )
        .into_response()
}

async fn create_conversation(State(state): State<ApiState>) -> Response {
    match state.conversations.create() {
        Ok((conversation_id, messages)) => {
            info!(conversation_id = %conversation_id, "conversation opened");
            (
                StatusCode::CREATED,
                Json(ConversationResponse {
                    conversation_id,
                    messages,
                }),
            )
                .into_response()
        }
        Err(err) => chat_error_response(err),
    }
}

async fn get_conversation(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.conversations.messages(id) {
        Ok(messages) => Json(ConversationResponse {
            conversation_id: id,
            messages,
        })
        .into_response(),
        Err(err) => chat_error_response(err),
    }
}

async fn post_message(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body_response(rejection),
    };

    match state.conversations.submit(id, &request.text) {
        Ok((Submission::Accepted, messages)) => (
            StatusCode::ACCEPTED,
            Json(ConversationResponse {
                conversation_id: id,
                messages,
            }),
        )
            .into_response(),
        Ok((Submission::Rejected, _)) => blank_text_response(),
        Err(err) => chat_error_response(err),
    }
}

async fn delete_conversation(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.conversations.remove(id) {
        Ok(cancelled) => {
            info!(conversation_id = %id, cancelled, "conversation discarded");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => chat_error_response(err),
    }
}

fn blank_text_response() -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "empty_text",
        "text must contain at least one non-whitespace character",
    )
}

fn invalid_body_response(rejection: JsonRejection) -> Response {
    error_response(rejection.status(), "invalid_body", &rejection.body_text())
}

fn chat_error_response(err: ChatError) -> Response {
    let status = match &err {
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::CapacityReached { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ChatError::Closed => StatusCode::GONE,
    };
    let code = match &err {
        ChatError::NotFound(_) => "conversation_not_found",
        ChatError::CapacityReached { .. } => "conversation_capacity_reached",
        ChatError::Closed => "conversation_closed",
    };

    if status.is_server_error() {
        warn!(error = %err, "conversation request refused");
    }
    error_response(status, code, &err.to_string())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": code,
            "message": message
        })),
    )
        .into_response()
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded for this IP",
        );
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| "local".to_string())
}
