//! Route handlers and wire shapes.

use crate::rate_limit::LimitScope;
use crate::AppState;
use chrono::{DateTime, Utc};
use curio_catalog::CartSummary;
use curio_core::error::CoreError;
use curio_core::session::SessionSnapshot;
use curio_protocol::{
    EventMsg, EventPayload, FunctionCall, FunctionName, FunctionResult, SessionId, TurnId,
};
use log::{debug, warn};
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::{Shutdown, State, delete, get, post};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// JSON error body: `{success: false, error: {code, message}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl ErrorBody {
    fn json(code: &str, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        })
    }
}

/// Typed error responses shared by all routes.
#[derive(Debug, rocket::Responder)]
pub enum ApiError {
    #[response(status = 400, content_type = "json")]
    BadRequest(Json<ErrorBody>),
    #[response(status = 404, content_type = "json")]
    NotFound(Json<ErrorBody>),
    #[response(status = 409, content_type = "json")]
    Conflict(Json<ErrorBody>),
    #[response(status = 429, content_type = "json")]
    TooManyRequests(Json<ErrorBody>),
    #[response(status = 500, content_type = "json")]
    Internal(Json<ErrorBody>),
}

impl ApiError {
    fn rate_limited() -> Self {
        ApiError::TooManyRequests(ErrorBody::json(
            "RATE_LIMITED",
            "too many requests; slow down and try again",
        ))
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownSession(_) => ApiError::NotFound(ErrorBody::json(
                "SESSION_EXPIRED",
                "session not found; create a new session",
            )),
            CoreError::SessionExpired(_) => ApiError::NotFound(ErrorBody::json(
                "SESSION_EXPIRED",
                "session is expired; create a new session",
            )),
            CoreError::TurnInProgress(_) => ApiError::Conflict(ErrorBody::json(
                "TURN_IN_PROGRESS",
                "a response is already streaming for this session",
            )),
            other => {
                warn!("internal error surfaced to route: {other}");
                ApiError::Internal(ErrorBody::json("INTERNAL_ERROR", "internal server error"))
            }
        }
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::NotFound(ErrorBody::json(
            "SESSION_EXPIRED",
            "session not found; create a new session",
        ))
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    version: &'static str,
    uptime_secs: i64,
}

#[get("/health")]
pub fn health(state: &State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    session_id: SessionId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[post("/api/sessions")]
pub fn create_session(
    state: &State<AppState>,
    ip: Option<IpAddr>,
) -> Result<Json<SessionCreated>, ApiError> {
    if !state.limiter.allow(LimitScope::CreateSession, ip) {
        return Err(ApiError::rate_limited());
    }
    let (session_id, created_at, expires_at) = state.sessions.create_session();
    Ok(Json(SessionCreated {
        session_id,
        created_at,
        expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionContextResponse {
    session_id: SessionId,
    context: SessionSnapshot,
    cart_summary: CartSummary,
}

/// Rehydration endpoint: search history plus cart summary after a reconnect.
#[get("/api/sessions/<session_id>/context")]
pub async fn session_context(
    state: &State<AppState>,
    session_id: &str,
) -> Result<Json<SessionContextResponse>, ApiError> {
    let session_id = parse_session_id(session_id)?;
    let context = state.sessions.snapshot(session_id)?;
    let cart_summary = state
        .cart
        .summary(session_id)
        .await
        .map_err(|err| ApiError::from(CoreError::from(err)))?;
    Ok(Json(SessionContextResponse {
        session_id,
        context,
        cart_summary,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    context: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageAccepted {
    success: bool,
    message_id: TurnId,
    session_id: SessionId,
}

/// Submit a user message; the response streams on the event connection.
#[post("/api/chat/<session_id>/message", format = "json", data = "<body>")]
pub fn send_message(
    state: &State<AppState>,
    session_id: &str,
    body: Json<ChatMessage>,
    ip: Option<IpAddr>,
) -> Result<Json<MessageAccepted>, ApiError> {
    let session_id = parse_session_id(session_id)?;
    if !state.limiter.allow(LimitScope::SendMessage, ip) {
        return Err(ApiError::rate_limited());
    }
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest(ErrorBody::json(
            "VALIDATION_ERROR",
            "message cannot be empty",
        )));
    }
    state.sessions.ensure_active(session_id)?;
    let coordinator = state.coordinators.get_or_create(session_id)?;
    let turn_id = coordinator.submit(body.message.clone())?;
    Ok(Json(MessageAccepted {
        success: true,
        message_id: turn_id,
        session_id,
    }))
}

fn sse_event(event: &EventMsg) -> Option<Event> {
    let data = event.payload.data().ok()?;
    Some(
        Event::json(&data)
            .event(event.payload.event_name())
            .id(event.id.to_string()),
    )
}

/// Server-Sent Events stream for one session.
///
/// Attaching supersedes any previous connection for the session; the old
/// response notices and ends instead of duplicating events.
#[get("/api/stream/<session_id>")]
pub fn stream_chat(
    state: &State<AppState>,
    session_id: &str,
    ip: Option<IpAddr>,
    mut end: Shutdown,
) -> Result<EventStream![], ApiError> {
    let session_id = parse_session_id(session_id)?;
    if !state.limiter.allow(LimitScope::Stream, ip) {
        return Err(ApiError::rate_limited());
    }
    state.sessions.ensure_active(session_id)?;
    let coordinator = state.coordinators.get_or_create(session_id)?;
    let mut handle = coordinator.attach();

    Ok(EventStream! {
        let connected = EventMsg::new(
            session_id,
            EventPayload::Connection {
                status: "connected".to_string(),
                session_id,
            },
        );
        if let Some(event) = sse_event(&connected) {
            yield event;
        }
        loop {
            tokio::select! {
                _ = &mut end => break,
                received = handle.events.recv() => match received {
                    Ok(event) => {
                        if !coordinator.is_current(handle.epoch()) {
                            debug!(
                                "stream superseded (session_id={}, epoch={})",
                                session_id,
                                handle.epoch()
                            );
                            break;
                        }
                        if let Some(event) = sse_event(&event) {
                            yield event;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "stream lagged, events dropped (session_id={}, skipped={})",
                            session_id, skipped
                        );
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

fn extract_session_id(body: &mut Value) -> Result<SessionId, ApiError> {
    let raw = body
        .as_object_mut()
        .and_then(|map| map.remove("session_id"))
        .ok_or_else(|| {
            ApiError::BadRequest(ErrorBody::json(
                "VALIDATION_ERROR",
                "session_id is required",
            ))
        })?;
    let raw = raw.as_str().ok_or_else(|| {
        ApiError::BadRequest(ErrorBody::json(
            "VALIDATION_ERROR",
            "session_id must be a string",
        ))
    })?;
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::BadRequest(ErrorBody::json(
            "VALIDATION_ERROR",
            "session_id is not a valid id",
        ))
    })
}

/// Shared body for the direct function endpoints: `session_id` plus the
/// operation's arguments, usable outside the streaming flow.
async fn run_function(
    state: &State<AppState>,
    ip: Option<IpAddr>,
    name: FunctionName,
    body: Json<Value>,
) -> Result<Json<FunctionResult>, ApiError> {
    if !state.limiter.allow(LimitScope::FunctionCall, ip) {
        return Err(ApiError::rate_limited());
    }
    let mut body = body.into_inner();
    let session_id = extract_session_id(&mut body)?;
    let call = FunctionCall {
        call_id: Uuid::new_v4(),
        name,
        arguments: body,
    };
    Ok(Json(state.executor.execute(session_id, &call).await))
}

#[post("/api/functions/search_products", format = "json", data = "<body>")]
pub async fn search_products(
    state: &State<AppState>,
    body: Json<Value>,
    ip: Option<IpAddr>,
) -> Result<Json<FunctionResult>, ApiError> {
    run_function(state, ip, FunctionName::SearchProducts, body).await
}

#[post("/api/functions/show_product_details", format = "json", data = "<body>")]
pub async fn show_product_details(
    state: &State<AppState>,
    body: Json<Value>,
    ip: Option<IpAddr>,
) -> Result<Json<FunctionResult>, ApiError> {
    run_function(state, ip, FunctionName::ShowProductDetails, body).await
}

#[post("/api/functions/add_to_cart", format = "json", data = "<body>")]
pub async fn add_to_cart(
    state: &State<AppState>,
    body: Json<Value>,
    ip: Option<IpAddr>,
) -> Result<Json<FunctionResult>, ApiError> {
    run_function(state, ip, FunctionName::AddToCart, body).await
}

#[post("/api/functions/get_recommendations", format = "json", data = "<body>")]
pub async fn get_recommendations(
    state: &State<AppState>,
    body: Json<Value>,
    ip: Option<IpAddr>,
) -> Result<Json<FunctionResult>, ApiError> {
    run_function(state, ip, FunctionName::GetRecommendations, body).await
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    session_id: SessionId,
    cart_summary: CartSummary,
}

#[get("/api/cart/<session_id>")]
pub async fn cart_summary(
    state: &State<AppState>,
    session_id: &str,
) -> Result<Json<CartResponse>, ApiError> {
    let session_id = parse_session_id(session_id)?;
    state.sessions.ensure_active(session_id)?;
    let cart_summary = state
        .cart
        .summary(session_id)
        .await
        .map_err(|err| ApiError::from(CoreError::from(err)))?;
    Ok(Json(CartResponse {
        session_id,
        cart_summary,
    }))
}

#[derive(Debug, Serialize)]
pub struct CartCleared {
    success: bool,
    session_id: SessionId,
}

#[delete("/api/cart/<session_id>")]
pub async fn clear_cart(
    state: &State<AppState>,
    session_id: &str,
) -> Result<Json<CartCleared>, ApiError> {
    let session_id = parse_session_id(session_id)?;
    state.sessions.ensure_active(session_id)?;
    state
        .cart
        .clear(session_id)
        .await
        .map_err(|err| ApiError::from(CoreError::from(err)))?;
    Ok(Json(CartCleared {
        success: true,
        session_id,
    }))
}
