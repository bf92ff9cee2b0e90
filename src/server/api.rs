use crate::agent::ChatAgent;
use crate::models::chat::ChatRequest;
use crate::protocol::{ encoder::encode_reply, CONTENT_TYPE as BODY_CONTENT_TYPE };
use super::error::ApiError;

use axum::{
    body::Body,
    extract::{ rejection::JsonRejection, State },
    http::{ header, HeaderValue },
    response::Response,
    routing::{ get, post },
    Json,
    Router,
};
use futures::TryStreamExt;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use log::{ error, info, warn };
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;

pub type ChatRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    agent: Arc<ChatAgent>,
    limiter: Arc<ChatRateLimiter>,
}

impl AppState {
    pub fn new(agent: Arc<ChatAgent>, requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            agent,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Response, ApiError> {
    if state.limiter.check().is_err() {
        warn!("Global chat rate limit exceeded. Rejecting request.");
        return Err(ApiError::RateLimited);
    }

    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected chat request: {}", rejection.body_text());
        ApiError::BadRequest(rejection.body_text())
    })?;
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("`messages` must contain at least one message".into()));
    }

    let request_id = Uuid::new_v4().to_string();
    let reply = state.agent.prepare(&request_id, &request.messages).await.map_err(|e| {
        error!("[{}] Error processing request: {}", request_id, e);
        ApiError::from(e)
    })?;

    info!(
        "[{}] Streaming reply ({})",
        request_id,
        if reply.image_url.is_some() { "with image" } else { "text only" }
    );
    let body = encode_reply(reply.image_url.as_deref(), reply.tokens).inspect_err(
        move |e| error!("[{}] Completion stream failed mid-reply: {}", request_id, e)
    );

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(BODY_CONTENT_TYPE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    Ok(response)
}
