//! Webhook handlers. Every input route answers with an NCCO, even for
//! payloads it cannot parse.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use parley_core::CallId;
use parley_engine::{CallEvent, InputEvent};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::base_url::callback_base;
use crate::health::{self, HealthResponse, ROOT_BANNER};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnswerQuery {
    pub uuid: Option<String>,
}

/// Parse a webhook body, treating anything unparseable as an empty event.
fn lenient<T: DeserializeOwned + Default>(body: &Bytes, route: &'static str) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        warn!(route, error = %err, "malformed webhook body, treating as empty");
        T::default()
    })
}

/// GET|POST /webhooks/answer
pub async fn answer(
    State(state): State<AppState>,
    Query(query): Query<AnswerQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let uuid = match query.uuid {
        Some(uuid) => Some(uuid),
        None => lenient::<AnswerQuery>(&body, "answer").uuid,
    };
    let call_id = CallId::from_optional(uuid.as_deref());
    let base = callback_base(&headers);
    Json(state.controller.start_call(&call_id, &base).await).into_response()
}

/// POST /webhooks/speech and /webhooks/dtmf
pub async fn input(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let event: InputEvent = lenient(&body, "input");
    let base = callback_base(&headers);
    let ncco = state
        .controller
        .handle_input(&event.call_id(), &event, &base)
        .await;
    Json(ncco).into_response()
}

/// POST /webhooks/events. Keypad input arriving here is processed like any
/// other input; everything else is a status update.
pub async fn events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let event: CallEvent = lenient(&body, "events");
    let call_id = event.call_id();

    if let Some(input) = event.as_input() {
        let base = callback_base(&headers);
        let ncco = state.controller.handle_input(&call_id, &input, &base).await;
        return Json(ncco).into_response();
    }

    match event.status.as_deref() {
        Some(status) => {
            state.controller.handle_status(&call_id, status);
        }
        None => debug!(call_id = %call_id, "event without status"),
    }
    "OK".into_response()
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.controller.active_calls(),
    ))
}

/// GET /
pub async fn root() -> &'static str {
    ROOT_BANNER
}
