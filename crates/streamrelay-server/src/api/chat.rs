use crate::api::{ApiResponse, state::AppState};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::StreamExt;
use std::convert::Infallible;
use streamrelay_contracts::{ChatTurnRequest, RelayEvent};
use tracing::{error, info, warn};

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::error(message))).into_response()
}

fn to_sse_event(event: &RelayEvent) -> Event {
    let sse = match event.event_name() {
        Some(name) => Event::default().event(name),
        None => Event::default(),
    };
    sse.data(event.data())
}

// POST /chat, POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatTurnRequest>, JsonRejection>,
) -> Response {
    let upstream = state.relay.upstream();

    // Misconfiguration is reported before any stream is opened
    if !state.relay.has_credential() {
        error!(
            provider = upstream.provider(),
            "Rejecting chat request: upstream API key not configured"
        );
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("API key not configured for {}", upstream.provider()),
        );
    }

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejecting malformed chat request");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let messages = match state.relay.prepare(&request) {
        Ok(messages) => messages,
        Err(err) => {
            warn!(error = %err, "Rejecting chat request");
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    info!(
        provider = upstream.provider(),
        model = upstream.model(),
        messages = messages.len(),
        "Relaying chat turn"
    );

    let events = state
        .relay
        .stream(messages)
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));
    let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive));

    ([(header::CONNECTION, "keep-alive")], sse).into_response()
}
