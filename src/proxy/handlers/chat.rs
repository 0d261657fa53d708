use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{self, AuthFailure};
use crate::models::{ChatRequest, ProviderId};
use crate::proxy::common::errors::{error_response, forbidden_path_response};
use crate::proxy::path_filter::permit;
use crate::proxy::server::AppState;
use crate::proxy::session::controller::new_trace_id;
use crate::proxy::session::{ChannelObserver, ChatTarget, SessionEvent};
use crate::proxy::upstream::sse::format_sse;

use super::bearer_header;

fn frame(event: SessionEvent) -> String {
    match event {
        SessionEvent::Update {
            delivered_len,
            fragment,
        } => format_sse("update", &json!({ "delta": fragment, "length": delivered_len })),
        SessionEvent::Error { message } => {
            format_sse("error", &json!({ "error": true, "msg": message }))
        }
        SessionEvent::Finish { text } => format_sse("finish", &json!({ "text": text })),
    }
}

/// `POST /relay/:provider`: authorized chat completion, re-paced for the caller.
pub async fn handle_relay(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let trace_id = new_trace_id();

    let request: ChatRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid request body: {}", e),
            );
        }
    };

    let provider: ProviderId = match provider.parse() {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::NOT_FOUND, &format!("{}", e)),
    };
    let (Some(chat_path), Some(url)) = (provider.chat_path(), state.registry.chat_url(provider))
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("{} does not support paced chat relay", provider),
        );
    };
    let allowed = state
        .registry
        .route(provider)
        .is_some_and(|route| permit(chat_path, &route.allowlist));
    if !allowed {
        return forbidden_path_response(chat_path);
    }

    let bearer = bearer_header(&headers);
    let decision = auth::authorize(bearer, provider, &state.policy);
    if !decision.allowed() {
        let failure = decision
            .failure()
            .cloned()
            .unwrap_or(AuthFailure::WrongAccessCode);
        warn!("[{}] [Relay] Unauthorized: {}", trace_id, failure);
        return failure.into_response();
    }

    info!(
        "[{}] [Relay] {} model={} stream={} ({})",
        trace_id,
        provider,
        request.model,
        request.stream,
        auth::key_source(bearer, &decision)
    );

    let target = ChatTarget {
        url,
        credential: auth::upstream_credential(&decision, provider, &state.policy),
    };

    let (observer, mut events) = ChannelObserver::new();
    let stream = request.stream;
    let handle = state.controller.run(request, target, observer);
    // caller going away cancels the session
    let guard = handle.cancel_handle().drop_guard();

    if !stream {
        let outcome = handle.join().await;
        drop(guard);
        let mut body = json!({ "text": outcome.text });
        if let Some(err) = outcome.error {
            body["error"] = json!(err.to_string());
        }
        return (StatusCode::OK, Json(body)).into_response();
    }

    let sse_stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = events.recv().await {
            yield Ok::<Bytes, std::io::Error>(Bytes::from(frame(event)));
        }
        info!("[{}] [Relay] SSE stream closed", trace_id);
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(sse_stream))
        .unwrap_or_else(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
}
