use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{self, AuthFailure};
use crate::models::ProviderId;
use crate::proxy::common::errors::{error_response, forbidden_path_response};
use crate::proxy::forwarder::ForwardRequest;
use crate::proxy::path_filter::{normalize_subpath, permit};
use crate::proxy::redaction::mask_credential;
use crate::proxy::server::AppState;

use super::{bearer_header, client_ip};

/// `ANY /api/:provider/*path`: filter, authorize, then relay verbatim.
pub async fn handle_provider(
    State(state): State<AppState>,
    Path((provider, path)): Path<(String, String)>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return (StatusCode::OK, Json(json!({ "body": "OK" }))).into_response();
    }

    let provider: ProviderId = match provider.parse() {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::NOT_FOUND, &format!("{}", e)),
    };
    let Some(route) = state.registry.route(provider) else {
        return error_response(StatusCode::NOT_FOUND, &format!("unknown provider: {}", provider));
    };

    let subpath = normalize_subpath(&path);
    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let bearer = bearer_header(&headers);
    info!(
        "[Proxy] {} {} /{} from {} auth={}",
        method,
        provider,
        subpath,
        ip,
        mask_credential(bearer)
    );

    if !permit(subpath, &route.allowlist) {
        return forbidden_path_response(subpath);
    }

    let decision = auth::authorize(bearer, provider, &state.policy);
    if !decision.allowed() {
        let failure = decision
            .failure()
            .cloned()
            .unwrap_or(AuthFailure::WrongAccessCode);
        warn!("[Proxy] Unauthorized request from {}: {}", ip, failure);
        return failure.into_response();
    }

    let credential = match auth::upstream_credential(&decision, provider, &state.policy)
        .resolve(&state.issuer, state.token_ttl_seconds)
    {
        Ok(c) => c,
        Err(e) => {
            warn!("[Proxy] Cannot sign {} credential: {}", provider, e);
            return error_response(StatusCode::UNAUTHORIZED, &e.to_string());
        }
    };

    let request = ForwardRequest {
        method,
        subpath: subpath.to_string(),
        query: uri.query().map(str::to_string),
        body,
        credential,
    };

    match state
        .forwarder
        .forward(request, &route.base_url, state.forward_timeout)
        .await
    {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    }
}
