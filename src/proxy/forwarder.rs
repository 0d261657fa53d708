use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::common::errors::error_response;
use super::errors::{classify_network_error, NetworkErrorInfo};

/// Request to relay upstream, already authorized and filtered.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Provider subpath without a leading slash
    pub subpath: String,
    pub query: Option<String>,
    pub body: Bytes,
    /// Credential header to attach, if any
    pub credential: Option<(String, String)>,
}

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("{0}")]
    Network(NetworkErrorInfo),

    #[error("invalid credential header: {0}")]
    InvalidCredential(String),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = match &self {
            ForwardError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Network(info) => {
                StatusCode::from_u16(info.suggested_http_status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ForwardError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
        };
        error_response(status, &self.to_string())
    }
}

/// Prefix `https://` when the scheme is missing and drop one trailing `/`.
pub fn normalize_base_url(base: &str) -> String {
    let base = base.trim();
    let base = if base.starts_with("http") {
        base.to_string()
    } else {
        format!("https://{}", base)
    };
    match base.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => base,
    }
}

/// `base/subpath[?query]`
pub fn target_url(base: &str, subpath: &str, query: Option<&str>) -> String {
    let mut url = format!("{}/{}", normalize_base_url(base), subpath.trim_start_matches('/'));
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(q);
    }
    url
}

/// Relays one request to an upstream provider. No retries.
#[derive(Debug, Clone)]
pub struct UpstreamForwarder {
    client: reqwest::Client,
}

impl UpstreamForwarder {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send `request` to `target_base_url`.
    ///
    /// `timeout` bounds the call until response headers arrive; the body is
    /// then streamed back without a deadline.
    pub async fn forward(
        &self,
        request: ForwardRequest,
        target_base_url: &str,
        timeout: Duration,
    ) -> Result<Response, ForwardError> {
        let url = target_url(target_base_url, &request.subpath, request.query.as_deref());
        info!("[Proxy] {} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CACHE_CONTROL, "no-store");

        if let Some((name, value)) = &request.credential {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ForwardError::InvalidCredential(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ForwardError::InvalidCredential(e.to_string()))?;
            builder = builder.header(name, value);
        }

        if request.method != Method::GET && request.method != Method::HEAD {
            builder = builder.body(request.body);
        }

        let upstream = match tokio::time::timeout(timeout, builder.send()).await {
            Err(_) => {
                warn!("[Proxy] Upstream timed out after {:?}: {}", timeout, url);
                return Err(ForwardError::Timeout);
            }
            Ok(Err(e)) if e.is_timeout() => {
                warn!("[Proxy] Upstream timed out: {}", e);
                return Err(ForwardError::Timeout);
            }
            Ok(Err(e)) => {
                let info = classify_network_error(&e);
                warn!("[Proxy] Upstream request failed ({:?}): {}", info.category, info.detail);
                return Err(ForwardError::Network(info));
            }
            Ok(Ok(resp)) => resp,
        };

        let status = upstream.status();
        debug!("[Proxy] Upstream answered {} for {}", status, url);

        let headers = relay_headers(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Upstream headers as relayed to the caller: no `WWW-Authenticate`, no
/// hop-by-hop headers, `X-Accel-Buffering: no`.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    headers.remove(header::WWW_AUTHENTICATE);
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    headers
}
