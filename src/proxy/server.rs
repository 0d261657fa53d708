use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::auth::{ServerPolicy, TokenIssuer};
use crate::models::AppConfig;
use crate::modules::Locale;

use super::forwarder::UpstreamForwarder;
use super::handlers;
use super::http_client::build_http_client;
use super::providers::ProviderRegistry;
use super::session::{ChatSessionController, SessionConfig};

/// Shared, read-only state of the relay.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<ServerPolicy>,
    pub registry: Arc<ProviderRegistry>,
    pub issuer: Arc<TokenIssuer>,
    pub forwarder: UpstreamForwarder,
    pub controller: ChatSessionController,
    /// Passthrough deadline until upstream headers arrive
    pub forward_timeout: Duration,
    pub token_ttl_seconds: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServerError> {
        let client = build_http_client(&config.http)?;
        let issuer = Arc::new(TokenIssuer::default());
        let locale: Locale = config.language.parse().unwrap_or_default();

        let session_config = SessionConfig {
            pacing_interval: Duration::from_millis(config.timeouts.pacing_interval_ms.max(1)),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            token_ttl_seconds: config.timeouts.token_ttl_secs,
            locale,
        };

        Ok(Self {
            policy: Arc::new(ServerPolicy::from_config(config)),
            registry: Arc::new(ProviderRegistry::from_config(config)),
            issuer: issuer.clone(),
            forwarder: UpstreamForwarder::new(client.clone()),
            controller: ChatSessionController::new(client, issuer, session_config),
            forward_timeout: Duration::from_secs(config.timeouts.forward_secs),
            token_ttl_seconds: config.timeouts.token_ttl_secs,
        })
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Routes of the relay, without listener concerns.
pub fn router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/healthz", get(health_check_handler))
        .route("/api/:provider/*path", any(handlers::provider::handle_provider))
        .route("/relay/:provider", post(handlers::chat::handle_relay))
        .layer(cors_layer())
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

/// Axum server instance
#[derive(Clone)]
pub struct AxumServer {
    shutdown_tx: Arc<tokio::sync::Mutex<Option<oneshot::Sender<()>>>>,
    local_addr: SocketAddr,
}

impl AxumServer {
    /// Bind and serve in a background task.
    pub async fn start(
        config: &AppConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), ServerError> {
        let state = AppState::from_config(config)?;
        let app = router(state, config.server.max_body_size);

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        info!("[Server] Listening on http://{}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("[Server] Shutdown signal received");
            })
            .await;

            if let Err(e) = result {
                error!("[Server] Server error: {}", e);
            }
        });

        let server = Self {
            shutdown_tx: Arc::new(tokio::sync::Mutex::new(Some(shutdown_tx))),
            local_addr,
        };
        Ok((server, handle))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections; in-flight requests finish.
    pub fn stop(&self) {
        let tx_mutex = self.shutdown_tx.clone();
        tokio::spawn(async move {
            let mut lock = tx_mutex.lock().await;
            if let Some(tx) = lock.take() {
                let _ = tx.send(());
                info!("[Server] Stop signal sent");
            }
        });
    }
}

async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
    .into_response()
}
