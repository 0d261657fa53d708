pub mod common;
pub mod errors;
pub mod forwarder;
pub mod handlers;
pub mod http_client;
pub mod path_filter;
pub mod providers;
pub mod redaction;
pub mod server;
pub mod session;
pub mod upstream;

pub use forwarder::{ForwardError, ForwardRequest, UpstreamForwarder};
pub use providers::ProviderRegistry;
pub use server::{router, AppState, AxumServer, ServerError};
pub use session::{ChatSessionController, ChatTarget, SessionConfig, SessionObserver};
