pub mod chat;
pub mod config;
pub mod provider;

pub use chat::{ChatCompletion, ChatCompletionChunk, ChatMessage, ChatRequest};
pub use config::{
    AccessConfig, AppConfig, AzureConfig, HttpConfig, ProviderConfig, ProvidersConfig,
    ServerConfig, TimeoutConfig,
};
pub use provider::{ProviderId, UnknownProvider};
