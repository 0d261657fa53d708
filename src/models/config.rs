use serde::{Deserialize, Serialize};

use super::provider::ProviderId;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// UI language for user-facing hints ("en" / "cn")
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_language() -> String {
    "en".to_string()
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            language: default_language(),
            server: ServerConfig::default(),
            access: AccessConfig::default(),
            providers: ProvidersConfig::default(),
            timeouts: TimeoutConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Max accepted request body (bytes)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Access-code and caller-key policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Raw access codes. Hashed at startup; an empty list disables the check.
    #[serde(default)]
    pub codes: Vec<String>,
    /// Refuse requests that bring their own API key
    #[serde(default)]
    pub hide_user_api_key: bool,
}

/// One upstream provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Replaces the built-in allowlist when set
    #[serde(default)]
    pub allowed_paths: Option<Vec<String>>,
}

/// Azure OpenAI deployment. Enabled when `url` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl AzureConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub google: ProviderConfig,
    #[serde(default)]
    pub chatglm: ProviderConfig,
    #[serde(default)]
    pub azure: AzureConfig,
}

impl ProvidersConfig {
    pub fn get(&self, provider: ProviderId) -> &ProviderConfig {
        match provider {
            ProviderId::OpenAI => &self.openai,
            ProviderId::Google => &self.google,
            ProviderId::ChatGLM => &self.chatglm,
        }
    }

    pub fn get_mut(&mut self, provider: ProviderId) -> &mut ProviderConfig {
        match provider {
            ProviderId::OpenAI => &mut self.openai,
            ProviderId::Google => &mut self.google,
            ProviderId::ChatGLM => &mut self.chatglm,
        }
    }
}

/// Timing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Passthrough deadline until upstream headers arrive (seconds)
    #[serde(default = "default_forward_secs")]
    pub forward_secs: u64,
    /// Paced session deadline until the stream opens (seconds)
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
    /// Pacing tick (milliseconds)
    #[serde(default = "default_pacing_interval_ms")]
    pub pacing_interval_ms: u64,
    /// Lifetime of signed upstream tokens (seconds)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

fn default_forward_secs() -> u64 {
    600
}

fn default_request_secs() -> u64 {
    60
}

fn default_pacing_interval_ms() -> u64 {
    16
}

fn default_token_ttl_secs() -> i64 {
    crate::auth::SIGNED_TOKEN_TTL
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            forward_secs: default_forward_secs(),
            request_secs: default_request_secs(),
            pacing_interval_ms: default_pacing_interval_ms(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

/// Outbound HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// http://, https:// or socks5:// proxy for upstream calls
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_pool_max_idle_per_host() -> usize {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}
