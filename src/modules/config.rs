use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AppConfig, ProviderId};

const CONFIG_ENV: &str = "CHAT_RELAY_CONFIG";
const CONFIG_DIR: &str = "chat-relay";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// `$CHAT_RELAY_CONFIG`, else `<config_dir>/chat-relay/config.json`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.trim().is_empty() {
            return Some(PathBuf::from(p));
        }
    }
    dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    match config_path() {
        Some(path) => load_app_config_from(&path),
        None => {
            warn!("[Config] No config directory available, using defaults");
            Ok(AppConfig::default())
        }
    }
}

pub fn load_app_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        info!("[Config] {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if config.timeouts.token_ttl_secs <= 0 {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "timeouts.token_ttl_secs must be positive, got {}",
                config.timeouts.token_ttl_secs
            ),
        });
    }

    info!("[Config] Loaded {}", path.display());
    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Apply environment overrides through `lookup` (normally `std::env::var`).
///
/// Returns the number of settings that were overridden.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).and_then(non_empty);
    let mut applied = 0;

    if let Some(codes) = get("CODE") {
        config.access.codes = codes
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        info!("[Config] Using {} access code(s) from environment", config.access.codes.len());
        applied += 1;
    }

    if let Some(v) = get("HIDE_USER_API_KEY") {
        config.access.hide_user_api_key = parse_bool(&v);
        applied += 1;
    }

    let keys = [
        ("OPENAI_API_KEY", ProviderId::OpenAI),
        ("GOOGLE_API_KEY", ProviderId::Google),
        ("CHATGLM_API_KEY", ProviderId::ChatGLM),
    ];
    for (var, provider) in keys {
        if let Some(key) = get(var) {
            config.providers.get_mut(provider).api_key = Some(key);
            info!("[Config] Using {} key from environment", provider);
            applied += 1;
        }
    }

    let urls = [
        ("BASE_URL", ProviderId::OpenAI),
        ("GOOGLE_URL", ProviderId::Google),
        ("CHATGLM_URL", ProviderId::ChatGLM),
    ];
    for (var, provider) in urls {
        if let Some(url) = get(var) {
            config.providers.get_mut(provider).base_url = Some(url);
            applied += 1;
        }
    }

    if let Some(url) = get("AZURE_URL") {
        config.providers.azure.url = Some(url);
        applied += 1;
    }
    if let Some(key) = get("AZURE_API_KEY") {
        config.providers.azure.api_key = Some(key);
        applied += 1;
    }

    if let Some(host) = get("HOST") {
        config.server.host = host;
        applied += 1;
    }
    if let Some(port) = get("PORT") {
        match port.parse() {
            Ok(p) => {
                config.server.port = p;
                applied += 1;
            }
            Err(_) => warn!("[Config] Invalid PORT: {}, ignoring", port),
        }
    }

    if let Some(lang) = get("LANGUAGE") {
        config.language = lang;
        applied += 1;
    }

    if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
        match v.parse() {
            Ok(secs) => {
                config.timeouts.request_secs = secs;
                applied += 1;
            }
            Err(_) => warn!("[Config] Invalid REQUEST_TIMEOUT_SECS: {}, ignoring", v),
        }
    }
    if let Some(v) = get("FORWARD_TIMEOUT_SECS") {
        match v.parse() {
            Ok(secs) => {
                config.timeouts.forward_secs = secs;
                applied += 1;
            }
            Err(_) => warn!("[Config] Invalid FORWARD_TIMEOUT_SECS: {}, ignoring", v),
        }
    }

    if let Some(proxy) = get("HTTP_PROXY_URL") {
        config.http.proxy_url = Some(proxy);
        applied += 1;
    }

    applied
}
