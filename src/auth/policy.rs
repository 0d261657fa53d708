use std::collections::{HashMap, HashSet};

use crate::models::{AppConfig, ProviderId};

use super::config::hash_access_code;

/// Server-side authorization policy (the credential store).
///
/// Built once at startup and shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ServerPolicy {
    pub require_code: bool,
    pub hide_user_keys: bool,
    pub system_keys: HashMap<ProviderId, String>,
    /// Key used for OpenAI-compatible traffic when routed to Azure.
    pub azure_key: Option<String>,
    pub azure_mode: bool,
    pub hashed_codes: HashSet<String>,
}

impl ServerPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        let hashed_codes: HashSet<String> = config
            .access
            .codes
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(hash_access_code)
            .collect();

        let mut system_keys = HashMap::new();
        for provider in ProviderId::ALL {
            if let Some(key) = config.providers.get(provider).api_key.as_deref() {
                if !key.trim().is_empty() {
                    system_keys.insert(provider, key.trim().to_string());
                }
            }
        }

        let azure_key = config
            .providers
            .azure
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        Self {
            require_code: !hashed_codes.is_empty(),
            hide_user_keys: config.access.hide_user_api_key,
            system_keys,
            azure_key,
            azure_mode: config.providers.azure.is_enabled(),
            hashed_codes,
        }
    }

    /// Builder-style helper, mostly for tests and embedding.
    pub fn with_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hashed_codes = codes
            .into_iter()
            .map(|c| hash_access_code(c.as_ref()))
            .collect();
        self.require_code = !self.hashed_codes.is_empty();
        self
    }

    pub fn with_system_key(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        self.system_keys.insert(provider, key.into());
        self
    }

    pub fn is_code_valid(&self, raw_code: &str) -> bool {
        self.hashed_codes.contains(&hash_access_code(raw_code))
    }

    /// Operator key for `provider`.
    ///
    /// OpenAI traffic uses the Azure key when Azure mode is on; every other
    /// provider always uses its own key.
    pub fn system_key_for(&self, provider: ProviderId) -> Option<&str> {
        if provider == ProviderId::OpenAI && self.azure_mode {
            return self.azure_key.as_deref();
        }
        self.system_keys.get(&provider).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_config_hashes_codes() {
        let mut config = AppConfig::default();
        config.access.codes = vec!["alpha".into(), " beta ".into(), "".into()];
        let policy = ServerPolicy::from_config(&config);

        assert!(policy.require_code);
        assert_eq!(policy.hashed_codes.len(), 2);
        assert!(policy.is_code_valid("alpha"));
        assert!(policy.is_code_valid("beta"));
        assert!(!policy.is_code_valid("gamma"));
        // raw codes never stored
        assert!(!policy.hashed_codes.contains("alpha"));
    }

    #[test]
    fn test_no_codes_means_open_access() {
        let policy = ServerPolicy::from_config(&AppConfig::default());
        assert!(!policy.require_code);
    }

    #[test]
    fn test_system_key_selection() {
        let mut config = AppConfig::default();
        config.providers.openai.api_key = Some("sk-openai".into());
        config.providers.google.api_key = Some("g-key".into());
        let policy = ServerPolicy::from_config(&config);

        assert_eq!(policy.system_key_for(ProviderId::OpenAI), Some("sk-openai"));
        assert_eq!(policy.system_key_for(ProviderId::Google), Some("g-key"));
        assert_eq!(policy.system_key_for(ProviderId::ChatGLM), None);
    }

    #[test]
    fn test_azure_mode_overrides_non_google_keys() {
        let mut config = AppConfig::default();
        config.providers.openai.api_key = Some("sk-openai".into());
        config.providers.google.api_key = Some("g-key".into());
        config.providers.azure.url = Some("https://example.openai.azure.com/openai".into());
        config.providers.azure.api_key = Some("az-key".into());
        let policy = ServerPolicy::from_config(&config);

        assert!(policy.azure_mode);
        assert_eq!(policy.system_key_for(ProviderId::OpenAI), Some("az-key"));
        assert_eq!(policy.system_key_for(ProviderId::Google), Some("g-key"));
    }

    #[test]
    fn test_azure_mode_keeps_chatglm_key() {
        let mut config = AppConfig::default();
        config.providers.chatglm.api_key = Some("glmid.glmsecret".into());
        config.providers.azure.url = Some("https://example.openai.azure.com/openai".into());
        config.providers.azure.api_key = Some("az-key".into());
        let policy = ServerPolicy::from_config(&config);

        assert!(policy.azure_mode);
        assert_eq!(
            policy.system_key_for(ProviderId::ChatGLM),
            Some("glmid.glmsecret")
        );
    }

    #[test]
    fn test_blank_keys_are_ignored() {
        let mut config = AppConfig::default();
        config.providers.openai.api_key = Some("   ".into());
        let policy = ServerPolicy::from_config(&config);
        assert_eq!(policy.system_key_for(ProviderId::OpenAI), None);
    }
}
