use std::collections::{HashMap, HashSet};

use crate::models::{AppConfig, ProviderId};

use super::forwarder::{normalize_base_url, target_url};

/// Upstream base URL and allowlist for one provider.
#[derive(Debug, Clone)]
pub struct ProviderRoute {
    pub base_url: String,
    pub allowlist: HashSet<String>,
}

/// Resolved routing table, built once from config.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    routes: HashMap<ProviderId, ProviderRoute>,
}

impl ProviderRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        let routes = ProviderId::ALL
            .into_iter()
            .map(|provider| {
                let entry = config.providers.get(provider);

                let base_url = match provider {
                    ProviderId::OpenAI if config.providers.azure.is_enabled() => {
                        config.providers.azure.url.clone()
                    }
                    _ => entry.base_url.clone(),
                }
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| provider.default_base_url().to_string());

                let allowlist = match &entry.allowed_paths {
                    Some(paths) => paths
                        .iter()
                        .map(|p| p.trim().trim_start_matches('/').to_string())
                        .filter(|p| !p.is_empty())
                        .collect(),
                    None => provider.default_allowlist(),
                };

                let route = ProviderRoute {
                    base_url: normalize_base_url(&base_url),
                    allowlist,
                };
                (provider, route)
            })
            .collect();

        Self { routes }
    }

    pub fn route(&self, provider: ProviderId) -> Option<&ProviderRoute> {
        self.routes.get(&provider)
    }

    /// Full chat-completions URL for the paced relay, if the provider has one.
    pub fn chat_url(&self, provider: ProviderId) -> Option<String> {
        let path = provider.chat_path()?;
        let route = self.route(provider)?;
        Some(target_url(&route.base_url, path, None))
    }
}
