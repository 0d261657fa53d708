use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Upstream LLM providers the relay knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAI,
    Google,
    ChatGLM,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::OpenAI, ProviderId::Google, ProviderId::ChatGLM];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Google => "google",
            Self::ChatGLM => "chatglm",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com",
            Self::Google => "https://generativelanguage.googleapis.com",
            Self::ChatGLM => "https://open.bigmodel.cn",
        }
    }

    /// Subpath of the chat-completion endpoint used by the paced relay.
    /// `None` for providers whose wire format is not OpenAI-compatible.
    pub fn chat_path(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("v1/chat/completions"),
            Self::ChatGLM => Some("api/paas/v4/chat/completions"),
            Self::Google => None,
        }
    }

    /// Subpaths callers may reach through the passthrough route.
    pub fn default_allowlist(&self) -> HashSet<String> {
        let paths: &[&str] = match self {
            Self::OpenAI => &[
                "v1/chat/completions",
                "v1/models",
                "dashboard/billing/usage",
                "dashboard/billing/subscription",
            ],
            Self::Google => &[
                "v1beta/models/gemini-pro:generateContent",
                "v1beta/models/gemini-pro:streamGenerateContent",
            ],
            Self::ChatGLM => &["api/paas/v4/chat/completions"],
        };
        paths.iter().map(|p| p.to_string()).collect()
    }

    /// Keys for this provider are `id.secret` pairs that must be signed per request.
    pub fn signs_tokens(&self) -> bool {
        matches!(self, Self::ChatGLM)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider: {}", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "google" | "gemini" => Ok(Self::Google),
            "chatglm" | "glm" | "zhipu" => Ok(Self::ChatGLM),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}
