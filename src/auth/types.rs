use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::config::ACCESS_CODE_PREFIX;

/// Credential carried by the caller's bearer token.
///
/// - `AccessCode`: shared operator secret (token started with `nk-`), prefix stripped
/// - `ApiKey`: the caller's own upstream key, passed through as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCredential {
    AccessCode(String),
    ApiKey(String),
}

impl AccessCredential {
    /// Classify an `Authorization` header value.
    ///
    /// The `Bearer ` scheme is removed and the rest trimmed, so
    /// `"Bearer nk-abc"` → `AccessCode("abc")` and `"Bearer sk-x"` → `ApiKey("sk-x")`.
    pub fn from_bearer(header: &str) -> Self {
        let header = header.trim();
        // header values arrive with trailing whitespace already stripped
        let token = match header.strip_prefix("Bearer") {
            Some("") => "",
            Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => header,
        };
        match token.strip_prefix(ACCESS_CODE_PREFIX) {
            Some(code) => Self::AccessCode(code.to_string()),
            None => Self::ApiKey(token.to_string()),
        }
    }

    /// The raw access code, or `""` when the caller sent an API key.
    pub fn access_code(&self) -> &str {
        match self {
            Self::AccessCode(code) => code,
            Self::ApiKey(_) => "",
        }
    }

    /// The caller's API key, if a non-empty one was supplied.
    pub fn api_key(&self) -> Option<&str> {
        match self {
            Self::ApiKey(key) if !key.is_empty() => Some(key),
            _ => None,
        }
    }
}

/// Why a request was refused by the auth gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("empty access code")]
    EmptyAccessCode,

    #[error("wrong access code")]
    WrongAccessCode,

    #[error("caller-supplied keys are not permitted")]
    UserKeyNotPermitted,
}

/// Outcome of one authorization check. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    failure: Option<AuthFailure>,
    effective_authorization: Option<String>,
}

impl AuthDecision {
    pub(crate) fn allow(effective_authorization: Option<String>) -> Self {
        Self {
            failure: None,
            effective_authorization,
        }
    }

    pub(crate) fn deny(failure: AuthFailure) -> Self {
        Self {
            failure: Some(failure),
            effective_authorization: None,
        }
    }

    pub fn allowed(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&AuthFailure> {
        self.failure.as_ref()
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.failure.as_ref().map(|f| f.to_string())
    }

    /// `Authorization` value to attach upstream (`"Bearer <key>"`), if any.
    pub fn effective_authorization(&self) -> Option<&str> {
        self.effective_authorization.as_deref()
    }

    /// The bare key behind `effective_authorization`.
    pub fn effective_key(&self) -> Option<&str> {
        self.effective_authorization
            .as_deref()
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
    }
}

/// `id.secret` key used by providers that want HS256-signed tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundKey {
    pub id: String,
    pub secret: String,
}

impl CompoundKey {
    /// Split on the first `.`; both halves must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let (id, secret) = raw.trim().split_once('.').ok_or(TokenError::MalformedKey)?;
        if id.is_empty() || secret.is_empty() {
            return Err(TokenError::MalformedKey);
        }
        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }
}

/// A freshly signed upstream token. Issued per request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub signed_value: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Header of the compact token: `{"alg":"HS256","sign_type":"SIGN"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTokenHeader {
    pub alg: String,
    pub sign_type: String,
}

/// Claims of the compact token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedTokenClaims {
    pub api_key: String,
    pub exp: i64,
    pub timestamp: i64,
}

/// Errors from the token issuer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid api key: expected `id.secret`")]
    MalformedKey,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Where the upstream credential for a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Caller,
    System,
    None,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Caller => write!(f, "caller key"),
            KeySource::System => write!(f, "system key"),
            KeySource::None => write!(f, "no key"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_with_access_code() {
        let cred = AccessCredential::from_bearer("Bearer nk-secret");
        assert_eq!(cred, AccessCredential::AccessCode("secret".to_string()));
        assert_eq!(cred.access_code(), "secret");
        assert_eq!(cred.api_key(), None);
    }

    #[test]
    fn test_bearer_with_api_key() {
        let cred = AccessCredential::from_bearer("  Bearer sk-xyz ");
        assert_eq!(cred, AccessCredential::ApiKey("sk-xyz".to_string()));
        assert_eq!(cred.access_code(), "");
        assert_eq!(cred.api_key(), Some("sk-xyz"));
    }

    #[test]
    fn test_empty_bearer_has_no_key() {
        let cred = AccessCredential::from_bearer("");
        assert_eq!(cred.api_key(), None);
        assert_eq!(cred.access_code(), "");

        let cred = AccessCredential::from_bearer("Bearer ");
        assert_eq!(cred.api_key(), None);
    }

    #[test]
    fn test_bare_prefix_is_empty_code() {
        let cred = AccessCredential::from_bearer("Bearer nk-");
        assert_eq!(cred, AccessCredential::AccessCode(String::new()));
    }

    #[test]
    fn test_compound_key_parse() {
        let key = CompoundKey::parse("abc.def").unwrap();
        assert_eq!(key.id, "abc");
        assert_eq!(key.secret, "def");
    }

    #[test]
    fn test_compound_key_splits_on_first_dot() {
        let key = CompoundKey::parse("abc.def.ghi").unwrap();
        assert_eq!(key.id, "abc");
        assert_eq!(key.secret, "def.ghi");
    }

    #[test]
    fn test_compound_key_rejects_missing_halves() {
        assert_eq!(CompoundKey::parse("abc"), Err(TokenError::MalformedKey));
        assert_eq!(CompoundKey::parse(".def"), Err(TokenError::MalformedKey));
        assert_eq!(CompoundKey::parse("abc."), Err(TokenError::MalformedKey));
        assert_eq!(CompoundKey::parse(""), Err(TokenError::MalformedKey));
    }

    #[test]
    fn test_auth_failure_display() {
        assert_eq!(AuthFailure::EmptyAccessCode.to_string(), "empty access code");
        assert_eq!(AuthFailure::WrongAccessCode.to_string(), "wrong access code");
        assert_eq!(
            AuthFailure::UserKeyNotPermitted.to_string(),
            "caller-supplied keys are not permitted"
        );
    }

    #[test]
    fn test_decision_effective_key_strips_bearer() {
        let decision = AuthDecision::allow(Some("Bearer sk-1".to_string()));
        assert!(decision.allowed());
        assert_eq!(decision.effective_key(), Some("sk-1"));
        assert_eq!(decision.failure_reason(), None);
    }

    #[test]
    fn test_key_source_display() {
        assert_eq!(KeySource::Caller.to_string(), "caller key");
        assert_eq!(KeySource::System.to_string(), "system key");
    }
}
