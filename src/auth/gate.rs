use tracing::{debug, warn};

use crate::models::ProviderId;

use super::policy::ServerPolicy;
use super::token_issuer::TokenIssuer;
use super::types::{AccessCredential, AuthDecision, AuthFailure, KeySource, TokenError};

/// Decide whether a request may proceed and which key goes upstream.
///
/// Pure in its inputs apart from logging. Never fails: refusals are carried
/// in the returned decision.
pub fn authorize(bearer_header: &str, provider: ProviderId, policy: &ServerPolicy) -> AuthDecision {
    let credential = AccessCredential::from_bearer(bearer_header);
    let raw_code = credential.access_code();
    let api_key = credential.api_key();

    // An API-key request checks the empty code, same as a missing one.
    if policy.require_code && !policy.is_code_valid(raw_code) && api_key.is_none() {
        let failure = if raw_code.is_empty() {
            AuthFailure::EmptyAccessCode
        } else {
            AuthFailure::WrongAccessCode
        };
        debug!("[Auth] Rejected: {} (provider={})", failure, provider);
        return AuthDecision::deny(failure);
    }

    if api_key.is_some() && policy.hide_user_keys {
        debug!("[Auth] Rejected caller key (provider={})", provider);
        return AuthDecision::deny(AuthFailure::UserKeyNotPermitted);
    }

    match api_key {
        Some(key) => AuthDecision::allow(Some(format!("Bearer {}", key))),
        None => match policy.system_key_for(provider) {
            Some(system_key) => {
                debug!("[Auth] Using system key for {}", provider);
                AuthDecision::allow(Some(format!("Bearer {}", system_key)))
            }
            None => {
                warn!(
                    "[Auth] No system key configured for {}, forwarding without credentials",
                    provider
                );
                AuthDecision::allow(None)
            }
        },
    }
}

/// Which side supplied the key that `authorize` settled on.
pub fn key_source(bearer_header: &str, decision: &AuthDecision) -> KeySource {
    if decision.effective_key().is_none() {
        KeySource::None
    } else if AccessCredential::from_bearer(bearer_header).api_key().is_some() {
        KeySource::Caller
    } else {
        KeySource::System
    }
}

/// Credential to attach to the upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamCredential {
    None,
    Header { name: String, value: String },
    /// `id.secret` key that must be signed into a short-lived token per request.
    Signed { compound_key: String },
}

impl UpstreamCredential {
    /// Concrete `(header, value)` to send, minting a fresh token for `Signed`.
    pub fn resolve(
        &self,
        issuer: &TokenIssuer,
        ttl_seconds: i64,
    ) -> Result<Option<(String, String)>, TokenError> {
        match self {
            UpstreamCredential::None => Ok(None),
            UpstreamCredential::Header { name, value } => Ok(Some((name.clone(), value.clone()))),
            UpstreamCredential::Signed { compound_key } => {
                let token = issuer.issue(compound_key, ttl_seconds)?;
                // signing providers take the raw token, no scheme
                Ok(Some(("authorization".to_string(), token.signed_value)))
            }
        }
    }
}

/// Translate an allowed decision into the provider's credential format.
pub fn upstream_credential(
    decision: &AuthDecision,
    provider: ProviderId,
    policy: &ServerPolicy,
) -> UpstreamCredential {
    let Some(key) = decision.effective_key().filter(|k| !k.is_empty()) else {
        return UpstreamCredential::None;
    };

    if provider.signs_tokens() {
        return UpstreamCredential::Signed {
            compound_key: key.to_string(),
        };
    }

    match provider {
        ProviderId::Google => UpstreamCredential::Header {
            name: "x-goog-api-key".to_string(),
            value: key.to_string(),
        },
        ProviderId::OpenAI if policy.azure_mode => UpstreamCredential::Header {
            name: "api-key".to_string(),
            value: key.to_string(),
        },
        ProviderId::OpenAI | ProviderId::ChatGLM => UpstreamCredential::Header {
            name: "authorization".to_string(),
            value: format!("Bearer {}", key),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn code_policy(codes: &[&str]) -> ServerPolicy {
        ServerPolicy::default().with_codes(codes.iter().copied())
    }

    #[test]
    fn test_correct_code_gets_system_key() {
        let policy = code_policy(&["secret"]).with_system_key(ProviderId::OpenAI, "sk-sys");
        let decision = authorize("Bearer nk-secret", ProviderId::OpenAI, &policy);

        assert!(decision.allowed());
        assert_eq!(decision.effective_authorization(), Some("Bearer sk-sys"));
        assert_eq!(key_source("Bearer nk-secret", &decision), KeySource::System);
    }

    #[test]
    fn test_wrong_code_rejected() {
        let policy = code_policy(&["secret"]);
        let decision = authorize("Bearer nk-guess", ProviderId::OpenAI, &policy);

        assert!(!decision.allowed());
        assert_eq!(decision.failure(), Some(&AuthFailure::WrongAccessCode));
        assert_eq!(decision.failure_reason().as_deref(), Some("wrong access code"));
    }

    #[test]
    fn test_empty_code_rejected() {
        let policy = code_policy(&["secret"]);
        for header in ["", "Bearer ", "Bearer nk-"] {
            let decision = authorize(header, ProviderId::OpenAI, &policy);
            assert_eq!(decision.failure(), Some(&AuthFailure::EmptyAccessCode), "{header:?}");
        }
    }

    #[test]
    fn test_caller_key_bypasses_code_requirement() {
        let policy = code_policy(&["secret"]);
        let decision = authorize("Bearer sk-mine", ProviderId::OpenAI, &policy);

        assert!(decision.allowed());
        assert_eq!(decision.effective_authorization(), Some("Bearer sk-mine"));
        assert_eq!(key_source("Bearer sk-mine", &decision), KeySource::Caller);
    }

    #[test]
    fn test_hidden_user_keys() {
        let mut policy = ServerPolicy::default().with_system_key(ProviderId::OpenAI, "sk-sys");
        policy.hide_user_keys = true;

        let decision = authorize("Bearer sk-x", ProviderId::OpenAI, &policy);
        assert!(!decision.allowed());
        assert_eq!(
            decision.failure_reason().as_deref(),
            Some("caller-supplied keys are not permitted")
        );
        assert_eq!(decision.effective_authorization(), None);
    }

    #[test]
    fn test_missing_system_key_passes_through() {
        let policy = code_policy(&["secret"]);
        let decision = authorize("Bearer nk-secret", ProviderId::ChatGLM, &policy);

        assert!(decision.allowed());
        assert_eq!(decision.effective_authorization(), None);
        assert_eq!(key_source("Bearer nk-secret", &decision), KeySource::None);
    }

    #[test]
    fn test_open_policy_allows_anonymous() {
        let policy = ServerPolicy::default().with_system_key(ProviderId::Google, "g-key");
        let decision = authorize("", ProviderId::Google, &policy);
        assert!(decision.allowed());
        assert_eq!(decision.effective_key(), Some("g-key"));
    }

    #[test]
    fn test_upstream_credential_per_provider() {
        let policy = ServerPolicy::default();
        let decision = AuthDecision::allow(Some("Bearer k1".to_string()));

        assert_eq!(
            upstream_credential(&decision, ProviderId::OpenAI, &policy),
            UpstreamCredential::Header {
                name: "authorization".into(),
                value: "Bearer k1".into()
            }
        );
        assert_eq!(
            upstream_credential(&decision, ProviderId::Google, &policy),
            UpstreamCredential::Header {
                name: "x-goog-api-key".into(),
                value: "k1".into()
            }
        );
        assert_eq!(
            upstream_credential(&decision, ProviderId::ChatGLM, &policy),
            UpstreamCredential::Signed {
                compound_key: "k1".into()
            }
        );
    }

    #[test]
    fn test_upstream_credential_azure_header() {
        let policy = ServerPolicy {
            azure_mode: true,
            ..Default::default()
        };
        let decision = AuthDecision::allow(Some("Bearer az".to_string()));
        assert_eq!(
            upstream_credential(&decision, ProviderId::OpenAI, &policy),
            UpstreamCredential::Header {
                name: "api-key".into(),
                value: "az".into()
            }
        );
    }

    #[test]
    fn test_azure_mode_chatglm_signs_its_own_key() {
        let policy = ServerPolicy {
            azure_mode: true,
            azure_key: Some("az-key".into()),
            ..Default::default()
        }
        .with_codes(["team"])
        .with_system_key(ProviderId::ChatGLM, "glmid.glmsecret");

        let decision = authorize("Bearer nk-team", ProviderId::ChatGLM, &policy);
        let credential = upstream_credential(&decision, ProviderId::ChatGLM, &policy);
        assert_eq!(
            credential,
            UpstreamCredential::Signed {
                compound_key: "glmid.glmsecret".into()
            }
        );
        assert!(credential.resolve(&TokenIssuer::default(), 3600).is_ok());
    }

    #[test]
    fn test_upstream_credential_none_without_key() {
        let decision = AuthDecision::allow(None);
        assert_eq!(
            upstream_credential(&decision, ProviderId::OpenAI, &ServerPolicy::default()),
            UpstreamCredential::None
        );
    }

    #[test]
    fn test_resolve_signed_credential() {
        let issuer = TokenIssuer::new(crate::auth::FixedClock(100));
        let cred = UpstreamCredential::Signed {
            compound_key: "abc.def".into(),
        };
        let (name, value) = cred.resolve(&issuer, 3600).unwrap().unwrap();
        assert_eq!(name, "authorization");
        assert!(!value.starts_with("Bearer "));
        assert_eq!(value.split('.').count(), 3);
    }

    #[test]
    fn test_resolve_malformed_signed_credential() {
        let cred = UpstreamCredential::Signed {
            compound_key: "nodot".into(),
        };
        assert_eq!(
            cred.resolve(&TokenIssuer::default(), 3600),
            Err(TokenError::MalformedKey)
        );
    }

    #[test]
    fn test_resolve_header_and_none() {
        let issuer = TokenIssuer::default();
        assert_eq!(UpstreamCredential::None.resolve(&issuer, 1), Ok(None));
        let cred = UpstreamCredential::Header {
            name: "x-goog-api-key".into(),
            value: "g".into(),
        };
        assert_eq!(
            cred.resolve(&issuer, 1),
            Ok(Some(("x-goog-api-key".to_string(), "g".to_string())))
        );
    }

    proptest! {
        /// With codes required and no caller key, access is granted exactly
        /// when the code's digest is in the store.
        #[test]
        fn prop_authorize_matches_digest_membership(
            stored in proptest::collection::vec("[a-z0-9]{1,12}", 1..5),
            candidate in "[a-z0-9]{1,12}",
        ) {
            let policy = ServerPolicy::default().with_codes(stored.iter());
            let decision = authorize(&format!("Bearer nk-{}", candidate), ProviderId::OpenAI, &policy);
            let expected = policy.hashed_codes.contains(&crate::auth::hash_access_code(&candidate));
            prop_assert_eq!(decision.allowed(), expected);
        }

        #[test]
        fn prop_authorize_never_injects_for_denied(header in ".{0,40}") {
            let policy = ServerPolicy::default()
                .with_codes(["fixed-code"])
                .with_system_key(ProviderId::OpenAI, "sk-sys");
            let decision = authorize(&header, ProviderId::OpenAI, &policy);
            if !decision.allowed() {
                prop_assert!(decision.effective_authorization().is_none());
            }
        }
    }
}
