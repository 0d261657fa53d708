use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::types::{CompoundKey, IssuedToken, SignedTokenClaims, SignedTokenHeader, TokenError};

type HmacSha256 = Hmac<Sha256>;

/// Source of the current time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic signing.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> i64 {
        self.0
    }
}

/// Mints HS256 compact tokens from `id.secret` provider keys.
pub struct TokenIssuer {
    clock: Box<dyn Clock>,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }

    /// Sign a token valid for `ttl_seconds` from now.
    ///
    /// `base64url(header).base64url(claims).base64url(HMAC-SHA256(secret, signing_input))`
    pub fn issue(&self, compound_key: &str, ttl_seconds: i64) -> Result<IssuedToken, TokenError> {
        let key = CompoundKey::parse(compound_key)?;
        let now = self.clock.now_epoch_seconds();
        let exp = now.checked_add(ttl_seconds).ok_or_else(|| {
            TokenError::Signing(format!("expiry overflows: {} + {}", now, ttl_seconds))
        })?;

        let header = SignedTokenHeader {
            alg: "HS256".to_string(),
            sign_type: "SIGN".to_string(),
        };
        let claims = SignedTokenClaims {
            api_key: key.id,
            exp,
            timestamp: now,
        };

        let header_json =
            serde_json::to_vec(&header).map_err(|e| TokenError::Signing(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let mut mac = HmacSha256::new_from_slice(key.secret.as_bytes())
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            signed_value: format!("{}.{}", signing_input, signature),
            issued_at: now,
            expires_at: exp,
        })
    }
}
