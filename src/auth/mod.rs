pub mod config;
pub mod gate;
pub mod policy;
pub mod token_issuer;
pub mod types;

pub use config::{hash_access_code, ACCESS_CODE_PREFIX, SIGNED_TOKEN_TTL};
pub use gate::{authorize, key_source, upstream_credential, UpstreamCredential};
pub use policy::ServerPolicy;
pub use token_issuer::{Clock, FixedClock, SystemClock, TokenIssuer};
pub use types::{
    AccessCredential, AuthDecision, AuthFailure, CompoundKey, IssuedToken, KeySource, TokenError,
};
