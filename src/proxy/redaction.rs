// Log hygiene: credentials and access codes never reach the logs in clear.

use serde_json::{Map, Value};

use crate::auth::ACCESS_CODE_PREFIX;

const MASK: &str = "[REDACTED]";

/// Object keys whose values are always masked, compared after dropping
/// punctuation and case.
const SECRET_KEYS: &[&str] = &[
    "authorization",
    "apikey",
    "xgoogapikey",
    "code",
    "accesscode",
    "secret",
    "token",
];

/// Word prefixes that mark the word itself as a secret.
const SECRET_PREFIXES: &[&str] = &[ACCESS_CODE_PREFIX, "sk-"];

/// Mask secrets in an upstream body or any other text before logging it.
///
/// JSON keeps its shape with secret fields replaced; anything else is
/// scanned word by word.
pub fn redact_sensitive_text(input: &str) -> String {
    match serde_json::from_str::<Value>(input) {
        Ok(json) if json.is_object() || json.is_array() => scrub(json, false).to_string(),
        _ => scrub_words(input),
    }
}

/// Short fingerprint of a credential header for logs: scheme kept,
/// at most the first 4 characters of the secret shown.
///
/// `"Bearer sk-abcdef"` → `"Bearer sk-a…"`, `"Bearer nk-team"` → `"Bearer nk-…"`.
pub fn mask_credential(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "(none)".to_string();
    }
    let (scheme, secret) = match value.strip_prefix("Bearer ") {
        Some(rest) => ("Bearer ", rest.trim()),
        None => ("", value),
    };
    if secret.starts_with(ACCESS_CODE_PREFIX) {
        return format!("{}{}…", scheme, ACCESS_CODE_PREFIX);
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}{}…", scheme, visible)
}

fn is_secret_key(key: &str) -> bool {
    let folded: String = key
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    SECRET_KEYS.contains(&folded.as_str())
}

fn scrub(value: Value, secret: bool) -> Value {
    if secret {
        return Value::String(MASK.to_string());
    }
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = scrub(v, is_secret_key(&k));
                    (k, v)
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| scrub(v, false)).collect()),
        Value::String(s) => Value::String(scrub_words(&s)),
        other => other,
    }
}

/// Mask the word after a `Bearer` scheme and any word carrying a secret
/// prefix. Whitespace is preserved.
fn scrub_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut after_scheme = false;
    let mut rest = input;

    while !rest.is_empty() {
        let ws = rest.len() - rest.trim_start().len();
        out.push_str(&rest[..ws]);
        rest = &rest[ws..];
        if rest.is_empty() {
            break;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..end];
        rest = &rest[end..];

        if after_scheme {
            out.push_str(MASK);
            after_scheme = false;
        } else if word.eq_ignore_ascii_case("bearer") {
            out.push_str(word);
            after_scheme = true;
        } else if let Some(prefix) = SECRET_PREFIXES.iter().find(|p| word.starts_with(**p)) {
            out.push_str(prefix);
            out.push_str(MASK);
        } else {
            out.push_str(word);
        }
    }
    out
}
