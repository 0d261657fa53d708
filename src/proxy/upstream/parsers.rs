use serde_json::Value;

use crate::models::{ChatCompletion, ChatCompletionChunk};
use crate::modules::Locale;

/// Sentinel `data` payload that ends an upstream stream.
pub const DONE_MARKER: &str = "[DONE]";

/// One decoded upstream stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    /// Text fragment; may be empty (role-only or usage chunks)
    Content(String),
    Done,
}

/// Decode the `data` of an upstream SSE event.
pub fn parse_delta(data: &str) -> Result<DeltaEvent, serde_json::Error> {
    let data = data.trim();
    if data == DONE_MARKER {
        return Ok(DeltaEvent::Done);
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();
    Ok(DeltaEvent::Content(content))
}

/// `choices[0].message.content` of a non-streamed completion.
pub fn extract_message(body: &str) -> Result<String, serde_json::Error> {
    let completion: ChatCompletion = serde_json::from_str(body)?;
    Ok(completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

/// Render a JSON value as a fenced ```json block for display.
pub fn pretty_object(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    if text == "{}" || text.starts_with("```json") {
        return text;
    }
    ["```json", text.as_str(), "```"].join("\n")
}

/// Text delivered to the caller when the upstream refused or failed a request.
///
/// Parts (any empty ones dropped), separated by a blank line:
/// the localized unauthorized hint for 401, then the body (pretty JSON when it parses).
pub fn diagnostic_text(status: u16, body: &str, locale: Locale) -> String {
    let hint = if status == 401 {
        locale.unauthorized_hint().to_string()
    } else {
        String::new()
    };

    let extra = match serde_json::from_str::<Value>(body) {
        Ok(json) => pretty_object(&json),
        Err(_) => body.to_string(),
    };

    join_parts([hint, extra])
}

/// Join non-empty parts with a blank line.
pub fn join_parts<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .filter(|p| !p.as_ref().trim().is_empty())
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}
