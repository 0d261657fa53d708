// Upstream stream decoding: SSE framing and chat payload parsing.

pub mod parsers;
pub mod sse;

pub use parsers::{diagnostic_text, parse_delta, DeltaEvent};
pub use sse::{format_sse, SseEvent, SseParser};
