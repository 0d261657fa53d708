use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{TokenError, TokenIssuer, UpstreamCredential, SIGNED_TOKEN_TTL};
use crate::models::ChatRequest;
use crate::modules::Locale;
use crate::proxy::errors::classify_network_error;
use crate::proxy::upstream::parsers::{diagnostic_text, extract_message, parse_delta, DeltaEvent};
use crate::proxy::upstream::sse::{SseEvent, SseParser};

use super::observer::SessionObserver;
use super::state::{SessionState, StreamSession};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0}")]
    Credential(#[from] TokenError),

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("{0}")]
    UpstreamNetwork(String),

    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("upstream stream interrupted: {0}")]
    Stream(String),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pacing tick
    pub pacing_interval: Duration,
    /// Deadline until the upstream stream opens (whole call when not streaming)
    pub request_timeout: Duration,
    pub token_ttl_seconds: i64,
    pub locale: Locale,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pacing_interval: Duration::from_millis(16),
            request_timeout: Duration::from_secs(60),
            token_ttl_seconds: SIGNED_TOKEN_TTL,
            locale: Locale::En,
        }
    }
}

/// Where a session sends its chat request.
#[derive(Debug, Clone)]
pub struct ChatTarget {
    /// Full chat-completions URL
    pub url: String,
    pub credential: UpstreamCredential,
}

/// Cancels a running session. Cheap to clone; cancelling twice is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Guard that cancels the session when dropped.
    pub fn drop_guard(&self) -> tokio_util::sync::DropGuard {
        self.0.clone().drop_guard()
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub text: String,
    pub state: SessionState,
    pub error: Option<SessionError>,
}

pub struct SessionHandle {
    cancel: CancelHandle,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session task to end.
    pub async fn join(self) -> SessionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[Session] Task failed: {}", e);
                SessionOutcome {
                    text: String::new(),
                    state: SessionState::Aborted,
                    error: Some(SessionError::Stream(e.to_string())),
                }
            }
        }
    }
}

enum Deadline<T> {
    Done(T),
    Failed(reqwest::Error),
    TimedOut,
    Cancelled,
}

/// Run `fut` until it resolves, `deadline` passes or the session is cancelled.
async fn within<T, F>(fut: F, deadline: Option<Duration>, cancel: &CancellationToken) -> Deadline<T>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    let sleep = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => futures::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Deadline::Cancelled,
        _ = sleep => Deadline::TimedOut,
        result = fut => match result {
            Ok(value) => Deadline::Done(value),
            Err(e) if e.is_timeout() => Deadline::TimedOut,
            Err(e) => Deadline::Failed(e),
        },
    }
}

pub(crate) fn new_trace_id() -> String {
    rand::Rng::sample_iter(rand::thread_rng(), &rand::distributions::Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Drives paced chat sessions: one tokio task per session.
#[derive(Debug, Clone)]
pub struct ChatSessionController {
    client: reqwest::Client,
    issuer: Arc<TokenIssuer>,
    config: SessionConfig,
}

impl ChatSessionController {
    pub fn new(client: reqwest::Client, issuer: Arc<TokenIssuer>, config: SessionConfig) -> Self {
        Self {
            client,
            issuer,
            config,
        }
    }

    /// Start a session. Progress is reported to `observer`; the returned
    /// handle cancels or awaits it.
    pub fn run<O: SessionObserver>(
        &self,
        request: ChatRequest,
        target: ChatTarget,
        observer: O,
    ) -> SessionHandle {
        let cancel = CancelHandle::default();
        let token = cancel.0.clone();
        let this = self.clone();

        let task = tokio::spawn(async move {
            let mut run = SessionRun {
                trace_id: new_trace_id(),
                session: StreamSession::new(),
                observer,
                error: None,
            };
            info!(
                "[{}] [Session] Start model={} stream={} url={}",
                run.trace_id, request.model, request.stream, target.url
            );
            if request.stream {
                this.drive_stream(&mut run, &request, &target, &token).await;
            } else {
                this.drive_single(&mut run, &request, &target, &token).await;
            }
            run.finish()
        });

        SessionHandle { cancel, task }
    }

    fn build_request(
        &self,
        request: &ChatRequest,
        target: &ChatTarget,
    ) -> Result<reqwest::RequestBuilder, TokenError> {
        let mut builder = self
            .client
            .post(&target.url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CACHE_CONTROL, "no-store")
            .json(request);

        if request.stream {
            builder = builder.header(header::ACCEPT, "text/event-stream");
        }
        if let Some((name, value)) = target
            .credential
            .resolve(&self.issuer, self.config.token_ttl_seconds)?
        {
            builder = builder.header(name, value);
        }
        Ok(builder)
    }

    async fn drive_stream<O: SessionObserver>(
        &self,
        run: &mut SessionRun<O>,
        request: &ChatRequest,
        target: &ChatTarget,
        cancel: &CancellationToken,
    ) {
        run.session.connect();

        let builder = match self.build_request(request, target) {
            Ok(b) => b,
            Err(e) => return run.fail(SessionError::from(e)),
        };

        let response = match within(builder.send(), Some(self.config.request_timeout), cancel).await {
            Deadline::Done(resp) => resp,
            Deadline::Cancelled => return run.abort(),
            Deadline::TimedOut => {
                warn!(
                    "[{}] [Session] No response within {:?}",
                    run.trace_id, self.config.request_timeout
                );
                run.fail(SessionError::UpstreamTimeout);
                return run.abort();
            }
            Deadline::Failed(e) => {
                let info = classify_network_error(&e);
                warn!("[{}] [Session] Upstream request failed: {}", run.trace_id, info.detail);
                return run.fail(SessionError::UpstreamNetwork(info.user_message));
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        debug!(
            "[{}] [Session] Upstream answered {} ({})",
            run.trace_id, status, content_type
        );

        if content_type.starts_with("text/plain") {
            match within(response.text(), None, cancel).await {
                Deadline::Done(text) => run.session.push_fragment(&text),
                Deadline::Cancelled => return run.abort(),
                Deadline::Failed(e) => return run.fail(SessionError::Stream(e.to_string())),
                Deadline::TimedOut => return run.fail(SessionError::UpstreamTimeout),
            }
            return;
        }

        if status != reqwest::StatusCode::OK || !content_type.starts_with("text/event-stream") {
            let body = match within(response.text(), None, cancel).await {
                Deadline::Done(text) => text,
                Deadline::Cancelled => return run.abort(),
                _ => String::new(),
            };
            warn!(
                "[{}] [Session] Upstream refused the stream: {} {}",
                run.trace_id,
                status,
                crate::proxy::redaction::redact_sensitive_text(&body)
            );
            run.session
                .append_diagnostic(&diagnostic_text(status.as_u16(), &body, self.config.locale));
            return;
        }

        run.session.open_stream();

        let mut body = response.bytes_stream();
        let mut parser = SseParser::new();
        let mut ticker = tokio::time::interval(self.config.pacing_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return run.abort();
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        if run.apply_events(parser.feed(&bytes)) {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("[{}] [Session] Stream error: {}", run.trace_id, e);
                        return run.fail(SessionError::Stream(e.to_string()));
                    }
                    None => {
                        run.apply_events(parser.finish());
                        debug!("[{}] [Session] Upstream closed", run.trace_id);
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if let Some(chunk) = run.session.next_chunk() {
                        run.observer.on_update(run.session.delivered(), &chunk);
                    }
                }
            }
        }
    }

    async fn drive_single<O: SessionObserver>(
        &self,
        run: &mut SessionRun<O>,
        request: &ChatRequest,
        target: &ChatTarget,
        cancel: &CancellationToken,
    ) {
        run.session.connect();

        let builder = match self.build_request(request, target) {
            Ok(b) => b,
            Err(e) => return run.fail(SessionError::from(e)),
        };

        let call = async {
            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, body) = match within(call, Some(self.config.request_timeout), cancel).await {
            Deadline::Done(result) => result,
            Deadline::Cancelled => return run.abort(),
            Deadline::TimedOut => {
                run.fail(SessionError::UpstreamTimeout);
                return run.abort();
            }
            Deadline::Failed(e) => {
                let info = classify_network_error(&e);
                return run.fail(SessionError::UpstreamNetwork(info.user_message));
            }
        };

        if !status.is_success() {
            run.error(SessionError::UpstreamStatus(status.as_u16()));
            run.session
                .append_diagnostic(&diagnostic_text(status.as_u16(), &body, self.config.locale));
            return;
        }

        match extract_message(&body) {
            Ok(message) => run.session.push_fragment(&message),
            Err(e) => {
                run.error(SessionError::InvalidResponse(e.to_string()));
                run.session.append_diagnostic(&body);
            }
        }
    }
}

/// Mutable state of one running session, owned by its task.
struct SessionRun<O> {
    trace_id: String,
    session: StreamSession,
    observer: O,
    error: Option<SessionError>,
}

impl<O: SessionObserver> SessionRun<O> {
    /// Report an error once without ending the session.
    fn error(&mut self, error: SessionError) {
        if self.error.is_none() {
            self.observer.on_error(&error);
            self.error = Some(error);
        }
    }

    /// Report an error and fold its message into the text.
    fn fail(&mut self, error: SessionError) {
        let message = error.to_string();
        self.error(error);
        self.session.append_diagnostic(&message);
    }

    fn abort(&mut self) {
        if self.session.request_abort() {
            info!("[{}] [Session] Aborted", self.trace_id);
        }
    }

    /// Apply decoded SSE events; `true` once the stream is complete.
    fn apply_events<I: IntoIterator<Item = SseEvent>>(&mut self, events: I) -> bool {
        for event in events {
            if self.session.is_finished() {
                return true;
            }
            match parse_delta(&event.data) {
                Ok(DeltaEvent::Done) => return true,
                Ok(DeltaEvent::Content(text)) => self.session.push_fragment(&text),
                Err(e) => {
                    warn!(
                        "[{}] [Session] Dropping unparseable payload ({}): {}",
                        self.trace_id, e, event.data
                    );
                }
            }
        }
        false
    }

    fn finish(mut self) -> SessionOutcome {
        let text = self.session.begin_finish().unwrap_or_default();
        self.observer.on_finish(&text);
        let state = self.session.complete();
        info!(
            "[{}] [Session] {} with {} chars",
            self.trace_id,
            state,
            text.chars().count()
        );
        SessionOutcome {
            text,
            state,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::session::observer::{ChannelObserver, SessionEvent};

    fn request(stream: bool) -> ChatRequest {
        serde_json::from_value(serde_json::json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": stream,
        }))
        .unwrap()
    }

    fn controller() -> ChatSessionController {
        ChatSessionController::new(
            reqwest::Client::new(),
            Arc::new(TokenIssuer::default()),
            SessionConfig {
                request_timeout: Duration::from_millis(500),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_cancel_handle_is_idempotent() {
        let handle = CancelHandle::default();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_session_error_messages() {
        assert_eq!(
            SessionError::from(TokenError::MalformedKey).to_string(),
            "invalid api key: expected `id.secret`"
        );
        assert_eq!(SessionError::UpstreamTimeout.to_string(), "upstream request timed out");
    }

    #[tokio::test]
    async fn test_malformed_signed_key_fails_then_finishes() {
        let (observer, mut rx) = ChannelObserver::new();
        let target = ChatTarget {
            url: "http://127.0.0.1:9/v1/chat/completions".into(),
            credential: UpstreamCredential::Signed {
                compound_key: "nodot".into(),
            },
        };
        let outcome = controller().run(request(true), target, observer).join().await;

        assert_eq!(outcome.error, Some(SessionError::Credential(TokenError::MalformedKey)));
        assert_eq!(outcome.state, SessionState::Finished);
        assert!(matches!(rx.recv().await, Some(SessionEvent::Error { .. })));
        assert!(matches!(rx.recv().await, Some(SessionEvent::Finish { .. })));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_reports_network_error() {
        let (observer, mut rx) = ChannelObserver::new();
        let target = ChatTarget {
            url: "http://127.0.0.1:9/v1/chat/completions".into(),
            credential: UpstreamCredential::None,
        };
        let outcome = controller().run(request(false), target, observer).join().await;

        assert!(matches!(
            outcome.error,
            Some(SessionError::UpstreamNetwork(_)) | Some(SessionError::UpstreamTimeout)
        ));
        assert!(!outcome.text.is_empty());

        let mut finishes = 0;
        while let Some(event) = rx.recv().await {
            if let SessionEvent::Finish { .. } = event {
                finishes += 1;
            }
        }
        assert_eq!(finishes, 1);
    }
}
