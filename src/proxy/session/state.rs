use std::fmt;

/// Each pacing tick moves roughly 1/60th of the backlog.
pub const PACING_DIVISOR: usize = 60;

/// Lifecycle of one streamed chat session.
///
/// `Init → Connecting → Streaming → Finishing → Finished`, with `Aborted`
/// reachable from `Connecting` and `Streaming` through cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Connecting,
    Streaming,
    Finishing,
    Finished,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "init",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Finishing => "finishing",
            SessionState::Finished => "finished",
            SessionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Text buffers and flags of one session. Owned by a single task, no locking.
#[derive(Debug)]
pub struct StreamSession {
    state: SessionState,
    delivered: String,
    pending: String,
    finished: bool,
    abort_requested: bool,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Init,
            delivered: String::new(),
            pending: String::new(),
            finished: false,
            abort_requested: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn delivered(&self) -> &str {
        &self.delivered
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn connect(&mut self) {
        if self.state == SessionState::Init {
            self.state = SessionState::Connecting;
        }
    }

    pub fn open_stream(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Streaming;
        }
    }

    /// Queue an upstream fragment for paced delivery. Ignored once finishing.
    pub fn push_fragment(&mut self, fragment: &str) {
        if self.finished || fragment.is_empty() {
            return;
        }
        self.pending.push_str(fragment);
    }

    /// Queue diagnostic text, separated from what is already there by a blank line.
    pub fn append_diagnostic(&mut self, text: &str) {
        if self.finished || text.trim().is_empty() {
            return;
        }
        if !self.delivered.is_empty() || !self.pending.is_empty() {
            self.pending.push_str("\n\n");
        }
        self.pending.push_str(text);
    }

    /// Characters to move on the next tick: `max(1, round(pending/60))`.
    pub fn chunk_len(&self) -> usize {
        let remaining = self.pending.chars().count();
        if remaining == 0 {
            return 0;
        }
        let rounded = (remaining as f64 / PACING_DIVISOR as f64).round() as usize;
        rounded.max(1).min(remaining)
    }

    /// Move one paced chunk from `pending` to `delivered`.
    ///
    /// Returns the chunk, or `None` when nothing is pending or the session
    /// is no longer streaming.
    pub fn next_chunk(&mut self) -> Option<String> {
        if self.state != SessionState::Streaming {
            return None;
        }
        let n = self.chunk_len();
        if n == 0 {
            return None;
        }
        let split = self
            .pending
            .char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(self.pending.len());
        let chunk: String = self.pending.drain(..split).collect();
        self.delivered.push_str(&chunk);
        Some(chunk)
    }

    /// Record a cancellation and flush the backlog into `delivered`.
    ///
    /// Returns `true` only for the first request.
    pub fn request_abort(&mut self) -> bool {
        if self.abort_requested || self.finished {
            return false;
        }
        self.abort_requested = true;
        let rest = std::mem::take(&mut self.pending);
        self.delivered.push_str(&rest);
        true
    }

    /// Enter `Finishing` and produce the final text, exactly once.
    ///
    /// Later calls return `None`.
    pub fn begin_finish(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.state = SessionState::Finishing;
        let rest = std::mem::take(&mut self.pending);
        self.delivered.push_str(&rest);
        Some(self.delivered.clone())
    }

    /// Settle into the terminal state.
    pub fn complete(&mut self) -> SessionState {
        if self.state == SessionState::Finishing {
            self.state = if self.abort_requested {
                SessionState::Aborted
            } else {
                SessionState::Finished
            };
        }
        self.state
    }
}
