use tokio::sync::mpsc;

use super::controller::SessionError;

/// Receives the progress of a paced session.
///
/// Calls arrive from the session task in order: any number of `on_update`
/// and at most one `on_error`, then exactly one `on_finish` last.
pub trait SessionObserver: Send + 'static {
    /// `delivered` is the full text so far; `fragment` what this tick added.
    fn on_update(&mut self, delivered: &str, fragment: &str);

    fn on_finish(&mut self, final_text: &str);

    fn on_error(&mut self, error: &SessionError);
}

/// Owned copy of an observer callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Update { delivered_len: usize, fragment: String },
    Error { message: String },
    Finish { text: String },
}

/// Forwards callbacks into an unbounded channel.
///
/// A dropped receiver is not an error: the session keeps running to its
/// end and events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_update(&mut self, delivered: &str, fragment: &str) {
        let _ = self.tx.send(SessionEvent::Update {
            delivered_len: delivered.chars().count(),
            fragment: fragment.to_string(),
        });
    }

    fn on_finish(&mut self, final_text: &str) {
        let _ = self.tx.send(SessionEvent::Finish {
            text: final_text.to_string(),
        });
    }

    fn on_error(&mut self, error: &SessionError) {
        let _ = self.tx.send(SessionEvent::Error {
            message: error.to_string(),
        });
    }
}
