// Paced chat sessions: upstream stream in, smoothed text out.

pub mod controller;
pub mod observer;
pub mod state;

pub use controller::{
    CancelHandle, ChatSessionController, ChatTarget, SessionConfig, SessionError, SessionHandle,
    SessionOutcome,
};
pub use observer::{ChannelObserver, SessionEvent, SessionObserver};
pub use state::{SessionState, StreamSession};
