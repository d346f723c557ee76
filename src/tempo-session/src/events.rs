use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::SessionError;

/// `onError` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: i32,
    pub message: String,
}

impl From<&SessionError> for ErrorPayload {
    fn from(err: &SessionError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Notification sent to the host.
///
/// Serializes as `{"method": "onPosition", "arguments": 0.25}`; variants
/// without a payload omit `arguments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", content = "arguments")]
pub enum SessionEvent {
    #[serde(rename = "onIsPlaying")]
    IsPlaying,
    #[serde(rename = "onIsPaused")]
    IsPaused,
    #[serde(rename = "onIsLoading")]
    IsLoading,
    #[serde(rename = "onPlayNext")]
    PlayNext,
    #[serde(rename = "onPlayPrevious")]
    PlayPrevious,
    /// Rounded milliseconds, `None` while the duration is indefinite.
    #[serde(rename = "onDuration")]
    Duration(Option<i64>),
    #[serde(rename = "onPosition")]
    Position(f64),
    #[serde(rename = "onCompleted")]
    Completed,
    #[serde(rename = "onError")]
    Error(ErrorPayload),
}

impl SessionEvent {
    pub fn method(&self) -> &'static str {
        match self {
            SessionEvent::IsPlaying => "onIsPlaying",
            SessionEvent::IsPaused => "onIsPaused",
            SessionEvent::IsLoading => "onIsLoading",
            SessionEvent::PlayNext => "onPlayNext",
            SessionEvent::PlayPrevious => "onPlayPrevious",
            SessionEvent::Duration(_) => "onDuration",
            SessionEvent::Position(_) => "onPosition",
            SessionEvent::Completed => "onCompleted",
            SessionEvent::Error(_) => "onError",
        }
    }
}

/// Receives notifications from a [`PlaybackSession`](crate::PlaybackSession).
pub trait SessionListener: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

impl SessionListener for tokio::sync::mpsc::UnboundedSender<SessionEvent> {
    fn notify(&self, event: SessionEvent) {
        if self.send(event).is_err() {
            tracing::debug!("session listener channel closed");
        }
    }
}

/// Listener that keeps every notification in memory.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns and forgets everything recorded so far.
    pub fn take(&self) -> Vec<SessionEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn positions(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Position(fraction) => Some(fraction),
                _ => None,
            })
            .collect()
    }
}

impl SessionListener for EventLog {
    fn notify(&self, event: SessionEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
