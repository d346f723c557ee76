use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::MediaTime;

/// Media backend errors.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media backend unavailable: {0}")]
    Backend(String),
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Readiness of the item attached to a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Source attached, not yet decodable.
    Loading,
    /// Decodable and seekable.
    ReadyToPlay,
    Failed,
    /// The backend reported a status it could not classify.
    Unknown,
}

/// What the player is doing with its rate right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeControlStatus {
    Paused,
    /// Asked to play but stalled (buffering, not yet ready).
    WaitingToPlay,
    Playing,
}

/// Property a subscriber can observe on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedProperty {
    Status,
    TimeControlStatus,
    Duration,
    PlayedToEnd,
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandleEvent {
    StatusChanged(ItemStatus),
    TimeControlChanged(TimeControlStatus),
    DurationChanged(MediaTime),
    PlayedToEnd,
}

impl HandleEvent {
    pub fn property(&self) -> ObservedProperty {
        match self {
            HandleEvent::StatusChanged(_) => ObservedProperty::Status,
            HandleEvent::TimeControlChanged(_) => ObservedProperty::TimeControlStatus,
            HandleEvent::DurationChanged(_) => ObservedProperty::Duration,
            HandleEvent::PlayedToEnd => ObservedProperty::PlayedToEnd,
        }
    }
}

pub type HandleCallback = Arc<dyn Fn(HandleEvent) + Send + Sync>;

/// Owned registration returned by [`MediaHandle::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Player object for one loaded source.
///
/// Callbacks may fire from any thread; implementations must not hold internal
/// locks while invoking them.
pub trait MediaHandle: Send {
    fn status(&self) -> ItemStatus;
    fn time_control_status(&self) -> TimeControlStatus;
    fn rate(&self) -> f64;
    /// Indefinite until the item is ready.
    fn current_time(&self) -> MediaTime;
    /// Indefinite until the source resolves it.
    fn duration(&self) -> MediaTime;

    fn play_immediately(&self, rate: f64);
    fn play(&self) {
        self.play_immediately(1.0);
    }
    fn pause(&self);
    fn seek(&self, to: MediaTime, tolerance_before: MediaTime, tolerance_after: MediaTime);

    fn subscribe(&self, property: ObservedProperty, callback: HandleCallback) -> SubscriptionToken;
    /// Returns whether the token was still live. Unknown tokens are ignored.
    fn unsubscribe(&self, token: SubscriptionToken) -> bool;

    /// Stops playback and detaches the source.
    fn release(&self);
}

/// Creates handles for sources.
pub trait MediaProvider: Send + Sync {
    fn open(&self, url: &Url) -> MediaResult<Box<dyn MediaHandle>>;
}
