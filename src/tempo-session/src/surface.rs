//! System "now playing" surface (lock screen, control center).
//!
//! The session stores durations and positions in milliseconds; the surface
//! speaks seconds. [`project_now_playing`] is the only place that converts.

use std::sync::{Arc, Mutex, MutexGuard};

use tempo_core::TrackMetadata;
use tempo_media::TimeControlStatus;

use crate::Artwork;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NowPlayingState {
    Playing,
    Paused,
}

/// Record handed to the system surface.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    /// 1.0 while actively playing, otherwise 0.0.
    pub playback_rate: f64,
    pub title: String,
    pub album: String,
    pub artist: String,
    pub duration_seconds: Option<f64>,
    pub elapsed_seconds: Option<f64>,
    pub artwork: Option<Artwork>,
    pub state: NowPlayingState,
}

/// Borrowed view of the session used for projection.
#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot<'a> {
    pub has_handle: bool,
    pub time_control: TimeControlStatus,
    pub rate: f64,
    pub track: &'a TrackMetadata,
    pub duration_ms: Option<f64>,
    pub position_fraction: f64,
    pub artwork: Option<&'a Artwork>,
}

pub fn project_now_playing(snapshot: &SessionSnapshot<'_>) -> Option<NowPlayingInfo> {
    if !snapshot.has_handle {
        return None;
    }

    let playing = snapshot.time_control == TimeControlStatus::Playing;
    let duration_seconds = snapshot.duration_ms.map(|ms| ms / 1000.0);
    let elapsed_seconds = snapshot
        .duration_ms
        .map(|ms| snapshot.position_fraction * ms / 1000.0);

    Some(NowPlayingInfo {
        playback_rate: if playing { 1.0 } else { 0.0 },
        title: snapshot.track.track_name.clone(),
        album: snapshot.track.album_name.clone(),
        artist: snapshot.track.artist_name.clone(),
        duration_seconds,
        elapsed_seconds,
        artwork: snapshot.artwork.cloned(),
        state: if snapshot.rate == 0.0 {
            NowPlayingState::Paused
        } else {
            NowPlayingState::Playing
        },
    })
}

pub trait NowPlayingSurface: Send + Sync {
    fn publish(&self, info: NowPlayingInfo);
    fn clear(&self);
}

#[derive(Debug, Default)]
struct SurfaceState {
    current: Option<NowPlayingInfo>,
    publishes: usize,
    clears: usize,
}

/// Surface that just remembers the last record.
#[derive(Debug, Clone, Default)]
pub struct InMemorySurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl InMemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> Option<NowPlayingInfo> {
        self.state().current.clone()
    }

    pub fn publishes(&self) -> usize {
        self.state().publishes
    }

    pub fn clears(&self) -> usize {
        self.state().clears
    }
}

impl NowPlayingSurface for InMemorySurface {
    fn publish(&self, info: NowPlayingInfo) {
        let mut state = self.state();
        state.current = Some(info);
        state.publishes += 1;
    }

    fn clear(&self) {
        let mut state = self.state();
        state.current = None;
        state.clears += 1;
    }
}
