//! In-process media backend for headless runs and tests.
//!
//! Nothing is decoded: a simulated handle keeps a virtual playhead that only
//! moves when [`SimulatedHandle::advance`] is called, and it records every
//! subscription and seek so callers can assert on them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use url::Url;

use crate::{
    HandleCallback, HandleEvent, ItemStatus, MediaError, MediaHandle, MediaProvider, MediaResult,
    MediaTime, ObservedProperty, SubscriptionToken, TimeControlStatus,
};

/// A seek as received by a simulated handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    pub to: MediaTime,
    pub tolerance_before: MediaTime,
    pub tolerance_after: MediaTime,
}

struct SimState {
    url: Url,
    status: ItemStatus,
    time_control: TimeControlStatus,
    rate: f64,
    position_ms: f64,
    duration: MediaTime,
    subscribers: BTreeMap<SubscriptionToken, (ObservedProperty, HandleCallback)>,
    next_token: u64,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    seeks: Vec<SeekRequest>,
    release_calls: usize,
}

/// Shared view of a simulated handle. Clones observe the same player.
#[derive(Clone)]
pub struct SimulatedHandle {
    inner: Arc<Mutex<SimState>>,
}

impl std::fmt::Debug for SimulatedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SimulatedHandle")
            .field("url", &state.url.as_str())
            .field("status", &state.status)
            .field("time_control", &state.time_control)
            .field("position_ms", &state.position_ms)
            .finish_non_exhaustive()
    }
}

impl SimulatedHandle {
    fn new(url: Url) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                url,
                status: ItemStatus::Loading,
                time_control: TimeControlStatus::Paused,
                rate: 0.0,
                position_ms: 0.0,
                duration: MediaTime::INDEFINITE,
                subscribers: BTreeMap::new(),
                next_token: 1,
                subscribe_calls: 0,
                unsubscribe_calls: 0,
                seeks: Vec::new(),
                release_calls: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, event: HandleEvent) {
        let callbacks: Vec<HandleCallback> = {
            let state = self.state();
            if state.release_calls > 0 {
                return;
            }
            state
                .subscribers
                .values()
                .filter(|(property, _)| *property == event.property())
                .map(|(_, callback)| callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    fn set_time_control(&self, next: TimeControlStatus) {
        let changed = {
            let mut state = self.state();
            let changed = state.time_control != next;
            state.time_control = next;
            changed
        };
        if changed {
            self.notify(HandleEvent::TimeControlChanged(next));
        }
    }

    pub fn url(&self) -> Url {
        self.state().url.clone()
    }

    /// The source finished loading with the given length.
    pub fn resolve(&self, duration: Duration) {
        let duration = MediaTime::from_duration(duration);
        let wants_to_play = {
            let mut state = self.state();
            state.status = ItemStatus::ReadyToPlay;
            state.duration = duration;
            state.rate > 0.0
        };
        self.notify(HandleEvent::DurationChanged(duration));
        self.notify(HandleEvent::StatusChanged(ItemStatus::ReadyToPlay));
        if wants_to_play {
            self.set_time_control(TimeControlStatus::Playing);
        }
    }

    /// The backend lost track of the length (e.g. a live stream).
    pub fn make_duration_indefinite(&self) {
        self.state().duration = MediaTime::INDEFINITE;
        self.notify(HandleEvent::DurationChanged(MediaTime::INDEFINITE));
    }

    pub fn fail(&self) {
        self.state().status = ItemStatus::Failed;
        self.notify(HandleEvent::StatusChanged(ItemStatus::Failed));
    }

    pub fn report_unknown_status(&self) {
        self.state().status = ItemStatus::Unknown;
        self.notify(HandleEvent::StatusChanged(ItemStatus::Unknown));
    }

    /// Playback stalls waiting for data.
    pub fn stall(&self) {
        self.set_time_control(TimeControlStatus::WaitingToPlay);
    }

    pub fn set_position(&self, position: Duration) {
        self.state().position_ms = position.as_secs_f64() * 1000.0;
    }

    /// Moves the playhead while playing. Reaching the end pauses and
    /// signals end-of-media.
    pub fn advance(&self, by: Duration) {
        let reached_end = {
            let mut state = self.state();
            if state.time_control != TimeControlStatus::Playing {
                return;
            }
            state.position_ms += by.as_secs_f64() * 1000.0 * state.rate;
            match state.duration.as_millis() {
                Some(total) if state.position_ms >= total => {
                    state.position_ms = total;
                    state.rate = 0.0;
                    true
                }
                _ => false,
            }
        };
        if reached_end {
            self.notify(HandleEvent::PlayedToEnd);
            self.set_time_control(TimeControlStatus::Paused);
        }
    }

    pub fn position_ms(&self) -> f64 {
        self.state().position_ms
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state().unsubscribe_calls
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state().subscribers.len()
    }

    pub fn seeks(&self) -> Vec<SeekRequest> {
        self.state().seeks.clone()
    }

    pub fn release_calls(&self) -> usize {
        self.state().release_calls
    }
}

impl MediaHandle for SimulatedHandle {
    fn status(&self) -> ItemStatus {
        self.state().status
    }

    fn time_control_status(&self) -> TimeControlStatus {
        self.state().time_control
    }

    fn rate(&self) -> f64 {
        self.state().rate
    }

    fn current_time(&self) -> MediaTime {
        let state = self.state();
        if state.status != ItemStatus::ReadyToPlay {
            return MediaTime::INDEFINITE;
        }
        MediaTime::from_millis(state.position_ms)
    }

    fn duration(&self) -> MediaTime {
        self.state().duration
    }

    fn play_immediately(&self, rate: f64) {
        let next = {
            let mut state = self.state();
            state.rate = rate;
            if rate <= 0.0 {
                TimeControlStatus::Paused
            } else if state.status == ItemStatus::ReadyToPlay {
                TimeControlStatus::Playing
            } else {
                TimeControlStatus::WaitingToPlay
            }
        };
        self.set_time_control(next);
    }

    fn pause(&self) {
        self.state().rate = 0.0;
        self.set_time_control(TimeControlStatus::Paused);
    }

    fn seek(&self, to: MediaTime, tolerance_before: MediaTime, tolerance_after: MediaTime) {
        let mut state = self.state();
        state.seeks.push(SeekRequest {
            to,
            tolerance_before,
            tolerance_after,
        });
        if let Some(target) = to.as_millis() {
            let upper = state.duration.as_millis().unwrap_or(f64::MAX);
            state.position_ms = target.clamp(0.0, upper);
        }
    }

    fn subscribe(&self, property: ObservedProperty, callback: HandleCallback) -> SubscriptionToken {
        let mut state = self.state();
        let token = SubscriptionToken::new(state.next_token);
        state.next_token += 1;
        state.subscribe_calls += 1;
        state.subscribers.insert(token, (property, callback));
        token
    }

    fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut state = self.state();
        let live = state.subscribers.remove(&token).is_some();
        if live {
            state.unsubscribe_calls += 1;
        }
        live
    }

    fn release(&self) {
        let mut state = self.state();
        state.release_calls += 1;
        state.rate = 0.0;
        state.time_control = TimeControlStatus::Paused;
    }
}

/// Provider handing out [`SimulatedHandle`]s.
///
/// With an auto-resolve duration set, the first [`advance`](Self::advance)
/// on a loading handle resolves it, which lets a driver loop run without
/// any test hooks.
#[derive(Debug, Default)]
pub struct SimulatedMediaProvider {
    opened: Mutex<Vec<SimulatedHandle>>,
    auto_resolve: Option<Duration>,
    offline: AtomicBool,
}

impl SimulatedMediaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_resolve(duration: Duration) -> Self {
        Self {
            auto_resolve: Some(duration),
            ..Self::default()
        }
    }

    /// While offline every `open` fails with [`MediaError::Backend`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn opened(&self) -> MutexGuard<'_, Vec<SimulatedHandle>> {
        self.opened.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every handle opened so far, oldest first.
    pub fn handles(&self) -> Vec<SimulatedHandle> {
        self.opened().clone()
    }

    pub fn latest(&self) -> Option<SimulatedHandle> {
        self.opened().last().cloned()
    }

    /// Drives the most recently opened handle forward in time.
    pub fn advance(&self, by: Duration) {
        let Some(handle) = self.latest() else {
            return;
        };
        if handle.release_calls() > 0 {
            return;
        }
        match (handle.status(), self.auto_resolve) {
            (ItemStatus::Loading, Some(duration)) => {
                tracing::debug!(url = %handle.url(), "simulated source resolved");
                handle.resolve(duration);
            }
            _ => handle.advance(by),
        }
    }
}

impl MediaProvider for SimulatedMediaProvider {
    fn open(&self, url: &Url) -> MediaResult<Box<dyn MediaHandle>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MediaError::Backend(format!("offline, cannot open {url}")));
        }
        let handle = SimulatedHandle::new(url.clone());
        self.opened().push(handle.clone());
        Ok(Box::new(handle))
    }
}
