use std::sync::Arc;

use tempo_core::{PlaybackConfig, TrackMetadata};
use tempo_media::{
    HandleEvent, ItemStatus, MediaHandle, MediaProvider, MediaTime, ObservedProperty,
    SubscriptionToken, TimeControlStatus,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::artwork::{load_artwork, Artwork, AssetStore};
use crate::command::HostCommand;
use crate::events::{ErrorPayload, SessionEvent, SessionListener};
use crate::remote::{
    InMemoryCommandCenter, RemoteCommand, RemoteCommandCenter, RemoteCommandKind,
    RemoteCommandStatus, RemoteHandler, TargetToken,
};
use crate::scheduler::{Scheduler, TimerGuard};
use crate::surface::{
    project_now_playing, InMemorySurface, NowPlayingSurface, SessionSnapshot,
};
use crate::{SessionError, SessionResult};

const OBSERVED: [ObservedProperty; 4] = [
    ObservedProperty::Status,
    ObservedProperty::TimeControlStatus,
    ObservedProperty::Duration,
    ObservedProperty::PlayedToEnd,
];

/// Where the current handle is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Source attached, not decodable yet.
    Loading,
    /// Decodable; the player has not reported motion yet.
    Ready,
    Playing,
    Paused,
    /// Asked to play but waiting for data.
    Buffering,
    Ended,
    Failed,
}

impl PlaybackPhase {
    fn after_time_control(self, status: TimeControlStatus) -> Self {
        match (self, status) {
            (PlaybackPhase::Failed, _) => PlaybackPhase::Failed,
            (_, TimeControlStatus::Playing) => PlaybackPhase::Playing,
            (PlaybackPhase::Loading, _) => PlaybackPhase::Loading,
            (PlaybackPhase::Ended, TimeControlStatus::Paused) => PlaybackPhase::Ended,
            (_, TimeControlStatus::Paused) => PlaybackPhase::Paused,
            (_, TimeControlStatus::WaitingToPlay) => PlaybackPhase::Buffering,
        }
    }
}

/// Message on the session's event queue.
///
/// Handle observers, remote targets and the sampling timer only ever post
/// these; the owner of the session applies them with
/// [`PlaybackSession::handle_input`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Handle { generation: u64, event: HandleEvent },
    SampleTick { generation: u64 },
    /// `session` is the id of the session whose targets received the command.
    Remote { session: u64, command: RemoteCommand },
}

/// Receiving end of the session's event queue.
#[derive(Debug)]
pub struct SessionInbox {
    receiver: UnboundedReceiver<SessionInput>,
}

impl SessionInbox {
    pub async fn recv(&mut self) -> Option<SessionInput> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SessionInput> {
        self.receiver.try_recv().ok()
    }
}

struct AttachedMedia {
    handle: Box<dyn MediaHandle>,
    generation: u64,
    subscriptions: Vec<SubscriptionToken>,
    phase: PlaybackPhase,
}

impl AttachedMedia {
    fn release(mut self) {
        for token in self.subscriptions.drain(..) {
            if !self.handle.unsubscribe(token) {
                trace!(token = token.id(), "subscription already released");
            }
        }
        self.handle.pause();
        self.handle.release();
    }
}

struct RegisteredTarget {
    kind: RemoteCommandKind,
    token: TargetToken,
}

/// State that exists from the first `play` until `stop`.
struct Session {
    id: u64,
    media: Option<AttachedMedia>,
    duration_ms: Option<f64>,
    position_fraction: f64,
    track: TrackMetadata,
    cover: Option<Artwork>,
    sampler: Option<Box<dyn TimerGuard>>,
    remote_targets: Vec<RegisteredTarget>,
}

impl Session {
    fn stop_sampling(&mut self) {
        if let Some(timer) = self.sampler.take() {
            timer.cancel();
        }
    }

    /// Cancels the timer and releases the handle with all of its observers.
    fn detach_media(&mut self) {
        self.stop_sampling();
        if let Some(media) = self.media.take() {
            debug!(generation = media.generation, "releasing media handle");
            media.release();
        }
    }
}

pub struct SessionBuilder {
    provider: Arc<dyn MediaProvider>,
    listener: Arc<dyn SessionListener>,
    scheduler: Arc<dyn Scheduler>,
    surface: Arc<dyn NowPlayingSurface>,
    remote: Arc<dyn RemoteCommandCenter>,
    assets: Option<Arc<dyn AssetStore>>,
    config: PlaybackConfig,
}

impl SessionBuilder {
    pub fn surface(mut self, surface: Arc<dyn NowPlayingSurface>) -> Self {
        self.surface = surface;
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteCommandCenter>) -> Self {
        self.remote = remote;
        self
    }

    pub fn assets(mut self, assets: Arc<dyn AssetStore>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> (PlaybackSession, SessionInbox) {
        let (inputs, receiver) = mpsc::unbounded_channel();
        let session = PlaybackSession {
            provider: self.provider,
            listener: self.listener,
            scheduler: self.scheduler,
            surface: self.surface,
            remote: self.remote,
            assets: self.assets,
            config: self.config,
            inputs,
            session: None,
            session_id: 0,
            generation: 0,
            timer_generation: 0,
        };
        (session, SessionInbox { receiver })
    }
}

/// Playback session controller.
///
/// Owns at most one media handle, mirrors its status into the session fields,
/// samples the playhead while the item is ready and tells the listener about
/// every transition. All mutation happens on the caller's thread through the
/// public methods and [`handle_input`](Self::handle_input).
pub struct PlaybackSession {
    provider: Arc<dyn MediaProvider>,
    listener: Arc<dyn SessionListener>,
    scheduler: Arc<dyn Scheduler>,
    surface: Arc<dyn NowPlayingSurface>,
    remote: Arc<dyn RemoteCommandCenter>,
    assets: Option<Arc<dyn AssetStore>>,
    config: PlaybackConfig,
    inputs: UnboundedSender<SessionInput>,
    session: Option<Session>,
    session_id: u64,
    generation: u64,
    timer_generation: u64,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("active", &self.session.is_some())
            .field("phase", &self.phase())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    /// Surface and remote center default to in-memory implementations.
    pub fn builder(
        provider: Arc<dyn MediaProvider>,
        listener: Arc<dyn SessionListener>,
        scheduler: Arc<dyn Scheduler>,
    ) -> SessionBuilder {
        SessionBuilder {
            provider,
            listener,
            scheduler,
            surface: Arc::new(InMemorySurface::new()),
            remote: Arc::new(InMemoryCommandCenter::new()),
            assets: None,
            config: PlaybackConfig::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_handle(&self) -> bool {
        self.media().is_some()
    }

    pub fn phase(&self) -> Option<PlaybackPhase> {
        self.media().map(|media| media.phase)
    }

    /// Unknown until the item is ready.
    pub fn duration_ms(&self) -> Option<f64> {
        match self.phase() {
            None | Some(PlaybackPhase::Loading) => None,
            Some(_) => self.session.as_ref().and_then(|s| s.duration_ms),
        }
    }

    /// Last sampled position; 0 until the item is ready.
    pub fn position_fraction(&self) -> f64 {
        match self.phase() {
            None | Some(PlaybackPhase::Loading) => 0.0,
            Some(_) => self.session.as_ref().map_or(0.0, |s| s.position_fraction),
        }
    }

    pub fn track(&self) -> Option<&TrackMetadata> {
        self.session.as_ref().map(|s| &s.track)
    }

    pub fn artwork(&self) -> Option<&Artwork> {
        self.session.as_ref().and_then(|s| s.cover.as_ref())
    }

    pub fn is_sampling_position(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.sampler.is_some())
    }

    fn media(&self) -> Option<&AttachedMedia> {
        self.session.as_ref().and_then(|s| s.media.as_ref())
    }

    fn emit(&self, event: SessionEvent) {
        debug!(method = event.method(), "notify host");
        self.listener.notify(event);
    }

    pub fn handle_command(&mut self, command: HostCommand) -> SessionResult<()> {
        debug!(command = command.name(), "host command");
        match command {
            HostCommand::Play(request) => self.play(&request.url, request.track),
            HostCommand::Pause => {
                self.pause();
                Ok(())
            }
            HostCommand::Resume => {
                self.resume();
                Ok(())
            }
            HostCommand::Stop => {
                self.stop();
                Ok(())
            }
            HostCommand::Seek { fraction } => {
                self.seek(fraction);
                Ok(())
            }
        }
    }

    /// Replaces whatever is loaded with `url` and starts playing it.
    ///
    /// An unparsable url or a source the backend refuses to open fails before
    /// anything is torn down; the current track keeps playing.
    pub fn play(&mut self, url: &str, track: TrackMetadata) -> SessionResult<()> {
        let url = parse_source(url)?;
        let handle = self.provider.open(&url).inspect_err(|err| {
            warn!(%url, error = %err, "backend refused source, keeping current media");
        })?;
        let cover = track
            .cover_file_name
            .as_deref()
            .and_then(|name| self.load_cover(name));

        if self.session.is_none() {
            self.session_id += 1;
            let remote_targets = self.register_remote_targets(self.session_id);
            self.session = Some(Session {
                id: self.session_id,
                media: None,
                duration_ms: None,
                position_fraction: 0.0,
                track: TrackMetadata::default(),
                cover: None,
                sampler: None,
                remote_targets,
            });
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        session.detach_media();
        session.duration_ms = None;
        session.position_fraction = 0.0;
        session.track = track;
        session.cover = cover;

        self.generation += 1;
        let generation = self.generation;
        let subscriptions = OBSERVED
            .iter()
            .map(|&property| {
                let inputs = self.inputs.clone();
                handle.subscribe(
                    property,
                    Arc::new(move |event| {
                        let _ = inputs.send(SessionInput::Handle { generation, event });
                    }),
                )
            })
            .collect();
        handle.play_immediately(1.0);

        info!(%url, generation, track = %session.track.track_name, "loading source");
        session.media = Some(AttachedMedia {
            handle,
            generation,
            subscriptions,
            phase: PlaybackPhase::Loading,
        });
        self.refresh_now_playing();
        Ok(())
    }

    pub fn pause(&mut self) {
        if let Some(media) = self.media() {
            media.handle.pause();
        }
    }

    pub fn resume(&mut self) {
        if let Some(media) = self.media() {
            media.handle.play_immediately(1.0);
        }
    }

    /// Seeks to `fraction` of the known duration, within the configured
    /// tolerance. The next sampling tick reports the new position.
    pub fn seek(&mut self, fraction: f64) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let (Some(media), Some(duration_ms)) = (session.media.as_ref(), session.duration_ms) else {
            debug!("seek ignored: nothing loaded or duration unknown");
            return;
        };
        if !fraction.is_finite() {
            warn!(fraction, "seek ignored: fraction is not finite");
            return;
        }

        let target = MediaTime::from_millis(duration_ms * fraction.clamp(0.0, 1.0));
        let tolerance = MediaTime::from_duration(self.config.seek_tolerance());
        debug!(fraction, target_ms = ?target.as_millis(), "seek");
        media.handle.seek(target, tolerance, tolerance);
    }

    /// Tears everything down. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.detach_media();
        for target in session.remote_targets.drain(..) {
            self.remote.remove_target(target.kind, target.token);
            self.remote.set_enabled(target.kind, false);
        }
        self.surface.clear();
        info!("session stopped");
    }

    /// Applies everything currently queued. Returns how many inputs ran.
    pub fn process_pending(&mut self, inbox: &mut SessionInbox) -> usize {
        let mut processed = 0;
        while let Some(input) = inbox.try_recv() {
            self.handle_input(input);
            processed += 1;
        }
        processed
    }

    pub fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Handle { generation, event } => {
                if self.media().map(|m| m.generation) != Some(generation) {
                    trace!(generation, ?event, "dropping event from released handle");
                    return;
                }
                self.on_handle_event(event);
            }
            SessionInput::SampleTick { generation } => {
                if generation != self.timer_generation {
                    trace!(generation, "dropping tick from cancelled timer");
                    return;
                }
                self.sample_position();
            }
            SessionInput::Remote { session, command } => {
                let live = self.session.as_ref().map(|s| s.id) == Some(session);
                if !live || !self.has_handle() {
                    trace!(session, ?command, "dropping remote command after teardown");
                    return;
                }
                self.on_remote_command(command);
            }
        }
    }

    /// One sampling tick. Emits `onPosition` when the fraction moved.
    pub fn sample_position(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.sampler.is_none() {
            return;
        }
        let (Some(media), Some(duration_ms)) = (session.media.as_ref(), session.duration_ms) else {
            return;
        };
        let Some(position_ms) = media.handle.current_time().as_millis() else {
            return;
        };
        if duration_ms <= 0.0 {
            return;
        }

        let fraction = position_ms / duration_ms;
        if fraction != session.position_fraction {
            session.position_fraction = fraction;
            self.emit(SessionEvent::Position(fraction));
        }
    }

    fn on_handle_event(&mut self, event: HandleEvent) {
        match event {
            HandleEvent::StatusChanged(status) => self.on_status_changed(status),
            HandleEvent::TimeControlChanged(status) => self.on_time_control_changed(status),
            HandleEvent::DurationChanged(duration) => self.on_duration_changed(duration),
            HandleEvent::PlayedToEnd => {
                self.set_phase(PlaybackPhase::Ended);
                self.emit(SessionEvent::Completed);
            }
        }
    }

    fn on_status_changed(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Loading => debug!("item still loading"),
            ItemStatus::ReadyToPlay => {
                if self.phase() == Some(PlaybackPhase::Loading) {
                    self.set_phase(PlaybackPhase::Ready);
                }
                self.start_sampling();
                if let Some(duration) = self.media().map(|m| m.handle.duration()) {
                    self.sync_duration(duration);
                }
                self.refresh_now_playing();
            }
            ItemStatus::Failed => self.fail(SessionError::PlaybackFailed),
            ItemStatus::Unknown => self.fail(SessionError::UnknownPlaybackStatus),
        }
    }

    fn fail(&mut self, err: SessionError) {
        if self.phase() == Some(PlaybackPhase::Failed) {
            debug!(error = %err, "handle already failed");
            return;
        }
        error!(error = %err, "playback error");
        if let Some(session) = self.session.as_mut() {
            session.stop_sampling();
        }
        self.set_phase(PlaybackPhase::Failed);
        self.emit(SessionEvent::Error(ErrorPayload::from(&err)));
        self.refresh_now_playing();
    }

    fn on_time_control_changed(&mut self, status: TimeControlStatus) {
        let event = match status {
            TimeControlStatus::Playing => SessionEvent::IsPlaying,
            TimeControlStatus::Paused => SessionEvent::IsPaused,
            TimeControlStatus::WaitingToPlay => SessionEvent::IsLoading,
        };
        if let Some(phase) = self.phase() {
            self.set_phase(phase.after_time_control(status));
        }
        self.emit(event);
        self.refresh_now_playing();
    }

    fn on_duration_changed(&mut self, duration: MediaTime) {
        self.sync_duration(duration);
        self.refresh_now_playing();
    }

    fn sync_duration(&mut self, duration: MediaTime) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let next = duration.as_millis();
        if next == session.duration_ms {
            return;
        }
        session.duration_ms = next;
        self.emit(SessionEvent::Duration(next.map(|ms| ms.round() as i64)));
    }

    fn set_phase(&mut self, next: PlaybackPhase) {
        let Some(media) = self.session.as_mut().and_then(|s| s.media.as_mut()) else {
            return;
        };
        if media.phase != next {
            info!(from = ?media.phase, to = ?next, generation = media.generation, "playback phase");
            media.phase = next;
        }
    }

    fn start_sampling(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let inputs = self.inputs.clone();
        let timer = self.scheduler.start_repeating(
            self.config.position_interval(),
            Box::new(move || {
                let _ = inputs.send(SessionInput::SampleTick { generation });
            }),
        );
        if let Some(session) = self.session.as_mut() {
            session.stop_sampling();
            session.sampler = Some(timer);
        }
    }

    fn refresh_now_playing(&self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(media) = session.media.as_ref() else {
            return;
        };
        let snapshot = SessionSnapshot {
            has_handle: true,
            time_control: media.handle.time_control_status(),
            rate: media.handle.rate(),
            track: &session.track,
            duration_ms: session.duration_ms,
            position_fraction: session.position_fraction,
            artwork: session.cover.as_ref(),
        };
        if let Some(info) = project_now_playing(&snapshot) {
            self.surface.publish(info);
        }
    }

    fn register_remote_targets(&self, session: u64) -> Vec<RegisteredTarget> {
        RemoteCommandKind::ALL
            .iter()
            .map(|&kind| {
                let inputs = self.inputs.clone();
                let handler: RemoteHandler = Arc::new(move |command: RemoteCommand| {
                    if command.kind() != kind {
                        return RemoteCommandStatus::CommandFailed;
                    }
                    match inputs.send(SessionInput::Remote { session, command }) {
                        Ok(()) => RemoteCommandStatus::Success,
                        Err(_) => RemoteCommandStatus::NoActionableNowPlayingItem,
                    }
                });
                let token = self.remote.add_target(kind, handler);
                self.remote.set_enabled(kind, true);
                RegisteredTarget { kind, token }
            })
            .collect()
    }

    fn on_remote_command(&mut self, command: RemoteCommand) {
        debug!(?command, "remote command");
        match command {
            RemoteCommand::TogglePlayPause => {
                let Some(status) = self.media().map(|m| m.handle.time_control_status()) else {
                    return;
                };
                if status == TimeControlStatus::Paused {
                    self.resume();
                } else {
                    self.pause();
                }
            }
            RemoteCommand::NextTrack => self.emit(SessionEvent::PlayNext),
            RemoteCommand::PreviousTrack => self.emit(SessionEvent::PlayPrevious),
            RemoteCommand::ChangePlaybackPosition { position_seconds } => {
                if let Some(media) = self.media() {
                    let target = MediaTime::from_seconds(position_seconds, MediaTime::MILLIS);
                    media
                        .handle
                        .seek(target, MediaTime::INDEFINITE, MediaTime::INDEFINITE);
                }
            }
        }
    }

    fn load_cover(&self, file_name: &str) -> Option<Artwork> {
        let Some(assets) = self.assets.as_ref() else {
            debug!(cover = file_name, "no asset store configured, skipping cover");
            return None;
        };
        match load_artwork(assets.as_ref(), file_name) {
            Ok(artwork) => Some(artwork),
            Err(err) => {
                warn!(cover = file_name, error = %err, "cover unavailable, continuing without artwork");
                None
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Parses a `play` url. Relative references resolve against `file:///`.
pub fn parse_source(raw: &str) -> SessionResult<Url> {
    if raw.trim().is_empty() || raw.chars().any(char::is_whitespace) {
        return Err(SessionError::InvalidSource(raw.to_string()));
    }
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("file:///")
            .and_then(|base| base.join(raw))
            .map_err(|err| SessionError::InvalidSource(format!("{raw}: {err}"))),
        Err(err) => Err(SessionError::InvalidSource(format!("{raw}: {err}"))),
    }
}
