#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempo_core::TrackMetadata;
use tempo_media::{SimulatedHandle, SimulatedMediaProvider};
use tempo_session::{
    AssetStore, EventLog, InMemoryCommandCenter, InMemorySurface, ManualScheduler,
    PlaybackSession, SessionEvent, SessionInbox,
};

pub struct Harness {
    pub session: PlaybackSession,
    pub inbox: SessionInbox,
    pub provider: Arc<SimulatedMediaProvider>,
    pub log: EventLog,
    pub scheduler: ManualScheduler,
    pub surface: InMemorySurface,
    pub remote: InMemoryCommandCenter,
}

pub fn harness() -> Harness {
    build(None)
}

pub fn harness_with_assets(assets: Arc<dyn AssetStore>) -> Harness {
    build(Some(assets))
}

fn build(assets: Option<Arc<dyn AssetStore>>) -> Harness {
    let provider = Arc::new(SimulatedMediaProvider::new());
    let log = EventLog::new();
    let scheduler = ManualScheduler::new();
    let surface = InMemorySurface::new();
    let remote = InMemoryCommandCenter::new();

    let mut builder = PlaybackSession::builder(
        provider.clone(),
        Arc::new(log.clone()),
        Arc::new(scheduler.clone()),
    )
    .surface(Arc::new(surface.clone()))
    .remote(Arc::new(remote.clone()));
    if let Some(assets) = assets {
        builder = builder.assets(assets);
    }
    let (session, inbox) = builder.build();

    Harness {
        session,
        inbox,
        provider,
        log,
        scheduler,
        surface,
        remote,
    }
}

pub fn track() -> TrackMetadata {
    TrackMetadata::new("Song", "Album", "Artist")
}

impl Harness {
    pub fn pump(&mut self) -> usize {
        self.session.process_pending(&mut self.inbox)
    }

    /// Fires the sampling timer once and applies the resulting ticks.
    pub fn tick(&mut self) {
        self.scheduler.fire();
        self.pump();
    }

    pub fn play(&mut self, url: &str) -> SimulatedHandle {
        self.session
            .play(url, track())
            .expect("play should be accepted");
        self.pump();
        self.provider.latest().expect("a handle was opened")
    }

    pub fn play_resolved(&mut self, url: &str, duration: Duration) -> SimulatedHandle {
        let handle = self.play(url);
        handle.resolve(duration);
        self.pump();
        handle
    }

    pub fn errors(&self) -> Vec<SessionEvent> {
        self.log
            .events()
            .into_iter()
            .filter(|event| matches!(event, SessionEvent::Error(_)))
            .collect()
    }
}
