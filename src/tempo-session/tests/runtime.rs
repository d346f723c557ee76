use std::sync::Arc;
use std::time::Duration;

use tempo_core::{PlaybackConfig, TrackMetadata};
use tempo_media::SimulatedMediaProvider;
use tempo_session::{PlaybackSession, SessionEvent, SessionInput, TokioScheduler};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

#[tokio::test(start_paused = true)]
async fn tokio_timer_samples_every_100ms() {
    let provider = Arc::new(SimulatedMediaProvider::with_auto_resolve(Duration::from_secs(10)));
    let (events, mut received) = mpsc::unbounded_channel::<SessionEvent>();
    let scheduler = TokioScheduler::try_current().expect("running inside tokio");
    let (mut session, mut inbox) =
        PlaybackSession::builder(provider.clone(), Arc::new(events), Arc::new(scheduler)).build();

    session
        .play("a.mp3", TrackMetadata::new("Song", "Album", "Artist"))
        .unwrap();
    provider.advance(Duration::from_millis(100));
    session.process_pending(&mut inbox);
    assert!(session.is_sampling_position());
    let started = Instant::now();

    for _ in 0..3 {
        provider.advance(Duration::from_millis(100));
        let input = inbox.recv().await.expect("session keeps the queue open");
        assert!(matches!(input, SessionInput::SampleTick { .. }));
        session.handle_input(input);
    }
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));

    let mut positions = Vec::new();
    while let Ok(event) = received.try_recv() {
        if let SessionEvent::Position(fraction) = event {
            positions.push(fraction);
        }
    }
    assert_eq!(positions, vec![0.01, 0.02, 0.03]);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_tokio_timer() {
    let provider = Arc::new(SimulatedMediaProvider::with_auto_resolve(Duration::from_secs(10)));
    let (events, _received) = mpsc::unbounded_channel::<SessionEvent>();
    let scheduler = TokioScheduler::try_current().expect("running inside tokio");
    let (mut session, mut inbox) =
        PlaybackSession::builder(provider.clone(), Arc::new(events), Arc::new(scheduler)).build();

    session.play("a.mp3", TrackMetadata::default()).unwrap();
    provider.advance(Duration::from_millis(100));
    session.process_pending(&mut inbox);
    session.stop();

    time::sleep(Duration::from_millis(500)).await;
    assert!(inbox.try_recv().is_none());
    assert!(!session.is_sampling_position());
}

#[tokio::test(start_paused = true)]
async fn zero_interval_config_still_samples() {
    let provider = Arc::new(SimulatedMediaProvider::with_auto_resolve(Duration::from_secs(10)));
    let (events, _received) = mpsc::unbounded_channel::<SessionEvent>();
    let scheduler = TokioScheduler::try_current().expect("running inside tokio");
    let config = PlaybackConfig {
        position_interval_ms: 0,
        ..PlaybackConfig::default()
    };
    let (mut session, mut inbox) =
        PlaybackSession::builder(provider.clone(), Arc::new(events), Arc::new(scheduler))
            .config(config)
            .build();

    session.play("a.mp3", TrackMetadata::default()).unwrap();
    provider.advance(Duration::from_millis(100));
    session.process_pending(&mut inbox);
    assert!(session.is_sampling_position());

    let input = time::timeout(Duration::from_millis(50), inbox.recv())
        .await
        .expect("timer keeps ticking")
        .expect("session keeps the queue open");
    assert!(matches!(input, SessionInput::SampleTick { .. }));
}
