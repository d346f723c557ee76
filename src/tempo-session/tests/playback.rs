mod common;

use std::time::Duration;

use common::{harness, track};
use tempo_core::TrackMetadata;
use tempo_media::{HandleEvent, ItemStatus, MediaError, MediaTime, SeekRequest};
use tempo_session::{
    ErrorPayload, HostCommand, PlaybackPhase, RemoteCommandKind, SessionError, SessionEvent,
    SessionInput,
};

const TEN_SECONDS: Duration = Duration::from_secs(10);

#[test]
fn quarter_position_is_reported() {
    let mut h = harness();
    let handle = h.play_resolved("a.mp3", TEN_SECONDS);
    h.log.take();

    handle.set_position(Duration::from_millis(2500));
    h.tick();

    assert_eq!(h.log.events(), vec![SessionEvent::Position(0.25)]);
    assert_eq!(h.session.position_fraction(), 0.25);
}

#[test]
fn half_seek_uses_tolerance_window() {
    let mut h = harness();
    let handle = h.play_resolved("a.mp3", TEN_SECONDS);

    h.session.seek(0.5);

    let tolerance = MediaTime::new(100, 1000);
    assert_eq!(
        handle.seeks(),
        vec![SeekRequest {
            to: MediaTime::new(5000, 1000),
            tolerance_before: tolerance,
            tolerance_after: tolerance,
        }]
    );
}

#[test]
fn sampled_position_follows_seeks() {
    let mut h = harness();
    h.play_resolved("a.mp3", TEN_SECONDS);

    for fraction in [0.1, 0.333, 0.5, 0.75, 0.999, 1.0] {
        h.log.take();
        h.session.seek(fraction);
        h.tick();

        let positions = h.log.positions();
        assert_eq!(positions.len(), 1, "one position after seeking to {fraction}");
        let emitted_ms = positions[0] * 10_000.0;
        assert!(
            (emitted_ms - fraction * 10_000.0).abs() <= 100.0,
            "{emitted_ms}ms is outside the window around {fraction}"
        );
    }
}

#[test]
fn seek_is_ignored_until_duration_is_known() {
    let mut h = harness();
    h.session.seek(0.5);

    let handle = h.play("a.mp3");
    h.session.seek(0.5);
    h.session.seek(f64::NAN);
    assert!(handle.seeks().is_empty());
}

#[test]
fn identical_positions_are_coalesced() {
    let mut h = harness();
    let handle = h.play_resolved("a.mp3", TEN_SECONDS);
    h.log.take();

    h.tick();
    h.tick();
    assert!(h.log.positions().is_empty(), "still at 0, nothing to report");

    handle.advance(Duration::from_millis(100));
    h.tick();
    h.tick();
    handle.advance(Duration::from_millis(100));
    h.tick();
    h.tick();
    h.tick();

    let positions = h.log.positions();
    assert_eq!(positions, vec![0.01, 0.02]);
    assert!(positions.windows(2).all(|pair| pair[0] != pair[1]));
}

#[test]
fn failed_status_reports_once_and_stops_sampling() {
    let mut h = harness();
    let handle = h.play("a.mp3");
    h.log.take();

    handle.fail();
    h.pump();
    handle.fail();
    h.pump();

    assert_eq!(
        h.log.events(),
        vec![SessionEvent::Error(ErrorPayload {
            code: 0,
            message: "Playback failed".into(),
        })]
    );
    assert_eq!(h.session.phase(), Some(PlaybackPhase::Failed));
    assert!(!h.session.is_sampling_position());

    h.log.take();
    h.tick();
    h.session.sample_position();
    assert!(h.log.events().is_empty());
}

#[test]
fn failure_after_ready_cancels_timer() {
    let mut h = harness();
    let handle = h.play_resolved("a.mp3", TEN_SECONDS);
    assert_eq!(h.scheduler.active(), 1);

    handle.fail();
    h.pump();
    assert_eq!(h.scheduler.active(), 0);

    h.log.take();
    handle.set_position(Duration::from_secs(3));
    h.tick();
    h.session
        .handle_input(SessionInput::SampleTick { generation: 1 });
    assert!(h.log.positions().is_empty());
    assert!(h.session.has_handle(), "a failed handle is not torn down");
}

#[test]
fn unknown_status_is_reported() {
    let mut h = harness();
    let handle = h.play("a.mp3");

    handle.report_unknown_status();
    h.pump();

    assert_eq!(
        h.errors(),
        vec![SessionEvent::Error(ErrorPayload {
            code: 0,
            message: "Unknown error".into(),
        })]
    );
}

#[test]
fn transport_without_handle_is_silent() {
    let mut h = harness();
    h.session.pause();
    h.session.resume();
    h.session.seek(0.3);
    h.session.stop();
    h.session.sample_position();
    h.pump();

    assert!(h.log.events().is_empty());
    assert!(!h.session.is_active());
    assert_eq!(h.surface.clears(), 0);
}

#[test]
fn replacing_source_releases_previous_handle_once() {
    let mut h = harness();
    let first = h.play_resolved("a.mp3", TEN_SECONDS);
    assert_eq!(first.subscribe_calls(), 4);
    assert_eq!(h.scheduler.active(), 1);

    let second = h.play("b.mp3");

    assert_eq!(first.unsubscribe_calls(), 4);
    assert_eq!(first.active_subscriptions(), 0);
    assert_eq!(first.release_calls(), 1);
    assert_eq!(h.scheduler.active(), 0, "old timer cancelled, new one not started");
    assert_eq!(second.subscribe_calls(), 4);
    assert_eq!(h.session.phase(), Some(PlaybackPhase::Loading));
    assert_eq!(h.session.duration_ms(), None);
    assert_eq!(h.session.position_fraction(), 0.0);

    h.session.stop();
    assert_eq!(first.unsubscribe_calls(), 4);
    assert_eq!(first.release_calls(), 1);
    assert_eq!(second.unsubscribe_calls(), 4);
    assert_eq!(second.release_calls(), 1);
}

#[test]
fn late_events_from_replaced_handle_are_dropped() {
    let mut h = harness();
    h.play_resolved("a.mp3", TEN_SECONDS);
    h.play("b.mp3");
    h.log.take();

    h.session.handle_input(SessionInput::Handle {
        generation: 1,
        event: HandleEvent::StatusChanged(ItemStatus::Failed),
    });
    h.session.handle_input(SessionInput::Handle {
        generation: 1,
        event: HandleEvent::PlayedToEnd,
    });

    assert!(h.log.events().is_empty());
    assert_eq!(h.session.phase(), Some(PlaybackPhase::Loading));
}

#[test]
fn stop_is_idempotent() {
    let mut h = harness();
    let handle = h.play_resolved("a.mp3", TEN_SECONDS);
    h.log.take();

    h.session.stop();
    h.session.stop();
    h.pump();

    assert!(!h.session.is_active());
    assert_eq!(handle.release_calls(), 1);
    assert_eq!(handle.unsubscribe_calls(), 4);
    assert_eq!(h.scheduler.active(), 0);
    assert_eq!(h.surface.clears(), 1);
    assert_eq!(h.remote.removals(), 4);
    assert_eq!(h.remote.target_count(), 0);
    assert!(h.log.events().is_empty());
}

#[test]
fn invalid_source_fails_without_side_effects() {
    let mut h = harness();
    let err = h.session.play("", track()).unwrap_err();
    assert!(matches!(err, SessionError::InvalidSource(_)));
    assert!(!h.session.is_active());
    assert!(h.provider.handles().is_empty());
    assert_eq!(h.remote.target_count(), 0);

    let handle = h.play_resolved("a.mp3", TEN_SECONDS);
    let err = h.session.play("not a url", track()).unwrap_err();
    assert!(matches!(err, SessionError::InvalidSource(_)));
    assert_eq!(handle.release_calls(), 0);
    assert_eq!(h.provider.handles().len(), 1);
}

#[test]
fn backend_refusal_keeps_current_track() {
    let mut h = harness();
    h.session
        .play("old.mp3", TrackMetadata::new("Old", "Album", "Artist"))
        .unwrap();
    h.pump();
    let old = h.provider.latest().unwrap();
    old.resolve(TEN_SECONDS);
    h.pump();
    h.log.take();

    h.provider.set_offline(true);
    let err = h
        .session
        .play("new.mp3", TrackMetadata::new("New", "Album", "Artist"))
        .unwrap_err();
    assert!(matches!(err, SessionError::Media(MediaError::Backend(_))));
    assert_eq!(ErrorPayload::from(&err).code, 4);

    assert!(h.session.has_handle());
    assert_eq!(old.release_calls(), 0);
    assert_eq!(old.unsubscribe_calls(), 0);
    assert_eq!(h.provider.handles().len(), 1);
    assert_eq!(h.session.track().unwrap().track_name, "Old");
    assert_eq!(h.session.duration_ms(), Some(10_000.0));
    assert_eq!(h.surface.current().unwrap().title, "Old");
    assert_eq!(h.scheduler.active(), 1);
    for kind in RemoteCommandKind::ALL {
        assert!(h.remote.is_enabled(kind), "{kind:?} stays enabled");
    }
    assert!(h.log.events().is_empty());
}

#[test]
fn backend_refusal_on_first_play_starts_nothing() {
    let mut h = harness();
    h.provider.set_offline(true);

    let err = h.session.play("a.mp3", track()).unwrap_err();
    assert_eq!(err.code(), 4);
    assert!(!h.session.is_active());
    assert_eq!(h.remote.target_count(), 0);
    assert!(h.surface.current().is_none());
    assert_eq!(h.scheduler.started(), 0);

    h.provider.set_offline(false);
    h.play_resolved("a.mp3", TEN_SECONDS);
    assert_eq!(h.session.duration_ms(), Some(10_000.0));
}

#[test]
fn duration_is_reported_once_known() {
    let mut h = harness();
    let handle = h.play("a.mp3");
    assert_eq!(h.session.duration_ms(), None);
    assert!(!h.session.is_sampling_position());

    handle.resolve(Duration::from_millis(12_500));
    h.pump();
    let durations: Vec<_> = h
        .log
        .events()
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::Duration(_)))
        .collect();
    assert_eq!(durations, vec![SessionEvent::Duration(Some(12_500))]);
    assert_eq!(h.session.duration_ms(), Some(12_500.0));
    assert!(h.session.is_sampling_position());
    assert_eq!(h.scheduler.intervals(), vec![Duration::from_millis(100)]);

    h.log.take();
    handle.make_duration_indefinite();
    h.pump();
    assert_eq!(h.log.events(), vec![SessionEvent::Duration(None)]);
    assert_eq!(h.surface.current().unwrap().duration_seconds, None);
}

#[test]
fn time_control_changes_are_forwarded() {
    let mut h = harness();
    let handle = h.play("a.mp3");
    assert_eq!(h.log.take(), vec![SessionEvent::IsLoading]);

    handle.resolve(TEN_SECONDS);
    h.pump();
    assert_eq!(
        h.log.take(),
        vec![SessionEvent::Duration(Some(10_000)), SessionEvent::IsPlaying]
    );
    assert_eq!(h.session.phase(), Some(PlaybackPhase::Playing));

    h.session.pause();
    h.pump();
    assert_eq!(h.log.take(), vec![SessionEvent::IsPaused]);
    assert_eq!(h.session.phase(), Some(PlaybackPhase::Paused));

    h.session.resume();
    h.pump();
    handle.stall();
    h.pump();
    assert_eq!(
        h.log.take(),
        vec![SessionEvent::IsPlaying, SessionEvent::IsLoading]
    );
    assert_eq!(h.session.phase(), Some(PlaybackPhase::Buffering));
}

#[test]
fn end_of_media_completes_without_teardown() {
    let mut h = harness();
    let handle = h.play_resolved("a.mp3", Duration::from_millis(300));
    h.log.take();

    handle.advance(Duration::from_millis(400));
    h.pump();

    assert_eq!(
        h.log.take(),
        vec![SessionEvent::Completed, SessionEvent::IsPaused]
    );
    assert_eq!(h.session.phase(), Some(PlaybackPhase::Ended));
    assert!(h.session.has_handle());
    assert_eq!(handle.release_calls(), 0);
    assert_eq!(h.provider.handles().len(), 1);

    h.tick();
    assert_eq!(h.log.positions(), vec![1.0]);
}

#[test]
fn host_commands_drive_the_session() {
    let mut h = harness();
    let play = HostCommand::from_json(
        r#"{"method":"play","arguments":{"url":"https://example.com/a.mp3","trackName":"A","albumName":"B","artistName":"C"}}"#,
    )
    .unwrap();
    h.session.handle_command(play).unwrap();
    h.pump();
    let handle = h.provider.latest().unwrap();
    assert_eq!(handle.url().as_str(), "https://example.com/a.mp3");
    assert_eq!(h.session.track().unwrap().track_name, "A");

    handle.resolve(TEN_SECONDS);
    h.pump();
    h.session
        .handle_command(HostCommand::from_json(r#"{"method":"seek","arguments":0.25}"#).unwrap())
        .unwrap();
    assert_eq!(handle.seeks()[0].to, MediaTime::new(2500, 1000));

    h.session
        .handle_command(HostCommand::from_json(r#"{"method":"stop"}"#).unwrap())
        .unwrap();
    assert!(!h.session.is_active());
}
