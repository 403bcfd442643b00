#![forbid(unsafe_code)]


use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use fixture::{EVENT_WAIT, Harness, config, segment_started, states};
use lyre_core::{CoreError, Manifest};
use lyre_events::{Event, LoadEvent, PlaybackState, SessionEvent};
use lyre_net::NetError;
use lyre_play::{
    LoadControlOptions, ManifestLoader, MediaSource, PlayError, PlaybackContext, PlaybackSession,
    PlaybackSnapshot, SessionConfig, StaticManifests,
};
use lyre_test_utils::{KBPS, ScriptedSource, abr_ladder, manifest_url, single_rate};
use rstest::rstest;
use url::Url;

/// Serves manifests after a fixed delay.
struct SlowManifests {
    delay: Duration,
    inner: StaticManifests,
}

#[async_trait]
impl ManifestLoader for SlowManifests {
    async fn load(&self, uri: &Url) -> Result<Manifest, PlayError> {
        tokio::time::sleep(self.delay).await;
        self.inner.load(uri).await
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn prepare_buffers_whole_short_content(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let mut h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);
    assert_eq!(h.session.state(), PlaybackState::Idle);

    h.session.prepare(uri).await.unwrap();
    h.wait_state(PlaybackState::Buffered).await;

    let status = h.session.status();
    assert_eq!(status.state, PlaybackState::Buffered);
    assert_eq!(status.buffered, Duration::from_secs(12));
    assert_eq!(status.representation.as_deref(), Some("main"));
    assert!(!status.play_when_ready);
    assert_eq!(h.source.requests().len(), 3);
    assert_eq!(h.source.max_concurrent(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn state_sequence_is_empty_loading_buffered(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let mut h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);

    h.session.prepare(uri).await.unwrap();
    let mut seen = Vec::new();
    while seen.last() != Some(&PlaybackState::Buffered) {
        let state = h
            .next(|event| match event {
                Event::Session(SessionEvent::StateChanged { state, .. }) => Some(*state),
                _ => None,
            })
            .await;
        seen.push(state);
    }
    assert_eq!(
        seen,
        [
            PlaybackState::Empty,
            PlaybackState::Loading,
            PlaybackState::Buffered
        ]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn timeline_and_tracks_are_announced_first(config: SessionConfig) {
    let uri = manifest_url("ladder");
    let manifest = abr_ladder(5);
    let mut h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);

    h.session.prepare(uri).await.unwrap();
    let first = h.next(|event| Some(event.clone())).await;
    assert_eq!(
        first,
        Event::Session(SessionEvent::TimelineChanged {
            windows: 1,
            duration: Duration::from_secs(20),
        })
    );
    let tracks = h.next(|event| Some(event.clone())).await;
    assert!(matches!(
        tracks,
        Event::Session(SessionEvent::TracksChanged { window: 0, ref representations })
            if representations.len() == 3
    ));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn drained_buffer_stalls_until_next_segment(config: SessionConfig) {
    let uri = manifest_url("ladder");
    let manifest = abr_ladder(10);
    let mut h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);

    h.session.play().unwrap();
    h.session.prepare(uri).await.unwrap();
    h.next(|event| match event {
        Event::Load(LoadEvent::SegmentComplete { .. }) => Some(()),
        _ => None,
    })
    .await;
    h.source.set_bandwidth(100 * KBPS);

    let buffered = h
        .next(|event| match event {
            Event::Session(SessionEvent::StateChanged {
                state: PlaybackState::Stalled,
                buffered,
                ..
            }) => Some(*buffered),
            _ => None,
        })
        .await;
    assert_eq!(buffered, Duration::ZERO);
    h.source.set_bandwidth(10_000 * KBPS);

    let next = h
        .next(|event| match event {
            Event::Session(SessionEvent::StateChanged { state, .. }) => Some(*state),
            _ => None,
        })
        .await;
    assert_eq!(next, PlaybackState::Loading);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn seek_discards_in_flight_segment(config: SessionConfig) {
    let uri = manifest_url("ladder");
    let manifest = abr_ladder(10);
    // 20 s per 500 kbps segment
    let mut h = Harness::single(&uri, &manifest, 100 * KBPS, config);

    h.session.prepare(uri).await.unwrap();
    let (_, index, _) = h.next(segment_started).await;
    assert_eq!(index, 0);

    h.session.seek(Duration::from_secs(21)).unwrap();
    let discontinuity = h
        .next(|event| match event {
            Event::Session(SessionEvent::PositionDiscontinuity { position, window }) => {
                Some((*position, *window))
            }
            _ => None,
        })
        .await;
    assert_eq!(discontinuity, (Duration::from_secs(21), 0));

    let discarded = h
        .next(|event| match event {
            Event::Load(LoadEvent::SegmentDiscarded {
                window,
                segment_index,
            }) => Some((*window, *segment_index)),
            _ => None,
        })
        .await;
    assert_eq!(discarded, (0, 0));

    let (_, index, _) = h.next(segment_started).await;
    assert_eq!(index, 5);
    let completed = h
        .next(|event| match event {
            Event::Load(LoadEvent::SegmentComplete { segment_index, .. }) => Some(*segment_index),
            _ => None,
        })
        .await;
    assert_eq!(completed, 5);

    assert_eq!(h.source.max_concurrent(), 1);
    let status = h.session.status();
    assert_eq!(status.position, Duration::from_secs(21));
    assert_eq!(status.buffered, Duration::from_secs(3));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn seek_past_the_end_ends_playback(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let mut h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);

    h.session.prepare(uri).await.unwrap();
    h.wait_state(PlaybackState::Buffered).await;
    h.session.seek(Duration::from_secs(60)).unwrap();
    h.wait_state(PlaybackState::Ended).await;
    assert_eq!(h.session.status().position, Duration::from_secs(12));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn seek_back_after_ending_replays(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let mut h = Harness::single(&uri, &manifest, 10_000 * KBPS, config);

    h.session.play().unwrap();
    h.session.prepare(uri).await.unwrap();
    h.wait_state(PlaybackState::Ended).await;

    h.session.seek(Duration::ZERO).unwrap();
    h.wait_state(PlaybackState::Loading).await;
    let (window, index, _) = h.next(segment_started).await;
    assert_eq!((window, index), (0, 0));
    h.wait_state(PlaybackState::Ended).await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn restored_at_end_can_replay(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let mut h = Harness::single(&uri, &manifest, 10_000 * KBPS, config);

    h.session
        .restore(&PlaybackSnapshot {
            window: 0,
            position: Duration::from_secs(12),
            play_when_ready: true,
        })
        .unwrap();
    h.session.prepare(uri).await.unwrap();
    h.wait_state(PlaybackState::Ended).await;
    assert!(h.source.requests().is_empty());

    h.session.seek(Duration::ZERO).unwrap();
    h.wait_state(PlaybackState::Loading).await;
    let (window, index, _) = h.next(segment_started).await;
    assert_eq!((window, index), (0, 0));
    h.wait_state(PlaybackState::Ended).await;
    assert_eq!(h.source.requests().len(), 3);
}

#[rstest]
#[case::server_error(503, 4)]
#[case::not_found(404, 1)]
#[tokio::test(start_paused = true)]
async fn fetch_failure_is_fatal(
    config: SessionConfig,
    #[case] status: u16,
    #[case] attempts: usize,
) {
    let uri = manifest_url("ladder");
    let manifest = abr_ladder(4);
    let mut h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);
    h.source.fail_next(
        4,
        &NetError::http_status(status, "http://media.test/ladder/500k/0.m4s".to_string()),
    );

    h.session.prepare(uri).await.unwrap();
    let recoverable = h
        .next(|event| match event {
            Event::Session(SessionEvent::Error { recoverable, .. }) => Some(*recoverable),
            _ => None,
        })
        .await;
    assert!(!recoverable);
    h.wait_state(PlaybackState::Failed).await;
    assert_eq!(h.source.requests().len(), attempts);

    // Failed is terminal.
    h.session.seek(Duration::ZERO).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.session.state(), PlaybackState::Failed);
    assert!(states(&h.drain()).is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn concatenated_windows_play_to_the_end(config: SessionConfig) {
    let (intro, outro) = (manifest_url("intro"), manifest_url("outro"));
    let intro_manifest = single_rate("intro", 500 * KBPS, 2, 2);
    let outro_manifest = single_rate("outro", 500 * KBPS, 2, 2);
    let source = ScriptedSource::new(10_000 * KBPS).with_manifest(&intro_manifest);
    let manifests = StaticManifests::new()
        .with(intro.clone(), intro_manifest)
        .with(outro.clone(), outro_manifest);
    let mut h = Harness::new(source, manifests, config);

    h.session.play().unwrap();
    h.session
        .prepare(MediaSource::Concatenating(vec![intro, outro]))
        .await
        .unwrap();
    h.wait_state(PlaybackState::Ended).await;

    let requests: Vec<String> = h
        .source
        .requests()
        .iter()
        .map(|uri| uri.path().to_string())
        .collect();
    assert_eq!(
        requests,
        [
            "/intro/main/0.m4s",
            "/intro/main/1.m4s",
            "/outro/main/0.m4s",
            "/outro/main/1.m4s"
        ]
    );
    let status = h.session.status();
    assert_eq!(status.position, Duration::from_secs(8));
    assert_eq!(status.window, 1);
    assert_eq!(status.window_position, Duration::from_secs(4));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn release_is_idempotent(config: SessionConfig) {
    let uri = manifest_url("ladder");
    let manifest = abr_ladder(10);
    let mut h = Harness::single(&uri, &manifest, 100 * KBPS, config);

    h.session.prepare(uri).await.unwrap();
    h.next(segment_started).await;

    assert!(h.session.release().is_some());
    assert!(h.session.release().is_none());
    assert_eq!(h.session.play(), Err(PlayError::Released));
    assert_eq!(h.session.seek(Duration::ZERO), Err(PlayError::Released));
    assert_eq!(h.session.state(), PlaybackState::Idle);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let events = h.drain();
    let released = events
        .iter()
        .filter(|event| matches!(event, Event::Session(SessionEvent::Released)))
        .count();
    assert_eq!(released, 1);
    assert_eq!(events.last(), Some(&Event::Session(SessionEvent::Released)));
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, Event::Load(LoadEvent::SegmentComplete { .. })))
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn dropping_the_session_releases_it(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let Harness {
        session,
        mut events,
        ..
    } = Harness::single(&uri, &manifest, 2_000 * KBPS, config);

    session.prepare(uri).await.unwrap();
    drop(session);

    let released = tokio::time::timeout(EVENT_WAIT, async {
        loop {
            if events.recv().await.unwrap() == Event::Session(SessionEvent::Released) {
                return;
            }
        }
    })
    .await;
    assert!(released.is_ok());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn snapshot_resumes_where_release_left_off(config: SessionConfig) {
    let uri = manifest_url("ladder");
    let manifest = abr_ladder(10);
    let h = Harness::single(&uri, &manifest, 10_000 * KBPS, config.clone());

    h.session.play().unwrap();
    h.session.prepare(uri.clone()).await.unwrap();
    let mut status = h.session.watch();
    tokio::time::timeout(
        EVENT_WAIT,
        status.wait_for(|s| s.position >= Duration::from_secs(6)),
    )
    .await
    .unwrap()
    .unwrap();

    let snapshot = h.session.release().unwrap();
    assert_eq!(snapshot.window, 0);
    assert!(snapshot.play_when_ready);
    assert!(snapshot.position >= Duration::from_secs(6));

    let mut resumed = Harness::single(&uri, &manifest, 10_000 * KBPS, config);
    resumed.session.restore(&snapshot).unwrap();
    assert!(resumed.session.status().play_when_ready);
    resumed.session.prepare(uri).await.unwrap();
    assert_eq!(
        resumed.session.restore(&snapshot),
        Err(PlayError::AlreadyPrepared)
    );

    let position = resumed
        .next(|event| match event {
            Event::Session(SessionEvent::PositionDiscontinuity { position, .. }) => Some(*position),
            _ => None,
        })
        .await;
    assert_eq!(position, snapshot.position);

    let (window, index, _) = resumed.next(segment_started).await;
    let expected = usize::try_from(snapshot.position.as_secs() / 4).unwrap();
    assert_eq!((window, index), (0, expected));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn snapshot_past_its_window_resumes_in_the_next(config: SessionConfig) {
    let (intro, outro) = (manifest_url("intro"), manifest_url("outro"));
    let intro_manifest = single_rate("intro", 500 * KBPS, 2, 2);
    let outro_manifest = single_rate("outro", 500 * KBPS, 2, 2);
    let manifests = StaticManifests::new()
        .with(intro.clone(), intro_manifest.clone())
        .with(outro.clone(), outro_manifest);
    let source = MediaSource::Concatenating(vec![intro, outro]);

    let h = Harness::new(
        ScriptedSource::new(10_000 * KBPS).with_manifest(&intro_manifest),
        manifests.clone(),
        config.clone(),
    );
    h.session.seek(Duration::from_secs(6)).unwrap();
    let snapshot = h.session.release().unwrap();
    assert_eq!((snapshot.window, snapshot.position), (0, Duration::from_secs(6)));

    let mut resumed = Harness::new(
        ScriptedSource::new(10_000 * KBPS).with_manifest(&intro_manifest),
        manifests,
        config,
    );
    resumed.session.restore(&snapshot).unwrap();
    resumed.session.prepare(source).await.unwrap();
    let discontinuity = resumed
        .next(|event| match event {
            Event::Session(SessionEvent::PositionDiscontinuity { position, window }) => {
                Some((*position, *window))
            }
            _ => None,
        })
        .await;
    assert_eq!(discontinuity, (Duration::from_secs(6), 1));
    let (window, index, _) = resumed.next(segment_started).await;
    assert_eq!((window, index), (1, 1));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn release_before_prepare_returns_pending_snapshot(config: SessionConfig) {
    let h = Harness::single(
        &manifest_url("intro"),
        &single_rate("intro", 500 * KBPS, 3, 4),
        2_000 * KBPS,
        config,
    );
    h.session.play().unwrap();
    h.session.seek_to_window(0, Duration::from_secs(5)).unwrap();

    let snapshot = h.session.release().unwrap();
    assert_eq!(snapshot.position, Duration::from_secs(5));
    assert!(snapshot.play_when_ready);
    assert_eq!(
        h.session.prepare(manifest_url("intro")).await,
        Err(PlayError::Released)
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rejected_media_source_leaves_session_idle(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);

    let empty = h
        .session
        .prepare(MediaSource::Concatenating(Vec::new()))
        .await;
    assert!(matches!(
        empty,
        Err(PlayError::Core(CoreError::InvalidManifest(_)))
    ));
    assert_eq!(h.session.state(), PlaybackState::Idle);

    let missing = h.session.prepare(manifest_url("missing")).await;
    assert!(matches!(missing, Err(PlayError::ManifestLoad { .. })));
    assert_eq!(h.session.state(), PlaybackState::Idle);

    h.session.prepare(uri.clone()).await.unwrap();
    assert_eq!(
        h.session.prepare(uri).await,
        Err(PlayError::AlreadyPrepared)
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn interrupted_prepare_leaves_session_idle(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let manifests = SlowManifests {
        delay: Duration::from_secs(10),
        inner: StaticManifests::new().with(uri.clone(), manifest.clone()),
    };
    let source = ScriptedSource::new(2_000 * KBPS).with_manifest(&manifest);
    let ctx = PlaybackContext::new(Arc::new(source), Arc::new(manifests));
    let session = PlaybackSession::new(ctx, config).unwrap();

    let interrupted =
        tokio::time::timeout(Duration::from_secs(1), session.prepare(uri.clone())).await;
    assert!(interrupted.is_err());
    assert_eq!(session.state(), PlaybackState::Idle);

    session.prepare(uri).await.unwrap();
    assert_eq!(
        session.seek_to_window(1, Duration::ZERO),
        Err(PlayError::WindowOutOfRange {
            window: 1,
            windows: 1
        })
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn commands_validate_session_phase(config: SessionConfig) {
    let uri = manifest_url("intro");
    let manifest = single_rate("intro", 500 * KBPS, 3, 4);
    let h = Harness::single(&uri, &manifest, 2_000 * KBPS, config);

    assert_eq!(
        h.session.update_manifest(0, manifest.clone()).await,
        Err(PlayError::NotPrepared)
    );
    h.session.prepare(uri).await.unwrap();
    assert_eq!(
        h.session.seek_to_window(3, Duration::ZERO),
        Err(PlayError::WindowOutOfRange {
            window: 3,
            windows: 1
        })
    );
    assert!(matches!(
        h.session
            .update_manifest(0, single_rate("intro", 500 * KBPS, 2, 4))
            .await,
        Err(PlayError::Core(CoreError::InvalidManifest(_)))
    ));
}

#[test]
fn invalid_config_is_rejected() {
    let config = SessionConfig::default().with_load(LoadControlOptions {
        low_watermark: Duration::from_secs(30),
        high_watermark: Duration::from_secs(10),
    });
    let ctx = lyre_play::PlaybackContext::new(
        std::sync::Arc::new(ScriptedSource::new(KBPS)),
        std::sync::Arc::new(StaticManifests::new()),
    );
    assert!(matches!(
        PlaybackSession::new(ctx, config),
        Err(PlayError::InvalidConfig(_))
    ));
}
