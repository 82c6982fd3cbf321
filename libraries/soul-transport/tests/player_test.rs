//! Integration tests for the playlist controller
//!
//! Navigation, loop modes, error reporting and auto-advance over the
//! virtual output.

use soul_transport::virtual_output::{VirtualContext, VirtualTransport};
use soul_transport::{
    AudioEngine, EventKind, LoadOptions, LoopMode, MediaSession, MediaSignal, Player,
    PlayerConfig, PositionState, SessionAction, SessionActionKind, SessionPlaybackState, Track,
    TransportConfig, TransportError, TransportEvent, WeightedArtistShuffle,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ===== Test Helpers =====

type EventLog = Arc<Mutex<Vec<TransportEvent>>>;

fn tracks(count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| Track::new(format!("track{i}.mp3")).with_artist(format!("Artist {}", i % 2)))
        .collect()
}

fn player(count: usize) -> (Player, VirtualTransport, EventLog) {
    let transport = VirtualTransport::new();
    let mut player = Player::from_config(
        &PlayerConfig::default(),
        Box::new(transport.clone()),
        VirtualContext::new().factory(),
    )
    .with_track_list(tracks(count));
    let log = record(&mut player);
    (player, transport, log)
}

fn record(player: &mut Player) -> EventLog {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::LoadTrack,
        EventKind::Error,
        EventKind::Reorder,
        EventKind::Play,
        EventKind::Ended,
    ] {
        let log = log.clone();
        player.on(kind, move |event| log.lock().unwrap().push(event.clone()));
    }
    log
}

fn loaded_indices(log: &EventLog) -> Vec<usize> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            TransportEvent::LoadTrack { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

fn errors(log: &EventLog) -> Vec<TransportError> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            TransportEvent::Error { error, .. } => Some(error.clone()),
            _ => None,
        })
        .collect()
}

fn count(log: &EventLog, kind: EventKind) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|event| event.kind() == kind)
        .count()
}

struct NullSession;

impl MediaSession for NullSession {
    fn set_action_handler(&mut self, _kind: SessionActionKind, _enabled: bool) {}
    fn set_playback_state(&mut self, _state: SessionPlaybackState) {}
    fn set_metadata(&mut self, _track: &Track) {}
    fn set_position_state(&mut self, _state: PositionState) {}
}

// ===== Navigation =====

#[tokio::test(start_paused = true)]
async fn next_track_wraps_in_list_mode() {
    let (mut player, _transport, log) = player(3);
    assert!(player.load_track(Some(0), LoadOptions::default()).await);

    for _ in 0..3 {
        assert!(player.next_track(LoadOptions::default()).await);
    }

    assert_eq!(player.current_index(), 0);
    assert_eq!(loaded_indices(&log), vec![0, 1, 2, 0]);
}

#[tokio::test(start_paused = true)]
async fn single_mode_reloads_same_track() {
    let (mut player, transport, log) = player(3);
    player.set_loop_mode(LoopMode::Single);
    assert!(player.load_track(Some(1), LoadOptions::default()).await);

    assert!(player.next_track(LoadOptions::default()).await);
    assert!(player.prev_track(LoadOptions::default()).await);

    assert_eq!(loaded_indices(&log), vec![1, 1, 1]);
    assert_eq!(transport.source().as_deref(), Some("track1.mp3"));
}

#[tokio::test(start_paused = true)]
async fn prev_track_wraps_to_last() {
    let (mut player, transport, _log) = player(4);

    assert!(player.prev_track(LoadOptions::default()).await);

    assert_eq!(player.current_index(), 3);
    assert_eq!(transport.source().as_deref(), Some("track3.mp3"));
}

#[tokio::test(start_paused = true)]
async fn single_track_list_never_moves() {
    let (mut player, _transport, log) = player(1);

    assert!(player.next_track(LoadOptions::default()).await);
    assert!(player.prev_track(LoadOptions::default()).await);
    assert_eq!(loaded_indices(&log), vec![0, 0]);
}

#[tokio::test(start_paused = true)]
async fn explicit_indices_are_normalized() {
    let (mut player, _transport, _log) = player(3);

    assert!(player.load_track(Some(-1), LoadOptions::default()).await);
    assert_eq!(player.current_index(), 2);

    assert!(player.load_track(Some(7), LoadOptions::default()).await);
    assert_eq!(player.current_index(), 1);

    assert!(player.load_track(Some(-5), LoadOptions::default()).await);
    assert_eq!(player.current_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn load_track_without_index_uses_current() {
    let (mut player, transport, log) = player(3);
    assert!(player.load_track(Some(2), LoadOptions::default()).await);

    assert!(player.load_track(None, LoadOptions::default()).await);
    assert_eq!(loaded_indices(&log), vec![2, 2]);
    assert_eq!(transport.load_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_load_emits_no_load_track() {
    let (mut player, transport, log) = player(2);
    transport.set_load_behavior(
        "track1.mp3",
        soul_transport::virtual_output::LoadBehavior::Fail(4),
    );

    assert!(!player.load_track(Some(1), LoadOptions::default()).await);
    assert!(loaded_indices(&log).is_empty());
    assert_eq!(errors(&log).len(), 1);
}

// ===== Track Lookup =====

#[tokio::test(start_paused = true)]
async fn out_of_range_lookup_reports_both_errors() {
    let (player, _transport, log) = player(3);

    assert!(player.get_track(Some(3)).is_none());
    assert_eq!(
        errors(&log),
        vec![TransportError::InvalidIndex(3), TransportError::NoTrackData]
    );
}

#[tokio::test(start_paused = true)]
async fn negative_lookup_is_invalid() {
    let (player, _transport, log) = player(3);

    assert!(player.get_track(Some(-1)).is_none());
    assert_eq!(errors(&log)[0], TransportError::InvalidIndex(-1));
}

#[tokio::test(start_paused = true)]
async fn lookup_resolves_through_play_order() {
    let (mut player, _transport, log) = player(3);
    player.set_shuffle(|tracks: &[Track]| (0..tracks.len()).rev().collect());
    player.set_loop_mode(LoopMode::Random);

    assert_eq!(player.get_track(Some(0)).map(|t| t.src.as_str()), Some("track2.mp3"));
    assert_eq!(player.current_track().map(|t| t.src.as_str()), Some("track2.mp3"));
    assert!(errors(&log).is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_list_has_no_track_data() {
    let (mut player, _transport, log) = player(0);

    assert!(player.get_track(None).is_none());
    assert!(!player.load_track(Some(2), LoadOptions::default()).await);
    assert!(!player.next_track(LoadOptions::default()).await);

    assert!(errors(&log)
        .iter()
        .all(|error| *error == TransportError::NoTrackData));
}

// ===== Ordering =====

#[tokio::test(start_paused = true)]
async fn list_changes_emit_reorder() {
    let (mut player, _transport, log) = player(3);

    player.set_track_list(tracks(5));
    player.set_loop_mode(LoopMode::Random);
    player.set_loop_mode(LoopMode::List);

    assert_eq!(count(&log, EventKind::Reorder), 3);
    assert_eq!(player.play_order().as_slice(), &[0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn random_mode_produces_permutation() {
    let (mut player, _transport, _log) = player(0);
    player.set_shuffle(WeightedArtistShuffle::new());
    player.set_loop_mode(LoopMode::Random);
    player.set_track_list(tracks(20));

    let mut order = player.play_order().as_slice().to_vec();
    order.sort_unstable();
    assert_eq!(order, (0..20).collect::<Vec<_>>());
    assert_eq!(player.ordered_tracks().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn reorder_can_force_shuffle() {
    let (mut player, _transport, _log) = player(3);
    player.set_shuffle(|tracks: &[Track]| (0..tracks.len()).rev().collect());

    player.reorder(true);
    assert_eq!(player.play_order().as_slice(), &[2, 1, 0]);
    assert_eq!(player.loop_mode(), LoopMode::List);
}

// ===== Auto Advance =====

#[tokio::test(start_paused = true)]
async fn ended_advances_when_auto_next_enabled() {
    let (player, _transport, log) = player(3);
    let mut player = player.with_auto_next(Some(LoadOptions::autoplay()));
    assert!(player.load_track(Some(0), LoadOptions::autoplay()).await);

    player.handle_signal(&MediaSignal::Ended).await;

    assert_eq!(player.current_index(), 1);
    assert!(player.engine().is_playing());
    assert_eq!(loaded_indices(&log), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn ended_stays_put_without_auto_next() {
    let (mut player, _transport, log) = player(3);
    assert!(player.load_track(Some(0), LoadOptions::autoplay()).await);

    player.handle_signal(&MediaSignal::Ended).await;

    assert_eq!(player.current_index(), 0);
    assert_eq!(count(&log, EventKind::Ended), 1);
    assert_eq!(loaded_indices(&log), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn run_plays_through_the_list() {
    let transport = VirtualTransport::new();
    for track in tracks(3) {
        transport.set_duration(track.src, 2.0);
    }

    let config = PlayerConfig {
        auto_next: true,
        ..Default::default()
    };
    let mut player = Player::from_config(
        &config,
        Box::new(transport.clone()),
        VirtualContext::new().factory(),
    )
    .with_track_list(tracks(3));
    let log = record(&mut player);

    let clock = tokio::spawn(transport.clone().run_clock(Duration::from_millis(100)));
    assert!(player.load_track(Some(0), LoadOptions::autoplay()).await);

    let finished = tokio::time::timeout(Duration::from_secs(10), player.run()).await;
    clock.abort();

    // The list wraps forever, so run only stops at the timeout
    assert!(finished.is_err());
    let indices = loaded_indices(&log);
    assert!(indices.len() >= 4, "{indices:?}");
    assert_eq!(&indices[..4], &[0, 1, 2, 0]);
    assert!(count(&log, EventKind::Ended) >= 3);
}

// ===== Session =====

#[tokio::test(start_paused = true)]
async fn session_next_and_previous_move_the_playlist() {
    let config = TransportConfig {
        media_session: true,
        ..Default::default()
    };
    let (_tx, rx) = mpsc::unbounded_channel();
    let engine = AudioEngine::new(
        config,
        Box::new(VirtualTransport::new()),
        VirtualContext::new().factory(),
    )
    .with_session(Box::new(NullSession), rx);
    let mut player = Player::new(engine).with_track_list(tracks(3));

    assert!(player.handle_action(SessionAction::NextTrack).await);
    assert_eq!(player.current_index(), 1);

    assert!(player.handle_action(SessionAction::PreviousTrack).await);
    assert!(player.handle_action(SessionAction::PreviousTrack).await);
    assert_eq!(player.current_index(), 2);

    assert!(player.handle_action(SessionAction::Stop).await);
}

#[tokio::test(start_paused = true)]
async fn session_actions_ignored_without_session() {
    let (mut player, _transport, _log) = player(3);

    assert!(!player.handle_action(SessionAction::NextTrack).await);
    assert_eq!(player.current_index(), 0);
}

// ===== Teardown =====

#[tokio::test(start_paused = true)]
async fn destroy_clears_list_and_order() {
    let (mut player, _transport, _log) = player(3);
    assert!(player.load_track(Some(1), LoadOptions::autoplay()).await);

    player.destroy().await;
    player.destroy().await;

    assert!(player.track_list().is_empty());
    assert!(player.play_order().is_empty());
    assert!(player.current_track().is_none());
    assert!(player.engine().events().is_empty());
    assert!(!player.play().await);
}
