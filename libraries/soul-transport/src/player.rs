//! Playlist controller
//!
//! Owns the track list, the play order and the current position, and drives
//! an [`AudioEngine`] to load the track at that position. The track list is
//! never reordered itself: a [`PlayOrder`] maps play positions to list
//! indices and is replaced wholesale whenever the list or loop mode changes.

use crate::config::PlayerConfig;
use crate::engine::{AudioEngine, EngineInput};
use crate::error::TransportError;
use crate::events::{EventKind, ListenerId, TransportEvent};
use crate::order::{PlayOrder, ShuffleStrategy, UniformShuffle};
use crate::output::{ContextFactory, MediaSignal, MediaTransport};
use crate::session::{SessionAction, SessionActionKind};
use crate::types::{LoadOptions, LoopMode, Track};
use std::sync::Arc;
use tracing::{debug, warn};

/// Playlist controller over one audio engine
pub struct Player {
    engine: AudioEngine,
    track_list: Vec<Track>,
    play_order: PlayOrder,
    current_index: usize,
    loop_mode: LoopMode,
    shuffle: Arc<dyn ShuffleStrategy>,
    auto_next: Option<LoadOptions>,
}

impl Player {
    /// Wrap an engine with an empty track list
    pub fn new(mut engine: AudioEngine) -> Self {
        engine.bind_action(SessionActionKind::PreviousTrack);
        engine.bind_action(SessionActionKind::NextTrack);

        Self {
            engine,
            track_list: Vec::new(),
            play_order: PlayOrder::default(),
            current_index: 0,
            loop_mode: LoopMode::default(),
            shuffle: Arc::new(UniformShuffle),
            auto_next: None,
        }
    }

    /// Build the engine and player from configuration
    pub fn from_config(
        config: &PlayerConfig,
        transport: Box<dyn MediaTransport>,
        context_factory: ContextFactory,
    ) -> Self {
        let engine = AudioEngine::new(config.transport(), transport, context_factory);
        Self::new(engine)
            .with_loop_mode(config.loop_mode)
            .with_auto_next(config.auto_next.then(LoadOptions::autoplay))
    }

    /// Set the loop mode, reordering a non-empty list
    #[must_use]
    pub fn with_loop_mode(mut self, mode: LoopMode) -> Self {
        self.set_loop_mode(mode);
        self
    }

    /// Replace the strategy used in random mode
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: impl ShuffleStrategy + 'static) -> Self {
        self.shuffle = Arc::new(shuffle);
        self
    }

    #[must_use]
    pub fn with_track_list(mut self, tracks: Vec<Track>) -> Self {
        self.set_track_list(tracks);
        self
    }

    /// Advance when a track ends, loading the next one with these options
    #[must_use]
    pub fn with_auto_next(mut self, options: Option<LoadOptions>) -> Self {
        self.auto_next = options;
        self
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AudioEngine {
        &mut self.engine
    }

    // ===== Track List & Order =====

    /// Tracks in insertion order
    pub fn track_list(&self) -> &[Track] {
        &self.track_list
    }

    /// Tracks in play order
    pub fn ordered_tracks(&self) -> Vec<&Track> {
        self.play_order
            .as_slice()
            .iter()
            .filter_map(|&i| self.track_list.get(i))
            .collect()
    }

    /// Replace the list and recompute the play order
    pub fn set_track_list(&mut self, tracks: Vec<Track>) {
        self.track_list = tracks;
        self.reorder(self.loop_mode == LoopMode::Random);
    }

    pub fn play_order(&self) -> &PlayOrder {
        &self.play_order
    }

    /// Current position in the play order
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Change the loop mode, reordering a non-empty list
    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        if !self.track_list.is_empty() {
            self.reorder(mode == LoopMode::Random);
        }
    }

    pub fn set_shuffle(&mut self, shuffle: impl ShuffleStrategy + 'static) {
        self.shuffle = Arc::new(shuffle);
    }

    pub fn auto_next(&self) -> Option<&LoadOptions> {
        self.auto_next.as_ref()
    }

    pub fn set_auto_next(&mut self, options: Option<LoadOptions>) {
        self.auto_next = options;
    }

    /// Recompute the play order, shuffled or sequential
    ///
    /// A shuffle result that is not a permutation of the list is discarded
    /// in favour of sequential order.
    pub fn reorder(&mut self, shuffle: bool) {
        self.engine.emit(TransportEvent::Reorder);

        let len = self.track_list.len();
        self.play_order = if shuffle {
            let order = PlayOrder::from(self.shuffle.order(&self.track_list));
            if order.is_permutation(len) {
                order
            } else {
                warn!("Shuffle returned an invalid order for {} tracks", len);
                PlayOrder::sequential(len)
            }
        } else {
            PlayOrder::sequential(len)
        };
        debug!(tracks = len, shuffle, "Play order updated");
    }

    /// Track at the current position
    pub fn current_track(&self) -> Option<&Track> {
        self.play_order
            .get(self.current_index)
            .and_then(|i| self.track_list.get(i))
    }

    /// Track at a play position (default: current)
    ///
    /// Out-of-range positions and missing tracks are reported on the
    /// `error` event.
    pub fn get_track(&self, index: Option<i64>) -> Option<&Track> {
        let index = index.unwrap_or(self.current_index as i64);
        let len = self.play_order.len();

        if index < 0 || (len > 0 && index >= len as i64) {
            self.engine.report(TransportError::InvalidIndex(index));
        }

        let track = usize::try_from(index)
            .ok()
            .and_then(|position| self.play_order.get(position))
            .and_then(|i| self.track_list.get(i));
        if track.is_none() {
            self.engine.report(TransportError::NoTrackData);
        }
        track
    }

    // ===== Navigation =====

    /// Load the track at a play position (default: current)
    ///
    /// Explicit positions wrap around the list, so `-1` is the last track.
    pub async fn load_track(&mut self, index: Option<i64>, options: LoadOptions) -> bool {
        if let Some(index) = index {
            let len = self.play_order.len() as i64;
            if len == 0 {
                return self.engine.report(TransportError::NoTrackData);
            }
            // rem_euclid keeps the result in 0..len, so it fits in usize
            self.current_index = index.rem_euclid(len) as usize;
        }

        let Some(track) = self.get_track(None).cloned() else {
            return false;
        };

        let loaded = self.engine.load(&track, options).await;
        if loaded {
            self.engine.emit(TransportEvent::LoadTrack {
                index: self.current_index,
                track,
            });
        }
        loaded
    }

    /// Step forward and load; `single` mode reloads the current track
    pub async fn next_track(&mut self, options: LoadOptions) -> bool {
        let target = self.step(1);
        self.load_track(Some(target), options).await
    }

    /// Step back and load; `single` mode reloads the current track
    pub async fn prev_track(&mut self, options: LoadOptions) -> bool {
        let target = self.step(-1);
        self.load_track(Some(target), options).await
    }

    fn step(&self, delta: i64) -> i64 {
        let current = self.current_index as i64;
        if self.track_list.len() > 1 && self.loop_mode != LoopMode::Single {
            current + delta
        } else {
            current
        }
    }

    // ===== Transport =====

    pub async fn play(&mut self) -> bool {
        self.engine.play().await
    }

    pub async fn pause(&mut self) {
        self.engine.pause().await;
    }

    pub async fn stop(&mut self) {
        self.engine.stop().await;
    }

    pub async fn seek(&mut self, time: f64) {
        self.engine.seek(time).await;
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.engine.on(kind, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.engine.off(id)
    }

    // ===== Signals and Actions =====

    pub async fn next_input(&mut self) -> Option<EngineInput> {
        self.engine.next_input().await
    }

    /// Dispatch one input pulled from [`next_input`](Self::next_input)
    pub async fn process(&mut self, input: EngineInput) {
        match input {
            EngineInput::Signal(signal) => self.handle_signal(&signal).await,
            EngineInput::Action(action) => {
                self.handle_action(action).await;
            }
        }
    }

    /// Process inputs until the engine is destroyed
    pub async fn run(&mut self) {
        while let Some(input) = self.next_input().await {
            self.process(input).await;
        }
    }

    /// Forward a signal to the engine and advance on end if enabled
    pub async fn handle_signal(&mut self, signal: &MediaSignal) {
        self.engine.handle_signal(signal);

        if *signal == MediaSignal::Ended {
            if let Some(options) = self.auto_next.clone() {
                self.next_track(options).await;
            }
        }
    }

    /// Handle a session action; returns whether it was handled
    pub async fn handle_action(&mut self, action: SessionAction) -> bool {
        match action {
            SessionAction::NextTrack if self.engine.is_action_bound(SessionActionKind::NextTrack) => {
                self.next_track(LoadOptions::default()).await;
                true
            }
            SessionAction::PreviousTrack
                if self.engine.is_action_bound(SessionActionKind::PreviousTrack) =>
            {
                self.prev_track(LoadOptions::default()).await;
                true
            }
            action => self.engine.handle_action(action).await,
        }
    }

    /// Destroy the engine and clear the list
    pub async fn destroy(&mut self) {
        self.engine.destroy().await;
        self.play_order = PlayOrder::default();
        self.track_list.clear();
        self.current_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::virtual_output::{VirtualContext, VirtualTransport};

    fn player(tracks: usize) -> Player {
        let engine = AudioEngine::new(
            TransportConfig::default(),
            Box::new(VirtualTransport::new()),
            VirtualContext::new().factory(),
        );
        let list = (0..tracks)
            .map(|i| Track::new(format!("{i}.mp3")))
            .collect();
        Player::new(engine).with_track_list(list)
    }

    #[test]
    fn new_list_gets_sequential_order() {
        let player = player(4);
        assert_eq!(player.play_order().as_slice(), &[0, 1, 2, 3]);
        assert_eq!(player.current_track().map(|t| t.src.as_str()), Some("0.mp3"));
    }

    #[test]
    fn random_mode_reorders_with_strategy() {
        let mut player = player(3).with_shuffle(|tracks: &[Track]| (0..tracks.len()).rev().collect());
        player.set_loop_mode(LoopMode::Random);

        assert_eq!(player.play_order().as_slice(), &[2, 1, 0]);
        let ordered: Vec<_> = player.ordered_tracks().iter().map(|t| t.src.clone()).collect();
        assert_eq!(ordered, vec!["2.mp3", "1.mp3", "0.mp3"]);
    }

    #[test]
    fn loop_mode_builder_reorders_existing_list() {
        let player = player(4)
            .with_shuffle(|tracks: &[Track]| (0..tracks.len()).rev().collect())
            .with_loop_mode(LoopMode::Random);

        assert_eq!(player.loop_mode(), LoopMode::Random);
        assert_eq!(player.play_order().as_slice(), &[3, 2, 1, 0]);

        let player = player.with_loop_mode(LoopMode::List);
        assert_eq!(player.play_order().as_slice(), &[0, 1, 2, 3]);
    }

    #[test]
    fn invalid_shuffle_falls_back_to_sequential() {
        let mut player = player(3).with_shuffle(|_: &[Track]| vec![0, 0, 1]);
        player.set_loop_mode(LoopMode::Random);
        assert_eq!(player.play_order().as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn loop_mode_change_on_empty_list_keeps_order() {
        let mut player = player(0);
        player.set_loop_mode(LoopMode::Random);
        assert!(player.play_order().is_empty());
    }

    #[test]
    fn single_mode_never_steps() {
        let mut player = player(3).with_loop_mode(LoopMode::Single);
        player.current_index = 1;
        assert_eq!(player.step(1), 1);
        assert_eq!(player.step(-1), 1);

        player.set_loop_mode(LoopMode::List);
        assert_eq!(player.step(-1), 0);
    }
}
