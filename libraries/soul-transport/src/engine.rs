//! Audio engine - single-track transport state machine
//!
//! Owns one media transport and, once the first track loads, one output
//! graph. Every start, pause and seek is smoothed with a gain fade, loads
//! race the platform's ready/error signals against a timeout, and results
//! are reported through the instance's event registry.
//!
//! The engine is driven from a single task: operations take `&mut self`
//! and transport signals are pulled with [`AudioEngine::next_input`] and
//! fed back through [`AudioEngine::handle_signal`].

use crate::codecs::{infer_media_type, CodecProvider, CodecSet};
use crate::config::TransportConfig;
use crate::error::{ErrorCode, Result, TransportError};
use crate::events::{EventKind, EventRegistry, ListenerId, TransportEvent};
use crate::fade::{clamp_volume, Fade};
use crate::output::{
    ChainFuture, ContextFactory, ContextState, ExtraNodesFactory, MediaSignal, MediaTransport,
    NodeId, OutputContext, OutputGraph,
};
use crate::session::{
    MediaSession, PositionState, SessionAction, SessionActionKind, SessionPlaybackState,
};
use crate::types::{LoadOptions, LoadState, Track};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

/// Message used when the platform gives no error text
const UNKNOWN_AUDIO_ERROR: &str = "Unknown audio error";

/// Actions the engine handles itself
const ENGINE_ACTIONS: [SessionActionKind; 6] = [
    SessionActionKind::Play,
    SessionActionKind::Pause,
    SessionActionKind::Stop,
    SessionActionKind::SeekTo,
    SessionActionKind::SeekForward,
    SessionActionKind::SeekBackward,
];

/// Input pulled by [`AudioEngine::next_input`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineInput {
    Signal(MediaSignal),
    Action(SessionAction),
}

struct SessionBinding {
    session: Box<dyn MediaSession>,
    actions: Option<mpsc::UnboundedReceiver<SessionAction>>,
    bound: HashSet<SessionActionKind>,
}

enum Pulled {
    Input(EngineInput),
    SignalsClosed,
    ActionsClosed,
    Lagged(u64),
}

/// Single-track transport
pub struct AudioEngine {
    config: TransportConfig,
    transport: Option<Box<dyn MediaTransport>>,
    signals: Option<broadcast::Receiver<MediaSignal>>,
    context_factory: Option<ContextFactory>,
    extra_nodes: Option<ExtraNodesFactory>,
    graph: Option<OutputGraph>,
    codecs: Arc<dyn CodecProvider>,
    session: Option<SessionBinding>,
    events: EventRegistry,
    state: LoadState,
    is_ending: bool,
    destroyed: bool,
}

impl AudioEngine {
    /// Create an engine; the output context is created on the first load
    pub fn new(
        config: TransportConfig,
        transport: Box<dyn MediaTransport>,
        context_factory: ContextFactory,
    ) -> Self {
        let signals = transport.subscribe();

        Self {
            config: TransportConfig {
                volume: clamp_volume(config.volume),
                ..config
            },
            transport: Some(transport),
            signals: Some(signals),
            context_factory: Some(context_factory),
            extra_nodes: None,
            graph: None,
            codecs: Arc::new(CodecSet::common()),
            session: None,
            events: EventRegistry::new(),
            state: LoadState::Empty,
            is_ending: false,
            destroyed: false,
        }
    }

    /// Replace the codec capability set
    #[must_use]
    pub fn with_codecs(mut self, codecs: Arc<dyn CodecProvider>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Splice extra processing nodes between source and gain
    #[must_use]
    pub fn with_extra_nodes<F>(mut self, factory: F) -> Self
    where
        F: Fn(&mut dyn OutputContext) -> Vec<NodeId> + Send + 'static,
    {
        self.extra_nodes = Some(Box::new(factory));
        self
    }

    /// Bind a platform media session
    ///
    /// Ignored unless `media_session` is enabled in the configuration.
    #[must_use]
    pub fn with_session(
        mut self,
        session: Box<dyn MediaSession>,
        actions: mpsc::UnboundedReceiver<SessionAction>,
    ) -> Self {
        if !self.config.media_session {
            debug!("Media session disabled, ignoring binding");
            return self;
        }

        self.session = Some(SessionBinding {
            session,
            actions: Some(actions),
            bound: HashSet::new(),
        });
        for kind in ENGINE_ACTIONS {
            self.bind_action(kind);
        }
        self
    }

    /// Enable a session action handler
    pub(crate) fn bind_action(&mut self, kind: SessionActionKind) {
        if let Some(binding) = self.session.as_mut() {
            binding.session.set_action_handler(kind, true);
            binding.bound.insert(kind);
        }
    }

    pub(crate) fn is_action_bound(&self, kind: SessionActionKind) -> bool {
        self.session
            .as_ref()
            .is_some_and(|binding| binding.bound.contains(&kind))
    }

    // ===== Loading =====

    /// Load a track, racing ready/error against the timeout
    ///
    /// Returns `true` once the track is loaded (and playing, if requested).
    /// Failures are reported on the `error` event.
    pub async fn load(&mut self, track: &Track, options: LoadOptions) -> bool {
        if self.destroyed {
            return self.report(TransportError::Destroyed);
        }

        let supported = infer_media_type(&track.src, options.mime_type.as_deref())
            .is_some_and(|token| self.codecs.supports(&token));
        if !supported {
            return self.report(TransportError::UnsupportedMediaType {
                src: track.src.clone(),
            });
        }

        let playing = self.is_playing();
        let auto_play = options.auto_play.unwrap_or(playing);
        if auto_play && playing {
            self.stop().await;
        }

        self.ensure_graph();
        if let Some(graph) = self.graph.as_mut() {
            if let Err(e) = graph.context.suspend().await {
                warn!("Failed to suspend output before load: {}", e);
            }
        }

        self.state = LoadState::Loading;
        self.is_ending = false;
        debug!(src = %track.src, "Loading track");

        if let Err(error) = self.race_load(&track.src).await {
            self.state = LoadState::Error;
            return self.report(error);
        }

        self.emit(TransportEvent::Load {
            track: track.clone(),
        });
        if let Some(binding) = self.session.as_mut() {
            binding.session.set_metadata(track);
        }
        self.state = LoadState::Loaded;

        if auto_play {
            if let Some(start) = options.start_time.filter(|t| *t > 0.0) {
                self.seek(start).await;
            }
            return self.play().await;
        }

        true
    }

    /// Wait for the first of ready, error or timeout
    ///
    /// The subscription is dropped on return, so no listener outlives the
    /// race whichever way it ends.
    async fn race_load(&mut self, src: &str) -> Result<()> {
        let timeout_ms = self.config.timeout_ms;
        let transport = self.transport.as_mut().ok_or(TransportError::Destroyed)?;

        let mut signals = transport.subscribe();
        transport.set_source(Some(src));
        transport.load();

        let deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = &mut deadline => {
                    return Err(TransportError::LoadTimeout {
                        src: src.to_string(),
                        timeout_ms,
                    });
                }
                signal = signals.recv() => match signal {
                    Ok(MediaSignal::CanPlay) => return Ok(()),
                    Ok(MediaSignal::Error(error)) => {
                        return Err(TransportError::Media {
                            code: ErrorCode::from_media(error.code),
                            message: error
                                .message
                                .unwrap_or_else(|| UNKNOWN_AUDIO_ERROR.to_string()),
                        });
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        return Err(TransportError::Media {
                            code: ErrorCode::Unknown,
                            message: UNKNOWN_AUDIO_ERROR.to_string(),
                        });
                    }
                },
            }
        }
    }

    fn ensure_graph(&mut self) {
        if self.graph.is_some() {
            return;
        }
        let Some(factory) = self.context_factory.as_mut() else {
            return;
        };

        let mut graph = OutputGraph::build(factory(), self.config.volume);
        if let Some(extra) = &self.extra_nodes {
            let nodes = extra(graph.context.as_mut());
            let count = nodes.len();
            if graph.reconnect(nodes) {
                debug!("Spliced {} extra processing nodes", count);
            }
        }

        info!("Output graph created");
        self.graph = Some(graph);
    }

    // ===== Playback Control =====

    /// Start playback with a fade-in
    ///
    /// Returns `true` if already playing. Returns `false` without an error
    /// when nothing is loaded.
    pub async fn play(&mut self) -> bool {
        if self.is_playing() {
            return true;
        }
        if self.graph.is_none() || self.state != LoadState::Loaded {
            return false;
        }

        match self.start_playback().await {
            Ok(()) => true,
            Err(error) => self.report(error),
        }
    }

    async fn start_playback(&mut self) -> Result<()> {
        let graph = self.graph.as_mut().ok_or(TransportError::Destroyed)?;
        if graph.context.state() == ContextState::Suspended {
            graph.context.resume().await.map_err(into_playback)?;
        }

        self.is_ending = false;
        let previous = graph.gain_value();
        self.set_gain(0.0);

        let transport = self.transport.as_mut().ok_or(TransportError::Destroyed)?;
        if let Err(error) = transport.play().await {
            self.set_gain(previous);
            return Err(into_playback(error));
        }

        self.set_session_state(SessionPlaybackState::Playing);
        self.emit(TransportEvent::Play);
        debug!("Playback started");
        self.fade(0.0, self.config.volume, None).await;
        Ok(())
    }

    /// Fade out, then pause (no-op when not playing)
    pub async fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }

        self.fade(self.config.volume, 0.0, None).await;
        self.set_session_state(SessionPlaybackState::Paused);
        if let Some(graph) = self.graph.as_mut() {
            if let Err(e) = graph.context.suspend().await {
                warn!("Failed to suspend output: {}", e);
            }
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.pause();
        }

        self.emit(TransportEvent::Pause);
        debug!("Playback paused");
    }

    /// Pause, rewind and clear the source
    pub async fn stop(&mut self) {
        self.pause().await;

        if let Some(transport) = self.transport.as_mut() {
            transport.set_current_time(0.0);
        }
        self.set_session_state(SessionPlaybackState::None);
        if let Some(transport) = self.transport.as_mut() {
            transport.set_source(None);
            transport.load();
        }

        self.state = LoadState::Empty;
        self.emit(TransportEvent::Stop);
        debug!("Playback stopped");
    }

    /// Jump to a position, clamped to `[0, duration]`
    ///
    /// While playing the jump is wrapped in a half-volume dip; otherwise the
    /// position is set silently.
    pub async fn seek(&mut self, time: f64) {
        let target = time.max(0.0).min(self.duration());

        if !self.is_playing() {
            if let Some(transport) = self.transport.as_mut() {
                transport.set_current_time(target);
            }
            return;
        }

        let volume = self.config.volume;
        let half = self.config.fade_duration_ms as f64 / 2.0;

        self.fade(volume, volume / 2.0, Some(half)).await;
        if let Some(transport) = self.transport.as_mut() {
            transport.set_current_time(target);
        }
        self.emit(TransportEvent::Seek { time: target });
        self.fade(volume / 2.0, volume, Some(half)).await;
    }

    /// Fade the output gain and wait for it to finish
    ///
    /// `None` uses the configured fade duration; zero sets `to` at once.
    pub async fn fade(&mut self, from: f32, to: f32, duration_ms: Option<f64>) {
        let duration_ms = duration_ms.unwrap_or(self.config.fade_duration_ms as f64);
        let fade = Fade::new(from, to, duration_ms);

        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        graph.schedule(&fade);
        if !fade.duration().is_zero() {
            tokio::time::sleep(fade.duration()).await;
        }
    }

    fn set_gain(&mut self, value: f32) {
        if let Some(graph) = self.graph.as_mut() {
            graph.set_gain(value);
        }
    }

    fn set_session_state(&mut self, state: SessionPlaybackState) {
        if let Some(binding) = self.session.as_mut() {
            binding.session.set_playback_state(state);
        }
    }

    // ===== State Queries =====

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Whether the transport is currently playing
    pub fn is_playing(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| !t.is_paused())
    }

    /// Source duration in seconds, 0 while unknown
    pub fn duration(&self) -> f64 {
        self.transport
            .as_ref()
            .and_then(|t| t.duration())
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0)
    }

    /// Position in seconds
    pub fn current_time(&self) -> f64 {
        self.transport.as_ref().map_or(0.0, |t| t.current_time())
    }

    /// Current output gain, `None` before the graph exists
    pub fn gain(&self) -> Option<f32> {
        self.graph.as_ref().map(OutputGraph::gain_value)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ===== Volume, Mute, Rate =====

    pub fn volume(&self) -> f32 {
        self.config.volume
    }

    /// Set the volume (clamped to `[0, 1]`) and apply it to the gain now
    pub fn set_volume(&mut self, volume: f32) {
        let volume = clamp_volume(volume);
        self.config.volume = volume;
        self.set_gain(volume);
        self.emit(TransportEvent::Volume { value: volume });
    }

    pub fn is_muted(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_muted())
    }

    /// Mute the transport; the configured volume is kept
    pub fn set_muted(&mut self, muted: bool) {
        if let Some(transport) = self.transport.as_mut() {
            transport.set_muted(muted);
        }
        self.emit(TransportEvent::Mute { muted });
    }

    pub fn playback_rate(&self) -> f64 {
        self.transport.as_ref().map_or(1.0, |t| t.playback_rate())
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        if let Some(transport) = self.transport.as_mut() {
            transport.set_playback_rate(rate);
        }
        self.emit(TransportEvent::Rate { rate });
    }

    /// Fade duration in milliseconds
    pub fn fade_duration(&self) -> u64 {
        self.config.fade_duration_ms
    }

    /// Takes effect on the next fade
    pub fn set_fade_duration(&mut self, duration_ms: u64) {
        self.config.fade_duration_ms = duration_ms;
    }

    // ===== Output Graph =====

    /// Reconfigure the processing chain
    ///
    /// The closure receives the context and the current chain. Returning a
    /// non-empty list swaps the chain in one step; `None` or an empty list
    /// keeps it. Returns whether the chain changed. No-op before the first
    /// load.
    pub fn handle_context<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut dyn OutputContext, &[NodeId]) -> Option<Vec<NodeId>>,
    {
        let Some(graph) = self.graph.as_mut() else {
            return false;
        };

        let chain = graph.chain().to_vec();
        match f(graph.context.as_mut(), &chain) {
            Some(nodes) => graph.reconnect(nodes),
            None => false,
        }
    }

    /// Asynchronous variant of [`handle_context`](Self::handle_context)
    pub async fn handle_context_async<F>(&mut self, f: F) -> bool
    where
        F: for<'a> FnOnce(&'a mut dyn OutputContext, &'a [NodeId]) -> ChainFuture<'a>,
    {
        let Some(graph) = self.graph.as_mut() else {
            return false;
        };

        let chain = graph.chain().to_vec();
        let nodes = f(graph.context.as_mut(), &chain).await;
        match nodes {
            Some(nodes) => graph.reconnect(nodes),
            None => false,
        }
    }

    // ===== Signals and Actions =====

    /// Wait for the next transport signal or session action
    ///
    /// Returns `None` once both sources are closed (after `destroy`).
    pub async fn next_input(&mut self) -> Option<EngineInput> {
        loop {
            let actions = self.session.as_mut().and_then(|b| b.actions.as_mut());
            let pulled = match (self.signals.as_mut(), actions) {
                (None, None) => return None,
                (Some(signals), None) => pulled_signal(signals.recv().await),
                (None, Some(actions)) => pulled_action(actions.recv().await),
                (Some(signals), Some(actions)) => tokio::select! {
                    signal = signals.recv() => pulled_signal(signal),
                    action = actions.recv() => pulled_action(action),
                },
            };

            match pulled {
                Pulled::Input(input) => return Some(input),
                Pulled::SignalsClosed => self.signals = None,
                Pulled::ActionsClosed => {
                    if let Some(binding) = self.session.as_mut() {
                        binding.actions = None;
                    }
                }
                Pulled::Lagged(skipped) => warn!("Dropped {} transport signals", skipped),
            }
        }
    }

    /// React to a transport signal
    pub fn handle_signal(&mut self, signal: &MediaSignal) {
        match signal {
            MediaSignal::TimeUpdate => self.on_time_update(),
            MediaSignal::Ended => {
                debug!("Track ended");
                self.emit(TransportEvent::Ended);
            }
            MediaSignal::CanPlay | MediaSignal::Error(_) => {
                trace!(?signal, "Load signal outside of a load");
            }
        }
    }

    fn on_time_update(&mut self) {
        let position = self.current_time();
        let duration = self.duration();
        let playback_rate = self.playback_rate();

        if let Some(binding) = self.session.as_mut() {
            binding.session.set_position_state(PositionState {
                duration,
                position,
                playback_rate,
            });
        }
        self.emit(TransportEvent::TimeUpdate { time: position });

        let fade_ms = self.config.fade_duration_ms as f64;
        if fade_ms <= 0.0 || self.is_ending || duration <= 0.0 {
            return;
        }

        let remaining_ms = (duration - position) * 1000.0;
        if remaining_ms < fade_ms {
            self.is_ending = true;
            if let Some(graph) = self.graph.as_mut() {
                let from = graph.gain_value();
                graph.schedule(&Fade::new(from, 0.0, remaining_ms));
            }
            debug!("Fading out {:.0}ms before end", remaining_ms);
        }
    }

    /// Handle a session action bound by the engine
    ///
    /// Returns whether the action was handled.
    pub async fn handle_action(&mut self, action: SessionAction) -> bool {
        if !self.is_action_bound(action.kind()) {
            return false;
        }

        match action {
            SessionAction::Play => {
                self.play().await;
            }
            SessionAction::Pause => self.pause().await,
            SessionAction::Stop => self.stop().await,
            SessionAction::SeekTo { time } => self.seek(time).await,
            SessionAction::SeekForward { offset } => {
                self.seek(self.current_time() + offset).await;
            }
            SessionAction::SeekBackward { offset } => {
                self.seek(self.current_time() - offset).await;
            }
            SessionAction::NextTrack | SessionAction::PreviousTrack => return false,
        }
        true
    }

    // ===== Events =====

    /// Subscribe to an event kind
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub(crate) fn emit(&self, event: TransportEvent) {
        self.events.emit(&event);
    }

    /// Report an error on the `error` event; always returns `false`
    pub(crate) fn report(&self, error: TransportError) -> bool {
        let code = error.code();
        warn!(code = code.as_i8(), "{}", error);
        self.emit(TransportEvent::Error { code, error });
        false
    }

    // ===== Teardown =====

    /// Release every resource; later calls are no-ops
    pub async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.pause().await;

        if let Some(mut graph) = self.graph.take() {
            graph.disconnect_all();
            if let Err(e) = graph.context.close().await {
                warn!("Failed to close output: {}", e);
            }
        }

        if let Some(mut binding) = self.session.take() {
            binding.session.set_playback_state(SessionPlaybackState::None);
            for kind in SessionActionKind::ALL {
                binding.session.set_action_handler(kind, false);
            }
        }

        self.events.clear();
        self.signals = None;
        self.transport = None;
        self.context_factory = None;
        self.extra_nodes = None;
        self.state = LoadState::Empty;
        self.is_ending = false;
        self.destroyed = true;
        info!("Audio engine destroyed");
    }
}

fn into_playback(error: TransportError) -> TransportError {
    match error {
        TransportError::Playback(_) => error,
        other => TransportError::Playback(other.to_string()),
    }
}

fn pulled_signal(result: std::result::Result<MediaSignal, RecvError>) -> Pulled {
    match result {
        Ok(signal) => Pulled::Input(EngineInput::Signal(signal)),
        Err(RecvError::Lagged(skipped)) => Pulled::Lagged(skipped),
        Err(RecvError::Closed) => Pulled::SignalsClosed,
    }
}

fn pulled_action(action: Option<SessionAction>) -> Pulled {
    match action {
        Some(action) => Pulled::Input(EngineInput::Action(action)),
        None => Pulled::ActionsClosed,
    }
}
