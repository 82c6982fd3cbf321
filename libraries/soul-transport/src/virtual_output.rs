//! In-process output backend
//!
//! A media transport and output context that simulate a platform without
//! any audio device. Time follows the tokio clock, so tests running with a
//! paused runtime observe fades, timeouts and the playback position
//! deterministically. Both types are cheap handles over shared state: keep
//! a clone to drive or inspect the instance owned by the engine.

use crate::error::{Result, TransportError};
use crate::fade::curve_value;
use crate::output::{
    ContextFactory, ContextState, MediaError, MediaSignal, MediaTransport, NodeId, OutputContext,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Signal channel capacity
const SIGNAL_CAPACITY: usize = 64;

/// Duration reported for sources without an explicit one (seconds)
const DEFAULT_DURATION: f64 = 180.0;

/// How a source responds to `load`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBehavior {
    /// Signal `CanPlay` right away
    Ready,

    /// Signal an error with the given platform code
    Fail(u16),

    /// Never signal anything
    Hang,
}

#[derive(Debug)]
struct TransportState {
    src: Option<String>,
    paused: bool,
    position: f64,
    anchor: Option<Instant>,
    duration: Option<f64>,
    rate: f64,
    muted: bool,
    durations: HashMap<String, f64>,
    behaviors: HashMap<String, LoadBehavior>,
    play_error: Option<String>,
    loads: usize,
}

impl TransportState {
    fn position_at(&self, now: Instant) -> f64 {
        let position = match self.anchor {
            Some(anchor) => self.position + now.duration_since(anchor).as_secs_f64() * self.rate,
            None => self.position,
        };
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn freeze(&mut self, now: Instant) {
        self.position = self.position_at(now);
        self.anchor = None;
    }
}

/// Simulated media transport
#[derive(Debug, Clone)]
pub struct VirtualTransport {
    state: Arc<Mutex<TransportState>>,
    signals: broadcast::Sender<MediaSignal>,
}

impl Default for VirtualTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualTransport {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(TransportState {
                src: None,
                paused: true,
                position: 0.0,
                anchor: None,
                duration: None,
                rate: 1.0,
                muted: false,
                durations: HashMap::new(),
                behaviors: HashMap::new(),
                play_error: None,
                loads: 0,
            })),
            signals,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set how loading `src` resolves (default: ready)
    pub fn set_load_behavior(&self, src: impl Into<String>, behavior: LoadBehavior) {
        self.lock().behaviors.insert(src.into(), behavior);
    }

    /// Set the duration reported once `src` is loaded
    pub fn set_duration(&self, src: impl Into<String>, seconds: f64) {
        self.lock().durations.insert(src.into(), seconds);
    }

    /// Make the next `play` call fail
    pub fn fail_next_play(&self, message: impl Into<String>) {
        self.lock().play_error = Some(message.into());
    }

    /// Raise a signal as the platform would
    pub fn emit(&self, signal: MediaSignal) {
        // No receivers is not an error for a platform element
        let _ = self.signals.send(signal);
    }

    /// Current source
    pub fn source(&self) -> Option<String> {
        self.lock().src.clone()
    }

    /// Number of `load` calls so far
    pub fn load_count(&self) -> usize {
        self.lock().loads
    }

    /// Advance playback bookkeeping and raise the matching signals
    ///
    /// Emits `TimeUpdate` while playing, then `Ended` once the position
    /// reaches the duration.
    pub fn tick(&self) {
        let now = Instant::now();
        let ended = {
            let mut state = self.lock();
            if state.paused || state.src.is_none() {
                return;
            }

            let position = state.position_at(now);
            match state.duration {
                Some(duration) if position >= duration => {
                    state.freeze(now);
                    state.paused = true;
                    true
                }
                _ => false,
            }
        };

        self.emit(MediaSignal::TimeUpdate);
        if ended {
            self.emit(MediaSignal::Ended);
        }
    }

    /// Call [`tick`](Self::tick) every `period` until the task is dropped
    pub async fn run_clock(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            self.tick();
        }
    }
}

#[async_trait]
impl MediaTransport for VirtualTransport {
    fn subscribe(&self) -> broadcast::Receiver<MediaSignal> {
        self.signals.subscribe()
    }

    fn set_source(&mut self, src: Option<&str>) {
        let mut state = self.lock();
        state.src = src.map(str::to_string);
        state.paused = true;
        state.anchor = None;
        state.position = 0.0;
        state.duration = None;
    }

    fn load(&mut self) {
        let signal = {
            let mut state = self.lock();
            state.loads += 1;
            let Some(src) = state.src.clone() else {
                return;
            };

            match state.behaviors.get(&src).copied().unwrap_or(LoadBehavior::Ready) {
                LoadBehavior::Ready => {
                    state.duration =
                        Some(state.durations.get(&src).copied().unwrap_or(DEFAULT_DURATION));
                    MediaSignal::CanPlay
                }
                LoadBehavior::Fail(code) => MediaSignal::Error(MediaError {
                    code,
                    message: None,
                }),
                LoadBehavior::Hang => return,
            }
        };

        self.emit(signal);
    }

    async fn play(&mut self) -> Result<()> {
        let mut state = self.lock();
        if let Some(message) = state.play_error.take() {
            return Err(TransportError::Playback(message));
        }
        if state.src.is_none() {
            return Err(TransportError::Playback("no source".to_string()));
        }

        if state.paused {
            state.paused = false;
            state.anchor = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.lock();
        if !state.paused {
            state.freeze(Instant::now());
            state.paused = true;
        }
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.lock().position_at(Instant::now())
    }

    fn set_current_time(&mut self, time: f64) {
        let now = Instant::now();
        let mut state = self.lock();
        state.position = time;
        if state.anchor.is_some() {
            state.anchor = Some(now);
        }
    }

    fn duration(&self) -> Option<f64> {
        self.lock().duration
    }

    fn playback_rate(&self) -> f64 {
        self.lock().rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        let now = Instant::now();
        let mut state = self.lock();
        if state.anchor.is_some() {
            state.freeze(now);
            state.anchor = Some(now);
        }
        state.rate = rate;
    }

    fn is_muted(&self) -> bool {
        self.lock().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.lock().muted = muted;
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Automation {
    Set { value: f32, at: f64 },
    Curve { values: Vec<f32>, start: f64, duration: f64 },
}

impl Automation {
    fn start(&self) -> f64 {
        match self {
            Automation::Set { at, .. } => *at,
            Automation::Curve { start, .. } => *start,
        }
    }

    fn end(&self) -> f64 {
        match self {
            Automation::Set { at, .. } => *at,
            Automation::Curve { start, duration, .. } => start + duration,
        }
    }
}

#[derive(Debug)]
struct ContextInner {
    state: ContextState,
    origin: Instant,
    next_node: u32,
    connections: Vec<(NodeId, NodeId)>,
    automation: HashMap<NodeId, Vec<Automation>>,
    first_gain: Option<NodeId>,
    opened: usize,
    fail_close: bool,
}

impl ContextInner {
    fn now(&self) -> f64 {
        Instant::now().duration_since(self.origin).as_secs_f64()
    }

    fn allocate(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    fn gain_at(&self, gain: NodeId, time: f64) -> f32 {
        let mut value = 1.0;
        for event in self.automation.get(&gain).into_iter().flatten() {
            if event.start() > time {
                break;
            }
            value = match event {
                Automation::Set { value, .. } => *value,
                Automation::Curve { values, start, duration } => {
                    let progress = if *duration > 0.0 {
                        (time - start) / duration
                    } else {
                        1.0
                    };
                    curve_value(values, progress)
                }
            };
        }
        value
    }
}

/// Destination node of every virtual context
const DESTINATION: NodeId = NodeId(0);

/// Simulated audio processing graph
#[derive(Debug, Clone)]
pub struct VirtualContext {
    inner: Arc<Mutex<ContextInner>>,
}

impl Default for VirtualContext {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextInner {
                state: ContextState::Running,
                origin: Instant::now(),
                next_node: DESTINATION.0,
                connections: Vec::new(),
                automation: HashMap::new(),
                first_gain: None,
                opened: 0,
                fail_close: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Factory handing out this context, counting each call
    pub fn factory(&self) -> ContextFactory {
        let context = self.clone();
        Box::new(move || {
            context.lock().opened += 1;
            Box::new(context.clone()) as Box<dyn OutputContext>
        })
    }

    /// How many times the factory has been invoked
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Current value of the first gain node created (the output gain)
    pub fn output_gain(&self) -> Option<f32> {
        let inner = self.lock();
        let gain = inner.first_gain?;
        Some(inner.gain_at(gain, inner.now()))
    }

    /// Every live connection in creation order
    pub fn connections(&self) -> Vec<(NodeId, NodeId)> {
        self.lock().connections.clone()
    }

    /// Make `close` report a failure
    pub fn fail_close(&self) {
        self.lock().fail_close = true;
    }
}

#[async_trait]
impl OutputContext for VirtualContext {
    fn current_time(&self) -> f64 {
        self.lock().now()
    }

    fn state(&self) -> ContextState {
        self.lock().state
    }

    async fn resume(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == ContextState::Closed {
            return Err(TransportError::Output("context is closed".to_string()));
        }
        inner.state = ContextState::Running;
        Ok(())
    }

    async fn suspend(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == ContextState::Closed {
            return Err(TransportError::Output("context is closed".to_string()));
        }
        inner.state = ContextState::Suspended;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.state = ContextState::Closed;
        if inner.fail_close {
            return Err(TransportError::Output("device refused to close".to_string()));
        }
        Ok(())
    }

    fn destination(&self) -> NodeId {
        DESTINATION
    }

    fn create_gain(&mut self) -> NodeId {
        let mut inner = self.lock();
        let node = inner.allocate();
        inner.first_gain.get_or_insert(node);
        node
    }

    fn create_media_source(&mut self) -> NodeId {
        self.lock().allocate()
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        self.lock().connections.push((from, to));
    }

    fn disconnect(&mut self, node: NodeId) {
        self.lock().connections.retain(|(from, _)| *from != node);
    }

    fn gain_value(&self, gain: NodeId) -> f32 {
        let inner = self.lock();
        inner.gain_at(gain, inner.now())
    }

    fn cancel_and_hold(&mut self, gain: NodeId, at: f64) {
        let mut inner = self.lock();
        let held = inner.gain_at(gain, at);
        let events = inner.automation.entry(gain).or_default();
        events.retain(|event| event.end() < at);
        events.push(Automation::Set { value: held, at });
    }

    fn set_gain_at(&mut self, gain: NodeId, value: f32, at: f64) {
        let mut inner = self.lock();
        let events = inner.automation.entry(gain).or_default();
        events.retain(|event| event.start() < at);
        events.push(Automation::Set { value, at });
    }

    fn set_gain_curve(&mut self, gain: NodeId, curve: &[f32], start: f64, duration: f64) {
        let mut inner = self.lock();
        let events = inner.automation.entry(gain).or_default();
        events.retain(|event| event.start() < start);
        events.push(Automation::Curve {
            values: curve.to_vec(),
            start,
            duration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn transport_clock_follows_tokio_time() {
        let mut transport = VirtualTransport::new();
        transport.set_duration("a.mp3", 10.0);
        transport.set_source(Some("a.mp3"));
        transport.load();
        transport.play().await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((transport.current_time() - 3.0).abs() < 1e-6);

        transport.pause();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((transport.current_time() - 3.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_signals_end_of_source() {
        let mut transport = VirtualTransport::new();
        let mut signals = transport.subscribe();
        transport.set_duration("a.mp3", 1.0);
        transport.set_source(Some("a.mp3"));
        transport.load();
        assert_eq!(signals.recv().await.unwrap(), MediaSignal::CanPlay);

        transport.play().await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        transport.tick();

        assert_eq!(signals.recv().await.unwrap(), MediaSignal::TimeUpdate);
        assert_eq!(signals.recv().await.unwrap(), MediaSignal::Ended);
        assert!(transport.is_paused());
        assert_eq!(transport.current_time(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn gain_curve_interpolates_over_time() {
        let mut context = VirtualContext::new();
        let gain = context.create_gain();
        context.set_gain_at(gain, 1.0, 0.0);
        context.set_gain_curve(gain, &[1.0, 0.5, 0.0], 0.0, 1.0);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!((context.gain_value(gain) - 0.75).abs() < 1e-3);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(context.gain_value(gain), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_hold_freezes_mid_curve() {
        let mut context = VirtualContext::new();
        let gain = context.create_gain();
        context.set_gain_curve(gain, &[0.0, 1.0], 0.0, 1.0);

        tokio::time::advance(Duration::from_millis(500)).await;
        let now = context.current_time();
        context.cancel_and_hold(gain, now);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((context.gain_value(gain) - 0.5).abs() < 1e-3);
    }
}
