//! Platform-agnostic audio output
//!
//! Abstracts the media transport (element playing one source) and the audio
//! processing graph (source -> processing chain -> gain -> destination).
//! The engine owns both; platforms implement the traits.

use crate::error::Result;
use crate::fade::Fade;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::broadcast;

/// Media error reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaError {
    /// Platform code (1 aborted, 2 network, 3 decode, 4 unsupported source)
    pub code: u16,

    /// Platform message, if any
    pub message: Option<String>,
}

/// Signals raised by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSignal {
    /// Enough data buffered to start playing
    CanPlay,

    /// Loading or playback failed
    Error(MediaError),

    /// Reached the end of the source
    Ended,

    /// Periodic position tick while playing
    TimeUpdate,
}

/// Media transport for one source at a time
///
/// Signals are delivered through broadcast subscriptions. Dropping a
/// receiver unregisters it.
#[async_trait]
pub trait MediaTransport: Send {
    /// Register for transport signals
    fn subscribe(&self) -> broadcast::Receiver<MediaSignal>;

    /// Replace the source (`None` clears it)
    fn set_source(&mut self, src: Option<&str>);

    /// Start loading the current source
    ///
    /// Completion is reported by `CanPlay` or `Error`.
    fn load(&mut self);

    /// Start playback
    async fn play(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Current position in seconds
    fn current_time(&self) -> f64;

    /// Jump to a position in seconds
    fn set_current_time(&mut self, time: f64);

    /// Source duration in seconds, `None` while unknown
    fn duration(&self) -> Option<f64>;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64);

    fn is_muted(&self) -> bool;

    fn set_muted(&mut self, muted: bool);
}

/// Handle to a node inside an [`OutputContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Output device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

/// Audio processing graph bound to an output device
#[async_trait]
pub trait OutputContext: Send {
    /// Device clock in seconds
    fn current_time(&self) -> f64;

    fn state(&self) -> ContextState;

    async fn resume(&mut self) -> Result<()>;

    async fn suspend(&mut self) -> Result<()>;

    /// Release the device; the context is unusable afterwards
    async fn close(&mut self) -> Result<()>;

    fn destination(&self) -> NodeId;

    fn create_gain(&mut self) -> NodeId;

    /// Node fed by the media transport
    fn create_media_source(&mut self) -> NodeId;

    fn connect(&mut self, from: NodeId, to: NodeId);

    /// Disconnect every outgoing connection of a node
    fn disconnect(&mut self, node: NodeId);

    /// Gain value at the current device time
    fn gain_value(&self, gain: NodeId) -> f32;

    /// Drop automation after `at`, holding the value reached at `at`
    fn cancel_and_hold(&mut self, gain: NodeId, at: f64);

    fn set_gain_at(&mut self, gain: NodeId, value: f32, at: f64);

    /// Schedule a value curve over `duration` seconds starting at `start`
    fn set_gain_curve(&mut self, gain: NodeId, curve: &[f32], start: f64, duration: f64);
}

/// Creates the output context on first load
pub type ContextFactory = Box<dyn FnMut() -> Box<dyn OutputContext> + Send>;

/// Creates extra processing nodes spliced in when the graph is built
pub type ExtraNodesFactory = Box<dyn Fn(&mut dyn OutputContext) -> Vec<NodeId> + Send>;

/// Future returned by asynchronous chain reconfiguration hooks
pub type ChainFuture<'a> = Pin<Box<dyn Future<Output = Option<Vec<NodeId>>> + Send + 'a>>;

/// Output graph owned by the engine
///
/// `source -> chain... -> gain -> destination`
pub(crate) struct OutputGraph {
    pub(crate) context: Box<dyn OutputContext>,
    source: NodeId,
    gain: NodeId,
    chain: Vec<NodeId>,
}

impl OutputGraph {
    /// Build the graph with the gain starting at `volume`
    pub(crate) fn build(mut context: Box<dyn OutputContext>, volume: f32) -> Self {
        let gain = context.create_gain();
        let now = context.current_time();
        context.set_gain_at(gain, volume, now);
        let source = context.create_media_source();
        let destination = context.destination();
        context.connect(gain, destination);
        context.connect(source, gain);

        Self {
            context,
            source,
            gain,
            chain: Vec::new(),
        }
    }

    pub(crate) fn chain(&self) -> &[NodeId] {
        &self.chain
    }

    /// Swap the processing chain in one step
    ///
    /// An empty replacement leaves the current chain connected.
    pub(crate) fn reconnect(&mut self, nodes: Vec<NodeId>) -> bool {
        let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
            return false;
        };

        self.context.disconnect(self.source);
        for &node in &self.chain {
            self.context.disconnect(node);
        }

        self.context.connect(self.source, first);
        for pair in nodes.windows(2) {
            self.context.connect(pair[0], pair[1]);
        }
        self.context.connect(last, self.gain);

        self.chain = nodes;
        true
    }

    pub(crate) fn gain_value(&self) -> f32 {
        self.context.gain_value(self.gain)
    }

    /// Set the gain now, cancelling scheduled automation
    pub(crate) fn set_gain(&mut self, value: f32) -> f64 {
        let now = self.context.current_time();
        self.context.cancel_and_hold(self.gain, now);
        self.context.set_gain_at(self.gain, value, now);
        now
    }

    /// Install a fade curve starting now
    pub(crate) fn schedule(&mut self, fade: &Fade) {
        if fade.is_instant() {
            self.set_gain(fade.to());
            return;
        }

        let start = self.set_gain(fade.from());
        self.context.set_gain_curve(
            self.gain,
            &fade.curve(),
            start,
            fade.duration().as_secs_f64(),
        );
    }

    /// Disconnect every node we connected
    pub(crate) fn disconnect_all(&mut self) {
        self.context.disconnect(self.source);
        for &node in &self.chain {
            self.context.disconnect(node);
        }
        self.context.disconnect(self.gain);
        self.chain.clear();
    }
}
