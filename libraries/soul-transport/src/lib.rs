//! Soul Player - Audio Transport
//!
//! Platform-agnostic single-track transport and playlist control.
//!
//! This crate provides:
//! - Click-free transport (fade-in on play, fade-out on pause, ducked seeks)
//! - Load with ready/error/timeout race and codec capability checks
//! - Automatic fade-out before the end of a track
//! - Playlist navigation with list, single and random loop modes
//! - Uniform and weighted artist-spreading shuffles
//! - Optional platform media session integration
//!
//! # Architecture
//!
//! `soul-transport` owns no audio device. The platform supplies:
//! - a [`MediaTransport`] playing one source at a time
//! - an [`OutputContext`] holding the gain graph
//! - optionally a [`MediaSession`] for OS media controls
//!
//! [`virtual_output`] implements the first two in-process for tests and
//! headless use.
//!
//! # Example: Playlist
//!
//! ```rust
//! use soul_transport::virtual_output::{VirtualContext, VirtualTransport};
//! use soul_transport::{LoadOptions, LoopMode, Player, PlayerConfig, Track};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = PlayerConfig {
//!     loop_mode: LoopMode::List,
//!     ..Default::default()
//! };
//!
//! let mut player = Player::from_config(
//!     &config,
//!     Box::new(VirtualTransport::new()),
//!     VirtualContext::new().factory(),
//! )
//! .with_track_list(vec![
//!     Track::new("/music/one.flac").with_artist("A"),
//!     Track::new("/music/two.mp3").with_artist("B"),
//! ]);
//!
//! assert!(player.load_track(Some(0), LoadOptions::default()).await);
//! assert!(player.next_track(LoadOptions::default()).await);
//! assert_eq!(player.current_index(), 1);
//! # }
//! ```
//!
//! # Example: Events
//!
//! ```rust
//! use soul_transport::virtual_output::{VirtualContext, VirtualTransport};
//! use soul_transport::{AudioEngine, EventKind, TransportConfig, TransportEvent};
//!
//! let mut engine = AudioEngine::new(
//!     TransportConfig::default(),
//!     Box::new(VirtualTransport::new()),
//!     VirtualContext::new().factory(),
//! );
//!
//! engine.on(EventKind::Error, |event| {
//!     if let TransportEvent::Error { code, error } = event {
//!         eprintln!("[{}] {}", code.as_i8(), error);
//!     }
//! });
//! ```

mod codecs;
mod config;
mod engine;
mod error;
mod events;
mod fade;
mod order;
mod output;
mod player;
mod session;
pub mod types;
pub mod util;
pub mod virtual_output;

// Public exports
pub use codecs::{infer_media_type, CodecProvider, CodecSet};
pub use config::{PlayerConfig, TransportConfig, ENV_PREFIX};
pub use engine::{AudioEngine, EngineInput};
pub use error::{ErrorCode, Result, TransportError};
pub use events::{EventKind, EventRegistry, Listener, ListenerId, TransportEvent};
pub use fade::{clamp_volume, curve_value, Fade};
pub use order::{
    LimitFn, PlayOrder, Sequential, ShuffleStrategy, UniformShuffle, WeightedArtistShuffle,
    DEFAULT_WINDOW,
};
pub use output::{
    ChainFuture, ContextFactory, ContextState, ExtraNodesFactory, MediaError, MediaSignal,
    MediaTransport, NodeId, OutputContext,
};
pub use player::Player;
pub use session::{
    MediaSession, PositionState, SessionAction, SessionActionKind, SessionPlaybackState,
};
pub use types::{LoadOptions, LoadState, LoopMode, Track, DEFAULT_SCORE};
