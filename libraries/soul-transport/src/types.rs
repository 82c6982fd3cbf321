//! Core types for transport and playlist management

use serde::{Deserialize, Serialize};

/// Weight used when a track carries no score
pub const DEFAULT_SCORE: f64 = 3.0;

/// Track information
///
/// Immutable once placed in a track list. `src` is whatever the platform
/// transport accepts (path, URL or data URI).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    /// Source identifier handed to the transport
    pub src: String,

    /// Track title
    #[serde(default)]
    pub title: Option<String>,

    /// Artist name, used to spread artists apart when shuffling
    #[serde(default)]
    pub artist: Option<String>,

    /// Album name
    #[serde(default)]
    pub album: Option<String>,

    /// Artwork URIs
    #[serde(default)]
    pub artwork: Vec<String>,

    /// Shuffle weight; higher means more likely to be scheduled early
    #[serde(default)]
    pub score: Option<f64>,
}

impl Track {
    /// Create a track with only a source
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Default::default()
        }
    }

    /// Set the artist
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the shuffle score
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Shuffle weight, defaulting to [`DEFAULT_SCORE`]
    pub fn weight(&self) -> f64 {
        match self.score {
            Some(score) if score.is_finite() && score > 0.0 => score,
            _ => DEFAULT_SCORE,
        }
    }
}

/// Loading state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// Nothing loaded
    #[default]
    Empty,

    /// Waiting for the platform to signal ready or error
    Loading,

    /// Source ready to play
    Loaded,

    /// Last load failed; a new load resets to `Loading`
    Error,
}

/// Loop mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Sequential order, advancing wraps around
    #[default]
    List,

    /// Advancing reloads the current track
    Single,

    /// Shuffled order
    Random,
}

/// Options for a single load
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Explicit MIME type, overrides the source extension
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Position to seek to before auto-play (seconds)
    #[serde(default)]
    pub start_time: Option<f64>,

    /// Whether to play once loaded (default: whether currently playing)
    #[serde(default)]
    pub auto_play: Option<bool>,
}

impl LoadOptions {
    /// Options that start playback once loaded
    pub fn autoplay() -> Self {
        Self {
            auto_play: Some(true),
            ..Default::default()
        }
    }
}
