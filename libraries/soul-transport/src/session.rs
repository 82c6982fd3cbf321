//! Platform media session integration
//!
//! Best-effort bridge to OS media controls (MPRIS, SMTC, Now Playing).
//! The engine enables the actions it handles, pushes metadata, playback
//! state and position, and receives actions through a channel. Without a
//! session nothing changes in the core.

use crate::types::Track;

/// Transport actions a media session can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionActionKind {
    NextTrack,
    Pause,
    Play,
    PreviousTrack,
    SeekBackward,
    SeekForward,
    SeekTo,
    Stop,
}

impl SessionActionKind {
    pub const ALL: [SessionActionKind; 8] = [
        SessionActionKind::NextTrack,
        SessionActionKind::Pause,
        SessionActionKind::Play,
        SessionActionKind::PreviousTrack,
        SessionActionKind::SeekBackward,
        SessionActionKind::SeekForward,
        SessionActionKind::SeekTo,
        SessionActionKind::Stop,
    ];
}

/// Action requested by the platform
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    Play,
    Pause,
    Stop,
    NextTrack,
    PreviousTrack,
    /// Absolute position in seconds
    SeekTo { time: f64 },
    /// Relative jump forward in seconds
    SeekForward { offset: f64 },
    /// Relative jump backward in seconds
    SeekBackward { offset: f64 },
}

impl SessionAction {
    pub fn kind(&self) -> SessionActionKind {
        match self {
            SessionAction::Play => SessionActionKind::Play,
            SessionAction::Pause => SessionActionKind::Pause,
            SessionAction::Stop => SessionActionKind::Stop,
            SessionAction::NextTrack => SessionActionKind::NextTrack,
            SessionAction::PreviousTrack => SessionActionKind::PreviousTrack,
            SessionAction::SeekTo { .. } => SessionActionKind::SeekTo,
            SessionAction::SeekForward { .. } => SessionActionKind::SeekForward,
            SessionAction::SeekBackward { .. } => SessionActionKind::SeekBackward,
        }
    }
}

/// Playback state shown by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPlaybackState {
    None,
    Paused,
    Playing,
}

/// Position pushed on every time update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    pub duration: f64,
    pub position: f64,
    pub playback_rate: f64,
}

/// Platform media session
pub trait MediaSession: Send {
    /// Enable or disable an action handler
    fn set_action_handler(&mut self, kind: SessionActionKind, enabled: bool);

    fn set_playback_state(&mut self, state: SessionPlaybackState);

    fn set_metadata(&mut self, track: &Track);

    fn set_position_state(&mut self, state: PositionState);
}
