//! Transport events
//!
//! Each engine owns an [`EventRegistry`]: a map from event kind to an ordered
//! list of listeners. `emit` calls listeners synchronously in registration
//! order. There is no global bus.

use crate::error::{ErrorCode, TransportError};
use crate::types::Track;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Events emitted by the engine and the playlist
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Playback started
    Play,

    /// Playback paused (after the fade-out completed)
    Pause,

    /// Playback stopped and source cleared
    Stop,

    /// Position jumped while playing
    Seek { time: f64 },

    /// Track loaded and ready
    Load { track: Track },

    /// Error reported on the single error channel
    Error {
        code: ErrorCode,
        error: TransportError,
    },

    /// Track reached its end
    Ended,

    /// Periodic position tick (seconds)
    TimeUpdate { time: f64 },

    /// Volume changed
    Volume { value: f32 },

    /// Mute toggled
    Mute { muted: bool },

    /// Playback rate changed
    Rate { rate: f64 },

    /// Playlist loaded a track at a play position
    LoadTrack { index: usize, track: Track },

    /// Play order recomputed
    Reorder,
}

/// Event discriminant used for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Play,
    Pause,
    Stop,
    Seek,
    Load,
    Error,
    Ended,
    TimeUpdate,
    Volume,
    Mute,
    Rate,
    LoadTrack,
    Reorder,
}

impl EventKind {
    /// Event name as exposed to hosts
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Play => "play",
            EventKind::Pause => "pause",
            EventKind::Stop => "stop",
            EventKind::Seek => "seek",
            EventKind::Load => "load",
            EventKind::Error => "error",
            EventKind::Ended => "ended",
            EventKind::TimeUpdate => "timeupdate",
            EventKind::Volume => "volume",
            EventKind::Mute => "mute",
            EventKind::Rate => "rate",
            EventKind::LoadTrack => "loadTrack",
            EventKind::Reorder => "reorder",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransportEvent::Play => EventKind::Play,
            TransportEvent::Pause => EventKind::Pause,
            TransportEvent::Stop => EventKind::Stop,
            TransportEvent::Seek { .. } => EventKind::Seek,
            TransportEvent::Load { .. } => EventKind::Load,
            TransportEvent::Error { .. } => EventKind::Error,
            TransportEvent::Ended => EventKind::Ended,
            TransportEvent::TimeUpdate { .. } => EventKind::TimeUpdate,
            TransportEvent::Volume { .. } => EventKind::Volume,
            TransportEvent::Mute { .. } => EventKind::Mute,
            TransportEvent::Rate { .. } => EventKind::Rate,
            TransportEvent::LoadTrack { .. } => EventKind::LoadTrack,
            TransportEvent::Reorder => EventKind::Reorder,
        }
    }
}

/// Handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener callback
pub type Listener = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

/// Per-instance observer registry
#[derive(Default)]
pub struct EventRegistry {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an event kind
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove one listener; returns whether it was registered
    pub fn off(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        self.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|(listener_id, _)| *listener_id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Call every listener of the event's kind in registration order
    pub fn emit(&self, event: &TransportEvent) {
        if let Some(list) = self.listeners.get(&event.kind()) {
            for (_, listener) in list {
                listener(event);
            }
        }
    }

    /// Drop every listener
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Number of listeners for one kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Total number of listeners
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emit_calls_listeners_in_registration_order() {
        let mut registry = EventRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let calls = calls.clone();
            registry.on(EventKind::Play, move |_| calls.lock().unwrap().push(tag));
        }

        registry.emit(&TransportEvent::Play);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn emit_only_reaches_matching_kind() {
        let mut registry = EventRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        registry.on(EventKind::Seek, move |event| {
            if let TransportEvent::Seek { time } = event {
                sink.lock().unwrap().push(*time);
            }
        });

        registry.emit(&TransportEvent::Pause);
        registry.emit(&TransportEvent::Seek { time: 12.5 });

        assert_eq!(*seen.lock().unwrap(), vec![12.5]);
    }

    #[test]
    fn off_removes_only_that_listener() {
        let mut registry = EventRegistry::new();
        let a = registry.on(EventKind::Stop, |_| {});
        let b = registry.on(EventKind::Stop, |_| {});

        assert!(registry.off(a));
        assert!(!registry.off(a));
        assert_eq!(registry.count(EventKind::Stop), 1);

        assert!(registry.off(b));
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_empties_registry() {
        let mut registry = EventRegistry::new();
        registry.on(EventKind::Play, |_| {});
        registry.on(EventKind::Error, |_| {});
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn kinds_have_host_names() {
        assert_eq!(TransportEvent::TimeUpdate { time: 0.0 }.kind().as_str(), "timeupdate");
        assert_eq!(EventKind::LoadTrack.to_string(), "loadTrack");
    }
}
