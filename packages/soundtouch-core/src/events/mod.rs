//! Push event model, codec and dispatcher.
//!
//! This module provides:
//! - [`Envelope`] and [`DeviceEvent`], the decoded form of one `updates` frame
//! - [`decode`] to turn raw frame bytes into an [`Envelope`]
//! - [`EventHandlers`] and [`dispatch`] to route sub-events to callbacks
//!
//! Sub-event payloads reuse the device resource types from [`crate::device`].

mod codec;
mod dispatcher;

pub use codec::{decode, encode_event, encode_updates, DecodeError, DecodeResult};
pub use dispatcher::{dispatch, EventHandlers, Handler};

use crate::device::{Bass, ConnectionState, NowPlaying, Preset, Volume, Zone};

/// Closed set of sub-event types this library understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NowPlaying,
    Volume,
    ConnectionState,
    Preset,
    Zone,
    Bass,
}

impl EventKind {
    /// Every recognized kind, in dispatch table order.
    pub const ALL: [EventKind; 6] = [
        EventKind::NowPlaying,
        EventKind::Volume,
        EventKind::ConnectionState,
        EventKind::Preset,
        EventKind::Zone,
        EventKind::Bass,
    ];

    /// Element name of this kind inside an `updates` envelope.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            EventKind::NowPlaying => "nowPlayingUpdated",
            EventKind::Volume => "volumeUpdated",
            EventKind::ConnectionState => "connectionStateUpdated",
            EventKind::Preset => "presetUpdated",
            EventKind::Zone => "zoneUpdated",
            EventKind::Bass => "bassUpdated",
        }
    }

    /// Looks up the kind for an element name.
    #[must_use]
    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.element_name() == name)
    }
}

/// One sub-event carried by an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    NowPlaying(NowPlaying),
    Volume(Volume),
    ConnectionState(ConnectionState),
    Preset(Preset),
    Zone(Zone),
    Bass(Bass),
    /// Child element this library does not model, by element name.
    Unknown(String),
}

impl DeviceEvent {
    /// Returns the recognized kind, or `None` for [`DeviceEvent::Unknown`].
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            DeviceEvent::NowPlaying(_) => Some(EventKind::NowPlaying),
            DeviceEvent::Volume(_) => Some(EventKind::Volume),
            DeviceEvent::ConnectionState(_) => Some(EventKind::ConnectionState),
            DeviceEvent::Preset(_) => Some(EventKind::Preset),
            DeviceEvent::Zone(_) => Some(EventKind::Zone),
            DeviceEvent::Bass(_) => Some(EventKind::Bass),
            DeviceEvent::Unknown(_) => None,
        }
    }
}

/// One decoded `updates` frame.
///
/// Created fresh per inbound frame and never mutated after decode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// `deviceID` attribute of the envelope.
    pub device_id: String,
    /// Sub-events in document order.
    pub events: Vec<DeviceEvent>,
}

impl Envelope {
    /// Returns true if at least one sub-event has a recognized kind.
    #[must_use]
    pub fn has_recognized(&self) -> bool {
        self.events.iter().any(|e| e.kind().is_some())
    }

    /// Element names of the unrecognized children.
    pub fn unknown_names(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            DeviceEvent::Unknown(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// First now-playing sub-event.
    #[must_use]
    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.events.iter().find_map(|e| match e {
            DeviceEvent::NowPlaying(p) => Some(p),
            _ => None,
        })
    }

    /// First volume sub-event.
    #[must_use]
    pub fn volume(&self) -> Option<&Volume> {
        self.events.iter().find_map(|e| match e {
            DeviceEvent::Volume(p) => Some(p),
            _ => None,
        })
    }

    /// First connection-state sub-event.
    #[must_use]
    pub fn connection_state(&self) -> Option<&ConnectionState> {
        self.events.iter().find_map(|e| match e {
            DeviceEvent::ConnectionState(p) => Some(p),
            _ => None,
        })
    }

    /// First preset sub-event.
    #[must_use]
    pub fn preset(&self) -> Option<&Preset> {
        self.events.iter().find_map(|e| match e {
            DeviceEvent::Preset(p) => Some(p),
            _ => None,
        })
    }

    /// First zone sub-event.
    #[must_use]
    pub fn zone(&self) -> Option<&Zone> {
        self.events.iter().find_map(|e| match e {
            DeviceEvent::Zone(p) => Some(p),
            _ => None,
        })
    }

    /// First bass sub-event.
    #[must_use]
    pub fn bass(&self) -> Option<&Bass> {
        self.events.iter().find_map(|e| match e {
            DeviceEvent::Bass(p) => Some(p),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_element_name(kind.element_name()), Some(kind));
        }
        assert_eq!(EventKind::from_element_name("recentsUpdated"), None);
    }

    #[test]
    fn envelope_with_only_unknown_children_is_unrecognized() {
        let envelope = Envelope {
            device_id: "X".into(),
            events: vec![DeviceEvent::Unknown("recentsUpdated".into())],
        };
        assert!(!envelope.has_recognized());
        assert_eq!(envelope.unknown_names().collect::<Vec<_>>(), vec!["recentsUpdated"]);
        assert!(!Envelope::default().has_recognized());
    }
}
