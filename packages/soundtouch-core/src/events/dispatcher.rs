//! Routing of decoded envelopes to application callbacks.

use std::fmt;
use std::sync::Arc;

use super::{DeviceEvent, Envelope};
use crate::device::{Bass, ConnectionState, NowPlaying, Preset, Volume, Zone};

/// Callback receiving one payload.
///
/// Callbacks run on the connection's read-loop task. They must return
/// quickly; a blocking callback stalls delivery of every later frame.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Callback table: one optional slot per recognized event kind plus a
/// catch-all for envelopes without any recognized sub-event.
///
/// Cloning is cheap (the slots are reference counted), which lets the
/// read-loop snapshot the table and release its lock before invoking
/// anything.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub now_playing: Option<Handler<NowPlaying>>,
    pub volume: Option<Handler<Volume>>,
    pub connection_state: Option<Handler<ConnectionState>>,
    pub preset: Option<Handler<Preset>>,
    pub zone: Option<Handler<Zone>>,
    pub bass: Option<Handler<Bass>>,
    pub unknown: Option<Handler<Envelope>>,
}

impl EventHandlers {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the now-playing handler.
    #[must_use]
    pub fn on_now_playing(mut self, f: impl Fn(&NowPlaying) + Send + Sync + 'static) -> Self {
        self.now_playing = Some(Arc::new(f));
        self
    }

    /// Sets the volume handler.
    #[must_use]
    pub fn on_volume_updated(mut self, f: impl Fn(&Volume) + Send + Sync + 'static) -> Self {
        self.volume = Some(Arc::new(f));
        self
    }

    /// Sets the connection-state handler.
    #[must_use]
    pub fn on_connection_state_updated(
        mut self,
        f: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Self {
        self.connection_state = Some(Arc::new(f));
        self
    }

    /// Sets the preset handler.
    #[must_use]
    pub fn on_preset_updated(mut self, f: impl Fn(&Preset) + Send + Sync + 'static) -> Self {
        self.preset = Some(Arc::new(f));
        self
    }

    /// Sets the zone handler.
    #[must_use]
    pub fn on_zone_updated(mut self, f: impl Fn(&Zone) + Send + Sync + 'static) -> Self {
        self.zone = Some(Arc::new(f));
        self
    }

    /// Sets the bass handler.
    #[must_use]
    pub fn on_bass_updated(mut self, f: impl Fn(&Bass) + Send + Sync + 'static) -> Self {
        self.bass = Some(Arc::new(f));
        self
    }

    /// Sets the catch-all handler.
    #[must_use]
    pub fn on_unknown_event(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.unknown = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("now_playing", &self.now_playing.is_some())
            .field("volume", &self.volume.is_some())
            .field("connection_state", &self.connection_state.is_some())
            .field("preset", &self.preset.is_some())
            .field("zone", &self.zone.is_some())
            .field("bass", &self.bass.is_some())
            .field("unknown", &self.unknown.is_some())
            .finish()
    }
}

/// Invokes the callbacks matching `envelope`'s sub-events.
///
/// Each recognized sub-event reaches its handler exactly once, in document
/// order. Unknown children are skipped when anything recognized is
/// present; otherwise the whole envelope goes to the catch-all. Missing
/// handlers are skipped silently.
pub fn dispatch(envelope: &Envelope, handlers: &EventHandlers) {
    if !envelope.has_recognized() {
        if let Some(handler) = &handlers.unknown {
            handler(envelope);
        }
        return;
    }

    for event in &envelope.events {
        match event {
            DeviceEvent::NowPlaying(p) => invoke(&handlers.now_playing, p),
            DeviceEvent::Volume(p) => invoke(&handlers.volume, p),
            DeviceEvent::ConnectionState(p) => invoke(&handlers.connection_state, p),
            DeviceEvent::Preset(p) => invoke(&handlers.preset, p),
            DeviceEvent::Zone(p) => invoke(&handlers.zone, p),
            DeviceEvent::Bass(p) => invoke(&handlers.bass, p),
            DeviceEvent::Unknown(_) => {}
        }
    }
}

fn invoke<T>(handler: &Option<Handler<T>>, payload: &T) {
    if let Some(handler) = handler {
        handler(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::decode;
    use crate::test_fixtures::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts invocations per slot.
    #[derive(Default)]
    struct Counters {
        now_playing: AtomicUsize,
        volume: AtomicUsize,
        connection_state: AtomicUsize,
        preset: AtomicUsize,
        zone: AtomicUsize,
        bass: AtomicUsize,
        unknown: AtomicUsize,
    }

    impl Counters {
        fn total_typed(&self) -> usize {
            [
                &self.now_playing,
                &self.volume,
                &self.connection_state,
                &self.preset,
                &self.zone,
                &self.bass,
            ]
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
        }
    }

    fn counting_handlers(counters: &Arc<Counters>) -> EventHandlers {
        let c = Arc::clone(counters);
        let handlers = EventHandlers::new().on_now_playing(move |_| {
            c.now_playing.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        let handlers = handlers.on_volume_updated(move |_| {
            c.volume.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        let handlers = handlers.on_connection_state_updated(move |_| {
            c.connection_state.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        let handlers = handlers.on_preset_updated(move |_| {
            c.preset.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        let handlers = handlers.on_zone_updated(move |_| {
            c.zone.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        let handlers = handlers.on_bass_updated(move |_| {
            c.bass.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(counters);
        handlers.on_unknown_event(move |_| {
            c.unknown.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn volume_scenario_reaches_only_volume_handler() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handlers = EventHandlers::new().on_volume_updated(move |v| sink.lock().push(v.clone()));

        dispatch(&decode(VOLUME_UPDATED.as_bytes()).unwrap(), &handlers);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].device_id, "X");
        assert_eq!(received[0].target, 25);
        assert_eq!(received[0].actual, 25);
        assert!(!received[0].mute_enabled);
    }

    #[test]
    fn volume_scenario_fires_no_other_handler() {
        let counters = Arc::new(Counters::default());
        dispatch(
            &decode(VOLUME_UPDATED.as_bytes()).unwrap(),
            &counting_handlers(&counters),
        );

        assert_eq!(counters.volume.load(Ordering::SeqCst), 1);
        assert_eq!(counters.total_typed(), 1);
        assert_eq!(counters.unknown.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_envelope_reaches_catch_all_once() {
        let counters = Arc::new(Counters::default());
        dispatch(
            &decode(RECENTS_UPDATED.as_bytes()).unwrap(),
            &counting_handlers(&counters),
        );

        assert_eq!(counters.unknown.load(Ordering::SeqCst), 1);
        assert_eq!(counters.total_typed(), 0);
    }

    #[test]
    fn catch_all_receives_whole_envelope() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let handlers = EventHandlers::new().on_unknown_event(move |e| *sink.lock() = Some(e.clone()));

        dispatch(&decode(RECENTS_UPDATED.as_bytes()).unwrap(), &handlers);

        let seen = seen.lock();
        let envelope = seen.as_ref().unwrap();
        assert_eq!(envelope.device_id, "689E19B8BB8A");
        assert_eq!(envelope.unknown_names().collect::<Vec<_>>(), vec!["recentsUpdated"]);
    }

    #[test]
    fn each_fixture_fires_its_handler_exactly_once() {
        let cases: [(&str, fn(&Counters) -> &AtomicUsize); 6] = [
            (NOW_PLAYING_UPDATED, |c| &c.now_playing),
            (VOLUME_UPDATED, |c| &c.volume),
            (CONNECTION_STATE_UPDATED, |c| &c.connection_state),
            (PRESET_UPDATED, |c| &c.preset),
            (ZONE_UPDATED, |c| &c.zone),
            (BASS_UPDATED, |c| &c.bass),
        ];

        for (fixture, slot) in cases {
            let counters = Arc::new(Counters::default());
            dispatch(&decode(fixture.as_bytes()).unwrap(), &counting_handlers(&counters));

            assert_eq!(slot(&counters).load(Ordering::SeqCst), 1, "{fixture}");
            assert_eq!(counters.total_typed(), 1, "{fixture}");
            assert_eq!(counters.unknown.load(Ordering::SeqCst), 0, "{fixture}");
        }
    }

    #[test]
    fn envelope_without_type_never_invokes_that_handler() {
        let counters = Arc::new(Counters::default());
        let handlers = counting_handlers(&counters);

        for fixture in [NOW_PLAYING_UPDATED, BASS_UPDATED, ZONE_UPDATED, RECENTS_UPDATED] {
            dispatch(&decode(fixture.as_bytes()).unwrap(), &handlers);
        }

        assert_eq!(counters.volume.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mixed_envelope_dispatches_all_recognized_and_skips_catch_all() {
        let counters = Arc::new(Counters::default());
        dispatch(
            &decode(VOLUME_AND_BASS_UPDATED.as_bytes()).unwrap(),
            &counting_handlers(&counters),
        );

        assert_eq!(counters.volume.load(Ordering::SeqCst), 1);
        assert_eq!(counters.bass.load(Ordering::SeqCst), 1);
        assert_eq!(counters.unknown.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_handlers_are_skipped() {
        let envelope = decode(VOLUME_AND_BASS_UPDATED.as_bytes()).unwrap();
        dispatch(&envelope, &EventHandlers::new());

        let unknown = decode(RECENTS_UPDATED.as_bytes()).unwrap();
        dispatch(&unknown, &EventHandlers::new());
    }

    #[test]
    fn debug_lists_registered_slots() {
        let handlers = EventHandlers::new().on_bass_updated(|_| {});
        let rendered = format!("{handlers:?}");
        assert!(rendered.contains("bass: true"));
        assert!(rendered.contains("volume: false"));
    }
}
