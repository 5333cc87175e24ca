//! Codec for `updates` push frames.
//!
//! Decoding runs in two passes. A streaming pass over the frame validates the
//! document, reads the envelope's `deviceID` and captures every direct child
//! of `updates` as a standalone XML fragment. Each fragment with a known
//! element name is then deserialized into its payload type with serde.
//! Children with unknown names are kept as [`DeviceEvent::Unknown`].
//!
//! Decoding performs no I/O and no logging; callers report errors.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::{DeviceEvent, Envelope, EventKind};
use crate::device::http::{encode_xml, DeviceResult};
use crate::device::{Bass, NowPlaying, Preset, Volume, Zone};
use crate::protocol_constants::{DEVICE_ID_ATTRIBUTE, UPDATES_ELEMENT};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Reasons a frame could not be decoded into an [`Envelope`].
///
/// All variants are non-fatal for the connection that received the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame bytes are not UTF-8.
    #[error("frame is not valid UTF-8")]
    Encoding,

    /// Frame contains no root element.
    #[error("frame contains no XML element")]
    Empty,

    /// Frame is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// Root element is not `updates`.
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),

    /// A recognized child did not match its payload shape.
    #[error("invalid <{element}> payload: {message}")]
    Payload { element: String, message: String },
}

/// Convenient Result alias for codec operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Child wrappers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NowPlayingUpdated {
    #[serde(rename = "nowPlaying")]
    now_playing: NowPlaying,
}

#[derive(Deserialize)]
struct VolumeUpdated {
    volume: Volume,
}

#[derive(Deserialize)]
struct PresetUpdated {
    preset: Preset,
}

#[derive(Deserialize)]
struct ZoneUpdated {
    zone: Zone,
}

#[derive(Deserialize)]
struct BassUpdated {
    bass: Bass,
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Direct child of `updates` captured as its own document.
struct Fragment {
    name: String,
    writer: Writer<Vec<u8>>,
}

impl Fragment {
    fn new(name: String) -> Self {
        Self {
            name,
            writer: Writer::new(Vec::new()),
        }
    }

    fn write(&mut self, event: Event<'_>) -> DecodeResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    fn finish(self) -> DecodeResult<(String, String)> {
        let xml = String::from_utf8(self.writer.into_inner()).map_err(|_| DecodeError::Encoding)?;
        Ok((self.name, xml))
    }
}

/// Decodes one push frame.
///
/// Returns an error for malformed XML or a root element other than
/// `updates`. Unknown children are not errors; they appear as
/// [`DeviceEvent::Unknown`] in document order alongside recognized ones.
///
/// A recognized child whose payload does not parse is kept as
/// [`DeviceEvent::Unknown`] when a sibling decodes. If no recognized child
/// survives, the first payload error is returned instead.
pub fn decode(raw: &[u8]) -> DecodeResult<Envelope> {
    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::Encoding)?;
    let (device_id, children) = split_children(text)?;

    let mut events = Vec::with_capacity(children.len());
    let mut first_error = None;
    for (name, xml) in children {
        match decode_child(name, &xml) {
            Ok(event) => events.push(event),
            Err(DecodeError::Payload { element, message }) => {
                events.push(DeviceEvent::Unknown(element.clone()));
                first_error.get_or_insert(DecodeError::Payload { element, message });
            }
            Err(e) => return Err(e),
        }
    }

    let envelope = Envelope { device_id, events };
    match first_error {
        Some(err) if !envelope.has_recognized() => Err(err),
        _ => Ok(envelope),
    }
}

/// Streaming pass: validates the document and captures direct children.
fn split_children(text: &str) -> DecodeResult<(String, Vec<(String, String)>)> {
    let mut reader = Reader::from_str(text);
    let mut buf = Vec::new();

    let mut device_id: Option<String> = None;
    let mut root_closed = false;
    let mut depth = 0usize;
    let mut current: Option<Fragment> = None;
    let mut children = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match event {
            Event::Start(start) => {
                if depth == 0 {
                    if root_closed {
                        return Err(DecodeError::Malformed("multiple root elements".into()));
                    }
                    device_id = Some(open_root(&start)?);
                } else if depth == 1 {
                    let mut fragment = Fragment::new(element_name(&start));
                    fragment.write(Event::Start(start))?;
                    current = Some(fragment);
                } else if let Some(fragment) = current.as_mut() {
                    fragment.write(Event::Start(start))?;
                }
                depth += 1;
            }
            Event::Empty(start) => {
                if depth == 0 {
                    if root_closed {
                        return Err(DecodeError::Malformed("multiple root elements".into()));
                    }
                    device_id = Some(open_root(&start)?);
                    root_closed = true;
                } else if depth == 1 {
                    let mut fragment = Fragment::new(element_name(&start));
                    fragment.write(Event::Empty(start))?;
                    children.push(fragment.finish()?);
                } else if let Some(fragment) = current.as_mut() {
                    fragment.write(Event::Empty(start))?;
                }
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                match depth {
                    0 => root_closed = true,
                    1 => {
                        if let Some(mut fragment) = current.take() {
                            fragment.write(Event::End(end))?;
                            children.push(fragment.finish()?);
                        }
                    }
                    _ => {
                        if let Some(fragment) = current.as_mut() {
                            fragment.write(Event::End(end))?;
                        }
                    }
                }
            }
            Event::Eof => break,
            other => {
                if let Some(fragment) = current.as_mut() {
                    fragment.write(other)?;
                } else if depth == 0 {
                    if let Event::Text(text) = &other {
                        if !text.iter().all(u8::is_ascii_whitespace) {
                            return Err(DecodeError::Malformed(
                                "text outside of root element".into(),
                            ));
                        }
                    }
                }
            }
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(DecodeError::Malformed("unexpected end of frame".into()));
    }
    let device_id = device_id.ok_or(DecodeError::Empty)?;
    Ok((device_id, children))
}

/// Checks the root element name and returns its `deviceID` (empty if absent).
fn open_root(start: &BytesStart<'_>) -> DecodeResult<String> {
    let name = element_name(start);
    if name != UPDATES_ELEMENT {
        return Err(DecodeError::UnexpectedRoot(name));
    }
    match start.try_get_attribute(DEVICE_ID_ATTRIBUTE) {
        Ok(Some(attr)) => {
            let raw = std::str::from_utf8(&attr.value).map_err(|_| DecodeError::Encoding)?;
            unescape(raw)
                .map(|value| value.into_owned())
                .map_err(|e| DecodeError::Malformed(e.to_string()))
        }
        Ok(None) => Ok(String::new()),
        Err(e) => Err(DecodeError::Malformed(e.to_string())),
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn decode_child(name: String, xml: &str) -> DecodeResult<DeviceEvent> {
    let Some(kind) = EventKind::from_element_name(&name) else {
        return Ok(DeviceEvent::Unknown(name));
    };
    let event = match kind {
        EventKind::NowPlaying => {
            DeviceEvent::NowPlaying(payload::<NowPlayingUpdated>(&name, xml)?.now_playing)
        }
        EventKind::Volume => DeviceEvent::Volume(payload::<VolumeUpdated>(&name, xml)?.volume),
        EventKind::ConnectionState => DeviceEvent::ConnectionState(payload(&name, xml)?),
        EventKind::Preset => DeviceEvent::Preset(payload::<PresetUpdated>(&name, xml)?.preset),
        EventKind::Zone => DeviceEvent::Zone(payload::<ZoneUpdated>(&name, xml)?.zone),
        EventKind::Bass => DeviceEvent::Bass(payload::<BassUpdated>(&name, xml)?.bass),
    };
    Ok(event)
}

fn payload<T: DeserializeOwned>(element: &str, xml: &str) -> DecodeResult<T> {
    quick_xml::de::from_str(xml).map_err(|e| DecodeError::Payload {
        element: element.to_string(),
        message: e.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Encodes one sub-event as the child element a device would send.
pub fn encode_event(device_id: &str, event: &DeviceEvent) -> DeviceResult<String> {
    let id = escape(device_id);
    let xml = match event {
        DeviceEvent::NowPlaying(p) => format!(
            r#"<nowPlayingUpdated deviceID="{id}">{}</nowPlayingUpdated>"#,
            encode_xml(p)?
        ),
        DeviceEvent::Volume(p) => format!(
            r#"<volumeUpdated deviceID="{id}">{}</volumeUpdated>"#,
            encode_xml(p)?
        ),
        DeviceEvent::ConnectionState(p) => encode_xml(p)?,
        DeviceEvent::Preset(p) => format!("<presetUpdated>{}</presetUpdated>", encode_xml(p)?),
        DeviceEvent::Zone(p) => format!("<zoneUpdated>{}</zoneUpdated>", encode_xml(p)?),
        DeviceEvent::Bass(p) => format!(
            r#"<bassUpdated deviceID="{id}">{}</bassUpdated>"#,
            encode_xml(p)?
        ),
        DeviceEvent::Unknown(name) => format!("<{name} />"),
    };
    Ok(xml)
}

/// Encodes a complete `updates` frame.
pub fn encode_updates(device_id: &str, events: &[DeviceEvent]) -> DeviceResult<String> {
    let mut xml = format!(r#"<updates deviceID="{}">"#, escape(device_id));
    for event in events {
        xml.push_str(&encode_event(device_id, event)?);
    }
    xml.push_str("</updates>");
    Ok(xml)
}
