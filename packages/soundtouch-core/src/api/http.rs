//! HTTP control API of the simulated speaker.
//!
//! Handlers are thin: they parse the XML body, call into
//! [`SimulatedDevice`](crate::state::SimulatedDevice) and render the result
//! the way firmware does, including `<errors>` documents for bad requests.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::device::{
    encode_xml, BassRequest, ContentItem, DeviceErrorEntry, DeviceErrors, KeyRequest, Preset,
    Presets, Status, VolumeRequest, Zone,
};
use crate::state::SimulatorError;

// ─────────────────────────────────────────────────────────────────────────────
// XML Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Serializes `T` as an XML response body.
struct Xml<T>(T);

impl<T: Serialize> IntoResponse for Xml<T> {
    fn into_response(self) -> Response {
        match encode_xml(&self.0) {
            Ok(body) => xml_response(StatusCode::OK, body),
            Err(e) => {
                log::error!("[HTTP] Failed to encode response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// `<errors>` document with a non-2xx status.
struct XmlError(StatusCode, DeviceErrors);

impl IntoResponse for XmlError {
    fn into_response(self) -> Response {
        match encode_xml(&self.1) {
            Ok(body) => xml_response(self.0, body),
            Err(_) => self.0.into_response(),
        }
    }
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

type XmlResult<T> = Result<Xml<T>, XmlError>;

fn rejected(state: &AppState, err: SimulatorError) -> XmlError {
    log::warn!("[HTTP] Rejected request: {}", err);
    XmlError(StatusCode::BAD_REQUEST, err.to_document(state.device.device_id()))
}

fn parse_body<T: DeserializeOwned>(state: &AppState, body: &str) -> Result<T, XmlError> {
    quick_xml::de::from_str(body)
        .map_err(|e| rejected(state, SimulatorError::InvalidBody(e.to_string())))
}

fn status(path: &str) -> Xml<Status> {
    Xml(Status {
        path: path.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the router for the HTTP control port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/info", get(get_info))
        .route("/now_playing", get(get_now_playing))
        .route("/volume", get(get_volume).post(set_volume))
        .route("/bass", get(get_bass).post(set_bass))
        .route("/presets", get(get_presets))
        .route("/storePreset", post(store_preset))
        .route("/getZone", get(get_zone))
        .route("/setZone", post(set_zone))
        .route("/key", post(press_key))
        .route("/select", post(select))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn get_info(State(state): State<AppState>) -> impl IntoResponse {
    Xml(state.device.info())
}

async fn get_now_playing(State(state): State<AppState>) -> impl IntoResponse {
    Xml(state.device.now_playing())
}

async fn get_volume(State(state): State<AppState>) -> impl IntoResponse {
    Xml(state.device.volume())
}

async fn set_volume(State(state): State<AppState>, body: String) -> XmlResult<Status> {
    let request: VolumeRequest = parse_body(&state, &body)?;
    state
        .device
        .set_volume(request.level)
        .map_err(|e| rejected(&state, e))?;
    Ok(status("/volume"))
}

async fn get_bass(State(state): State<AppState>) -> impl IntoResponse {
    Xml(state.device.bass())
}

async fn set_bass(State(state): State<AppState>, body: String) -> XmlResult<Status> {
    let request: BassRequest = parse_body(&state, &body)?;
    state
        .device
        .set_bass(request.level)
        .map_err(|e| rejected(&state, e))?;
    Ok(status("/bass"))
}

async fn get_presets(State(state): State<AppState>) -> impl IntoResponse {
    Xml(state.device.presets())
}

/// Stores a preset and answers with the full preset list.
async fn store_preset(
    State(state): State<AppState>,
    body: String,
) -> XmlResult<Presets> {
    let preset: Preset = parse_body(&state, &body)?;
    let item = preset.content_item.ok_or_else(|| {
        rejected(
            &state,
            SimulatorError::InvalidBody("preset without ContentItem".to_string()),
        )
    })?;
    state
        .device
        .store_preset(preset.id, item)
        .map_err(|e| rejected(&state, e))?;
    Ok(Xml(state.device.presets()))
}

async fn get_zone(State(state): State<AppState>) -> impl IntoResponse {
    Xml(state.device.zone())
}

async fn set_zone(State(state): State<AppState>, body: String) -> XmlResult<Status> {
    let zone: Zone = parse_body(&state, &body)?;
    state.device.set_zone(zone);
    Ok(status("/setZone"))
}

async fn press_key(State(state): State<AppState>, body: String) -> XmlResult<Status> {
    let request: KeyRequest = parse_body(&state, &body)?;
    log::debug!(
        "[HTTP] Key {:?} {:?} from {}",
        request.key,
        request.state,
        request.sender
    );
    state
        .device
        .press_key(request.key, request.state)
        .map_err(|e| rejected(&state, e))?;
    Ok(status("/key"))
}

async fn select(State(state): State<AppState>, body: String) -> XmlResult<Status> {
    let item: ContentItem = parse_body(&state, &body)?;
    state.device.select(item);
    Ok(status("/select"))
}

async fn not_found(State(state): State<AppState>) -> XmlError {
    XmlError(
        StatusCode::NOT_FOUND,
        DeviceErrors {
            device_id: Some(state.device.device_id().to_string()),
            error: vec![DeviceErrorEntry {
                value: 404,
                name: "HTTP_STATUS_NOT_FOUND".to_string(),
                severity: Some("Unknown".to_string()),
                message: Some("unknown endpoint".to_string()),
            }],
        },
    )
}
