//! Low-level HTTP/XML transport for the SoundTouch control API.
//!
//! Every endpoint is a single GET or POST against `http://<host>:8090/<path>`
//! carrying an XML document. This module owns the request plumbing, error
//! shape detection and XML (de)serialization. For typed endpoint helpers see
//! `client.rs`.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::types::DeviceErrors;
use crate::protocol_constants::HTTP_TIMEOUT_SECS;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while talking to a speaker's HTTP API.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// HTTP request to the speaker failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Speaker returned a non-success HTTP status without an error document.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Speaker answered with an `<errors>` document.
    #[error("device error: {0}")]
    Api(DeviceErrors),

    /// Response body was not the expected XML shape.
    #[error("failed to parse device response: {0}")]
    Parse(String),

    /// Request body could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Argument rejected before any request was sent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Convenient Result alias for device API operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    /// Returns true if this error is transient and the request may be retried.
    ///
    /// Timeouts, connection failures and 5xx responses without an error
    /// document are transient. Error documents and parse failures are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            DeviceError::Http(e) => e.is_timeout() || e.is_connect(),
            DeviceError::HttpStatus(status, _) => *status >= 500,
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// URL and XML helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the URL for `path` on the speaker at `host:port`.
pub(crate) fn build_device_url(host: &str, port: u16, path: &str) -> String {
    let path = path.trim_start_matches('/');
    format!("http://{}:{}/{}", host, port, path)
}

/// Serializes a request body to XML.
pub fn encode_xml<B: Serialize>(body: &B) -> DeviceResult<String> {
    quick_xml::se::to_string(body).map_err(|e| DeviceError::Encode(e.to_string()))
}

/// Parses a response body, treating `<errors>` documents as [`DeviceError::Api`].
pub fn decode_xml<T: DeserializeOwned>(xml: &str) -> DeviceResult<T> {
    if let Some(errors) = parse_error_document(xml) {
        return Err(DeviceError::Api(errors));
    }
    quick_xml::de::from_str(xml).map_err(|e| DeviceError::Parse(e.to_string()))
}

/// Returns the error document if `xml` is one.
///
/// Only the root element is inspected; an `<errors>` fragment nested inside a
/// regular resource is not an error shape.
pub fn parse_error_document(xml: &str) -> Option<DeviceErrors> {
    let body = strip_declaration(xml);
    let is_errors = body
        .strip_prefix("<errors")
        .is_some_and(|rest| rest.starts_with(['>', '/', ' ', '\t', '\r', '\n']));
    if !is_errors {
        return None;
    }
    Some(quick_xml::de::from_str(body).unwrap_or_default())
}

fn strip_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    match trimmed.strip_prefix("<?xml") {
        Some(rest) => rest
            .find("?>")
            .map_or(trimmed, |end| rest[end + 2..].trim_start()),
        None => trimmed,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response
// ─────────────────────────────────────────────────────────────────────────────

/// Sends one request to a speaker and returns the raw response body.
///
/// Error documents are detected before the status check, because speakers
/// send them with both 200 and 4xx/5xx statuses.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `url` - Full endpoint URL
/// * `body` - XML body for POST requests, `None` for GET
pub async fn send_request(client: &Client, url: &str, body: Option<String>) -> DeviceResult<String> {
    let method = if body.is_some() { "POST" } else { "GET" };
    let request = match body {
        Some(body) => {
            log::debug!("[HTTP] Request body: {}", body);
            client
                .post(url)
                .header("Content-Type", "text/xml; charset=\"utf-8\"")
                .body(body)
        }
        None => client.get(url),
    };

    let start = std::time::Instant::now();
    let res = request
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .send()
        .await;

    log::debug!(
        "[HTTP] {} {} completed in {:?}: {:?}",
        method,
        url,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    let res = res?;
    let status = res.status();
    let response_text = res.text().await?;

    if let Some(errors) = parse_error_document(&response_text) {
        log::warn!("[HTTP] {} {} returned error document: {}", method, url, errors);
        return Err(DeviceError::Api(errors));
    }

    if !status.is_success() {
        return Err(DeviceError::HttpStatus(status.as_u16(), response_text));
    }

    Ok(response_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{ERRORS_INVALID_VOLUME, VOLUME_RESPONSE};
    use crate::device::types::Volume;

    #[test]
    fn build_device_url_normalizes_leading_slash() {
        assert_eq!(
            build_device_url("192.168.1.20", 8090, "/volume"),
            "http://192.168.1.20:8090/volume"
        );
        assert_eq!(
            build_device_url("192.168.1.20", 8090, "now_playing"),
            "http://192.168.1.20:8090/now_playing"
        );
    }

    #[test]
    fn decode_xml_parses_resource() {
        let volume: Volume = decode_xml(VOLUME_RESPONSE).unwrap();
        assert_eq!(volume.device_id, "689E19B8BB8A");
        assert_eq!(volume.target, 32);
        assert_eq!(volume.actual, 30);
        assert!(!volume.mute_enabled);
    }

    #[test]
    fn decode_xml_maps_error_document() {
        let err = decode_xml::<Volume>(ERRORS_INVALID_VOLUME).unwrap_err();
        match err {
            DeviceError::Api(errors) => {
                assert_eq!(errors.device_id.as_deref(), Some("689E19B8BB8A"));
                assert_eq!(errors.error.len(), 1);
                assert_eq!(errors.error[0].value, 1019);
                assert_eq!(errors.error[0].name, "CLIENT_XML_ERROR");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn error_document_detection_ignores_declaration() {
        let xml = format!("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n{ERRORS_INVALID_VOLUME}");
        assert!(parse_error_document(&xml).is_some());
        assert!(parse_error_document(VOLUME_RESPONSE).is_none());
        assert!(parse_error_document("<errorsomething/>").is_none());
    }

    #[test]
    fn decode_xml_reports_parse_failure() {
        let err = decode_xml::<Volume>("<volume><targetvolume>loud</targetvolume></volume>")
            .unwrap_err();
        assert!(matches!(err, DeviceError::Parse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(DeviceError::HttpStatus(503, String::new()).is_transient());
        assert!(!DeviceError::HttpStatus(404, String::new()).is_transient());
        assert!(!DeviceError::InvalidParameter("x".into()).is_transient());
    }
}
