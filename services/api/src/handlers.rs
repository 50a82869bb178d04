//! Axum Handlers for the HTTP surface
//!
//! `/incoming-call` answers the telephony provider's webhook with TwiML that
//! points the call's media stream back at this service.

use axum::{
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

/// A standard error response body.
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// Extracts the host name from a `Host` header value, without the port.
///
/// Only characters valid in a host name or IP literal are accepted, since the
/// result is embedded in the TwiML document.
pub fn host_without_port(host: &str) -> Option<&str> {
    let host = host.trim();
    let name = if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        let end = host.find(']')?;
        &host[..=end]
    } else {
        host.split(':').next()?
    };
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'));
    valid.then_some(name)
}

/// TwiML that connects the call's audio to `wss://<host>/media-stream`.
pub fn media_stream_twiml(host: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<Response><Connect><Stream url="wss://{}/media-stream" /></Connect></Response>"#
        ),
        host
    )
}

/// Telephony webhook for a new incoming call.
pub async fn incoming_call(headers: HeaderMap) -> Result<Response, ApiError> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(host_without_port)
        .ok_or_else(|| {
            warn!("Incoming call without a usable Host header");
            ApiError::BadRequest("Missing or invalid Host header".to_string())
        })?;

    info!(host, "Incoming call, connecting media stream");
    Ok((
        [(header::CONTENT_TYPE, "application/xml")],
        media_stream_twiml(host),
    )
        .into_response())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
