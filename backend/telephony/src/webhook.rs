//! Inbound webhook wire types and request-origin verification.
//!
//! The provider delivers lifecycle events as form-encoded POSTs with
//! PascalCase field names, signed with `X-Twilio-Signature` (HMAC-SHA1 over
//! the public callback URL concatenated with the sorted form parameters,
//! base64-encoded). Payloads are parsed from the raw body because the
//! signature covers the exact bytes the provider sent.

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use outdial_core::{CallId, OutdialError};

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// Delivered once the call is answered by anything, before AMD resolves.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialConnectPayload {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: Option<String>,
}

/// Delivered when answering-machine detection resolves.
#[derive(Debug, Clone, Deserialize)]
pub struct AmdResultPayload {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "AnsweredBy")]
    pub answered_by: String,
}

/// Delivered once a recorded voicemail has been transcribed.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionPayload {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
    #[serde(rename = "TranscriptionText", default)]
    pub transcription_text: Option<String>,
}

/// Delivered on terminal call progress (completed, busy, no-answer, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct CallStatusPayload {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
}

/// Parse a form-encoded webhook body into a typed payload.
pub fn parse_form<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, OutdialError> {
    serde_urlencoded::from_bytes(body)
        .map_err(|e| OutdialError::Validation(format!("malformed webhook payload: {e}")))
}

impl InitialConnectPayload {
    pub fn call_id(&self) -> CallId {
        CallId::new(self.call_sid.clone())
    }
}

impl AmdResultPayload {
    pub fn call_id(&self) -> CallId {
        CallId::new(self.call_sid.clone())
    }
}

impl TranscriptionPayload {
    pub fn call_id(&self) -> CallId {
        CallId::new(self.call_sid.clone())
    }
}

impl CallStatusPayload {
    pub fn call_id(&self) -> CallId {
        CallId::new(self.call_sid.clone())
    }
}

/// Verify the `X-Twilio-Signature` header for a form-encoded webhook.
///
/// `url` must be the public callback URL exactly as the provider sees it
/// (scheme, host, path, query). Returns false on any missing or mismatched
/// input; callers treat that as an unauthenticated request.
pub fn verify_signature(headers: &HeaderMap, url: &str, body: &[u8], auth_token: &str) -> bool {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    compute_signature(url, body, auth_token)
        .map(|computed| computed == signature)
        .unwrap_or(false)
}

/// HMAC-SHA1(auth_token, url + sorted(key + value)) as base64.
pub fn compute_signature(url: &str, body: &[u8], auth_token: &str) -> Option<String> {
    let mut params: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    params.sort();

    let mut data = String::from(url);
    for (key, value) in &params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()).ok()?;
    mac.update(data.as_bytes());
    Some(BASE64.encode(mac.finalize().into_bytes()))
}
