//! Route handlers.
//!
//! Webhook handlers share one failure-avoidance rule: the provider must
//! always receive markup within its timeout, because an unanswered webhook
//! leaves a live phone call dangling. Signature failures are the only
//! non-200 answers; everything past the signature check degrades to the
//! safe terminal markup instead of erroring.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use outdial_core::{CallMessage, OutdialError};
use outdial_telephony::{
    AmdResultPayload, CallStatusPayload, InitialConnectPayload, MARKUP_CONTENT_TYPE,
    TranscriptionPayload, parse_form,
};
use outdial_tts::SynthesisRequest;

use crate::server::GatewayState;

// ---------------------------------------------------------------------------
// Call initiation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeCallRequest {
    pub phone_number: String,
    #[serde(default)]
    pub message_text: Option<String>,
    /// Generated audio to play when a person answers (from `POST /speech`).
    #[serde(default)]
    pub audio_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeCallResponse {
    pub call_id: String,
    pub state: String,
}

pub async fn make_call(
    State(state): State<GatewayState>,
    Json(req): Json<MakeCallRequest>,
) -> Response {
    let message = CallMessage {
        text: req.message_text,
        audio_url: req.audio_url,
    };
    match state.initiator.initiate_call(&req.phone_number, message).await {
        Ok(session) => (
            StatusCode::OK,
            Json(MakeCallResponse {
                call_id: session.call_id.to_string(),
                state: session.state.to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCallRequest {
    pub phone_number: String,
}

pub async fn make_test_call(
    State(state): State<GatewayState>,
    Json(req): Json<TestCallRequest>,
) -> Response {
    match state.initiator.initiate_test_call(&req.phone_number).await {
        Ok(call_id) => (
            StatusCode::OK,
            Json(json!({ "callId": call_id.to_string() })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Provider webhooks
// ---------------------------------------------------------------------------

pub async fn initial_connect(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.webhook_guard.verify(&headers, "/voice/initial", &body) {
        return signature_rejection("initial-connect");
    }
    let markup = match parse_form::<InitialConnectPayload>(&body) {
        Ok(payload) => match state.router.handle_initial_connect(payload).await {
            Ok(markup) => markup,
            Err(e) => degraded("initial-connect", &state, e),
        },
        Err(e) => degraded("initial-connect", &state, e),
    };
    markup_response(markup)
}

pub async fn amd_result(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.webhook_guard.verify(&headers, "/voice/amd", &body) {
        return signature_rejection("amd-result");
    }
    let markup = match parse_form::<AmdResultPayload>(&body) {
        Ok(payload) => match state.router.handle_amd_result(payload).await {
            Ok(markup) => markup,
            Err(e) => degraded("amd-result", &state, e),
        },
        Err(e) => degraded("amd-result", &state, e),
    };
    markup_response(markup)
}

pub async fn transcription_result(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state
        .webhook_guard
        .verify(&headers, "/voice/transcription", &body)
    {
        return signature_rejection("transcription-result");
    }
    match parse_form::<TranscriptionPayload>(&body) {
        Ok(payload) => {
            if let Err(e) = state.router.handle_transcription(payload).await {
                warn!(error = %e, "Transcription callback not applied");
            }
        }
        Err(e) => warn!(error = %e, "Malformed transcription callback"),
    }
    // The provider only needs a 200 here; retries are its recovery path.
    StatusCode::OK.into_response()
}

pub async fn call_status(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.webhook_guard.verify(&headers, "/voice/status", &body) {
        return signature_rejection("call-status");
    }
    match parse_form::<CallStatusPayload>(&body) {
        Ok(payload) => {
            if let Err(e) = state.router.handle_status(payload).await {
                warn!(error = %e, "Status callback not applied");
            }
        }
        Err(e) => warn!(error = %e, "Malformed status callback"),
    }
    StatusCode::OK.into_response()
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub reference_voice_url: Option<String>,
}

pub async fn synthesize_speech(
    State(state): State<GatewayState>,
    Json(req): Json<SpeechRequest>,
) -> Response {
    if req.text.trim().is_empty() {
        return error_response(OutdialError::Validation("text must not be empty".into()));
    }
    let audio = match state
        .synthesizer
        .synthesize(SynthesisRequest {
            text: req.text,
            reference_voice_url: req.reference_voice_url,
        })
        .await
    {
        Ok(bytes) => bytes,
        Err(e) => return error_response(e),
    };
    match state.audio_store.save(&audio, "wav").await {
        Ok(stored) => (
            StatusCode::OK,
            Json(json!({ "audioUrl": stored.public_url })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<GatewayState>) -> Response {
    let active = state.store.len().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "activeCalls": active,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn markup_response(markup: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, MARKUP_CONTENT_TYPE)],
        markup,
    )
        .into_response()
}

fn signature_rejection(event: &str) -> Response {
    warn!(event, "Rejecting webhook with missing or invalid signature");
    (StatusCode::FORBIDDEN, "invalid signature").into_response()
}

/// Whatever went wrong, the live call gets the apology-and-hangup markup.
fn degraded(event: &str, state: &GatewayState, e: OutdialError) -> String {
    match e {
        OutdialError::SessionNotFound(ref call_id) => {
            warn!(event, call_id = %call_id, "Webhook for unknown session, answering terminal markup")
        }
        ref other => {
            error!(event, error = %other, "Webhook handler fault, answering terminal markup")
        }
    }
    state.router.safe_terminal_markup()
}

fn error_response(e: OutdialError) -> Response {
    let status = match &e {
        OutdialError::Validation(_) => StatusCode::BAD_REQUEST,
        OutdialError::Provider { .. } => StatusCode::BAD_GATEWAY,
        OutdialError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}
