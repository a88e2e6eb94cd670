//! HTTP gateway server: call initiation API, provider webhooks, speech
//! synthesis, media serving.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use outdial_engine::{CallInitiator, CallbackRouter, SessionStore};
use outdial_media::{AudioStore, media_router};
use outdial_telephony::webhook;
use outdial_tts::SynthesisProvider;

use crate::handlers;

/// Origin verification for inbound provider webhooks.
///
/// With no auth token configured, verification is disabled — acceptable only
/// for local development behind a tunnel.
#[derive(Clone)]
pub struct WebhookGuard {
    pub auth_token: Option<String>,
    pub public_base_url: String,
}

impl WebhookGuard {
    /// Check the provider signature for a webhook delivered at `path`.
    pub fn verify(&self, headers: &HeaderMap, path: &str, body: &[u8]) -> bool {
        match &self.auth_token {
            None => true,
            Some(token) => {
                let url = format!("{}{}", self.public_base_url.trim_end_matches('/'), path);
                webhook::verify_signature(headers, &url, body, token)
            }
        }
    }
}

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub initiator: Arc<CallInitiator>,
    pub router: Arc<CallbackRouter>,
    pub store: SessionStore,
    pub synthesizer: Arc<dyn SynthesisProvider>,
    pub audio_store: AudioStore,
    pub webhook_guard: WebhookGuard,
}

/// Build the full application router.
pub fn build_router(state: GatewayState) -> Router {
    let audio_store = state.audio_store.clone();
    Router::new()
        // Call initiation (the only routes that block on the provider API)
        .route("/calls", post(handlers::make_call))
        .route("/calls/test", post(handlers::make_test_call))
        // Provider webhooks — latency-bounded, never call the provider
        .route("/voice/initial", post(handlers::initial_connect))
        .route("/voice/amd", post(handlers::amd_result))
        .route("/voice/transcription", post(handlers::transcription_result))
        .route("/voice/status", post(handlers::call_status))
        // Speech synthesis
        .route("/speech", post(handlers::synthesize_speech))
        .route("/health", get(handlers::health))
        .with_state(state)
        .nest("/media", media_router(audio_store))
}

/// Start the gateway HTTP server.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let app = build_router(state);
    info!("Gateway HTTP server listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
