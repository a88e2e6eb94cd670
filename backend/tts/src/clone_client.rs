//! Client for the external voice-clone synthesis service.
//!
//! The service is a collaborator, consumed as "produce an audio artifact
//! from text plus a reference voice" — synthesis itself happens elsewhere.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use outdial_core::OutdialError;

/// A synthesis request.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    /// URL of a reference voice sample to clone; the service default voice
    /// is used when absent.
    pub reference_voice_url: Option<String>,
}

/// Returns raw audio bytes for a synthesis request.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    async fn synthesize(&self, req: SynthesisRequest) -> Result<Bytes, OutdialError>;
}

/// HTTP client for the voice-clone service.
pub struct VoiceCloneClient {
    client: Client,
    base_url: String,
    /// Sentence-chunking bound forwarded to the service.
    max_tokens_per_sentence: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_voice_url: Option<&'a str>,
    max_tokens_per_sentence: u32,
}

impl VoiceCloneClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            max_tokens_per_sentence: 120,
        }
    }

    pub fn with_max_tokens_per_sentence(mut self, max: u32) -> Self {
        self.max_tokens_per_sentence = max;
        self
    }
}

#[async_trait]
impl SynthesisProvider for VoiceCloneClient {
    async fn synthesize(&self, req: SynthesisRequest) -> Result<Bytes, OutdialError> {
        let url = format!("{}/synthesize", self.base_url.trim_end_matches('/'));
        let body = SynthesisBody {
            text: &req.text,
            reference_voice_url: req.reference_voice_url.as_deref(),
            max_tokens_per_sentence: self.max_tokens_per_sentence,
        };
        info!(chars = req.text.len(), "Requesting voice synthesis");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OutdialError::Synthesis(format!("synthesis request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(OutdialError::Synthesis(format!(
                "synthesis service error {status}: {body}"
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| OutdialError::Synthesis(format!("failed to read audio body: {e}")))
    }
}
