//! Outbound call creation against the provider REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use outdial_core::{CallId, OutdialError, PhoneNumber};

/// Absolute callback URLs registered with the provider for one call.
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    pub initial_connect: String,
    pub amd_result: String,
    pub status: String,
}

impl CallbackUrls {
    /// Derive the callback set from the publicly reachable base URL.
    pub fn from_base(public_base_url: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        Self {
            initial_connect: format!("{base}/voice/initial"),
            amd_result: format!("{base}/voice/amd"),
            status: format!("{base}/voice/status"),
        }
    }
}

/// How the provider obtains call instructions once the call is answered.
#[derive(Debug, Clone)]
pub enum CallInstructions {
    /// Fetch markup from `url`, running answering-machine detection in the
    /// background and posting the result to `amd_callback`.
    UrlWithAmd { url: String, amd_callback: String },
    /// Inline markup; no AMD (simple test calls).
    Inline(String),
}

/// A dial request.
#[derive(Debug, Clone)]
pub struct CreateCall {
    pub to: PhoneNumber,
    pub from: String,
    pub instructions: CallInstructions,
    pub status_callback: Option<String>,
}

/// Seam for the provider REST API; mocked in engine tests.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Place an outbound call and return the provider-assigned id.
    async fn create_call(&self, req: CreateCall) -> Result<CallId, OutdialError>;
}

/// Twilio-compatible REST client.
pub struct TwilioRest {
    client: Client,
    account_sid: String,
    auth_token: String,
    base_url: String,
}

#[derive(Deserialize)]
struct CreateCallResponse {
    sid: String,
}

impl TwilioRest {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            base_url: "https://api.twilio.com".to_string(),
        }
    }

    /// Point the client at a different API host (testing, regional edges).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TelephonyProvider for TwilioRest {
    async fn create_call(&self, req: CreateCall) -> Result<CallId, OutdialError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.base_url, self.account_sid
        );

        let mut form: Vec<(&str, String)> = vec![
            ("To", req.to.as_str().to_string()),
            ("From", req.from.clone()),
        ];
        match &req.instructions {
            CallInstructions::UrlWithAmd { url, amd_callback } => {
                form.push(("Url", url.clone()));
                // DetectMessageEnd holds the line through a machine greeting
                // so the voicemail prompt lands after the beep.
                form.push(("MachineDetection", "DetectMessageEnd".to_string()));
                form.push(("AsyncAmdStatusCallback", amd_callback.clone()));
                form.push(("AsyncAmdStatusCallbackMethod", "POST".to_string()));
            }
            CallInstructions::Inline(twiml) => {
                form.push(("Twiml", twiml.clone()));
            }
        }
        if let Some(cb) = &req.status_callback {
            form.push(("StatusCallback", cb.clone()));
            form.push(("StatusCallbackMethod", "POST".to_string()));
        }

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| OutdialError::provider(None, format!("dial request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, to = %req.to, "Provider rejected dial request");
            return Err(OutdialError::provider(Some(status.as_u16()), body));
        }

        let created: CreateCallResponse = resp
            .json()
            .await
            .map_err(|e| OutdialError::provider(None, format!("malformed dial response: {e}")))?;

        info!(call_id = %created.sid, to = %req.to, "Outbound call created");
        Ok(CallId::new(created.sid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_urls_from_base_strips_trailing_slash() {
        let urls = CallbackUrls::from_base("https://example.com/");
        assert_eq!(urls.initial_connect, "https://example.com/voice/initial");
        assert_eq!(urls.amd_result, "https://example.com/voice/amd");
        assert_eq!(urls.status, "https://example.com/voice/status");
    }
}
