//! Call initiation: validate the destination, dial through the provider,
//! register the session.
//!
//! This is the only component allowed to block on the provider's REST API;
//! it runs on the request path of `POST /calls`, never inside a webhook
//! handler.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use outdial_core::{CallMessage, CallSession, OutdialError, PhoneNumber};
use outdial_telephony::{
    CallInstructions, CallbackUrls, CreateCall, TelephonyProvider, VoiceResponse,
};

use crate::store::SessionStore;

/// E.164: optional `+`, leading non-zero digit, 7..=15 digits total.
static DIALABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[1-9][0-9]{6,14}$").unwrap());

/// Validate that a string is a dialable number.
pub fn validate_phone(raw: &str) -> Result<PhoneNumber, OutdialError> {
    let trimmed = raw.trim();
    if DIALABLE.is_match(trimmed) {
        Ok(PhoneNumber::new_unchecked(trimmed))
    } else {
        Err(OutdialError::Validation(format!(
            "not a dialable phone number: {raw:?}"
        )))
    }
}

/// Dial parameters fixed at process start.
#[derive(Debug, Clone)]
pub struct DialConfig {
    /// Caller id presented on outbound calls.
    pub from_number: String,
    /// Publicly reachable base URL callbacks are registered under.
    pub public_base_url: String,
}

/// Starts outbound calls and creates their sessions.
pub struct CallInitiator {
    provider: Arc<dyn TelephonyProvider>,
    store: SessionStore,
    config: DialConfig,
}

impl CallInitiator {
    pub fn new(provider: Arc<dyn TelephonyProvider>, store: SessionStore, config: DialConfig) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    /// Place a machine-detected call and register its session in `Initiated`.
    ///
    /// No session is persisted when the provider rejects the dial.
    pub async fn initiate_call(
        &self,
        phone_number: &str,
        message: CallMessage,
    ) -> Result<CallSession, OutdialError> {
        let to = validate_phone(phone_number)?;
        let urls = CallbackUrls::from_base(&self.config.public_base_url);

        let call_id = self
            .provider
            .create_call(CreateCall {
                to: to.clone(),
                from: self.config.from_number.clone(),
                instructions: CallInstructions::UrlWithAmd {
                    url: urls.initial_connect,
                    amd_callback: urls.amd_result,
                },
                status_callback: Some(urls.status),
            })
            .await?;

        let session = CallSession::new(call_id.clone(), to, message);
        self.store.insert(session.clone()).await;
        info!(call_id = %call_id, to = %session.phone_number, "Call session created");
        Ok(session)
    }

    /// Place a plain test call with inline markup and no machine detection.
    /// No session is tracked; the call speaks one line and ends.
    pub async fn initiate_test_call(&self, phone_number: &str) -> Result<outdial_core::CallId, OutdialError> {
        let to = validate_phone(phone_number)?;
        let twiml = VoiceResponse::new()
            .say("This is a test call from your Outdial setup. If you hear this, the configuration works.")
            .hangup()
            .into_xml();

        self.provider
            .create_call(CreateCall {
                to,
                from: self.config.from_number.clone(),
                instructions: CallInstructions::Inline(twiml),
                status_callback: None,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use outdial_core::{CallId, CallState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeProvider {
        fn ok() -> Self {
            Self { calls: AtomicUsize::new(0), fail: false }
        }
        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), fail: true }
        }
    }

    #[async_trait]
    impl TelephonyProvider for FakeProvider {
        async fn create_call(&self, _req: CreateCall) -> Result<CallId, OutdialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(OutdialError::provider(Some(401), "bad credentials"))
            } else {
                Ok(CallId::new(format!("CA{n}")))
            }
        }
    }

    fn initiator(provider: FakeProvider) -> (CallInitiator, SessionStore) {
        let store = SessionStore::new();
        let init = CallInitiator::new(
            Arc::new(provider),
            store.clone(),
            DialConfig {
                from_number: "+15550000000".into(),
                public_base_url: "https://example.com".into(),
            },
        );
        (init, store)
    }

    #[test]
    fn phone_validation() {
        assert!(validate_phone("+15551234567").is_ok());
        assert!(validate_phone("15551234567").is_ok());
        assert!(validate_phone(" +447911123456 ").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("not-a-number").is_err());
        assert!(validate_phone("+0123").is_err());
        assert!(validate_phone("+1555123456789012345").is_err());
    }

    #[tokio::test]
    async fn initiate_creates_session_in_initiated() {
        let (init, store) = initiator(FakeProvider::ok());
        let session = init
            .initiate_call("+15551234567", CallMessage::default())
            .await
            .unwrap();
        assert_eq!(session.state, CallState::Initiated);
        assert!(!session.call_id.as_str().is_empty());
        assert!(store.get(&session.call_id).await.is_some());
    }

    #[tokio::test]
    async fn invalid_number_is_rejected_without_dialing() {
        let provider = FakeProvider::ok();
        let (init, store) = initiator(provider);
        let err = init
            .initiate_call("bogus", CallMessage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OutdialError::Validation(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn provider_rejection_persists_no_session() {
        let (init, store) = initiator(FakeProvider::failing());
        let err = init
            .initiate_call("+15551234567", CallMessage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OutdialError::Provider { .. }));
        assert!(store.is_empty().await);
    }
}
