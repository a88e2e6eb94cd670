use thiserror::Error;

use crate::types::{CallId, CallState};

/// Top-level error type for the Outdial runtime.
#[derive(Debug, Error)]
pub enum OutdialError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("telephony provider error: {message}")]
    Provider {
        /// HTTP status from the provider API, when one was received.
        status: Option<u16>,
        message: String,
    },

    #[error("unknown call session: {0}")]
    SessionNotFound(CallId),

    #[error("duplicate event delivery for call {0}")]
    DuplicateEvent(CallId),

    #[error("illegal state transition {from} -> {to}")]
    InvalidTransition { from: CallState, to: CallState },

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("media storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OutdialError {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }
}
