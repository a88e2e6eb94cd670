pub mod client;
pub mod twiml;
pub mod webhook;

pub use client::{CallInstructions, CallbackUrls, CreateCall, TelephonyProvider, TwilioRest};
pub use twiml::{MARKUP_CONTENT_TYPE, VoiceResponse};
pub use webhook::{
    AmdResultPayload, CallStatusPayload, InitialConnectPayload, TranscriptionPayload,
    parse_form, verify_signature,
};
