pub mod clone_client;

pub use clone_client::{SynthesisProvider, SynthesisRequest, VoiceCloneClient};
