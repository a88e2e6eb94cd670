pub mod serve;
pub mod store;

pub use serve::media_router;
pub use store::{AudioStore, StoredAudio, audio_mime_type};
