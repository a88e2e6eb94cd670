//! Serves stored audio over HTTP so the telephony provider can fetch
//! `<Play>` targets.

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::warn;

use crate::store::{AudioStore, audio_mime_type};

/// Build the media router. Mount under `/media`:
///   GET /media/:filename — serve a stored audio file
pub fn media_router(store: AudioStore) -> Router {
    Router::new()
        .route("/:filename", get(serve_audio))
        .with_state(store)
}

async fn serve_audio(Path(filename): Path<String>, State(store): State<AudioStore>) -> Response {
    match store.read(&filename).await {
        Ok(bytes) => {
            let headers = [
                (header::CONTENT_TYPE, audio_mime_type(&filename).to_string()),
                (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            ];
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => {
            warn!(filename = %filename, error = %e, "Media lookup failed");
            (StatusCode::NOT_FOUND, "audio not found").into_response()
        }
    }
}
