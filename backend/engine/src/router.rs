//! Callback routing: apply inbound provider events to call sessions and
//! render the markup the provider executes next.
//!
//! Every handler resolves the session, mutates it under its per-call lock,
//! and returns synchronously computed markup — O(1) over call volume, no
//! provider API calls, nothing that could outlast the provider's webhook
//! timeout. Duplicate deliveries replay the previously rendered markup
//! instead of re-running side effects.

use tracing::{debug, info, warn};

use outdial_core::{AnsweredBy, CallAction, CallState, OutdialError};
use outdial_telephony::{
    AmdResultPayload, CallStatusPayload, InitialConnectPayload, TranscriptionPayload,
    VoiceResponse,
};

use crate::classifier;
use crate::store::SessionStore;

/// Markup texts and recording bounds, fixed at process start.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Spoken while AMD is still resolving; the provider may cut it short.
    pub hold_text: String,
    /// Spoken to a human when the session carries no message of its own.
    pub default_greeting: String,
    /// Spoken to an answering machine before recording starts.
    pub voicemail_prompt: String,
    /// Spoken before hanging up on fax/unknown answers.
    pub fallback_text: String,
    /// Safe terminal line for unknown sessions and internal faults.
    pub apology_text: String,
    /// Upper bound on voicemail recording length, seconds.
    pub record_max_secs: u32,
    /// Public base URL; the transcription callback is registered under it.
    pub public_base_url: String,
}

impl RouterConfig {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            hold_text: "Please wait while we connect your call.".into(),
            default_greeting: "Hello, this is a personal message for you.".into(),
            voicemail_prompt: "Please leave your message after the beep.".into(),
            fallback_text: "Sorry, we could not reach you. Goodbye.".into(),
            apology_text: "We're sorry, something went wrong with this call. Goodbye.".into(),
            record_max_secs: 120,
            public_base_url: public_base_url.into(),
        }
    }

    fn transcription_callback(&self) -> String {
        format!(
            "{}/voice/transcription",
            self.public_base_url.trim_end_matches('/')
        )
    }
}

/// Receives provider lifecycle events, resolves the session, and answers
/// with call-control markup.
pub struct CallbackRouter {
    store: SessionStore,
    config: RouterConfig,
}

impl CallbackRouter {
    pub fn new(store: SessionStore, config: RouterConfig) -> Self {
        Self { store, config }
    }

    /// Terminal markup returned whenever a session cannot be resolved or a
    /// handler faults: apologize and hang up, never leave the call open.
    pub fn safe_terminal_markup(&self) -> String {
        VoiceResponse::new()
            .say(&self.config.apology_text)
            .hangup()
            .into_xml()
    }

    /// Initial-connect: the call was answered by something; AMD is still
    /// resolving in the background. Holds the line, nothing more.
    pub async fn handle_initial_connect(
        &self,
        payload: InitialConnectPayload,
    ) -> Result<String, OutdialError> {
        let call_id = payload.call_id();
        let handle = self
            .store
            .get(&call_id)
            .await
            .ok_or_else(|| OutdialError::SessionNotFound(call_id.clone()))?;
        let mut session = handle.lock().await;

        if session.state == CallState::Initiated {
            session.apply(CallState::AwaitingAnswer)?;
            debug!(call_id = %call_id, "Call answered, awaiting AMD");
        } else if let Some(markup) = &session.decided_markup {
            // Late or duplicate delivery after the AMD decision: never move
            // backward, replay what was already decided.
            debug!(call_id = %call_id, state = %session.state, "Stale initial-connect, replaying decision");
            return Ok(markup.clone());
        }

        Ok(VoiceResponse::new().say(&self.config.hold_text).into_xml())
    }

    /// AMD result: classify, transition, render. Exactly one classification
    /// is accepted per call; re-delivery returns the remembered markup.
    pub async fn handle_amd_result(
        &self,
        payload: AmdResultPayload,
    ) -> Result<String, OutdialError> {
        let call_id = payload.call_id();
        let handle = self
            .store
            .get(&call_id)
            .await
            .ok_or_else(|| OutdialError::SessionNotFound(call_id.clone()))?;
        let mut session = handle.lock().await;

        if session.answered_by.is_some() {
            debug!(call_id = %call_id, "Duplicate AMD delivery absorbed");
            return Ok(session
                .decided_markup
                .clone()
                .unwrap_or_else(|| self.safe_terminal_markup()));
        }

        // AMD may legally arrive before initial-connect; jumping the rank is
        // forward motion either way.
        if session.state != CallState::AmdPending {
            session.apply(CallState::AmdPending)?;
        }

        let answered_by = AnsweredBy::from_wire(&payload.answered_by);
        let action = classifier::decide(answered_by);
        info!(call_id = %call_id, answered_by = %answered_by, action = ?action, "AMD resolved");

        let markup = match action {
            CallAction::SpeakHumanMessage => {
                session.apply(CallState::HumanConnected)?;
                let mut response = VoiceResponse::new();
                if let Some(url) = &session.message.audio_url {
                    response = response.play(url);
                } else {
                    let text = session
                        .message
                        .text
                        .as_deref()
                        .unwrap_or(&self.config.default_greeting);
                    response = response.say(text);
                }
                response.into_xml()
            }
            CallAction::PromptAndRecordVoicemail => {
                session.apply(CallState::MachineRecording)?;
                let markup = VoiceResponse::new()
                    .say(&self.config.voicemail_prompt)
                    .record(
                        self.config.record_max_secs,
                        true,
                        Some(self.config.transcription_callback()),
                    )
                    .hangup()
                    .into_xml();
                // The record directive is issued; the transcription arrives
                // as its own later event.
                session.apply(CallState::TranscriptionPending)?;
                markup
            }
            CallAction::SpeakFallbackAndHangup => {
                session.apply(CallState::Failed)?;
                VoiceResponse::new()
                    .say(&self.config.fallback_text)
                    .hangup()
                    .into_xml()
            }
        };

        session.answered_by = Some(answered_by);
        session.decided_markup = Some(markup.clone());
        Ok(markup)
    }

    /// Transcription result: finalize the voicemail path. Idempotent — the
    /// provider retries delivery, and a repeat on a completed session is
    /// accepted and ignored.
    pub async fn handle_transcription(
        &self,
        payload: TranscriptionPayload,
    ) -> Result<(), OutdialError> {
        let call_id = payload.call_id();
        let handle = self
            .store
            .get(&call_id)
            .await
            .ok_or_else(|| OutdialError::SessionNotFound(call_id.clone()))?;
        let mut session = handle.lock().await;

        match session.state {
            CallState::TranscriptionPending => {
                session.recording_url = payload.recording_url;
                session.transcription_text = payload.transcription_text;
                session.apply(CallState::Completed)?;
                info!(call_id = %call_id, "Voicemail transcription stored, call completed");
                Ok(())
            }
            CallState::Completed => {
                debug!(call_id = %call_id, "Duplicate transcription delivery absorbed");
                Ok(())
            }
            other => {
                // Accept the delivery so the provider stops retrying, but a
                // transcription outside the machine path never writes.
                warn!(call_id = %call_id, state = %other, "Transcription for session outside the recording path");
                Ok(())
            }
        }
    }

    /// Terminal call-status from the provider: completes a connected human
    /// call, fails calls that never got a decision.
    pub async fn handle_status(&self, payload: CallStatusPayload) -> Result<(), OutdialError> {
        let call_id = payload.call_id();
        let handle = self
            .store
            .get(&call_id)
            .await
            .ok_or_else(|| OutdialError::SessionNotFound(call_id.clone()))?;
        let mut session = handle.lock().await;

        match payload.call_status.as_str() {
            "completed" => match session.state {
                CallState::HumanConnected => {
                    session.apply(CallState::Completed)?;
                    info!(call_id = %call_id, "Human call completed");
                }
                CallState::Initiated | CallState::AwaitingAnswer | CallState::AmdPending => {
                    // Hung up before any AMD decision landed.
                    session.apply(CallState::Failed)?;
                    warn!(call_id = %call_id, "Call ended before classification");
                }
                // The voicemail path is finalized by the transcription
                // event, not by hangup.
                _ => {}
            },
            "busy" | "no-answer" | "failed" | "canceled" => {
                if !session.state.is_terminal() {
                    session.apply(CallState::Failed)?;
                    warn!(call_id = %call_id, status = %payload.call_status, "Call failed");
                }
            }
            other => {
                debug!(call_id = %call_id, status = %other, "Ignoring non-terminal call status");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outdial_core::{CallId, CallMessage, CallSession, PhoneNumber};

    fn router() -> (CallbackRouter, SessionStore) {
        let store = SessionStore::new();
        let router = CallbackRouter::new(store.clone(), RouterConfig::new("https://example.com"));
        (router, store)
    }

    async fn seed(store: &SessionStore, id: &str) {
        seed_with_message(store, id, CallMessage::default()).await;
    }

    async fn seed_with_message(store: &SessionStore, id: &str, message: CallMessage) {
        store
            .insert(CallSession::new(
                CallId::new(id),
                PhoneNumber::new_unchecked("+15551234567"),
                message,
            ))
            .await;
    }

    fn amd(id: &str, answered_by: &str) -> AmdResultPayload {
        AmdResultPayload {
            call_sid: id.into(),
            answered_by: answered_by.into(),
        }
    }

    fn initial(id: &str) -> InitialConnectPayload {
        InitialConnectPayload {
            call_sid: id.into(),
            call_status: None,
        }
    }

    fn transcription(id: &str) -> TranscriptionPayload {
        TranscriptionPayload {
            call_sid: id.into(),
            recording_url: Some("https://api.example.com/rec/RE1".into()),
            transcription_text: Some("call me back".into()),
        }
    }

    fn status(id: &str, s: &str) -> CallStatusPayload {
        CallStatusPayload {
            call_sid: id.into(),
            call_status: s.into(),
        }
    }

    async fn state_of(store: &SessionStore, id: &str) -> CallState {
        store
            .get(&CallId::new(id))
            .await
            .unwrap()
            .lock()
            .await
            .state
    }

    #[tokio::test]
    async fn initial_connect_moves_to_awaiting_answer() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        let markup = router.handle_initial_connect(initial("CA1")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::AwaitingAnswer);
        assert!(markup.contains("<Say>Please wait while we connect your call.</Say>"));
        assert!(!markup.contains("<Record"));
    }

    #[tokio::test]
    async fn amd_human_connects_and_greets() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router.handle_initial_connect(initial("CA1")).await.unwrap();
        let markup = router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::HumanConnected);
        assert!(markup.contains("<Say>"));
        assert!(!markup.contains("<Record"));
    }

    #[tokio::test]
    async fn amd_human_plays_generated_audio_when_present() {
        let (router, store) = router();
        seed_with_message(
            &store,
            "CA1",
            CallMessage {
                text: None,
                audio_url: Some("https://example.com/media/abc.wav".into()),
            },
        )
        .await;
        let markup = router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        assert!(markup.contains("<Play>https://example.com/media/abc.wav</Play>"));
    }

    #[tokio::test]
    async fn amd_machine_records_voicemail_and_awaits_transcription() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router.handle_initial_connect(initial("CA1")).await.unwrap();
        let markup = router
            .handle_amd_result(amd("CA1", "machine_end_beep"))
            .await
            .unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::TranscriptionPending);
        assert!(markup.contains("<Say>Please leave your message after the beep.</Say>"));
        assert!(markup.contains("maxLength=\"120\""));
        assert!(markup.contains("transcribe=\"true\""));
        assert!(markup.contains("transcribeCallback=\"https://example.com/voice/transcription\""));
        assert!(markup.contains("<Hangup/>"));
    }

    #[tokio::test]
    async fn amd_unknown_fails_with_fallback() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        let markup = router.handle_amd_result(amd("CA1", "unknown")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::Failed);
        assert!(markup.contains("<Say>Sorry, we could not reach you. Goodbye.</Say>"));
        assert!(markup.contains("<Hangup/>"));
    }

    #[tokio::test]
    async fn duplicate_amd_delivery_is_idempotent() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        let first = router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        let second = router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(state_of(&store, "CA1").await, CallState::HumanConnected);
    }

    #[tokio::test]
    async fn conflicting_amd_redelivery_keeps_first_decision() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        let first = router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        // A retried delivery with a different classification never re-decides.
        let second = router
            .handle_amd_result(amd("CA1", "machine_end_beep"))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(state_of(&store, "CA1").await, CallState::HumanConnected);
    }

    #[tokio::test]
    async fn amd_before_initial_connect_is_accepted() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        // Out-of-order delivery: AMD lands first.
        router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::HumanConnected);
        // The late initial-connect must not move the session backward.
        let markup = router.handle_initial_connect(initial("CA1")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::HumanConnected);
        assert!(markup.contains("<Say>"));
    }

    #[tokio::test]
    async fn transcription_completes_the_voicemail_path() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router
            .handle_amd_result(amd("CA1", "machine_end_silence"))
            .await
            .unwrap();
        router
            .handle_transcription(transcription("CA1"))
            .await
            .unwrap();

        let handle = store.get(&CallId::new("CA1")).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.state, CallState::Completed);
        assert_eq!(
            session.recording_url.as_deref(),
            Some("https://api.example.com/rec/RE1")
        );
        assert_eq!(session.transcription_text.as_deref(), Some("call me back"));
    }

    #[tokio::test]
    async fn repeated_transcription_for_completed_session_is_ignored() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router
            .handle_amd_result(amd("CA1", "machine_end_beep"))
            .await
            .unwrap();
        router.handle_transcription(transcription("CA1")).await.unwrap();

        let before = store.get(&CallId::new("CA1")).await.unwrap().lock().await.clone();
        // Provider retry of the same event.
        router.handle_transcription(transcription("CA1")).await.unwrap();
        let after = store.get(&CallId::new("CA1")).await.unwrap().lock().await.clone();

        assert_eq!(after.state, CallState::Completed);
        assert_eq!(after.recording_url, before.recording_url);
        assert_eq!(after.transcription_text, before.transcription_text);
    }

    #[tokio::test]
    async fn transcription_outside_recording_path_never_writes() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        router.handle_transcription(transcription("CA1")).await.unwrap();

        let handle = store.get(&CallId::new("CA1")).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.state, CallState::HumanConnected);
        assert!(session.recording_url.is_none());
        assert!(session.transcription_text.is_none());
    }

    #[tokio::test]
    async fn unknown_session_surfaces_not_found() {
        let (router, _store) = router();
        let err = router.handle_amd_result(amd("CAnope", "human")).await.unwrap_err();
        assert!(matches!(err, OutdialError::SessionNotFound(_)));
        // The gateway answers such requests with this markup.
        let markup = router.safe_terminal_markup();
        assert!(markup.contains("<Say>"));
        assert!(markup.contains("<Hangup/>"));
    }

    #[tokio::test]
    async fn status_completed_finalizes_human_call() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        router.handle_status(status("CA1", "completed")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::Completed);
    }

    #[tokio::test]
    async fn status_completed_leaves_transcription_pending_alone() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router
            .handle_amd_result(amd("CA1", "machine_end_beep"))
            .await
            .unwrap();
        // The call hangs up after recording; transcription is still due.
        router.handle_status(status("CA1", "completed")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::TranscriptionPending);
    }

    #[tokio::test]
    async fn status_busy_fails_undecided_call() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router.handle_status(status("CA1", "busy")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::Failed);
    }

    #[tokio::test]
    async fn no_event_sequence_moves_a_session_backward() {
        let (router, store) = router();
        seed(&store, "CA1").await;
        router.handle_amd_result(amd("CA1", "machine_end_beep")).await.unwrap();
        router.handle_transcription(transcription("CA1")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::Completed);

        // Replays of every earlier event leave the terminal state intact.
        router.handle_initial_connect(initial("CA1")).await.unwrap();
        router.handle_amd_result(amd("CA1", "human")).await.unwrap();
        router.handle_transcription(transcription("CA1")).await.unwrap();
        assert_eq!(state_of(&store, "CA1").await, CallState::Completed);
    }
}
