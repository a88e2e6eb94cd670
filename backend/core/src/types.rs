//! Call session model: identifiers, lifecycle states, and the session record
//! mutated by the callback router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OutdialError;

/// Provider-assigned unique identifier for one outbound call.
///
/// Opaque; assigned at call creation and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A destination phone number, already validated as dialable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Wrap a number that has already passed dialability validation.
    pub fn new_unchecked(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an outbound call session.
///
/// States advance monotonically along a fixed partial order; the only
/// backward-looking exception is that any non-terminal state may move to
/// `Failed`. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Initiated,
    AwaitingAnswer,
    AmdPending,
    HumanConnected,
    MachineRecording,
    TranscriptionPending,
    Completed,
    Failed,
}

impl CallState {
    /// Position in the forward partial order. `HumanConnected` and
    /// `MachineRecording` share a rank: they are alternative branches, not
    /// an ordered pair. `Failed` has no rank; it is reachable from anywhere.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Initiated => Some(0),
            Self::AwaitingAnswer => Some(1),
            Self::AmdPending => Some(2),
            Self::HumanConnected | Self::MachineRecording => Some(3),
            Self::TranscriptionPending => Some(4),
            Self::Completed => Some(5),
            Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` respects the partial order.
    pub fn can_advance_to(self, next: CallState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initiated => "initiated",
            Self::AwaitingAnswer => "awaiting_answer",
            Self::AmdPending => "amd_pending",
            Self::HumanConnected => "human_connected",
            Self::MachineRecording => "machine_recording",
            Self::TranscriptionPending => "transcription_pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Provider classification of who (or what) answered the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnsweredBy {
    Human,
    MachineStart,
    MachineEndBeep,
    MachineEndSilence,
    MachineEndOther,
    Fax,
    Unknown,
}

impl AnsweredBy {
    /// All classification values the provider can deliver. Kept in sync with
    /// the enum by the exhaustiveness test below.
    pub const ALL: [AnsweredBy; 7] = [
        Self::Human,
        Self::MachineStart,
        Self::MachineEndBeep,
        Self::MachineEndSilence,
        Self::MachineEndOther,
        Self::Fax,
        Self::Unknown,
    ];

    /// Parse the wire value from an AMD callback. Values outside the
    /// documented set collapse to `Unknown` so a provider-side addition can
    /// never crash a live call.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "human" => Self::Human,
            "machine_start" => Self::MachineStart,
            "machine_end_beep" => Self::MachineEndBeep,
            "machine_end_silence" => Self::MachineEndSilence,
            "machine_end_other" => Self::MachineEndOther,
            "fax" => Self::Fax,
            _ => Self::Unknown,
        }
    }

    pub fn is_machine(self) -> bool {
        matches!(
            self,
            Self::MachineStart
                | Self::MachineEndBeep
                | Self::MachineEndSilence
                | Self::MachineEndOther
        )
    }
}

impl std::fmt::Display for AnsweredBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Human => "human",
            Self::MachineStart => "machine_start",
            Self::MachineEndBeep => "machine_end_beep",
            Self::MachineEndSilence => "machine_end_silence",
            Self::MachineEndOther => "machine_end_other",
            Self::Fax => "fax",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Call-control decision derived from an AMD classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    /// A person answered: deliver the message.
    SpeakHumanMessage,
    /// An answering machine answered: prompt, record a voicemail with
    /// transcription, hang up.
    PromptAndRecordVoicemail,
    /// Fax or undetermined: speak the fallback line and hang up.
    SpeakFallbackAndHangup,
}

/// What to deliver once the call is answered by a person: a generated audio
/// artifact, spoken text, or both (audio preferred when present).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// One in-flight outbound call.
///
/// Created by the call initiator on dial, mutated only by the callback
/// router, and swept by the reaper once terminal or stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub call_id: CallId,
    pub phone_number: PhoneNumber,
    pub state: CallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_by: Option<AnsweredBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription_text: Option<String>,
    #[serde(default)]
    pub message: CallMessage,
    /// Markup rendered for the accepted AMD classification, replayed
    /// verbatim when the provider re-delivers the same event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_markup: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(call_id: CallId, phone_number: PhoneNumber, message: CallMessage) -> Self {
        let now = Utc::now();
        Self {
            call_id,
            phone_number,
            state: CallState::Initiated,
            answered_by: None,
            recording_url: None,
            transcription_text: None,
            message,
            decided_markup: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the session state, enforcing the forward partial order.
    pub fn apply(&mut self, next: CallState) -> Result<(), OutdialError> {
        if !self.state.can_advance_to(next) {
            return Err(OutdialError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.touch();
        Ok(())
    }

    /// Bump `updated_at` after any mutation, so the reaper sees activity.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
