//! Answer classification: AMD result to call-control decision.
//!
//! Pure and total over the classification enum — the same input always
//! yields the same action, which is what makes duplicate AMD delivery safe
//! to replay. The match is exhaustive on purpose: a new provider
//! classification is a compile error here, not a silent fallthrough.

use outdial_core::{AnsweredBy, CallAction};

/// Decide the next call-control action from how the call was answered.
pub fn decide(answered_by: AnsweredBy) -> CallAction {
    match answered_by {
        AnsweredBy::Human => CallAction::SpeakHumanMessage,
        AnsweredBy::MachineStart
        | AnsweredBy::MachineEndBeep
        | AnsweredBy::MachineEndSilence
        | AnsweredBy::MachineEndOther => CallAction::PromptAndRecordVoicemail,
        AnsweredBy::Fax | AnsweredBy::Unknown => CallAction::SpeakFallbackAndHangup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_over_the_classification_domain() {
        // Every enumerated value maps to exactly one action.
        for v in AnsweredBy::ALL {
            let _ = decide(v);
        }
    }

    #[test]
    fn human_gets_the_message() {
        assert_eq!(decide(AnsweredBy::Human), CallAction::SpeakHumanMessage);
    }

    #[test]
    fn every_machine_variant_records_voicemail() {
        for v in [
            AnsweredBy::MachineStart,
            AnsweredBy::MachineEndBeep,
            AnsweredBy::MachineEndSilence,
            AnsweredBy::MachineEndOther,
        ] {
            assert_eq!(decide(v), CallAction::PromptAndRecordVoicemail, "{v}");
        }
    }

    #[test]
    fn fax_and_unknown_fall_back() {
        assert_eq!(decide(AnsweredBy::Fax), CallAction::SpeakFallbackAndHangup);
        assert_eq!(
            decide(AnsweredBy::Unknown),
            CallAction::SpeakFallbackAndHangup
        );
    }

    #[test]
    fn deterministic_across_calls() {
        for v in AnsweredBy::ALL {
            assert_eq!(decide(v), decide(v));
        }
    }
}
