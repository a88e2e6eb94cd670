//! Call-control markup (TwiML) rendering.
//!
//! The provider executes this markup against the live call, so the wire
//! format must be preserved byte-for-byte: XML declaration, element names,
//! and attribute spelling all follow the provider's published vocabulary.

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Content-Type the provider expects on markup responses.
pub const MARKUP_CONTENT_TYPE: &str = "text/xml";

/// One call-control instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    /// Speak text with the provider's built-in voice.
    Say { text: String },
    /// Play an audio artifact by URL.
    Play { url: String },
    /// Record the caller with transcription, then continue.
    Record {
        max_length_secs: u32,
        transcribe: bool,
        transcribe_callback: Option<String>,
    },
    /// Bridge the call to another number.
    Dial { number: String },
    /// Terminate the call.
    Hangup,
}

/// Builder for a markup response, one verb at a time.
///
/// ```
/// use outdial_telephony::twiml::VoiceResponse;
///
/// let xml = VoiceResponse::new().say("Hello").hangup().into_xml();
/// assert!(xml.contains("<Say>Hello</Say><Hangup/>"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say { text: text.into() });
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play { url: url.into() });
        self
    }

    pub fn record(
        mut self,
        max_length_secs: u32,
        transcribe: bool,
        transcribe_callback: Option<String>,
    ) -> Self {
        self.verbs.push(Verb::Record {
            max_length_secs,
            transcribe,
            transcribe_callback,
        });
        self
    }

    pub fn dial(mut self, number: impl Into<String>) -> Self {
        self.verbs.push(Verb::Dial {
            number: number.into(),
        });
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    /// Render the provider wire format.
    pub fn into_xml(self) -> String {
        let mut out = String::with_capacity(128);
        out.push_str(XML_DECL);
        out.push_str("<Response>");
        for verb in &self.verbs {
            render_verb(&mut out, verb);
        }
        out.push_str("</Response>");
        out
    }
}

fn render_verb(out: &mut String, verb: &Verb) {
    match verb {
        Verb::Say { text } => {
            out.push_str("<Say>");
            out.push_str(&escape_text(text));
            out.push_str("</Say>");
        }
        Verb::Play { url } => {
            out.push_str("<Play>");
            out.push_str(&escape_text(url));
            out.push_str("</Play>");
        }
        Verb::Record {
            max_length_secs,
            transcribe,
            transcribe_callback,
        } => {
            out.push_str("<Record maxLength=\"");
            out.push_str(&max_length_secs.to_string());
            out.push_str("\" transcribe=\"");
            out.push_str(if *transcribe { "true" } else { "false" });
            out.push('"');
            if let Some(cb) = transcribe_callback {
                out.push_str(" transcribeCallback=\"");
                out.push_str(&escape_attr(cb));
                out.push('"');
            }
            out.push_str("/>");
        }
        Verb::Dial { number } => {
            out.push_str("<Dial>");
            out.push_str(&escape_text(number));
            out.push_str("</Dial>");
        }
        Verb::Hangup => out.push_str("<Hangup/>"),
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_say_and_hangup() {
        let xml = VoiceResponse::new()
            .say("Sorry, goodbye.")
            .hangup()
            .into_xml();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
             <Say>Sorry, goodbye.</Say><Hangup/></Response>"
        );
    }

    #[test]
    fn renders_record_with_transcription() {
        let xml = VoiceResponse::new()
            .say("Leave a message after the beep.")
            .record(120, true, Some("https://example.com/voice/transcription".into()))
            .hangup()
            .into_xml();
        assert!(xml.contains(
            "<Record maxLength=\"120\" transcribe=\"true\" \
             transcribeCallback=\"https://example.com/voice/transcription\"/>"
        ));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }

    #[test]
    fn renders_play() {
        let xml = VoiceResponse::new()
            .play("https://cdn.example.com/msg.mp3")
            .into_xml();
        assert!(xml.contains("<Play>https://cdn.example.com/msg.mp3</Play>"));
    }

    #[test]
    fn renders_dial_transfer() {
        let xml = VoiceResponse::new().dial("+15557654321").into_xml();
        assert!(xml.contains("<Dial>+15557654321</Dial>"));
    }

    #[test]
    fn escapes_reserved_characters() {
        let xml = VoiceResponse::new().say("Bed & breakfast <tomorrow>").into_xml();
        assert!(xml.contains("<Say>Bed &amp; breakfast &lt;tomorrow&gt;</Say>"));

        let xml = VoiceResponse::new()
            .record(10, true, Some("https://x.test/cb?a=1&b=\"2\"".into()))
            .into_xml();
        assert!(xml.contains("transcribeCallback=\"https://x.test/cb?a=1&amp;b=&quot;2&quot;\""));
    }

    #[test]
    fn empty_response_is_valid() {
        let xml = VoiceResponse::new().into_xml();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>"
        );
    }
}
