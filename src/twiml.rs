//! Voice and messaging markup returned to the telephony provider.

use quick_xml::escape::escape;

pub const CONTENT_TYPE: &str = "application/xml";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    Say(String),
    Gather {
        num_digits: u32,
        action: String,
        prompt: String,
    },
    Pause {
        length: u32,
    },
    Redirect(String),
    Record {
        max_length: u32,
        finish_on_key: String,
        action: String,
    },
    Hangup,
}

impl Verb {
    fn to_xml(&self) -> String {
        match self {
            Verb::Say(text) => format!("<Say>{}</Say>", escape(text)),
            Verb::Gather {
                num_digits,
                action,
                prompt,
            } => format!(
                r#"<Gather numDigits="{}" action="{}"><Say>{}</Say></Gather>"#,
                num_digits,
                escape(action),
                escape(prompt)
            ),
            Verb::Pause { length } => format!(r#"<Pause length="{}"/>"#, length),
            Verb::Redirect(url) => format!("<Redirect>{}</Redirect>", escape(url)),
            Verb::Record {
                max_length,
                finish_on_key,
                action,
            } => format!(
                r#"<Record maxLength="{}" finishOnKey="{}" action="{}"/>"#,
                max_length,
                escape(finish_on_key),
                escape(action)
            ),
            Verb::Hangup => "<Hangup/>".to_string(),
        }
    }
}

/// Builder for a voice `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verb(mut self, verb: Verb) -> Self {
        self.verbs.push(verb);
        self
    }

    pub fn say(self, text: impl Into<String>) -> Self {
        self.verb(Verb::Say(text.into()))
    }

    pub fn gather(self, num_digits: u32, action: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.verb(Verb::Gather {
            num_digits,
            action: action.into(),
            prompt: prompt.into(),
        })
    }

    pub fn pause(self, length: u32) -> Self {
        self.verb(Verb::Pause { length })
    }

    pub fn redirect(self, url: impl Into<String>) -> Self {
        self.verb(Verb::Redirect(url.into()))
    }

    pub fn record(
        self,
        max_length: u32,
        finish_on_key: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.verb(Verb::Record {
            max_length,
            finish_on_key: finish_on_key.into(),
            action: action.into(),
        })
    }

    pub fn hangup(self) -> Self {
        self.verb(Verb::Hangup)
    }

    pub fn render(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str("<Response>");
        for verb in &self.verbs {
            out.push_str(&verb.to_xml());
        }
        out.push_str("</Response>");
        out
    }
}

/// Builder for a messaging `<Response>` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagingResponse {
    messages: Vec<String>,
}

impl MessagingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, body: impl Into<String>) -> Self {
        self.messages.push(body.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str("<Response>");
        for message in &self.messages {
            out.push_str("<Message>");
            out.push_str(&escape(message.as_str()));
            out.push_str("</Message>");
        }
        out.push_str("</Response>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_gather_with_nested_prompt() {
        let xml = VoiceResponse::new()
            .gather(1, "https://example.com/enqueue", "Press 1.")
            .render();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Gather numDigits="1" action="https://example.com/enqueue"><Say>Press 1.</Say></Gather></Response>"#
        );
    }

    #[test]
    fn renders_empty_elements() {
        let xml = VoiceResponse::new()
            .pause(3)
            .record(10, "#", "/voicemail-complete")
            .hangup()
            .render();
        assert!(xml.contains(r#"<Pause length="3"/>"#));
        assert!(xml.contains(r##"<Record maxLength="10" finishOnKey="#" action="/voicemail-complete"/>"##));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }

    #[test]
    fn escapes_text_and_attributes() {
        let xml = VoiceResponse::new()
            .say("Tom & Jerry <agents>")
            .redirect("https://example.com/a?b=1&c=2")
            .render();
        assert!(xml.contains("<Say>Tom &amp; Jerry &lt;agents&gt;</Say>"));
        assert!(xml.contains("<Redirect>https://example.com/a?b=1&amp;c=2</Redirect>"));
    }

    #[test]
    fn messaging_response() {
        let xml = MessagingResponse::new()
            .message("Worker +1555 is now available.")
            .render();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>Worker +1555 is now available.</Message></Response>"#
        );
    }
}
