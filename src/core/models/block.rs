use serde::Serialize;

/// Text payload of a block, serialized the way Slack's Block Kit expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Mrkdwn { text: String },
    PlainText { text: String, emoji: bool },
}

impl TextObject {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText {
            text: text.into(),
            emoji: true,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Mrkdwn { text } | Self::PlainText { text, .. } => text,
        }
    }
}

/// A discrete renderable unit of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Context { elements: Vec<TextObject> },
    Section { text: TextObject },
    Header { text: TextObject },
}

impl Block {
    pub fn context(text: impl Into<String>) -> Self {
        Self::Context {
            elements: vec![TextObject::mrkdwn(text)],
        }
    }

    pub fn section(text: impl Into<String>) -> Self {
        Self::Section {
            text: TextObject::mrkdwn(text),
        }
    }

    pub fn header(text: impl Into<String>) -> Self {
        Self::Header {
            text: TextObject::plain(text),
        }
    }

    /// Plain text of the block, used by previews.
    pub fn text(&self) -> String {
        match self {
            Self::Context { elements } => elements
                .iter()
                .map(TextObject::text)
                .collect::<Vec<_>>()
                .join(" "),
            Self::Section { text } | Self::Header { text } => text.text().to_string(),
        }
    }
}
