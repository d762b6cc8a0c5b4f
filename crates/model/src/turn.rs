use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The author of a [`Turn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The person typing into the client.
    User,
    /// The remote model. Stored history may label it `bot`.
    #[serde(alias = "bot")]
    Assistant,
}

/// One message in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    /// Who wrote the message.
    pub speaker: Speaker,
    /// The message content. Assistant turns are built incrementally.
    pub text: String,
}

impl Turn {
    /// Creates a user turn.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// Creates an assistant turn.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// An opaque key that correlates client requests with the history the
/// server stores for one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wraps a raw identifier.
    #[inline]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entry of the conversation list returned by the history store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The conversation identifier.
    pub id: ConversationId,
    /// A short preview, usually the first user message. May be empty.
    pub preview: String,
}

impl ConversationSummary {
    /// Returns the text to display for this conversation.
    #[inline]
    pub fn title(&self) -> &str {
        if self.preview.is_empty() {
            "New Chat"
        } else {
            &self.preview
        }
    }
}
