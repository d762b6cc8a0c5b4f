use ellen_chat_model::{
    ChatRequest, ConversationId, ConversationSummary, Principal, Speaker, Turn,
};
use serde::{Deserialize, Serialize};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub initial_message_content: Option<String>,
}

impl From<SessionRecord> for ConversationSummary {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: ConversationId::new(record.id),
            preview: record.initial_message_content.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct MessageRecord {
    pub role: Speaker,
    pub content: String,
}

impl From<MessageRecord> for Turn {
    fn from(record: MessageRecord) -> Self {
        Self {
            speaker: record.role,
            text: record.content,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
}

impl From<UserRecord> for Principal {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.filter(|email| !email.is_empty()),
        }
    }
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatRequestBody<'a> {
    message: &'a str,
    session_id: Option<&'a str>,
}

impl<'a> From<&'a ChatRequest> for ChatRequestBody<'a> {
    fn from(req: &'a ChatRequest) -> Self {
        Self {
            message: &req.message,
            session_id: req.conversation_id.as_ref().map(ConversationId::as_str),
        }
    }
}
