use std::fmt::{self, Debug, Formatter};

use crate::ConversationId;

/// A message to be sent to the chat backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatRequest {
    /// The user input text.
    pub message: String,
    /// The conversation to continue. `None` starts a new conversation.
    pub conversation_id: Option<ConversationId>,
}

/// A bearer credential issued by the identity provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wraps an access token.
    #[inline]
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    /// Returns the raw access token.
    #[inline]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Returns the value for an `Authorization` header.
    #[inline]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

/// The authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Principal {
    /// The user identifier assigned by the identity provider.
    pub id: String,
    /// The email address, if the provider exposes one.
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_is_redacted() {
        let credential = Credential::new("secret-token");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("secret-token"));
        assert_eq!(credential.bearer(), "Bearer secret-token");
    }
}
