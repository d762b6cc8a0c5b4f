use std::error::Error;

use crate::error::ErrorKind;
use crate::request::{ChatRequest, Credential, Principal};
use crate::response::{ChatResponse, ResponseBody};
use crate::turn::{ConversationId, ConversationSummary, Turn};

/// The error type for a collaborator.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// The service that authenticates users and issues session tokens.
///
/// Both methods return `Ok(None)` when nobody is signed in. Returned
/// futures must not borrow `self`.
pub trait IdentityProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: BackendError;

    /// Returns the currently authenticated user.
    fn current_principal(
        &self,
    ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'static;

    /// Returns the credential of the current session.
    fn session_token(
        &self,
    ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + 'static;
}

/// The service that keeps the durable copy of every conversation.
pub trait HistoryStore: Send + Sync {
    /// The error type that may be returned by the store.
    type Error: BackendError;

    /// Lists the conversations of the credential's owner, in the order the
    /// store returns them.
    fn list_conversations(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>>
    + Send
    + 'static;

    /// Lists the turns of one conversation, oldest first.
    fn list_turns(
        &self,
        credential: &Credential,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Turn>, Self::Error>> + Send + 'static;
}

/// The service that generates assistant replies.
///
/// Once the backend is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it.
pub trait ChatBackend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// The streaming body type of a reply.
    type Body: ResponseBody<Error = Self::Error>;

    /// Sends a user message and returns the reply once its headers have
    /// arrived.
    fn send_message(
        &self,
        req: &ChatRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<ChatResponse<Self::Body>, Self::Error>>
    + Send
    + 'static;
}
