mod builder;
#[cfg(test)]
mod tests;

use ellen_chat_model::{
    ChatBackend, ChatRequest, ConversationId, ConversationSummary, Credential,
    HistoryStore, IdentityProvider, Principal,
};
use tracing::Instrument;

use crate::assembler::{
    AssemblyOutcome, StreamingTranscriptAssembler, TeardownHandle, view_closed,
};
use crate::error::{Error, ErrorKind};
use crate::transcript::Transcript;
pub use builder::ChatViewBuilder;

/// The conversation list shown next to the transcript.
///
/// Fetching never fails as a whole: when the history store is unreachable
/// the list is empty and `error` explains why.
#[derive(Debug, Default)]
pub struct ConversationList {
    /// Conversations of the signed-in user, in the store's order.
    pub conversations: Vec<ConversationSummary>,
    /// Set if the list could not be fetched.
    pub error: Option<Error>,
}

/// A conversation view: one transcript, plus the collaborators needed to
/// fill it.
///
/// The view owns its [`Transcript`]. Sending a message borrows the view
/// mutably until the reply has been streamed, so only one reply can be in
/// flight at a time. Use a [`TeardownHandle`] obtained from
/// [`ChatView::teardown_handle`] to stop a reply from another task.
pub struct ChatView<I, H, C> {
    identity: I,
    history: H,
    backend: C,
    transcript: Transcript,
    assembler: StreamingTranscriptAssembler,
    teardown: TeardownHandle,
}

impl<I, H, C> ChatView<I, H, C>
where
    I: IdentityProvider,
    H: HistoryStore,
    C: ChatBackend,
{
    /// Returns the transcript.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the identity provider.
    #[inline]
    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// Returns a handle that tears this view down.
    #[inline]
    pub fn teardown_handle(&self) -> TeardownHandle {
        self.teardown.clone()
    }

    /// Tears the view down. Pending and future operations fail with
    /// [`ErrorKind::ViewClosed`].
    #[inline]
    pub fn teardown(&self) {
        self.teardown.teardown();
    }

    /// Returns the signed-in user.
    pub async fn current_principal(&self) -> Result<Principal, Error> {
        match self.identity.current_principal().await {
            Ok(Some(principal)) => Ok(principal),
            Ok(None) => Err(authentication_missing()),
            Err(err) => {
                warn!("failed to resolve the principal: {err}");
                Err(Error::with_source(ErrorKind::AuthenticationMissing, err))
            }
        }
    }

    /// Sends a user message and streams the reply into the transcript.
    ///
    /// Blank input is ignored and yields `Ok(None)`. The user turn stays
    /// in the transcript even if the message could not be delivered, so
    /// it can be resent.
    pub async fn send_message(
        &mut self,
        text: &str,
    ) -> Result<Option<AssemblyOutcome>, Error> {
        self.check_alive()?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.close_abandoned_turn();

        self.transcript.push_user_turn(text)?;
        let credential = self.credential().await?;

        let request = ChatRequest {
            message: text.to_owned(),
            conversation_id: self.transcript.conversation_id().cloned(),
        };
        let span = debug_span!(
            "send message",
            conversation = ?request.conversation_id
        );
        let response = self
            .teardown
            .race(
                self.backend
                    .send_message(&request, &credential)
                    .instrument(span.clone()),
            )
            .await?
            .map_err(|err| {
                error!("the backend rejected the message: {err}");
                Error::with_source(ErrorKind::Backend, err)
            })?;

        let outcome = self
            .assembler
            .assemble_response(&mut self.transcript, response)
            .instrument(span)
            .await?;
        Ok(Some(outcome))
    }

    /// Fetches the conversation list of the signed-in user.
    pub async fn list_conversations(&self) -> ConversationList {
        let credential = match self.credential().await {
            Ok(credential) => credential,
            Err(err) => {
                return ConversationList {
                    conversations: vec![],
                    error: Some(err),
                };
            }
        };
        match self.history.list_conversations(&credential).await {
            Ok(conversations) => {
                debug!("fetched {} conversations", conversations.len());
                ConversationList {
                    conversations,
                    error: None,
                }
            }
            Err(err) => {
                error!("failed to fetch conversations: {err}");
                ConversationList {
                    conversations: vec![],
                    error: Some(Error::with_source(
                        ErrorKind::HistoryFetch,
                        err,
                    )),
                }
            }
        }
    }

    /// Replaces the transcript with the stored turns of `id`.
    ///
    /// If the turns cannot be fetched, the transcript is left empty but
    /// bound to `id`, and the error is returned for display. If the view
    /// is torn down before the fetch completes, the transcript is left
    /// untouched.
    pub async fn select_conversation(
        &mut self,
        id: ConversationId,
    ) -> Result<(), Error> {
        self.check_alive()?;
        self.close_abandoned_turn();
        let credential = self.credential().await?;
        let turns = self
            .teardown
            .race(self.history.list_turns(&credential, &id))
            .await?;
        match turns {
            Ok(turns) => {
                debug!("loaded {} turns of {id}", turns.len());
                self.transcript.load(id, turns);
                Ok(())
            }
            Err(err) => {
                error!("failed to fetch turns of {id}: {err}");
                self.transcript.load(id, vec![]);
                Err(Error::with_source(ErrorKind::HistoryFetch, err))
            }
        }
    }

    /// Starts a new conversation: the transcript goes back to its seeded
    /// state and the next message will not carry an identifier.
    pub fn new_conversation(&mut self) -> Result<(), Error> {
        self.check_alive()?;
        self.close_abandoned_turn();
        self.transcript.reset();
        Ok(())
    }

    async fn credential(&self) -> Result<Credential, Error> {
        match self.identity.session_token().await {
            Ok(Some(credential)) => Ok(credential),
            Ok(None) => {
                warn!("no active session found");
                Err(authentication_missing())
            }
            Err(err) => {
                warn!("failed to get the session token: {err}");
                Err(Error::with_source(ErrorKind::AuthenticationMissing, err))
            }
        }
    }

    // The view is borrowed mutably for the whole streaming call, so a turn
    // that is still open here belongs to a call whose future was dropped.
    fn close_abandoned_turn(&mut self) {
        if let Some(index) = self.transcript.close_open_turn() {
            debug!("closed turn {index} of an abandoned reply");
        }
    }

    fn check_alive(&self) -> Result<(), Error> {
        if self.teardown.is_torn_down() {
            return Err(view_closed());
        }
        Ok(())
    }
}

#[inline]
fn authentication_missing() -> Error {
    Error::new(ErrorKind::AuthenticationMissing, "no active session")
}
