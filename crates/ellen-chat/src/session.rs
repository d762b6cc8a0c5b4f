use ellen_chat_core::{
    AssemblyOutcome, ChatView, ChatViewBuilder, ConversationList, Error,
    TeardownHandle, Transcript, TranscriptEvent,
};
use ellen_chat_http::{
    BackendConfig, HttpBackend, SupabaseConfig, SupabaseIdentity,
};
use ellen_chat_model::{ConversationId, Principal, Speaker};

type HttpView = ChatView<SupabaseIdentity, HttpBackend, HttpBackend>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    view_builder: ChatViewBuilder<SupabaseIdentity, HttpBackend, HttpBackend>,
}

impl SessionBuilder {
    /// Creates a session builder talking to the given chat service and
    /// identity project.
    pub fn with_configs(backend: BackendConfig, identity: SupabaseConfig) -> Self {
        let backend = HttpBackend::new(backend);
        let identity = SupabaseIdentity::new(identity);
        let view_builder =
            ChatViewBuilder::new(identity, backend.clone(), backend);
        Self { view_builder }
    }

    /// Sets the assistant greeting a new conversation starts with.
    #[inline]
    pub fn with_greeting<S: Into<String>>(mut self, greeting: S) -> Self {
        self.view_builder = self.view_builder.with_greeting(greeting);
        self
    }

    /// Attaches a callback to be invoked after every transcript change.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&Transcript, &TranscriptEvent) + Send + Sync + 'static,
    ) -> Self {
        self.view_builder = self.view_builder.on_event(on_event);
        self
    }

    /// Attaches a callback to be invoked with every piece of assistant text
    /// as it streams in.
    ///
    /// The session keeps one callback, so this replaces the one set by
    /// [`SessionBuilder::on_event`] and vice versa.
    #[inline]
    pub fn on_text(
        mut self,
        on_text: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.view_builder =
            self.view_builder.on_event(move |transcript, event| {
                let TranscriptEvent::TextAppended { index, delta } = event
                else {
                    return;
                };
                let is_assistant = transcript
                    .turns()
                    .get(*index)
                    .is_some_and(|turn| turn.speaker == Speaker::Assistant);
                if is_assistant {
                    on_text(delta);
                }
            });
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        Session {
            view: self.view_builder.build(),
        }
    }
}

/// A chat session, like a window that displays a transcript and has an
/// input box.
///
/// The session holds a fully configured conversation view, and it is
/// basically a wrapper around [`ChatView`].
pub struct Session {
    view: HttpView,
}

impl Session {
    /// Returns the transcript on display.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        self.view.transcript()
    }

    /// Returns a handle that ends the session from another task.
    #[inline]
    pub fn teardown_handle(&self) -> TeardownHandle {
        self.view.teardown_handle()
    }

    /// Returns the signed-in user.
    #[inline]
    pub async fn current_principal(&self) -> Result<Principal, Error> {
        self.view.current_principal().await
    }

    /// Sends a message and streams the reply into the transcript.
    #[inline]
    pub async fn send_message(
        &mut self,
        message: &str,
    ) -> Result<Option<AssemblyOutcome>, Error> {
        self.view.send_message(message).await
    }

    /// Fetches the stored conversations.
    #[inline]
    pub async fn list_conversations(&self) -> ConversationList {
        self.view.list_conversations().await
    }

    /// Opens a stored conversation.
    pub async fn open_conversation(&mut self, id: &str) -> Result<(), Error> {
        debug!("opening conversation {id}");
        self.view.select_conversation(ConversationId::new(id)).await
    }

    /// Starts over with an empty conversation.
    #[inline]
    pub fn new_conversation(&mut self) -> Result<(), Error> {
        self.view.new_conversation()
    }

    /// Signs the user out and clears the transcript.
    ///
    /// The session stays usable, but sending messages fails with
    /// [`ellen_chat_core::ErrorKind::AuthenticationMissing`] from now on.
    pub async fn sign_out(&mut self) -> Result<(), ellen_chat_http::Error> {
        let result = self.view.identity().sign_out().await;
        if let Err(err) = self.view.new_conversation() {
            debug!("transcript not cleared: {err}");
        }
        result
    }
}
