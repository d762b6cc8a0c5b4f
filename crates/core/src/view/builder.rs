use ellen_chat_model::{ChatBackend, HistoryStore, IdentityProvider};
use tracing::Span;

use super::ChatView;
use crate::assembler::{StreamingTranscriptAssembler, TeardownHandle};
use crate::transcript::{Transcript, TranscriptEvent};

pub(crate) const DEFAULT_GREETING: &str = "Hello! How can I help you today?";

type Listener = Box<dyn Fn(&Transcript, &TranscriptEvent) + Send + Sync>;

/// [`ChatView`] builder.
pub struct ChatViewBuilder<I, H, C> {
    identity: I,
    history: H,
    backend: C,
    greeting: Option<String>,
    listener: Option<Listener>,
    span: Option<Span>,
}

impl<I, H, C> ChatViewBuilder<I, H, C>
where
    I: IdentityProvider,
    H: HistoryStore,
    C: ChatBackend,
{
    /// Creates a new builder with the specified collaborators.
    #[inline]
    pub fn new(identity: I, history: H, backend: C) -> Self {
        Self {
            identity,
            history,
            backend,
            greeting: Some(DEFAULT_GREETING.to_owned()),
            listener: None,
            span: None,
        }
    }

    /// Sets the assistant greeting a new conversation starts with.
    #[inline]
    pub fn with_greeting<S: Into<String>>(mut self, greeting: S) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Starts new conversations with an empty transcript.
    #[inline]
    pub fn without_greeting(mut self) -> Self {
        self.greeting = None;
        self
    }

    /// Attaches a callback to be invoked after every transcript change.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&Transcript, &TranscriptEvent) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Box::new(on_event));
        self
    }

    /// Records streaming diagnostics under `span`.
    #[inline]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Builds the view.
    pub fn build(self) -> ChatView<I, H, C> {
        let Self {
            identity,
            history,
            backend,
            greeting,
            listener,
            span,
        } = self;

        let mut transcript = match greeting {
            Some(greeting) => Transcript::with_greeting(greeting),
            None => Transcript::new(),
        };
        if let Some(listener) = listener {
            transcript.set_listener(listener);
        }

        let teardown = TeardownHandle::new();
        let assembler = StreamingTranscriptAssembler::new()
            .with_teardown(teardown.clone())
            .with_span(span.unwrap_or_else(|| debug_span!("chat view")));

        ChatView {
            identity,
            history,
            backend,
            transcript,
            assembler,
            teardown,
        }
    }
}
