//! The ordered list of turns displayed by a conversation view.

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};

use ellen_chat_model::{ConversationId, Speaker, Turn};

type Listener = Box<dyn Fn(&Transcript, &TranscriptEvent) + Send + Sync>;

/// A change applied to a [`Transcript`].
///
/// Listeners receive events synchronously, right after the change has been
/// applied, so the transcript they are handed already reflects it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// A turn was appended at `index`.
    TurnAppended {
        /// Position of the new turn.
        index: usize,
        /// Author of the new turn.
        speaker: Speaker,
    },
    /// Text was appended to the open turn.
    TextAppended {
        /// Position of the open turn.
        index: usize,
        /// The appended text.
        delta: String,
    },
    /// The open turn stopped receiving text.
    TurnClosed {
        /// Position of the closed turn.
        index: usize,
    },
    /// The conversation identifier was assigned.
    ConversationBound(ConversationId),
    /// The transcript went back to its seeded state.
    Reset,
    /// Stored turns of a conversation replaced the content.
    Loaded,
}

/// Error returned when a mutation does not fit the transcript's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptError {
    /// An assistant turn is still receiving text.
    StreamInFlight,
    /// There is no open turn to append to.
    NoOpenTurn,
}

impl Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamInFlight => f.write_str("a reply is still streaming"),
            Self::NoOpenTurn => f.write_str("no turn is open for streaming"),
        }
    }
}

impl StdError for TranscriptError {}

/// Represents the turns of one conversation, as shown to the user.
///
/// At most one assistant turn is open at any time. The open turn is
/// always the last one, and its text only grows until it gets closed.
/// Closed turns are never modified again.
#[derive(Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    open_turn: Option<usize>,
    conversation_id: Option<ConversationId>,
    greeting: Option<String>,
    listener: Option<Listener>,
}

impl Transcript {
    /// Creates an empty transcript.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcript seeded with an assistant greeting.
    ///
    /// The greeting is restored every time the transcript is reset.
    pub fn with_greeting<S: Into<String>>(greeting: S) -> Self {
        let greeting = greeting.into();
        Self {
            turns: vec![Turn::assistant(greeting.clone())],
            greeting: Some(greeting),
            ..Self::default()
        }
    }

    /// Attaches a callback to be invoked after every change.
    #[inline]
    pub fn set_listener(
        &mut self,
        listener: impl Fn(&Transcript, &TranscriptEvent) + Send + Sync + 'static,
    ) {
        self.listener = Some(Box::new(listener));
    }

    /// Returns all turns, oldest first.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the most recent turn.
    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the conversation identifier, if one has been assigned.
    #[inline]
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// Returns `true` while an assistant turn is receiving text.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.open_turn.is_some()
    }

    /// Returns the index of the open turn.
    #[inline]
    pub fn open_turn(&self) -> Option<usize> {
        self.open_turn
    }

    /// Appends a user turn.
    pub fn push_user_turn<S: Into<String>>(
        &mut self,
        text: S,
    ) -> Result<usize, TranscriptError> {
        if self.open_turn.is_some() {
            return Err(TranscriptError::StreamInFlight);
        }
        Ok(self.push(Turn::user(text)))
    }

    /// Appends an empty assistant turn and opens it for streaming.
    pub fn open_assistant_turn(&mut self) -> Result<usize, TranscriptError> {
        if self.open_turn.is_some() {
            return Err(TranscriptError::StreamInFlight);
        }
        let index = self.turns.len();
        self.turns.push(Turn::assistant(""));
        self.open_turn = Some(index);
        self.notify(TranscriptEvent::TurnAppended {
            index,
            speaker: Speaker::Assistant,
        });
        Ok(index)
    }

    /// Appends text to the open turn.
    ///
    /// Appending an empty string is a no-op and produces no event.
    pub fn append_to_open_turn(
        &mut self,
        delta: &str,
    ) -> Result<(), TranscriptError> {
        let Some(index) = self.open_turn else {
            return Err(TranscriptError::NoOpenTurn);
        };
        if delta.is_empty() {
            return Ok(());
        }
        self.turns[index].text.push_str(delta);
        self.notify(TranscriptEvent::TextAppended {
            index,
            delta: delta.to_owned(),
        });
        Ok(())
    }

    /// Closes the open turn, returning its index.
    pub fn close_open_turn(&mut self) -> Option<usize> {
        let index = self.close_open_turn_silently()?;
        self.notify(TranscriptEvent::TurnClosed { index });
        Some(index)
    }

    /// Closes the open turn without telling the listener. Used once the
    /// owning view is gone.
    pub(crate) fn close_open_turn_silently(&mut self) -> Option<usize> {
        self.open_turn.take()
    }

    /// Assigns the conversation identifier.
    ///
    /// An identifier is assigned at most once. Returns `false` and leaves
    /// the transcript untouched if it already has one.
    pub fn bind_conversation_id(&mut self, id: ConversationId) -> bool {
        if self.conversation_id.is_some() {
            return false;
        }
        self.conversation_id = Some(id.clone());
        self.notify(TranscriptEvent::ConversationBound(id));
        true
    }

    /// Goes back to the seeded state: the greeting (if any), no identifier
    /// and no open turn.
    pub fn reset(&mut self) {
        self.turns.clear();
        if let Some(greeting) = &self.greeting {
            self.turns.push(Turn::assistant(greeting.clone()));
        }
        self.open_turn = None;
        self.conversation_id = None;
        self.notify(TranscriptEvent::Reset);
    }

    /// Replaces the content with the stored turns of a conversation.
    pub fn load(&mut self, id: ConversationId, turns: Vec<Turn>) {
        self.turns = turns;
        self.open_turn = None;
        self.conversation_id = Some(id);
        self.notify(TranscriptEvent::Loaded);
    }

    fn push(&mut self, turn: Turn) -> usize {
        let index = self.turns.len();
        let speaker = turn.speaker;
        self.turns.push(turn);
        self.notify(TranscriptEvent::TurnAppended { index, speaker });
        index
    }

    #[inline]
    fn notify(&self, event: TranscriptEvent) {
        if let Some(listener) = &self.listener {
            listener(self, &event);
        }
    }
}

impl Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("turns", &self.turns)
            .field("open_turn", &self.open_turn)
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}
