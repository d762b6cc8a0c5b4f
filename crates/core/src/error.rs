use std::error::Error as StdError;
use std::fmt::{self, Display};

use ellen_chat_model::BackendError;

use crate::transcript::TranscriptError;

/// The kind of error a [`crate::ChatView`] operation failed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Nobody is signed in. The caller should send the user to the login
    /// page instead of retrying.
    AuthenticationMissing,
    /// The connection broke while a reply was streaming. Text received so
    /// far has been kept.
    Transport,
    /// Listing conversations or turns failed.
    HistoryFetch,
    /// The chat backend rejected the message.
    Backend,
    /// A reply is still streaming into the transcript.
    StreamInFlight,
    /// The view has been torn down.
    ViewClosed,
}

/// Error type for the chat view and the assembler.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn BackendError>>,
}

impl Error {
    #[inline]
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    #[inline]
    pub(crate) fn with_source<E: BackendError>(
        kind: ErrorKind,
        source: E,
    ) -> Self {
        Self {
            kind,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the collaborator error that caused this one, if any.
    #[inline]
    pub fn backend_error(&self) -> Option<&dyn BackendError> {
        self.source.as_deref()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

impl From<TranscriptError> for Error {
    fn from(err: TranscriptError) -> Self {
        let kind = match err {
            TranscriptError::StreamInFlight => ErrorKind::StreamInFlight,
            // Only reachable if a turn is closed behind the assembler's back.
            TranscriptError::NoOpenTurn => ErrorKind::ViewClosed,
        };
        Self::new(kind, err.to_string())
    }
}
