use std::pin::Pin;
use std::task::{self, Poll};

use bytes::Bytes;

use crate::ConversationId;
use crate::provider::BackendError;

/// The streaming body of a chat reply.
pub trait ResponseBody: Sized + Send + 'static {
    /// The error type that may be returned while reading the body.
    type Error: BackendError;

    /// Attempts to pull out the next chunk of the body.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct body state:
    ///
    /// - `Poll::Pending` means that the body is still waiting for more
    ///   data. Implementations will ensure that the current task will be
    ///   notified when the next chunk may be ready.
    /// - `Poll::Ready(Ok(Some(chunk)))` means a chunk has arrived. Chunk
    ///   boundaries carry no meaning, a chunk may end in the middle of a
    ///   record or even in the middle of a character.
    /// - `Poll::Ready(Ok(None))` means the body has been exhausted.
    /// - `Poll::Ready(Err(error))` means the connection failed.
    ///
    /// Callers must not poll the body again after it returned `None` or
    /// an error.
    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<Bytes>, Self::Error>>;
}

/// The reply of the chat backend, before its body has been read.
#[derive(Debug)]
pub struct ChatResponse<B> {
    /// The conversation identifier reported by the backend, if any.
    pub conversation_id: Option<ConversationId>,
    /// The streaming body.
    pub body: B,
}
