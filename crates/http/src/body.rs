use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use ellen_chat_model::{ErrorKind, ResponseBody};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Chunks;

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextChunk = (Result<Option<Bytes>, crate::io::Error>, Chunks);

pin_project! {
    /// The streaming body of a chat reply.
    pub struct HttpBody {
        next_chunk_fut: Option<PinnedFuture<NextChunk>>,
    }
}

impl HttpBody {
    #[inline]
    pub(crate) fn from_chunks(chunks: Chunks) -> Self {
        Self {
            next_chunk_fut: Some(next_chunk(chunks)),
        }
    }
}

impl ResponseBody for HttpBody {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Bytes>, Self::Error>> {
        let this = self.project();
        let Some(next_chunk_fut) = this.next_chunk_fut else {
            return Poll::Ready(Ok(None));
        };
        let (chunk, chunks) = ready!(next_chunk_fut.as_mut().poll(cx));
        match chunk {
            Ok(Some(chunk)) => {
                // The connection may have more to deliver, queue the next read.
                *this.next_chunk_fut = Some(next_chunk(chunks));
                Poll::Ready(Ok(Some(chunk)))
            }
            Ok(None) => {
                *this.next_chunk_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_chunk_fut = None;
                Poll::Ready(Err(Error::new(err.0, ErrorKind::Transport)))
            }
        }
    }
}

#[inline]
fn next_chunk(mut chunks: Chunks) -> PinnedFuture<NextChunk> {
    Box::pin(async move {
        let chunk = chunks.next_chunk().await;
        (chunk, chunks)
    })
}
