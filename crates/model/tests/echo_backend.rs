use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use ellen_chat_model::{
    BackendError, ChatBackend, ChatRequest, ChatResponse, ConversationId,
    Credential, ErrorKind, ResponseBody,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct EchoBackendError(ErrorKind);

impl Display for EchoBackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for EchoBackendError {}

impl BackendError for EchoBackendError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the input back, one word per chunk.
#[derive(Debug)]
struct EchoBody {
    words: VecDeque<String>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl EchoBody {
    fn new(input: &str) -> Self {
        let words = format!("You said {}", input)
            .split(' ')
            .map(ToString::to_string)
            .collect();
        Self { words, sleep: None }
    }
}

impl ResponseBody for EchoBody {
    type Error = EchoBackendError;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<Bytes>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            if let Some(mut word) = this.words.pop_front() {
                if !this.words.is_empty() {
                    word.push(' ');
                }
                let frame = format!("data: {{\"token\":\"{word}\"}}\n");
                return Poll::Ready(Ok(Some(Bytes::from(frame))));
            }

            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_chunk(cx)
    }
}

struct EchoBackend;

impl ChatBackend for EchoBackend {
    type Error = EchoBackendError;
    type Body = EchoBody;

    fn send_message(
        &self,
        req: &ChatRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<ChatResponse<Self::Body>, Self::Error>>
    + Send
    + 'static {
        let result = 'blk: {
            if credential.token().is_empty() {
                break 'blk Err(EchoBackendError(ErrorKind::Unauthorized));
            }
            if req.message.is_empty() {
                break 'blk Err(EchoBackendError(ErrorKind::Other));
            }

            let conversation_id = req
                .conversation_id
                .clone()
                .or_else(|| Some(ConversationId::new("echo-1")));
            Ok(ChatResponse {
                conversation_id,
                body: EchoBody::new(&req.message),
            })
        };
        ready(result)
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    #[tokio::test]
    async fn test_echo_reply() {
        let backend = EchoBackend;
        let req = ChatRequest {
            message: "Good morning".to_string(),
            conversation_id: None,
        };
        let resp = backend
            .send_message(&req, &Credential::new("token"))
            .await
            .unwrap();
        assert_eq!(resp.conversation_id, Some(ConversationId::new("echo-1")));

        let mut body = resp.body;
        let mut raw = Vec::new();
        loop {
            let chunk_fut =
                poll_fn(|cx| Pin::new(&mut body).poll_next_chunk(cx));
            match chunk_fut.await {
                Ok(Some(chunk)) => raw.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }

        let raw = String::from_utf8(raw).unwrap();
        assert_eq!(raw.lines().count(), 4);
        assert!(raw.starts_with("data: {\"token\":\"You \"}\n"));
    }

    #[tokio::test]
    async fn test_error() {
        let backend = EchoBackend;
        let req = ChatRequest {
            message: "Hi".to_string(),
            conversation_id: None,
        };
        let result = backend.send_message(&req, &Credential::new("")).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
