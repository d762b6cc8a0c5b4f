//! Local fake collaborators for testing purpose.

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use ellen_chat_model::{
    BackendError, ChatBackend, ChatRequest, ChatResponse, ConversationId,
    ConversationSummary, Credential, ErrorKind, HistoryStore,
    IdentityProvider, Principal, ResponseBody, Turn,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A reply body that replays preset chunks.
///
/// Unlike a real connection, the body keeps delivering the chunks that
/// follow a [`PresetChunk::End`] if it is polled again, which lets tests
/// check that readers stop at the end.
#[derive(Debug)]
pub struct PresetBody {
    chunks: VecDeque<PresetChunk>,
    delay: Option<Duration>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl PresetBody {
    #[inline]
    pub fn new(chunks: impl Into<VecDeque<PresetChunk>>) -> Self {
        Self {
            chunks: chunks.into(),
            delay: None,
            sleep: None,
        }
    }

    /// Waits `delay` before delivering each chunk.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl ResponseBody for PresetBody {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Bytes>, Self::Error>> {
        let this = self.get_mut();

        if let Some(delay) = this.delay {
            let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
        }

        let chunk = match this.chunks.pop_front() {
            Some(PresetChunk::Bytes(bytes)) => Ok(Some(Bytes::from(bytes))),
            Some(PresetChunk::Fail(message)) => {
                Err(Error::new(message, ErrorKind::Transport))
            }
            Some(PresetChunk::End) | None => Ok(None),
        };
        Poll::Ready(chunk)
    }
}

/// A local fake chat backend.
///
/// Before sending requests, you need to setup the script, which is how the
/// backend should respond to each request, in order. If there are no
/// enough responses in the script, an error will be returned. Every
/// request is recorded and can be inspected with [`TestBackend::requests`].
///
/// Clones share the same script and records.
#[derive(Clone, Default)]
pub struct TestBackend {
    script: Arc<Mutex<VecDeque<PresetResponse>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    delay: Option<Duration>,
    header_delay: Option<Duration>,
}

impl TestBackend {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        lock(&self.script).push_back(preset);
    }

    /// Sets the delay before each body chunk.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Sets the delay before the response headers arrive.
    #[inline]
    pub fn set_header_delay(&mut self, duration: Duration) {
        self.header_delay = Some(duration);
    }

    /// Returns the requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }
}

impl ChatBackend for TestBackend {
    type Error = crate::Error;
    type Body = PresetBody;

    fn send_message(
        &self,
        req: &ChatRequest,
        _credential: &Credential,
    ) -> impl Future<Output = Result<ChatResponse<Self::Body>, Self::Error>>
    + Send
    + 'static {
        lock(&self.requests).push(req.clone());

        let result = 'blk: {
            let Some(preset) = lock(&self.script).pop_front() else {
                break 'blk Err(Error::new(
                    "no enough responses",
                    ErrorKind::Other,
                ));
            };
            if let Some(kind) = preset.rejection {
                break 'blk Err(Error::new("request rejected", kind));
            }

            let mut body = PresetBody::new(preset.chunks);
            if let Some(delay) = self.delay {
                body = body.with_delay(delay);
            }
            Ok(ChatResponse {
                conversation_id: preset.conversation_id.map(ConversationId::new),
                body,
            })
        };
        delayed(self.header_delay, result)
    }
}

/// A local fake history store.
#[derive(Clone, Default)]
pub struct TestHistory {
    conversations: Vec<ConversationSummary>,
    turns: HashMap<ConversationId, Vec<Turn>>,
    failing: bool,
    delay: Option<Duration>,
}

impl TestHistory {
    /// Adds a stored conversation.
    pub fn add_conversation<S: Into<String>>(
        &mut self,
        id: &str,
        preview: S,
        turns: Vec<Turn>,
    ) {
        let id = ConversationId::new(id);
        self.conversations.push(ConversationSummary {
            id: id.clone(),
            preview: preview.into(),
        });
        self.turns.insert(id, turns);
    }

    /// Makes every request fail.
    #[inline]
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Sets the delay before every response.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }
}

impl HistoryStore for TestHistory {
    type Error = crate::Error;

    fn list_conversations(
        &self,
        _credential: &Credential,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>>
    + Send
    + 'static {
        let result = if self.failing {
            Err(Error::new("history unavailable", ErrorKind::Transport))
        } else {
            Ok(self.conversations.clone())
        };
        delayed(self.delay, result)
    }

    fn list_turns(
        &self,
        _credential: &Credential,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Turn>, Self::Error>> + Send + 'static
    {
        let result = if self.failing {
            Err(Error::new("history unavailable", ErrorKind::Transport))
        } else {
            self.turns.get(id).cloned().ok_or_else(|| {
                Error::new("conversation not found", ErrorKind::InvalidResponse)
            })
        };
        delayed(self.delay, result)
    }
}

/// A local fake identity provider.
#[derive(Clone, Debug, Default)]
pub struct TestIdentity {
    session: Option<(Principal, Credential)>,
}

impl TestIdentity {
    /// Creates a provider with a signed-in user.
    pub fn signed_in(user_id: &str, token: &str) -> Self {
        let principal = Principal {
            id: user_id.to_owned(),
            email: Some(format!("{user_id}@example.com")),
        };
        Self {
            session: Some((principal, Credential::new(token))),
        }
    }

    /// Creates a provider where nobody is signed in.
    #[inline]
    pub fn signed_out() -> Self {
        Self::default()
    }
}

impl IdentityProvider for TestIdentity {
    type Error = crate::Error;

    fn current_principal(
        &self,
    ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'static
    {
        ready(Ok(self.session.as_ref().map(|(principal, _)| principal.clone())))
    }

    fn session_token(
        &self,
    ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + 'static
    {
        ready(Ok(self
            .session
            .as_ref()
            .map(|(_, credential)| credential.clone())))
    }
}

async fn delayed<T>(delay: Option<Duration>, value: T) -> T {
    if let Some(delay) = delay {
        sleep(delay).await;
    }
    value
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panicking test may poison the lock; the data is still usable.
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    async fn collect_body(body: PresetBody) -> Result<Vec<u8>, Error> {
        let mut body = pin!(body);
        let mut raw = Vec::new();
        while let Some(chunk) =
            poll_fn(|cx| body.as_mut().poll_next_chunk(cx)).await?
        {
            raw.extend_from_slice(&chunk);
        }
        Ok(raw)
    }

    #[tokio::test]
    async fn test_send_message() {
        let mut backend = TestBackend::default();
        backend.add_response(
            PresetResponse::with_tokens(["Hello, ", "world!"])
                .with_conversation_id("c-1"),
        );
        backend.add_response(PresetResponse::rejected(ErrorKind::Unauthorized));

        let req = ChatRequest {
            message: "Hi".to_owned(),
            conversation_id: None,
        };
        let credential = Credential::new("token");
        let resp = backend.send_message(&req, &credential).await.unwrap();
        assert_eq!(resp.conversation_id, Some(ConversationId::new("c-1")));
        let raw = collect_body(resp.body).await.unwrap();
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            "data: {\"token\":\"Hello, \"}\ndata: {\"token\":\"world!\"}\n"
        );

        let err = backend.send_message(&req, &credential).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = backend.send_message(&req, &credential).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(backend.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_body_failure() {
        let body = PresetBody::new(vec![
            PresetChunk::text("data: {}\n"),
            PresetChunk::Fail("reset".to_owned()),
        ]);
        let err = collect_body(body).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_history() {
        let mut history = TestHistory::default();
        history.add_conversation("c-1", "Hi", vec![Turn::user("Hi")]);
        let credential = Credential::new("token");

        let list = history.list_conversations(&credential).await.unwrap();
        assert_eq!(list.len(), 1);
        let turns = history
            .list_turns(&credential, &ConversationId::new("c-1"))
            .await
            .unwrap();
        assert_eq!(turns, vec![Turn::user("Hi")]);

        history.set_failing(true);
        assert!(history.list_conversations(&credential).await.is_err());
    }
}
