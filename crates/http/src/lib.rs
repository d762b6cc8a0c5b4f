//! HTTP collaborators: the chat service client and a Supabase-style
//! identity provider.

#[macro_use]
extern crate tracing;

mod body;
mod config;
mod identity;
mod io;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use ellen_chat_model::{
    BackendError, ChatBackend, ChatRequest, ChatResponse, ConversationId,
    ConversationSummary, Credential, ErrorKind, HistoryStore, Turn,
};
use mime::Mime;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use tracing::Instrument;

pub use body::HttpBody;
pub use config::{
    BackendConfig, BackendConfigBuilder, SupabaseConfig, SupabaseConfigBuilder,
};
pub use identity::SupabaseIdentity;
use io::Chunks;
use proto::{ChatRequestBody, MessageRecord, SessionRecord};

/// Error type for the HTTP collaborators.
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

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = match err.status() {
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                ErrorKind::Unauthorized
            }
            Some(_) => ErrorKind::Other,
            None if err.is_decode() => ErrorKind::InvalidResponse,
            None => ErrorKind::Transport,
        };
        Self::new(format!("{err}"), kind)
    }
}

/// Client of the chat service, serving both replies and stored history.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: Arc<BackendConfig>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given configuration.
    #[inline]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn get(
        &self,
        segments: &[&str],
        credential: &Credential,
    ) -> Result<RequestBuilder, Error> {
        let url = endpoint(&self.config.base_url, segments)?;
        Ok(self
            .client
            .get(url)
            .header(header::AUTHORIZATION, credential.bearer())
            .header(header::ACCEPT, "application/json"))
    }
}

impl ChatBackend for HttpBackend {
    type Error = Error;
    type Body = HttpBody;

    fn send_message(
        &self,
        req: &ChatRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<ChatResponse<Self::Body>, Self::Error>>
    + Send
    + 'static {
        let req = endpoint(&self.config.base_url, &["chat"]).map(|url| {
            self.client
                .post(url)
                .header(header::AUTHORIZATION, credential.bearer())
                .header(header::ACCEPT, "text/event-stream")
                .json(&ChatRequestBody::from(req))
        });
        let config = Arc::clone(&self.config);

        async move {
            let resp = req?
                .send()
                .await
                .and_then(Response::error_for_status)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    m.essence_str() == mime::TEXT_EVENT_STREAM.essence_str()
                })
                .unwrap_or(false);
            if !is_event_stream {
                warn!("unexpected content type of the reply: {content_type:?}");
            }

            let conversation_id = resp
                .headers()
                .get(config.session_header.as_str())
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(ConversationId::new);
            debug!("reply started, conversation: {conversation_id:?}");

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            Ok(ChatResponse {
                conversation_id,
                body: HttpBody::from_chunks(chunks),
            })
        }
        .instrument(debug_span!("http request", route = "POST /chat"))
    }
}

impl HistoryStore for HttpBackend {
    type Error = Error;

    fn list_conversations(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>>
    + Send
    + 'static {
        let req = self.get(&["sessions"], credential);
        async move {
            let records: Vec<SessionRecord> = fetch_json(req?).await?;
            Ok(records.into_iter().map(ConversationSummary::from).collect())
        }
        .instrument(debug_span!("http request", route = "GET /sessions"))
    }

    fn list_turns(
        &self,
        credential: &Credential,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Turn>, Self::Error>> + Send + 'static
    {
        let req = self.get(&["sessions", id.as_str(), "messages"], credential);
        async move {
            let records: Vec<MessageRecord> = fetch_json(req?).await?;
            Ok(records.into_iter().map(Turn::from).collect())
        }
        .instrument(debug_span!(
            "http request",
            route = "GET /sessions/{id}/messages",
            conversation = %id
        ))
    }
}

/// Appends percent-encoded path segments to `base_url`.
pub(crate) fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, Error> {
    let mut url = Url::parse(base_url).map_err(|err| {
        Error::new(format!("invalid URL {base_url:?}: {err}"), ErrorKind::Other)
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            Error::new(
                format!("URL {base_url:?} cannot be a base"),
                ErrorKind::Other,
            )
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    req: RequestBuilder,
) -> Result<T, Error> {
    let resp = req.send().await.and_then(Response::error_for_status)?;
    let value = resp.json::<T>().await?;
    Ok(value)
}
