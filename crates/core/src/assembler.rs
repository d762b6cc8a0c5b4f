use std::future::{pending, poll_fn};
use std::pin::pin;
use std::sync::Arc;

use ellen_chat_model::{ChatResponse, ResponseBody};
use tokio::select;
use tokio::sync::watch;
use tracing::{Instrument, Span};

use crate::decoder::{RecordDecoder, parse_record};
use crate::error::{Error, ErrorKind};
use crate::transcript::Transcript;

/// Ties streaming work to the lifetime of the view that displays it.
///
/// Once [`TeardownHandle::teardown`] is called, every assembler created
/// from this handle stops reading at its next suspension point, and
/// refuses to start new work.
#[derive(Clone, Debug)]
pub struct TeardownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl TeardownHandle {
    /// Creates a handle for a live view.
    #[inline]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Marks the view as torn down.
    #[inline]
    pub fn teardown(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` if the view has been torn down.
    #[inline]
    pub fn is_torn_down(&self) -> bool {
        *self.tx.borrow()
    }

    #[inline]
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Runs `fut` until it completes or the view is torn down, whichever
    /// comes first.
    pub(crate) async fn race<F: Future>(
        &self,
        fut: F,
    ) -> Result<F::Output, Error> {
        let mut rx = Some(self.subscribe());
        select! {
            biased;

            _ = wait_teardown(&mut rx) => Err(view_closed()),
            output = fut => Ok(output),
        }
    }
}

impl Default for TeardownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// How a streaming call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamEnd {
    /// The body was read to its end.
    Exhausted,
    /// The owning view was torn down while reading.
    Cancelled,
}

/// Summary of one streaming call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssemblyOutcome {
    /// Index of the assistant turn that received the text.
    pub turn: usize,
    /// Number of non-empty tokens appended.
    pub tokens: usize,
    /// Number of records skipped because their payload was malformed.
    pub malformed: usize,
    /// How the call ended.
    pub end: StreamEnd,
}

impl AssemblyOutcome {
    /// Returns `true` if the reply carried no text at all, which callers
    /// may want to report as a soft failure.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens == 0
    }
}

/// Streams a reply body into the last turn of a [`Transcript`].
///
/// Each call opens a new assistant turn, appends every token as soon as
/// the chunk carrying it has been decoded, and closes the turn when the
/// body ends. Records with a malformed payload are logged and skipped.
#[derive(Debug)]
pub struct StreamingTranscriptAssembler {
    teardown: Option<TeardownHandle>,
    span: Span,
}

impl StreamingTranscriptAssembler {
    /// Creates an assembler that logs under the current span.
    #[inline]
    pub fn new() -> Self {
        Self {
            teardown: None,
            span: Span::current(),
        }
    }

    /// Stops reading when the given handle is torn down.
    #[inline]
    pub fn with_teardown(mut self, teardown: TeardownHandle) -> Self {
        self.teardown = Some(teardown);
        self
    }

    /// Records diagnostics of every call under `span`.
    #[inline]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Binds the conversation identifier carried by `response`, then
    /// streams its body.
    ///
    /// The identifier is only taken if the transcript does not have one.
    pub async fn assemble_response<B: ResponseBody>(
        &self,
        transcript: &mut Transcript,
        response: ChatResponse<B>,
    ) -> Result<AssemblyOutcome, Error> {
        self.check_alive()?;
        let ChatResponse {
            conversation_id,
            body,
        } = response;
        if let Some(id) = conversation_id {
            if transcript.bind_conversation_id(id.clone()) {
                debug!("bound conversation {id}");
            } else {
                trace!("ignored conversation id {id}");
            }
        }
        self.assemble(transcript, body).await
    }

    /// Streams `body` into a new assistant turn.
    ///
    /// # Cancel safety
    ///
    /// Dropping the returned future stops reading immediately. The turn
    /// keeps the text received so far, but stays open; callers that keep
    /// using the transcript should tear down through a
    /// [`TeardownHandle`] instead.
    pub async fn assemble<B: ResponseBody>(
        &self,
        transcript: &mut Transcript,
        body: B,
    ) -> Result<AssemblyOutcome, Error> {
        self.check_alive()?;
        let turn = transcript.open_assistant_turn()?;
        let span = debug_span!(parent: &self.span, "assemble", turn);
        self.read_loop(transcript, body, turn)
            .instrument(span)
            .await
    }

    async fn read_loop<B: ResponseBody>(
        &self,
        transcript: &mut Transcript,
        body: B,
        turn: usize,
    ) -> Result<AssemblyOutcome, Error> {
        let mut cancel_rx = self.teardown.as_ref().map(TeardownHandle::subscribe);
        let mut body = pin!(body);
        let mut decoder = RecordDecoder::new();
        let mut records = Vec::new();
        let mut outcome = AssemblyOutcome {
            turn,
            tokens: 0,
            malformed: 0,
            end: StreamEnd::Exhausted,
        };

        trace!("start reading");

        loop {
            let chunk = select! {
                biased;

                _ = wait_teardown(&mut cancel_rx) => {
                    outcome.end = StreamEnd::Cancelled;
                    break;
                }
                chunk = poll_fn(|cx| body.as_mut().poll_next_chunk(cx)) => chunk,
            };
            let chunk = match chunk {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => {
                    error!("reply stream failed: {err}");
                    transcript.close_open_turn();
                    return Err(Error::with_source(ErrorKind::Transport, err));
                }
            };
            trace!("got a chunk of {} bytes", chunk.len());

            decoder.feed(&chunk, &mut records);
            for record in records.drain(..) {
                match parse_record(&record) {
                    Ok(Some(token)) if !token.is_empty() => {
                        transcript.append_to_open_turn(&token)?;
                        outcome.tokens += 1;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("skipped record {record:?}: {err}");
                        outcome.malformed += 1;
                    }
                }
            }
        }

        match outcome.end {
            StreamEnd::Exhausted => {
                let leftover = decoder.buffered_len();
                if leftover > 0 {
                    debug!("dropped {leftover} bytes of an unterminated record");
                }
                transcript.close_open_turn();
            }
            StreamEnd::Cancelled => {
                debug!("view torn down, stop reading");
                transcript.close_open_turn_silently();
            }
        }

        if outcome.is_empty() {
            warn!("reply ended without any text");
        }
        trace!("finished: {outcome:?}");
        Ok(outcome)
    }

    fn check_alive(&self) -> Result<(), Error> {
        match &self.teardown {
            Some(teardown) if teardown.is_torn_down() => Err(view_closed()),
            _ => Ok(()),
        }
    }
}

impl Default for StreamingTranscriptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
pub(crate) fn view_closed() -> Error {
    Error::new(ErrorKind::ViewClosed, "the view is torn down")
}

async fn wait_teardown(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        // A dropped sender means the view is gone as well.
        Some(rx) => {
            rx.wait_for(|torn_down| *torn_down).await.ok();
        }
        None => pending().await,
    }
}
