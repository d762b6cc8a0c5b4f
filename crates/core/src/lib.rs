//! Core logic of the chat client: the transcript, the streaming reply
//! assembler, and the conversation view that drives them.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod assembler;
mod decoder;
mod error;
pub mod transcript;
mod view;

pub use assembler::{
    AssemblyOutcome, StreamEnd, StreamingTranscriptAssembler, TeardownHandle,
};
pub use decoder::EVENT_PREFIX;
pub use error::{Error, ErrorKind};
pub use transcript::{Transcript, TranscriptError, TranscriptEvent};
pub use view::{ChatView, ChatViewBuilder, ConversationList};
