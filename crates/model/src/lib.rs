//! Shared vocabulary for the chat client and its external collaborators.
//!
//! The chat client delegates authentication, history storage and reply
//! generation to remote services. This crate describes the data those
//! services exchange with the client, and the traits an implementation
//! of each service has to provide.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. The HTTP adapters
//! and the in-memory fakes used by tests live in their own crates.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;
mod turn;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
pub use turn::*;
