//! An out-of-the-box chat client wired to the Ellen chat service.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the conversation view into your own host
//! apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`ellen_chat_core`] crate.
pub mod core {
    pub use ellen_chat_core::*;
}

/// Re-exports of [`ellen_chat_http`] crate.
pub mod http {
    pub use ellen_chat_http::*;
}
