//! A conversational assistant that answers questions with the help of
//! web search.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the assistant into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;
pub mod settings;
pub mod tools;

pub use session::{Session, SessionBuilder};
pub use settings::{Settings, SettingsError};

/// Re-exports of [`lookout_core`] crate.
pub mod core {
    pub use lookout_core::*;
}
