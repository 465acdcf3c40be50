//! Embed a scripting interpreter and expose `ahk.callcmd` to it.
//!
//! See [`embedder::Embedder`] for the register → start → run → shutdown
//! lifecycle and [`host`] for the `ahk` module itself.

pub mod config;
pub mod embedder;
pub mod error;
pub mod host;
pub mod logger;
pub mod lua;
pub mod python;
pub mod registry;
pub mod script;

pub use embedder::{Backend, Embedder, State};
pub use error::{Error, InitializationError, RegistrationError, ScriptError, ScriptErrorKind};
