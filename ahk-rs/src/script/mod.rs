//! Built-in script front end: the default backend.
//!
//! A small Python-flavoured statement language: imports, assignments,
//! attribute access and calls.  It is enough to run the `ahk` script
//! contract and to exercise every native-call error path without linking an
//! external runtime.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use ahk::registry::Registry;
//! use ahk::script::Interpreter;
//!
//! let seen = Arc::new(Mutex::new(String::new()));
//! let sink = Arc::clone(&seen);
//! let mut reg = Registry::new();
//! reg.register("ahk", "callcmd", "s:callcmd", "", Arc::new(move |args: &[String]| {
//!     sink.lock().unwrap().push_str(&args[0]);
//!     Ok(())
//! })).unwrap();
//!
//! let mut interp = Interpreter::new(&reg);
//! interp.exec_script("import ahk\nahk.callcmd('MsgBox')\n").unwrap();
//! assert_eq!(*seen.lock().unwrap(), "MsgBox");
//! ```

pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use interp::Interpreter;
pub use value::Value;

use crate::embedder::Backend;
use crate::error::{InitializationError, ScriptError};
use crate::registry::Registry;

/// [`Backend`] running scripts on the built-in [`Interpreter`].
#[derive(Debug, Default)]
pub struct ScriptBackend {
    interp: Option<Interpreter>,
}

impl ScriptBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for ScriptBackend {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn start(&mut self, registry: Registry) -> Result<(), InitializationError> {
        self.interp = Some(Interpreter::new(&registry));
        Ok(())
    }

    fn run(&mut self, source: &str) -> Result<(), ScriptError> {
        match self.interp.as_mut() {
            Some(interp) => interp.exec_script(source),
            None => Err(ScriptError::not_running("no interpreter")),
        }
    }

    fn shutdown(&mut self) {
        self.interp = None;
    }
}
