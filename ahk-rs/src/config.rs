//! In-process configuration.
//!
//! The example program takes no flags, reads no environment and loads no
//! files, so configuration is a plain struct built in code.  [`Config::default`]
//! is what `main` uses.

use crate::embedder::Backend;
use crate::logger::LogLevel;
use crate::script::ScriptBackend;

/// Which interpreter implementation runs the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// The built-in front end in [`crate::script`].
    #[default]
    Builtin,
    /// Lua 5.4 via `mlua`.
    #[cfg(feature = "lua")]
    Lua,
    /// CPython via `pyo3`.
    #[cfg(feature = "python")]
    Python,
}

impl BackendKind {
    /// Construct an idle backend of this kind.
    pub fn create(self) -> Box<dyn Backend> {
        match self {
            BackendKind::Builtin => Box::new(ScriptBackend::new()),
            #[cfg(feature = "lua")]
            BackendKind::Lua => Box::new(crate::lua::LuaBackend::new()),
            #[cfg(feature = "python")]
            BackendKind::Python => Box::new(crate::python::PythonBackend::new()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub backend: BackendKind,
    pub log_level: LogLevel,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}
