//! Error types for the embedding shim.
//!
//! Every failure is fatal to the current interpreter session.  The three
//! kinds line up with the three phases that can fail: registering a native
//! function, starting the interpreter, and running a script.  [`Error`]
//! wraps all of them for callers that drive a whole session at once.

use std::fmt;

// ── RegistrationError ─────────────────────────────────────────────────────────

/// The native function table was misconfigured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("native function '{module}.{function}' is already registered")]
    Duplicate { module: String, function: String },

    #[error("malformed argument spec {spec:?} for '{function}': {reason}")]
    MalformedArgSpec {
        function: String,
        spec: String,
        reason: String,
    },

    #[error("invalid {what} name {name:?}: {reason}")]
    InvalidName {
        what: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("cannot register '{module}.{function}' while the interpreter is running")]
    InterpreterRunning { module: String, function: String },

    #[error("cannot register '{module}.{function}' on a finalized interpreter")]
    Finalized { module: String, function: String },
}

// ── InitializationError ───────────────────────────────────────────────────────

/// The interpreter could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitializationError {
    #[error("interpreter is already running")]
    AlreadyRunning,

    #[error("interpreter has been finalized; create a new session to start again")]
    Finalized,

    #[error("{backend} backend failed to start: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

// ── ScriptError ───────────────────────────────────────────────────────────────

/// Classification of a script failure, named after the exception class a
/// Python-style interpreter would raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// `run_script` was called outside the `Running` state.
    NotRunning,
    Syntax,
    ModuleNotFound,
    Name,
    Attribute,
    Type,
    /// The host handler returned an error.
    Native,
    /// Anything else the backend raised.
    Runtime,
}

impl ScriptErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ScriptErrorKind::NotRunning => "NotRunningError",
            ScriptErrorKind::Syntax => "SyntaxError",
            ScriptErrorKind::ModuleNotFound => "ModuleNotFoundError",
            ScriptErrorKind::Name => "NameError",
            ScriptErrorKind::Attribute => "AttributeError",
            ScriptErrorKind::Type => "TypeError",
            ScriptErrorKind::Native => "NativeError",
            ScriptErrorKind::Runtime => "RuntimeError",
        }
    }
}

impl fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A script raised an unhandled error or referenced an unknown symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{kind}: {message}", line_prefix(.line))]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub message: String,
    /// 1-based source line, when the backend reports one.
    pub line: Option<usize>,
}

impl ScriptError {
    pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), line: None }
    }

    pub fn at(kind: ScriptErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), line: Some(line) }
    }

    /// Attach a line number unless one is already present.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub fn not_running(state: impl fmt::Display) -> Self {
        Self::new(
            ScriptErrorKind::NotRunning,
            format!(
                "interpreter is not initialized (state: {state}); registered modules are only importable while it runs"
            ),
        )
    }
}

fn line_prefix(line: &Option<usize>) -> String {
    line.map(|l| format!("line {l}: ")).unwrap_or_default()
}

// ── Error ─────────────────────────────────────────────────────────────────────

/// Any failure of a full register → start → run → shutdown session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("initialization error: {0}")]
    Initialization(#[from] InitializationError),

    #[error("script execution error: {0}")]
    Script(#[from] ScriptError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
