//! The embedding shim: register native functions, start an interpreter, run
//! scripts against it, shut it down.
//!
//! ```text
//!   Uninitialized ──start──▶ Running ──shutdown──▶ Finalized
//! ```
//!
//! [`Embedder`] owns the interpreter instead of relying on process globals,
//! so independent sessions (in tests, for example) do not interfere.
//! `Finalized` is terminal; a new cycle needs a new `Embedder`.  Dropping a
//! running `Embedder` shuts it down.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, InitializationError, RegistrationError, ScriptError};
use crate::registry::Registry;

// ── Backend ───────────────────────────────────────────────────────────────────

/// An interpreter implementation.
///
/// `start` receives the registration table by value; the backend owns it
/// for the lifetime of the session and must release it in `shutdown`.
pub trait Backend {
    fn name(&self) -> &'static str;

    fn start(&mut self, registry: Registry) -> Result<(), InitializationError>;

    /// Execute `source` synchronously on the calling thread.
    fn run(&mut self, source: &str) -> Result<(), ScriptError>;

    fn shutdown(&mut self);
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Running,
    Finalized,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Uninitialized => "uninitialized",
            State::Running => "running",
            State::Finalized => "finalized",
        })
    }
}

// ── Embedder ──────────────────────────────────────────────────────────────────

pub struct Embedder {
    backend: Box<dyn Backend>,
    /// Pending registrations; moved into the backend at start.
    pending: Registry,
    state: State,
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedder")
            .field("backend", &self.backend.name())
            .field("pending", &self.pending.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Default for Embedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder {
    /// An embedder using the built-in front end.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self::with_backend(config.backend.create())
    }

    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend, pending: Registry::new(), state: State::Uninitialized }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Declare that calling `module_name.function_name` from a script invokes
    /// `callable` with arguments unpacked per `arg_spec` (see
    /// [`crate::registry`]).  Only allowed before the interpreter starts.
    pub fn register_native_function<F>(
        &mut self,
        module_name: &str,
        function_name: &str,
        arg_spec: &str,
        description: &str,
        callable: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&[String]) -> Result<(), String> + Send + Sync + 'static,
    {
        match self.state {
            State::Uninitialized => {}
            State::Running => {
                return Err(RegistrationError::InterpreterRunning {
                    module: module_name.to_owned(),
                    function: function_name.to_owned(),
                });
            }
            State::Finalized => {
                return Err(RegistrationError::Finalized {
                    module: module_name.to_owned(),
                    function: function_name.to_owned(),
                });
            }
        }

        self.pending
            .register(module_name, function_name, arg_spec, description, Arc::new(callable))
            .inspect_err(|e| warn!("registration rejected: {e}"))?;
        debug!(module = module_name, function = function_name, spec = arg_spec, "registered native function");
        Ok(())
    }

    /// Bring up the interpreter and install every pending registration.
    ///
    /// Starting again while running returns
    /// [`InitializationError::AlreadyRunning`]; starting a finalized handle
    /// returns [`InitializationError::Finalized`].
    pub fn start_interpreter(&mut self) -> Result<(), InitializationError> {
        match self.state {
            State::Uninitialized => {}
            State::Running => return Err(InitializationError::AlreadyRunning),
            State::Finalized => return Err(InitializationError::Finalized),
        }

        let registry = std::mem::take(&mut self.pending);
        let count = registry.len();
        if let Err(e) = self.backend.start(registry) {
            warn!(backend = self.backend.name(), "interpreter failed to start: {e}");
            // Nothing was brought up, but the registrations are gone.
            self.state = State::Finalized;
            return Err(e);
        }

        self.state = State::Running;
        info!(backend = self.backend.name(), natives = count, "interpreter started");
        Ok(())
    }

    /// Execute `source` synchronously within the running interpreter.
    pub fn run_script(&mut self, source: &str) -> Result<(), ScriptError> {
        if self.state != State::Running {
            return Err(ScriptError::not_running(self.state));
        }
        debug!(bytes = source.len(), "running script");
        self.backend
            .run(source)
            .inspect_err(|e| warn!(backend = self.backend.name(), "script failed: {e}"))
    }

    /// Release every interpreter-owned resource.  No-op unless running.
    pub fn shutdown_interpreter(&mut self) {
        match self.state {
            State::Running => {
                self.backend.shutdown();
                self.state = State::Finalized;
                info!(backend = self.backend.name(), "interpreter finalized");
            }
            other => debug!(state = %other, "shutdown ignored"),
        }
    }

    /// Start, run `source`, and shut down, whatever the outcome of the run.
    pub fn run_once(&mut self, source: &str) -> Result<(), Error> {
        self.start_interpreter()?;
        let result = self.run_script(source);
        self.shutdown_interpreter();
        result.map_err(Error::from)
    }
}

impl Drop for Embedder {
    fn drop(&mut self) {
        self.shutdown_interpreter();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptErrorKind;
    use std::sync::{Arc, Mutex};

    fn recording() -> (Embedder, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let mut emb = Embedder::new();
        emb.register_native_function("ahk", "callcmd", "s:callcmd", "", move |args: &[String]| {
            sink.lock().unwrap().push(args[0].clone());
            Ok(())
        })
        .unwrap();
        (emb, calls)
    }

    /// Backend that records lifecycle calls and can be told to fail.
    struct Probe {
        log: Arc<Mutex<Vec<&'static str>>>,
        fail_start: bool,
    }

    impl Backend for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }
        fn start(&mut self, _registry: Registry) -> Result<(), InitializationError> {
            self.log.lock().unwrap().push("start");
            if self.fail_start {
                return Err(InitializationError::Backend { backend: "probe", message: "no memory".into() });
            }
            Ok(())
        }
        fn run(&mut self, _source: &str) -> Result<(), ScriptError> {
            self.log.lock().unwrap().push("run");
            Err(ScriptError::new(ScriptErrorKind::Runtime, "raised"))
        }
        fn shutdown(&mut self) {
            self.log.lock().unwrap().push("shutdown");
        }
    }

    fn probe(fail_start: bool) -> (Embedder, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let emb = Embedder::with_backend(Box::new(Probe { log: Arc::clone(&log), fail_start }));
        (emb, log)
    }

    #[test]
    fn full_cycle() {
        let (mut emb, calls) = recording();
        assert_eq!(emb.state(), State::Uninitialized);
        emb.start_interpreter().unwrap();
        assert_eq!(emb.state(), State::Running);
        emb.run_script("import ahk\nahk.callcmd('MsgBox')\n").unwrap();
        emb.shutdown_interpreter();
        assert_eq!(emb.state(), State::Finalized);
        assert_eq!(*calls.lock().unwrap(), vec!["MsgBox"]);
    }

    #[test]
    fn run_before_start_is_not_running() {
        let (mut emb, calls) = recording();
        let e = emb.run_script("import ahk\nahk.callcmd('MsgBox')").unwrap_err();
        assert_eq!(e.kind, ScriptErrorKind::NotRunning);
        assert!(e.message.contains("uninitialized"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn shutdown_twice_is_noop() {
        let (mut emb, log) = probe(false);
        emb.start_interpreter().unwrap();
        emb.shutdown_interpreter();
        emb.shutdown_interpreter();
        assert_eq!(emb.state(), State::Finalized);
        assert_eq!(*log.lock().unwrap(), vec!["start", "shutdown"]);
    }

    #[test]
    fn shutdown_before_start_is_noop() {
        let (mut emb, log) = probe(false);
        emb.shutdown_interpreter();
        assert_eq!(emb.state(), State::Uninitialized);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn run_after_shutdown_is_not_running() {
        let (mut emb, calls) = recording();
        emb.start_interpreter().unwrap();
        emb.shutdown_interpreter();
        let e = emb.run_script("import ahk\nahk.callcmd('MsgBox')").unwrap_err();
        assert_eq!(e.kind, ScriptErrorKind::NotRunning);
        assert!(e.message.contains("finalized"));
        assert!(e.message.contains("registered modules are only importable while it runs"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn fresh_session_does_not_see_old_module() {
        let (mut emb, _calls) = recording();
        emb.run_once("import ahk").unwrap();

        let mut fresh = Embedder::new();
        fresh.start_interpreter().unwrap();
        let e = fresh.run_script("import ahk\nahk.callcmd('MsgBox')").unwrap_err();
        assert_eq!(e.kind, ScriptErrorKind::ModuleNotFound);
    }

    #[test]
    fn start_twice_fails() {
        let (mut emb, _) = recording();
        emb.start_interpreter().unwrap();
        assert_eq!(emb.start_interpreter(), Err(InitializationError::AlreadyRunning));
        assert_eq!(emb.state(), State::Running);
    }

    #[test]
    fn start_after_finalize_fails() {
        let (mut emb, _) = recording();
        emb.start_interpreter().unwrap();
        emb.shutdown_interpreter();
        assert_eq!(emb.start_interpreter(), Err(InitializationError::Finalized));
    }

    #[test]
    fn failed_start_is_terminal() {
        let (mut emb, log) = probe(true);
        let e = emb.start_interpreter().unwrap_err();
        assert!(matches!(e, InitializationError::Backend { backend: "probe", .. }));
        assert_eq!(emb.state(), State::Finalized);
        emb.shutdown_interpreter();
        assert_eq!(*log.lock().unwrap(), vec!["start"]);
    }

    #[test]
    fn duplicate_registration_fails() {
        let (mut emb, _) = recording();
        let e = emb
            .register_native_function("ahk", "callcmd", "s", "", |_: &[String]| Ok(()))
            .unwrap_err();
        assert!(matches!(e, RegistrationError::Duplicate { .. }));
    }

    #[test]
    fn register_while_running_fails() {
        let (mut emb, _) = recording();
        emb.start_interpreter().unwrap();
        let e = emb
            .register_native_function("ahk", "other", "s", "", |_: &[String]| Ok(()))
            .unwrap_err();
        assert!(matches!(e, RegistrationError::InterpreterRunning { .. }));
    }

    #[test]
    fn register_after_finalize_fails() {
        let (mut emb, _) = recording();
        emb.start_interpreter().unwrap();
        emb.shutdown_interpreter();
        let e = emb
            .register_native_function("ahk", "other", "s", "", |_: &[String]| Ok(()))
            .unwrap_err();
        assert!(matches!(e, RegistrationError::Finalized { .. }));
    }

    #[test]
    fn run_once_shuts_down_after_script_error() {
        let (mut emb, log) = probe(false);
        let e = emb.run_once("anything").unwrap_err();
        assert!(matches!(e, Error::Script(ScriptError { kind: ScriptErrorKind::Runtime, .. })));
        assert_eq!(emb.state(), State::Finalized);
        assert_eq!(*log.lock().unwrap(), vec!["start", "run", "shutdown"]);
    }

    #[test]
    fn drop_shuts_down_running_interpreter() {
        let (mut emb, log) = probe(false);
        emb.start_interpreter().unwrap();
        drop(emb);
        assert_eq!(*log.lock().unwrap(), vec!["start", "shutdown"]);
    }

    #[test]
    fn independent_sessions_do_not_interfere() {
        let (mut a, calls_a) = recording();
        let (mut b, calls_b) = recording();
        a.start_interpreter().unwrap();
        b.start_interpreter().unwrap();
        a.run_script("import ahk\nahk.callcmd('a')").unwrap();
        b.run_script("import ahk\nahk.callcmd('b')").unwrap();
        assert_eq!(*calls_a.lock().unwrap(), vec!["a"]);
        assert_eq!(*calls_b.lock().unwrap(), vec!["b"]);
    }
}
