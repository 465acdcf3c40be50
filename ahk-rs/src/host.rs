//! The `ahk` module exposed to scripts.
//!
//! | Script function    | Effect                                         |
//! |--------------------|------------------------------------------------|
//! | `ahk.callcmd(cmd)` | write `cmd` verbatim to the host's output      |

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::embedder::Embedder;
use crate::error::RegistrationError;

pub const MODULE: &str = "ahk";
pub const CALLCMD: &str = "callcmd";
pub const CALLCMD_SPEC: &str = "s:callcmd";
pub const CALLCMD_DESCRIPTION: &str = "Run an AutoHotkey command given by name.";

/// The script run by the example program.
pub const DEFAULT_SCRIPT: &str = "import ahk\nahk.callcmd('MsgBox')\n";

/// Build the `callcmd` handler: write the argument to `out` with no newline
/// and flush.
pub fn callcmd<W>(out: W) -> impl Fn(&[String]) -> Result<(), String> + Send + Sync + 'static
where
    W: Write + Send + 'static,
{
    let out = Mutex::new(out);
    move |args: &[String]| {
        let cmd = args.first().ok_or_else(|| "missing command".to_owned())?;
        let mut out = out.lock().map_err(|_| "output writer poisoned".to_owned())?;
        out.write_all(cmd.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| format!("cannot write command: {e}"))
    }
}

/// Register `ahk.callcmd` writing to `out`.
pub fn register<W>(embedder: &mut Embedder, out: W) -> Result<(), RegistrationError>
where
    W: Write + Send + 'static,
{
    embedder.register_native_function(MODULE, CALLCMD, CALLCMD_SPEC, CALLCMD_DESCRIPTION, callcmd(out))
}

/// In-memory writer whose contents stay readable after it has been handed to
/// [`register`].  Used by tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ScriptErrorKind};

    /// Writer that always fails.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn default_script_writes_msgbox() {
        let out = SharedBuffer::new();
        let mut emb = Embedder::new();
        register(&mut emb, out.clone()).unwrap();
        emb.run_once(DEFAULT_SCRIPT).unwrap();
        assert_eq!(out.contents(), "MsgBox");
    }

    #[test]
    fn no_newline_between_calls() {
        let out = SharedBuffer::new();
        let mut emb = Embedder::new();
        register(&mut emb, out.clone()).unwrap();
        emb.run_once("import ahk\nahk.callcmd('Msg')\nahk.callcmd('Box')").unwrap();
        assert_eq!(out.contents(), "MsgBox");
    }

    #[test]
    fn registering_twice_fails() {
        let mut emb = Embedder::new();
        register(&mut emb, SharedBuffer::new()).unwrap();
        let e = register(&mut emb, SharedBuffer::new()).unwrap_err();
        assert!(matches!(e, RegistrationError::Duplicate { .. }));
    }

    #[test]
    fn write_failure_is_native_error() {
        let mut emb = Embedder::new();
        register(&mut emb, Broken).unwrap();
        let e = emb.run_once(DEFAULT_SCRIPT).unwrap_err();
        match e {
            Error::Script(s) => {
                assert_eq!(s.kind, ScriptErrorKind::Native);
                assert!(s.message.contains("closed"), "{}", s.message);
                assert_eq!(s.line, Some(2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn description_is_visible_to_scripts() {
        let out = SharedBuffer::new();
        let mut emb = Embedder::new();
        register(&mut emb, out.clone()).unwrap();
        emb.run_once("import ahk\nahk.callcmd(ahk.callcmd.__doc__)").unwrap();
        assert_eq!(out.contents(), CALLCMD_DESCRIPTION);
    }

    #[test]
    fn deeply_nested_argument_is_syntax_error() {
        let out = SharedBuffer::new();
        let mut emb = Embedder::new();
        register(&mut emb, out.clone()).unwrap();
        let depth = 10_000;
        let src = format!("import ahk\nahk.callcmd({}'MsgBox'{})", "(".repeat(depth), ")".repeat(depth));
        match emb.run_once(&src).unwrap_err() {
            Error::Script(s) => assert_eq!(s.kind, ScriptErrorKind::Syntax),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn semicolon_separated_script() {
        let out = SharedBuffer::new();
        let mut emb = Embedder::new();
        register(&mut emb, out.clone()).unwrap();
        emb.run_once("import ahk; ahk.callcmd('MsgBox')").unwrap();
        assert_eq!(out.contents(), "MsgBox");
    }
}
