//! Optional CPython backend via the `pyo3` crate.
//!
//! Enabled with the `python` Cargo feature:
//! ```text
//! cargo build --features python
//! cargo test  --features python
//! ```
//!
//! Registered modules are built at start and inserted into `sys.modules`,
//! so the fixed script runs verbatim:
//!
//! ```python
//! import ahk
//! ahk.callcmd('MsgBox')
//! ```
//!
//! CPython is initialised at most once per process and cannot be
//! re-initialised, so shutdown is a logical finalize: the modules leave
//! `sys.modules`, user names are cleared from `__main__`, and the native
//! functions are detached.  Only one session may hold the interpreter at a
//! time.

#[cfg(feature = "python")]
pub use python_impl::PythonBackend;

#[cfg(feature = "python")]
mod python_impl {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, OnceLock};

    use pyo3::exceptions::{
        PyAttributeError, PyModuleNotFoundError, PyNameError, PyRuntimeError, PySyntaxError,
        PyTypeError,
    };
    use pyo3::prelude::*;
    use pyo3::types::{PyDict, PyString, PyTuple};
    use tracing::warn;

    pyo3::create_exception!(ahk, NativeError, PyRuntimeError, "A host function reported a failure.");

    use crate::embedder::Backend;
    use crate::error::{InitializationError, ScriptError, ScriptErrorKind};
    use crate::registry::Registry;

    // ── Shared state accessed by the #[pyfunction] ────────────────────────

    static STATE: Mutex<Option<Arc<Registry>>> = Mutex::new(None);
    static PYTHON_INIT: OnceLock<()> = OnceLock::new();
    /// Set while a session owns the interpreter.
    static ACTIVE: AtomicBool = AtomicBool::new(false);

    fn current_registry() -> Option<Arc<Registry>> {
        STATE.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// `_ahk_dispatch(module, name, *args)`: route a script call to the
    /// registered handler.
    #[pyfunction]
    #[pyo3(name = "dispatch", signature = (module, name, *args))]
    fn ahk_dispatch(module: &str, name: &str, args: &Bound<'_, PyTuple>) -> PyResult<()> {
        // Clone the Arc out so the handler runs without holding STATE.
        let registry = current_registry()
            .ok_or_else(|| PyRuntimeError::new_err("interpreter has been finalized"))?;
        let native = registry
            .get(module, name)
            .ok_or_else(|| PyAttributeError::new_err(format!("module '{module}' has no attribute '{name}'")))?;

        let fname = native.display_name();
        if let Some(msg) = native.spec.arity_error(fname, args.len()) {
            return Err(PyTypeError::new_err(msg));
        }

        let mut strings = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            match arg.downcast::<PyString>() {
                Ok(s) => strings.push(s.to_str()?.to_owned()),
                Err(_) => {
                    let type_name: String = arg.get_type().getattr("__name__")?.extract()?;
                    return Err(PyTypeError::new_err(format!(
                        "{fname}() argument {} must be str, not {type_name}",
                        i + 1
                    )));
                }
            }
        }

        native
            .invoke(&strings)
            .map_err(|msg| NativeError::new_err(format!("{fname}(): {msg}")))
    }

    /// Builds a plain Python function forwarding to the dispatcher, so names
    /// and docstrings look native to scripts.
    const BIND_SRC: &str = "\
def _bind(dispatch, module, name, doc):
    def f(*args):
        return dispatch(module, name, *args)
    f.__name__ = name
    f.__qualname__ = name
    f.__module__ = module
    f.__doc__ = doc
    return f
";

    /// Installs every registered module and returns the `sys.modules` dict
    /// they were placed in.
    fn install<'py>(py: Python<'py>, registry: &Registry) -> PyResult<Bound<'py, PyAny>> {
        let modules = py.import_bound("sys")?.getattr("modules")?;
        for module in registry.modules() {
            if modules.contains(module)? {
                return Err(PyRuntimeError::new_err(format!(
                    "module '{module}' is already loaded in the interpreter"
                )));
            }
        }

        let private = PyModule::new_bound(py, "_ahk_dispatch")?;
        let dispatch = wrap_pyfunction!(ahk_dispatch, &private)?;

        let ns = PyDict::new_bound(py);
        py.run_bound(BIND_SRC, Some(&ns), None)?;
        let bind = ns
            .get_item("_bind")?
            .ok_or_else(|| PyRuntimeError::new_err("binder not defined"))?;

        for module in registry.modules() {
            let m = PyModule::new_bound(py, module)?;
            for native in registry.functions(module) {
                let f = bind.call1((dispatch.clone(), module, native.name.as_str(), native.description.as_str()))?;
                m.setattr(native.name.as_str(), f)?;
            }
            // sys.modules[name] = m, so `import name` works.
            modules.set_item(module, &m)?;
        }
        Ok(modules)
    }

    fn uninstall(py: Python<'_>, sys_modules: &Bound<'_, PyAny>, modules: &[String]) -> PyResult<()> {
        for name in modules {
            if sys_modules.contains(name.as_str())? {
                sys_modules.del_item(name.as_str())?;
            }
        }

        let main = py.import_bound("__main__")?.dict();
        let user: Vec<String> = main
            .keys()
            .iter()
            .filter_map(|k| k.extract::<String>().ok())
            .filter(|k| !k.starts_with("__"))
            .collect();
        for key in user {
            main.del_item(key)?;
        }
        Ok(())
    }

    /// Map a Python exception onto a [`ScriptError`].
    fn convert(py: Python<'_>, err: PyErr) -> ScriptError {
        // ModuleNotFoundError subclasses ImportError; test it first.
        let kind = if err.is_instance_of::<NativeError>(py) {
            ScriptErrorKind::Native
        } else if err.is_instance_of::<PyModuleNotFoundError>(py) {
            ScriptErrorKind::ModuleNotFound
        } else if err.is_instance_of::<PySyntaxError>(py) {
            ScriptErrorKind::Syntax
        } else if err.is_instance_of::<PyNameError>(py) {
            ScriptErrorKind::Name
        } else if err.is_instance_of::<PyAttributeError>(py) {
            ScriptErrorKind::Attribute
        } else if err.is_instance_of::<PyTypeError>(py) {
            ScriptErrorKind::Type
        } else {
            ScriptErrorKind::Runtime
        };
        let line = err
            .traceback_bound(py)
            .and_then(|tb| tb.getattr("tb_lineno").ok()?.extract::<usize>().ok());
        let message = err.value_bound(py).to_string();
        ScriptError { kind, message, line }
    }

    // ── PythonBackend ─────────────────────────────────────────────────────

    #[derive(Debug, Default)]
    pub struct PythonBackend {
        /// Modules installed by this session, removed at shutdown.
        installed: Vec<String>,
        /// The `sys.modules` dict captured at start.
        sys_modules: Option<Py<PyAny>>,
        owns_interpreter: bool,
    }

    impl PythonBackend {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Backend for PythonBackend {
        fn name(&self) -> &'static str {
            "python"
        }

        fn start(&mut self, registry: Registry) -> Result<(), InitializationError> {
            if ACTIVE.swap(true, Ordering::SeqCst) {
                return Err(InitializationError::Backend {
                    backend: "python",
                    message: "the Python interpreter is owned by another session".into(),
                });
            }

            // Initialise the interpreter exactly once (CPython limitation).
            PYTHON_INIT.get_or_init(pyo3::prepare_freethreaded_python);

            let result = Python::with_gil(|py| {
                install(py, &registry).map(Bound::unbind).map_err(|e| e.value_bound(py).to_string())
            });
            let sys_modules = match result {
                Ok(m) => m,
                Err(message) => {
                    ACTIVE.store(false, Ordering::SeqCst);
                    return Err(InitializationError::Backend { backend: "python", message });
                }
            };

            self.sys_modules = Some(sys_modules);
            self.installed = registry.modules().map(str::to_owned).collect();
            self.owns_interpreter = true;
            *STATE.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(registry));
            Ok(())
        }

        fn run(&mut self, source: &str) -> Result<(), ScriptError> {
            if !self.owns_interpreter {
                return Err(ScriptError::not_running("no Python session"));
            }
            Python::with_gil(|py| py.run_bound(source, None, None).map_err(|e| convert(py, e)))
        }

        fn shutdown(&mut self) {
            if !self.owns_interpreter {
                return;
            }
            *STATE.lock().unwrap_or_else(|p| p.into_inner()) = None;
            let installed = std::mem::take(&mut self.installed);
            if let Some(sys_modules) = self.sys_modules.take() {
                let result = Python::with_gil(|py| {
                    uninstall(py, sys_modules.bind(py), &installed).map_err(|e| e.value_bound(py).to_string())
                });
                if let Err(e) = result {
                    warn!("python finalize incomplete: {e}");
                }
            }
            self.owns_interpreter = false;
            ACTIVE.store(false, Ordering::SeqCst);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
