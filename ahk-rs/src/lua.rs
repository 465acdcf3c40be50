//! Optional Lua 5.4 backend via the `mlua` crate.
//!
//! Enabled with the `lua` Cargo feature:
//! ```text
//! cargo build --features lua
//! cargo test  --features lua
//! ```
//!
//! Each registered module is installed in `package.preload`, so scripts load
//! it with `require`:
//!
//! ```lua
//! local ahk = require('ahk')
//! ahk.callcmd('MsgBox')
//! ```
//!
//! Every session owns its own `Lua` state; shutdown drops it.

#[cfg(feature = "lua")]
pub use lua_impl::{LuaBackend, DEFAULT_SCRIPT};

#[cfg(feature = "lua")]
mod lua_impl {
    use std::sync::Arc;

    use mlua::prelude::*;

    use crate::embedder::Backend;
    use crate::error::{InitializationError, ScriptError, ScriptErrorKind};
    use crate::registry::{ArgKind, NativeFunction, Registry};

    /// The fixed script, in Lua.
    pub const DEFAULT_SCRIPT: &str = "local ahk = require('ahk')\nahk.callcmd('MsgBox')\n";

    // ── LuaBackend ────────────────────────────────────────────────────────

    #[derive(Default)]
    pub struct LuaBackend {
        lua: Option<Lua>,
    }

    impl LuaBackend {
        pub fn new() -> Self {
            Self::default()
        }

        // ── Module installation ───────────────────────────────────────────

        fn install(lua: &Lua, registry: &Registry) -> LuaResult<()> {
            let package: LuaTable = lua.globals().get("package")?;
            let preload: LuaTable = package.get("preload")?;

            for module in registry.modules() {
                let table = lua.create_table()?;
                for native in registry.functions(module) {
                    table.set(native.name.as_str(), Self::wrap(lua, Arc::clone(native))?)?;
                }
                // require(name) → the module table
                preload.set(module, lua.create_function(move |_, _: LuaMultiValue| Ok(table.clone()))?)?;
            }
            Ok(())
        }

        /// Wrap a native function, checking arity and argument types the way
        /// the built-in front end does.
        fn wrap(lua: &Lua, native: Arc<NativeFunction>) -> LuaResult<LuaFunction> {
            lua.create_function(move |_, args: LuaMultiValue| {
                let fname = native.display_name();
                if let Some(msg) = native.spec.arity_error(fname, args.len()) {
                    return Err(LuaError::external(ScriptError::new(ScriptErrorKind::Type, msg)));
                }

                let mut strings = Vec::with_capacity(args.len());
                for (i, (arg, kind)) in args.into_iter().zip(native.spec.params()).enumerate() {
                    match (kind, arg) {
                        (ArgKind::Str, LuaValue::String(s)) => strings.push((*s.to_str()?).to_owned()),
                        (ArgKind::Str, other) => {
                            return Err(LuaError::external(ScriptError::new(
                                ScriptErrorKind::Type,
                                format!(
                                    "{fname}() argument {} must be {}, not {}",
                                    i + 1,
                                    kind.type_name(),
                                    other.type_name()
                                ),
                            )));
                        }
                    }
                }

                native.invoke(&strings).map_err(|msg| {
                    LuaError::external(ScriptError::new(
                        ScriptErrorKind::Native,
                        format!("{fname}(): {msg}"),
                    ))
                })
            })
        }
    }

    /// The [`ScriptError`] raised by one of our callbacks, if any.
    fn raised_by_native(err: &LuaError) -> Option<&ScriptError> {
        match err {
            LuaError::ExternalError(e) => e.downcast_ref::<ScriptError>(),
            LuaError::CallbackError { cause, .. } => raised_by_native(cause),
            LuaError::WithContext { cause, .. } => raised_by_native(cause),
            _ => None,
        }
    }

    /// Map a Lua error onto a [`ScriptError`].
    fn convert(err: LuaError) -> ScriptError {
        if let Some(inner) = raised_by_native(&err) {
            return inner.clone();
        }
        let message = err.to_string();
        let kind = match &err {
            LuaError::SyntaxError { .. } => ScriptErrorKind::Syntax,
            _ if message.contains("module '") && message.contains("not found") => {
                ScriptErrorKind::ModuleNotFound
            }
            _ => ScriptErrorKind::Runtime,
        };
        ScriptError::new(kind, message)
    }

    impl Backend for LuaBackend {
        fn name(&self) -> &'static str {
            "lua"
        }

        fn start(&mut self, registry: Registry) -> Result<(), InitializationError> {
            let lua = Lua::new();
            Self::install(&lua, &registry).map_err(|e| InitializationError::Backend {
                backend: "lua",
                message: e.to_string(),
            })?;
            self.lua = Some(lua);
            Ok(())
        }

        fn run(&mut self, source: &str) -> Result<(), ScriptError> {
            let Some(lua) = self.lua.as_ref() else {
                return Err(ScriptError::not_running("no Lua state"));
            };
            lua.load(source).set_name("=script").exec().map_err(convert)
        }

        fn shutdown(&mut self) {
            self.lua = None;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
