//! Tree-walking evaluator for parsed scripts.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::error::{ScriptError, ScriptErrorKind};
use crate::registry::{ArgKind, Registry};

use super::parser::{parse_script, Expr, Stmt, StmtKind};
use super::value::{Module, Value};

fn err(kind: ScriptErrorKind, msg: impl Into<String>) -> ScriptError {
    ScriptError::new(kind, msg)
}

/// One interpreter instance: the importable modules plus the `__main__`
/// namespace.  Globals persist across [`Interpreter::exec_script`] calls.
#[derive(Debug, Default)]
pub struct Interpreter {
    modules: HashMap<String, Rc<Module>>,
    globals: HashMap<String, Value>,
}

impl Interpreter {
    /// Build the module table from the registrations.
    pub fn new(registry: &Registry) -> Self {
        let modules = registry
            .modules()
            .map(|name| {
                let module = Module {
                    name: name.to_owned(),
                    functions: registry.functions(name).cloned().collect(),
                };
                (name.to_owned(), Rc::new(module))
            })
            .collect();
        Self { modules, globals: HashMap::new() }
    }

    /// Parse and execute `src`, stopping at the first error.
    pub fn exec_script(&mut self, src: &str) -> Result<(), ScriptError> {
        let stmts = parse_script(src)?;
        for stmt in &stmts {
            self.exec_stmt(stmt).map_err(|e| e.with_line(stmt.line))?;
        }
        Ok(())
    }

    /// Look up a global name bound by a previous statement.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    fn import(&self, name: &str) -> Result<Rc<Module>, ScriptError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| err(ScriptErrorKind::ModuleNotFound, format!("No module named '{name}'")))
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), ScriptError> {
        trace!(line = stmt.line, "exec {:?}", stmt.kind);
        match &stmt.kind {
            StmtKind::Import(names) => {
                for alias in names {
                    let module = self.import(&alias.name)?;
                    self.globals.insert(alias.binding().to_owned(), Value::Module(module));
                }
            }
            StmtKind::FromImport { module, names } => {
                let m = self.import(module)?;
                for alias in names {
                    let f = m.function(&alias.name).ok_or_else(|| {
                        err(
                            ScriptErrorKind::Attribute,
                            format!("cannot import name '{}' from '{module}'", alias.name),
                        )
                    })?;
                    self.globals.insert(alias.binding().to_owned(), Value::Native(f.clone()));
                }
            }
            StmtKind::Assign { name, value } => {
                let v = self.eval(value)?;
                self.globals.insert(name.clone(), v);
            }
            StmtKind::Expr(e) => {
                self.eval(e)?;
            }
            StmtKind::Pass => {}
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Name(n) => self
                .globals
                .get(n)
                .cloned()
                .ok_or_else(|| err(ScriptErrorKind::Name, format!("name '{n}' is not defined"))),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::None => Ok(Value::None),
            Expr::Attr { object, attr } => {
                let obj = self.eval(object)?;
                get_attr(&obj, attr)
            }
            Expr::Call { callee, args } => {
                let f = self.eval(callee)?;
                let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
                call(&f, args)
            }
        }
    }
}

fn get_attr(obj: &Value, attr: &str) -> Result<Value, ScriptError> {
    let found = match (obj, attr) {
        (Value::Module(m), "__name__") => Some(Value::Str(m.name.clone())),
        (Value::Module(m), _) => m.function(attr).cloned().map(Value::Native),
        (Value::Native(f), "__name__") => Some(Value::Str(f.name.clone())),
        (Value::Native(f), "__doc__") => Some(Value::Str(f.description.clone())),
        (Value::Native(f), "__module__") => Some(Value::Str(f.module.clone())),
        _ => None,
    };
    found.ok_or_else(|| {
        let msg = match obj {
            Value::Module(m) => format!("module '{}' has no attribute '{attr}'", m.name),
            other => format!("'{}' object has no attribute '{attr}'", other.type_name()),
        };
        err(ScriptErrorKind::Attribute, msg)
    })
}

fn call(f: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
    let Value::Native(native) = f else {
        return Err(err(
            ScriptErrorKind::Type,
            format!("'{}' object is not callable", f.type_name()),
        ));
    };

    let fname = native.display_name();
    if let Some(msg) = native.spec.arity_error(fname, args.len()) {
        return Err(err(ScriptErrorKind::Type, msg));
    }

    let mut strings = Vec::with_capacity(args.len());
    for (i, (arg, kind)) in args.into_iter().zip(native.spec.params()).enumerate() {
        match (kind, arg) {
            (ArgKind::Str, Value::Str(s)) => strings.push(s),
            (ArgKind::Str, other) => {
                return Err(err(
                    ScriptErrorKind::Type,
                    format!(
                        "{fname}() argument {} must be {}, not {}",
                        i + 1,
                        kind.type_name(),
                        other.type_name()
                    ),
                ));
            }
        }
    }

    trace!(module = %native.module, function = %native.name, "native call");
    native
        .invoke(&strings)
        .map_err(|msg| err(ScriptErrorKind::Native, format!("{fname}(): {msg}")))?;
    Ok(Value::None)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
