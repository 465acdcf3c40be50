//! Native Callable Registration table.
//!
//! A registration associates a `(module, function)` pair with an argument
//! spec, a description, and the host handler.  Everything is validated when
//! the entry is added, so backends can install the table without further
//! checks.
//!
//! # Argument specs
//!
//! Specs use the compact parse-format notation of the C embedding API:
//!
//! | Spec          | Meaning                                            |
//! |---------------|----------------------------------------------------|
//! | `"s"`         | exactly one string argument                        |
//! | `"s:callcmd"` | same, with `callcmd` named in diagnostics          |
//! | `""`          | no arguments                                       |
//!
//! `s` is the only argument code.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::RegistrationError;

/// Host function signature.  Arguments arrive as owned copies.
pub type Handler = Arc<dyn Fn(&[String]) -> Result<(), String> + Send + Sync>;

/// Words the built-in front end reserves; they cannot name a module or
/// function.
pub const RESERVED: &[&str] = &["import", "from", "as", "pass", "None"];

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// Check that `name` can be resolved from script code.
pub fn validate_name(what: &'static str, name: &str) -> Result<(), RegistrationError> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if !ident_re().is_match(name) {
        "must be an identifier"
    } else if RESERVED.contains(&name) {
        "is a reserved word"
    } else {
        return Ok(());
    };
    Err(RegistrationError::InvalidName { what, name: name.to_owned(), reason })
}

// ── ArgSpec ───────────────────────────────────────────────────────────────────

/// Type of one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Str,
}

impl ArgKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ArgKind::Str => "str",
        }
    }
}

/// Parsed argument contract of a native function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgSpec {
    params: Vec<ArgKind>,
    /// Name given after `:`, if any.
    label: Option<String>,
}

/// Why a spec string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ArgSpecError(pub String);

impl FromStr for ArgSpec {
    type Err = ArgSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (codes, label) = match s.split_once(':') {
            Some((codes, label)) => {
                if label.contains(':') {
                    return Err(ArgSpecError("more than one ':' separator".into()));
                }
                if label.is_empty() {
                    return Err(ArgSpecError("empty function name after ':'".into()));
                }
                (codes, Some(label.to_owned()))
            }
            None => (s, None),
        };

        let params = codes
            .chars()
            .map(|c| match c {
                's' => Ok(ArgKind::Str),
                other => Err(ArgSpecError(format!("unknown argument code {other:?}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArgSpec { params, label })
    }
}

impl ArgSpec {
    /// Exactly one string argument.
    pub fn single_str() -> Self {
        ArgSpec { params: vec![ArgKind::Str], label: None }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ArgKind] {
        &self.params
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The diagnostic message for a call with `given` arguments, or `None`
    /// when the count matches.
    pub fn arity_error(&self, function: &str, given: usize) -> Option<String> {
        let want = self.arity();
        if want == given {
            return None;
        }
        let msg = match want {
            0 => format!("{function}() takes no arguments ({given} given)"),
            1 => format!("{function}() takes exactly 1 argument ({given} given)"),
            n => format!("{function}() takes exactly {n} arguments ({given} given)"),
        };
        Some(msg)
    }
}

// ── NativeFunction ────────────────────────────────────────────────────────────

/// One registered host function.
#[derive(Clone)]
pub struct NativeFunction {
    pub module: String,
    pub name: String,
    pub spec: ArgSpec,
    pub description: String,
    handler: Handler,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl NativeFunction {
    /// Name used in diagnostics: the argument spec's label if present.
    pub fn display_name(&self) -> &str {
        self.spec.label().unwrap_or(&self.name)
    }

    /// Invoke the handler.  Arity and argument types must already have been
    /// checked by the backend.
    pub fn invoke(&self, args: &[String]) -> Result<(), String> {
        (self.handler)(args)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// All registrations, grouped by module.  Iteration order is sorted so
/// modules are installed deterministically.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: BTreeMap<String, BTreeMap<String, Arc<NativeFunction>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a registration.
    pub fn register(
        &mut self,
        module: &str,
        function: &str,
        spec: &str,
        description: &str,
        handler: Handler,
    ) -> Result<(), RegistrationError> {
        validate_name("module", module)?;
        validate_name("function", function)?;

        let malformed = |reason: String| RegistrationError::MalformedArgSpec {
            function: function.to_owned(),
            spec: spec.to_owned(),
            reason,
        };
        let parsed: ArgSpec = spec.parse().map_err(|e: ArgSpecError| malformed(e.0))?;
        if let Some(label) = parsed.label() {
            if label != function {
                return Err(malformed(format!(
                    "label '{label}' does not match function name"
                )));
            }
        }

        if self.get(module, function).is_some() {
            return Err(RegistrationError::Duplicate {
                module: module.to_owned(),
                function: function.to_owned(),
            });
        }

        self.modules.entry(module.to_owned()).or_default().insert(
            function.to_owned(),
            Arc::new(NativeFunction {
                module: module.to_owned(),
                name: function.to_owned(),
                spec: parsed,
                description: description.to_owned(),
                handler,
            }),
        );
        Ok(())
    }

    pub fn get(&self, module: &str, function: &str) -> Option<&Arc<NativeFunction>> {
        self.modules.get(module)?.get(function)
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Iterate over module names.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Iterate over the functions of one module.
    pub fn functions<'a>(
        &'a self,
        module: &str,
    ) -> impl Iterator<Item = &'a Arc<NativeFunction>> + 'a {
        self.modules.get(module).into_iter().flat_map(|m| m.values())
    }

    /// Iterate over every registration.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<NativeFunction>> {
        self.modules.values().flat_map(|m| m.values())
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
