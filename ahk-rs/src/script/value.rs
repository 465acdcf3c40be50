//! Runtime values of the built-in front end.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::registry::NativeFunction;

/// A module object created from the registration table at start.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Arc<NativeFunction>>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Arc<NativeFunction>> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A script runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Str(String),
    Int(i64),
    Module(Rc<Module>),
    Native(Arc<NativeFunction>),
}

impl Value {
    /// Name of the type, as used in `TypeError` messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::Module(_) => "module",
            Value::Native(_) => "builtin_function_or_method",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Module(m) => write!(f, "<module '{}' (built-in)>", m.name),
            Value::Native(n) => write!(f, "<built-in function {}>", n.name),
        }
    }
}
