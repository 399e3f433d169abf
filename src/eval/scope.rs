use std::collections::HashMap;

use thiserror::Error;

use crate::value::Value;

/// Failure raised by a user-supplied function.
///
/// `Arity` surfaces as [`super::EvalError::Arity`], everything else as
/// [`super::EvalError::User`], both annotated with the call site span.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FuncError {
    #[error("expected {expected} arguments, got {found}")]
    Arity { expected: usize, found: usize },
    #[error("{0}")]
    Message(String),
}

impl From<String> for FuncError {
    fn from(message: String) -> Self {
        FuncError::Message(message)
    }
}

impl From<&str> for FuncError {
    fn from(message: &str) -> Self {
        FuncError::Message(message.to_string())
    }
}

pub type FuncImpl = dyn Fn(&[Value]) -> Result<Value, FuncError>;

/// Variable and function bindings for one evaluation.
///
/// A scope is immutable while an evaluation runs; for-comprehensions extend
/// it through an immutable parent link, shadowing outer names. Lookups walk
/// the chain and report whether the hit came from the outermost scope,
/// which is what feeds the variable trace.
#[derive(Default)]
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    variables: HashMap<String, Value>,
    functions: HashMap<String, Box<FuncImpl>>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn set_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, FuncError> + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
    }

    pub(crate) fn child(&self) -> Scope<'_> {
        Scope {
            parent: Some(self),
            variables: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    /// Resolve a variable; the flag is true when it was found in the
    /// outermost scope of the chain.
    pub(crate) fn lookup(&self, name: &str) -> Option<(&Value, bool)> {
        if let Some(value) = self.variables.get(name) {
            return Some((value, self.parent.is_none()));
        }
        self.parent?.lookup(name)
    }

    pub(crate) fn lookup_function(&self, name: &str) -> Option<&FuncImpl> {
        if let Some(function) = self.functions.get(name) {
            return Some(function.as_ref());
        }
        self.parent?.lookup_function(name)
    }
}
