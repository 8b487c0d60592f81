//! Lexically scoped environments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diag::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// One scope: bindings plus a handle on the enclosing scope.
///
/// Lookups and assignments search this scope first and then walk the
/// parent chain; only `define` ever creates a binding, so assignment
/// writes through to whichever enclosing scope declared the name.
#[derive(Debug)]
pub struct Env {
    parent: Option<Rc<Env>>,
    bindings: RefCell<HashMap<String, Value>>,
}

impl Env {
    pub fn new() -> Rc<Env> {
        Rc::new(Env {
            parent: None,
            bindings: RefCell::new(HashMap::new()),
        })
    }

    pub fn with_parent(parent: Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            parent: Some(parent),
            bindings: RefCell::new(HashMap::new()),
        })
    }

    /// Bind `name` in this scope, shadowing any enclosing binding and
    /// overwriting an existing one here.
    pub fn define(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Overwrite the nearest enclosing binding of `name`.
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.bindings.borrow_mut().get_mut(&name.lexeme) {
            *slot = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(undefined_variable(name)),
        }
    }

    /// Value of the nearest enclosing binding of `name`.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.bindings.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.get(name),
            None => Err(undefined_variable(name)),
        }
    }
}

fn undefined_variable(name: &Token) -> RuntimeError {
    RuntimeError::UndefinedVariable {
        name: name.lexeme.clone(),
        line: name.line,
    }
}
