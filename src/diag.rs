//! Diagnostic reporting.
//!
//! All user-visible error text funnels through [`Reporter`], which owns
//! the two flags the driver consults for its exit code: one for lexical
//! and syntax errors, one for runtime errors.

use std::error::Error;
use std::fmt;
use std::io;
use std::io::prelude::*;

use crate::token::{Token, TokenKind};

/// Line number (starting at one).
pub type Position = u32;

/// Sink for diagnostics.
///
/// The scanner and parser report here and keep going; the evaluator's
/// errors are reported by whoever runs it. Writing diagnostics is
/// best-effort: a broken error stream must not abort interpretation.
#[derive(Debug)]
pub struct Reporter<E: Write> {
    err: E,
    had_syntax_error: bool,
    had_runtime_error: bool,
}

impl<E: Write> Reporter<E> {
    pub fn new(err: E) -> Reporter<E> {
        Reporter {
            err,
            had_syntax_error: false,
            had_runtime_error: false,
        }
    }

    /// Report an error that has a line but no offending token.
    pub fn error(&mut self, line: Position, message: &str) {
        self.report(line, "", message);
    }

    /// Report a syntax error anchored at a token.
    pub fn error_at(&mut self, token: &Token, message: &str) {
        if token.kind == TokenKind::Eof {
            self.report(token.line, " at end", message);
        } else {
            let at = format!(" at '{}'", token.lexeme);
            self.report(token.line, &at, message);
        }
    }

    pub fn runtime_error(&mut self, error: &RuntimeError) {
        match error.line() {
            Some(line) => {
                let _ = writeln!(self.err, "{}\n[line {}]", error, line);
            }
            None => {
                let _ = writeln!(self.err, "{}", error);
            }
        }
        self.had_runtime_error = true;
    }

    fn report(&mut self, line: Position, at: &str, message: &str) {
        let _ = writeln!(self.err, "[line {}] Error{}: {}", line, at, message);
        self.had_syntax_error = true;
    }

    pub fn had_syntax_error(&self) -> bool {
        self.had_syntax_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn clear_syntax_error(&mut self) {
        self.had_syntax_error = false;
    }
}

/// Errors raised while evaluating a program.
///
/// Each variant carries the line of the token it is anchored at: the
/// operator for type mismatches, the name for unknown variables, the
/// closing parenthesis for bad calls. `Io` has no source position; it
/// wraps a failed `print` write.
#[derive(Debug)]
pub enum RuntimeError {
    NumberOperand { line: Position },
    NumberOperands { line: Position },
    AddOperands { line: Position },
    DivisionByZero { line: Position },
    UndefinedVariable { name: String, line: Position },
    NotCallable { line: Position },
    Arity { expected: usize, got: usize, line: Position },
    Io(io::Error),
}

impl RuntimeError {
    pub fn line(&self) -> Option<Position> {
        match self {
            RuntimeError::NumberOperand { line }
            | RuntimeError::NumberOperands { line }
            | RuntimeError::AddOperands { line }
            | RuntimeError::DivisionByZero { line }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::NotCallable { line }
            | RuntimeError::Arity { line, .. } => Some(*line),
            RuntimeError::Io(_) => None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::NumberOperand { .. } => write!(f, "Operand must be a number."),
            RuntimeError::NumberOperands { .. } => write!(f, "Operands must be numbers."),
            RuntimeError::AddOperands { .. } => {
                write!(f, "Operands must be two numbers or two strings.")
            }
            RuntimeError::DivisionByZero { .. } => write!(f, "Cannot divide by zero."),
            RuntimeError::UndefinedVariable { name, .. } => {
                write!(f, "Undefined variable '{}'.", name)
            }
            RuntimeError::NotCallable { .. } => {
                write!(f, "Can only call functions and classes.")
            }
            RuntimeError::Arity { expected, got, .. } => {
                write!(f, "Expected {} arguments but got {}.", expected, got)
            }
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> RuntimeError {
        RuntimeError::Io(e)
    }
}
