//! API to control the interpreter.

use std::io::prelude::*;

use crate::diag::Reporter;
use crate::eval::Evaluator;
use crate::parser::Parser;
use crate::scanner::Scanner;

/// Tree-walk interpreter session.
///
/// Each [`run`](Interpreter::run) call scans, parses and executes one
/// complete source unit — a script or one REPL line. Globals persist
/// across calls, so code and data sharing between units is possible.
/// Program output goes to `output`, diagnostics to `errors`, and the two
/// error flags tell the driver what happened.
///
/// # Example
///
/// Invoke the interpreter a first time to define a function, then again
/// to call it:
///
/// ```
/// use lox::interpreter::Interpreter;
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut errors: Vec<u8> = Vec::new();
///
/// let mut interp = Interpreter::new(&mut output, &mut errors);
/// interp.run("fun double(x) { return 2 * x; }");
/// interp.run("print double(21);");
/// assert!(!interp.had_syntax_error());
/// assert!(!interp.had_runtime_error());
///
/// assert_eq!(output, b"42\n");
/// assert!(errors.is_empty());
/// ```
#[derive(Debug)]
pub struct Interpreter<'io, W: Write, E: Write> {
    evaluator: Evaluator<'io, W>,
    reporter: Reporter<&'io mut E>,
}

impl<'io, W: Write, E: Write> Interpreter<'io, W, E> {
    pub fn new(output: &'io mut W, errors: &'io mut E) -> Interpreter<'io, W, E> {
        Interpreter {
            evaluator: Evaluator::new(output),
            reporter: Reporter::new(errors),
        }
    }

    /// Run one complete source unit.
    ///
    /// Scanning and parsing always run to completion so one pass
    /// surfaces as many errors as possible; execution is skipped when
    /// they reported anything, and a runtime error aborts the rest of
    /// the unit. Either way the globals stay consistent for the next
    /// call.
    pub fn run(&mut self, source: &str) {
        let tokens = Scanner::new(source, &mut self.reporter).scan_tokens();
        let statements = Parser::new(tokens, &mut self.reporter).parse();
        if self.reporter.had_syntax_error() {
            return;
        }
        if let Err(error) = self.evaluator.interpret(&statements) {
            self.reporter.runtime_error(&error);
        }
    }

    pub fn had_syntax_error(&self) -> bool {
        self.reporter.had_syntax_error()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.reporter.had_runtime_error()
    }

    /// Forget past syntax errors so a REPL session keeps accepting
    /// input.
    pub fn clear_syntax_error(&mut self) {
        self.reporter.clear_syntax_error();
    }
}
