//! Statement execution and expression evaluation.

use std::io::prelude::*;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::{Expr, Stmt};
use crate::diag::RuntimeError;
use crate::env::Env;
use crate::token::{Token, TokenKind};
use crate::value::{Function, Value};

/// Walks the tree.
///
/// Program output goes to `output`; the globals environment lives as
/// long as the evaluator, so one value of this type carries a whole REPL
/// session. Each nested scope is passed down the recursion as a fresh
/// child environment, which also restores the enclosing scope on every
/// exit path, including error unwinds.
#[derive(Debug)]
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    globals: Rc<Env>,
    /// Value carried by a `return` that is unwinding the current call.
    returning: Option<Value>,
}

impl<'t, W: Write> Evaluator<'t, W> {
    pub fn new(output: &'t mut W) -> Evaluator<'t, W> {
        let globals = Env::new();
        globals.define(
            "clock",
            Value::Function(Function::Native {
                name: "clock",
                arity: 0,
                f: native_clock,
            }),
        );
        Evaluator {
            output,
            globals,
            returning: None,
        }
    }

    /// Execute a program against the session globals.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        let globals = self.globals.clone();
        let result = self.execute_all(statements, &globals);
        // A top-level return stops the unit but must not leak into the
        // next one.
        self.returning = None;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt], env: &Rc<Env>) -> Result<(), RuntimeError> {
        for stmt in statements {
            if self.returning.is_some() {
                break;
            }
            self.execute(stmt, env)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Result<(), RuntimeError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.evaluate(expr, env)?;
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr, env)?;
                writeln!(self.output, "{}", value)?;
            }
            Stmt::Var(name, initializer) => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                env.define(&name.lexeme, value);
            }
            Stmt::Block(statements) => {
                self.execute_all(statements, &Env::with_parent(env.clone()))?;
            }
            Stmt::If(condition, then_branch, else_branch) => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute(then_branch, env)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, env)?;
                }
            }
            Stmt::While(condition, body) => {
                while self.returning.is_none() && self.evaluate(condition, env)?.is_truthy() {
                    self.execute(body, env)?;
                }
            }
            Stmt::Function(decl) => {
                let function = Function::User {
                    decl: decl.clone(),
                    closure: env.clone(),
                };
                env.define(&decl.name.lexeme, Value::Function(function));
            }
            Stmt::Return(_, value) => {
                debug_assert!(self.returning.is_none());
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                self.returning = Some(value);
            }
        };
        Ok(())
    }

    fn evaluate(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(value) => Ok(Value::from(value)),
            Expr::Grouping(inner) => self.evaluate(inner, env),
            Expr::Variable(name) => env.get(name),
            Expr::Assign(name, value) => {
                let value = self.evaluate(value, env)?;
                env.assign(name, value.clone())?;
                Ok(value)
            }
            Expr::Unary(op, right) => {
                let right = self.evaluate(right, env)?;
                match op.kind {
                    TokenKind::Minus => {
                        let n = check_number_operand(op, &right)?;
                        Ok(Value::Number(-n))
                    }
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    _ => unreachable!("unary operator"),
                }
            }
            Expr::Binary(left, op, right) => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                apply_binary(op, left, right)
            }
            Expr::Logical(left, op, right) => {
                let left = self.evaluate(left, env)?;
                if op.kind == TokenKind::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(right, env)
            }
            Expr::Call(callee, paren, arguments) => {
                let callee = self.evaluate(callee, env)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument, env)?);
                }
                match callee {
                    Value::Function(function) => self.call(function, args, paren),
                    _ => Err(RuntimeError::NotCallable { line: paren.line }),
                }
            }
        }
    }

    fn call(
        &mut self,
        function: Function,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        if args.len() != function.arity() {
            return Err(RuntimeError::Arity {
                expected: function.arity(),
                got: args.len(),
                line: paren.line,
            });
        }
        match function {
            Function::Native { f, .. } => f(&args),
            Function::User { decl, closure } => {
                let frame = Env::with_parent(closure);
                for (param, value) in decl.params.iter().zip(args) {
                    frame.define(&param.lexeme, value);
                }
                self.execute_all(&decl.body, &frame)?;
                Ok(self.returning.take().unwrap_or(Value::Nil))
            }
        }
    }
}

fn apply_binary(op: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op.kind {
        TokenKind::Plus => match (&left, &right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                let joined = format!("{}{}", left, right);
                Ok(Value::Str(Rc::from(joined.as_str())))
            }
            _ => Err(RuntimeError::AddOperands { line: op.line }),
        },
        TokenKind::Minus => {
            let (l, r) = check_number_operands(op, &left, &right)?;
            Ok(Value::Number(l - r))
        }
        TokenKind::Star => {
            let (l, r) = check_number_operands(op, &left, &right)?;
            Ok(Value::Number(l * r))
        }
        TokenKind::Slash => {
            let (l, r) = check_number_operands(op, &left, &right)?;
            if r == 0.0 {
                return Err(RuntimeError::DivisionByZero { line: op.line });
            }
            Ok(Value::Number(l / r))
        }
        TokenKind::Greater => {
            let (l, r) = check_number_operands(op, &left, &right)?;
            Ok(Value::Bool(l > r))
        }
        TokenKind::GreaterEqual => {
            let (l, r) = check_number_operands(op, &left, &right)?;
            Ok(Value::Bool(l >= r))
        }
        TokenKind::Less => {
            let (l, r) = check_number_operands(op, &left, &right)?;
            Ok(Value::Bool(l < r))
        }
        TokenKind::LessEqual => {
            let (l, r) = check_number_operands(op, &left, &right)?;
            Ok(Value::Bool(l <= r))
        }
        TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
        TokenKind::BangEqual => Ok(Value::Bool(left != right)),
        _ => unreachable!("binary operator"),
    }
}

fn check_number_operand(op: &Token, operand: &Value) -> Result<f64, RuntimeError> {
    match operand {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::NumberOperand { line: op.line }),
    }
}

fn check_number_operands(
    op: &Token,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok((*l, *r)),
        _ => Err(RuntimeError::NumberOperands { line: op.line }),
    }
}

fn native_clock(_args: &[Value]) -> Result<Value, RuntimeError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Value::Number(elapsed.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Reporter;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    /// Parse and execute `input`, returning what it printed.
    fn eval(input: &str) -> Result<String, RuntimeError> {
        let mut diagnostics = Vec::new();
        let mut reporter = Reporter::new(&mut diagnostics);
        let tokens = Scanner::new(input, &mut reporter).scan_tokens();
        let statements = Parser::new(tokens, &mut reporter).parse();
        assert!(
            !reporter.had_syntax_error(),
            "syntax error in test program: {}",
            String::from_utf8_lossy(&diagnostics)
        );

        let mut output = Vec::new();
        let mut evaluator = Evaluator::new(&mut output);
        evaluator.interpret(&statements)?;
        Ok(String::from_utf8(output).expect("program output is UTF-8"))
    }

    #[test]
    fn arithmetic_with_precedence() -> Result<(), RuntimeError> {
        assert_eq!(eval("print 1 + 2 * 3;")?, "7\n");
        assert_eq!(eval("print (1 + 2) * 3;")?, "9\n");
        assert_eq!(eval("print 7 / 2;")?, "3.5\n");
        assert_eq!(eval("print -(1 + 2);")?, "-3\n");
        Ok(())
    }

    #[test]
    fn plus_concatenates_when_either_side_is_a_string() -> Result<(), RuntimeError> {
        assert_eq!(eval("print \"foo\" + \"bar\";")?, "foobar\n");
        assert_eq!(eval("print \"hi\" + 2;")?, "hi2\n");
        assert_eq!(eval("print 2 + \"hi\";")?, "2hi\n");
        assert_eq!(eval("print \"v\" + nil;")?, "vnil\n");
        Ok(())
    }

    #[test]
    fn plus_rejects_mixed_non_string_operands() {
        match eval("print 1 + nil;") {
            Err(RuntimeError::AddOperands { line: 1 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn division_by_zero() {
        match eval("print 1 / 0;") {
            Err(RuntimeError::DivisionByZero { line: 1 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn arithmetic_on_non_numbers() {
        match eval("print true * 2;") {
            Err(RuntimeError::NumberOperands { line: 1 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
        match eval("\n\nprint -\"x\";") {
            Err(RuntimeError::NumberOperand { line: 3 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn comparisons() -> Result<(), RuntimeError> {
        assert_eq!(eval("print 1 < 2; print 2 <= 2; print 1 > 2; print 2 >= 3;")?,
                   "true\ntrue\nfalse\nfalse\n");
        Ok(())
    }

    #[test]
    fn comparisons_require_numbers() {
        match eval("print \"a\" < \"b\";") {
            Err(RuntimeError::NumberOperands { line: 1 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn equality_is_structural() -> Result<(), RuntimeError> {
        assert_eq!(eval("print nil == nil;")?, "true\n");
        assert_eq!(eval("print nil == false;")?, "false\n");
        assert_eq!(eval("print 1 == 1;")?, "true\n");
        assert_eq!(eval("print 1 == \"1\";")?, "false\n");
        assert_eq!(eval("print \"a\" == \"a\";")?, "true\n");
        assert_eq!(eval("print 1 != 2;")?, "true\n");
        Ok(())
    }

    #[test]
    fn bang_inverts_truthiness() -> Result<(), RuntimeError> {
        assert_eq!(eval("print !nil; print !0; print !\"\";")?, "true\nfalse\nfalse\n");
        Ok(())
    }

    #[test]
    fn logical_operators_return_the_operand_value() -> Result<(), RuntimeError> {
        assert_eq!(eval("print nil or \"fallback\";")?, "fallback\n");
        assert_eq!(eval("print 1 or 2;")?, "1\n");
        assert_eq!(eval("print nil and 2;")?, "nil\n");
        assert_eq!(eval("print 1 and 2;")?, "2\n");
        Ok(())
    }

    #[test]
    fn logical_operators_short_circuit() -> Result<(), RuntimeError> {
        // The right operand would update `touched` if it were evaluated.
        let prg = r#"
            var touched = false;
            true or (touched = true);
            false and (touched = true);
            print touched;
        "#;
        assert_eq!(eval(prg)?, "false\n");
        Ok(())
    }

    #[test]
    fn assignment_evaluates_to_the_assigned_value() -> Result<(), RuntimeError> {
        assert_eq!(eval("var a = 1; print a = 2; print a;")?, "2\n2\n");
        Ok(())
    }

    #[test]
    fn assigning_an_undeclared_variable_fails() {
        match eval("foo = 42;") {
            Err(RuntimeError::UndefinedVariable { name, line: 1 }) if name == "foo" => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn reading_an_undeclared_variable_fails() {
        match eval("print foo;") {
            Err(RuntimeError::UndefinedVariable { name, line: 1 }) if name == "foo" => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn uninitialized_variables_are_nil() -> Result<(), RuntimeError> {
        assert_eq!(eval("var a; print a;")?, "nil\n");
        Ok(())
    }

    #[test]
    fn blocks_shadow_and_restore() -> Result<(), RuntimeError> {
        assert_eq!(
            eval("var a = 1; { var a = 2; print a; } print a;")?,
            "2\n1\n"
        );
        Ok(())
    }

    #[test]
    fn blocks_write_through_to_enclosing_scopes() -> Result<(), RuntimeError> {
        assert_eq!(eval("var a = 2; { a = a + 1; } print a;")?, "3\n");
        Ok(())
    }

    #[test]
    fn if_else() -> Result<(), RuntimeError> {
        assert_eq!(eval("if (2 + 2 == 4) print \"yes\"; else print \"no\";")?, "yes\n");
        assert_eq!(eval("if (2 + 2 != 4) print \"yes\"; else print \"no\";")?, "no\n");
        assert_eq!(eval("if (false) print \"unseen\";")?, "");
        Ok(())
    }

    #[test]
    fn while_loop() -> Result<(), RuntimeError> {
        assert_eq!(
            eval("var i = 0; while (i < 3) { print i; i = i + 1; }")?,
            "0\n1\n2\n"
        );
        Ok(())
    }

    #[test]
    fn calling_a_function() -> Result<(), RuntimeError> {
        let prg = r#"
            fun greet(name) { print "hello " + name; }
            greet("world");
        "#;
        assert_eq!(eval(prg)?, "hello world\n");
        Ok(())
    }

    #[test]
    fn arguments_are_evaluated_left_to_right() -> Result<(), RuntimeError> {
        let prg = r#"
            fun pair(a, b) { print a + b; }
            var trace = "";
            fun first() { trace = trace + "1"; return 1; }
            fun second() { trace = trace + "2"; return 2; }
            pair(first(), second());
            print trace;
        "#;
        assert_eq!(eval(prg)?, "3\n12\n");
        Ok(())
    }

    #[test]
    fn functions_without_return_produce_nil() -> Result<(), RuntimeError> {
        assert_eq!(eval("fun f() {} print f();")?, "nil\n");
        Ok(())
    }

    #[test]
    fn return_unwinds_the_call() -> Result<(), RuntimeError> {
        let prg = r#"
            fun max(x, y) {
                if (x > y) {
                    return x;
                }
                return y;
            }
            print max(10, 20);
            print max(5, 4);
        "#;
        assert_eq!(eval(prg)?, "20\n5\n");
        Ok(())
    }

    #[test]
    fn return_terminates_a_loop() -> Result<(), RuntimeError> {
        let prg = r#"
            fun find(limit) {
                var i = 0;
                while (true) {
                    if (i >= limit) return i;
                    i = i + 1;
                }
            }
            print find(3);
        "#;
        assert_eq!(eval(prg)?, "3\n");
        Ok(())
    }

    #[test]
    fn recursion() -> Result<(), RuntimeError> {
        let prg = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);
        "#;
        assert_eq!(eval(prg)?, "55\n");
        Ok(())
    }

    #[test]
    fn closures_capture_their_declaration_scope() -> Result<(), RuntimeError> {
        let prg = r#"
            fun make_counter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }
            var a = make_counter();
            var b = make_counter();
            print a();
            print a();
            print b();
        "#;
        assert_eq!(eval(prg)?, "1\n2\n1\n");
        Ok(())
    }

    #[test]
    fn parameters_shadow_outer_bindings() -> Result<(), RuntimeError> {
        let prg = r#"
            var x = "outer";
            fun show(x) { print x; }
            show("inner");
            print x;
        "#;
        assert_eq!(eval(prg)?, "inner\nouter\n");
        Ok(())
    }

    #[test]
    fn calling_with_the_wrong_number_of_arguments() {
        match eval("fun f(a, b) {} f(1);") {
            Err(RuntimeError::Arity {
                expected: 2,
                got: 1,
                line: 1,
            }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn calling_a_non_function() {
        match eval("var x = 1;\nx();") {
            Err(RuntimeError::NotCallable { line: 2 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn runtime_errors_carry_the_operator_line() {
        match eval("var a = 1;\nvar b = 2;\nprint a + b + nil;") {
            Err(RuntimeError::AddOperands { line: 3 }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn clock_returns_seconds() -> Result<(), RuntimeError> {
        assert_eq!(eval("print clock() > 0;")?, "true\n");
        assert_eq!(eval("print clock;")?, "<native fn>\n");
        Ok(())
    }

    #[test]
    fn user_functions_stringify_with_their_name() -> Result<(), RuntimeError> {
        assert_eq!(eval("fun f() {} print f;")?, "<fn f>\n");
        Ok(())
    }

    #[test]
    fn clock_rejects_arguments() {
        match eval("clock(1);") {
            Err(RuntimeError::Arity {
                expected: 0,
                got: 1,
                ..
            }) => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }
}
