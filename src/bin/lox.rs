//! Lox interpreter command-line.
//!
//! When called without arguments it drops into an interactive
//! read-evaluate-print loop.  When called with a script path it executes
//! the file, exiting 65 if the script had syntax errors and 70 if it
//! raised a runtime error.

use std::env;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::process;

use anyhow::Context;

use lox::interpreter::Interpreter;

fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => run_prompt()?,
        [script] => run_file(script)?,
        _ => {
            println!("Usage: jlox [script]");
            process::exit(64);
        }
    }
    Ok(())
}

fn run_file(path: &str) -> Result<(), anyhow::Error> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut interp = Interpreter::new(&mut stdout, &mut stderr);
    interp.run(&source);
    let had_syntax_error = interp.had_syntax_error();
    let had_runtime_error = interp.had_runtime_error();

    // process::exit skips destructors, so flush by hand first.
    stdout.flush().context("failed to flush output")?;
    if had_syntax_error {
        process::exit(65);
    }
    if had_runtime_error {
        process::exit(70);
    }
    Ok(())
}

fn run_prompt() -> Result<(), anyhow::Error> {
    let stdin = io::stdin();
    let mut prompt_stdout = io::stdout();
    let mut interp_stdout = io::stdout();
    let mut stderr = io::stderr();

    let mut interp = Interpreter::new(&mut interp_stdout, &mut stderr);

    let mut input = String::new();
    loop {
        prompt_stdout.write_all(b"> ")?;
        prompt_stdout.flush()?;

        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }

        interp.run(&input);
        interp.clear_syntax_error();
    }

    Ok(())
}
