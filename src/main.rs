mod class;
mod environment;
mod error;
mod function;
mod interpreter;
mod object;
mod parser;
mod resolver;
mod scanner;
mod syntax;
mod token;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::error::ErrorKind;
use clap::Parser as _;
use log::{debug, LevelFilter};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use simple_logger::SimpleLogger;

use error::Error;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Tree-walking interpreter for the Lox language.
#[derive(clap::Parser)]
#[command(name = "treelox", version, about)]
struct Args {
    /// Script to run; omit to start a REPL.
    script: Option<PathBuf>,
}

struct Lox {
    // One interpreter per session: in the REPL, globals and resolved
    // locals carry over from line to line.
    interpreter: Interpreter,
}

impl Lox {
    fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
        }
    }

    fn run_file(&mut self, path: &Path) -> Result<(), Error> {
        let source = fs::read_to_string(path)?;
        self.run(source)
    }

    fn run_prompt(&mut self) -> Result<(), Error> {
        let mut editor = DefaultEditor::new()?;

        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    // Errors were already reported on stderr; the session
                    // keeps going.
                    let _ = self.run(line);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    fn run(&mut self, source: String) -> Result<(), Error> {
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens();
        debug!("scanned {} tokens", tokens.len());

        let mut parser = Parser::new(tokens);
        let parsed = parser.parse();

        // Scan errors poison the run even when the damaged token stream
        // happened to parse.
        if scanner.had_error {
            return Err(Error::Parse);
        }
        let statements = parsed?;
        debug!("parsed {} statements", statements.len());

        // The resolver pokes hop distances straight into the interpreter;
        // a program with resolution errors never runs.
        let mut resolver = Resolver::new(&mut self.interpreter);
        resolver.resolve_stmts(&statements);
        if resolver.had_error {
            return Err(Error::Parse);
        }

        self.interpreter.interpret(&statements).map_err(|err| {
            eprintln!("{err}");
            err
        })
    }
}

fn main() {
    SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
        .ok();

    let args = Args::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit(0),
            _ => exit(64),
        }
    });

    let mut lox = Lox::new();
    let result = match &args.script {
        Some(path) => lox.run_file(path),
        None => lox.run_prompt(),
    };

    match result {
        Ok(()) => (),
        Err(Error::Parse) => exit(65),
        Err(Error::Runtime { .. }) => exit(70),
        Err(Error::Return { .. }) => unreachable!("the resolver rejects top-level returns"),
        Err(err) => {
            eprintln!("{err}");
            exit(74);
        }
    }
}
