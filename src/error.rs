use std::io;

use thiserror::Error;

use crate::object::Object;
use crate::token::{Token, TokenType};

#[derive(Error, Debug)]
pub enum Error {
    /// Scan/parse/resolve failure. The details were already reported on
    /// stderr where the error was found; this just tells the driver not to
    /// run the program.
    #[error("parse error")]
    Parse,

    #[error("{message}\n[line {}]", .token.line)]
    Runtime { token: Token, message: String },

    /// Not an error: the unwinding signal that carries a `return` value up
    /// to the active call frame.
    #[error("return")]
    Return { value: Object },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Readline(#[from] rustyline::error::ReadlineError),
}

pub fn scan_error(line: i32, message: &str) {
    report(line, "", message);
}

pub fn parse_error(token: &Token, message: &str) {
    if token.token_type == TokenType::Eof {
        report(token.line, " at end", message);
    } else {
        report(token.line, &format!(" at '{}'", token.lexeme), message);
    }
}

fn report(line: i32, location: &str, message: &str) {
    eprintln!("[line {line}] Error{location}: {message}");
}
