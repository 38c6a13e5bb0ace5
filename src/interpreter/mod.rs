//! Script engine: tokenizer, tree builder, AST and tree-walking interpreter.
//!
//! Source text is compiled once into a [`Script`] (lexer → parser → AST). The
//! AST is immutable and shared behind an `Arc`, so any number of
//! [`Interpreter`]s can walk it at the same time. Each interpreter owns its own
//! locals and cooldown state and reports progress through an [`Interrupter`].

/// Abstract syntax tree definitions for the script language.
pub mod ast;
/// Lazy tokenizer.
pub mod lexer;
/// Recursive-descent tree builder.
pub mod parser;
/// Tree-walking interpreter and the interrupt protocol.
pub mod runtime;
/// Dynamic values manipulated by scripts.
pub mod value;

pub use ast::{NodeRef, Position, Program};
pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use parser::parse_program;
pub use runtime::{
    HostError, Interpreter, InterpreterHost, Interrupt, Interrupter, Limits, NeverInterrupt,
    Outcome, RunState, RunStatus, RuntimeError, RuntimeErrorKind,
};
pub use value::{HostObject, Value};

use std::sync::Arc;
use thiserror::Error;

/// Convenience result alias for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Malformed token.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {pos}")]
pub struct LexError {
    /// Where the offending character sequence starts.
    pub pos: Position,
    /// Description of the problem.
    pub message: String,
}

/// Token sequence that does not reduce to a valid node.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected}, found {found} at {pos}")]
pub struct ParseError {
    /// Position of the first offending token.
    pub pos: Position,
    /// What the parser was looking for.
    pub expected: String,
    /// What it got instead.
    pub found: String,
}

/// Which compilation stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Tokenizer rejected the input.
    Lex,
    /// Tree builder rejected the token stream.
    Parse,
}

/// Errors surfaced while compiling a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Tokenizing failed.
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    /// Tree building failed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl CompileError {
    /// Stage that failed.
    pub fn kind(&self) -> CompileErrorKind {
        match self {
            CompileError::Lex(_) => CompileErrorKind::Lex,
            CompileError::Parse(_) => CompileErrorKind::Parse,
        }
    }

    /// Position of the first offending token.
    pub fn position(&self) -> Position {
        match self {
            CompileError::Lex(err) => err.pos,
            CompileError::Parse(err) => err.pos,
        }
    }
}

/// A compiled script: source text, its AST and a fingerprint of the source.
#[derive(Debug)]
pub struct Script {
    source: String,
    program: Program,
    fingerprint: blake3::Hash,
}

impl Script {
    /// Compile `source` into a shareable script.
    pub fn compile(source: impl Into<String>) -> Result<Arc<Script>> {
        let source = source.into();
        let program = parse_program(&source)?;
        let fingerprint = blake3::hash(source.as_bytes());
        Ok(Arc::new(Script {
            source,
            program,
            fingerprint,
        }))
    }

    /// Original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiled syntax tree.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Hex-encoded blake3 hash of the source text.
    pub fn fingerprint(&self) -> String {
        self.fingerprint.to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_reports_kind_and_position() {
        let lex = Script::compile("x = \"open").unwrap_err();
        assert_eq!(lex.kind(), CompileErrorKind::Lex);
        assert_eq!(lex.position(), Position::new(1, 5));

        let parse = Script::compile("x = (1 +").unwrap_err();
        assert_eq!(parse.kind(), CompileErrorKind::Parse);
    }

    #[test]
    fn fingerprint_depends_only_on_source() {
        let a = Script::compile("x = 1").expect("compile");
        let b = Script::compile("x = 1").expect("compile");
        let c = Script::compile("x = 2").expect("compile");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.program(), b.program());
    }
}
