//! wal-reader - front end of the WAL waveform analysis language
//!
//! This crate turns WAL source text into a canonical AST. WAL is a Lisp-like language for
//! querying simulation waveforms, and its surface syntax layers a few micro-grammars on top
//! of plain s-expressions:
//!
//! ```text
//! (+ 1 2)              ; calls, with operators as ordinary heads
//! 42 -3 0b101010 0x2A  ; integers in three radices
//! 'x                   ; quoting
//! ~sig #grp            ; scoped and grouped signal names
//! sig@3 sig@<1 2 3>    ; relative-time sampling, single or expanded
//! sig[3] sig[7:0]      ; bit access and slicing
//! ```
//!
//! Reading happens in two layers: a `nom` grammar recognizes text into a borrowed parse
//! tree, and a transformer lowers that tree into [`ast::Node`]s, normalizing literals,
//! classifying reserved operator spellings and tagging structural forms with operators
//! such as `SLICE` or `REL_EVAL`.
//!
//! ## Entry points
//!
//! - [`read_sexpr`] reads exactly one expression.
//! - [`read_sexprs`] reads a whole source unit, with an optional leading `#!` line.
//!
//! Both are pure functions: no state is kept between calls, so reads may run concurrently.
//!
//! ## Modules
//!
//! - `ast`: the closed AST type and construction helpers
//! - `reader`: entry points, configuration and error rendering
//! - `completion`: completion candidates for interactive shells
//! - `json`: JSON encoding of the AST (feature `json`)

/// Default bound on expression nesting. Deeper input fails with
/// [`ReadErrorKind::TooDeeplyNested`] instead of exhausting the stack.
pub const MAX_PARSE_DEPTH: usize = 128;

/// Categorizes the different kinds of read failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorKind {
    /// Input ended while a construct (typically a list or string) was still open
    UnexpectedEof,
    /// A token was present but not valid at that position
    UnexpectedToken,
    /// A character matched no lexical rule
    UnexpectedCharacter,
    /// A literal was well formed but its value is unrepresentable (integer overflow, bad escape)
    InvalidLiteral,
    /// Nesting exceeded the configured maximum depth
    TooDeeplyNested,
}

/// A structured read failure with a 1-based position and a rendered context window.
///
/// Displays as the context window followed by the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context}\n{message}")]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// The offending source line around the error, with a caret under the column
    pub context: String,
    /// The problematic token or character, if one was present
    pub found: Option<String>,
}

impl ReadError {
    /// Build an error located at byte `offset` of `source`. `describe` receives the
    /// 1-based line and column and produces the message.
    pub(crate) fn at(
        kind: ReadErrorKind,
        source: &str,
        offset: usize,
        found: Option<String>,
        describe: impl FnOnce(usize, usize) -> String,
    ) -> Self {
        let (line, column) = reader::locate(source, offset);
        ReadError {
            kind,
            message: describe(line, column),
            line,
            column,
            context: reader::context_window(source, offset),
            found,
        }
    }
}

/// Error types of the crate
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    Read(#[from] ReadError),
    #[cfg(feature = "json")]
    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod ast;
pub mod completion;
mod grammar;
pub mod reader;
mod transform;

#[cfg(feature = "json")]
pub mod json;

pub use ast::{Int, Node, Operator, Symbol};
pub use reader::{ReadConfig, read_sexpr, read_sexpr_with_config, read_sexprs, read_sexprs_with_config};
