//! LCI - an interactive lambda calculus interpreter
//!
//! This crate parses lambda terms and declarations, reduces terms to normal form
//! under beta/eta conversion and pretty-prints the result. It supports user
//! defined operators, named aliases for closed terms and the removal of recursive
//! aliases through a fixed point combinator.
//!
//! ```text
//! I = \x.x
//! K = \x.\y.x
//! DefOp '+' 150 yfx
//! '+' = \m.\n.\f.\x.m f (n f x)
//! 2 + 3                     ; prints 5
//! ```
//!
//! ## Term representation
//!
//! Terms live in a [`term::TermPool`] arena and are addressed through
//! generation-checked [`term::TermId`] handles. Every node owns its children, and
//! reduction rewrites nodes in place, moving node contents between slots instead
//! of aliasing pointers. Released nodes are recycled through a free list, which
//! keeps allocation out of the reduction hot loop.
//!
//! Each node carries a `closed` flag (no free variables). The flag is computed once
//! per command and then maintained incrementally by substitution and reduction; it
//! lets most free-variable checks and substitutions return immediately.
//!
//! ## Modules
//!
//! - `term`: arena, node layout and builders
//! - `freevars`: closed flags, free-variable queries, fresh names
//! - `subst`: capture-avoiding substitution
//! - `reduce`: single-step beta/eta reduction and operator desugaring
//! - `decls`: the declaration store
//! - `fixpoint`: cycle detection and fixed point elimination
//! - `numeral`, `render`: numeral encodings and printing
//! - `operators`: the operator table used while parsing
//! - `parser`: text front end (feature `parser`)
//! - `commands`: system commands (`DefOp`, `ShowAlias`, `FixedPoint`, ...)
//! - `evaluator`: the [`evaluator::Session`] tying everything together

use std::fmt;

/// Maximum nesting of parentheses accepted by the parser
pub const MAX_PARSE_DEPTH: usize = 256;

/// Largest number literal that is turned into a Church numeral
pub const MAX_NUMERAL: usize = 9999;

/// Precedence of plain application (juxtaposition). Lower values bind tighter.
pub const APPLICATION_PRECEDENCE: u8 = 100;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed terms)
    InvalidSyntax,
    /// Input ended before the term was complete (unclosed parens, dangling operator)
    Incomplete,
    /// Parenthesis nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete command
    TrailingContent,
    /// Operators of equal precedence that cannot be grouped without brackets
    Ambiguous,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let before: String = input
            .char_indices()
            .filter(|(i, _)| *i >= context_start)
            .map(|(_, c)| c)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&before);
        if context_start + before.len() < input.len() {
            display_context.push_str("[...]");
        }
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        let found = input
            .get(error_offset..)
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_owned);

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
///
/// Every variant is recoverable at the session level: the current command is
/// abandoned and the session continues.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    /// An alias was resolved during reduction but has no declaration
    UndeclaredAlias(String),
    /// A declaration body has free variables and was not registered
    NonClosedDeclaration(String),
    /// A system command was invoked with the wrong arguments
    MalformedSystemCommand(String),
    /// A number literal outside `0..=MAX_NUMERAL`, as written
    NumeralOutOfRange(String),
    /// A consulted file could not be read
    ConsultFailed { path: String, reason: String },
    /// Internal consistency check failed (a bug in the interpreter)
    InternalInvariantViolation(String),
}

impl Error {
    /// Report an internal inconsistency: fatal in debug builds, an error otherwise
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(false, "internal invariant violated: {message}");
        Error::InternalInvariantViolation(message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "Syntax error: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UndeclaredAlias(name) => write!(f, "Alias {name} is not declared."),
            Error::NonClosedDeclaration(id) => {
                write!(f, "alias {id} is not a closed term and won't be registered")
            }
            Error::MalformedSystemCommand(msg) => {
                write!(f, "Malformed system command: {msg}. Type Help for info.")
            }
            Error::NumeralOutOfRange(n) => {
                write!(f, "integers must be in the range 0-{MAX_NUMERAL}, got {n}")
            }
            Error::ConsultFailed { path, reason } => write!(f, "cannot open {path}: {reason}"),
            Error::InternalInvariantViolation(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

pub mod commands;
pub mod decls;
pub mod evaluator;
pub mod fixpoint;
pub mod freevars;
pub mod intern;
pub mod numeral;
pub mod operators;
pub mod reduce;
pub mod render;
pub mod subst;
pub mod term;

#[cfg(feature = "parser")]
pub mod parser;
