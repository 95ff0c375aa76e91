//! Egg - a minimal interpreted expression language
//!
//! This crate provides a recursive-descent parser that turns program text into an
//! abstract syntax tree, and a tree-walking evaluator that runs that tree against a
//! lexically scoped environment.
//!
//! ## Syntax
//!
//! Everything is an expression. A program is exactly one of them:
//!
//! ```text
//! do(def(total, 0),
//!    def(count, 1),
//!    while(<(count, 11),
//!          do(def(total, +(total, count)),
//!             def(count, +(count, 1)))),
//!    print(total))
//! ```
//!
//! - literals: `"text"` (no escapes), `42` (decimal integers), `[1, "two", x]`
//! - words: any run of characters other than whitespace and `( ) , # " [ ]`
//! - application: `operator(arg, ...)`, chainable as in `f(x)(y)`
//!
//! ## Evaluation
//!
//! Applications whose operator is the word of a special form (`if`, `while`, `do`,
//! `def`, `fun`, and the array forms `length push pop shift unshift slice splice`)
//! receive their arguments unevaluated. Everything else evaluates the operator to a
//! callable, evaluates the arguments left to right, and calls it.
//!
//! Only the boolean `false` is falsy. Arrays are shared by reference, so in-place
//! mutation through one binding is visible through every other.
//!
//! ```
//! let result = egglang::run("do(def(sq, fun(x, *(x, x))), sq(12))").unwrap();
//! assert_eq!(result, egglang::value::Value::Number(144.0));
//! ```
//!
//! ## Limits
//!
//! Source nesting deeper than [`MAX_PARSE_DEPTH`] is a syntax error by design, however
//! well-formed the program. Evaluation deeper than [`MAX_EVAL_DEPTH`] ends the run with
//! [`Error::ResourceExhausted`].
//!
//! ## Modules
//!
//! - `parser`: program text to [`ast::Node`]
//! - `evaluator`: evaluation, special forms and the scope chain
//! - `builtinops`: special-form registry, operators and array forms
//! - `interpreter`: the [`Interpreter`] entry point and [`run`]
//! - `print`: the output collaborator behind the `print` primitive
//! - `json` (feature `json`): bridging runtime values to JSON

use std::fmt;

/// Maximum nesting of arrays and applications the parser accepts.
///
/// This is a deliberate restriction on program text, not a stack-safety measure: deeper
/// source is rejected with [`ParseErrorKind::TooDeeplyNested`] even though it is
/// grammatically valid. Syntax trees are dropped, printed and converted recursively, and
/// this bound keeps those walks shallow. Nesting built at runtime (`def(a, [a])` in a
/// loop) is not limited by it.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Maximum evaluation depth before a run is aborted with [`Error::ResourceExhausted`].
/// Non-terminating recursion in user programs ends here instead of overflowing the host stack.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// No rule matches, or a separator is missing
    InvalidSyntax,
    /// Input ended before the expression was complete
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Non-whitespace text after a complete top-level expression
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic character encountered, if any
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

    /// Create a ParseError with context extracted from `input` around a byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let error_offset = error_offset.min(input.len());
        let found = input[error_offset..].chars().next().map(String::from);

        // Count in chars so the snippet never splits a code point
        let error_char = input[..error_offset].chars().count();
        let context_start = error_char.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter.
///
/// Nothing is recovered inside the interpreter: every error aborts the current run and
/// propagates to the caller of [`run`] / [`Interpreter::run`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    ParseError(ParseError),
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Not callable: {0}")]
    NotCallable(String),
    #[error("ArityError: {name} expected {expected} arguments, got {got}")]
    ArityError {
        name: String,
        expected: builtinops::Arity,
        got: usize,
    },
    #[error("Malformed {form}: {message}")]
    MalformedSpecialForm { form: &'static str, message: String },
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("EvaluationError: {0}")]
    EvalError(String),
    #[error("Resource exhausted: evaluation depth limit exceeded (max: {limit})")]
    ResourceExhausted { limit: usize },
}

impl Error {
    pub fn arity_error(name: impl Into<String>, expected: builtinops::Arity, got: usize) -> Self {
        Error::ArityError {
            name: name.into(),
            expected,
            got,
        }
    }

    pub(crate) fn malformed(form: &'static str, message: impl Into<String>) -> Self {
        Error::MalformedSpecialForm {
            form,
            message: message.into(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Error::ParseError(error)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod interpreter;
pub mod parser;
pub mod print;
mod stack;
pub mod value;

#[cfg(feature = "json")]
pub mod json;

pub use interpreter::{Interpreter, run};
pub use parser::parse;
