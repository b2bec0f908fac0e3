//! Diagnostic reporting for the compiler.
//!
//! The source's error discipline is fail-fast: every compile error formats
//! a message with the offending source line and terminates the process,
//! with no recovery or batching (`spec.md` §7). [`Report`] is the
//! structured builder used to assemble that message; [`fail`] is the
//! terminal operation that prints it and aborts.

pub mod report;

pub use report::{Report, ReportKind, ReportNote, ReportNoteKind};

use std::fmt;

/// The kind of compile-time error, matching `spec.md` §7's enumerated list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    UndeclaredIdentifier,
    TypeMismatch,
    NonAssignableLhs,
    InvalidCast,
    InvalidDereference,
    InvalidPointerArithmetic,
    UnknownMember,
    Redeclaration,
    MissingReturn,
    InternalCompilerError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UndeclaredIdentifier => "undeclared identifier",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::NonAssignableLhs => "left hand side may not be assigned to",
            ErrorKind::InvalidCast => "invalid cast",
            ErrorKind::InvalidDereference => "invalid dereference",
            ErrorKind::InvalidPointerArithmetic => "invalid pointer arithmetic",
            ErrorKind::UnknownMember => "unknown member",
            ErrorKind::Redeclaration => "redeclaration",
            ErrorKind::MissingReturn => "missing return",
            ErrorKind::InternalCompilerError => "internal compiler error",
        };
        write!(f, "{name}")
    }
}

/// A single fatal compile error: a kind, a message, and the source line it
/// was detected at. Constructing one and handing it to [`fail`] is the only
/// way the lowerer reports failure — there is no recoverable `Result` type
/// threaded through the recursive descent, matching the source's `die()`.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message} (line {line})")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: u32,
}

impl CompileError {
    pub fn new(kind: ErrorKind, line: u32, message: impl Into<String>) -> Self {
        Self { kind, line, message: message.into() }
    }
}

/// Print the error to standard error, in the same shape as the source's
/// `die()` (`"Error: {msg}\n\t-> Line {n}\n"`), and terminate the process.
///
/// Used only by the CLI driver's outermost boundary; the library entry
/// points used by tests return [`CompileError`] instead of calling this.
pub fn fail(err: &CompileError) -> ! {
    colour::e_red_ln!("Error: {}", err.message);
    eprintln!("\t-> Line {}", err.line);
    std::process::exit(1)
}

/// Construct and immediately format a [`CompileError`], for call sites deep
/// in the lowerer that previously would have called the source's `die()`
/// directly. Returns the error so callers can still propagate it with `?`
/// when driven as a library (e.g. under test), rather than force an exit.
#[macro_export]
macro_rules! die {
    ($kind:expr, $line:expr, $($arg:tt)*) => {
        return Err($crate::CompileError::new($kind, $line, format!($($arg)*)))
    };
}
