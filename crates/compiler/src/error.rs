//! Compiler error types.
//!
//! Fatal conditions travel as values: each pipeline stage returns
//! `Result<_, CompileError>` and the driver renders the error exactly
//! once. Recoverable conditions never construct one of these; they go
//! through [`crate::diagnostics::Diagnostics`] and set the errors-seen
//! flag instead.

use quill_ir::GraphError;

/// Error type for a failed compilation job. The message already carries
/// the `file:line:col` prefix where one applies.
#[derive(Debug)]
pub enum CompileError {
    /// An unexpected token or missing punctuation.
    Parse(String),
    /// A name that did not resolve during symbol analysis.
    Unresolved(String),
    /// A structural type error that checking cannot continue past.
    Type(String),
    /// A symbol name collision in the output graph.
    Conflict(String),
    /// The register allocator ran out of candidates.
    Alloc(String),
    /// A failed file read or write.
    Io(std::io::Error),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parse(msg)
            | CompileError::Unresolved(msg)
            | CompileError::Type(msg)
            | CompileError::Conflict(msg)
            | CompileError::Alloc(msg) => write!(f, "{}", msg),
            CompileError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(err: std::io::Error) -> Self {
        CompileError::Io(err)
    }
}

impl From<GraphError> for CompileError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NameConflict(_) => CompileError::Conflict(err.to_string()),
            GraphError::OutOfRegisters { .. } => CompileError::Alloc(err.to_string()),
        }
    }
}
