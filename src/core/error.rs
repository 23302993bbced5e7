// This module defines error types for the dtgen layout generator using the thiserror crate
// for idiomatic Rust error handling. LayoutError is the main error enum covering every
// failure the encoder can hit: non-constant operands, recursive manifest constants,
// overlapping union initializations, duplicate sparse array indices, over-long array
// literals, capturing function literals, oversized values for zero-length array fields,
// and internal layout inconsistencies. All but the last are recoverable: the encoder
// records them as a Diagnostic keyed by source location and keeps producing a correctly
// sized image. InternalLayoutInconsistency is a programming invariant violation and is
// propagated as an Err through LayoutResult<T>.

//! Error types for the layout generator.
//!
//! Using thiserror for more idiomatic error handling.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Main error type for data layout generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("non-constant expression {expr}")]
    NonConstantExpression {
        expr: String,
    },

    #[error("recursive reference {name}")]
    RecursiveConstantReference {
        name: String,
    },

    #[error("duplicated union initialization for {field}")]
    DuplicateUnionInitialization {
        field: String,
    },

    #[error("duplicate initializations for index {index}")]
    DuplicateArrayIndex {
        index: u64,
    },

    #[error("too many initializers, {count}, for array[{dim}]")]
    TooManyInitializers {
        count: u64,
        dim: u64,
    },

    #[error("non-constant nested delegate literal expression {name}")]
    UnsupportedCapturingFunctionLiteral {
        name: String,
    },

    #[error("zero length array {field} has non-zero length initializer")]
    ZeroLengthArrayInitializer {
        field: String,
    },

    #[error("internal layout inconsistency: {reason}")]
    InternalLayoutInconsistency {
        reason: String,
    },
}

impl LayoutError {
    /// Whether encoding can continue after reporting this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LayoutError::InternalLayoutInconsistency { .. })
    }

    pub(crate) fn internal(reason: impl Into<String>) -> Self {
        LayoutError::InternalLayoutInconsistency {
            reason: reason.into(),
        }
    }
}

/// Result type alias for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Position in the user's source a diagnostic refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file: Option<Arc<str>>,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub fn new(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: Some(Arc::from(file)),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}({},{})", file, self.line, self.column),
            None => write!(f, "<unknown>({},{})", self.line, self.column),
        }
    }
}

/// A recoverable error recorded during an encoding pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub loc: SourceLoc,
    pub error: LayoutError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: Error: {}", self.loc, self.error)
    }
}

/// Destination for diagnostics produced by an encoding session.
///
/// The front end owns the real sink (usually shared across the whole
/// compilation); sessions forward their diagnostics to it once a value is done.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(LayoutError::DuplicateArrayIndex { index: 1 }.is_recoverable());
        assert!(LayoutError::NonConstantExpression { expr: "x".into() }.is_recoverable());
        assert!(!LayoutError::internal("missing interface table").is_recoverable());
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic {
            loc: SourceLoc::new("app.d", 12, 5),
            error: LayoutError::TooManyInitializers { count: 4, dim: 3 },
        };
        assert_eq!(
            diag.to_string(),
            "app.d(12,5): Error: too many initializers, 4, for array[3]"
        );
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        sink.report(Diagnostic {
            loc: SourceLoc::default(),
            error: LayoutError::DuplicateArrayIndex { index: 2 },
        });
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].loc.to_string(), "<unknown>(0,0)");
    }
}
