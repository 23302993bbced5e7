// This module groups the layout algorithms that turn resolved constant expressions into
// FragmentLists. ExpressionEncoder is the recursive entry point and owns the per-value
// reentrancy guard; it hands struct literals and struct defaults to the
// AggregateAssembler, fixed arrays and sparse array initializers to the ArrayExpander and
// class instances to the ClassLayoutBuilder, all of which call back into the encoder for
// their element and field values. Every component borrows the EncodeSession through the
// encoder, so pooled data, diagnostics and statistics for one pass end up in one place.

//! Constant data layout algorithms.
//!
//! - [`ExpressionEncoder`] - per-expression dispatch, initializers and type defaults
//! - [`AggregateAssembler`] - struct field placement with union overlap checks
//! - [`ArrayExpander`] - fixed array replication with zero-run compaction
//! - [`ClassLayoutBuilder`] - class headers, inherited fields and interface slots

pub mod aggregate;
pub mod array;
pub mod class;
pub mod expr;
mod init;

pub use aggregate::{AggregateAssembler, FieldValue};
pub use array::ArrayExpander;
pub use class::ClassLayoutBuilder;
pub use expr::ExpressionEncoder;
