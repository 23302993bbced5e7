//! dtgen - static data layout generation.
//!
//! dtgen turns constant-folded initializer expressions into the byte images
//! and relocations that back static data: global variables, struct and class
//! default initializers, string and array literals, and instances produced by
//! compile-time evaluation. Values are built as compact [`FragmentList`]s
//! (raw bytes, zero runs, symbol references) and flattened on demand.
//!
//! # Primary Usage
//!
//! ```ignore
//! use dtgen::{EncodeSession, EncoderConfig, Expr, Type};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());
//!
//! let value = session.encode(&Expr::int(42, Type::int(4)))?;
//! let image = value.materialize();
//! let pool = session.take_pool();
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Session, configuration and errors
//! - [`dt`] - Fragment lists and materialized data images
//! - [`ir`] - Resolved types, expressions and initializers
//! - [`encode`] - Layout algorithms

pub mod core;
pub mod dt;
pub mod encode;
pub mod ir;

pub use core::{
    Diagnostic, DiagnosticSink, EncodeSession, EncoderConfig, Endian, LayoutConvention,
    LayoutError, LayoutResult, PoolKind, PooledData, SessionStats, SourceLoc, TargetConfig,
};
pub use dt::{DataFragment, DataImage, FragmentList, Relocation, Symbol};
pub use encode::{AggregateAssembler, ArrayExpander, ClassLayoutBuilder, ExpressionEncoder};
pub use ir::{
    ArrayEntry, ArrayInitializer, ClassDecl, ClassInstance, Expr, ExprKind, FieldDecl,
    FuncLiteral, Initializer, StructDecl, StructLiteral, Type, TypeRef, VarDecl,
};
