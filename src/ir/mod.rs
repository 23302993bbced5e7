//! Resolved input model.
//!
//! The semantic pass produces these trees; the layout generator only reads them.

pub mod expr;
pub mod types;

pub use expr::{
    AliasedSymbol, ArrayEntry, ArrayInitializer, ClassInstance, DeclId, Expr, ExprKind,
    FuncLiteral, Initializer, Storage, StringLiteral, StructLiteral, VarDecl,
};
pub use types::{
    AliasDecl, ClassDecl, FieldDecl, InterfaceSlot, InterfaceTable, Precision, Scalar,
    StructDecl, Type, TypeRef,
};
