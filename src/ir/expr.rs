// This module models the constant-folded expression and initializer trees the layout
// generator consumes. Every Expr carries its resolved type, which is also the type the
// value is laid out as, and a source location for diagnostics. ExprKind is a closed enum
// so the encoder's dispatch is checked for exhaustiveness at compile time; operands the
// front end could not reduce arrive as ExprKind::Unresolved. Declarations referenced from
// expressions (variables, function literals, compile-time evaluated class instances) are
// shared through Arc. Initializer mirrors the declaration-level initializer syntax: void,
// a plain expression, or an array initializer whose entries may carry explicit indices.

//! Constant expressions and initializers.

use std::fmt;
use std::sync::Arc;

use super::types::{ClassDecl, StructDecl, TypeRef};
use crate::core::error::SourceLoc;
use crate::dt::Symbol;

/// Identity of a declaration, used by the manifest-constant reentrancy guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeRef,
    pub loc: SourceLoc,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Integer(u64),
    Real(f64),
    Complex { re: f64, im: f64 },
    String(StringLiteral),
    Null,
    ArrayLiteral(Vec<Expr>),
    StructLiteral(Arc<StructLiteral>),
    /// Address of a global plus a byte offset.
    SymbolOffset { var: Arc<VarDecl>, offset: u64 },
    AddressOf(Box<Expr>),
    /// Conversion to `Expr::ty`.
    Cast(Box<Expr>),
    Var(Arc<VarDecl>),
    Function(Arc<FuncLiteral>),
    /// Either an array literal with one element per lane or a scalar to broadcast.
    Vector(Box<Expr>),
    ClassReference(Arc<ClassInstance>),
    Unresolved(String),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeRef) -> Self {
        Self {
            kind,
            ty,
            loc: SourceLoc::default(),
        }
    }

    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }

    pub fn int(value: u64, ty: TypeRef) -> Self {
        Self::new(ExprKind::Integer(value), ty)
    }

    pub fn real(value: f64, ty: TypeRef) -> Self {
        Self::new(ExprKind::Real(value), ty)
    }

    pub fn complex(re: f64, im: f64, ty: TypeRef) -> Self {
        Self::new(ExprKind::Complex { re, im }, ty)
    }

    pub fn null(ty: TypeRef) -> Self {
        Self::new(ExprKind::Null, ty)
    }

    pub fn string(text: &str, ty: TypeRef) -> Self {
        Self::new(
            ExprKind::String(StringLiteral {
                data: text.as_bytes().to_vec(),
                char_size: 1,
            }),
            ty,
        )
    }

    pub fn array(elements: Vec<Expr>, ty: TypeRef) -> Self {
        Self::new(ExprKind::ArrayLiteral(elements), ty)
    }

    pub fn struct_literal(literal: StructLiteral, ty: TypeRef) -> Self {
        Self::new(ExprKind::StructLiteral(Arc::new(literal)), ty)
    }

    pub fn var(decl: Arc<VarDecl>) -> Self {
        let ty = decl.ty.clone();
        Self::new(ExprKind::Var(decl), ty)
    }

    pub fn symbol_offset(var: Arc<VarDecl>, offset: u64, ty: TypeRef) -> Self {
        Self::new(ExprKind::SymbolOffset { var, offset }, ty)
    }

    pub fn address_of(operand: Expr, ty: TypeRef) -> Self {
        Self::new(ExprKind::AddressOf(Box::new(operand)), ty)
    }

    pub fn cast(operand: Expr, to: TypeRef) -> Self {
        Self::new(ExprKind::Cast(Box::new(operand)), to)
    }

    pub fn function(literal: Arc<FuncLiteral>, ty: TypeRef) -> Self {
        Self::new(ExprKind::Function(literal), ty)
    }

    pub fn vector(operand: Expr, ty: TypeRef) -> Self {
        Self::new(ExprKind::Vector(Box::new(operand)), ty)
    }

    pub fn class_ref(instance: Arc<ClassInstance>, ty: TypeRef) -> Self {
        Self::new(ExprKind::ClassReference(instance), ty)
    }

    pub fn unresolved(text: &str, ty: TypeRef) -> Self {
        Self::new(ExprKind::Unresolved(text.to_string()), ty)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Integer(v) => write!(f, "{}", v),
            ExprKind::Real(v) => write!(f, "{}", v),
            ExprKind::Complex { re, im } => write!(f, "({} + {}i)", re, im),
            ExprKind::String(s) => write!(f, "\"{}\"", String::from_utf8_lossy(&s.data)),
            ExprKind::Null => f.write_str("null"),
            ExprKind::ArrayLiteral(elems) => write!(f, "[{} elements]", elems.len()),
            ExprKind::StructLiteral(lit) => write!(f, "{}(...)", lit.decl.name),
            ExprKind::SymbolOffset { var, offset } => write!(f, "&{}+{}", var.name, offset),
            ExprKind::AddressOf(e) => write!(f, "&{}", e),
            ExprKind::Cast(e) => write!(f, "cast({}){}", self.ty, e),
            ExprKind::Var(v) => f.write_str(&v.name),
            ExprKind::Function(func) => f.write_str(&func.name),
            ExprKind::Vector(e) => write!(f, "{}({})", self.ty, e),
            ExprKind::ClassReference(inst) => write!(f, "{}(...)", inst.class.name),
            ExprKind::Unresolved(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StringLiteral {
    pub data: Vec<u8>,
    /// Code unit width in bytes.
    pub char_size: u32,
}

impl StringLiteral {
    /// Length in code units.
    pub fn len(&self) -> u64 {
        self.data.len() as u64 / self.char_size.max(1) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Struct literal with one optional value per declared field.
#[derive(Debug, Clone)]
pub struct StructLiteral {
    pub decl: Arc<StructDecl>,
    pub elements: Vec<Option<Expr>>,
    /// Storage symbol when the literal's address is taken.
    pub symbol: Option<Symbol>,
}

impl StructLiteral {
    pub fn new(decl: Arc<StructDecl>, elements: Vec<Option<Expr>>) -> Self {
        Self {
            decl,
            elements,
            symbol: None,
        }
    }
}

/// Where a variable lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Data segment.
    Static,
    /// Code segment.
    Code,
    ThreadLocal,
    Stack,
    /// Member needing a `this` pointer.
    Field,
}

/// Symbol whose static image is the default initializer of an aggregate.
#[derive(Debug, Clone)]
pub enum AliasedSymbol {
    StructInit(Arc<StructDecl>),
    ClassInit(Arc<ClassDecl>),
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: TypeRef,
    pub symbol: Symbol,
    pub storage: Storage,
    /// `const`/`immutable` declaration whose initializer may be inlined.
    pub manifest: bool,
    pub init: Option<Initializer>,
    pub aliased: Option<AliasedSymbol>,
}

impl VarDecl {
    pub fn global(id: u32, name: &str, ty: TypeRef) -> Self {
        Self {
            id: DeclId(id),
            name: name.to_string(),
            ty,
            symbol: Symbol::new(name),
            storage: Storage::Static,
            manifest: false,
            init: None,
            aliased: None,
        }
    }

    pub fn manifest(id: u32, name: &str, ty: TypeRef, init: Initializer) -> Self {
        let mut decl = Self::global(id, name, ty);
        decl.manifest = true;
        decl.init = Some(init);
        decl
    }
}

#[derive(Debug, Clone)]
pub struct FuncLiteral {
    pub name: String,
    pub symbol: Symbol,
    /// Whether the body refers to variables of an enclosing frame.
    pub captures: bool,
}

impl FuncLiteral {
    pub fn new(name: &str, captures: bool) -> Self {
        Self {
            name: name.to_string(),
            symbol: Symbol::new(name),
            captures,
        }
    }
}

/// Class instance produced by compile-time evaluation.
#[derive(Debug, Clone)]
pub struct ClassInstance {
    /// Dynamic (most-derived) class of the instance.
    pub class: Arc<ClassDecl>,
    /// Evaluated field values, indexed over the base-first flattened field list.
    pub fields: Vec<Option<Expr>>,
    pub symbol: Symbol,
}

#[derive(Debug, Clone)]
pub enum Initializer {
    Void(TypeRef),
    Expr(Expr),
    Array(ArrayInitializer),
}

#[derive(Debug, Clone)]
pub struct ArrayInitializer {
    pub ty: TypeRef,
    pub entries: Vec<ArrayEntry>,
    pub loc: SourceLoc,
}

#[derive(Debug, Clone)]
pub struct ArrayEntry {
    /// Explicit index; `None` continues after the previous entry.
    pub index: Option<u64>,
    pub value: Initializer,
}

impl ArrayEntry {
    pub fn at(index: u64, value: Initializer) -> Self {
        Self {
            index: Some(index),
            value,
        }
    }

    pub fn next(value: Initializer) -> Self {
        Self { index: None, value }
    }
}
