// This module models the resolved type and layout descriptors the semantic pass hands to
// the layout generator. Type is a closed enum over scalars, pointers, dynamic arrays,
// fixed arrays, structs, classes, vectors and aliases; struct and class declarations carry
// their total size and the ordered list of fields with byte offsets and optional declared
// initializers. ClassDecl additionally carries its base-class link, the interfaces whose
// dispatch-pointer slots live at this level of the instance, the interface sub-tables it
// defines inside its class-info symbol, and the symbols of its dispatch table and class
// info. All descriptors are immutable and shared through Arc so that independent values
// can be encoded on different threads against the same type graph.

//! Type and aggregate layout descriptors.

use std::fmt;
use std::sync::Arc;

use super::expr::Initializer;
use crate::core::error::SourceLoc;
use crate::core::target::TargetConfig;
use crate::dt::Symbol;

pub type TypeRef = Arc<Type>;

/// Floating point precision tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Single,
    Double,
    /// 80-bit x87 extended real, padded to the target's real storage size.
    Extended,
}

impl Precision {
    pub fn size(self, target: &TargetConfig) -> u64 {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
            Precision::Extended => target.real_size as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    /// Character of the given code unit width in bytes.
    Char(u32),
    /// Integer of the given size in bytes.
    Int(u32),
    Float(Precision),
    Imaginary(Precision),
    Complex(Precision),
}

#[derive(Debug, Clone)]
pub enum Type {
    Scalar(Scalar),
    Pointer(TypeRef),
    /// Length + pointer pair.
    DynArray(TypeRef),
    FixedArray { elem: TypeRef, dim: u64 },
    Struct(Arc<StructDecl>),
    /// Class references are pointer sized; the instance layout lives in the decl.
    Class(Arc<ClassDecl>),
    Vector { elem: TypeRef, lanes: u64 },
    Alias(Arc<AliasDecl>),
}

impl Type {
    pub fn scalar(scalar: Scalar) -> TypeRef {
        Arc::new(Type::Scalar(scalar))
    }

    pub fn int(size: u32) -> TypeRef {
        Self::scalar(Scalar::Int(size))
    }

    pub fn char8() -> TypeRef {
        Self::scalar(Scalar::Char(1))
    }

    pub fn float(precision: Precision) -> TypeRef {
        Self::scalar(Scalar::Float(precision))
    }

    pub fn complex(precision: Precision) -> TypeRef {
        Self::scalar(Scalar::Complex(precision))
    }

    pub fn pointer(to: TypeRef) -> TypeRef {
        Arc::new(Type::Pointer(to))
    }

    pub fn dyn_array(elem: TypeRef) -> TypeRef {
        Arc::new(Type::DynArray(elem))
    }

    pub fn fixed_array(elem: TypeRef, dim: u64) -> TypeRef {
        Arc::new(Type::FixedArray { elem, dim })
    }

    pub fn vector(elem: TypeRef, lanes: u64) -> TypeRef {
        Arc::new(Type::Vector { elem, lanes })
    }

    pub fn struct_(decl: Arc<StructDecl>) -> TypeRef {
        Arc::new(Type::Struct(decl))
    }

    pub fn class(decl: Arc<ClassDecl>) -> TypeRef {
        Arc::new(Type::Class(decl))
    }

    pub fn alias(decl: Arc<AliasDecl>) -> TypeRef {
        Arc::new(Type::Alias(decl))
    }

    /// Size of a value of this type in bytes.
    pub fn size(&self, target: &TargetConfig) -> u64 {
        let ptr = target.ptr_size as u64;
        match self {
            Type::Scalar(scalar) => match scalar {
                Scalar::Bool => 1,
                Scalar::Char(width) | Scalar::Int(width) => *width as u64,
                Scalar::Float(p) | Scalar::Imaginary(p) => p.size(target),
                Scalar::Complex(p) => 2 * p.size(target),
            },
            Type::Pointer(_) | Type::Class(_) => ptr,
            Type::DynArray(_) => 2 * ptr,
            Type::FixedArray { elem, dim } => elem.size(target) * dim,
            Type::Struct(decl) => decl.size,
            Type::Vector { elem, lanes } => elem.size(target) * lanes,
            Type::Alias(decl) => decl.base.size(target),
        }
    }

    /// The type with all aliases stripped.
    pub fn base(&self) -> &Type {
        let mut ty = self;
        while let Type::Alias(decl) = ty {
            ty = &decl.base;
        }
        ty
    }

    /// Element or pointee type, looking through aliases.
    pub fn next(&self) -> Option<&TypeRef> {
        match self.base() {
            Type::Pointer(t) | Type::DynArray(t) => Some(t),
            Type::FixedArray { elem, .. } | Type::Vector { elem, .. } => Some(elem),
            _ => None,
        }
    }

    pub fn is_fixed_array(&self) -> bool {
        matches!(self.base(), Type::FixedArray { .. })
    }

    pub fn as_class(&self) -> Option<&Arc<ClassDecl>> {
        match self.base() {
            Type::Class(decl) => Some(decl),
            _ => None,
        }
    }

    /// Number of innermost elements in a chain of nested fixed arrays (1 otherwise).
    pub fn flat_dim(&self) -> u64 {
        let mut dim = 1;
        let mut ty = self.base();
        while let Type::FixedArray { elem, dim: d } = ty {
            dim *= d;
            ty = elem.base();
        }
        dim
    }

    /// Structural type identity; aggregates compare by declaration identity.
    pub fn same_as(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Scalar(a), Type::Scalar(b)) => a == b,
            (Type::Pointer(a), Type::Pointer(b)) | (Type::DynArray(a), Type::DynArray(b)) => {
                a.same_as(b)
            }
            (
                Type::FixedArray { elem: a, dim: da },
                Type::FixedArray { elem: b, dim: db },
            )
            | (
                Type::Vector { elem: a, lanes: da },
                Type::Vector { elem: b, lanes: db },
            ) => da == db && a.same_as(b),
            (Type::Struct(a), Type::Struct(b)) => Arc::ptr_eq(a, b),
            (Type::Class(a), Type::Class(b)) => Arc::ptr_eq(a, b),
            (Type::Alias(a), Type::Alias(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(scalar) => match scalar {
                Scalar::Bool => f.write_str("bool"),
                Scalar::Char(w) => write!(f, "char{}", w * 8),
                Scalar::Int(s) => write!(f, "int{}", s * 8),
                Scalar::Float(p) => write!(f, "float({:?})", p),
                Scalar::Imaginary(p) => write!(f, "imaginary({:?})", p),
                Scalar::Complex(p) => write!(f, "complex({:?})", p),
            },
            Type::Pointer(t) => write!(f, "{}*", t),
            Type::DynArray(t) => write!(f, "{}[]", t),
            Type::FixedArray { elem, dim } => write!(f, "{}[{}]", elem, dim),
            Type::Struct(decl) => f.write_str(&decl.name),
            Type::Class(decl) => f.write_str(&decl.name),
            Type::Vector { elem, lanes } => write!(f, "__vector({}[{}])", elem, lanes),
            Type::Alias(decl) => f.write_str(&decl.name),
        }
    }
}

/// A field of a struct or class at a fixed byte offset.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub offset: u64,
    pub ty: TypeRef,
    pub init: Option<Initializer>,
}

impl FieldDecl {
    pub fn new(name: &str, offset: u64, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            offset,
            ty,
            init: None,
        }
    }

    pub fn with_init(mut self, init: Initializer) -> Self {
        self.init = Some(init);
        self
    }

    pub fn size(&self, target: &TargetConfig) -> u64 {
        self.ty.size(target)
    }

    pub fn overlaps(&self, other: &FieldDecl, target: &TargetConfig) -> bool {
        self.offset < other.offset + other.size(target)
            && other.offset < self.offset + self.size(target)
    }
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub size: u64,
    pub fields: Vec<FieldDecl>,
    /// Symbol of the struct's static default initializer.
    pub init_symbol: Symbol,
}

impl StructDecl {
    pub fn new(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            fields: Vec::new(),
            init_symbol: Symbol::new(&format!("{}.__init", name)),
        }
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

/// Instance slot holding an interface's dispatch-table pointer.
#[derive(Debug, Clone)]
pub struct InterfaceSlot {
    pub interface: Arc<ClassDecl>,
    /// Byte offset of the slot inside the instance.
    pub offset: u64,
}

/// Interface sub-table defined inside a class's class-info symbol.
#[derive(Debug, Clone)]
pub struct InterfaceTable {
    pub interface: Arc<ClassDecl>,
    /// Byte offset of the sub-table inside `ClassDecl::info_symbol`.
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    /// Instance size including the header.
    pub size: u64,
    pub fields: Vec<FieldDecl>,
    pub base: Option<Arc<ClassDecl>>,
    pub interfaces: Vec<InterfaceSlot>,
    pub interface_tables: Vec<InterfaceTable>,
    pub vtable_symbol: Symbol,
    pub info_symbol: Symbol,
    pub is_interface: bool,
    /// Declaration site, for diagnostics raised while laying out the static initializer.
    pub loc: SourceLoc,
}

impl ClassDecl {
    pub fn new(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            fields: Vec::new(),
            base: None,
            interfaces: Vec::new(),
            interface_tables: Vec::new(),
            vtable_symbol: Symbol::new(&format!("{}.__vtbl", name)),
            info_symbol: Symbol::new(&format!("{}.__Class", name)),
            is_interface: false,
            loc: SourceLoc::default(),
        }
    }

    pub fn interface(name: &str) -> Self {
        let mut decl = Self::new(name, 0);
        decl.is_interface = true;
        decl
    }

    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }

    pub fn with_base(mut self, base: Arc<ClassDecl>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Lay out `interface`'s dispatch pointer at instance `offset`.
    pub fn implements(mut self, interface: Arc<ClassDecl>, offset: u64) -> Self {
        self.interfaces.push(InterfaceSlot { interface, offset });
        self
    }

    /// Define `interface`'s sub-table at `offset` inside this class's info symbol.
    pub fn defines_table(mut self, interface: Arc<ClassDecl>, offset: u64) -> Self {
        self.interface_tables.push(InterfaceTable { interface, offset });
        self
    }

    /// This class followed by its bases, most-derived first.
    pub fn chain(&self) -> impl Iterator<Item = &ClassDecl> {
        std::iter::successors(Some(self), |c| c.base.as_deref())
    }

    /// Offset of `interface`'s sub-table if this level defines one.
    pub fn interface_table_offset(&self, interface: &ClassDecl) -> Option<u64> {
        self.interface_tables
            .iter()
            .find(|t| std::ptr::eq(Arc::as_ptr(&t.interface), interface))
            .map(|t| t.offset)
    }

    /// Instance offset of `interface`'s dispatch pointer, searching base classes.
    pub fn interface_offset(&self, interface: &ClassDecl) -> Option<u64> {
        self.chain().find_map(|c| {
            c.interfaces
                .iter()
                .find(|s| std::ptr::eq(Arc::as_ptr(&s.interface), interface))
                .map(|s| s.offset)
        })
    }

    /// Number of fields declared by all base classes.
    pub fn base_field_count(&self) -> usize {
        self.chain().skip(1).map(|c| c.fields.len()).sum()
    }

    /// Number of fields of the whole hierarchy.
    pub fn total_field_count(&self) -> usize {
        self.chain().map(|c| c.fields.len()).sum()
    }
}

/// A named alias of another type, optionally with its own default initializer.
#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: String,
    pub base: TypeRef,
    pub init: Option<Initializer>,
}
