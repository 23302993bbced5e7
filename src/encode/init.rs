//! Initializers and type default images.
//!
//! Declarations carry initializers rather than bare expressions: a void
//! initializer, a plain expression, or a (possibly sparse) array initializer.
//! Fields and variables without one are laid out as their type's default.

use super::aggregate::AggregateAssembler;
use super::array::ArrayExpander;
use super::expr::ExpressionEncoder;
use crate::core::error::{LayoutResult, SourceLoc};
use crate::dt::FragmentList;
use crate::ir::{Expr, FieldDecl, Initializer, StructDecl, Type};

impl<'s, 'arena> ExpressionEncoder<'s, 'arena> {
    pub fn encode_initializer(&mut self, init: &Initializer) -> LayoutResult<FragmentList> {
        match init {
            // Void initializers still need bytes in the data segment.
            Initializer::Void(ty) => Ok(FragmentList::zeros(self.size_of(ty))),
            Initializer::Expr(expr) => self.encode(expr),
            Initializer::Array(array) => ArrayExpander::encode_sparse(self, array),
        }
    }

    /// Encode a value stored into `field`; fixed arrays replicate a narrower value.
    pub fn encode_field_expr(&mut self, field: &FieldDecl, expr: &Expr) -> LayoutResult<FragmentList> {
        match field.ty.base() {
            Type::FixedArray { elem, dim } => ArrayExpander::expand(self, elem, *dim, Some(expr)),
            _ => self.encode(expr),
        }
    }

    pub fn encode_field_initializer(
        &mut self,
        field: &FieldDecl,
        init: &Initializer,
    ) -> LayoutResult<FragmentList> {
        match init {
            Initializer::Expr(expr) => self.encode_field_expr(field, expr),
            _ => self.encode_initializer(init),
        }
    }

    /// Encode the value a field holds when nothing was supplied for it.
    pub fn encode_field_default(&mut self, field: &FieldDecl) -> LayoutResult<FragmentList> {
        match &field.init {
            Some(init) => self.encode_field_initializer(field, init),
            None => self.encode_type_default(&field.ty),
        }
    }

    pub fn encode_type_default(&mut self, ty: &Type) -> LayoutResult<FragmentList> {
        match ty {
            Type::Alias(alias) => match &alias.init {
                Some(init) => self.encode_initializer(init),
                None => self.encode_type_default(&alias.base),
            },
            Type::FixedArray { elem, dim } | Type::Vector { elem, lanes: dim } => {
                ArrayExpander::expand(self, elem, *dim, None)
            }
            Type::Struct(decl) => self.encode_struct_default(decl),
            Type::Scalar(_) | Type::Pointer(_) | Type::DynArray(_) | Type::Class(_) => {
                Ok(FragmentList::zeros(self.size_of(ty)))
            }
        }
    }

    /// Static default image of a struct.
    pub fn encode_struct_default(&mut self, decl: &StructDecl) -> LayoutResult<FragmentList> {
        let elements = vec![None; decl.fields.len()];
        let values = AggregateAssembler::fill_values(self, decl, &elements);
        AggregateAssembler::assemble(self, decl, &values, &SourceLoc::default())
    }
}
