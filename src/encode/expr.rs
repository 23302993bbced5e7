// This module implements ExpressionEncoder, the recursive dispatcher at the heart of the
// layout generator. encode() matches on the closed ExprKind enum and produces the
// FragmentList for the expression laid out as its resolved type: integers become zero
// runs or truncated target-endian bytes, reals and complex values follow their precision
// tag, strings are laid out inline (fixed arrays) or pooled behind a length+pointer or a
// bare pointer, array literals either fill their fixed dimension or move out of line,
// struct literals go to the AggregateAssembler, class instances to the
// ClassLayoutBuilder, and symbol/function/class references become SymbolOffset slots.
// Recoverable errors are recorded on the session and replaced by a zero run of the value's
// size so surrounding aggregates keep their offsets. A per-encoder reentrancy guard
// detects manifest constants whose initializer refers back to themselves.

//! Constant expression encoding.

use bumpalo::Bump;
use hashbrown::HashSet;

use super::aggregate::AggregateAssembler;
use super::array::ArrayExpander;
use super::class::ClassLayoutBuilder;
use crate::core::error::{LayoutError, LayoutResult, SourceLoc};
use crate::core::session::{EncodeSession, PoolKind};
use crate::core::target::{EncoderConfig, TargetConfig};
use crate::dt::{FragmentList, Symbol};
use crate::ir::{
    AliasedSymbol, ClassDecl, ClassInstance, Expr, ExprKind, Precision, Scalar, Storage,
    StringLiteral, StructLiteral, Type, VarDecl,
};

/// Recursive constant expression encoder.
///
/// One encoder serves one top-level value: the reentrancy guard it carries is
/// dropped together with it.
pub struct ExpressionEncoder<'s, 'arena> {
    session: &'s mut EncodeSession<'arena>,
    /// Manifest constants whose initializer is currently being encoded.
    in_use: HashSet<crate::ir::DeclId>,
}

impl<'s, 'arena> ExpressionEncoder<'s, 'arena> {
    pub fn new(session: &'s mut EncodeSession<'arena>) -> Self {
        Self {
            session,
            in_use: HashSet::new(),
        }
    }

    pub fn session(&mut self) -> &mut EncodeSession<'arena> {
        &mut *self.session
    }

    pub fn arena(&self) -> &'arena Bump {
        self.session.arena()
    }

    pub fn config(&self) -> EncoderConfig {
        self.session.config()
    }

    pub fn target(&self) -> TargetConfig {
        self.session.target()
    }

    pub fn ptr_size(&self) -> u32 {
        self.session.target().ptr_size
    }

    pub fn size_of(&self, ty: &Type) -> u64 {
        ty.size(&self.session.target())
    }

    pub(crate) fn report(&mut self, loc: &SourceLoc, error: LayoutError) {
        self.session.report(loc, error);
    }

    /// Pointer-sized unsigned integer, as a zero run when zero.
    pub(crate) fn size_t(&self, value: u64) -> FragmentList {
        let size = self.ptr_size() as u64;
        let mut out = FragmentList::new();
        if value == 0 {
            out.push_zeros(size);
        } else {
            out.push_bytes(self.target().encode_uint(value, size));
        }
        out
    }

    /// Encode `expr` laid out as `expr.ty`.
    pub fn encode(&mut self, expr: &Expr) -> LayoutResult<FragmentList> {
        match &expr.kind {
            ExprKind::Integer(value) => {
                let size = self.size_of(&expr.ty);
                let mut out = FragmentList::new();
                if *value == 0 {
                    out.push_zeros(size);
                } else {
                    out.push_bytes(self.target().encode_uint(*value, size));
                }
                Ok(out)
            }
            ExprKind::Real(value) => self.encode_real(expr, *value, 0.0),
            ExprKind::Complex { re, im } => self.encode_real(expr, *re, *im),
            ExprKind::Null => Ok(FragmentList::zeros(self.size_of(&expr.ty))),
            ExprKind::String(literal) => self.encode_string(expr, literal),
            ExprKind::ArrayLiteral(elements) => self.encode_array_literal(expr, elements),
            ExprKind::StructLiteral(literal) => {
                AggregateAssembler::assemble_literal(self, literal, &expr.loc)
            }
            ExprKind::SymbolOffset { var, offset } => match var.storage {
                Storage::Static | Storage::Code => {
                    let mut out = FragmentList::new();
                    out.push_symbol(var.symbol.clone(), *offset, self.ptr_size());
                    Ok(out)
                }
                Storage::ThreadLocal | Storage::Stack | Storage::Field => {
                    Ok(self.non_constant(expr))
                }
            },
            ExprKind::AddressOf(operand) => {
                let symbol = match &operand.kind {
                    ExprKind::StructLiteral(literal) => {
                        self.materialize_literal(literal, &operand.loc)?
                    }
                    ExprKind::ClassReference(instance) => {
                        self.materialize_instance(instance, &operand.loc)?
                    }
                    _ => return Ok(self.non_constant(expr)),
                };
                let mut out = FragmentList::new();
                out.push_symbol(symbol, 0, self.ptr_size());
                Ok(out)
            }
            ExprKind::Cast(operand) => self.encode_cast(expr, operand),
            ExprKind::Var(var) => self.encode_var(expr, var),
            ExprKind::Function(func) => {
                if func.captures {
                    self.report(
                        &expr.loc,
                        LayoutError::UnsupportedCapturingFunctionLiteral {
                            name: func.name.clone(),
                        },
                    );
                    return Ok(FragmentList::zeros(self.size_of(&expr.ty)));
                }
                self.session.request_function(func.clone());
                let mut out = FragmentList::new();
                out.push_symbol(func.symbol.clone(), 0, self.ptr_size());
                Ok(out)
            }
            ExprKind::Vector(operand) => self.encode_vector(expr, operand),
            ExprKind::ClassReference(instance) => {
                let interface = expr.ty.as_class().filter(|c| c.is_interface).cloned();
                self.encode_instance_ref(expr, instance, interface.as_deref())
            }
            ExprKind::Unresolved(_) => Ok(self.non_constant(expr)),
        }
    }

    /// Report `expr` as non-constant and return its zero placeholder.
    fn non_constant(&mut self, expr: &Expr) -> FragmentList {
        self.report(
            &expr.loc,
            LayoutError::NonConstantExpression {
                expr: expr.to_string(),
            },
        );
        FragmentList::zeros(self.size_of(&expr.ty).max(1))
    }

    fn encode_real(&mut self, expr: &Expr, re: f64, im: f64) -> LayoutResult<FragmentList> {
        let target = self.target();
        let encode_one = |precision: Precision, value: f64| match precision {
            Precision::Single => target.encode_f32(value),
            Precision::Double => target.encode_f64(value),
            Precision::Extended => target.encode_f80(value),
        };

        let mut out = FragmentList::new();
        match expr.ty.base() {
            Type::Scalar(Scalar::Float(p)) | Type::Scalar(Scalar::Imaginary(p)) => {
                out.push_bytes(encode_one(*p, re));
            }
            Type::Scalar(Scalar::Complex(p)) => {
                out.push_bytes(encode_one(*p, re));
                out.push_bytes(encode_one(*p, im));
            }
            other => {
                return Err(LayoutError::internal(format!(
                    "floating point literal {} typed as {}",
                    expr, other
                )))
            }
        }
        Ok(out)
    }

    fn encode_string(&mut self, expr: &Expr, literal: &StringLiteral) -> LayoutResult<FragmentList> {
        let ptr = self.ptr_size();
        let mut out = FragmentList::new();
        match expr.ty.base() {
            Type::DynArray(_) => {
                out.append(self.size_t(literal.len()));
                let symbol = self.session.pool_string(&literal.data, literal.char_size);
                out.push_symbol(symbol, 0, ptr);
            }
            Type::Pointer(_) => {
                let symbol = self.session.pool_string(&literal.data, literal.char_size);
                out.push_symbol(symbol, 0, ptr);
            }
            Type::FixedArray { elem, dim } => {
                let unit = self.size_of(elem);
                let len = literal.len();
                if len > *dim {
                    self.report(
                        &expr.loc,
                        LayoutError::TooManyInitializers {
                            count: len,
                            dim: *dim,
                        },
                    );
                    let keep = (*dim * literal.char_size as u64) as usize;
                    out.push_bytes(literal.data[..keep].to_vec());
                } else {
                    out.push_bytes(literal.data.clone());
                    out.push_zeros((*dim - len) * unit);
                }
            }
            other => {
                return Err(LayoutError::internal(format!(
                    "string literal typed as {}",
                    other
                )))
            }
        }
        Ok(out)
    }

    fn encode_array_literal(&mut self, expr: &Expr, elements: &[Expr]) -> LayoutResult<FragmentList> {
        match expr.ty.base() {
            Type::FixedArray { elem, dim } | Type::Vector { elem, lanes: dim } => {
                ArrayExpander::encode_literal(self, elements, elem, *dim, &expr.loc)
            }
            ty @ (Type::DynArray(_) | Type::Pointer(_)) => {
                let mut payload = FragmentList::new();
                for element in elements {
                    payload.append(self.encode(element)?);
                }
                let mut out = FragmentList::new();
                if matches!(ty, Type::DynArray(_)) {
                    out.append(self.size_t(elements.len() as u64));
                }
                self.push_out_of_line(&mut out, payload);
                Ok(out)
            }
            other => Err(LayoutError::internal(format!(
                "array literal typed as {}",
                other
            ))),
        }
    }

    /// Move `payload` into the pool and point at it; a null pointer if empty.
    pub(crate) fn push_out_of_line(&mut self, out: &mut FragmentList, payload: FragmentList) {
        let ptr = self.ptr_size();
        if payload.is_empty() {
            out.push_zeros(ptr as u64);
        } else {
            let symbol = self.session.pool_data(PoolKind::ArrayData, payload);
            out.push_symbol(symbol, 0, ptr);
        }
    }

    fn encode_cast(&mut self, expr: &Expr, operand: &Expr) -> LayoutResult<FragmentList> {
        match (operand.ty.as_class(), expr.ty.as_class()) {
            (Some(_), Some(to)) if to.is_interface => match &operand.kind {
                ExprKind::ClassReference(instance) => {
                    self.encode_instance_ref(operand, instance, Some(to.as_ref()))
                }
                _ => Err(LayoutError::internal(format!(
                    "class to interface cast of non-reference {}",
                    operand
                ))),
            },
            (Some(_), Some(_)) => self.encode(operand),
            _ => Ok(self.non_constant(expr)),
        }
    }

    fn encode_var(&mut self, expr: &Expr, var: &VarDecl) -> LayoutResult<FragmentList> {
        if var.manifest && !expr.ty.is_fixed_array() {
            if let Some(init) = &var.init {
                if !self.in_use.insert(var.id) {
                    self.report(
                        &expr.loc,
                        LayoutError::RecursiveConstantReference {
                            name: var.name.clone(),
                        },
                    );
                    return Ok(FragmentList::zeros(self.size_of(&expr.ty)));
                }
                log::trace!("inlining manifest constant {}", var.name);
                let result = self.encode_initializer(init);
                self.in_use.remove(&var.id);
                return result;
            }
        }

        match &var.aliased {
            Some(AliasedSymbol::StructInit(decl)) => self.encode_struct_default(decl),
            Some(AliasedSymbol::ClassInit(decl)) => {
                ClassLayoutBuilder::new(self.config()).build_static(self, decl, &expr.loc)
            }
            None => Ok(self.non_constant(expr)),
        }
    }

    fn encode_vector(&mut self, expr: &Expr, operand: &Expr) -> LayoutResult<FragmentList> {
        let lanes = match expr.ty.base() {
            Type::Vector { lanes, .. } => *lanes,
            other => {
                return Err(LayoutError::internal(format!(
                    "vector literal typed as {}",
                    other
                )))
            }
        };

        let mut out = FragmentList::new();
        match &operand.kind {
            ExprKind::ArrayLiteral(elements) => {
                for lane in 0..lanes as usize {
                    let element = elements.get(lane).ok_or_else(|| {
                        LayoutError::internal(format!(
                            "vector literal with {} of {} lanes",
                            elements.len(),
                            lanes
                        ))
                    })?;
                    out.append(self.encode(element)?);
                }
            }
            _ => {
                for _ in 0..lanes {
                    out.append(self.encode(operand)?);
                }
            }
        }
        Ok(out)
    }

    /// Pointer into a compile-time evaluated instance, at `interface`'s slot if given.
    fn encode_instance_ref(
        &mut self,
        reference: &Expr,
        instance: &ClassInstance,
        interface: Option<&ClassDecl>,
    ) -> LayoutResult<FragmentList> {
        let offset = match interface {
            Some(interface) => instance.class.interface_offset(interface).ok_or_else(|| {
                LayoutError::internal(format!(
                    "{} does not implement {}",
                    instance.class.name, interface.name
                ))
            })?,
            None => 0,
        };
        let symbol = self.materialize_instance(instance, &reference.loc)?;
        let mut out = FragmentList::new();
        out.push_symbol(symbol, offset, self.ptr_size());
        Ok(out)
    }

    /// Lay out a compile-time evaluated instance into its own symbol, once.
    fn materialize_instance(
        &mut self,
        instance: &ClassInstance,
        loc: &SourceLoc,
    ) -> LayoutResult<Symbol> {
        if self.session.begin_materialize(&instance.symbol) {
            let builder = ClassLayoutBuilder::new(self.config());
            let data = builder.build_instance(self, instance, loc)?;
            self.session
                .define(instance.symbol.clone(), PoolKind::Instance, data);
        }
        Ok(instance.symbol.clone())
    }

    /// Lay out a struct literal into separate storage.
    fn materialize_literal(
        &mut self,
        literal: &StructLiteral,
        loc: &SourceLoc,
    ) -> LayoutResult<Symbol> {
        match &literal.symbol {
            Some(symbol) => {
                if self.session.begin_materialize(symbol) {
                    let data = AggregateAssembler::assemble_literal(self, literal, loc)?;
                    self.session.define(symbol.clone(), PoolKind::Literal, data);
                }
                Ok(symbol.clone())
            }
            None => {
                let data = AggregateAssembler::assemble_literal(self, literal, loc)?;
                Ok(self.session.pool_data(PoolKind::Literal, data))
            }
        }
    }
}
