// This module implements the AggregateAssembler, the field layout algorithm shared by
// struct literals, struct default images and both class paths. The assembler owns the
// fragment list being built; its current end is the `filled` cursor. Placing a field
// zero-fills the gap between the cursor and the field's declared offset, appends the
// field's encoding and moves the cursor to the end of the field. A value whose field
// starts below the cursor overlaps storage already claimed by an earlier union member and
// is reported as a duplicate union initialization instead of being merged. Struct
// literals add a forward scan on top: for each pending value the nearest field at or
// past the cursor is placed first, since union members may be supplied out of storage
// order. The assembled image is always padded to the aggregate's declared size.

//! Struct and class field assembly.

use super::expr::ExpressionEncoder;
use crate::core::error::{LayoutError, LayoutResult, SourceLoc};
use crate::dt::{FragmentList, Symbol};
use crate::ir::{Expr, FieldDecl, StructDecl, StructLiteral};

/// Value to lay out for one declared field.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'v> {
    /// Explicitly supplied by the literal.
    Supplied(&'v Expr),
    /// The field's declared initializer, or its type default.
    Declared,
}

/// Builder for one aggregate image.
#[derive(Debug, Default)]
pub struct AggregateAssembler {
    out: FragmentList,
}

impl AggregateAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write cursor: bytes laid out so far.
    pub fn filled(&self) -> u64 {
        self.out.size()
    }

    pub fn pad_to(&mut self, offset: u64) {
        self.out.pad_to(offset);
    }

    pub fn push_symbol(&mut self, target: Symbol, offset: u64, width: u32) {
        self.out.push_symbol(target, offset, width);
    }

    pub fn append(&mut self, data: FragmentList) {
        self.out.append(data);
    }

    /// Place `data` as the value of `field`.
    ///
    /// Returns false, after reporting, when the field overlaps what is
    /// already laid out.
    pub fn place(
        &mut self,
        enc: &mut ExpressionEncoder<'_, '_>,
        field: &FieldDecl,
        data: FragmentList,
        loc: &SourceLoc,
    ) -> bool {
        if field.offset < self.filled() {
            enc.report(
                loc,
                LayoutError::DuplicateUnionInitialization {
                    field: field.name.clone(),
                },
            );
            return false;
        }
        let width = enc.size_of(&field.ty);
        if width == 0 && data.is_all_zeros() {
            // Zero-size storage keeps no placeholder bytes.
            log::trace!("field {} at {} has no storage", field.name, field.offset);
            return true;
        }
        log::trace!(
            "field {} at {} ({} bytes)",
            field.name,
            field.offset,
            data.size()
        );
        self.pad_to(field.offset);
        self.out.append(data);
        self.pad_to(field.offset + width);
        true
    }

    /// Pad to `size` and return the image.
    pub fn finish(mut self, size: u64) -> LayoutResult<FragmentList> {
        if self.filled() > size {
            return Err(LayoutError::internal(format!(
                "aggregate image of {} bytes exceeds its size {}",
                self.filled(),
                size
            )));
        }
        self.pad_to(size);
        Ok(self.out)
    }

    /// Pair literal elements with fields, defaulting absent non-overlapping fields.
    ///
    /// An absent field gets its declared/default value unless it overlaps a
    /// supplied field or an earlier defaulted one.
    pub fn fill_values<'v>(
        enc: &ExpressionEncoder<'_, '_>,
        decl: &StructDecl,
        elements: &'v [Option<Expr>],
    ) -> Vec<Option<FieldValue<'v>>> {
        let target = enc.target();
        let mut claimed: Vec<&FieldDecl> = decl
            .fields
            .iter()
            .enumerate()
            .filter(|(i, _)| matches!(elements.get(*i), Some(Some(_))))
            .map(|(_, f)| f)
            .collect();

        let mut values = Vec::with_capacity(decl.fields.len());
        for (i, field) in decl.fields.iter().enumerate() {
            match elements.get(i).and_then(Option::as_ref) {
                Some(expr) => values.push(Some(FieldValue::Supplied(expr))),
                None if claimed.iter().any(|c| c.overlaps(field, &target)) => values.push(None),
                None => {
                    claimed.push(field);
                    values.push(Some(FieldValue::Declared));
                }
            }
        }
        values
    }

    /// Lay out `values` against `decl`'s fields.
    pub fn assemble(
        enc: &mut ExpressionEncoder<'_, '_>,
        decl: &StructDecl,
        values: &[Option<FieldValue<'_>>],
        loc: &SourceLoc,
    ) -> LayoutResult<FragmentList> {
        let fields = &decl.fields;
        let n = fields.len().min(values.len());
        let mut done = vec![false; n];
        let mut asm = Self::new();

        let mut i = 0;
        while i < n {
            if done[i] || values[i].is_none() {
                i += 1;
                continue;
            }

            // Nearest pending field at or past the cursor; ties keep the earlier one.
            let filled = asm.filled();
            let mut nearest: Option<usize> = None;
            for j in i..n {
                if done[j] || values[j].is_none() || fields[j].offset < filled {
                    continue;
                }
                match nearest {
                    Some(k) if fields[k].offset <= fields[j].offset => {}
                    _ => nearest = Some(j),
                }
            }

            let Some(k) = nearest else {
                enc.report(
                    loc,
                    LayoutError::DuplicateUnionInitialization {
                        field: fields[i].name.clone(),
                    },
                );
                done[i] = true;
                i += 1;
                continue;
            };

            let field = &fields[k];
            let data = match values[k] {
                Some(FieldValue::Supplied(expr)) => enc.encode_field_expr(field, expr)?,
                Some(FieldValue::Declared) => enc.encode_field_default(field)?,
                None => FragmentList::new(),
            };
            asm.place(enc, field, data, loc);
            done[k] = true;
            if k == i {
                i += 1;
            }
        }

        asm.finish(decl.size)
    }

    pub fn assemble_literal(
        enc: &mut ExpressionEncoder<'_, '_>,
        literal: &StructLiteral,
        loc: &SourceLoc,
    ) -> LayoutResult<FragmentList> {
        let values = Self::fill_values(enc, &literal.decl, &literal.elements);
        Self::assemble(enc, &literal.decl, &values, loc)
    }
}
