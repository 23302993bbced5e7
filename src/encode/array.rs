// This module implements the ArrayExpander, which lays out fixed-dimension arrays without
// emitting one fragment per element when the elements are zero. expand() folds a chain of
// nested fixed arrays into a single flat repetition count, encodes one representative
// element (the supplied value or the element type's default) and then either covers the
// remaining slots with one ZeroRun, when the representative is entirely zero, or repeats
// the representative's fragments once per slot. Array literals shorter than their
// dimension fill the missing slots with defaults under the same rule; longer ones are
// truncated after reporting. Sparse array initializers with explicit indices collect their
// supplied entries into an arena-allocated table sorted by index, so index collisions are
// detected before anything is laid out and the gaps become default runs. Dynamic arrays and pointers receive their payload out of line
// through the session's data pool.

//! Fixed array expansion and sparse array initializers.

use bumpalo::collections::Vec as BumpVec;
use hashbrown::HashSet;

use super::expr::ExpressionEncoder;
use crate::core::error::{LayoutError, LayoutResult, SourceLoc};
use crate::dt::FragmentList;
use crate::ir::{ArrayInitializer, Expr, Initializer, Type, TypeRef};

/// Array layout helpers.
pub struct ArrayExpander;

impl ArrayExpander {
    /// Lay out `dim` elements of type `elem`, from `supplied` or the element default.
    ///
    /// A supplied value narrower than the whole array is replicated to fill it.
    pub fn expand(
        enc: &mut ExpressionEncoder<'_, '_>,
        elem: &TypeRef,
        dim: u64,
        supplied: Option<&Expr>,
    ) -> LayoutResult<FragmentList> {
        let total = enc.size_of(elem) * dim;

        // Flatten nested fixed arrays unless the value already has the nested shape.
        let mut tnext = elem;
        while let Type::FixedArray { elem: inner, .. } = tnext.base() {
            if let Some(next) = supplied.and_then(|e| e.ty.next()) {
                if next.same_as(tnext) {
                    break;
                }
            }
            tnext = inner;
        }

        let representative = match supplied {
            Some(expr) => enc.encode(expr)?,
            None => enc.encode_type_default(tnext)?,
        };
        let unit = representative.size();
        if total == 0 {
            return Ok(FragmentList::new());
        }
        if unit == 0 || total % unit != 0 {
            return Err(LayoutError::internal(format!(
                "{} byte element does not tile a {} byte array of {}",
                unit, total, elem
            )));
        }

        let count = total / unit;
        log::trace!("expanding {} x {} ({} bytes each)", count, tnext, unit);
        let mut out = FragmentList::new();
        Self::repeat(enc, &mut out, representative, count);
        Ok(out)
    }

    /// Append `count` copies of `representative`, compacting zero elements.
    fn repeat(
        enc: &mut ExpressionEncoder<'_, '_>,
        out: &mut FragmentList,
        representative: FragmentList,
        count: u64,
    ) {
        if count == 0 {
            return;
        }
        let unit = representative.size();
        if representative.is_all_zeros() {
            out.push_zeros(unit * count);
            enc.session().record_zeros_compacted(unit * (count - 1));
            return;
        }
        for _ in 1..count {
            out.append(representative.clone());
        }
        out.append(representative);
    }

    /// Append `count` default-initialized elements of type `elem`.
    pub fn fill_defaults(
        enc: &mut ExpressionEncoder<'_, '_>,
        out: &mut FragmentList,
        elem: &TypeRef,
        count: u64,
    ) -> LayoutResult<()> {
        if count == 0 {
            return Ok(());
        }
        let representative = enc.encode_type_default(elem)?;
        Self::repeat(enc, out, representative, count);
        Ok(())
    }

    /// Array literal laid out into a fixed dimension.
    pub fn encode_literal(
        enc: &mut ExpressionEncoder<'_, '_>,
        elements: &[Expr],
        elem: &TypeRef,
        dim: u64,
        loc: &SourceLoc,
    ) -> LayoutResult<FragmentList> {
        let mut used = elements.len() as u64;
        if used > dim {
            enc.report(
                loc,
                LayoutError::TooManyInitializers { count: used, dim },
            );
            used = dim;
        }

        let mut out = FragmentList::new();
        for element in &elements[..used as usize] {
            out.append(enc.encode(element)?);
        }
        Self::fill_defaults(enc, &mut out, elem, dim - used)?;
        Ok(out)
    }

    /// Array initializer whose entries may carry explicit indices.
    pub fn encode_sparse(
        enc: &mut ExpressionEncoder<'_, '_>,
        init: &ArrayInitializer,
    ) -> LayoutResult<FragmentList> {
        let (elem, fixed_dim) = match init.ty.base() {
            Type::FixedArray { elem, dim } => (elem, Some(*dim)),
            Type::Vector { elem, lanes } => (elem, Some(*lanes)),
            Type::DynArray(elem) | Type::Pointer(elem) => (elem, None),
            other => {
                return Err(LayoutError::internal(format!(
                    "array initializer typed as {}",
                    other
                )))
            }
        };

        // Out-of-line payloads are bounded by the largest object the target can address.
        let limit = fixed_dim.unwrap_or_else(|| {
            let esize = enc.size_of(elem);
            let max = enc.target().max_object_size();
            if esize == 0 {
                max
            } else {
                max / esize
            }
        });

        // Only supplied entries are kept, so the table is independent of the indices used.
        let arena = enc.arena();
        let mut seen: HashSet<u64> = HashSet::with_capacity(init.entries.len());
        let mut slots: BumpVec<'_, (u64, FragmentList)> =
            BumpVec::with_capacity_in(init.entries.len(), arena);

        let mut next = 0u64;
        let mut extent = 0u64;
        let mut overflow_reported = false;
        for entry in &init.entries {
            let index = entry.index.unwrap_or(next);
            next = index.saturating_add(1);
            if index >= limit {
                if !overflow_reported {
                    enc.report(
                        &init.loc,
                        LayoutError::TooManyInitializers {
                            count: next,
                            dim: limit,
                        },
                    );
                    overflow_reported = true;
                }
                continue;
            }
            if !seen.insert(index) {
                enc.report(&init.loc, LayoutError::DuplicateArrayIndex { index });
                continue;
            }
            log::trace!("array slot {}", index);
            extent = extent.max(next);
            slots.push((index, Self::encode_element(enc, elem, &entry.value)?));
        }
        slots.sort_unstable_by_key(|(index, _)| *index);

        let len = fixed_dim.unwrap_or(extent);
        let mut payload = FragmentList::new();
        let mut cursor = 0u64;
        for (index, data) in slots.drain(..) {
            Self::fill_defaults(enc, &mut payload, elem, index - cursor)?;
            payload.append(data);
            cursor = index + 1;
        }
        Self::fill_defaults(enc, &mut payload, elem, len - cursor)?;

        let mut out = FragmentList::new();
        match init.ty.base() {
            Type::FixedArray { .. } | Type::Vector { .. } => return Ok(payload),
            Type::DynArray(_) => {
                out.append(enc.size_t(len));
                enc.push_out_of_line(&mut out, payload);
            }
            _ => enc.push_out_of_line(&mut out, payload),
        }
        Ok(out)
    }

    /// One entry's value; a narrower value stored into an array element is replicated.
    fn encode_element(
        enc: &mut ExpressionEncoder<'_, '_>,
        elem: &TypeRef,
        value: &Initializer,
    ) -> LayoutResult<FragmentList> {
        match (elem.base(), value) {
            (Type::FixedArray { elem: inner, dim }, Initializer::Expr(expr)) => {
                Self::expand(enc, inner, *dim, Some(expr))
            }
            _ => enc.encode_initializer(value),
        }
    }
}
