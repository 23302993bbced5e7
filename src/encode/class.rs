// This module implements the ClassLayoutBuilder, which lays out class instances for two
// callers: the static initializer image of a class, and the storage of an instance
// produced by compile-time evaluation. Both start with the instance header (dispatch
// table pointer, then the monitor slot unless the layout convention omits it) and recurse
// into the base chain so inherited fields are laid out before the level's own. Each level
// places its declared fields through the AggregateAssembler cursor rules, then the
// dispatch-pointer slots of the interfaces it implements, which point into the class-info
// symbol of the first class in the chain (starting at the most-derived one) that defines
// the interface's sub-table. The evaluated-instance path takes per-field values from a
// cache indexed over the base-first flattened field list. A cached encoding that is
// narrower than its field's storage is replicated in element-sized strides, since the
// evaluator hands over a single element for array fields filled with one value.

//! Class instance layout.

use bumpalo::collections::Vec as BumpVec;

use super::aggregate::AggregateAssembler;
use super::expr::ExpressionEncoder;
use crate::core::error::{LayoutError, LayoutResult, SourceLoc};
use crate::core::target::EncoderConfig;
use crate::dt::FragmentList;
use crate::ir::{ClassDecl, ClassInstance, FieldDecl, Initializer};

/// Builds class instance images.
#[derive(Debug, Clone, Copy)]
pub struct ClassLayoutBuilder {
    config: EncoderConfig,
}

impl ClassLayoutBuilder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Static initializer image of `class`.
    pub fn build_static(
        &self,
        enc: &mut ExpressionEncoder<'_, '_>,
        class: &ClassDecl,
        loc: &SourceLoc,
    ) -> LayoutResult<FragmentList> {
        log::debug!("laying out static initializer of {}", class.name);
        let mut asm = AggregateAssembler::new();
        self.emit_header(&mut asm, class);
        self.build_level(enc, &mut asm, class, class, None, loc)?;
        asm.finish(class.size)
    }

    /// Storage of a compile-time evaluated instance.
    pub fn build_instance(
        &self,
        enc: &mut ExpressionEncoder<'_, '_>,
        instance: &ClassInstance,
        loc: &SourceLoc,
    ) -> LayoutResult<FragmentList> {
        let class = &instance.class;
        log::debug!("laying out evaluated instance {} of {}", instance.symbol, class.name);

        // Base-first flattened field list, the indexing of `instance.fields`.
        let levels: Vec<&ClassDecl> = class.chain().collect();
        let fields = levels.iter().rev().flat_map(|level| level.fields.iter());

        let arena = enc.arena();
        let mut cache: BumpVec<'_, Option<FragmentList>> =
            BumpVec::with_capacity_in(class.total_field_count(), arena);
        for (i, field) in fields.enumerate() {
            let value = match instance.fields.get(i).and_then(Option::as_ref) {
                Some(expr) => {
                    log::trace!("evaluated field {} = {}", field.name, expr);
                    Some(enc.encode(expr)?)
                }
                None => None,
            };
            cache.push(value);
        }

        let mut asm = AggregateAssembler::new();
        self.emit_header(&mut asm, class);
        self.build_level(enc, &mut asm, class, class, Some(&cache[..]), loc)?;
        asm.finish(class.size)
    }

    fn emit_header(&self, asm: &mut AggregateAssembler, class: &ClassDecl) {
        let ptr = self.config.target.ptr_size;
        asm.push_symbol(class.vtable_symbol.clone(), 0, ptr);
        if self.config.convention.has_monitor() {
            asm.pad_to(self.config.class_header_size());
        }
    }

    /// Lay out `level` and its bases; `root` is the most-derived class.
    fn build_level(
        &self,
        enc: &mut ExpressionEncoder<'_, '_>,
        asm: &mut AggregateAssembler,
        level: &ClassDecl,
        root: &ClassDecl,
        cache: Option<&[Option<FragmentList>]>,
        loc: &SourceLoc,
    ) -> LayoutResult<()> {
        if let Some(base) = &level.base {
            self.build_level(enc, asm, base, root, cache, loc)?;
        }
        asm.pad_to(self.config.class_header_size());

        let first = level.base_field_count();
        for (i, field) in level.fields.iter().enumerate() {
            let cached = cache
                .and_then(|c| c.get(first + i))
                .and_then(Option::as_ref);
            match cached {
                Some(data) => Self::place_cached(enc, asm, field, data.clone(), loc)?,
                None => Self::place_declared(enc, asm, field, loc)?,
            }
        }

        let ptr = self.config.target.ptr_size;
        for slot in &level.interfaces {
            let (holder, table) = root
                .chain()
                .find_map(|c| c.interface_table_offset(&slot.interface).map(|off| (c, off)))
                .ok_or_else(|| {
                    LayoutError::internal(format!(
                        "no class in the chain of {} defines a table for {}",
                        root.name, slot.interface.name
                    ))
                })?;
            if slot.offset < asm.filled() {
                return Err(LayoutError::internal(format!(
                    "interface {} slot at {} overlaps data ending at {}",
                    slot.interface.name,
                    slot.offset,
                    asm.filled()
                )));
            }
            log::trace!(
                "interface {} at {} -> {}+{}",
                slot.interface.name,
                slot.offset,
                holder.info_symbol,
                table
            );
            asm.pad_to(slot.offset);
            asm.push_symbol(holder.info_symbol.clone(), table, ptr);
        }

        asm.pad_to(level.size);
        Ok(())
    }

    /// Field value from its declaration: initializer, or type default when not overlapped.
    fn place_declared(
        enc: &mut ExpressionEncoder<'_, '_>,
        asm: &mut AggregateAssembler,
        field: &FieldDecl,
        loc: &SourceLoc,
    ) -> LayoutResult<()> {
        let data = match &field.init {
            Some(Initializer::Void(_)) => return Ok(()),
            Some(init) => enc.encode_field_initializer(field, init)?,
            None if field.offset >= asm.filled() => enc.encode_type_default(&field.ty)?,
            None => return Ok(()),
        };
        asm.place(enc, field, data, loc);
        Ok(())
    }

    fn place_cached(
        enc: &mut ExpressionEncoder<'_, '_>,
        asm: &mut AggregateAssembler,
        field: &FieldDecl,
        data: FragmentList,
        loc: &SourceLoc,
    ) -> LayoutResult<()> {
        if field.offset < asm.filled() {
            enc.report(
                loc,
                LayoutError::DuplicateUnionInitialization {
                    field: field.name.clone(),
                },
            );
            return Ok(());
        }

        let vsz = enc.size_of(&field.ty);
        let sz = data.size();
        let placeholder = vsz == 0 && data.is_all_zeros() && !field.ty.is_fixed_array();
        if sz == vsz || placeholder {
            asm.place(enc, field, data, loc);
            return Ok(());
        }
        if sz > vsz {
            if vsz == 0 && field.ty.is_fixed_array() {
                enc.report(
                    loc,
                    LayoutError::ZeroLengthArrayInitializer {
                        field: field.name.clone(),
                    },
                );
                return Ok(());
            }
            return Err(LayoutError::internal(format!(
                "{} byte value for {} byte field {}",
                sz, vsz, field.name
            )));
        }

        let dim = field.ty.flat_dim();
        if !field.ty.is_fixed_array() || sz * dim > vsz {
            return Err(LayoutError::internal(format!(
                "{} byte value does not replicate over field {} of {}",
                sz, field.name, field.ty
            )));
        }
        let stride = vsz / dim;
        let mut replicated = FragmentList::new();
        for i in 0..dim {
            replicated.pad_to(i * stride);
            replicated.append(data.clone());
        }
        log::trace!("replicated {} x {} bytes into {}", dim, sz, field.name);
        asm.place(enc, field, replicated, loc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::EncodeSession;
    use crate::core::target::LayoutConvention;
    use crate::dt::Symbol;
    use crate::ir::{Expr, Type};
    use bumpalo::Bump;
    use std::sync::Arc;

    fn point_class() -> Arc<ClassDecl> {
        Arc::new(
            ClassDecl::new("Point", 24)
                .field(FieldDecl::new("x", 16, Type::int(4)))
                .field(
                    FieldDecl::new("y", 20, Type::int(4))
                        .with_init(Initializer::Expr(Expr::int(3, Type::int(4)))),
                ),
        )
    }

    #[test]
    fn test_static_header_and_fields() {
        let arena = Bump::new();
        let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());
        let dt = session.encode_class_init(&point_class()).unwrap();

        let image = dt.materialize();
        assert_eq!(image.len(), 24);
        let vtbl = image.relocation_at(0).unwrap();
        assert_eq!(vtbl.target, Symbol::new("Point.__vtbl"));
        assert_eq!(&image.bytes[8..16], &[0u8; 8]);
        assert_eq!(&image.bytes[20..24], &[3u8, 0, 0, 0]);
    }

    #[test]
    fn test_no_monitor_convention() {
        let arena = Bump::new();
        let config = EncoderConfig::new(
            EncoderConfig::x86_64().target,
            LayoutConvention::NoMonitor,
        );
        let mut session = EncodeSession::new(&arena, config);
        let class = ClassDecl::new("Small", 12).field(FieldDecl::new("v", 8, Type::int(4)));
        let dt = session.encode_class_init(&class).unwrap();
        assert_eq!(dt.size(), 12);
        assert_eq!(dt.relocation_count(), 1);
    }

    #[test]
    fn test_void_field_left_to_padding() {
        let arena = Bump::new();
        let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());
        let class = ClassDecl::new("Buf", 32).field(
            FieldDecl::new("data", 16, Type::fixed_array(Type::int(1), 16))
                .with_init(Initializer::Void(Type::fixed_array(Type::int(1), 16))),
        );
        let dt = session.encode_class_init(&class).unwrap();
        assert_eq!(dt.size(), 32);
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn test_missing_interface_table_is_fatal() {
        let arena = Bump::new();
        let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());
        let iface = Arc::new(ClassDecl::interface("I"));
        let class = ClassDecl::new("C", 24).implements(iface, 16);
        let err = session.encode_class_init(&class).unwrap_err();
        assert!(!err.is_recoverable());
    }
}
