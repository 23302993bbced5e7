//! Test static class initializer layout.
//!
//! Checks the instance header under both layout conventions, inherited
//! fields, and the dispatch-pointer slots of implemented interfaces.

use std::sync::Arc;

use bumpalo::Bump;
use dtgen::ir::AliasedSymbol;
use dtgen::{
    ClassDecl, EncodeSession, EncoderConfig, Expr, FieldDecl, Initializer, LayoutConvention,
    LayoutError, SourceLoc, Symbol, TargetConfig, Type, VarDecl,
};

#[test]
fn test_interface_slot_on_32_bit() {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86());

    let iface = Arc::new(ClassDecl::interface("Drawable"));
    let class = ClassDecl::new("Sprite", 20)
        .field(
            FieldDecl::new("frame", 8, Type::int(4))
                .with_init(Initializer::Expr(Expr::int(7, Type::int(4)))),
        )
        .implements(iface.clone(), 12)
        .defines_table(iface, 40);

    let image = session.encode_class_init(&class).unwrap().materialize();
    assert_eq!(image.len(), 20);

    let vtbl = image.relocation_at(0).unwrap();
    assert_eq!(vtbl.target, Symbol::new("Sprite.__vtbl"));
    assert_eq!(vtbl.width, 4);
    assert_eq!(&image.bytes[4..8], &[0u8; 4]);
    assert_eq!(&image.bytes[8..12], &[7u8, 0, 0, 0]);

    let slot = image.relocation_at(12).unwrap();
    assert_eq!(slot.target, Symbol::new("Sprite.__Class"));
    assert_eq!(slot.addend, 40);
    assert_eq!(&image.bytes[16..], &[0u8; 4]);
    assert_eq!(image.relocations.len(), 2);
}

#[test]
fn test_inherited_fields_come_first() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let base = Arc::new(
        ClassDecl::new("Animal", 24).field(
            FieldDecl::new("legs", 16, Type::int(4))
                .with_init(Initializer::Expr(Expr::int(4, Type::int(4)))),
        ),
    );
    let derived = ClassDecl::new("Dog", 32)
        .with_base(base)
        .field(
            FieldDecl::new("tricks", 24, Type::int(8))
                .with_init(Initializer::Expr(Expr::int(3, Type::int(8)))),
        );

    let image = session.encode_class_init(&derived).unwrap().materialize();
    assert_eq!(image.len(), 32);
    assert_eq!(
        image.relocation_at(0).unwrap().target,
        Symbol::new("Dog.__vtbl")
    );
    assert_eq!(&image.bytes[16..24], &[4u8, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(&image.bytes[24..], &[3u8, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_base_interface_uses_derived_table() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let iface = Arc::new(ClassDecl::interface("Named"));
    let base = Arc::new(
        ClassDecl::new("Base", 24)
            .implements(iface.clone(), 16)
            .defines_table(iface.clone(), 64),
    );
    let derived = ClassDecl::new("Derived", 32)
        .with_base(base.clone())
        .field(FieldDecl::new("extra", 24, Type::int(8)))
        .defines_table(iface, 96);

    let image = session.encode_class_init(&derived).unwrap().materialize();
    let slot = image.relocation_at(16).unwrap();
    assert_eq!(slot.target, Symbol::new("Derived.__Class"));
    assert_eq!(slot.addend, 96);

    let image = session.encode_class_init(&base).unwrap().materialize();
    let slot = image.relocation_at(16).unwrap();
    assert_eq!(slot.target, Symbol::new("Base.__Class"));
    assert_eq!(slot.addend, 64);
}

#[test]
fn test_missing_interface_table() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let iface = Arc::new(ClassDecl::interface("Orphan"));
    let class = ClassDecl::new("Lonely", 24).implements(iface, 16);
    let err = session.encode_class_init(&class).unwrap_err();
    assert!(matches!(err, LayoutError::InternalLayoutInconsistency { .. }));
}

#[test]
fn test_without_monitor_slot() {
    let arena = Bump::new();
    let config = EncoderConfig::new(TargetConfig::x86(), LayoutConvention::NoMonitor);
    let mut session = EncodeSession::new(&arena, config);
    assert_eq!(config.class_header_size(), 4);

    let class = ClassDecl::new("Compact", 8).field(
        FieldDecl::new("id", 4, Type::int(4))
            .with_init(Initializer::Expr(Expr::int(1, Type::int(4)))),
    );
    let image = session.encode_class_init(&class).unwrap().materialize();
    assert_eq!(image.bytes, vec![0, 0, 0, 0, 1, 0, 0, 0]);
    assert_eq!(image.relocations.len(), 1);
}

#[test]
fn test_overlapping_initialized_fields() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let class = ClassDecl::new("Variant", 24)
        .field(
            FieldDecl::new("as_int", 16, Type::int(8))
                .with_init(Initializer::Expr(Expr::int(1, Type::int(8)))),
        )
        .field(
            FieldDecl::new("as_half", 16, Type::int(4))
                .with_init(Initializer::Expr(Expr::int(2, Type::int(4)))),
        )
        .at(SourceLoc::new("variant.d", 3, 7));
    let image = session.encode_class_init(&class).unwrap().materialize();
    assert_eq!(&image.bytes[16..], &[1u8, 0, 0, 0, 0, 0, 0, 0]);

    let diags = session.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags[0].to_string(),
        "variant.d(3,7): Error: duplicated union initialization for as_half"
    );
}

#[test]
fn test_uninitialized_union_member_is_skipped() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let class = ClassDecl::new("Shared", 24)
        .field(
            FieldDecl::new("word", 16, Type::int(8))
                .with_init(Initializer::Expr(Expr::int(5, Type::int(8)))),
        )
        .field(FieldDecl::new("half", 16, Type::int(4)));
    let image = session.encode_class_init(&class).unwrap().materialize();
    assert_eq!(image.bytes[16], 5);
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_class_init_symbol_reference() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let class = Arc::new(ClassDecl::new("Empty", 16));
    let mut init = VarDecl::global(3, "Empty.__init", Type::class(class.clone()));
    init.aliased = Some(AliasedSymbol::ClassInit(class));
    let dt = session.encode(&Expr::var(Arc::new(init))).unwrap();
    assert_eq!(dt.size(), 16);
    assert_eq!(dt.relocation_count(), 1);
}
