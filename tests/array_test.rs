//! Test array layout.
//!
//! Covers zero-run compaction of large arrays, array literals shorter or
//! longer than their dimension, indexed array initializers and the
//! out-of-line payloads of dynamic arrays.

use std::sync::Arc;

use bumpalo::Bump;
use dtgen::{
    ArrayEntry, ArrayInitializer, EncodeSession, EncoderConfig, Expr, FieldDecl, Initializer,
    LayoutError, PoolKind, SourceLoc, StructDecl, StructLiteral, Type,
};

fn int(value: u64) -> Expr {
    Expr::int(value, Type::int(4))
}

fn entry(index: u64, value: u64) -> ArrayEntry {
    ArrayEntry::at(index, Initializer::Expr(int(value)))
}

fn ints(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn test_zero_array_uses_constant_fragments() {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    for n in [2u64, 100, 100_000] {
        let dt = session
            .encode_type_default(&Type::fixed_array(Type::int(4), n))
            .unwrap();
        assert_eq!(dt.size(), n * 4);
        assert_eq!(dt.fragment_count(), 1);
        assert_eq!(dt.materialize().len(), (n * 4) as usize);
    }
    assert!(session.stats().zero_bytes_compacted > 0);
}

#[test]
fn test_indexed_initializer_fills_gaps() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let init = Initializer::Array(ArrayInitializer {
        ty: Type::fixed_array(Type::int(4), 3),
        entries: vec![entry(0, 10), entry(2, 20)],
        loc: SourceLoc::default(),
    });
    let dt = session.encode_initializer(&init).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![10, 0, 20]);
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_duplicate_index_keeps_first() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let init = Initializer::Array(ArrayInitializer {
        ty: Type::fixed_array(Type::int(4), 3),
        entries: vec![entry(1, 10), entry(1, 20)],
        loc: SourceLoc::new("dup.d", 4, 1),
    });
    let dt = session.encode_initializer(&init).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![0, 10, 0]);

    let diags = session.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].error, LayoutError::DuplicateArrayIndex { index: 1 });
    assert_eq!(
        diags[0].to_string(),
        "dup.d(4,1): Error: duplicate initializations for index 1"
    );
}

#[test]
fn test_literal_longer_than_dimension() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let literal = Expr::array(
        vec![int(1), int(2), int(3)],
        Type::fixed_array(Type::int(4), 2),
    );
    let dt = session.encode(&literal).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![1, 2]);
    assert!(matches!(
        session.diagnostics()[0].error,
        LayoutError::TooManyInitializers { count: 3, dim: 2 }
    ));
}

#[test]
fn test_literal_shorter_than_dimension() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let literal = Expr::array(vec![int(7)], Type::fixed_array(Type::int(4), 1000));
    let dt = session.encode(&literal).unwrap();
    assert_eq!(dt.size(), 4000);
    assert_eq!(dt.fragment_count(), 2);
}

#[test]
fn test_dynamic_array_literal_goes_out_of_line() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let literal = Expr::array(vec![int(1), int(2)], Type::dyn_array(Type::int(4)));
    let image = session.encode(&literal).unwrap().materialize();
    assert_eq!(image.len(), 16);
    assert_eq!(&image.bytes[..8], &[2u8, 0, 0, 0, 0, 0, 0, 0]);

    let reloc = image.relocation_at(8).unwrap();
    let pooled = session.lookup(&reloc.target).unwrap();
    assert_eq!(pooled.kind, PoolKind::ArrayData);
    assert_eq!(ints(&pooled.data.materialize().bytes), vec![1, 2]);

    // Empty payloads become a null pointer.
    let empty = Expr::array(Vec::new(), Type::pointer(Type::int(4)));
    let dt = session.encode(&empty).unwrap();
    assert!(dt.is_all_zeros());
    assert_eq!(dt.size(), 8);
}

#[test]
fn test_array_field_replicates_scalar() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let grid = Type::fixed_array(Type::fixed_array(Type::int(4), 2), 2);
    let decl = Arc::new(
        StructDecl::new("Grid", 20)
            .field(FieldDecl::new("cells", 0, grid))
            .field(FieldDecl::new("tag", 16, Type::int(4))),
    );
    let literal = StructLiteral::new(decl.clone(), vec![Some(int(5)), Some(int(1))]);
    let dt = session
        .encode(&Expr::struct_literal(literal, Type::struct_(decl)))
        .unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![5, 5, 5, 5, 1]);
}

#[test]
fn test_vector_broadcast_and_lanes() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());
    let v4 = Type::vector(Type::int(4), 4);

    let dt = session.encode(&Expr::vector(int(9), v4.clone())).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![9, 9, 9, 9]);

    let lanes = Expr::array(
        vec![int(1), int(2), int(3), int(4)],
        Type::fixed_array(Type::int(4), 4),
    );
    let dt = session.encode(&Expr::vector(lanes, v4)).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![1, 2, 3, 4]);
}

#[test]
fn test_sparse_dynamic_array_count() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86());

    let init = Initializer::Array(ArrayInitializer {
        ty: Type::dyn_array(Type::int(4)),
        entries: vec![
            entry(3, 30),
            ArrayEntry::next(Initializer::Expr(int(40))),
        ],
        loc: SourceLoc::default(),
    });
    let image = session.encode_initializer(&init).unwrap().materialize();
    assert_eq!(&image.bytes[..4], &[5u8, 0, 0, 0]);

    let reloc = image.relocation_at(4).unwrap();
    let payload = &session.lookup(&reloc.target).unwrap().data;
    assert_eq!(ints(&payload.materialize().bytes), vec![0, 0, 0, 30, 40]);
}

#[test]
fn test_vector_initializer_lanes() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());
    let v4 = Type::vector(Type::int(4), 4);

    let init = Initializer::Array(ArrayInitializer {
        ty: v4.clone(),
        entries: (1..=4)
            .map(|v| ArrayEntry::next(Initializer::Expr(int(v))))
            .collect(),
        loc: SourceLoc::default(),
    });
    let dt = session.encode_initializer(&init).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![1, 2, 3, 4]);

    let init = Initializer::Array(ArrayInitializer {
        ty: v4,
        entries: vec![entry(1, 5)],
        loc: SourceLoc::default(),
    });
    let dt = session.encode_initializer(&init).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![0, 5, 0, 0]);
    assert!(session.diagnostics().is_empty());
}

#[test]
fn test_largest_index_is_out_of_range() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let init = Initializer::Array(ArrayInitializer {
        ty: Type::fixed_array(Type::int(4), 3),
        entries: vec![
            entry(u64::MAX, 7),
            ArrayEntry::next(Initializer::Expr(int(8))),
        ],
        loc: SourceLoc::default(),
    });
    let dt = session.encode_initializer(&init).unwrap();
    assert_eq!(ints(&dt.materialize().bytes), vec![0, 0, 0]);

    let diags = session.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags[0].error,
        LayoutError::TooManyInitializers {
            count: u64::MAX,
            dim: 3
        }
    );
}

#[test]
fn test_dynamic_array_extent_is_bounded() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86());

    let init = Initializer::Array(ArrayInitializer {
        ty: Type::dyn_array(Type::int(4)),
        entries: vec![entry(0, 1), entry(u64::MAX, 2)],
        loc: SourceLoc::default(),
    });
    let image = session.encode_initializer(&init).unwrap().materialize();
    assert_eq!(&image.bytes[..4], &[1u8, 0, 0, 0]);

    let reloc = image.relocation_at(4).unwrap();
    let payload = &session.lookup(&reloc.target).unwrap().data;
    assert_eq!(ints(&payload.materialize().bytes), vec![1]);
    assert_eq!(
        session.diagnostics()[0].error,
        LayoutError::TooManyInitializers {
            count: u64::MAX,
            dim: (1u64 << 31) / 4
        }
    );
}

#[test]
fn test_single_entry_in_huge_array() {
    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, EncoderConfig::x86_64());

    let init = Initializer::Array(ArrayInitializer {
        ty: Type::fixed_array(Type::int(4), 1 << 24),
        entries: vec![entry(0, 1)],
        loc: SourceLoc::default(),
    });
    let dt = session.encode_initializer(&init).unwrap();
    assert_eq!(dt.size(), 4 << 24);
    assert_eq!(dt.fragment_count(), 2);
}
