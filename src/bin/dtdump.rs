//! Static data layout dump.
//!
//! Encodes a set of built-in sample declarations for a chosen target and
//! prints each value's data image, the data pool and the session statistics.
//! Logging follows `RUST_LOG`.

use std::sync::Arc;

use bumpalo::Bump;
use clap::{Parser, ValueEnum};
use dtgen::ir::{AliasDecl, ArrayEntry, Precision};
use dtgen::{
    ArrayInitializer, ClassDecl, ClassInstance, EncodeSession, EncoderConfig, Endian, Expr,
    FieldDecl, FragmentList, Initializer, LayoutConvention, LayoutResult, SourceLoc, StructDecl,
    StructLiteral, Symbol, TargetConfig, Type,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TargetArg {
    X86_64,
    X86,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Sample {
    All,
    Scalars,
    Arrays,
    Structs,
    Classes,
}

#[derive(Parser)]
#[command(name = "dtdump", about = "Dump static data layouts", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Target preset
    #[arg(long, value_enum, default_value = "x86-64")]
    target: TargetArg,

    /// Lay out multi-byte values big-endian
    #[arg(long = "big-endian")]
    big_endian: bool,

    /// Class instances have no monitor slot
    #[arg(long = "no-monitor")]
    no_monitor: bool,

    /// Which sample declarations to encode
    #[arg(long, value_enum, default_value = "all")]
    sample: Sample,
}

impl Cli {
    fn config(&self) -> EncoderConfig {
        let mut target = match self.target {
            TargetArg::X86_64 => TargetConfig::x86_64(),
            TargetArg::X86 => TargetConfig::x86(),
        };
        if self.big_endian {
            target = target.with_endian(Endian::Big);
        }
        let convention = if self.no_monitor {
            LayoutConvention::NoMonitor
        } else {
            LayoutConvention::WithMonitor
        };
        EncoderConfig::new(target, convention)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let arena = Bump::new();
    let mut session = EncodeSession::new(&arena, cli.config());
    let wants = |sample: Sample| cli.sample == Sample::All || cli.sample == sample;

    if wants(Sample::Scalars) {
        dump_scalars(&mut session)?;
    }
    if wants(Sample::Arrays) {
        dump_arrays(&mut session)?;
    }
    if wants(Sample::Structs) {
        dump_structs(&mut session)?;
    }
    if wants(Sample::Classes) {
        dump_classes(&mut session)?;
    }

    for diagnostic in session.diagnostics() {
        eprintln!("{}", diagnostic);
    }

    println!("== data pool ==");
    for pooled in session.pool() {
        println!("{} ({:?}):", pooled.symbol, pooled.kind);
        print!("{}", pooled.data.materialize());
    }
    for func in session.take_pending_functions() {
        println!("pending function {}", func.name);
    }

    println!();
    print!("{}", session.stats());
    Ok(())
}

fn dump(name: &str, value: LayoutResult<FragmentList>) -> Result<(), Box<dyn std::error::Error>> {
    let list = value?;
    println!("{} = {}", name, list);
    print!("{}", list.materialize());
    log::debug!("{} fragments for {}", list.fragment_count(), name);
    Ok(())
}

fn dump_scalars(session: &mut EncodeSession<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let value = session.encode(&Expr::int(0x1234_5678, Type::int(4)));
    dump("answer", value)?;
    let value = session.encode(&Expr::real(1.5, Type::float(Precision::Extended)));
    dump("ratio", value)?;
    let value = session.encode(&Expr::string("hello", Type::dyn_array(Type::char8())));
    dump("greeting", value)?;
    Ok(())
}

fn dump_arrays(session: &mut EncodeSession<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let table = Type::fixed_array(Type::int(4), 256);
    let value = session.encode_type_default(&table);
    dump("table", value)?;

    let sparse = ArrayInitializer {
        ty: Type::fixed_array(Type::int(4), 3),
        entries: vec![
            ArrayEntry::at(0, Initializer::Expr(Expr::int(10, Type::int(4)))),
            ArrayEntry::at(2, Initializer::Expr(Expr::int(20, Type::int(4)))),
        ],
        loc: SourceLoc::new("sample.d", 3, 12),
    };
    let value = session.encode_initializer(&Initializer::Array(sparse));
    dump("sparse", value)?;

    let handle = Type::alias(Arc::new(AliasDecl {
        name: "Handle".into(),
        base: Type::int(4),
        init: Some(Initializer::Expr(Expr::int(u32::MAX as u64, Type::int(4)))),
    }));
    let value = session.encode_type_default(&Type::fixed_array(handle, 4));
    dump("handles", value)?;
    Ok(())
}

fn dump_structs(session: &mut EncodeSession<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let word = Arc::new(
        StructDecl::new("Word", 12)
            .field(FieldDecl::new("tag", 0, Type::int(4)))
            .field(FieldDecl::new("small", 4, Type::int(4)))
            .field(FieldDecl::new("large", 4, Type::int(8))),
    );
    let literal = StructLiteral::new(
        word.clone(),
        vec![
            Some(Expr::int(1, Type::int(4))),
            None,
            Some(Expr::int(0x0102_0304_0506_0708, Type::int(8))),
        ],
    );
    let value = session.encode(&Expr::struct_literal(literal, Type::struct_(word.clone())));
    dump("word", value)?;

    let value = session.encode_type_default(&Type::struct_(word));
    dump("Word.init", value)?;
    Ok(())
}

fn dump_classes(session: &mut EncodeSession<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let ptr = session.target().ptr_size as u64;
    let header = session.config().class_header_size();

    let printable = Arc::new(ClassDecl::interface("Printable"));
    let shape = Arc::new(
        ClassDecl::new("Shape", header + 2 * ptr)
            .field(FieldDecl::new("sides", header, Type::int(4)))
            .implements(printable.clone(), header + ptr)
            .defines_table(printable, 64),
    );
    let value = session.encode_class_init(&shape);
    dump("Shape.init", value)?;

    let square = Arc::new(
        ClassDecl::new("Square", header + 2 * ptr + 8)
            .with_base(shape.clone())
            .field(FieldDecl::new("side", header + 2 * ptr, Type::int(8))),
    );
    let instance = Arc::new(ClassInstance {
        class: square.clone(),
        fields: vec![
            Some(Expr::int(4, Type::int(4))),
            Some(Expr::int(3, Type::int(8))),
        ],
        symbol: Symbol::new("unit_square"),
    });
    let value = session.encode(&Expr::class_ref(instance, Type::class(square)));
    dump("square_ref", value)?;
    Ok(())
}
