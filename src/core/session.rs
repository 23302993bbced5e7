// This module provides arena-based encoding session management using the bumpalo crate.
// EncodeSession is the central hub for one layout pass: it borrows the caller's arena for
// scratch tables, holds the encoder configuration, and owns every piece of mutable state
// the pass produces: the data pool (pooled string blobs, out-of-line array payloads, and
// the separately materialized storage of struct literals and compile-time evaluated class
// instances), the set of instance symbols already materialized, function literals waiting
// for code emission, recorded diagnostics, and statistics. Each top-level encode call gets
// a fresh ExpressionEncoder so that the manifest-constant reentrancy guard never outlives
// the call. Nothing is shared between sessions, so independent values may be encoded on
// separate sessions in parallel. SessionStats tracks values encoded, bytes emitted,
// relocations, compacted zero bytes, pooled blobs and diagnostics.

//! Arena-based encoding session management.
//!
//! All state produced while laying out static data lives here and is handed
//! back to the caller through the `take_*` methods once encoding is done.

use std::fmt;
use std::sync::Arc;

use bumpalo::Bump;
use hashbrown::{HashMap, HashSet};

use super::error::{Diagnostic, DiagnosticSink, LayoutError, LayoutResult, SourceLoc};
use super::target::{EncoderConfig, TargetConfig};
use crate::dt::{FragmentList, Symbol};
use crate::encode::{ClassLayoutBuilder, ExpressionEncoder};
use crate::ir::{ClassDecl, Expr, FuncLiteral, Initializer, Type};

/// What a pooled blob holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Terminated string text.
    String,
    /// Out-of-line payload of a dynamic array or pointer.
    ArrayData,
    /// Storage of a struct literal whose address was taken.
    Literal,
    /// Storage of a compile-time evaluated class instance.
    Instance,
}

/// A symbol defined by the session that the object writer must emit.
#[derive(Debug, Clone)]
pub struct PooledData {
    pub symbol: Symbol,
    pub kind: PoolKind,
    pub data: FragmentList,
}

/// Arena-based encoding session.
pub struct EncodeSession<'arena> {
    /// Arena for scratch tables.
    arena: &'arena Bump,

    config: EncoderConfig,

    stats: SessionStats,

    /// Symbols defined during the pass, in definition order.
    pool: Vec<PooledData>,

    /// String blobs by content (including the terminator).
    pooled_strings: HashMap<Vec<u8>, Symbol>,

    /// Instance and literal symbols already materialized or in progress.
    materialized: HashSet<Symbol>,

    pending_functions: Vec<Arc<FuncLiteral>>,

    diagnostics: Vec<Diagnostic>,

    next_blob: u32,
}

impl<'arena> EncodeSession<'arena> {
    /// Create a new encoding session with the given arena.
    pub fn new(arena: &'arena Bump, config: EncoderConfig) -> Self {
        Self {
            arena,
            config,
            stats: SessionStats::default(),
            pool: Vec::new(),
            pooled_strings: HashMap::new(),
            materialized: HashSet::new(),
            pending_functions: Vec::new(),
            diagnostics: Vec::new(),
            next_blob: 0,
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    pub fn config(&self) -> EncoderConfig {
        self.config
    }

    pub fn target(&self) -> TargetConfig {
        self.config.target
    }

    /// Encode a constant expression as its resolved type.
    pub fn encode(&mut self, expr: &Expr) -> LayoutResult<FragmentList> {
        log::debug!("encoding {} as {}", expr, expr.ty);
        let result = ExpressionEncoder::new(self).encode(expr);
        self.finish_value(result)
    }

    /// Encode a declaration initializer.
    pub fn encode_initializer(&mut self, init: &Initializer) -> LayoutResult<FragmentList> {
        let result = ExpressionEncoder::new(self).encode_initializer(init);
        self.finish_value(result)
    }

    /// Encode the default value of a type.
    pub fn encode_type_default(&mut self, ty: &Type) -> LayoutResult<FragmentList> {
        log::debug!("encoding default of {}", ty);
        let result = ExpressionEncoder::new(self).encode_type_default(ty);
        self.finish_value(result)
    }

    /// Encode the static initializer image of a class.
    pub fn encode_class_init(&mut self, class: &ClassDecl) -> LayoutResult<FragmentList> {
        log::debug!("encoding static initializer of class {}", class.name);
        let builder = ClassLayoutBuilder::new(self.config);
        let result = builder.build_static(&mut ExpressionEncoder::new(self), class, &class.loc);
        self.finish_value(result)
    }

    fn finish_value(&mut self, result: LayoutResult<FragmentList>) -> LayoutResult<FragmentList> {
        match &result {
            Ok(list) => {
                self.stats.values_encoded += 1;
                self.stats.bytes_emitted += list.size();
                self.stats.relocations += list.relocation_count();
                log::trace!("encoded {} bytes: {}", list.size(), list);
            }
            Err(err) => log::error!("layout failed: {}", err),
        }
        result
    }

    /// Record a recoverable error.
    pub fn report(&mut self, loc: &SourceLoc, error: LayoutError) {
        log::warn!("{}: {}", loc, error);
        self.stats.diagnostics += 1;
        self.diagnostics.push(Diagnostic {
            loc: loc.clone(),
            error,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Hand all recorded diagnostics to `sink`.
    pub fn forward_diagnostics(&mut self, sink: &mut dyn DiagnosticSink) {
        for diagnostic in self.diagnostics.drain(..) {
            sink.report(diagnostic);
        }
    }

    /// Pool `text` plus one zero code unit, reusing an identical blob.
    pub fn pool_string(&mut self, text: &[u8], char_size: u32) -> Symbol {
        let mut blob = text.to_vec();
        blob.resize(text.len() + char_size.max(1) as usize, 0);
        if let Some(symbol) = self.pooled_strings.get(&blob) {
            return symbol.clone();
        }

        let symbol = self.fresh_symbol("str");
        let mut data = FragmentList::new();
        data.push_bytes(blob.clone());
        self.pooled_strings.insert(blob, symbol.clone());
        self.define(symbol.clone(), PoolKind::String, data);
        symbol
    }

    /// Pool an anonymous payload under a fresh symbol.
    pub fn pool_data(&mut self, kind: PoolKind, data: FragmentList) -> Symbol {
        let symbol = self.fresh_symbol(match kind {
            PoolKind::String => "str",
            PoolKind::ArrayData => "arr",
            PoolKind::Literal => "lit",
            PoolKind::Instance => "obj",
        });
        self.define(symbol.clone(), kind, data);
        symbol
    }

    /// Define `symbol` with the given contents.
    pub fn define(&mut self, symbol: Symbol, kind: PoolKind, data: FragmentList) {
        log::debug!("defining {} ({:?}, {} bytes)", symbol, kind, data.size());
        self.stats.pooled_blobs += 1;
        self.pool.push(PooledData { symbol, kind, data });
    }

    /// Claim `symbol` for materialization; false if it already was.
    pub fn begin_materialize(&mut self, symbol: &Symbol) -> bool {
        self.materialized.insert(symbol.clone())
    }

    pub fn pool(&self) -> &[PooledData] {
        &self.pool
    }

    pub fn lookup(&self, symbol: &Symbol) -> Option<&PooledData> {
        self.pool.iter().find(|p| &p.symbol == symbol)
    }

    pub fn take_pool(&mut self) -> Vec<PooledData> {
        std::mem::take(&mut self.pool)
    }

    /// Queue a function literal for code emission.
    pub fn request_function(&mut self, func: Arc<FuncLiteral>) {
        if self.pending_functions.iter().any(|f| f.symbol == func.symbol) {
            return;
        }
        log::debug!("function literal {} queued for emission", func.name);
        self.pending_functions.push(func);
    }

    pub fn take_pending_functions(&mut self) -> Vec<Arc<FuncLiteral>> {
        std::mem::take(&mut self.pending_functions)
    }

    pub fn record_zeros_compacted(&mut self, bytes: u64) {
        self.stats.zero_bytes_compacted += bytes;
    }

    /// Get encoding statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.clone()
    }

    fn fresh_symbol(&mut self, prefix: &str) -> Symbol {
        let id = self.next_blob;
        self.next_blob += 1;
        Symbol::new(&format!("__dt.{}.{}", prefix, id))
    }
}

/// Encoding session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of top-level values encoded.
    pub values_encoded: usize,

    /// Total bytes of top-level values.
    pub bytes_emitted: u64,

    /// Relocations in top-level values.
    pub relocations: usize,

    /// Zero bytes emitted as a single run instead of repeated elements.
    pub zero_bytes_compacted: u64,

    /// Symbols defined in the data pool.
    pub pooled_blobs: usize,

    /// Recoverable errors recorded.
    pub diagnostics: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Encoding Session Statistics:")?;
        writeln!(f, "  Values encoded: {}", self.values_encoded)?;
        writeln!(f, "  Bytes emitted: {}", self.bytes_emitted)?;
        writeln!(f, "  Relocations: {}", self.relocations)?;
        writeln!(f, "  Zero bytes compacted: {}", self.zero_bytes_compacted)?;
        writeln!(f, "  Pooled blobs: {}", self.pooled_blobs)?;
        writeln!(f, "  Diagnostics: {}", self.diagnostics)?;
        Ok(())
    }
}
