// This module holds the infrastructure shared by every layout algorithm: the error and
// diagnostic types, the target and layout-convention configuration, and the
// EncodeSession that owns the scratch arena borrow, the data pool, the list of function
// literals awaiting code emission, recorded diagnostics and statistics for one pass.

//! Core dtgen infrastructure.
//!
//! ## Session Management (`session`)
//! - Arena-borrowing encoding session
//! - Data pool, pending function literals and statistics
//!
//! ## Target Configuration (`target`)
//! - Pointer and extended-real sizes, endianness
//! - Class header layout convention
//!
//! ## Errors (`error`)
//! - Layout error kinds and their recoverability
//! - Located diagnostics and sinks

pub mod error;
pub mod session;
pub mod target;

pub use error::{Diagnostic, DiagnosticSink, LayoutError, LayoutResult, SourceLoc};
pub use session::{EncodeSession, PoolKind, PooledData, SessionStats};
pub use target::{EncoderConfig, Endian, LayoutConvention, TargetConfig};
