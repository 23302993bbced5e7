//! Materialized static data images.
//!
//! A [`DataImage`] is what the object writer consumes: the flat bytes of a
//! value plus the relocations to apply on top of them.

use std::fmt;

use super::fragment::Symbol;

/// A pointer-sized slot that must be patched with `target + addend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Byte offset of the slot inside the image.
    pub offset: u64,
    pub target: Symbol,
    pub addend: u64,
    pub width: u32,
}

/// Flat bytes plus relocations for one static value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataImage {
    pub bytes: Vec<u8>,
    pub relocations: Vec<Relocation>,
}

impl DataImage {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            relocations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Relocation whose slot starts at `offset`, if any.
    pub fn relocation_at(&self, offset: u64) -> Option<&Relocation> {
        self.relocations.iter().find(|r| r.offset == offset)
    }
}

impl fmt::Display for DataImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.bytes.chunks(16).enumerate() {
            write!(f, "  {:04x}:", row * 16)?;
            for b in chunk {
                write!(f, " {:02x}", b)?;
            }
            writeln!(f)?;
        }
        for reloc in &self.relocations {
            writeln!(
                f,
                "  reloc @{:#x} -> {}+{} ({} bytes)",
                reloc.offset, reloc.target, reloc.addend, reloc.width
            )?;
        }
        Ok(())
    }
}
