// This module implements the output algebra of the layout generator. A FragmentList is an
// ordered, append-only sequence of DataFragments: raw target-endian bytes, runs of zero
// bytes, pointer-sized symbol+offset slots that the object writer turns into relocations,
// and nested lists that are spliced in place. Producers append through the list's
// "current end" (size()) so nested encoders can interleave their output without any
// aliased tail pointers. Appending a zero run directly after another zero run merges the
// two, which keeps large zero-initialized arrays at a constant fragment count. Symbol is
// the opaque, cheaply cloneable relocation target handle shared by all fragments.

//! Data fragments and fragment lists.

use std::fmt;
use std::sync::Arc;

use super::image::{DataImage, Relocation};

/// Opaque handle to a relocation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One atomic piece of a static data image.
#[derive(Debug, Clone, PartialEq)]
pub enum DataFragment {
    RawBytes(Vec<u8>),
    ZeroRun(u64),
    /// Pointer-sized slot holding `target + offset`.
    SymbolOffset {
        target: Symbol,
        offset: u64,
        width: u32,
    },
    Nested(FragmentList),
}

impl DataFragment {
    pub fn size(&self) -> u64 {
        match self {
            DataFragment::RawBytes(bytes) => bytes.len() as u64,
            DataFragment::ZeroRun(count) => *count,
            DataFragment::SymbolOffset { width, .. } => *width as u64,
            DataFragment::Nested(list) => list.size(),
        }
    }

    /// True if the fragment materializes to zero bytes and no relocations.
    pub fn is_all_zeros(&self) -> bool {
        match self {
            DataFragment::RawBytes(bytes) => bytes.iter().all(|&b| b == 0),
            DataFragment::ZeroRun(_) => true,
            DataFragment::SymbolOffset { .. } => false,
            DataFragment::Nested(list) => list.is_all_zeros(),
        }
    }
}

/// Ordered sequence of fragments forming one value's static image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentList {
    fragments: Vec<DataFragment>,
    size: u64,
}

impl FragmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding a single zero run.
    pub fn zeros(count: u64) -> Self {
        let mut list = Self::new();
        list.push_zeros(count);
        list
    }

    /// Current end of the list in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Total materialized size; alias of [`FragmentList::size`] for the object writer.
    pub fn total_size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[DataFragment] {
        &self.fragments
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn push_bytes(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.size += bytes.len() as u64;
        self.fragments.push(DataFragment::RawBytes(bytes));
    }

    /// Append `count` zero bytes, merging with a trailing zero run.
    pub fn push_zeros(&mut self, count: u64) {
        if count == 0 {
            return;
        }
        self.size += count;
        if let Some(DataFragment::ZeroRun(prev)) = self.fragments.last_mut() {
            *prev += count;
            return;
        }
        self.fragments.push(DataFragment::ZeroRun(count));
    }

    pub fn push_symbol(&mut self, target: Symbol, offset: u64, width: u32) {
        self.size += width as u64;
        self.fragments.push(DataFragment::SymbolOffset {
            target,
            offset,
            width,
        });
    }

    /// Splice `other` in as a single nested fragment.
    pub fn push_nested(&mut self, other: FragmentList) {
        if other.is_empty() {
            return;
        }
        self.size += other.size;
        self.fragments.push(DataFragment::Nested(other));
    }

    /// Concatenate `other` onto the end of this list.
    pub fn append(&mut self, other: FragmentList) {
        for fragment in other.fragments {
            match fragment {
                DataFragment::RawBytes(bytes) => self.push_bytes(bytes),
                DataFragment::ZeroRun(count) => self.push_zeros(count),
                DataFragment::SymbolOffset {
                    target,
                    offset,
                    width,
                } => self.push_symbol(target, offset, width),
                DataFragment::Nested(list) => self.push_nested(list),
            }
        }
    }

    /// Zero-fill from the current end up to `offset`; no-op if already past it.
    pub fn pad_to(&mut self, offset: u64) {
        if self.size < offset {
            self.push_zeros(offset - self.size);
        }
    }

    pub fn is_all_zeros(&self) -> bool {
        self.fragments.iter().all(DataFragment::is_all_zeros)
    }

    /// Number of relocations the list will produce once materialized.
    pub fn relocation_count(&self) -> usize {
        self.fragments
            .iter()
            .map(|f| match f {
                DataFragment::SymbolOffset { .. } => 1,
                DataFragment::Nested(list) => list.relocation_count(),
                _ => 0,
            })
            .sum()
    }

    /// Flatten into a byte image plus relocations.
    ///
    /// Relocation slots are left zero in `bytes`; the addend lives in the
    /// relocation record.
    pub fn materialize(&self) -> DataImage {
        let mut image = DataImage::with_capacity(self.size as usize);
        self.materialize_into(&mut image);
        image
    }

    fn materialize_into(&self, image: &mut DataImage) {
        for fragment in &self.fragments {
            match fragment {
                DataFragment::RawBytes(bytes) => image.bytes.extend_from_slice(bytes),
                DataFragment::ZeroRun(count) => {
                    let end = image.bytes.len() + *count as usize;
                    image.bytes.resize(end, 0);
                }
                DataFragment::SymbolOffset {
                    target,
                    offset,
                    width,
                } => {
                    image.relocations.push(Relocation {
                        offset: image.bytes.len() as u64,
                        target: target.clone(),
                        addend: *offset,
                        width: *width,
                    });
                    let end = image.bytes.len() + *width as usize;
                    image.bytes.resize(end, 0);
                }
                DataFragment::Nested(list) => list.materialize_into(image),
            }
        }
    }
}

impl fmt::Display for FragmentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, fragment) in self.fragments.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            match fragment {
                DataFragment::RawBytes(bytes) => {
                    f.write_str("bytes[")?;
                    for b in bytes {
                        write!(f, "{:02x}", b)?;
                    }
                    f.write_str("]")?;
                }
                DataFragment::ZeroRun(count) => write!(f, "zeros({})", count)?,
                DataFragment::SymbolOffset { target, offset, .. } => {
                    write!(f, "&{}+{}", target, offset)?
                }
                DataFragment::Nested(list) => write!(f, "{{{}}}", list)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_runs_merge() {
        let mut list = FragmentList::new();
        list.push_zeros(4);
        list.push_zeros(12);
        list.push_zeros(0);
        assert_eq!(list.fragment_count(), 1);
        assert_eq!(list.size(), 16);
        assert!(list.is_all_zeros());
    }

    #[test]
    fn test_symbol_breaks_zero_run() {
        let mut list = FragmentList::new();
        list.push_zeros(4);
        list.push_symbol(Symbol::new("vtbl"), 0, 8);
        list.push_zeros(4);
        assert_eq!(list.fragment_count(), 3);
        assert_eq!(list.size(), 16);
        assert!(!list.is_all_zeros());
        assert_eq!(list.relocation_count(), 1);
    }

    #[test]
    fn test_append_compacts_across_boundary() {
        let mut a = FragmentList::new();
        a.push_bytes(vec![1, 2]);
        a.push_zeros(2);
        let b = FragmentList::zeros(8);
        a.append(b);
        assert_eq!(a.fragment_count(), 2);
        assert_eq!(a.size(), 12);
    }

    #[test]
    fn test_pad_to() {
        let mut list = FragmentList::new();
        list.push_bytes(vec![7]);
        list.pad_to(4);
        list.pad_to(2);
        assert_eq!(list.size(), 4);
        assert_eq!(list.materialize().bytes, vec![7, 0, 0, 0]);
    }

    #[test]
    fn test_materialize_nested_relocations() {
        let mut inner = FragmentList::new();
        inner.push_bytes(vec![0xaa]);
        inner.push_symbol(Symbol::new("target"), 16, 4);

        let mut outer = FragmentList::new();
        outer.push_zeros(3);
        outer.push_nested(inner);

        let image = outer.materialize();
        assert_eq!(image.bytes, vec![0, 0, 0, 0xaa, 0, 0, 0, 0]);
        assert_eq!(image.relocations.len(), 1);
        assert_eq!(image.relocations[0].offset, 4);
        assert_eq!(image.relocations[0].addend, 16);
        assert_eq!(image.relocations[0].target.name(), "target");
        assert_eq!(outer.total_size(), 8);
    }

    #[test]
    fn test_display() {
        let mut list = FragmentList::new();
        list.push_bytes(vec![0x01, 0xff]);
        list.push_zeros(2);
        list.push_symbol(Symbol::new("s"), 4, 8);
        assert_eq!(list.to_string(), "bytes[01ff] zeros(2) &s+4");
    }
}
