// This module describes the handful of target properties the layout generator depends on:
// pointer width, the storage width of the extended real type (and how much of it is
// padding), and byte order. TargetConfig also owns the primitive scalar encoders that
// turn integers and floating point values into target-endian byte strings, including the
// conversion of an f64 into the 80-bit x87 extended format. LayoutConvention selects
// whether class instances reserve the implicit monitor slot after the dispatch pointer;
// it is an explicit configuration input rather than a property inferred from classes.
// EncoderConfig bundles both and is what an EncodeSession is created from.

//! Target configuration and scalar byte encoding.

/// Byte order of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Class instance header convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutConvention {
    /// Dispatch pointer followed by a pointer-sized monitor slot.
    #[default]
    WithMonitor,
    /// Dispatch pointer only (C++-compatible classes).
    NoMonitor,
}

impl LayoutConvention {
    pub fn has_monitor(self) -> bool {
        matches!(self, LayoutConvention::WithMonitor)
    }
}

/// Target properties that influence static data layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetConfig {
    /// Size of a pointer and of `size_t` in bytes.
    pub ptr_size: u32,
    /// Storage size of an 80-bit extended real, including padding.
    pub real_size: u32,
    /// Trailing pad bytes after the 10 significant bytes of an extended real.
    pub real_pad: u32,
    pub endian: Endian,
}

impl TargetConfig {
    pub fn x86_64() -> Self {
        Self {
            ptr_size: 8,
            real_size: 16,
            real_pad: 6,
            endian: Endian::Little,
        }
    }

    pub fn x86() -> Self {
        Self {
            ptr_size: 4,
            real_size: 12,
            real_pad: 2,
            endian: Endian::Little,
        }
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Largest object size in bytes, half the address space.
    pub fn max_object_size(&self) -> u64 {
        1u64 << (self.ptr_size * 8 - 1)
    }

    /// Truncate `value` to `size` bytes in target byte order.
    pub fn encode_uint(&self, value: u64, size: u64) -> Vec<u8> {
        let size = size as usize;
        let le = value.to_le_bytes();
        let mut out: Vec<u8> = (0..size)
            .map(|i| if i < le.len() { le[i] } else { 0 })
            .collect();
        if self.endian == Endian::Big {
            out.reverse();
        }
        out
    }

    pub fn encode_f32(&self, value: f64) -> Vec<u8> {
        let v = value as f32;
        match self.endian {
            Endian::Little => v.to_le_bytes().to_vec(),
            Endian::Big => v.to_be_bytes().to_vec(),
        }
    }

    pub fn encode_f64(&self, value: f64) -> Vec<u8> {
        match self.endian {
            Endian::Little => value.to_le_bytes().to_vec(),
            Endian::Big => value.to_be_bytes().to_vec(),
        }
    }

    /// Extended real: 10 significant bytes followed by `real_pad` zero bytes.
    pub fn encode_f80(&self, value: f64) -> Vec<u8> {
        let mut bytes = f64_to_x87(value).to_vec();
        if self.endian == Endian::Big {
            bytes.reverse();
        }
        bytes.resize((self.real_size).max(10) as usize, 0);
        bytes
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::x86_64()
    }
}

/// Everything an encoding session needs to know about the target ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderConfig {
    pub target: TargetConfig,
    pub convention: LayoutConvention,
}

impl EncoderConfig {
    pub fn new(target: TargetConfig, convention: LayoutConvention) -> Self {
        Self { target, convention }
    }

    pub fn x86_64() -> Self {
        Self::new(TargetConfig::x86_64(), LayoutConvention::WithMonitor)
    }

    pub fn x86() -> Self {
        Self::new(TargetConfig::x86(), LayoutConvention::WithMonitor)
    }

    /// Size of the class instance header: dispatch pointer plus optional monitor.
    pub fn class_header_size(&self) -> u64 {
        let slots = if self.convention.has_monitor() { 2 } else { 1 };
        slots * self.target.ptr_size as u64
    }
}

/// Convert an f64 into the little-endian x87 80-bit extended format.
fn f64_to_x87(value: f64) -> [u8; 10] {
    let bits = value.to_bits();
    let sign = ((bits >> 63) as u16) << 15;
    let exp = ((bits >> 52) & 0x7ff) as u16;
    let frac = bits & ((1u64 << 52) - 1);

    let (exponent, mantissa) = if exp == 0 && frac == 0 {
        (0u16, 0u64)
    } else if exp == 0x7ff {
        (0x7fff, (1u64 << 63) | (frac << 11))
    } else if exp == 0 {
        // Subnormal doubles are normal in the wider exponent range.
        let lz = frac.leading_zeros();
        (15372 - lz as u16, frac << lz)
    } else {
        (exp + (16383 - 1023), (1u64 << 63) | (frac << 11))
    };

    let mut out = [0u8; 10];
    out[..8].copy_from_slice(&mantissa.to_le_bytes());
    out[8..].copy_from_slice(&(sign | exponent).to_le_bytes());
    out
}
