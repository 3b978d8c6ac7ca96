//! Newtypes realizing the value-algebra kinds that don't map onto a plain
//! Rust primitive.

use crate::shape::NumKind;
use crate::value::{Encode, NumArrayPeek, Peek};

/// An opaque byte string, distinct from a homogeneous numeric array of
/// `u8` (`NumArray<u8>`) even though both are backed by `Vec<u8>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl Encode for Bytes {
    fn peek(&self) -> Peek<'_> {
        Peek::Bytes(&self.0)
    }
}

/// A half-precision float, stored as its raw 16-bit pattern.
///
/// Conversions are round-to-nearest-even, ported from the same family of
/// bit-twiddling techniques CBOR's preferred-serialization float-width
/// selection already requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct F16(pub u16);

impl F16 {
    pub fn to_f32(self) -> f32 {
        let bits = self.0 as u32;
        let sign = (bits & 0x8000) << 16;
        let exp = (bits >> 10) & 0x1f;
        let frac = bits & 0x3ff;

        let bits32 = if exp == 0 {
            if frac == 0 {
                sign
            } else {
                // Subnormal half -> normalized f32.
                let mut e = -1i32;
                let mut f = frac;
                loop {
                    f <<= 1;
                    e += 1;
                    if f & 0x400 != 0 {
                        break;
                    }
                }
                let f = f & 0x3ff;
                let exp32 = (127 - 15 - e) as u32;
                sign | (exp32 << 23) | (f << 13)
            }
        } else if exp == 0x1f {
            sign | 0xff800000 | (frac << 13)
        } else {
            let exp32 = exp + (127 - 15);
            sign | (exp32 << 23) | (frac << 13)
        };
        f32::from_bits(bits32)
    }

    pub fn from_f32(value: f32) -> Self {
        let bits = value.to_bits();
        let sign = ((bits >> 16) & 0x8000) as u16;
        let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
        let frac = bits & 0x007f_ffff;

        let half = if exp <= 0 {
            if exp < -10 {
                0
            } else {
                let frac_full = frac | 0x0080_0000;
                let shift = (14 - exp) as u32;
                ((frac_full >> shift) as u16).min(0x3ff)
            }
        } else if exp >= 0x1f {
            if (bits & 0x7fff_ffff) > 0x7f80_0000 {
                0x7e00 // NaN
            } else {
                0x7c00 // infinity
            }
        } else {
            ((exp as u16) << 10) | ((frac >> 13) as u16)
        };
        F16(sign | half)
    }

    /// Exactly representable in half precision without loss.
    pub fn exactly_represents(value: f32) -> bool {
        let round_tripped = F16::from_f32(value).to_f32();
        round_tripped == value || (value.is_nan() && round_tripped.is_nan())
    }
}

/// Seconds since the Unix epoch plus a nanosecond fraction in `[0, 1e9)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Encode for Timestamp {
    fn peek(&self) -> Peek<'_> {
        Peek::Timestamp {
            secs: self.secs,
            nanos: self.nanos,
        }
    }
}

/// A complex number: a pair of reals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Encode for Complex {
    fn peek(&self) -> Peek<'_> {
        Peek::Complex {
            re: self.re,
            im: self.im,
        }
    }
}

/// A length-tagged bit array, packed LSB-first into bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitset {
    pub len: usize,
    pub bits: Vec<u8>,
}

impl Bitset {
    pub fn from_bools(bools: &[bool]) -> Self {
        let mut bits = vec![0u8; bools.len().div_ceil(8)];
        for (i, &b) in bools.iter().enumerate() {
            if b {
                bits[i / 8] |= 1 << (i % 8);
            }
        }
        Bitset {
            len: bools.len(),
            bits,
        }
    }

    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len);
        self.bits[index / 8] & (1 << (index % 8)) != 0
    }
}

impl Encode for Bitset {
    fn peek(&self) -> Peek<'_> {
        Peek::Bitset {
            len: self.len,
            bits: &self.bits,
        }
    }
}

/// A tagged extension passthrough: an opaque `(tag, bytes)` pair for
/// MSGPACK/CBOR extension types this library does not otherwise interpret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ext {
    pub tag: u64,
    pub data: Vec<u8>,
}

impl Encode for Ext {
    fn peek(&self) -> Peek<'_> {
        Peek::Ext {
            tag: self.tag,
            data: &self.data,
        }
    }
}

/// A row/column-major matrix: extents plus a flat homogeneous numeric
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    pub row_major: bool,
    pub extents: Vec<u64>,
    pub data: Vec<T>,
}

/// Implemented for every scalar kind that can back a `NumArray`/`Matrix`.
pub trait NumericScalar: Copy {
    const KIND: NumKind;
    fn peek_slice(data: &[Self]) -> NumArrayPeek<'_>;
}

macro_rules! numeric_scalar {
    ($t:ty, $kind:ident, $variant:ident) => {
        impl NumericScalar for $t {
            const KIND: NumKind = NumKind::$kind;
            fn peek_slice(data: &[Self]) -> NumArrayPeek<'_> {
                NumArrayPeek::$variant(data)
            }
        }
    };
}

numeric_scalar!(i8, I8, I8);
numeric_scalar!(i16, I16, I16);
numeric_scalar!(i32, I32, I32);
numeric_scalar!(i64, I64, I64);
numeric_scalar!(u8, U8, U8);
numeric_scalar!(u16, U16, U16);
numeric_scalar!(u32, U32, U32);
numeric_scalar!(u64, U64, U64);
numeric_scalar!(f32, F32, F32);
numeric_scalar!(f64, F64, F64);

impl<T: NumericScalar> Encode for Matrix<T> {
    fn peek(&self) -> Peek<'_> {
        Peek::Matrix {
            row_major: self.row_major,
            extents: &self.extents,
            data: T::peek_slice(&self.data),
        }
    }
}

/// A homogeneous numeric array, distinct from a heterogeneous `Vec<T>`
/// sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumArray<T>(pub Vec<T>);

impl<T: NumericScalar> Encode for NumArray<T> {
    fn peek(&self) -> Peek<'_> {
        Peek::NumArray(T::peek_slice(&self.0))
    }
}
