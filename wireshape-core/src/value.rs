//! The cross-format value algebra and the `Peek` traversal used on the
//! write path.
//!
//! `Peek` is a type-erased, borrowing view over a value, used by every
//! format codec to walk an arbitrary `Encode` tree without knowing its
//! concrete type ahead of time. It is a plain enum over borrowed
//! references and small trait objects rather than an `unsafe` pointer plus
//! a type descriptor — see `DESIGN.md` for why that tradeoff was made here.

use crate::shape::Shape;

/// A type-erased, borrowed view over one value, for the write path.
pub enum Peek<'a> {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Half-precision float, carried as the reconstructed `f32` value plus
    /// the original bit pattern (so a codec that cares about exact
    /// round-tripping can re-derive the 16-bit form without re-deriving it
    /// from a lossily rounded `f32`).
    F16(crate::types::F16),
    Str(&'a str),
    Bytes(&'a [u8]),
    NumArray(NumArrayPeek<'a>),
    Seq(&'a dyn SeqPeek),
    StrMap(&'a dyn StrMapPeek),
    IntMap(&'a dyn IntMapPeek),
    Record(&'a dyn RecordPeek),
    Option(Option<Box<Peek<'a>>>),
    Variant {
        tag: &'static str,
        index: usize,
        payload: Box<Peek<'a>>,
    },
    Timestamp {
        secs: i64,
        nanos: u32,
    },
    Complex {
        re: f64,
        im: f64,
    },
    Matrix {
        row_major: bool,
        extents: &'a [u64],
        data: NumArrayPeek<'a>,
    },
    Bitset {
        len: usize,
        bits: &'a [u8],
    },
    Ext {
        tag: u64,
        data: &'a [u8],
    },
}

/// Homogeneous numeric array, kept as a typed slice per element width so no
/// `unsafe` transmute is needed to reinterpret a `Vec<T>`'s bytes.
pub enum NumArrayPeek<'a> {
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
    U64(&'a [u64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl NumArrayPeek<'_> {
    pub fn len(&self) -> usize {
        match self {
            NumArrayPeek::I8(s) => s.len(),
            NumArrayPeek::I16(s) => s.len(),
            NumArrayPeek::I32(s) => s.len(),
            NumArrayPeek::I64(s) => s.len(),
            NumArrayPeek::U8(s) => s.len(),
            NumArrayPeek::U16(s) => s.len(),
            NumArrayPeek::U32(s) => s.len(),
            NumArrayPeek::U64(s) => s.len(),
            NumArrayPeek::F32(s) => s.len(),
            NumArrayPeek::F64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object-safe view over a heterogeneous sequence.
pub trait SeqPeek {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Peek<'_>;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object-safe view over a string-keyed mapping, insertion-ordered.
pub trait StrMapPeek {
    fn len(&self) -> usize;
    fn entry(&self, index: usize) -> (&str, Peek<'_>);
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object-safe view over an integer-keyed mapping, insertion-ordered.
pub trait IntMapPeek {
    fn len(&self) -> usize;
    fn entry(&self, index: usize) -> (i64, Peek<'_>);
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object-safe view over a record (struct). `field_peek` is only ever
/// called with indices below `self.shape().fields.len()`.
pub trait RecordPeek {
    fn shape(&self) -> &'static Shape;
    fn field_peek(&self, index: usize) -> Peek<'_>;

    /// A record type's `Shape`, without needing an instance to call
    /// `shape()` on. `where Self: Sized` keeps this out of the vtable, so
    /// `RecordPeek` stays usable as `dyn RecordPeek` (see `Peek::Record`)
    /// even though this method itself isn't object-safe.
    ///
    /// Used by `#[derive(Reflect)]`'s untagged-enum structural matching,
    /// which needs a variant's payload field names before it has decoded
    /// (and therefore before it has an instance of) that payload.
    fn static_shape() -> &'static Shape
    where
        Self: Sized + Default,
    {
        Self::default().shape()
    }
}

/// Implemented by every type this library can write. The derive macro
/// implements this for records and enums; `wireshape-core` implements it
/// for every scalar and container type in the value algebra.
pub trait Encode {
    fn peek(&self) -> Peek<'_>;
}
