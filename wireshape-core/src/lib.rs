#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![doc = "Reflection traits, the cross-format value algebra, and shared codec dispatch for wireshape."]

//! This crate is the reflection front end and shared codec-dispatch layer.
//! It never emits or parses wire bytes itself — that is the job of `wireshape-json`,
//! `wireshape-beve`, `wireshape-cbor`, and `wireshape-msgpack`, all of
//! which depend on this crate for `Shape`, `Peek`, `Encode`, `Decode`, and
//! the shared `Error`/`Context`/`Sink`/`Source` types.

pub(crate) mod macros;

pub mod decode;
pub mod error;
pub mod intcast;
pub mod io;
pub mod options;
pub mod shape;
pub mod types;
pub mod value;

pub use decode::{
    capture_value, decode_record, extract_tagged_entry, match_variant_by_shapes, BufferedSource,
    Decode, Event, EventSource,
};
pub use error::{Context, Error, ErrorKind};
pub use io::{FixedSink, Sink, SliceSource, Source};
pub use options::{Format, FloatPrecision, ReadOptions, WriteOptions};
pub use shape::{FieldFlags, FieldInfo, NumKind, Shape};
pub use types::{Bitset, Bytes, Complex, Ext, Matrix, NumArray, NumericScalar, Timestamp, F16};
pub use value::{Encode, IntMapPeek, NumArrayPeek, Peek, RecordPeek, SeqPeek, StrMapPeek};

macro_rules! encode_signed {
    ($t:ty) => {
        impl Encode for $t {
            fn peek(&self) -> Peek<'_> {
                Peek::I64(*self as i64)
            }
        }
    };
}

macro_rules! encode_unsigned {
    ($t:ty) => {
        impl Encode for $t {
            fn peek(&self) -> Peek<'_> {
                Peek::U64(*self as u64)
            }
        }
    };
}

encode_signed!(i8);
encode_signed!(i16);
encode_signed!(i32);
encode_signed!(i64);
encode_unsigned!(u8);
encode_unsigned!(u16);
encode_unsigned!(u32);
encode_unsigned!(u64);

impl Encode for bool {
    fn peek(&self) -> Peek<'_> {
        Peek::Bool(*self)
    }
}

impl Encode for f32 {
    fn peek(&self) -> Peek<'_> {
        Peek::F32(*self)
    }
}

impl Encode for f64 {
    fn peek(&self) -> Peek<'_> {
        Peek::F64(*self)
    }
}

impl Encode for F16 {
    fn peek(&self) -> Peek<'_> {
        Peek::F16(*self)
    }
}

impl Encode for str {
    fn peek(&self) -> Peek<'_> {
        Peek::Str(self)
    }
}

impl Encode for String {
    fn peek(&self) -> Peek<'_> {
        Peek::Str(self)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn peek(&self) -> Peek<'_> {
        Peek::Option(self.as_ref().map(|v| Box::new(v.peek())))
    }
}

impl<T: Encode> Encode for Box<T> {
    fn peek(&self) -> Peek<'_> {
        (**self).peek()
    }
}

impl<T: Encode> SeqPeek for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Peek<'_> {
        self[index].peek()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn peek(&self) -> Peek<'_> {
        Peek::Seq(self)
    }
}

impl<T: Encode> SeqPeek for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, index: usize) -> Peek<'_> {
        self[index].peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_peek_roundtrips_kind() {
        assert!(matches!(42i32.peek(), Peek::I64(42)));
        assert!(matches!(7u8.peek(), Peek::U64(7)));
        assert!(matches!(true.peek(), Peek::Bool(true)));
        assert!(matches!("hi".peek(), Peek::Str("hi")));
    }

    #[test]
    fn option_peek_distinguishes_present_absent() {
        let some: Option<i32> = Some(3);
        let none: Option<i32> = None;
        assert!(matches!(some.peek(), Peek::Option(Some(_))));
        assert!(matches!(none.peek(), Peek::Option(None)));
    }

    #[test]
    fn key_index_resolves_every_field_and_rejects_unknown() {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("a"),
            FieldInfo::new("bb"),
            FieldInfo::new("ccc"),
        ];
        static SHAPE: Shape = Shape::new("Test", FIELDS);
        assert_eq!(SHAPE.find_field("a"), Some(0));
        assert_eq!(SHAPE.find_field("bb"), Some(1));
        assert_eq!(SHAPE.find_field("ccc"), Some(2));
        assert_eq!(SHAPE.find_field("nope"), None);
    }

    #[test]
    fn key_index_single_field() {
        static FIELDS: &[FieldInfo] = &[FieldInfo::new("only")];
        static SHAPE: Shape = Shape::new("OneField", FIELDS);
        assert_eq!(SHAPE.find_field("only"), Some(0));
        assert_eq!(SHAPE.find_field("other"), None);
    }

    #[test]
    fn key_index_empty_record() {
        static SHAPE: Shape = Shape::new("Empty", &[]);
        assert_eq!(SHAPE.find_field("anything"), None);
    }

    #[test]
    fn key_index_distinct_lengths_uses_length_discriminator() {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("a"),
            FieldInfo::new("bb"),
            FieldInfo::new("cccc"),
        ];
        static SHAPE: Shape = Shape::new("DistinctLengths", FIELDS);
        assert_eq!(SHAPE.find_field("a"), Some(0));
        assert_eq!(SHAPE.find_field("bb"), Some(1));
        assert_eq!(SHAPE.find_field("cccc"), Some(2));
        // "cc" shares a length with no surfaced key, but "bb" does --
        // the lookup must still reject it by full comparison, not length
        // alone.
        assert_eq!(SHAPE.find_field("cc"), None);
        assert_eq!(SHAPE.find_field("ccccc"), None);
    }

    #[test]
    fn key_index_shared_length_and_prefix_falls_back_to_full_hash() {
        // Same length (defeats the length discriminator), identical first
        // 8 bytes (defeats front-bytes hashing for every seed), and every
        // single byte position repeats across the three keys (defeats
        // unique-byte-index) -- only a hash over the whole string tells
        // these apart.
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("aaaaaaaaXY"),
            FieldInfo::new("aaaaaaaaYX"),
            FieldInfo::new("aaaaaaaaXX"),
        ];
        static SHAPE: Shape = Shape::new("SharedPrefix", FIELDS);
        assert_eq!(SHAPE.find_field("aaaaaaaaXY"), Some(0));
        assert_eq!(SHAPE.find_field("aaaaaaaaYX"), Some(1));
        assert_eq!(SHAPE.find_field("aaaaaaaaXX"), Some(2));
        assert_eq!(SHAPE.find_field("aaaaaaaaYY"), None);
    }

    #[test]
    fn f16_roundtrips_common_values() {
        for v in [0.0f32, 1.0, -1.0, 0.5, 65504.0, -65504.0] {
            let half = F16::from_f32(v);
            assert_eq!(half.to_f32(), v);
        }
        assert!(F16::from_f32(f32::NAN).to_f32().is_nan());
        assert_eq!(F16::from_f32(f32::INFINITY).to_f32(), f32::INFINITY);
    }

    #[test]
    fn cbor_negint_roundtrip() {
        use crate::intcast::{cbor_negint_to_i64, i64_to_cbor_negint_arg};
        for n in [-1i64, -2, -1000, i64::MIN, i64::MIN + 1] {
            let arg = i64_to_cbor_negint_arg(n);
            assert_eq!(cbor_negint_to_i64(arg), Some(n));
        }
    }
}
