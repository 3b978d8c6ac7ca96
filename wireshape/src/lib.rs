#![warn(missing_docs)]
//! Reflection-driven structured-data serialization across four wire
//! formats: JSON, BEVE, CBOR, and MSGPACK.
//!
//! A type opts in with `#[derive(Reflect)]` and then [`write`]/[`read`]
//! dispatch to the right codec by [`Format`]. Each format lives behind its
//! own default-on feature (`json`, `beve`, `cbor`, `msgpack`), so a
//! consumer that only ever speaks one wire format can drop the others.
//! BEVE additionally supports lazy, allocation-light field access over an
//! already-encoded buffer via [`lazy_beve`], without decoding the whole
//! document up front.

pub use wireshape_core::{
    decode_record, Bitset, Bytes, Complex, Context, Decode, Encode, Error, ErrorKind, Event,
    EventSource, Ext, FieldFlags, FieldInfo, FixedSink, FloatPrecision, Format, IntMapPeek,
    Matrix, NumArray, NumArrayPeek, NumKind, NumericScalar, Peek, ReadOptions, RecordPeek,
    SeqPeek, Shape, Sink, SliceSource, Source, StrMapPeek, Timestamp, WriteOptions, F16,
};
pub use wireshape_derive::Reflect;

#[cfg(feature = "beve")]
pub use wireshape_beve::lazy::{Document, IndexedEntry, IndexedView, View};

/// Write `value` to bytes in the given wire format.
pub fn write<T: Encode>(value: &T, format: Format, opts: &WriteOptions) -> Result<Vec<u8>, Error> {
    match format {
        #[cfg(feature = "json")]
        Format::Json => wireshape_json::to_vec(value, opts),
        #[cfg(not(feature = "json"))]
        Format::Json => Err(Error::new(ErrorKind::MethodNotFound)),

        #[cfg(feature = "beve")]
        Format::Beve => wireshape_beve::to_vec(value, opts),
        #[cfg(not(feature = "beve"))]
        Format::Beve => Err(Error::new(ErrorKind::MethodNotFound)),

        #[cfg(feature = "cbor")]
        Format::Cbor => wireshape_cbor::to_vec(value, opts),
        #[cfg(not(feature = "cbor"))]
        Format::Cbor => Err(Error::new(ErrorKind::MethodNotFound)),

        #[cfg(feature = "msgpack")]
        Format::MsgPack => wireshape_msgpack::to_vec(value, opts),
        #[cfg(not(feature = "msgpack"))]
        Format::MsgPack => Err(Error::new(ErrorKind::MethodNotFound)),
    }
}

/// Read a `T` from a complete byte slice in the given wire format.
pub fn read<T: Decode>(bytes: &[u8], format: Format, opts: &ReadOptions) -> Result<T, Error> {
    match format {
        #[cfg(feature = "json")]
        Format::Json => wireshape_json::from_slice(bytes, opts),
        #[cfg(not(feature = "json"))]
        Format::Json => Err(Error::new(ErrorKind::MethodNotFound)),

        #[cfg(feature = "beve")]
        Format::Beve => wireshape_beve::from_slice(bytes, opts),
        #[cfg(not(feature = "beve"))]
        Format::Beve => Err(Error::new(ErrorKind::MethodNotFound)),

        #[cfg(feature = "cbor")]
        Format::Cbor => wireshape_cbor::from_slice(bytes, opts),
        #[cfg(not(feature = "cbor"))]
        Format::Cbor => Err(Error::new(ErrorKind::MethodNotFound)),

        #[cfg(feature = "msgpack")]
        Format::MsgPack => wireshape_msgpack::from_slice(bytes, opts),
        #[cfg(not(feature = "msgpack"))]
        Format::MsgPack => Err(Error::new(ErrorKind::MethodNotFound)),
    }
}

/// Wrap an already-encoded BEVE buffer for lazy, allocation-light field
/// access. See [`wireshape_beve::lazy`] for the navigator's full API.
#[cfg(feature = "beve")]
pub fn lazy_beve(bytes: &[u8]) -> Result<Document<'_>, Error> {
    Ok(Document::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
        label: Option<String>,
    }

    static POINT_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("x"),
        FieldInfo::new("y"),
        FieldInfo::new("label"),
    ];
    static POINT_SHAPE: Shape = Shape::new("Point", POINT_FIELDS);

    impl RecordPeek for Point {
        fn shape(&self) -> &'static Shape {
            &POINT_SHAPE
        }

        fn field_peek(&self, index: usize) -> Peek<'_> {
            match index {
                0 => self.x.peek(),
                1 => self.y.peek(),
                2 => self.label.peek(),
                _ => unreachable!(),
            }
        }
    }

    impl Encode for Point {
        fn peek(&self) -> Peek<'_> {
            Peek::Record(self)
        }
    }

    impl Decode for Point {
        fn decode<S: EventSource>(
            src: &mut S,
            opts: &ReadOptions,
            ctx: &mut Context,
        ) -> Result<Self, Error> {
            decode_record(src, opts, ctx, &POINT_SHAPE, |out, idx, src, opts, ctx| {
                match idx {
                    0 => out.x = i32::decode(src, opts, ctx)?,
                    1 => out.y = i32::decode(src, opts, ctx)?,
                    2 => out.label = Option::decode(src, opts, ctx)?,
                    _ => unreachable!(),
                }
                Ok(())
            })
        }
    }

    const FORMATS: [Format; 4] = [Format::Json, Format::Beve, Format::Cbor, Format::MsgPack];

    #[test]
    fn record_round_trips_across_every_format() {
        let original = Point {
            x: -7,
            y: 42,
            label: Some("origin-ish".to_string()),
        };
        for format in FORMATS {
            let bytes = write(&original, format, &WriteOptions::default()).unwrap();
            let decoded: Point = read(&bytes, format, &ReadOptions::default()).unwrap();
            assert_eq!(decoded, original, "round trip failed for {format:?}");
        }
    }

    #[test]
    fn integer_boundary_values_round_trip_across_every_format() {
        for format in FORMATS {
            for n in [i64::MIN, -1, 0, 1, i64::MAX] {
                let bytes = write(&n, format, &WriteOptions::default()).unwrap();
                let decoded: i64 = read(&bytes, format, &ReadOptions::default()).unwrap();
                assert_eq!(decoded, n, "round trip failed for {format:?} with {n}");
            }
            for n in [0u64, 1, u64::MAX] {
                let bytes = write(&n, format, &WriteOptions::default()).unwrap();
                let decoded: u64 = read(&bytes, format, &ReadOptions::default()).unwrap();
                assert_eq!(decoded, n, "round trip failed for {format:?} with {n}");
            }
        }
    }

    #[test]
    fn lazy_beve_reads_a_field_without_decoding_the_whole_record() {
        let original = Point {
            x: 3,
            y: 9,
            label: None,
        };
        let bytes = wireshape_beve::to_vec(&original, &WriteOptions::default()).unwrap();
        let mut view = lazy_beve(&bytes).unwrap().root().unwrap();
        let y: i32 = view
            .get_key("y")
            .unwrap()
            .get(&ReadOptions::default())
            .unwrap();
        assert_eq!(y, 9);
    }
}
