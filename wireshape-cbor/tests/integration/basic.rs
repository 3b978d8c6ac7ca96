use wireshape_cbor::{from_slice, to_vec};
use wireshape_core::{decode_record, Context, EventSource};
use wireshape_core::{Decode, Encode, Error, Peek, ReadOptions, RecordPeek, WriteOptions};

#[derive(Default, PartialEq, Debug)]
struct Reading {
    sensor: String,
    samples: Vec<i64>,
    note: Option<String>,
}

static READING_FIELDS: &[wireshape_core::FieldInfo] = &[
    wireshape_core::FieldInfo::new("sensor"),
    wireshape_core::FieldInfo::new("samples"),
    wireshape_core::FieldInfo::new("note"),
];
static READING_SHAPE: wireshape_core::Shape =
    wireshape_core::Shape::new("Reading", READING_FIELDS);

impl RecordPeek for Reading {
    fn shape(&self) -> &'static wireshape_core::Shape {
        &READING_SHAPE
    }

    fn field_peek(&self, index: usize) -> Peek<'_> {
        match index {
            0 => self.sensor.peek(),
            1 => self.samples.peek(),
            2 => self.note.peek(),
            _ => unreachable!(),
        }
    }
}

impl Encode for Reading {
    fn peek(&self) -> Peek<'_> {
        Peek::Record(self)
    }
}

impl Decode for Reading {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error> {
        decode_record(src, opts, ctx, &READING_SHAPE, |out, idx, src, opts, ctx| {
            match idx {
                0 => out.sensor = String::decode(src, opts, ctx)?,
                1 => out.samples = Vec::decode(src, opts, ctx)?,
                2 => out.note = Option::decode(src, opts, ctx)?,
                _ => unreachable!(),
            }
            Ok(())
        })
    }
}

#[test]
fn record_round_trips_with_nested_seq_and_option() {
    let original = Reading {
        sensor: "humidity".to_string(),
        samples: vec![41, -3, 0, 100],
        note: Some("calibrated".to_string()),
    };
    let bytes = to_vec(&original, &WriteOptions::default()).unwrap();
    let decoded: Reading = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn record_round_trips_as_array_when_requested() {
    let original = Reading {
        sensor: "pressure".to_string(),
        samples: vec![],
        note: None,
    };
    let mut opts = WriteOptions::default();
    opts.structs_as_arrays = true;
    let bytes = to_vec(&original, &opts).unwrap();
    assert_eq!(bytes[0] >> 5, 4); // CBOR array major type
    let decoded: Reading = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn unknown_key_errors_unless_allowed() {
    #[derive(Default)]
    struct Narrow {
        sensor: String,
    }
    static FIELDS: &[wireshape_core::FieldInfo] =
        &[wireshape_core::FieldInfo::new("sensor")];
    static SHAPE: wireshape_core::Shape = wireshape_core::Shape::new("Narrow", FIELDS);
    impl RecordPeek for Narrow {
        fn shape(&self) -> &'static wireshape_core::Shape {
            &SHAPE
        }
        fn field_peek(&self, index: usize) -> Peek<'_> {
            match index {
                0 => self.sensor.peek(),
                _ => unreachable!(),
            }
        }
    }
    impl Encode for Narrow {
        fn peek(&self) -> Peek<'_> {
            Peek::Record(self)
        }
    }
    impl Decode for Narrow {
        fn decode<S: EventSource>(
            src: &mut S,
            opts: &ReadOptions,
            ctx: &mut Context,
        ) -> Result<Self, Error> {
            decode_record(src, opts, ctx, &SHAPE, |out, idx, src, opts, ctx| {
                match idx {
                    0 => out.sensor = String::decode(src, opts, ctx)?,
                    _ => unreachable!(),
                }
                Ok(())
            })
        }
    }

    let wide = Reading {
        sensor: "temp".to_string(),
        samples: vec![1],
        note: None,
    };
    let bytes = to_vec(&wide, &WriteOptions::default()).unwrap();

    let strict = from_slice::<Narrow>(&bytes, &ReadOptions::default());
    assert!(strict.is_err());

    let lenient = ReadOptions {
        error_on_unknown_keys: false,
        ..ReadOptions::default()
    };
    let decoded: Narrow = from_slice(&bytes, &lenient).unwrap();
    assert_eq!(decoded.sensor, "temp");
}

#[test]
fn negative_integers_use_the_negint_major_type() {
    let bytes = to_vec(&-10i32, &WriteOptions::default()).unwrap();
    assert_eq!(bytes[0] >> 5, 1); // CBOR negint major type
    let decoded: i32 = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, -10);
}

#[test]
fn nested_sequences_round_trip() {
    let v: Vec<Vec<i32>> = vec![vec![1, 2], vec![], vec![3, 4, 5]];
    let bytes = to_vec(&v, &WriteOptions::default()).unwrap();
    let decoded: Vec<Vec<i32>> = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, v);
}
