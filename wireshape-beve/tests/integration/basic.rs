use wireshape_beve::{from_slice, to_vec};
use wireshape_core::{decode_record, Context, Decode, Encode, Error, ErrorKind, Event, EventSource};
use wireshape_core::{FieldInfo, Peek, ReadOptions, RecordPeek, Shape, WriteOptions};

#[derive(Debug, PartialEq)]
enum Status {
    Active,
    Retired(String),
}

impl Encode for Status {
    fn peek(&self) -> Peek<'_> {
        match self {
            Status::Active => Peek::Variant {
                tag: "Active",
                index: 0,
                payload: Box::new(Peek::Null),
            },
            Status::Retired(reason) => Peek::Variant {
                tag: "Retired",
                index: 1,
                payload: Box::new(reason.peek()),
            },
        }
    }
}

impl Decode for Status {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error> {
        match src.next_event()? {
            Event::MapStart => {
                let result = match src.next_event()? {
                    Event::MapKeyInt(i) => match i as usize {
                        0 => {
                            src.skip_value()?;
                            Ok(Status::Active)
                        }
                        1 => Ok(Status::Retired(String::decode(src, opts, ctx)?)),
                        _ => Err(src.error_here(ErrorKind::UnknownKey)),
                    },
                    Event::MapKey(k) => match k.as_str() {
                        "Active" => {
                            src.skip_value()?;
                            Ok(Status::Active)
                        }
                        "Retired" => Ok(Status::Retired(String::decode(src, opts, ctx)?)),
                        _ => Err(src.error_here(ErrorKind::UnknownKey)),
                    },
                    _ => Err(src.error_here(ErrorKind::InvalidPartialKey)),
                }?;
                match src.next_event()? {
                    Event::MapEnd => Ok(result),
                    _ => Err(src.error_here(ErrorKind::SyntaxError)),
                }
            }
            _ => Err(src.error_here(ErrorKind::GetWrongType)),
        }
    }
}

#[derive(Default, PartialEq, Debug)]
struct Employee {
    name: String,
    badges: Vec<i32>,
    note: Option<String>,
}

static EMPLOYEE_FIELDS: &[FieldInfo] = &[
    FieldInfo::new("name"),
    FieldInfo::new("badges"),
    FieldInfo::new("note"),
];
static EMPLOYEE_SHAPE: Shape = Shape::new("Employee", EMPLOYEE_FIELDS);

impl RecordPeek for Employee {
    fn shape(&self) -> &'static Shape {
        &EMPLOYEE_SHAPE
    }

    fn field_peek(&self, index: usize) -> Peek<'_> {
        match index {
            0 => self.name.peek(),
            1 => self.badges.peek(),
            2 => self.note.peek(),
            _ => unreachable!(),
        }
    }
}

impl Encode for Employee {
    fn peek(&self) -> Peek<'_> {
        Peek::Record(self)
    }
}

impl Decode for Employee {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error> {
        decode_record(src, opts, ctx, &EMPLOYEE_SHAPE, |out, idx, src, opts, ctx| {
            match idx {
                0 => out.name = String::decode(src, opts, ctx)?,
                1 => out.badges = Vec::decode(src, opts, ctx)?,
                2 => out.note = Option::decode(src, opts, ctx)?,
                _ => unreachable!(),
            }
            Ok(())
        })
    }
}

#[test]
fn record_round_trips_with_nested_seq_and_option() {
    let original = Employee {
        name: "Priya".to_string(),
        badges: vec![7, 12, 99],
        note: Some("on-call".to_string()),
    };
    let bytes = to_vec(&original, &WriteOptions::default()).unwrap();
    let decoded: Employee = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn record_round_trips_as_array_when_requested() {
    let original = Employee {
        name: "Sofia".to_string(),
        badges: vec![],
        note: None,
    };
    let mut opts = WriteOptions::default();
    opts.structs_as_arrays = true;
    let bytes = to_vec(&original, &opts).unwrap();
    let decoded: Employee = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn variant_round_trips_through_the_native_index_extension() {
    let active = Status::Active;
    let retired = Status::Retired("pension".to_string());

    let active_bytes = to_vec(&active, &WriteOptions::default()).unwrap();
    // The variant extension tag, not an object tag, opens the value.
    assert_eq!(active_bytes[0] & 0x7, 7);

    let decoded_active: Status = from_slice(&active_bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded_active, active);

    let retired_bytes = to_vec(&retired, &WriteOptions::default()).unwrap();
    let decoded_retired: Status = from_slice(&retired_bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded_retired, retired);
}

#[test]
fn unknown_key_errors_unless_allowed() {
    #[derive(Default)]
    struct Narrow {
        name: String,
    }
    static FIELDS: &[FieldInfo] = &[FieldInfo::new("name")];
    static SHAPE: Shape = Shape::new("Narrow", FIELDS);
    impl RecordPeek for Narrow {
        fn shape(&self) -> &'static Shape {
            &SHAPE
        }
        fn field_peek(&self, index: usize) -> Peek<'_> {
            match index {
                0 => self.name.peek(),
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
                    0 => out.name = String::decode(src, opts, ctx)?,
                    _ => unreachable!(),
                }
                Ok(())
            })
        }
    }

    let wide = Employee {
        name: "Kofi".to_string(),
        badges: vec![1],
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
    assert_eq!(decoded.name, "Kofi");
}

#[test]
fn timestamp_and_complex_round_trip_inside_a_record() {
    #[derive(Default, PartialEq, Debug)]
    struct Reading {
        at: wireshape_core::Timestamp,
        phasor: wireshape_core::Complex,
    }
    static FIELDS: &[FieldInfo] = &[FieldInfo::new("at"), FieldInfo::new("phasor")];
    static SHAPE: Shape = Shape::new("Reading", FIELDS);
    impl RecordPeek for Reading {
        fn shape(&self) -> &'static Shape {
            &SHAPE
        }
        fn field_peek(&self, index: usize) -> Peek<'_> {
            match index {
                0 => self.at.peek(),
                1 => self.phasor.peek(),
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
            decode_record(src, opts, ctx, &SHAPE, |out, idx, src, opts, ctx| {
                match idx {
                    0 => out.at = wireshape_core::Timestamp::decode(src, opts, ctx)?,
                    1 => out.phasor = wireshape_core::Complex::decode(src, opts, ctx)?,
                    _ => unreachable!(),
                }
                Ok(())
            })
        }
    }

    let original = Reading {
        at: wireshape_core::Timestamp {
            secs: 1_650_000_000,
            nanos: 123,
        },
        phasor: wireshape_core::Complex { re: 3.0, im: -4.0 },
    };
    let bytes = to_vec(&original, &WriteOptions::default()).unwrap();
    let decoded: Reading = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, original);
}
