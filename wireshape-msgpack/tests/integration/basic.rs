use wireshape_core::{Decode, Encode, Error, Peek, ReadOptions, RecordPeek, WriteOptions};
use wireshape_core::{decode_record, Context, EventSource};
use wireshape_msgpack::{from_slice, to_vec};

struct Greeting {
    message: String,
}

static GREETING_FIELDS: &[wireshape_core::FieldInfo] =
    &[wireshape_core::FieldInfo::new("message")];
static GREETING_SHAPE: wireshape_core::Shape =
    wireshape_core::Shape::new("Greeting", GREETING_FIELDS);

impl Default for Greeting {
    fn default() -> Self {
        Greeting {
            message: String::new(),
        }
    }
}

impl RecordPeek for Greeting {
    fn shape(&self) -> &'static wireshape_core::Shape {
        &GREETING_SHAPE
    }

    fn field_peek(&self, index: usize) -> Peek<'_> {
        match index {
            0 => self.message.peek(),
            _ => unreachable!(),
        }
    }
}

impl Encode for Greeting {
    fn peek(&self) -> Peek<'_> {
        Peek::Record(self)
    }
}

impl Decode for Greeting {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error> {
        decode_record(src, opts, ctx, &GREETING_SHAPE, |out, idx, src, opts, ctx| {
            match idx {
                0 => out.message = String::decode(src, opts, ctx)?,
                _ => unreachable!(),
            }
            Ok(())
        })
    }
}

#[test]
fn utf8_message_round_trips_through_msgpack() {
    let original = Greeting {
        message: "utf8 \u{2705} message pack".to_string(),
    };
    let bytes = to_vec(&original, &WriteOptions::default()).unwrap();
    let decoded: Greeting = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded.message, original.message);
}

#[test]
fn record_round_trips_as_array_when_requested() {
    let original = Greeting {
        message: "array mode".to_string(),
    };
    let mut opts = WriteOptions::default();
    opts.structs_as_arrays = true;
    let bytes = to_vec(&original, &opts).unwrap();
    assert_eq!(bytes[0] & 0xf0, 0x90);
    let decoded: Greeting = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded.message, original.message);
}
