use wireshape_core::{decode_record, Context, EventSource};
use wireshape_core::{Decode, Encode, Error, Peek, ReadOptions, RecordPeek, WriteOptions};
use wireshape_json::{from_slice, to_vec};

#[derive(Default, PartialEq, Debug)]
struct Profile {
    name: String,
    tags: Vec<String>,
    nickname: Option<String>,
}

static PROFILE_FIELDS: &[wireshape_core::FieldInfo] = &[
    wireshape_core::FieldInfo::new("name"),
    wireshape_core::FieldInfo::new("tags"),
    wireshape_core::FieldInfo::new("nickname"),
];
static PROFILE_SHAPE: wireshape_core::Shape =
    wireshape_core::Shape::new("Profile", PROFILE_FIELDS);

impl RecordPeek for Profile {
    fn shape(&self) -> &'static wireshape_core::Shape {
        &PROFILE_SHAPE
    }

    fn field_peek(&self, index: usize) -> Peek<'_> {
        match index {
            0 => self.name.peek(),
            1 => self.tags.peek(),
            2 => self.nickname.peek(),
            _ => unreachable!(),
        }
    }
}

impl Encode for Profile {
    fn peek(&self) -> Peek<'_> {
        Peek::Record(self)
    }
}

impl Decode for Profile {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error> {
        decode_record(src, opts, ctx, &PROFILE_SHAPE, |out, idx, src, opts, ctx| {
            match idx {
                0 => out.name = String::decode(src, opts, ctx)?,
                1 => out.tags = Vec::decode(src, opts, ctx)?,
                2 => out.nickname = Option::decode(src, opts, ctx)?,
                _ => unreachable!(),
            }
            Ok(())
        })
    }
}

#[test]
fn record_round_trips_with_nested_seq_and_option() {
    let original = Profile {
        name: "Ada".to_string(),
        tags: vec!["math".to_string(), "computing".to_string()],
        nickname: None,
    };
    let bytes = to_vec(&original, &WriteOptions::default()).unwrap();
    let decoded: Profile = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn missing_keys_default_when_not_required() {
    let json = br#"{"name":"Grace","tags":["cobol"]}"#;
    let decoded: Profile = from_slice(json, &ReadOptions::default()).unwrap();
    assert_eq!(decoded.name, "Grace");
    assert_eq!(decoded.tags, vec!["cobol".to_string()]);
    assert_eq!(decoded.nickname, None);
}

#[test]
fn unknown_key_errors_unless_allowed() {
    let json = br#"{"name":"Grace","tags":[],"nickname":null,"extra":1}"#;
    let strict = from_slice::<Profile>(json, &ReadOptions::default());
    assert!(strict.is_err());

    let lenient = ReadOptions {
        error_on_unknown_keys: false,
        ..ReadOptions::default()
    };
    let decoded: Profile = from_slice(json, &lenient).unwrap();
    assert_eq!(decoded.name, "Grace");
}

#[test]
fn record_round_trips_as_array_when_requested() {
    let original = Profile {
        name: "Hedy".to_string(),
        tags: vec!["frequency hopping".to_string()],
        nickname: Some("HL".to_string()),
    };
    let mut opts = WriteOptions::default();
    opts.structs_as_arrays = true;
    let bytes = to_vec(&original, &opts).unwrap();
    assert_eq!(bytes[0], b'[');
    let decoded: Profile = from_slice(&bytes, &ReadOptions::default()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn prettified_record_matches_expected_layout() {
    let original = Profile {
        name: "Kay".to_string(),
        tags: vec![],
        nickname: None,
    };
    let mut opts = WriteOptions::default();
    opts.prettify = true;
    opts.skip_null_members = true;
    let bytes = to_vec(&original, &opts).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text, "{\n  \"name\":\"Kay\",\n  \"tags\":[]\n}");
}
