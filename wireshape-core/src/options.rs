//! Read/write options shared across the wire-format codecs.

/// Which wire format a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Beve,
    Cbor,
    MsgPack,
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// JSON: insert newlines + indentation after `{`, `,`, `[`.
    pub prettify: bool,
    pub indentation_width: usize,
    pub indentation_char: char,
    /// Drop `"k":null` record members instead of emitting them.
    pub skip_null_members: bool,
    /// MSGPACK: emit records as arrays of values instead of string-keyed maps.
    pub structs_as_arrays: bool,
    /// Textual formats: render booleans as `0`/`1` instead of `false`/`true`.
    pub bools_as_numbers: bool,
    /// Cap textual float precision to what round-trips through `f32`.
    pub float_max_write_precision: Option<FloatPrecision>,
    /// JSON NDJSON mode: separate successive top-level values with `\n`.
    pub ndjson: bool,
    /// Suppress outer quoting for timestamps on write.
    pub raw: bool,
    pub max_depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPrecision {
    F32,
    F64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            prettify: false,
            indentation_width: 2,
            indentation_char: ' ',
            skip_null_members: false,
            structs_as_arrays: false,
            bools_as_numbers: false,
            float_max_write_precision: None,
            ndjson: false,
            raw: false,
            max_depth: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub error_on_unknown_keys: bool,
    pub error_on_missing_keys: bool,
    /// JSON: accept `//` and `/* */` comments.
    pub comments: bool,
    /// JSON: assume no insignificant whitespace, skip the whitespace scan.
    pub minified: bool,
    /// Stop at the end of the root value, ignoring trailing bytes.
    pub partial_read: bool,
    pub max_depth: u32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            error_on_unknown_keys: true,
            error_on_missing_keys: false,
            comments: false,
            minified: false,
            partial_read: false,
            max_depth: 256,
        }
    }
}
