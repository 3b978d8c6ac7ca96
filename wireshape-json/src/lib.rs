#![warn(missing_docs)]
//! JSON codec (RFC 8259): writes a `Peek` tree to JSON text, and reads JSON
//! text into anything implementing `Decode`.
//!
//! JSON has no binary type, so `Bytes`, `Bitset` bit strings, and `Ext`
//! payloads are all written as base64 strings. It also has no dedicated
//! timestamp literal: a `Timestamp` is written as a quoted ISO-8601 string
//! (or unquoted, with [`WriteOptions::raw`]), and on read, any JSON string
//! that parses cleanly as ISO-8601 is surfaced as [`Event::Timestamp`]
//! rather than [`Event::Str`] — see `DESIGN.md` for the ambiguity this
//! accepts.

use base64::Engine;
use log::trace;
use wireshape_core::{
    Context, Decode, Encode, Error, ErrorKind, Event, EventSource, FieldFlags, FloatPrecision,
    IntMapPeek, NumArrayPeek, Peek, ReadOptions, RecordPeek, SeqPeek, Sink, SliceSource, Source,
    StrMapPeek, WriteOptions,
};

/// Write `value` as JSON bytes.
pub fn to_vec<T: Encode>(value: &T, opts: &WriteOptions) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    trace!("serializing to JSON, prettify={}", opts.prettify);
    write_peek(&value.peek(), &mut out, opts, 0)?;
    Ok(out)
}

/// Read a `T` from a complete JSON byte slice.
pub fn from_slice<T: Decode>(bytes: &[u8], opts: &ReadOptions) -> Result<T, Error> {
    trace!("parsing {} bytes of JSON", bytes.len());
    let mut src = JsonSource::new(bytes, opts.comments);
    let mut ctx = Context::new(opts.max_depth);
    let value = T::decode(&mut src, opts, &mut ctx)?;
    src.skip_ws()?;
    if !opts.partial_read && !src.src.is_empty() {
        return Err(src.err(ErrorKind::SyntaxError));
    }
    Ok(value)
}

/// A 1-based (line, column) position recovered from a byte offset into a
/// JSON source buffer, for error messages that point at a spot a human can
/// find in their editor rather than a raw byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    /// Walk `src` up to `byte_index`, counting newlines. `byte_index` may
    /// fall anywhere (end-of-input, or even mid-character) without
    /// panicking: characters starting at or after it are simply not
    /// counted.
    pub fn locate(src: &str, byte_index: usize) -> LineCol {
        let mut line = 1u32;
        let mut col = 1u32;
        for (offset, ch) in src.char_indices() {
            if offset >= byte_index {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        LineCol { line, col }
    }
}

impl std::fmt::Display for LineCol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// --- writing ---------------------------------------------------------

fn write_indent<S: Sink>(sink: &mut S, opts: &WriteOptions, depth: usize) -> Result<(), Error> {
    if !opts.prettify {
        return Ok(());
    }
    sink.write(b"\n")?;
    let mut buf = [0u8; 4];
    let unit = opts.indentation_char.encode_utf8(&mut buf).as_bytes();
    for _ in 0..(opts.indentation_width * depth) {
        sink.write(unit)?;
    }
    Ok(())
}

fn write_json_string<S: Sink>(sink: &mut S, s: &str) -> Result<(), Error> {
    sink.write(b"\"")?;
    for ch in s.chars() {
        match ch {
            '"' => sink.write(b"\\\"")?,
            '\\' => sink.write(b"\\\\")?,
            '\n' => sink.write(b"\\n")?,
            '\r' => sink.write(b"\\r")?,
            '\t' => sink.write(b"\\t")?,
            '\u{08}' => sink.write(b"\\b")?,
            '\u{0c}' => sink.write(b"\\f")?,
            c if (c as u32) < 0x20 => {
                sink.write(format!("\\u{:04x}", c as u32).as_bytes())?;
            }
            c => {
                let mut buf = [0u8; 4];
                sink.write(c.encode_utf8(&mut buf).as_bytes())?;
            }
        }
    }
    sink.write(b"\"")
}

fn write_base64<S: Sink>(sink: &mut S, bytes: &[u8]) -> Result<(), Error> {
    let text = base64::engine::general_purpose::STANDARD.encode(bytes);
    sink.write(b"\"")?;
    sink.write(text.as_bytes())?;
    sink.write(b"\"")
}

fn write_bool<S: Sink>(sink: &mut S, v: bool, opts: &WriteOptions) -> Result<(), Error> {
    if opts.bools_as_numbers {
        sink.write(if v { b"1" } else { b"0" })
    } else {
        sink.write(if v { b"true" } else { b"false" })
    }
}

fn write_i64<S: Sink>(sink: &mut S, n: i64) -> Result<(), Error> {
    sink.write(n.to_string().as_bytes())
}

fn write_u64<S: Sink>(sink: &mut S, n: u64) -> Result<(), Error> {
    sink.write(n.to_string().as_bytes())
}

fn write_f64<S: Sink>(
    sink: &mut S,
    n: f64,
    precision: Option<FloatPrecision>,
) -> Result<(), Error> {
    if !n.is_finite() {
        // JSON has no NaN/Infinity literal.
        return sink.write(b"null");
    }
    let text = match precision {
        Some(FloatPrecision::F32) => (n as f32).to_string(),
        _ => n.to_string(),
    };
    sink.write(text.as_bytes())
}

fn write_num_array<S: Sink>(arr: &NumArrayPeek<'_>, sink: &mut S) -> Result<(), Error> {
    sink.write(b"[")?;
    match arr {
        NumArrayPeek::I8(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_i64(sink, *v as i64)?;
            }
        }
        NumArrayPeek::I16(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_i64(sink, *v as i64)?;
            }
        }
        NumArrayPeek::I32(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_i64(sink, *v as i64)?;
            }
        }
        NumArrayPeek::I64(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_i64(sink, *v)?;
            }
        }
        NumArrayPeek::U8(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_u64(sink, *v as u64)?;
            }
        }
        NumArrayPeek::U16(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_u64(sink, *v as u64)?;
            }
        }
        NumArrayPeek::U32(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_u64(sink, *v as u64)?;
            }
        }
        NumArrayPeek::U64(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_u64(sink, *v)?;
            }
        }
        NumArrayPeek::F32(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_f64(sink, *v as f64, None)?;
            }
        }
        NumArrayPeek::F64(s) => {
            for (i, v) in s.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_f64(sink, *v, None)?;
            }
        }
    }
    sink.write(b"]")
}

fn write_peek<S: Sink>(
    peek: &Peek<'_>,
    sink: &mut S,
    opts: &WriteOptions,
    depth: usize,
) -> Result<(), Error> {
    match peek {
        Peek::Null => sink.write(b"null"),
        Peek::Bool(b) => write_bool(sink, *b, opts),
        Peek::I64(n) => write_i64(sink, *n),
        Peek::U64(n) => write_u64(sink, *n),
        Peek::F32(n) => write_f64(sink, *n as f64, opts.float_max_write_precision),
        Peek::F64(n) => write_f64(sink, *n, opts.float_max_write_precision),
        Peek::F16(h) => write_f64(sink, h.to_f32() as f64, Some(FloatPrecision::F32)),
        Peek::Str(s) => write_json_string(sink, s),
        Peek::Bytes(b) => write_base64(sink, b),
        Peek::NumArray(arr) => write_num_array(arr, sink),
        Peek::Seq(seq) => {
            sink.write(b"[")?;
            for i in 0..seq.len() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_indent(sink, opts, depth + 1)?;
                write_peek(&seq.get(i), sink, opts, depth + 1)?;
            }
            if !seq.is_empty() {
                write_indent(sink, opts, depth)?;
            }
            sink.write(b"]")
        }
        Peek::StrMap(map) => {
            sink.write(b"{")?;
            for i in 0..map.len() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_indent(sink, opts, depth + 1)?;
                let (key, value) = map.entry(i);
                write_json_string(sink, key)?;
                sink.write(b":")?;
                write_peek(&value, sink, opts, depth + 1)?;
            }
            if !map.is_empty() {
                write_indent(sink, opts, depth)?;
            }
            sink.write(b"}")
        }
        Peek::IntMap(map) => {
            // JSON object keys are always strings.
            sink.write(b"{")?;
            for i in 0..map.len() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_indent(sink, opts, depth + 1)?;
                let (key, value) = map.entry(i);
                write_json_string(sink, &key.to_string())?;
                sink.write(b":")?;
                write_peek(&value, sink, opts, depth + 1)?;
            }
            if !map.is_empty() {
                write_indent(sink, opts, depth)?;
            }
            sink.write(b"}")
        }
        Peek::Record(record) => write_record(*record, sink, opts, depth),
        Peek::Option(inner) => match inner {
            Some(p) => write_peek(p, sink, opts, depth),
            None => sink.write(b"null"),
        },
        Peek::Variant { tag, payload, .. } => {
            sink.write(b"{")?;
            write_indent(sink, opts, depth + 1)?;
            write_json_string(sink, tag)?;
            sink.write(b":")?;
            write_peek(payload, sink, opts, depth + 1)?;
            write_indent(sink, opts, depth)?;
            sink.write(b"}")
        }
        Peek::Timestamp { secs, nanos } => {
            let text = format_timestamp(*secs, *nanos);
            if opts.raw {
                sink.write(text.as_bytes())
            } else {
                write_json_string(sink, &text)
            }
        }
        Peek::Complex { re, im } => {
            sink.write(b"[")?;
            write_f64(sink, *re, None)?;
            sink.write(b",")?;
            write_f64(sink, *im, None)?;
            sink.write(b"]")
        }
        Peek::Matrix {
            row_major,
            extents,
            data,
        } => {
            sink.write(b"{")?;
            write_json_string(sink, "row_major")?;
            sink.write(b":")?;
            write_bool(sink, *row_major, opts)?;
            sink.write(b",")?;
            write_json_string(sink, "extents")?;
            sink.write(b":[")?;
            for (i, e) in extents.iter().enumerate() {
                if i > 0 {
                    sink.write(b",")?;
                }
                write_u64(sink, *e)?;
            }
            sink.write(b"],")?;
            write_json_string(sink, "data")?;
            sink.write(b":")?;
            write_num_array(data, sink)?;
            sink.write(b"}")
        }
        Peek::Bitset { len, bits } => {
            sink.write(b"{")?;
            write_json_string(sink, "len")?;
            sink.write(b":")?;
            write_u64(sink, *len as u64)?;
            sink.write(b",")?;
            write_json_string(sink, "bits")?;
            sink.write(b":")?;
            write_base64(sink, bits)?;
            sink.write(b"}")
        }
        Peek::Ext { tag, data } => {
            sink.write(b"{")?;
            write_json_string(sink, "tag")?;
            sink.write(b":")?;
            write_u64(sink, *tag)?;
            sink.write(b",")?;
            write_json_string(sink, "data")?;
            sink.write(b":")?;
            write_base64(sink, data)?;
            sink.write(b"}")
        }
    }
}

fn write_record<S: Sink>(
    record: &dyn RecordPeek,
    sink: &mut S,
    opts: &WriteOptions,
    depth: usize,
) -> Result<(), Error> {
    let shape = record.shape();
    let mut present = Vec::with_capacity(shape.fields.len());
    for i in 0..shape.fields.len() {
        if shape.fields[i].flags.contains(FieldFlags::SKIP)
            || shape.fields[i].flags.contains(FieldFlags::HIDDEN)
        {
            continue;
        }
        let value = record.field_peek(i);
        if opts.skip_null_members && matches!(value, Peek::Option(None)) {
            continue;
        }
        present.push((i, value));
    }
    if opts.structs_as_arrays {
        sink.write(b"[")?;
        for (i, (_, value)) in present.iter().enumerate() {
            if i > 0 {
                sink.write(b",")?;
            }
            write_indent(sink, opts, depth + 1)?;
            write_peek(value, sink, opts, depth + 1)?;
        }
        if !present.is_empty() {
            write_indent(sink, opts, depth)?;
        }
        sink.write(b"]")
    } else {
        sink.write(b"{")?;
        for (i, (field_idx, value)) in present.iter().enumerate() {
            if i > 0 {
                sink.write(b",")?;
            }
            write_indent(sink, opts, depth + 1)?;
            write_json_string(sink, shape.fields[*field_idx].name)?;
            sink.write(b":")?;
            write_peek(value, sink, opts, depth + 1)?;
        }
        if !present.is_empty() {
            write_indent(sink, opts, depth)?;
        }
        sink.write(b"}")
    }
}

/// Days-since-epoch civil calendar conversion (Howard Hinnant's
/// `civil_from_days`/`days_from_civil`), used for ISO-8601 timestamps since
/// nothing else in this workspace carries a calendar dependency.
fn floor_div(a: i64, b: i64) -> i64 {
    let d = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        d - 1
    } else {
        d
    }
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = floor_div(if z >= 0 { z } else { z - 146096 }, 146097);
    let doe = z - era * 146097; // [0, 146096]
    let yoe = floor_div(doe - doe / 1460 + doe / 36524 - doe / 146096, 365); // [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32; // [1, 31]
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32; // [1, 12]
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = floor_div(if y >= 0 { y } else { y - 399 }, 400);
    let yoe = y - era * 400; // [0, 399]
    let mp = if m > 2 { m - 3 } else { m + 9 } as i64;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era * 146097 + doe - 719468
}

fn format_timestamp(secs: i64, nanos: u32) -> String {
    let days = secs.div_euclid(86400);
    let rem = secs.rem_euclid(86400);
    let (y, m, d) = civil_from_days(days);
    let (hour, minute, sec) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    if nanos == 0 {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            y, m, d, hour, minute, sec
        )
    } else {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}Z",
            y, m, d, hour, minute, sec, nanos
        )
    }
}

/// Strict ISO-8601 parse: `YYYY-MM-DDTHH:MM:SS(.fraction)?(Z|±HH:MM)`. Any
/// deviation returns `None`, so callers fall back to treating the string as
/// plain text.
fn parse_timestamp(s: &str) -> Option<(i64, u32)> {
    let b = s.as_bytes();
    if b.len() < 20 {
        return None;
    }
    let digit = |i: usize| -> Option<i64> {
        let c = *b.get(i)?;
        c.is_ascii_digit().then(|| (c - b'0') as i64)
    };
    let two = |i: usize| -> Option<u32> { Some((digit(i)? * 10 + digit(i + 1)?) as u32) };
    let four = |i: usize| -> Option<i64> {
        Some(digit(i)? * 1000 + digit(i + 1)? * 100 + digit(i + 2)? * 10 + digit(i + 3)?)
    };
    if b[4] != b'-' || b[7] != b'-' || b[10] != b'T' || b[13] != b':' || b[16] != b':' {
        return None;
    }
    let year = four(0)?;
    let month = two(5)?;
    let day = two(8)?;
    let hour = two(11)?;
    let minute = two(14)?;
    let second = two(17)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60
    {
        return None;
    }

    let mut idx = 19;
    let mut nanos: u32 = 0;
    if b.get(idx) == Some(&b'.') {
        idx += 1;
        let start = idx;
        while b.get(idx).is_some_and(u8::is_ascii_digit) {
            idx += 1;
        }
        if idx == start {
            return None;
        }
        let mut digits = std::str::from_utf8(&b[start..idx]).ok()?.to_string();
        digits.truncate(9);
        while digits.len() < 9 {
            digits.push('0');
        }
        nanos = digits.parse().ok()?;
    }

    let offset_secs = match b.get(idx) {
        Some(b'Z') | Some(b'z') => {
            idx += 1;
            0i64
        }
        Some(&sign @ (b'+' | b'-')) => {
            idx += 1;
            let oh = two(idx)?;
            if b.get(idx + 2) != Some(&b':') {
                return None;
            }
            let om = two(idx + 3)?;
            idx += 5;
            let total = (oh * 3600 + om * 60) as i64;
            if sign == b'-' {
                -total
            } else {
                total
            }
        }
        _ => return None,
    };
    if idx != b.len() {
        return None;
    }

    let days = days_from_civil(year, month, day);
    let local_secs = days * 86400 + (hour as i64) * 3600 + (minute as i64) * 60 + second as i64;
    Some((local_secs - offset_secs, nanos))
}

// --- reading -----------------------------------------------------------

enum Frame {
    Array { started: bool },
    Object { started: bool, awaiting_value: bool },
}

/// Pull-parser over a JSON byte slice.
pub struct JsonSource<'a> {
    src: SliceSource<'a>,
    stack: Vec<Frame>,
    comments: bool,
}

impl<'a> JsonSource<'a> {
    pub fn new(bytes: &'a [u8], comments: bool) -> Self {
        Self {
            src: SliceSource::new(bytes),
            stack: Vec::new(),
            comments,
        }
    }

    fn err(&self, kind: ErrorKind) -> Error {
        let idx = self.src.position();
        let err = Error::at(kind, idx);
        match std::str::from_utf8(self.src.all()) {
            Ok(text) => {
                let LineCol { line, col } = LineCol::locate(text, idx);
                err.with_line_col(line, col)
            }
            Err(_) => err,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.peek(1).map(|b| b[0])
    }

    fn skip_ws(&mut self) -> Result<(), Error> {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                    self.src.advance(1)?;
                }
                Some(b'/') if self.comments => {
                    let next = self.src.peek(2).and_then(|b| b.get(1).copied());
                    match next {
                        Some(b'/') => {
                            self.src.advance(2)?;
                            while let Some(c) = self.peek_byte() {
                                self.src.advance(1)?;
                                if c == b'\n' {
                                    break;
                                }
                            }
                        }
                        Some(b'*') => {
                            self.src.advance(2)?;
                            loop {
                                match self.peek_byte() {
                                    None => return Err(self.err(ErrorKind::UnexpectedEnd)),
                                    Some(b'*')
                                        if self.src.peek(2).and_then(|b| b.get(1).copied())
                                            == Some(b'/') =>
                                    {
                                        self.src.advance(2)?;
                                        break;
                                    }
                                    _ => self.src.advance(1)?,
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn expect_literal(&mut self, text: &str) -> Result<(), Error> {
        let bytes = self.src.take(text.len())?;
        if bytes != text.as_bytes() {
            return Err(self.err(ErrorKind::SyntaxError));
        }
        Ok(())
    }

    fn parse_string(&mut self) -> Result<String, Error> {
        self.src.advance(1)?; // opening quote
        let mut buf = Vec::new();
        loop {
            let c = self.src.take_u8()?;
            match c {
                b'"' => break,
                b'\\' => {
                    let esc = self.src.take_u8()?;
                    match esc {
                        b'"' => buf.push(b'"'),
                        b'\\' => buf.push(b'\\'),
                        b'/' => buf.push(b'/'),
                        b'b' => buf.push(0x08),
                        b'f' => buf.push(0x0c),
                        b'n' => buf.push(b'\n'),
                        b'r' => buf.push(b'\r'),
                        b't' => buf.push(b'\t'),
                        b'u' => {
                            let code = self.read_hex4()?;
                            let ch = if (0xd800..=0xdbff).contains(&code) {
                                if self.src.take(2)? != b"\\u" {
                                    return Err(self.err(ErrorKind::ParseError));
                                }
                                let low = self.read_hex4()?;
                                if !(0xdc00..=0xdfff).contains(&low) {
                                    return Err(self.err(ErrorKind::ParseError));
                                }
                                let combined = 0x10000
                                    + ((code as u32 - 0xd800) << 10)
                                    + (low as u32 - 0xdc00);
                                char::from_u32(combined)
                            } else {
                                char::from_u32(code as u32)
                            };
                            let ch = ch.ok_or_else(|| self.err(ErrorKind::ParseError))?;
                            let mut tmp = [0u8; 4];
                            buf.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
                        }
                        _ => return Err(self.err(ErrorKind::SyntaxError)),
                    }
                }
                // Every byte of a multi-byte UTF-8 sequence has its high bit
                // set, so it is never confused with `"` or `\` here.
                other => buf.push(other),
            }
        }
        String::from_utf8(buf).map_err(|_| self.err(ErrorKind::ParseError))
    }

    fn read_hex4(&mut self) -> Result<u16, Error> {
        let bytes = self.src.take(4)?;
        let s = std::str::from_utf8(bytes).map_err(|_| self.err(ErrorKind::ParseError))?;
        u16::from_str_radix(s, 16).map_err(|_| self.err(ErrorKind::ParseError))
    }

    fn parse_number(&mut self) -> Result<Event, Error> {
        let start = self.src.position();
        if self.peek_byte() == Some(b'-') {
            self.src.advance(1)?;
        }
        let int_start = self.src.position();
        while self.peek_byte().is_some_and(|c| c.is_ascii_digit()) {
            self.src.advance(1)?;
        }
        let int_len = self.src.position() - int_start;
        if int_len > 1 && self.src.all()[int_start] == b'0' {
            trace!("rejecting number with a leading zero at byte {int_start}");
            return Err(self.err(ErrorKind::ParseError));
        }
        let mut is_float = false;
        if self.peek_byte() == Some(b'.') {
            is_float = true;
            self.src.advance(1)?;
            while self.peek_byte().is_some_and(|c| c.is_ascii_digit()) {
                self.src.advance(1)?;
            }
        }
        if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.src.advance(1)?;
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                self.src.advance(1)?;
            }
            while self.peek_byte().is_some_and(|c| c.is_ascii_digit()) {
                self.src.advance(1)?;
            }
        }
        let end = self.src.position();
        let text = std::str::from_utf8(&self.src.all()[start..end])
            .map_err(|_| self.err(ErrorKind::ParseError))?;

        if is_float {
            text.parse::<f64>()
                .map(Event::F64)
                .map_err(|_| self.err(ErrorKind::ParseError))
        } else if let Some(rest) = text.strip_prefix('-') {
            rest.parse::<i64>()
                .map(|v| Event::I64(-v))
                .or_else(|_| text.parse::<f64>().map(Event::F64))
                .map_err(|_| self.err(ErrorKind::ParseError))
        } else {
            text.parse::<u64>()
                .map(Event::U64)
                .or_else(|_| text.parse::<f64>().map(Event::F64))
                .map_err(|_| self.err(ErrorKind::ParseError))
        }
    }

    fn parse_value(&mut self) -> Result<Event, Error> {
        self.skip_ws()?;
        match self.peek_byte() {
            Some(b'{') => {
                self.src.advance(1)?;
                self.stack.push(Frame::Object {
                    started: false,
                    awaiting_value: false,
                });
                Ok(Event::MapStart)
            }
            Some(b'[') => {
                self.src.advance(1)?;
                self.stack.push(Frame::Array { started: false });
                Ok(Event::SeqStart)
            }
            Some(b'"') => {
                let s = self.parse_string()?;
                match parse_timestamp(&s) {
                    Some((secs, nanos)) => Ok(Event::Timestamp { secs, nanos }),
                    None => Ok(Event::Str(s)),
                }
            }
            Some(b't') => {
                self.expect_literal("true")?;
                Ok(Event::Bool(true))
            }
            Some(b'f') => {
                self.expect_literal("false")?;
                Ok(Event::Bool(false))
            }
            Some(b'n') => {
                self.expect_literal("null")?;
                Ok(Event::Null)
            }
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            _ => Err(self.err(ErrorKind::SyntaxError)),
        }
    }
}

impl<'a> EventSource for JsonSource<'a> {
    fn next_event(&mut self) -> Result<Event, Error> {
        match self.stack.last() {
            Some(Frame::Array { started }) => {
                let started = *started;
                self.skip_ws()?;
                if self.peek_byte() == Some(b']') {
                    self.src.advance(1)?;
                    self.stack.pop();
                    return Ok(Event::SeqEnd);
                }
                if started {
                    if self.peek_byte() != Some(b',') {
                        return Err(self.err(ErrorKind::SyntaxError));
                    }
                    self.src.advance(1)?;
                }
                if let Some(Frame::Array { started }) = self.stack.last_mut() {
                    *started = true;
                }
                self.parse_value()
            }
            Some(Frame::Object {
                started,
                awaiting_value,
            }) => {
                if *awaiting_value {
                    self.skip_ws()?;
                    if self.peek_byte() != Some(b':') {
                        return Err(self.err(ErrorKind::SyntaxError));
                    }
                    self.src.advance(1)?;
                    if let Some(Frame::Object { awaiting_value, .. }) = self.stack.last_mut() {
                        *awaiting_value = false;
                    }
                    return self.parse_value();
                }
                let started = *started;
                self.skip_ws()?;
                if self.peek_byte() == Some(b'}') {
                    self.src.advance(1)?;
                    self.stack.pop();
                    return Ok(Event::MapEnd);
                }
                if started {
                    if self.peek_byte() != Some(b',') {
                        return Err(self.err(ErrorKind::SyntaxError));
                    }
                    self.src.advance(1)?;
                    self.skip_ws()?;
                }
                if self.peek_byte() != Some(b'"') {
                    return Err(self.err(ErrorKind::InvalidPartialKey));
                }
                let key = self.parse_string()?;
                if let Some(Frame::Object {
                    started,
                    awaiting_value,
                }) = self.stack.last_mut()
                {
                    *started = true;
                    *awaiting_value = true;
                }
                Ok(Event::MapKey(key))
            }
            None => self.parse_value(),
        }
    }

    fn position(&self) -> usize {
        self.src.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> WriteOptions {
        WriteOptions::default()
    }

    #[test]
    fn exact_json_bytes_round_trip() {
        let v = vec![1i32, -2, 3];
        let bytes = to_vec(&v, &opts()).unwrap();
        assert_eq!(bytes, b"[1,-2,3]");
        let decoded: Vec<i32> = from_slice(&bytes, &ReadOptions::default()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn string_escapes_round_trip() {
        let s = "line1\nline2\t\"quoted\"".to_string();
        let bytes = to_vec(&s, &opts()).unwrap();
        let decoded: String = from_slice(&bytes, &ReadOptions::default()).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn line_col_locates_a_position_past_a_newline() {
        let src = "{\n  \"a\": 1,\n  \"b\": ]\n}";
        let idx = src.rfind(']').unwrap();
        let lc = LineCol::locate(src, idx);
        assert_eq!(lc, LineCol { line: 3, col: 8 });
    }

    #[test]
    fn syntax_error_renders_with_line_and_column() {
        let bad = b"[\n  x\n]";
        let err = from_slice::<Vec<i32>>(bad, &ReadOptions::default()).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.starts_with("2:"), "got {rendered:?}");
    }

    #[test]
    fn prettify_indents_nested_arrays() {
        let mut o = opts();
        o.prettify = true;
        let v = vec![1i32, 2];
        let bytes = to_vec(&v, &o).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "[\n  1,\n  2\n]");
    }

    #[test]
    fn iso8601_offset_is_normalized_to_utc() {
        let ts = wireshape_core::Timestamp {
            secs: 1_700_000_000,
            nanos: 0,
        };
        let with_offset = "\"2023-11-14T23:13:20+01:00\"";
        let decoded: wireshape_core::Timestamp =
            from_slice(with_offset.as_bytes(), &ReadOptions::default()).unwrap();
        assert_eq!(decoded, ts);
    }

    #[test]
    fn timestamp_round_trips_through_utc_string() {
        let ts = wireshape_core::Timestamp {
            secs: 1_600_000_000,
            nanos: 250_000_000,
        };
        let bytes = to_vec(&ts, &opts()).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "\"2020-09-13T12:26:40.250000000Z\""
        );
        let decoded: wireshape_core::Timestamp =
            from_slice(&bytes, &ReadOptions::default()).unwrap();
        assert_eq!(decoded, ts);
    }

    #[test]
    fn skip_null_members_drops_none_fields() {
        let mut o = opts();
        o.skip_null_members = true;
        // A bare Option at the top level isn't a record, so exercise the
        // record path's flag handling directly via a tiny RecordPeek.
        struct OneField(Option<i32>);
        static FIELDS: &[wireshape_core::FieldInfo] = &[wireshape_core::FieldInfo::new("n")];
        static SHAPE: wireshape_core::Shape = wireshape_core::Shape::new("OneField", FIELDS);
        impl RecordPeek for OneField {
            fn shape(&self) -> &'static wireshape_core::Shape {
                &SHAPE
            }
            fn field_peek(&self, _index: usize) -> Peek<'_> {
                Peek::Option(self.0.map(|n| Box::new(Peek::I64(n as i64))))
            }
        }
        impl Encode for OneField {
            fn peek(&self) -> Peek<'_> {
                Peek::Record(self)
            }
        }
        let bytes = to_vec(&OneField(None), &o).unwrap();
        assert_eq!(bytes, b"{}");
        let bytes = to_vec(&OneField(Some(5)), &o).unwrap();
        assert_eq!(bytes, b"{\"n\":5}");
    }

    #[test]
    fn leading_zero_in_an_integer_is_rejected() {
        for bad in [b"01".as_slice(), b"-01".as_slice(), b"00".as_slice()] {
            let err = from_slice::<i64>(bad, &ReadOptions::default()).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ParseError, "input {bad:?} should be rejected");
        }
        let decoded: i64 = from_slice(b"0", &ReadOptions::default()).unwrap();
        assert_eq!(decoded, 0);
        let decoded: f64 = from_slice(b"0.5", &ReadOptions::default()).unwrap();
        assert_eq!(decoded, 0.5);
    }

    #[test]
    fn comments_are_skipped_when_enabled() {
        let mut ro = ReadOptions::default();
        ro.comments = true;
        let text = b"[1, /* two */ 2, 3] // trailing";
        let decoded: Vec<i32> = from_slice(text, &ro).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }
}
