#![warn(missing_docs)]
//! CBOR codec: writes a `Peek` tree to CBOR bytes (RFC 8949), and reads
//! CBOR bytes into anything implementing `Decode`.
//!
//! Every initial byte packs a major type into the top 3 bits and an
//! "additional info" argument into the bottom 5. Arguments 0..23 are
//! carried inline; 24/25/26/27 select a following 1/2/4/8-byte
//! big-endian argument; 31 marks an indefinite-length container,
//! terminated by the break byte `0xff`. Floats use "preferred
//! serialization": the shortest width that round-trips exactly. Typed
//! numeric arrays (RFC 8746, tags 64..87) and this library's complex
//! scalar (tag 43000) ride on top of the same byte-string/array
//! primitives; any other tag is transparent on read, since nothing
//! downstream needs its semantics to skip past it.

use log::trace;
use wireshape_core::{
    Context, Decode, Encode, Error, ErrorKind, Event, EventSource, F16, IntMapPeek, NumArrayPeek,
    Peek, ReadOptions, RecordPeek, SeqPeek, Sink, SliceSource, Source, StrMapPeek, WriteOptions,
};

const MAJOR_UINT: u8 = 0;
const MAJOR_NEGINT: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const SIMPLE_UNDEFINED: u8 = 23;
const ARG_1BYTE: u8 = 24;
const ARG_2BYTE: u8 = 25;
const ARG_4BYTE: u8 = 26;
const ARG_8BYTE: u8 = 27;
const ARG_INDEFINITE: u8 = 31;
const BREAK: u8 = 0xff;

const TAG_COMPLEX_SCALAR: u64 = 43000;

/// Little-endian RFC 8746 typed-array tags this codec writes. Any other
/// tag in 64..87 (big-endian, or uint8-clamped) is accepted on read via
/// the generic tag pass-through, since typed arrays are write-only here.
const TAG_U8_ARRAY: u64 = 64;
const TAG_U16_LE_ARRAY: u64 = 69;
const TAG_U32_LE_ARRAY: u64 = 70;
const TAG_U64_LE_ARRAY: u64 = 71;
const TAG_I8_ARRAY: u64 = 72;
const TAG_I16_LE_ARRAY: u64 = 77;
const TAG_I32_LE_ARRAY: u64 = 78;
const TAG_I64_LE_ARRAY: u64 = 79;
const TAG_F32_LE_ARRAY: u64 = 85;
const TAG_F64_LE_ARRAY: u64 = 86;

/// Write `value` as a CBOR byte vector.
pub fn to_vec<T: Encode>(value: &T, opts: &WriteOptions) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    trace!("serializing to CBOR");
    write_peek(&value.peek(), &mut out, opts)?;
    Ok(out)
}

/// Read a `T` from a complete CBOR byte slice.
pub fn from_slice<T: Decode>(bytes: &[u8], opts: &ReadOptions) -> Result<T, Error> {
    trace!("parsing {} bytes of CBOR", bytes.len());
    let mut src = CborSource::new(bytes);
    let mut ctx = Context::new(opts.max_depth);
    let value = T::decode(&mut src, opts, &mut ctx)?;
    if !opts.partial_read && !src.src.is_empty() {
        return Err(Error::at(ErrorKind::SyntaxError, src.src.position()));
    }
    Ok(value)
}

fn write_head<S: Sink>(sink: &mut S, major: u8, arg: u64) -> Result<(), Error> {
    let top = major << 5;
    match arg {
        0..=23 => sink.write(&[top | arg as u8]),
        24..=0xff => sink.write(&[top | ARG_1BYTE, arg as u8]),
        0x100..=0xffff => {
            sink.write(&[top | ARG_2BYTE])?;
            sink.write(&(arg as u16).to_be_bytes())
        }
        0x1_0000..=0xffff_ffff => {
            sink.write(&[top | ARG_4BYTE])?;
            sink.write(&(arg as u32).to_be_bytes())
        }
        _ => {
            sink.write(&[top | ARG_8BYTE])?;
            sink.write(&arg.to_be_bytes())
        }
    }
}

fn write_uint<S: Sink>(sink: &mut S, n: u64) -> Result<(), Error> {
    write_head(sink, MAJOR_UINT, n)
}

fn write_int<S: Sink>(sink: &mut S, n: i64) -> Result<(), Error> {
    if n >= 0 {
        write_uint(sink, n as u64)
    } else {
        write_head(sink, MAJOR_NEGINT, (-1 - n) as u64)
    }
}

fn write_bool<S: Sink>(sink: &mut S, v: bool, opts: &WriteOptions) -> Result<(), Error> {
    if opts.bools_as_numbers {
        write_uint(sink, v as u64)
    } else {
        sink.write(&[(MAJOR_SIMPLE << 5) | if v { SIMPLE_TRUE } else { SIMPLE_FALSE }])
    }
}

fn write_null<S: Sink>(sink: &mut S) -> Result<(), Error> {
    sink.write(&[(MAJOR_SIMPLE << 5) | SIMPLE_NULL])
}

fn write_half<S: Sink>(sink: &mut S, h: F16) -> Result<(), Error> {
    sink.write(&[(MAJOR_SIMPLE << 5) | ARG_2BYTE])?;
    sink.write(&h.0.to_be_bytes())
}

fn write_f32<S: Sink>(sink: &mut S, n: f32) -> Result<(), Error> {
    sink.write(&[(MAJOR_SIMPLE << 5) | ARG_4BYTE])?;
    sink.write(&n.to_be_bytes())
}

fn write_f64<S: Sink>(sink: &mut S, n: f64) -> Result<(), Error> {
    sink.write(&[(MAJOR_SIMPLE << 5) | ARG_8BYTE])?;
    sink.write(&n.to_be_bytes())
}

/// Preferred serialization: half if exact, else float32 if exact, else
/// float64.
fn write_float_preferred<S: Sink>(sink: &mut S, v: f64) -> Result<(), Error> {
    if v.is_nan() {
        return write_half(sink, F16(0x7e00));
    }
    let as_f32 = v as f32;
    if as_f32 as f64 == v {
        if F16::exactly_represents(as_f32) {
            write_half(sink, F16::from_f32(as_f32))
        } else {
            write_f32(sink, as_f32)
        }
    } else {
        write_f64(sink, v)
    }
}

fn write_f32_preferred<S: Sink>(sink: &mut S, v: f32) -> Result<(), Error> {
    if v.is_nan() {
        return write_half(sink, F16(0x7e00));
    }
    if F16::exactly_represents(v) {
        write_half(sink, F16::from_f32(v))
    } else {
        write_f32(sink, v)
    }
}

fn write_str<S: Sink>(sink: &mut S, s: &str) -> Result<(), Error> {
    write_head(sink, MAJOR_TEXT, s.len() as u64)?;
    sink.write(s.as_bytes())
}

fn write_bin<S: Sink>(sink: &mut S, bytes: &[u8]) -> Result<(), Error> {
    write_head(sink, MAJOR_BYTES, bytes.len() as u64)?;
    sink.write(bytes)
}

fn write_array_header<S: Sink>(sink: &mut S, len: usize) -> Result<(), Error> {
    write_head(sink, MAJOR_ARRAY, len as u64)
}

fn write_map_header<S: Sink>(sink: &mut S, len: usize) -> Result<(), Error> {
    write_head(sink, MAJOR_MAP, len as u64)
}

fn write_tag<S: Sink>(sink: &mut S, tag: u64) -> Result<(), Error> {
    write_head(sink, MAJOR_TAG, tag)
}

fn typed_array_tag(arr: &NumArrayPeek<'_>) -> u64 {
    match arr {
        NumArrayPeek::I8(_) => TAG_I8_ARRAY,
        NumArrayPeek::I16(_) => TAG_I16_LE_ARRAY,
        NumArrayPeek::I32(_) => TAG_I32_LE_ARRAY,
        NumArrayPeek::I64(_) => TAG_I64_LE_ARRAY,
        NumArrayPeek::U8(_) => TAG_U8_ARRAY,
        NumArrayPeek::U16(_) => TAG_U16_LE_ARRAY,
        NumArrayPeek::U32(_) => TAG_U32_LE_ARRAY,
        NumArrayPeek::U64(_) => TAG_U64_LE_ARRAY,
        NumArrayPeek::F32(_) => TAG_F32_LE_ARRAY,
        NumArrayPeek::F64(_) => TAG_F64_LE_ARRAY,
    }
}

fn write_num_array<S: Sink>(arr: &NumArrayPeek<'_>, sink: &mut S) -> Result<(), Error> {
    write_tag(sink, typed_array_tag(arr))?;
    let mut bytes = Vec::new();
    match arr {
        NumArrayPeek::I8(s) => bytes.extend(s.iter().map(|v| *v as u8)),
        NumArrayPeek::I16(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
        NumArrayPeek::I32(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
        NumArrayPeek::I64(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
        NumArrayPeek::U8(s) => bytes.extend_from_slice(s),
        NumArrayPeek::U16(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
        NumArrayPeek::U32(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
        NumArrayPeek::U64(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
        NumArrayPeek::F32(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
        NumArrayPeek::F64(s) => s.iter().for_each(|v| bytes.extend(v.to_le_bytes())),
    }
    write_bin(sink, &bytes)
}

fn write_peek<S: Sink>(peek: &Peek<'_>, sink: &mut S, opts: &WriteOptions) -> Result<(), Error> {
    match peek {
        Peek::Null => write_null(sink),
        Peek::Bool(b) => write_bool(sink, *b, opts),
        Peek::I64(n) => write_int(sink, *n),
        Peek::U64(n) => write_uint(sink, *n),
        Peek::F32(n) => write_f32_preferred(sink, *n),
        Peek::F64(n) => write_float_preferred(sink, *n),
        Peek::F16(h) => write_f32_preferred(sink, h.to_f32()),
        Peek::Str(s) => write_str(sink, s),
        Peek::Bytes(b) => write_bin(sink, b),
        Peek::NumArray(arr) => write_num_array(arr, sink),
        Peek::Seq(seq) => {
            write_array_header(sink, seq.len())?;
            for i in 0..seq.len() {
                write_peek(&seq.get(i), sink, opts)?;
            }
            Ok(())
        }
        Peek::StrMap(map) => {
            write_map_header(sink, map.len())?;
            for i in 0..map.len() {
                let (key, value) = map.entry(i);
                write_str(sink, key)?;
                write_peek(&value, sink, opts)?;
            }
            Ok(())
        }
        Peek::IntMap(map) => {
            write_map_header(sink, map.len())?;
            for i in 0..map.len() {
                let (key, value) = map.entry(i);
                write_int(sink, key)?;
                write_peek(&value, sink, opts)?;
            }
            Ok(())
        }
        Peek::Record(record) => write_record(*record, sink, opts),
        Peek::Option(inner) => match inner {
            Some(p) => write_peek(p, sink, opts),
            None => write_null(sink),
        },
        Peek::Variant { tag, payload, .. } => {
            write_map_header(sink, 1)?;
            write_str(sink, tag)?;
            write_peek(payload, sink, opts)
        }
        Peek::Timestamp { secs, nanos } => {
            write_map_header(sink, 2)?;
            write_str(sink, "secs")?;
            write_int(sink, *secs)?;
            write_str(sink, "nanos")?;
            write_uint(sink, *nanos as u64)
        }
        Peek::Complex { re, im } => {
            write_tag(sink, TAG_COMPLEX_SCALAR)?;
            write_array_header(sink, 2)?;
            write_float_preferred(sink, *re)?;
            write_float_preferred(sink, *im)
        }
        Peek::Matrix {
            row_major,
            extents,
            data,
        } => {
            write_array_header(sink, 3)?;
            write_bool(sink, *row_major, opts)?;
            write_array_header(sink, extents.len())?;
            for e in extents.iter() {
                write_uint(sink, *e)?;
            }
            write_num_array(data, sink)
        }
        Peek::Bitset { len, bits } => {
            write_map_header(sink, 2)?;
            write_str(sink, "len")?;
            write_uint(sink, *len as u64)?;
            write_str(sink, "bits")?;
            write_bin(sink, bits)
        }
        Peek::Ext { tag, data } => {
            write_tag(sink, *tag)?;
            write_bin(sink, data)
        }
    }
}

fn write_record<S: Sink>(
    record: &dyn RecordPeek,
    sink: &mut S,
    opts: &WriteOptions,
) -> Result<(), Error> {
    let shape = record.shape();
    let mut present = Vec::with_capacity(shape.fields.len());
    for i in 0..shape.fields.len() {
        if shape.fields[i]
            .flags
            .contains(wireshape_core::FieldFlags::SKIP)
            || shape.fields[i]
                .flags
                .contains(wireshape_core::FieldFlags::HIDDEN)
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
        write_array_header(sink, present.len())?;
        for (_, value) in &present {
            write_peek(value, sink, opts)?;
        }
    } else {
        write_map_header(sink, present.len())?;
        for (i, value) in &present {
            write_str(sink, shape.fields[*i].name)?;
            write_peek(value, sink, opts)?;
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Frame {
    // -1 means indefinite length, terminated by the break byte.
    Array { remaining: i64 },
    Map { remaining: i64, awaiting_value: bool },
}

/// Pull-parser over a CBOR byte slice.
pub struct CborSource<'a> {
    src: SliceSource<'a>,
    stack: Vec<Frame>,
}

impl<'a> CborSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            src: SliceSource::new(bytes),
            stack: Vec::new(),
        }
    }

    fn err(&self, kind: ErrorKind) -> Error {
        Error::at(kind, self.src.position())
    }

    fn read_be<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let bytes = self.src.take(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    fn peek_is_break(&self) -> Result<bool, Error> {
        match self.src.peek(1) {
            Some(b) => Ok(b[0] == BREAK),
            None => Err(self.err(ErrorKind::UnexpectedEnd)),
        }
    }

    fn read_uint_arg(&mut self, info: u8) -> Result<u64, Error> {
        match info {
            0..=23 => Ok(info as u64),
            ARG_1BYTE => Ok(self.src.take_u8()? as u64),
            ARG_2BYTE => Ok(u16::from_be_bytes(self.read_be()?) as u64),
            ARG_4BYTE => Ok(u32::from_be_bytes(self.read_be()?) as u64),
            ARG_8BYTE => Ok(u64::from_be_bytes(self.read_be()?)),
            _ => Err(self.err(ErrorKind::SyntaxError)),
        }
    }

    fn read_definite_bytes(&mut self, info: u8) -> Result<Vec<u8>, Error> {
        let len = self.read_uint_arg(info)? as usize;
        Ok(self.src.take(len)?.to_vec())
    }

    fn read_indefinite_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        loop {
            if self.peek_is_break()? {
                self.src.take_u8()?;
                break;
            }
            let byte = self.src.take_u8()?;
            if byte >> 5 != MAJOR_BYTES {
                return Err(self.err(ErrorKind::InvalidBody));
            }
            buf.extend(self.read_definite_bytes(byte & 0x1f)?);
        }
        Ok(buf)
    }

    fn read_indefinite_text(&mut self) -> Result<String, Error> {
        let mut buf = Vec::new();
        loop {
            if self.peek_is_break()? {
                self.src.take_u8()?;
                break;
            }
            let byte = self.src.take_u8()?;
            if byte >> 5 != MAJOR_TEXT {
                return Err(self.err(ErrorKind::InvalidBody));
            }
            buf.extend(self.read_definite_bytes(byte & 0x1f)?);
        }
        String::from_utf8(buf).map_err(|_| self.err(ErrorKind::ParseError))
    }

    fn read_complex_scalar(&mut self) -> Result<Event, Error> {
        let header = self.src.take_u8()?;
        if header >> 5 != MAJOR_ARRAY {
            return Err(self.err(ErrorKind::SyntaxError));
        }
        if self.read_uint_arg(header & 0x1f)? != 2 {
            return Err(self.err(ErrorKind::SyntaxError));
        }
        let re = self.read_number_as_f64()?;
        let im = self.read_number_as_f64()?;
        Ok(Event::Complex { re, im })
    }

    fn read_number_as_f64(&mut self) -> Result<f64, Error> {
        match self.read_value()? {
            Event::F32(f) => Ok(f as f64),
            Event::F64(f) => Ok(f),
            Event::I64(n) => Ok(n as f64),
            Event::U64(n) => Ok(n as f64),
            _ => Err(self.err(ErrorKind::GetWrongType)),
        }
    }

    fn read_tagged(&mut self, tag: u64) -> Result<Event, Error> {
        match tag {
            TAG_COMPLEX_SCALAR => self.read_complex_scalar(),
            // RFC 8746 typed arrays and every other tag just wrap an
            // ordinary value; this library never decodes the tagged
            // shapes generically, so the tag itself is transparent.
            _ => {
                trace!("passing through unrecognized tag {tag}");
                self.read_value()
            }
        }
    }

    fn read_map_key(&mut self) -> Result<Event, Error> {
        match self.read_value()? {
            Event::Str(s) => Ok(Event::MapKey(s)),
            Event::I64(n) => Ok(Event::MapKeyInt(n)),
            Event::U64(n) => Ok(Event::MapKeyInt(n as i64)),
            _ => Err(self.err(ErrorKind::InvalidPartialKey)),
        }
    }

    fn read_value(&mut self) -> Result<Event, Error> {
        let byte = self.src.take_u8()?;
        let major = byte >> 5;
        let info = byte & 0x1f;
        match major {
            MAJOR_UINT => Ok(Event::U64(self.read_uint_arg(info)?)),
            MAJOR_NEGINT => {
                let n = self.read_uint_arg(info)?;
                Ok(Event::I64(!n as i64))
            }
            MAJOR_BYTES => {
                if info == ARG_INDEFINITE {
                    Ok(Event::Bytes(self.read_indefinite_bytes()?))
                } else {
                    Ok(Event::Bytes(self.read_definite_bytes(info)?))
                }
            }
            MAJOR_TEXT => {
                if info == ARG_INDEFINITE {
                    Ok(Event::Str(self.read_indefinite_text()?))
                } else {
                    let bytes = self.read_definite_bytes(info)?;
                    String::from_utf8(bytes)
                        .map(Event::Str)
                        .map_err(|_| self.err(ErrorKind::ParseError))
                }
            }
            MAJOR_ARRAY => {
                let remaining = if info == ARG_INDEFINITE {
                    -1
                } else {
                    self.read_uint_arg(info)? as i64
                };
                self.stack.push(Frame::Array { remaining });
                Ok(Event::SeqStart)
            }
            MAJOR_MAP => {
                let remaining = if info == ARG_INDEFINITE {
                    -1
                } else {
                    self.read_uint_arg(info)? as i64
                };
                self.stack.push(Frame::Map {
                    remaining,
                    awaiting_value: false,
                });
                Ok(Event::MapStart)
            }
            MAJOR_TAG => {
                let tag = self.read_uint_arg(info)?;
                self.read_tagged(tag)
            }
            MAJOR_SIMPLE => match info {
                SIMPLE_FALSE => Ok(Event::Bool(false)),
                SIMPLE_TRUE => Ok(Event::Bool(true)),
                SIMPLE_NULL | SIMPLE_UNDEFINED => Ok(Event::Null),
                ARG_1BYTE => {
                    self.src.take_u8()?;
                    Ok(Event::Null)
                }
                ARG_2BYTE => {
                    let bits = u16::from_be_bytes(self.read_be()?);
                    Ok(Event::F32(F16(bits).to_f32()))
                }
                ARG_4BYTE => Ok(Event::F32(f32::from_be_bytes(self.read_be()?))),
                ARG_8BYTE => Ok(Event::F64(f64::from_be_bytes(self.read_be()?))),
                _ => Err(self.err(ErrorKind::SyntaxError)),
            },
            _ => Err(self.err(ErrorKind::SyntaxError)),
        }
    }
}

impl<'a> EventSource for CborSource<'a> {
    fn next_event(&mut self) -> Result<Event, Error> {
        match self.stack.last().copied() {
            Some(Frame::Array { remaining: -1 }) => {
                if self.peek_is_break()? {
                    self.src.take_u8()?;
                    self.stack.pop();
                    return Ok(Event::SeqEnd);
                }
                self.read_value()
            }
            Some(Frame::Array { remaining: 0 }) => {
                self.stack.pop();
                Ok(Event::SeqEnd)
            }
            Some(Frame::Array { .. }) => {
                if let Some(Frame::Array { remaining }) = self.stack.last_mut() {
                    *remaining -= 1;
                }
                self.read_value()
            }
            Some(Frame::Map {
                remaining: -1,
                awaiting_value,
            }) => {
                if !awaiting_value {
                    if self.peek_is_break()? {
                        self.src.take_u8()?;
                        self.stack.pop();
                        return Ok(Event::MapEnd);
                    }
                    if let Some(Frame::Map { awaiting_value, .. }) = self.stack.last_mut() {
                        *awaiting_value = true;
                    }
                    self.read_map_key()
                } else {
                    if let Some(Frame::Map { awaiting_value, .. }) = self.stack.last_mut() {
                        *awaiting_value = false;
                    }
                    self.read_value()
                }
            }
            Some(Frame::Map {
                remaining: 0,
                awaiting_value: false,
            }) => {
                self.stack.pop();
                Ok(Event::MapEnd)
            }
            Some(Frame::Map { awaiting_value, .. }) => {
                if !awaiting_value {
                    if let Some(Frame::Map { awaiting_value, .. }) = self.stack.last_mut() {
                        *awaiting_value = true;
                    }
                    self.read_map_key()
                } else {
                    if let Some(Frame::Map {
                        remaining,
                        awaiting_value,
                    }) = self.stack.last_mut()
                    {
                        *remaining -= 1;
                        *awaiting_value = false;
                    }
                    self.read_value()
                }
            }
            None => self.read_value(),
        }
    }

    fn position(&self) -> usize {
        self.src.position()
    }
}
