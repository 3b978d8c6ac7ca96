//! Format-agnostic pull events for the read path.
//!
//! Every format crate implements `EventSource` over its own token stream;
//! every `Decode` impl (scalars here, records/enums from the derive macro)
//! is generic over `EventSource`, so one `Decode` impl works against all
//! four wire formats without knowing which one it's reading — the read-path
//! analogue of `Encode`/`Peek` on the write path.

use log::trace;

use crate::error::{Context, Error, ErrorKind};
use crate::options::ReadOptions;
use crate::shape::Shape;

/// One token out of a format-specific parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    SeqStart,
    SeqEnd,
    MapStart,
    MapEnd,
    /// Only ever returned while inside a `MapStart..MapEnd` span, in place
    /// of the next entry's key, for a string-keyed mapping.
    MapKey(String),
    /// As `MapKey`, for an integer-keyed mapping.
    MapKeyInt(i64),
    Timestamp { secs: i64, nanos: u32 },
    Complex { re: f64, im: f64 },
}

/// A format-specific pull parser.
pub trait EventSource {
    fn next_event(&mut self) -> Result<Event, Error>;

    /// Skip exactly one value (scalar, or a whole container), without
    /// materializing it. The default walks the event stream counting
    /// container depth; a format with a cheaper structural skip (working
    /// directly on its own bytes, without producing `Event`s for children
    /// it's about to discard) may override this.
    fn skip_value(&mut self) -> Result<(), Error> {
        match self.next_event()? {
            Event::SeqStart | Event::MapStart => {
                let mut depth = 1i32;
                while depth > 0 {
                    match self.next_event()? {
                        Event::SeqStart | Event::MapStart => depth += 1,
                        Event::SeqEnd | Event::MapEnd => depth -= 1,
                        _ => {}
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn position(&self) -> usize;

    fn error_here(&self, kind: ErrorKind) -> Error {
        Error::at(kind, self.position())
    }
}

/// Implemented by every type this library can read: scalars and
/// containers here, records/enums via the derive macro.
pub trait Decode: Sized {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error>;
}

fn wrong_type<S: EventSource>(src: &S) -> Error {
    src.error_here(ErrorKind::GetWrongType)
}

macro_rules! decode_signed {
    ($t:ty) => {
        impl Decode for $t {
            fn decode<S: EventSource>(
                src: &mut S,
                _opts: &ReadOptions,
                _ctx: &mut Context,
            ) -> Result<Self, Error> {
                match src.next_event()? {
                    Event::I64(v) => <$t>::try_from(v)
                        .map_err(|_| src.error_here(ErrorKind::ParseError)),
                    Event::U64(v) => <$t>::try_from(v)
                        .map_err(|_| src.error_here(ErrorKind::ParseError)),
                    _ => Err(wrong_type(src)),
                }
            }
        }
    };
}

macro_rules! decode_unsigned {
    ($t:ty) => {
        impl Decode for $t {
            fn decode<S: EventSource>(
                src: &mut S,
                _opts: &ReadOptions,
                _ctx: &mut Context,
            ) -> Result<Self, Error> {
                match src.next_event()? {
                    Event::U64(v) => <$t>::try_from(v)
                        .map_err(|_| src.error_here(ErrorKind::ParseError)),
                    Event::I64(v) if v >= 0 => <$t>::try_from(v as u64)
                        .map_err(|_| src.error_here(ErrorKind::ParseError)),
                    _ => Err(wrong_type(src)),
                }
            }
        }
    };
}

decode_signed!(i8);
decode_signed!(i16);
decode_signed!(i32);
decode_signed!(i64);
decode_unsigned!(u8);
decode_unsigned!(u16);
decode_unsigned!(u32);
decode_unsigned!(u64);

impl Decode for bool {
    fn decode<S: EventSource>(
        src: &mut S,
        _opts: &ReadOptions,
        _ctx: &mut Context,
    ) -> Result<Self, Error> {
        match src.next_event()? {
            Event::Bool(b) => Ok(b),
            _ => Err(wrong_type(src)),
        }
    }
}

impl Decode for f32 {
    fn decode<S: EventSource>(
        src: &mut S,
        _opts: &ReadOptions,
        _ctx: &mut Context,
    ) -> Result<Self, Error> {
        match src.next_event()? {
            Event::F32(v) => Ok(v),
            Event::F64(v) => Ok(v as f32),
            Event::I64(v) => Ok(v as f32),
            Event::U64(v) => Ok(v as f32),
            _ => Err(wrong_type(src)),
        }
    }
}

impl Decode for f64 {
    fn decode<S: EventSource>(
        src: &mut S,
        _opts: &ReadOptions,
        _ctx: &mut Context,
    ) -> Result<Self, Error> {
        match src.next_event()? {
            Event::F64(v) => Ok(v),
            Event::F32(v) => Ok(v as f64),
            Event::I64(v) => Ok(v as f64),
            Event::U64(v) => Ok(v as f64),
            _ => Err(wrong_type(src)),
        }
    }
}

impl Decode for String {
    fn decode<S: EventSource>(
        src: &mut S,
        _opts: &ReadOptions,
        _ctx: &mut Context,
    ) -> Result<Self, Error> {
        match src.next_event()? {
            Event::Str(s) => Ok(s),
            _ => Err(wrong_type(src)),
        }
    }
}

impl Decode for crate::types::Timestamp {
    fn decode<S: EventSource>(
        src: &mut S,
        _opts: &ReadOptions,
        _ctx: &mut Context,
    ) -> Result<Self, Error> {
        match src.next_event()? {
            Event::Timestamp { secs, nanos } => Ok(crate::types::Timestamp { secs, nanos }),
            _ => Err(wrong_type(src)),
        }
    }
}

impl Decode for crate::types::Complex {
    fn decode<S: EventSource>(
        src: &mut S,
        _opts: &ReadOptions,
        _ctx: &mut Context,
    ) -> Result<Self, Error> {
        match src.next_event()? {
            Event::Complex { re, im } => Ok(crate::types::Complex { re, im }),
            _ => Err(wrong_type(src)),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error> {
        // We can't "peek" a generic EventSource cheaply, so every format's
        // `next_event` must be prepared to emit `Event::Null` for an
        // absent optional; decoding into `Some` happens by delegating the
        // event right back to `T` via a one-event replay buffer.
        let first = src.next_event()?;
        if first == Event::Null {
            return Ok(None);
        }
        let mut replay = Replay::new(first);
        T::decode(&mut ReplaySource { replay: &mut replay, inner: &mut *src }, opts, ctx).map(Some)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode<S: EventSource>(
        src: &mut S,
        opts: &ReadOptions,
        ctx: &mut Context,
    ) -> Result<Self, Error> {
        ctx.check_depth()?;
        let result: Result<Self, Error> = (|| {
            match src.next_event()? {
                Event::SeqStart => {
                    let mut out = Vec::new();
                    loop {
                        let first = src.next_event()?;
                        if first == Event::SeqEnd {
                            break;
                        }
                        let mut replay = Replay::new(first);
                        out.push(T::decode(
                            &mut ReplaySource { replay: &mut replay, inner: &mut *src },
                            opts,
                            ctx,
                        )?);
                    }
                    Ok(out)
                }
                _ => Err(wrong_type(src)),
            }
        })();
        ctx.leave();
        result
    }
}

/// A single buffered event, so a consumer that peeked one token to make a
/// decision (is this `null`, is this the end of a sequence?) can still hand
/// the token to a nested `Decode` impl as if it had never been taken out.
struct Replay {
    event: Option<Event>,
}

impl Replay {
    fn new(event: Event) -> Self {
        Self { event: Some(event) }
    }
}

struct ReplaySource<'a, S> {
    replay: &'a mut Replay,
    inner: &'a mut S,
}

impl<S: EventSource> EventSource for ReplaySource<'_, S> {
    fn next_event(&mut self) -> Result<Event, Error> {
        if let Some(ev) = self.replay.event.take() {
            return Ok(ev);
        }
        self.inner.next_event()
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        if self.replay.event.take().is_some() {
            // The replayed token was a scalar or the opening token of a
            // container; for containers we still need the inner source to
            // skip the rest of the shape, which it cannot do without
            // having seen the opener. Decode is only ever called right
            // after peeking a *scalar or opener* token here, so re-route
            // through a minimal manual skip using further `next_event`
            // calls on `self`.
            return skip_after_open(self);
        }
        self.inner.skip_value()
    }

    fn position(&self) -> usize {
        self.inner.position()
    }
}

/// Either the record's own source directly (map-keyed fields) or a
/// one-event replay wrapper around it (positional/array fields, where the
/// opening token of the field's value was already consumed to check for
/// `SeqEnd`). Lets `decode_record`'s `set_field` callback stay generic over
/// a single source type for both branches.
enum RecordSource<'a, S> {
    Direct(&'a mut S),
    Replay(ReplaySource<'a, S>),
}

impl<S: EventSource> EventSource for RecordSource<'_, S> {
    fn next_event(&mut self) -> Result<Event, Error> {
        match self {
            RecordSource::Direct(s) => s.next_event(),
            RecordSource::Replay(r) => r.next_event(),
        }
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        match self {
            RecordSource::Direct(s) => s.skip_value(),
            RecordSource::Replay(r) => r.skip_value(),
        }
    }

    fn position(&self) -> usize {
        match self {
            RecordSource::Direct(s) => s.position(),
            RecordSource::Replay(r) => r.position(),
        }
    }
}

/// Manual structural skip, used only when the opening token of the value
/// to skip has already been consumed into a `Replay` buffer.
fn skip_after_open<S: EventSource>(src: &mut S) -> Result<(), Error> {
    let mut depth: i32 = 0;
    loop {
        let ev = src.next_event()?;
        match ev {
            Event::SeqStart | Event::MapStart => depth += 1,
            Event::SeqEnd | Event::MapEnd => {
                depth -= 1;
                if depth <= 0 {
                    return Ok(());
                }
            }
            _ if depth == 0 => return Ok(()),
            _ => {}
        }
    }
}

/// Pull one complete value (a scalar, or a whole container down to its
/// matching close token) off `src` into an owned token list, so it can be
/// inspected and replayed later without re-reading the original source.
///
/// Used by `#[derive(Reflect)]`'s enum decoding when the variant can't be
/// told apart from the next single token alone: internal tagging needs to
/// see the whole object before it can strip the tag entry, and untagged
/// (structural) discrimination needs to see every key before it can choose
/// a variant.
pub fn capture_value<S: EventSource>(src: &mut S) -> Result<Vec<Event>, Error> {
    let mut out = Vec::new();
    let first = src.next_event()?;
    capture_one(first, src, &mut out)?;
    Ok(out)
}

fn capture_one<S: EventSource>(first: Event, src: &mut S, out: &mut Vec<Event>) -> Result<(), Error> {
    match first {
        Event::SeqStart => {
            out.push(Event::SeqStart);
            loop {
                let ev = src.next_event()?;
                if ev == Event::SeqEnd {
                    out.push(Event::SeqEnd);
                    return Ok(());
                }
                capture_one(ev, src, out)?;
            }
        }
        Event::MapStart => {
            out.push(Event::MapStart);
            loop {
                let ev = src.next_event()?;
                if ev == Event::MapEnd {
                    out.push(Event::MapEnd);
                    return Ok(());
                }
                // `ev` here is the key token (`MapKey`/`MapKeyInt`); push it
                // then capture the value that follows it.
                out.push(ev);
                let value_first = src.next_event()?;
                capture_one(value_first, src, out)?;
            }
        }
        other => {
            out.push(other);
            Ok(())
        }
    }
}

/// A read-only `EventSource` replaying a token list previously produced by
/// [`capture_value`]. `skip_value` uses the default structural-walk
/// implementation, which is correct here since every captured container is
/// already balanced.
pub struct BufferedSource {
    events: Vec<Event>,
    pos: usize,
}

impl BufferedSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, pos: 0 }
    }
}

impl EventSource for BufferedSource {
    fn next_event(&mut self) -> Result<Event, Error> {
        let ev = self
            .events
            .get(self.pos)
            .cloned()
            .ok_or_else(|| Error::at(ErrorKind::UnexpectedEnd, self.pos))?;
        self.pos += 1;
        Ok(ev)
    }

    fn position(&self) -> usize {
        self.pos
    }
}

/// Index of the first event past the complete value starting at
/// `events[start]` (a scalar is one event; a container runs to its
/// matching close token).
fn value_span_end(events: &[Event], start: usize) -> usize {
    let mut depth = 0i32;
    let mut i = start;
    loop {
        match &events[i] {
            Event::SeqStart | Event::MapStart => depth += 1,
            Event::SeqEnd | Event::MapEnd => depth -= 1,
            _ => {}
        }
        i += 1;
        if depth == 0 {
            return i;
        }
    }
}

/// For a captured object (`events[0] == Event::MapStart`), split out the
/// string-valued entry keyed `tag_key` from the rest, returning the tag's
/// value and a new `MapStart..MapEnd` token list with that entry removed.
/// Returns `None` if `events` isn't a map, the tag key is absent, or its
/// value isn't a string.
///
/// Used by `#[derive(Reflect)]`'s `#[wireshape(tag = "...")]` internally
/// tagged enum decoding: the tag names the variant, and the remaining
/// entries are the variant payload's own fields.
pub fn extract_tagged_entry(events: &[Event], tag_key: &str) -> Option<(String, Vec<Event>)> {
    if events.first() != Some(&Event::MapStart) {
        return None;
    }
    let mut rest = Vec::with_capacity(events.len());
    rest.push(Event::MapStart);
    let mut tag_value = None;
    let mut i = 1;
    while i < events.len() {
        match &events[i] {
            Event::MapEnd => {
                rest.push(Event::MapEnd);
                i += 1;
                break;
            }
            Event::MapKey(key) => {
                let value_start = i + 1;
                let value_end = value_span_end(events, value_start);
                if key == tag_key {
                    match events.get(value_start) {
                        Some(Event::Str(s)) => tag_value = Some(s.clone()),
                        _ => return None,
                    }
                } else {
                    rest.push(events[i].clone());
                    rest.extend_from_slice(&events[value_start..value_end]);
                }
                i = value_end;
            }
            _ => return None,
        }
    }
    Some((tag_value?, rest))
}

/// The string keys directly inside the top-level map of a captured value
/// (`events[0] == Event::MapStart`), ignoring any nested maps' keys.
fn top_level_keys(events: &[Event]) -> Vec<&str> {
    let mut depth = 0i32;
    let mut keys = Vec::new();
    for ev in events {
        match ev {
            Event::SeqStart | Event::MapStart => depth += 1,
            Event::SeqEnd | Event::MapEnd => depth -= 1,
            Event::MapKey(k) if depth == 1 => keys.push(k.as_str()),
            _ => {}
        }
    }
    keys
}

/// Pick the first `shapes[i]` whose field-name set exactly matches the
/// captured object's top-level key set (a unit variant's absent shape
/// matches only an empty object). Used by `#[derive(Reflect)]`'s
/// `#[wireshape(untagged)]` enum decoding — see spec Scenario G.
pub fn match_variant_by_shapes(events: &[Event], shapes: &[Option<&'static Shape>]) -> Option<usize> {
    let keys = top_level_keys(events);
    'variants: for (i, shape) in shapes.iter().enumerate() {
        let names: &[crate::shape::FieldInfo] = shape.map(|s| s.fields).unwrap_or(&[]);
        if names.len() != keys.len() {
            continue;
        }
        for field in names {
            if !keys.contains(&field.name) {
                continue 'variants;
            }
        }
        return Some(i);
    }
    None
}

/// Generic helper used by `#[derive(Reflect)]`-generated `Decode` impls to
/// read a record: either a string-keyed map (the default wire shape) or,
/// when the source was written with `structs_as_arrays`, a positional
/// sequence. `set_field` is called once per present field with its
/// resolved index.
pub fn decode_record<T, S, F>(
    src: &mut S,
    opts: &ReadOptions,
    ctx: &mut Context,
    shape: &'static Shape,
    mut set_field: F,
) -> Result<T, Error>
where
    T: Default,
    S: EventSource,
    F: FnMut(&mut T, usize, &mut RecordSource<'_, S>, &ReadOptions, &mut Context) -> Result<(), Error>,
{
    ctx.check_depth()?;
    let result: Result<T, Error> = (|| {
        trace!("decoding record {}", shape.type_name);
        let mut out = T::default();
        let mut seen = vec![false; shape.fields.len()];
        match src.next_event()? {
            Event::MapStart => {
                loop {
                    match src.next_event()? {
                        Event::MapEnd => break,
                        Event::MapKey(key) => match shape.find_field(&key) {
                            Some(idx) => {
                                set_field(&mut out, idx, &mut RecordSource::Direct(src), opts, ctx)?;
                                seen[idx] = true;
                            }
                            None => {
                                trace!("skipping unknown key {key:?} on {}", shape.type_name);
                                if opts.error_on_unknown_keys {
                                    return Err(src.error_here(ErrorKind::UnknownKey));
                                }
                                src.skip_value()?;
                            }
                        },
                        _ => return Err(src.error_here(ErrorKind::SyntaxError)),
                    }
                }
                if opts.error_on_missing_keys && seen.iter().any(|s| !s) {
                    return Err(src.error_here(ErrorKind::MissingKey));
                }
                Ok(out)
            }
            Event::SeqStart => {
                let mut idx = 0usize;
                loop {
                    let first = src.next_event()?;
                    if first == Event::SeqEnd {
                        break;
                    }
                    if idx < shape.fields.len() {
                        let mut replay = Replay::new(first);
                        set_field(
                            &mut out,
                            idx,
                            &mut RecordSource::Replay(ReplaySource {
                                replay: &mut replay,
                                inner: &mut *src,
                            }),
                            opts,
                            ctx,
                        )?;
                    } else {
                        let mut replay = Replay::new(first);
                        ReplaySource { replay: &mut replay, inner: &mut *src }.skip_value()?;
                    }
                    idx += 1;
                }
                Ok(out)
            }
            _ => Err(src.error_here(ErrorKind::SyntaxError)),
        }
    })();
    ctx.leave();
    result
}
