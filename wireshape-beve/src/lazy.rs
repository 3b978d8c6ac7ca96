//! Lazy, allocation-light access into an already-encoded BEVE buffer.
//!
//! A [`View`] never materializes more than the child it's asked for: a
//! record with twenty fields costs nothing to hold onto, and costs one
//! structural skip per field actually read. The read side reuses
//! [`BeveSource`]'s own tag-dispatch and `skip_value` so the navigator's
//! skip engine never drifts out of step with the real decoder.

use std::collections::HashMap;
use std::sync::OnceLock;

use wireshape_core::{Context, Decode, Error, ErrorKind, Event, EventSource, ReadOptions};

use crate::BeveSource;

/// A byte slice wrapping one complete BEVE document.
pub struct Document<'a> {
    bytes: &'a [u8],
}

impl<'a> Document<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Document { bytes }
    }

    /// A view over the top-level value. Errors if the buffer is empty or
    /// its first tag byte doesn't describe a value this crate can skip.
    pub fn root(&self) -> Result<View<'a>, Error> {
        if self.bytes.is_empty() {
            return Err(Error::new(ErrorKind::NoReadInput));
        }
        let end = value_end(self.bytes, 0)?;
        Ok(View::new(self.bytes, 0, end))
    }
}

fn value_end(bytes: &[u8], pos: usize) -> Result<usize, Error> {
    let mut src = BeveSource::new(bytes);
    src.seek(pos);
    EventSource::skip_value(&mut src)?;
    Ok(src.position())
}

/// Advances `src` past whatever remains of the value whose opening token
/// was already consumed as `opened` (a scalar needs nothing further; a
/// container needs its matching close event).
fn finish_after_open(src: &mut BeveSource<'_>, opened: &Event) -> Result<(), Error> {
    if !matches!(opened, Event::SeqStart | Event::MapStart) {
        return Ok(());
    }
    let mut depth = 1i32;
    while depth > 0 {
        match src.next_event()? {
            Event::SeqStart | Event::MapStart => depth += 1,
            Event::SeqEnd | Event::MapEnd => depth -= 1,
            _ => {}
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum ScanState {
    Fresh,
    Scanning { pos: usize, next_index: usize },
    Exhausted,
}

/// A lazy view over one BEVE value's byte span. Subscripting into an
/// object or array keeps a cursor (see [`ScanState`]) so repeated,
/// forward-moving access doesn't re-walk children already passed;
/// `reset_parse_pos` rewinds that cursor.
pub struct View<'a> {
    bytes: &'a [u8],
    begin: usize,
    end: usize,
    state: ScanState,
}

impl<'a> View<'a> {
    fn new(bytes: &'a [u8], begin: usize, end: usize) -> Self {
        View {
            bytes,
            begin,
            end,
            state: ScanState::Fresh,
        }
    }

    /// Returns the offset just past this value's opening token, and
    /// whether it opened an object (`true`) or an array (`false`).
    fn children_begin(&self) -> Result<(usize, bool), Error> {
        let mut src = BeveSource::new(self.bytes);
        src.seek(self.begin);
        match src.next_event()? {
            Event::MapStart => Ok((src.position(), true)),
            Event::SeqStart => Ok((src.position(), false)),
            _ => Err(Error::at(ErrorKind::GetWrongType, self.begin)),
        }
    }

    /// Returns this view to the `Fresh` state, so the next subscript
    /// starts scanning from the first child again.
    pub fn reset_parse_pos(&mut self) {
        self.state = ScanState::Fresh;
    }

    /// Array-style access: step through children, by position, starting
    /// from wherever the cursor last stopped. If the end is reached
    /// without finding index `i`, wrap once to the start and search the
    /// part of the array already passed.
    pub fn get_index(&mut self, i: usize) -> Result<View<'a>, Error> {
        self.seek_child(None, Some(i))
    }

    /// Object-style access, with the same wrap-once behavior as
    /// [`View::get_index`] but matching on key instead of position.
    pub fn get_key(&mut self, key: &str) -> Result<View<'a>, Error> {
        self.seek_child(Some(key), None)
    }

    fn seek_child(&mut self, key: Option<&str>, index: Option<usize>) -> Result<View<'a>, Error> {
        let (children_begin, is_object) = self.children_begin()?;
        let (start_pos, start_idx) = match self.state {
            ScanState::Fresh | ScanState::Exhausted => (children_begin, 0),
            ScanState::Scanning { pos, next_index } => (pos, next_index),
        };

        if let Some(found) =
            self.scan_range(start_pos, start_idx, self.end, is_object, key, index)?
        {
            return Ok(found);
        }
        if start_pos != children_begin {
            if let Some(found) =
                self.scan_range(children_begin, 0, start_pos, is_object, key, index)?
            {
                return Ok(found);
            }
        }
        self.state = ScanState::Exhausted;
        Err(Error::at(ErrorKind::KeyNotFound, self.begin))
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_range(
        &mut self,
        from: usize,
        from_index: usize,
        to: usize,
        is_object: bool,
        key: Option<&str>,
        index: Option<usize>,
    ) -> Result<Option<View<'a>>, Error> {
        let mut src = BeveSource::new(self.bytes);
        src.seek(from);
        let mut idx = from_index;
        while src.position() < to {
            if is_object {
                let found_key = match src.next_event()? {
                    Event::MapKey(k) => k,
                    Event::MapKeyInt(k) => k.to_string(),
                    Event::MapEnd => break,
                    _ => return Err(Error::at(ErrorKind::SyntaxError, src.position())),
                };
                let child_begin = src.position();
                src.skip_value()?;
                let child_end = src.position();
                if key == Some(found_key.as_str()) {
                    self.state = ScanState::Scanning {
                        pos: child_end,
                        next_index: 0,
                    };
                    return Ok(Some(View::new(self.bytes, child_begin, child_end)));
                }
            } else {
                let child_begin = src.position();
                let opened = src.next_event()?;
                if opened == Event::SeqEnd {
                    break;
                }
                finish_after_open(&mut src, &opened)?;
                let child_end = src.position();
                if index == Some(idx) {
                    self.state = ScanState::Scanning {
                        pos: child_end,
                        next_index: idx + 1,
                    };
                    return Ok(Some(View::new(self.bytes, child_begin, child_end)));
                }
                idx += 1;
            }
        }
        Ok(None)
    }

    /// Decodes this view's span as a concrete type.
    pub fn get<T: Decode>(&self, opts: &ReadOptions) -> Result<T, Error> {
        let mut src = BeveSource::new(self.bytes);
        src.seek(self.begin);
        let mut ctx = Context::new(opts.max_depth);
        T::decode(&mut src, opts, &mut ctx)
    }

    /// As [`View::get`], writing the result into an existing value.
    pub fn read_into<T: Decode>(&self, opts: &ReadOptions, out: &mut T) -> Result<(), Error> {
        *out = self.get(opts)?;
        Ok(())
    }

    /// The exact sub-slice `[begin, end)` covering this value on the
    /// wire, tag byte included.
    pub fn raw_beve(&self) -> &'a [u8] {
        &self.bytes[self.begin..self.end]
    }

    /// Walks every child once, building a random-access index. Prefer
    /// this over repeated `get_key`/`get_index` calls when most of an
    /// object's or array's children will eventually be visited.
    pub fn index(&self) -> Result<IndexedView<'a>, Error> {
        let mut src = BeveSource::new(self.bytes);
        src.seek(self.begin);
        let opening = src.next_event()?;
        let mut entries = Vec::new();
        match opening {
            Event::MapStart => loop {
                match src.next_event()? {
                    Event::MapEnd => break,
                    Event::MapKey(k) => {
                        let child_begin = src.position();
                        src.skip_value()?;
                        entries.push(IndexedEntry {
                            key: Some(k),
                            view: View::new(self.bytes, child_begin, src.position()),
                        });
                    }
                    Event::MapKeyInt(k) => {
                        let child_begin = src.position();
                        src.skip_value()?;
                        entries.push(IndexedEntry {
                            key: Some(k.to_string()),
                            view: View::new(self.bytes, child_begin, src.position()),
                        });
                    }
                    _ => return Err(Error::at(ErrorKind::SyntaxError, src.position())),
                }
            },
            Event::SeqStart => loop {
                let child_begin = src.position();
                let opened = src.next_event()?;
                if opened == Event::SeqEnd {
                    break;
                }
                finish_after_open(&mut src, &opened)?;
                entries.push(IndexedEntry {
                    key: None,
                    view: View::new(self.bytes, child_begin, src.position()),
                });
            },
            _ => return Err(Error::at(ErrorKind::GetWrongType, self.begin)),
        }
        Ok(IndexedView { entries, by_key: OnceLock::new() })
    }
}

/// One child materialized by [`View::index`]: its key (`None` for array
/// elements) and a view over its value span.
pub struct IndexedEntry<'a> {
    pub key: Option<String>,
    pub view: View<'a>,
}

/// The result of [`View::index`]: every child of an object or array,
/// walked once, addressable by position or key without re-scanning.
pub struct IndexedView<'a> {
    entries: Vec<IndexedEntry<'a>>,
    /// `key -> entries` index, built lazily on first `at_key`/`contains`
    /// call and reused after that; array indexing never needs it.
    by_key: OnceLock<HashMap<String, usize>>,
}

impl<'a> IndexedView<'a> {
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn at_index(&self, i: usize) -> Option<&View<'a>> {
        self.entries.get(i).map(|e| &e.view)
    }

    fn by_key(&self) -> &HashMap<String, usize> {
        self.by_key.get_or_init(|| {
            // First declaration wins on a duplicate key, matching a
            // left-to-right linear scan's own tie-break.
            let mut map = HashMap::with_capacity(self.entries.len());
            for (i, entry) in self.entries.iter().enumerate() {
                if let Some(key) = &entry.key {
                    map.entry(key.clone()).or_insert(i);
                }
            }
            map
        })
    }

    pub fn at_key(&self, key: &str) -> Option<&View<'a>> {
        self.by_key().get(key).map(|&i| &self.entries[i].view)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key().contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedEntry<'a>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireshape_core::WriteOptions;

    #[test]
    fn root_over_a_scalar_covers_exactly_its_bytes() {
        let bytes = crate::to_vec(&42i32, &WriteOptions::default()).unwrap();
        let doc = Document::new(&bytes);
        let view = doc.root().unwrap();
        assert_eq!(view.raw_beve(), &bytes[..]);
        let decoded: i32 = view.get(&ReadOptions::default()).unwrap();
        assert_eq!(decoded, 42);
    }

    #[test]
    fn array_index_access_finds_each_element() {
        let v = vec![10i32, 20, 30];
        let bytes = crate::to_vec(&v, &WriteOptions::default()).unwrap();
        let doc = Document::new(&bytes);
        let mut root = doc.root().unwrap();
        for (i, expect) in v.iter().enumerate() {
            let child = root.get_index(i).unwrap();
            let got: i32 = child.get(&ReadOptions::default()).unwrap();
            assert_eq!(got, *expect);
        }
    }

    #[test]
    fn array_wrap_once_finds_an_earlier_element_after_the_cursor_moves_on() {
        let v = vec![1i32, 2, 3, 4];
        let bytes = crate::to_vec(&v, &WriteOptions::default()).unwrap();
        let doc = Document::new(&bytes);
        let mut root = doc.root().unwrap();
        let third: i32 = root.get_index(2).unwrap().get(&ReadOptions::default()).unwrap();
        assert_eq!(third, 3);
        // The cursor now sits after index 2; asking for index 0 must
        // wrap around instead of reporting it missing.
        let first: i32 = root.get_index(0).unwrap().get(&ReadOptions::default()).unwrap();
        assert_eq!(first, 1);
    }

    #[test]
    fn missing_key_after_wrap_is_key_not_found() {
        use wireshape_core::{Encode, FieldInfo, Peek, RecordPeek, Shape};

        struct Pair {
            a: i32,
            b: i32,
        }
        static FIELDS: &[FieldInfo] = &[FieldInfo::new("a"), FieldInfo::new("b")];
        static SHAPE: Shape = Shape::new("Pair", FIELDS);
        impl RecordPeek for Pair {
            fn shape(&self) -> &'static Shape {
                &SHAPE
            }
            fn field_peek(&self, index: usize) -> Peek<'_> {
                match index {
                    0 => self.a.peek(),
                    1 => self.b.peek(),
                    _ => unreachable!(),
                }
            }
        }
        impl Encode for Pair {
            fn peek(&self) -> Peek<'_> {
                Peek::Record(self)
            }
        }

        let bytes = crate::to_vec(&Pair { a: 1, b: 2 }, &WriteOptions::default()).unwrap();
        let doc = Document::new(&bytes);
        let mut root = doc.root().unwrap();
        let _ = root.get_key("b").unwrap();
        assert!(root.get_key("missing").is_err());
    }

    #[test]
    fn indexed_view_answers_contains_and_lookup() {
        use wireshape_core::{Encode, FieldInfo, Peek, RecordPeek, Shape};

        struct Pair {
            a: i32,
            b: i32,
        }
        static FIELDS: &[FieldInfo] = &[FieldInfo::new("a"), FieldInfo::new("b")];
        static SHAPE: Shape = Shape::new("Pair", FIELDS);
        impl RecordPeek for Pair {
            fn shape(&self) -> &'static Shape {
                &SHAPE
            }
            fn field_peek(&self, index: usize) -> Peek<'_> {
                match index {
                    0 => self.a.peek(),
                    1 => self.b.peek(),
                    _ => unreachable!(),
                }
            }
        }
        impl Encode for Pair {
            fn peek(&self) -> Peek<'_> {
                Peek::Record(self)
            }
        }

        let bytes = crate::to_vec(&Pair { a: 5, b: 6 }, &WriteOptions::default()).unwrap();
        let doc = Document::new(&bytes);
        let root = doc.root().unwrap();
        let indexed = root.index().unwrap();
        assert_eq!(indexed.size(), 2);
        assert!(indexed.contains("a"));
        let b_view = indexed.at_key("b").unwrap();
        let b: i32 = b_view.get(&ReadOptions::default()).unwrap();
        assert_eq!(b, 6);
        assert!(indexed.at_key("missing").is_none());
        assert!(!indexed.contains("missing"));
        // A second lookup must see the same answer the lazily-built key
        // map gave the first time.
        assert_eq!(indexed.at_key("a").unwrap().get::<i32>(&ReadOptions::default()).unwrap(), 5);
    }
}
