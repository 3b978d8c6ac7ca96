//! Compile-time reflection front end and the key-hash selector that maps
//! wire keys to field indices.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::macros::bitflags;

bitflags! {
    /// Per-field flags set by the derive macro from `#[wireshape(...)]`
    /// attributes.
    pub struct FieldFlags: u8 {
        const SKIP = 1 << 0;
        const HIDDEN = 1 << 1;
    }
}

/// One surfaced field of a record, as produced by `#[derive(Reflect)]`.
#[derive(Debug, Clone, Copy)]
pub struct FieldInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub flags: FieldFlags,
}

impl FieldInfo {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            flags: FieldFlags::empty(),
        }
    }
}

/// Static descriptor for a record type.
pub struct Shape {
    pub type_name: &'static str,
    pub fields: &'static [FieldInfo],
    key_index: OnceLock<KeyIndex>,
}

impl Shape {
    pub const fn new(type_name: &'static str, fields: &'static [FieldInfo]) -> Self {
        Self {
            type_name,
            fields,
            key_index: OnceLock::new(),
        }
    }

    /// Resolve `key` to a field index, trying every surfaced name and its
    /// aliases. Built and cached lazily on first lookup, as a
    /// runtime-computed near-perfect hash rather than a compile-time table.
    pub fn find_field(&self, key: &str) -> Option<usize> {
        self.key_index
            .get_or_init(|| KeyIndex::build(self.fields))
            .lookup(key, self.fields)
    }
}

/// Numeric element kind for `NumArray`/`Matrix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

/// One of the key-lookup strategies, chosen once per `Shape` and cached in
/// `Shape::key_index`.
enum KeyIndex {
    Empty,
    Single(&'static str),
    LengthDiscriminator {
        keys: Vec<(usize, &'static str)>,
    },
    UniqueByteIndex {
        index: usize,
        keys: Vec<(usize, &'static str)>,
    },
    FrontBytesHash {
        seed: u64,
        table: Box<[Vec<usize>]>,
        mask: usize,
        keys: Vec<(usize, &'static str)>,
    },
    FullHash {
        seed: u64,
        table: Box<[Vec<usize>]>,
        mask: usize,
        keys: Vec<(usize, &'static str)>,
    },
}

/// Every `(field_index, key_string)` pair a field surfaces — its own name
/// plus every alias — flattened so the selector only ever has to reason
/// about one flat key list.
fn flat_keys(fields: &'static [FieldInfo]) -> Vec<(usize, &'static str)> {
    let mut out = Vec::new();
    for (i, f) in fields.iter().enumerate() {
        out.push((i, f.name));
        for alias in f.aliases {
            out.push((i, alias));
        }
    }
    out
}

fn mix64(mut x: u64, seed: u64) -> u64 {
    x ^= seed;
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

fn front_bytes(key: &str) -> u64 {
    let bytes = key.as_bytes();
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

/// FNV-1a over the whole key, unlike `front_bytes` + `mix64` which only
/// sees the first 8 bytes. Used once front-bytes hashing can't find a seed
/// with small buckets, since two keys sharing an 8-byte prefix collide
/// under every seed `front_bytes` tries but may still separate once the
/// rest of the string is mixed in.
fn full_string_hash(key: &str, seed: u64) -> u64 {
    let mut h = 0xcbf2_9ce4_8422_2325u64 ^ seed;
    for &b in key.as_bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0001_0000_01b3);
    }
    h
}

impl KeyIndex {
    fn build(fields: &'static [FieldInfo]) -> Self {
        if fields.is_empty() {
            return KeyIndex::Empty;
        }
        let keys = flat_keys(fields);
        if keys.len() == 1 {
            return KeyIndex::Single(keys[0].1);
        }

        // Strategy: length discriminator. Only safe when every surfaced
        // key has a distinct byte length; lookup still compares the full
        // string, so a same-length key that isn't actually one of ours
        // correctly misses rather than aliasing onto whichever key shares
        // its length.
        {
            let mut lens = std::collections::HashSet::new();
            if keys.iter().all(|(_, k)| lens.insert(k.len())) {
                return KeyIndex::LengthDiscriminator { keys };
            }
        }

        // Strategy: unique byte index. Only safe to use when every key is
        // at least as long as `j` (checked again at lookup time too, since
        // a key *looked up* that's shorter than `j` simply can't match).
        let max_len = keys.iter().map(|(_, k)| k.len()).max().unwrap_or(0);
        for j in 0..max_len {
            let mut seen = std::collections::HashSet::new();
            let mut unique = true;
            for (_, k) in &keys {
                let b = k.as_bytes().get(j).copied();
                if !seen.insert(b) {
                    unique = false;
                    break;
                }
            }
            if unique {
                return KeyIndex::UniqueByteIndex { index: j, keys };
            }
        }

        // Strategy: front-bytes hash into a power-of-two table, linear
        // fallback within a bucket on collision.
        let cap = (keys.len() * 2).next_power_of_two().max(4);
        let mask = cap - 1;
        for seed in 0u64..64 {
            let mut table: Vec<Vec<usize>> = vec![Vec::new(); cap];
            for (i, (field_idx, k)) in keys.iter().enumerate() {
                let h = mix64(front_bytes(k), seed) as usize & mask;
                table[h].push(i);
                let _ = field_idx;
            }
            if table.iter().all(|b| b.len() <= 2) {
                return KeyIndex::FrontBytesHash {
                    seed,
                    table: table.into_boxed_slice(),
                    mask,
                    keys,
                };
            }
        }
        // Strategy: full-string hash. Front-bytes hashing couldn't find a
        // seed with small buckets (keys sharing an 8-byte prefix collide
        // under every seed it tries); hashing the whole string usually
        // separates them.
        for seed in 0u64..64 {
            let mut table: Vec<Vec<usize>> = vec![Vec::new(); cap];
            for (i, (_, k)) in keys.iter().enumerate() {
                let h = full_string_hash(k, seed) as usize & mask;
                table[h].push(i);
            }
            if table.iter().all(|b| b.len() <= 2) {
                return KeyIndex::FullHash {
                    seed,
                    table: table.into_boxed_slice(),
                    mask,
                    keys,
                };
            }
        }
        // Fall through: degenerate table (buckets may hold more than 2
        // keys) still works, just falls back to a linear compare within
        // the bucket; build it with seed 0 unconditionally.
        let mut table: Vec<Vec<usize>> = vec![Vec::new(); cap];
        for (i, (_, k)) in keys.iter().enumerate() {
            let h = full_string_hash(k, 0) as usize & mask;
            table[h].push(i);
        }
        KeyIndex::FullHash {
            seed: 0,
            table: table.into_boxed_slice(),
            mask,
            keys,
        }
    }

    fn lookup(&self, key: &str, _fields: &'static [FieldInfo]) -> Option<usize> {
        match self {
            KeyIndex::Empty => None,
            KeyIndex::Single(k) => (*k == key).then_some(0),
            KeyIndex::LengthDiscriminator { keys } => keys
                .iter()
                .find(|(_, k)| k.len() == key.len() && *k == key)
                .map(|(i, _)| *i),
            KeyIndex::UniqueByteIndex { index, keys } => {
                let b = key.as_bytes().get(*index).copied();
                keys.iter()
                    .find(|(_, k)| k.as_bytes().get(*index).copied() == b && *k == key)
                    .map(|(i, _)| *i)
            }
            KeyIndex::FrontBytesHash {
                seed,
                table,
                mask,
                keys,
            } => {
                let h = mix64(front_bytes(key), *seed) as usize & mask;
                table[h]
                    .iter()
                    .find(|&&i| keys[i].1 == key)
                    .map(|&i| keys[i].0)
            }
            KeyIndex::FullHash {
                seed,
                table,
                mask,
                keys,
            } => {
                let h = full_string_hash(key, *seed) as usize & mask;
                table[h]
                    .iter()
                    .find(|&&i| keys[i].1 == key)
                    .map(|&i| keys[i].0)
            }
        }
    }
}

/// Cache of (type name -> nothing) is unnecessary: `Shape` statics are
/// themselves `'static` and unique per type, so `OnceLock` lives directly
/// on the `Shape` value. Kept as a free function alongside the other
/// shape-introspection accessors.
pub fn field_count(shape: &'static Shape) -> usize {
    shape.fields.len()
}

pub struct ShapeMap {
    by_name: HashMap<&'static str, &'static Shape>,
}

impl ShapeMap {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    pub fn register(&mut self, shape: &'static Shape) {
        self.by_name.insert(shape.type_name, shape);
    }

    pub fn get(&self, name: &str) -> Option<&'static Shape> {
        self.by_name.get(name).copied()
    }
}

impl Default for ShapeMap {
    fn default() -> Self {
        Self::new()
    }
}
