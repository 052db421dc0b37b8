//! Order-preserving index key encoding.
//!
//! Index keys are sequences of [`KeyPart`]s compared part by part, with
//! `Min < Bool < Number < String < Max` across types and a shorter key
//! sorting before any key it is a prefix of. The byte encoding preserves
//! that order, so sled's lexicographic range scans walk keys in key order.
//!
//! Part format:
//! - `Min`: `[0x00]`, `Max`: `[0xFF]` (bounds only, never stored)
//! - `Bool`: `[0x10][0|1]`
//! - `Number`: `[0x20][f64, 8 bytes big-endian, sign-adjusted]`
//! - `String`: `[0x30][utf-8 with 0x00 escaped as 0x00 0xFF][0x00 0x01]`
//!
//! An index entry is `encoded_key ++ [ENTRY_SEPARATOR] ++ encoded_id`, so a
//! non-unique index keeps one entry per document. The separator sorts below
//! every type tag, which keeps all entries of one key ahead of entries whose
//! key extends it.

use std::ops::Bound;

const TAG_MIN: u8 = 0x00;
const TAG_BOOL: u8 = 0x10;
const TAG_NUMBER: u8 = 0x20;
const TAG_STRING: u8 = 0x30;
const TAG_MAX: u8 = 0xFF;

/// Separates the encoded index key from the primary key in an entry.
pub(crate) const ENTRY_SEPARATOR: u8 = 0x01;

/// Sorts above every entry of a key and below every extension of it.
const ENTRY_CEILING: u8 = 0x02;

/// One component of an index key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    /// Sorts before every other part.
    Min,
    Bool(bool),
    Number(f64),
    String(String),
    /// Sorts after every other part.
    Max,
}

impl KeyPart {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            KeyPart::Min => buf.push(TAG_MIN),
            KeyPart::Bool(b) => {
                buf.push(TAG_BOOL);
                buf.push(u8::from(*b));
            }
            KeyPart::Number(n) => {
                buf.push(TAG_NUMBER);
                let bits = n.to_bits();
                let sortable = if (bits & 0x8000_0000_0000_0000) != 0 {
                    !bits // Negative: flip all bits
                } else {
                    bits ^ 0x8000_0000_0000_0000 // Positive: flip sign bit
                };
                buf.extend_from_slice(&sortable.to_be_bytes());
            }
            KeyPart::String(s) => {
                buf.push(TAG_STRING);
                encode_string_into(s, buf);
            }
            KeyPart::Max => buf.push(TAG_MAX),
        }
    }
}

impl From<f64> for KeyPart {
    fn from(n: f64) -> Self {
        KeyPart::Number(n)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::String(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::String(s)
    }
}

fn encode_string_into(s: &str, buf: &mut Vec<u8>) {
    for &byte in s.as_bytes() {
        buf.push(byte);
        if byte == 0x00 {
            buf.push(0xFF);
        }
    }
    buf.push(0x00);
    buf.push(0x01);
}

/// A single or compound index key.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKey(Vec<KeyPart>);

impl IndexKey {
    /// Build a key from its parts.
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Build a single-part key.
    pub fn single(part: impl Into<KeyPart>) -> Self {
        Self(vec![part.into()])
    }

    /// Key parts in order.
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Encode the key to sortable bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 * self.0.len());
        for part in &self.0 {
            part.encode_into(&mut buf);
        }
        buf
    }
}

/// Build the stored entry key for a document in an index.
pub(crate) fn entry_key(key: &IndexKey, primary_key: &str) -> Vec<u8> {
    let mut buf = key.encode();
    buf.push(ENTRY_SEPARATOR);
    encode_string_into(primary_key, &mut buf);
    buf
}

/// A range over index keys, mirroring lower/upper bounds with open flags.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    lower: Bound<IndexKey>,
    upper: Bound<IndexKey>,
}

impl KeyRange {
    /// Range covering every key.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Range between two keys. `*_open` excludes the bound itself.
    pub fn bound(lower: IndexKey, upper: IndexKey, lower_open: bool, upper_open: bool) -> Self {
        Self {
            lower: make_bound(lower, lower_open),
            upper: make_bound(upper, upper_open),
        }
    }

    /// Range of keys above `lower`.
    pub fn lower_bound(lower: IndexKey, open: bool) -> Self {
        Self {
            lower: make_bound(lower, open),
            upper: Bound::Unbounded,
        }
    }

    /// Range of keys below `upper`.
    pub fn upper_bound(upper: IndexKey, open: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: make_bound(upper, open),
        }
    }

    /// Range matching exactly one key.
    pub fn only(key: IndexKey) -> Self {
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Lower bound.
    pub fn lower(&self) -> &Bound<IndexKey> {
        &self.lower
    }

    /// Upper bound.
    pub fn upper(&self) -> &Bound<IndexKey> {
        &self.upper
    }

    /// Translate to a byte range over index entries.
    ///
    /// Returns None when the range cannot contain any entry.
    pub(crate) fn to_entry_range(&self) -> Option<EntryRange> {
        let start = match &self.lower {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(key) => Bound::Included(key.encode()),
            Bound::Excluded(key) => Bound::Included(ceiling(key)),
        };
        let end = match &self.upper {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(key) => Bound::Excluded(ceiling(key)),
            Bound::Excluded(key) => Bound::Excluded(key.encode()),
        };
        let range = (start, end);
        if is_empty_range(&range) {
            None
        } else {
            Some(range)
        }
    }
}

/// Byte bounds over index entries, usable with `sled::Tree::range`.
pub(crate) type EntryRange = (Bound<Vec<u8>>, Bound<Vec<u8>>);

fn make_bound(key: IndexKey, open: bool) -> Bound<IndexKey> {
    if open {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

/// First byte string above every entry of `key`.
fn ceiling(key: &IndexKey) -> Vec<u8> {
    let mut buf = key.encode();
    buf.push(ENTRY_CEILING);
    buf
}

pub(crate) fn is_empty_range(range: &EntryRange) -> bool {
    match range {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e))
        | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(age: f64, id: &str) -> IndexKey {
        IndexKey::new(vec![KeyPart::Number(age), KeyPart::from(id)])
    }

    fn contains(range: &EntryRange, entry: &[u8]) -> bool {
        let above = match &range.0 {
            Bound::Unbounded => true,
            Bound::Included(s) => entry >= s.as_slice(),
            Bound::Excluded(s) => entry > s.as_slice(),
        };
        let below = match &range.1 {
            Bound::Unbounded => true,
            Bound::Included(e) => entry <= e.as_slice(),
            Bound::Excluded(e) => entry < e.as_slice(),
        };
        above && below
    }

    #[test]
    fn test_number_ordering() {
        let values = [f64::NEG_INFINITY, -100.5, -1.0, -0.0, 0.0, 0.5, 25.0, 100.0, f64::INFINITY];
        for pair in values.windows(2) {
            let a = IndexKey::single(pair[0]).encode();
            let b = IndexKey::single(pair[1]).encode();
            assert!(a < b, "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_type_ordering() {
        let ordered = [
            IndexKey::single(KeyPart::Min),
            IndexKey::single(false),
            IndexKey::single(true),
            IndexKey::single(-5.0),
            IndexKey::single(""),
            IndexKey::single("a"),
            IndexKey::single(KeyPart::Max),
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].encode() < pair[1].encode(), "{:?} < {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_string_prefix_ordering() {
        let a = IndexKey::single("ab").encode();
        let b = IndexKey::single("abc").encode();
        let c = IndexKey::single("ab\u{0}").encode();
        assert!(a < b);
        assert!(a < c);
        assert!(c < b);
    }

    #[test]
    fn test_compound_ordering_breaks_ties_by_second_part() {
        assert!(compound(5.0, "a").encode() < compound(5.0, "b").encode());
        assert!(compound(5.0, "zzz").encode() < compound(6.0, "a").encode());
        let ceiling = IndexKey::new(vec![5.0.into(), KeyPart::Max]);
        assert!(compound(5.0, "a").encode() < ceiling.encode());
    }

    #[test]
    fn test_entries_of_one_key_precede_its_extensions() {
        let short = entry_key(&IndexKey::single(25.0), "zzzz");
        let long = entry_key(&compound(25.0, "a"), "a");
        assert!(short < long);
    }

    #[test]
    fn test_inclusive_range_contains_boundary_entries() {
        let range = KeyRange::bound(
            IndexKey::new(vec![KeyPart::Min, KeyPart::Min]),
            IndexKey::new(vec![25.0.into(), KeyPart::Max]),
            false,
            false,
        )
        .to_entry_range()
        .unwrap();

        assert!(contains(&range, &entry_key(&compound(0.0, "a"), "a")));
        assert!(contains(&range, &entry_key(&compound(25.0, "zzz"), "zzz")));
        assert!(!contains(&range, &entry_key(&compound(26.0, "a"), "a")));
    }

    #[test]
    fn test_exclusive_lower_bound_skips_only_that_key() {
        let last = compound(10.0, "m");
        let range = KeyRange::lower_bound(last.clone(), true)
            .to_entry_range()
            .unwrap();

        assert!(!contains(&range, &entry_key(&last, "m")));
        assert!(contains(&range, &entry_key(&compound(10.0, "n"), "n")));
        assert!(!contains(&range, &entry_key(&compound(10.0, "l"), "l")));
    }

    #[test]
    fn test_exclusive_upper_bound_on_single_part() {
        let range = KeyRange::upper_bound(IndexKey::single("026"), true)
            .to_entry_range()
            .unwrap();
        assert!(contains(&range, &entry_key(&IndexKey::single("025|abc"), "abc")));
        assert!(!contains(&range, &entry_key(&IndexKey::single("026|abc"), "abc")));
    }

    #[test]
    fn test_only_matches_every_entry_of_key() {
        let key = IndexKey::new(vec![true.into(), 42.0.into()]);
        let range = KeyRange::only(key.clone()).to_entry_range().unwrap();
        assert!(contains(&range, &entry_key(&key, "a")));
        assert!(contains(&range, &entry_key(&key, "zzz")));
        assert!(!contains(&range, &entry_key(&IndexKey::new(vec![true.into(), 43.0.into()]), "a")));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = KeyRange::bound(IndexKey::single(10.0), IndexKey::single(5.0), false, false);
        assert!(range.to_entry_range().is_none());

        let same = KeyRange::bound(IndexKey::single(5.0), IndexKey::single(5.0), true, false);
        assert!(same.to_entry_range().is_none());
    }
}
