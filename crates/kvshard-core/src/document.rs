//! Benchmark document type and its canonical ordering.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A generated benchmark document.
///
/// Identity is [`Document::id`]; no other uniqueness constraint is enforced
/// by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Random fixed-length identifier, also the primary key.
    pub id: String,

    /// Whole number in `[0, 100]`, used for range queries.
    pub age: f64,

    /// Zero-padded age followed by `|` and the id.
    ///
    /// A hand-crafted sortable key that stands in for the compound
    /// `[age, id]` index when only single-field indexes are used.
    pub age_stringified: String,

    /// Random number in `[0, 1000]`.
    pub nr: f64,

    /// Milliseconds since the Unix epoch, strictly increasing per generator.
    pub timestamp: u64,

    /// Random flag, first part of the `bool-timestamp` index.
    pub flag: bool,

    /// Long random text payload.
    pub long_string: String,

    /// Deeply nested payload.
    pub nested: Nested,

    /// Small ordered sequence of (string, number) pairs.
    pub pairs: Vec<Pair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nested {
    pub ted: NestedTed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedTed {
    pub ob: NestedOb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedOb {
    pub ject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub s: String,
    pub n: f64,
}

impl Document {
    /// Serialize the document to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a document from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Build the custom sortable age key: `"025|<id>"`.
pub fn stringify_age(age: f64, id: &str) -> String {
    format!("{}|{}", pad_age(age), id)
}

/// Age left-padded with zeros to three characters.
pub fn pad_age(age: f64) -> String {
    format!("{:0>3}", age.to_string())
}

/// Order documents by age ascending, then by id ascending.
///
/// Ages compare with [`f64::total_cmp`], matching the byte order of the
/// `age-index` keys. Two documents with the same age and id compare equal.
pub fn compare_by_age_then_id(a: &Document, b: &Document) -> Ordering {
    a.age.total_cmp(&b.age).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, age: f64) -> Document {
        Document {
            id: id.to_string(),
            age,
            age_stringified: stringify_age(age, id),
            nr: 0.0,
            timestamp: 0,
            flag: false,
            long_string: String::new(),
            nested: Nested {
                ted: NestedTed {
                    ob: NestedOb {
                        ject: String::new(),
                    },
                },
            },
            pairs: Vec::new(),
        }
    }

    #[test]
    fn test_sort_by_age_then_id() {
        let mut docs = vec![doc("b", 5.0), doc("a", 5.0), doc("c", 3.0)];
        docs.sort_by(compare_by_age_then_id);

        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_comparator_is_antisymmetric() {
        let a = doc("a", 5.0);
        let b = doc("b", 5.0);
        let c = doc("c", 3.0);

        assert_eq!(compare_by_age_then_id(&a, &b), Ordering::Less);
        assert_eq!(compare_by_age_then_id(&b, &a), Ordering::Greater);
        assert_eq!(compare_by_age_then_id(&c, &a), Ordering::Less);
        assert_eq!(compare_by_age_then_id(&a, &c), Ordering::Greater);
        assert_eq!(compare_by_age_then_id(&a, &a.clone()), Ordering::Equal);
    }

    #[test]
    fn test_sorting_is_reproducible() {
        let docs = vec![
            doc("x", 10.0),
            doc("b", 2.0),
            doc("q", 10.0),
            doc("a", 2.0),
            doc("m", 0.0),
        ];

        let mut first = docs.clone();
        first.sort_by(compare_by_age_then_id);
        let mut second: Vec<_> = docs.into_iter().rev().collect();
        second.sort_by(compare_by_age_then_id);

        assert_eq!(first, second);
    }

    #[test]
    fn test_stringify_age_pads_to_three_digits() {
        assert_eq!(stringify_age(5.0, "abc"), "005|abc");
        assert_eq!(stringify_age(25.0, "abc"), "025|abc");
        assert_eq!(stringify_age(100.0, "abc"), "100|abc");
    }

    #[test]
    fn test_document_bytes_roundtrip() {
        let original = doc("roundtrip", 42.0);
        let bytes = original.to_bytes().unwrap();
        assert_eq!(Document::from_bytes(&bytes).unwrap(), original);
    }

    #[test]
    fn test_fractional_numbers_roundtrip_exactly() {
        let mut original = doc("fraction", 947.8226835334873);
        original.nr = 0.1 + 0.2;
        original.pairs.push(Pair {
            s: "p".to_string(),
            n: 1.0 / 3.0,
        });

        let decoded = Document::from_bytes(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.age.to_bits(), original.age.to_bits());
        assert_eq!(decoded.nr.to_bits(), original.nr.to_bits());
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            Document::from_bytes(b"not json"),
            Err(Error::Deserialization(_))
        ));
    }
}
