use crate::bson::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Ordered field map, unique keys, last-write-wins on insert (spec §3
/// Document row, §4.1). Replaces the teacher's case-insensitive
/// `HashMap<CaseInsensitiveString, Value>` (a LiteDB-specific quirk this
/// spec does not call for) with an `indexmap::IndexMap`, which keeps
/// insertion order the way spec.md's `compare_to`/DDL-column-order
/// guarantees require.
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: IndexMap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Document { fields: IndexMap::with_capacity(capacity) }
    }

    /// Inserts `key => value`, overwriting any existing value for `key`
    /// in place (position preserved, spec §3 "Lifecycles").
    ///
    /// ### Panics
    /// Panics if `key` contains a NUL byte (disallowed for a bson cstring).
    #[track_caller]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        assert!(!key.as_bytes().contains(&0), "document key must not contain a NUL byte");
        self.fields.insert(key, value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.fields.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns a new document with `key` set to `value`, leaving `self`
    /// untouched (persistent-style mutator, spec §3 "Lifecycles": callers
    /// that want a modified copy without aliasing the original).
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Document {
        let mut copy = self.clone();
        copy.insert(key, value);
        copy
    }

    pub(crate) fn compare_to(&self, other: &Document) -> Ordering {
        for (a, b) in self.fields.iter().zip(other.fields.iter()) {
            let key_cmp = a.0.cmp(b.0);
            if key_cmp != Ordering::Equal {
                return key_cmp;
            }
            let val_cmp = a.1.compare_to(b.1);
            if val_cmp != Ordering::Equal {
                return val_cmp;
            }
        }
        self.fields.len().cmp(&other.fields.len())
    }

    pub(crate) fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.fields.len().hash(state);
        for (k, v) in &self.fields {
            k.hash(state);
            v.bson_hash().hash(state);
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1.bson_eq(v2))
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document { fields: IndexMap::from_iter(iter) }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order_and_overwrites_in_place() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        doc.insert("b", 2i32);
        doc.insert("a", 3i32);
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.get("a").unwrap().as_i32(), Some(3));
    }

    #[test]
    fn with_does_not_mutate_original() {
        let doc = Document::new().with("a", 1i32);
        let doc2 = doc.with("b", 2i32);
        assert!(!doc.contains_key("b"));
        assert!(doc2.contains_key("b"));
    }

    #[test]
    fn remove_drops_key() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        assert_eq!(doc.remove("a").unwrap().as_i32(), Some(1));
        assert!(!doc.contains_key("a"));
    }

    #[test]
    #[should_panic]
    fn rejects_nul_in_key() {
        let mut doc = Document::new();
        doc.insert("a\0b", 1i32);
    }
}
