//! Header multimap carried by a SPDY header block.
//!
//! Names are lower-cased on the way in, so a map never holds two spellings
//! of the same header. Values keep their insertion order; that order is what
//! the encoder joins with NUL and the decoder splits back apart.

use std::collections::btree_map::{self, BTreeMap};

/// An ordered multimap from lower-cased header name to one or more values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` after any values already stored under `name`.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(normalize(name.as_ref()))
            .or_default()
            .push(value.into());
    }

    /// Replaces every value stored under `name` with `value`.
    pub fn insert(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> Option<Vec<String>> {
        self.entries.insert(normalize(name.as_ref()), vec![value.into()])
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(normalize(name).as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(normalize(name).as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(normalize(name).as_str())
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of values across all names.
    pub fn values_len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Iterates names in byte order, each with its values.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Iterator over `(name, values)` pairs of a [`HeaderMap`].
#[derive(Debug)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, String, Vec<String>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [String]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for HeaderMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.append(name, value);
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        map.extend(iter);
        map
    }
}
