use crate::value::AttributeValue;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Insertion-ordered attribute map with an optional capacity.
///
/// New keys past the capacity are discarded and counted; the earliest
/// inserted keys are the ones that survive. Re-inserting a known key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundedAttributes {
    entries: Vec<(String, AttributeValue)>,
    limit: Option<usize>,
    dropped: usize,
}

impl BoundedAttributes {
    pub fn new(limit: Option<usize>) -> Self {
        BoundedAttributes { entries: Vec::new(), limit, dropped: 0 }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return;
        }
        if self.limit.is_some_and(|limit| self.entries.len() >= limit) {
            self.dropped += 1;
            return;
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl Extend<(String, AttributeValue)> for BoundedAttributes {
    fn extend<I: IntoIterator<Item = (String, AttributeValue)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl Serialize for BoundedAttributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_keeps_first_n_and_counts_the_rest() {
        for (k, n) in [(10usize, 3usize), (5, 1), (4, 0), (7, 7)] {
            let mut attrs = BoundedAttributes::new(Some(n));
            for i in 0..k {
                attrs.insert(format!("k{}", i), AttributeValue::Int(i as i64));
            }
            let expected: Vec<String> = (0..n.min(k)).map(|i| format!("k{}", i)).collect();
            assert_eq!(attrs.keys().collect::<Vec<_>>(), expected);
            assert_eq!(attrs.dropped(), k.saturating_sub(n));
        }
    }

    #[test]
    fn replacing_a_key_is_not_a_drop() {
        let mut attrs = BoundedAttributes::new(Some(1));
        attrs.insert("a", 1.into());
        attrs.insert("a", 2.into());
        assert_eq!(attrs.get("a"), Some(&AttributeValue::Int(2)));
        assert_eq!(attrs.dropped(), 0);
    }

    #[test]
    fn unbounded_never_drops() {
        let mut attrs = BoundedAttributes::unbounded();
        attrs.extend((0..500).map(|i| (format!("k{}", i), AttributeValue::Null)));
        assert_eq!(attrs.len(), 500);
        assert_eq!(attrs.dropped(), 0);
    }
}
