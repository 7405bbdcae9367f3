//! Insertion-ordered map from metric name to value.
//!
//! Re-inserting an existing key replaces its value in place, so iteration
//! order always follows the first appearance of each key.

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub struct MetricMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> MetricMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or overwrite `key`. Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<V> Default for MetricMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for MetricMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V> IntoIterator for MetricMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for MetricMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order() {
        let mut map = MetricMap::new();
        map.insert("zeta", 1.0);
        map.insert("alpha", 2.0);
        map.insert("mid", 3.0);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn duplicate_key_overwrites_in_place() {
        let mut map = MetricMap::new();
        assert_eq!(map.insert("a", 1.0), None);
        map.insert("b", 2.0);
        assert_eq!(map.insert("a", 9.0), Some(1.0));
        assert_eq!(map.len(), 2);
        let entries: Vec<(&str, f64)> = map.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(entries, vec![("a", 9.0), ("b", 2.0)]);
    }

    #[test]
    fn lookup_and_emptiness() {
        let mut map: MetricMap<f64> = MetricMap::default();
        assert!(map.is_empty());
        map.insert("x", 0.5);
        assert!(map.contains_key("x"));
        assert!(!map.contains_key("y"));
        assert_eq!(map.get("x"), Some(&0.5));
        assert_eq!(map.values().copied().collect::<Vec<_>>(), vec![0.5]);
    }

    #[test]
    fn collect_applies_last_wins() {
        let map: MetricMap<i32> = vec![("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
        let owned: Vec<(String, i32)> = map.into_iter().collect();
        assert_eq!(owned, vec![("a".to_string(), 3), ("b".to_string(), 2)]);
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut map = MetricMap::new();
        map.insert("M2", 1.0);
        map.insert("M1", 0.99);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"M2":1.0,"M1":0.99}"#);
    }
}
