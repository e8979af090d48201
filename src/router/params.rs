//! The flat parameter map handed to handlers.

use std::collections::HashMap;

use serde::Serialize;

/// Path and query parameters extracted for one dispatched request.
///
/// Path captures and query pairs share a single namespace. Values are inserted in the
/// order path captures, then query pairs, and a later insert replaces an earlier one, so
/// `?id=7` overrides a captured `:id`.
///
/// # Examples
///
/// ```
/// use nestor::Params;
///
/// let mut params = Params::new();
/// params.insert("id", "42");
/// params.insert("id", "7");
/// assert_eq!(params.get("id"), Some("7"));
/// assert_eq!(params.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params {
    map: HashMap<String, String>,
}

impl Params {
    /// Create a new empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value under the same name
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Get a value from the map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(name, value)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Extend<(String, String)> for Params {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        self.map.extend(iter);
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = std::collections::hash_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_insert_wins() {
        let mut params = Params::new();
        params.insert("sort", "asc");
        params.insert("sort", "desc");
        assert_eq!(params.get("sort"), Some("desc"));
    }

    #[test]
    fn extend_overrides_existing() {
        let mut params: Params = [("id", "1"), ("tab", "info")].into_iter().collect();
        params.extend([("id".to_owned(), "2".to_owned())]);
        assert_eq!(params.get("id"), Some("2"));
        assert_eq!(params.get("tab"), Some("info"));
    }

    #[test]
    fn serializes_as_flat_object() {
        let params: Params = [("id", "42")].into_iter().collect();
        assert_eq!(serde_json::to_string(&params).unwrap(), r#"{"id":"42"}"#);
    }
}
