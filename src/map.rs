//! Members of an `M{...}` compound, in the order they were read.
//!
//! ```rust
//! use kat::{decode_data, DataMap};
//!
//! let data = decode_data("M{i:b(1)i:a(2)i:b(3)}").unwrap();
//! let map: &DataMap = data.as_map().unwrap();
//! // a repeated alias overwrites in place
//! let keys: Vec<_> = map.keys().map(String::as_str).collect();
//! assert_eq!(keys, ["b", "a"]);
//! assert_eq!(map.get("b").and_then(|v| v.as_i64()), Some(3));
//! ```

use crate::Data;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Alias-keyed [`Data`] members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataMap(IndexMap<String, Data>);

impl DataMap {
    #[must_use]
    pub fn new() -> Self {
        DataMap(IndexMap::new())
    }

    /// Sets the member under `alias`, returning the value it replaced.
    pub fn insert(&mut self, alias: impl Into<String>, value: impl Into<Data>) -> Option<Data> {
        self.0.insert(alias.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&Data> {
        self.0.get(alias)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Data> {
        self.0.keys()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Data> {
        self.0.iter()
    }
}

impl IntoIterator for DataMap {
    type Item = (String, Data);
    type IntoIter = indexmap::map::IntoIter<String, Data>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DataMap {
    type Item = (&'a String, &'a Data);
    type IntoIter = indexmap::map::Iter<'a, String, Data>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Data)> for DataMap {
    fn from_iter<T: IntoIterator<Item = (String, Data)>>(iter: T) -> Self {
        DataMap(iter.into_iter().collect())
    }
}

impl Serialize for DataMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_alias_keeps_position() {
        let mut map = DataMap::new();
        map.insert("x", 1);
        map.insert("y", "two");
        assert_eq!(map.insert("x", 3), Some(Data::Int(1)));
        let pairs: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        assert_eq!(
            pairs,
            vec![("x", Data::Int(3)), ("y", Data::Text("two".into()))]
        );
    }

    #[test]
    fn test_serializes_in_read_order() {
        let map: DataMap = [("z", 1), ("a", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Data::from(v)))
            .collect();
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"z":1,"a":2}"#);
    }
}
