//! Dynamic value representation for Kat data.
//!
//! [`Data`] holds anything an untyped decode can produce. It is what
//! [`decode_data`](crate::decode_data) returns and it can be written back with
//! [`encode`](crate::encode), since it implements [`Encode`].
//!
//! ## Usage Patterns
//!
//! ### Creating Values
//!
//! ```rust
//! use kat::{Data, DataMap};
//!
//! let null = Data::Null;
//! let number = Data::from(42);
//! let text = Data::from("hello");
//!
//! let mut map = DataMap::new();
//! map.insert("id".to_string(), Data::from(1));
//! let entry = Data::Map(map);
//! assert!(entry.is_map());
//! ```
//!
//! ### Round Trips
//!
//! ```rust
//! use kat::{decode_data, encode, Data};
//!
//! let data = decode_data("M{i:id(1)s:name(kraity)L:tags{s(a)s(b)}}").unwrap();
//! assert_eq!(data.get("name").and_then(Data::as_str), Some("kraity"));
//! assert_eq!(encode(&data).unwrap(), "M{l:id(1)s:name(kraity)L:tags{s(a)s(b)}}");
//! ```

use crate::builder::Events;
use crate::{Alias, DataMap, Encode, Object, Shape, Space, Value};
use num_bigint::BigInt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A dynamically-typed Kat value.
///
/// Integers widen to `i64`; values too large for it become [`Data::BigInt`].
/// Objects produced by registered codecs that have no dynamic counterpart are
/// kept as [`Data::Entity`].
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Data {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    BigInt(BigInt),
    List(Vec<Data>),
    Set(Vec<Data>),
    Array(Vec<Data>),
    Map(DataMap),
    Entity(Entity),
}

/// A decoded object of a type outside the dynamic model.
///
/// Entities compare equal only when they share the same allocation.
#[derive(Clone)]
pub struct Entity(Arc<dyn Any + Send + Sync>);

impl Entity {
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Entity(Arc::new(value))
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl From<Object> for Entity {
    fn from(obj: Object) -> Self {
        Entity(Arc::from(obj))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Entity(..)")
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

macro_rules! widen {
    ($obj:ident, $($ty:ty),*) => {
        $(
            let $obj = match $obj.downcast::<$ty>() {
                Ok(v) => return Data::Int(i64::from(*v)),
                Err(obj) => obj,
            };
        )*
    };
}

impl Data {
    /// Converts a decoded object into its dynamic form.
    #[must_use]
    pub fn from_object(obj: Object) -> Data {
        let obj = match obj.downcast::<Data>() {
            Ok(data) => return *data,
            Err(obj) => obj,
        };
        widen!(obj, i8, i16, i32, i64, u8, u16, u32);
        let obj = match obj.downcast::<u64>() {
            Ok(v) => {
                return i64::try_from(*v).map_or_else(|_| Data::BigInt(BigInt::from(*v)), Data::Int)
            }
            Err(obj) => obj,
        };
        let obj = match obj.downcast::<f64>() {
            Ok(v) => return Data::Float(*v),
            Err(obj) => obj,
        };
        let obj = match obj.downcast::<f32>() {
            Ok(v) => return Data::Float(f64::from(*v)),
            Err(obj) => obj,
        };
        let obj = match obj.downcast::<bool>() {
            Ok(v) => return Data::Bool(*v),
            Err(obj) => obj,
        };
        let obj = match obj.downcast::<String>() {
            Ok(v) => return Data::Text(*v),
            Err(obj) => obj,
        };
        let obj = match obj.downcast::<char>() {
            Ok(v) => return Data::Text(v.to_string()),
            Err(obj) => obj,
        };
        let obj = match obj.downcast::<BigInt>() {
            Ok(v) => return Data::BigInt(*v),
            Err(obj) => obj,
        };
        let obj = match obj.downcast::<DataMap>() {
            Ok(v) => return Data::Map(*v),
            Err(obj) => obj,
        };
        match obj.downcast::<Vec<Data>>() {
            Ok(v) => Data::List(*v),
            Err(obj) => Data::Entity(Entity::from(obj)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Data::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Data::Bool(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Data::Int(_) | Data::Float(_) | Data::BigInt(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Data::Text(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_sequence(&self) -> bool {
        matches!(self, Data::List(_) | Data::Set(_) | Data::Array(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Data::Map(_))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Data::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Data::Float(f) => Some(*f),
            Data::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Data::BigInt(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of a list, set or array.
    #[must_use]
    pub fn as_slice(&self) -> Option<&[Data]> {
        match self {
            Data::List(items) | Data::Set(items) | Data::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&DataMap> {
        match self {
            Data::Map(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity<T: Any>(&self) -> Option<&T> {
        match self {
            Data::Entity(entity) => entity.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Member of a map by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Data> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl Data {
    /// Feeds the value to `events` as if its Kat text had been parsed.
    ///
    /// Maps, lists, sets and arrays become compounds, scalars become members
    /// under the tag [`encode`](crate::encode) would give them. Entities have no
    /// wire form and are left out.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by `events`.
    pub fn replay(&self, events: &mut dyn Events) -> crate::Result<()> {
        if let Some(space) = self.compound_space() {
            events.compound_start(&Space::from(space), None)?;
            self.replay_members(events)?;
            return events.compound_end();
        }
        match self.token() {
            Some((space, text)) => events.member(&Space::from(space), None, &Value::from(text.as_str())),
            None => Ok(()),
        }
    }

    fn replay_members(&self, events: &mut dyn Events) -> crate::Result<()> {
        match self {
            Data::Map(map) => map
                .iter()
                .try_for_each(|(key, item)| item.replay_member(events, Some(key.as_str()))),
            Data::List(items) | Data::Set(items) | Data::Array(items) => items
                .iter()
                .try_for_each(|item| item.replay_member(events, None)),
            _ => Ok(()),
        }
    }

    fn replay_member(&self, events: &mut dyn Events, alias: Option<&str>) -> crate::Result<()> {
        let alias = alias.map(Alias::from);
        if let Some(space) = self.compound_space() {
            events.child_start(&Space::from(space), alias.as_ref())?;
            self.replay_members(events)?;
            return events.child_end();
        }
        match self.token() {
            Some((space, text)) => {
                events.member(&Space::from(space), alias.as_ref(), &Value::from(text.as_str()))
            }
            None => {
                tracing::trace!(?alias, "entity has no wire form, skipping");
                Ok(())
            }
        }
    }

    fn compound_space(&self) -> Option<&'static str> {
        match self {
            Data::Map(_) => Some("M"),
            Data::List(_) => Some("L"),
            Data::Set(_) => Some("S"),
            Data::Array(_) => Some("A"),
            _ => None,
        }
    }

    fn token(&self) -> Option<(&'static str, String)> {
        match self {
            Data::Null => Some(("$", String::new())),
            Data::Bool(b) => Some(("b", b.to_string())),
            Data::Int(i) => Some(("l", i.to_string())),
            Data::Float(f) => Some(("d", f.to_string())),
            Data::Text(s) => Some(("s", s.clone())),
            Data::BigInt(b) => Some(("I", b.to_string())),
            _ => None,
        }
    }
}

fn refs(items: &[Data]) -> Vec<&dyn Encode> {
    items.iter().map(|d| d as &dyn Encode).collect()
}

impl Encode for Data {
    fn as_any(&self) -> &dyn Any {
        match self {
            Data::Bool(b) => b,
            Data::Int(i) => i,
            Data::Float(f) => f,
            Data::Text(s) => s,
            Data::BigInt(b) => b,
            Data::Entity(Entity(inner)) => inner.as_ref(),
            Data::Null | Data::List(_) | Data::Set(_) | Data::Array(_) | Data::Map(_) => self,
        }
    }

    fn is_null(&self) -> bool {
        self.is_null()
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Data::List(v) => Shape::List(refs(v)),
            Data::Set(v) => Shape::Set(refs(v)),
            Data::Array(v) => Shape::Array(refs(v)),
            Data::Map(map) => Shape::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v as &dyn Encode))
                    .collect(),
            ),
            _ => Shape::Opaque,
        }
    }
}

impl Encode for DataMap {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v as &dyn Encode))
                .collect(),
        )
    }
}

impl fmt::Display for Data {
    /// Compact Kat text of the value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = crate::encode(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl Serialize for Data {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Data::Null => serializer.serialize_unit(),
            Data::Bool(b) => serializer.serialize_bool(*b),
            Data::Int(i) => serializer.serialize_i64(*i),
            Data::Float(f) => serializer.serialize_f64(*f),
            Data::Text(s) => serializer.serialize_str(s),
            Data::BigInt(b) => serializer.serialize_str(&b.to_string()),
            Data::List(items) | Data::Set(items) | Data::Array(items) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for element in items {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Data::Map(map) => map.serialize(serializer),
            Data::Entity(_) => serializer.serialize_unit_struct("Entity"),
        }
    }
}

impl<'de> Deserialize<'de> for Data {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct DataVisitor;

        impl<'de> Visitor<'de> for DataVisitor {
            type Value = Data;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any Kat value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E> {
                Ok(Data::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E> {
                Ok(Data::Int(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E> {
                Ok(i64::try_from(value).map_or_else(|_| Data::BigInt(BigInt::from(value)), Data::Int))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E> {
                Ok(Data::Float(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E> {
                Ok(Data::Text(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E> {
                Ok(Data::Text(value))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Data::Null)
            }

            fn visit_none<E>(self) -> Result<Self::Value, E> {
                Ok(Data::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    items.push(elem);
                }
                Ok(Data::List(items))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut values = DataMap::new();
                while let Some((key, value)) = map.next_entry::<String, Data>()? {
                    values.insert(key, value);
                }
                Ok(Data::Map(values))
            }
        }

        deserializer.deserialize_any(DataVisitor)
    }
}

impl TryFrom<Data> for i64 {
    type Error = crate::Error;

    fn try_from(value: Data) -> crate::Result<Self> {
        match value {
            Data::Int(i) => Ok(i),
            Data::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Ok(f as i64)
            }
            _ => Err(crate::Error::custom(format!(
                "expected integer, found {:?}",
                value
            ))),
        }
    }
}

impl TryFrom<Data> for f64 {
    type Error = crate::Error;

    fn try_from(value: Data) -> crate::Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| crate::Error::custom(format!("expected number, found {:?}", value)))
    }
}

impl TryFrom<Data> for bool {
    type Error = crate::Error;

    fn try_from(value: Data) -> crate::Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| crate::Error::custom(format!("expected boolean, found {:?}", value)))
    }
}

impl TryFrom<Data> for String {
    type Error = crate::Error;

    fn try_from(value: Data) -> crate::Result<Self> {
        match value {
            Data::Text(s) => Ok(s),
            _ => Err(crate::Error::custom(format!(
                "expected text, found {:?}",
                value
            ))),
        }
    }
}

macro_rules! from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Data {
                fn from(value: $ty) -> Self {
                    Data::Int(i64::from(value))
                }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Data {
    fn from(value: bool) -> Self {
        Data::Bool(value)
    }
}

impl From<f32> for Data {
    fn from(value: f32) -> Self {
        Data::Float(f64::from(value))
    }
}

impl From<f64> for Data {
    fn from(value: f64) -> Self {
        Data::Float(value)
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::Text(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::Text(value.to_string())
    }
}

impl From<BigInt> for Data {
    fn from(value: BigInt) -> Self {
        Data::BigInt(value)
    }
}

impl From<Vec<Data>> for Data {
    fn from(value: Vec<Data>) -> Self {
        Data::List(value)
    }
}

impl From<DataMap> for Data {
    fn from(value: DataMap) -> Self {
        Data::Map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tryfrom_i64() {
        assert_eq!(i64::try_from(Data::Int(42)).unwrap(), 42);
        assert_eq!(i64::try_from(Data::Float(42.0)).unwrap(), 42);
        assert!(i64::try_from(Data::Float(42.5)).is_err());
        assert!(i64::try_from(Data::Text("42".into())).is_err());
    }

    #[test]
    fn test_tryfrom_others() {
        assert_eq!(f64::try_from(Data::Int(2)).unwrap(), 2.0);
        assert!(bool::try_from(Data::Bool(true)).unwrap());
        assert!(bool::try_from(Data::Null).is_err());
        assert_eq!(String::try_from(Data::from("kat")).unwrap(), "kat");
    }

    #[test]
    fn test_from_object() {
        let cases: Vec<(Object, Data)> = vec![
            (Box::new(7u8), Data::Int(7)),
            (Box::new(-7i16), Data::Int(-7)),
            (Box::new(u64::MAX), Data::BigInt(BigInt::from(u64::MAX))),
            (Box::new(1.5f32), Data::Float(1.5)),
            (Box::new('k'), Data::Text("k".into())),
            (Box::new(Data::Null), Data::Null),
            (Box::new(vec![Data::Int(1)]), Data::List(vec![Data::Int(1)])),
        ];
        for (obj, expected) in cases {
            assert_eq!(Data::from_object(obj), expected);
        }
    }

    #[test]
    fn test_entity_identity() {
        #[derive(Debug)]
        struct Art(u32);

        let data = Data::from_object(Box::new(Art(3)));
        assert_eq!(data.as_entity::<Art>().map(|a| a.0), Some(3));
        assert_eq!(data, data.clone());
        assert_ne!(data, Data::from_object(Box::new(Art(3))));
    }

    #[test]
    fn test_const_is_methods() {
        const fn check_null(v: &Data) -> bool {
            v.is_null()
        }
        assert!(check_null(&Data::Null));
        assert!(Data::from(1).is_number());
        assert!(Data::List(vec![]).is_sequence());
        assert!(!Data::from("x").is_map());
    }

    #[test]
    fn test_json_bridge() {
        let data: Data = serde_json::from_str(r#"{"id":1,"tags":["a","b"],"ok":true,"x":null}"#)
            .unwrap();
        assert_eq!(data.get("id"), Some(&Data::Int(1)));
        assert_eq!(
            data.get("tags"),
            Some(&Data::List(vec![Data::from("a"), Data::from("b")]))
        );
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"id":1,"tags":["a","b"],"ok":true,"x":null}"#);
    }
}
