//! serde front-end.
//!
//! This module provides a [`Serializer`] that writes any `Serialize` type as
//! Kat text, and a [`DataSerializer`] that turns it into a [`Data`] tree.
//!
//! ## Mapping
//!
//! | serde | Kat |
//! |-------|-----|
//! | `bool` | `b(true)` |
//! | `i8` `i16` `i32` `i64` | `B(..)` `u(..)` `i(..)` `l(..)` |
//! | `u8` `u16` / `u32` `u64` | `i(..)` / `l(..)` (`I(..)` past `i64::MAX`) |
//! | `f32` `f64` | `f(..)` `d(..)` |
//! | `char` `str` | `c(..)` `s(..)` |
//! | `None`, `()` | `$()` |
//! | sequences, bytes | `L{..}` |
//! | tuples | `A{..}` |
//! | maps | `M{..}` |
//! | `struct Name` | `Name{..}` |
//! | unit variant `Enum::V` | `Enum(V)` |
//! | other variants `Enum::V(..)` | `M{..:V..}` |
//!
//! ## Usage
//!
//! Most users should use the high-level functions in the crate root:
//!
//! ```rust
//! use kat::{to_string, to_string_pretty};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User { id: i32, name: String }
//!
//! let user = User { id: 1, name: "kraity".into() };
//! assert_eq!(to_string(&user).unwrap(), "User{i:id(1)s:name(kraity)}");
//! assert_eq!(
//!     to_string_pretty(&user).unwrap(),
//!     "User{\n  i:id(1)\n  s:name(kraity)\n}"
//! );
//! ```

use crate::{Data, DataMap, Error, Flow, Options, Result};
use num_bigint::BigInt;
use serde::{ser, Serialize};

/// Writes `Serialize` values as Kat text.
pub struct Serializer {
    flow: Flow,
    alias: Option<String>,
}

impl Serializer {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Serializer {
            flow: Flow::new(options),
            alias: None,
        }
    }

    /// Returns the text written so far.
    ///
    /// # Errors
    ///
    /// See [`Flow::finish`].
    pub fn into_inner(self) -> Result<String> {
        self.flow.finish()
    }

    /// Writes the tag and the alias pending for the current value.
    fn head(&mut self, space: &str) -> Result<()> {
        self.flow.add_space(space)?;
        let alias = self.alias.take();
        self.flow.add_alias(alias.as_deref())
    }

    fn scalar<F>(&mut self, space: &str, payload: F) -> Result<()>
    where
        F: FnOnce(&mut Flow) -> Result<()>,
    {
        self.head(space)?;
        self.flow.open_scalar()?;
        payload(&mut self.flow)?;
        self.flow.close_scalar()
    }

    fn open(&mut self, space: &str) -> Result<()> {
        self.head(space)?;
        self.flow.open_compound()
    }

    /// Opens `M{` and a nested compound named after the variant.
    fn open_variant(&mut self, name: &str, variant: &'static str) -> Result<()> {
        self.open("M")?;
        self.alias = Some(variant.to_string());
        self.open(name)
    }

    fn member<T>(&mut self, alias: Option<String>, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.alias = alias;
        value.serialize(&mut *self)
    }
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = Compound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.scalar("b", |flow| flow.add_bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.scalar("B", |flow| flow.add_i32(i32::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.scalar("u", |flow| flow.add_i32(i32::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.scalar("i", |flow| flow.add_i32(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.scalar("l", |flow| flow.add_i64(v))
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.scalar("i", |flow| flow.add_i32(i32::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.scalar("i", |flow| flow.add_i32(i32::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.scalar("l", |flow| flow.add_i64(i64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        let space = if i64::try_from(v).is_ok() { "l" } else { "I" };
        self.scalar(space, |flow| flow.add_u64(v))
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.scalar("f", |flow| flow.add_f32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.scalar("d", |flow| flow.add_f64(v))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.scalar("c", |flow| flow.add_char(v))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.scalar("s", |flow| flow.add_text(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.open("L")?;
        for &b in v {
            self.member(None, &b)?;
        }
        self.flow.close_compound()
    }

    fn serialize_none(self) -> Result<()> {
        self.scalar("$", |_| Ok(()))
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.scalar("$", |_| Ok(()))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<()> {
        self.scalar(name, |_| Ok(()))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.scalar(name, |flow| {
            if flow.options().enum_as_index {
                flow.add_display(variant_index)
            } else {
                flow.add_text(variant)
            }
        })
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.open("M")?;
        self.member(Some(variant.to_string()), value)?;
        self.flow.close_compound()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Compound<'a>> {
        self.open("L")?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Compound<'a>> {
        self.open("A")?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_tuple_struct(self, name: &'static str, _len: usize) -> Result<Compound<'a>> {
        self.open(name)?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>> {
        self.open_variant("A", variant)?;
        Ok(Compound::new(self, 2))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Compound<'a>> {
        self.open("M")?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Compound<'a>> {
        self.open(name)?;
        Ok(Compound::new(self, 1))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>> {
        self.open_variant(name, variant)?;
        Ok(Compound::new(self, 2))
    }
}

/// Members of an open compound; closes `levels` braces on end.
pub struct Compound<'a> {
    ser: &'a mut Serializer,
    levels: usize,
    key: Option<String>,
}

impl<'a> Compound<'a> {
    fn new(ser: &'a mut Serializer, levels: usize) -> Self {
        Compound {
            ser,
            levels,
            key: None,
        }
    }

    fn close(self) -> Result<()> {
        for _ in 0..self.levels {
            self.ser.flow.close_compound()?;
        }
        Ok(())
    }
}

impl ser::SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.member(None, value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl ser::SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.member(None, value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl ser::SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.member(None, value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl ser::SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.member(None, value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl ser::SerializeMap for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.key = Some(key_text(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::custom("serialize_value called without serialize_key"))?;
        self.ser.member(Some(key), value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl ser::SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.member(Some(key.to_string()), value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl ser::SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.member(Some(key.to_string()), value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

/// Map keys become aliases, so they must have a text form.
fn key_text<T: ?Sized + Serialize>(key: &T) -> Result<String> {
    match to_data(key)? {
        Data::Text(s) => Ok(s),
        Data::Int(i) => Ok(i.to_string()),
        Data::Bool(b) => Ok(b.to_string()),
        Data::BigInt(b) => Ok(b.to_string()),
        other => Err(Error::custom(format!("map key must be text, found {other:?}"))),
    }
}

/// Builds a [`Data`] tree from a `Serialize` value.
pub struct DataSerializer;

pub struct SerializeVec {
    vec: Vec<Data>,
    variant: Option<&'static str>,
}

pub struct SerializeMap {
    map: DataMap,
    current_key: Option<String>,
    variant: Option<&'static str>,
}

/// Wraps `data` as `{variant: data}` when serializing an enum variant.
fn tagged(variant: Option<&'static str>, data: Data) -> Data {
    match variant {
        Some(name) => {
            let mut map = DataMap::new();
            map.insert(name.to_string(), data);
            Data::Map(map)
        }
        None => data,
    }
}

impl ser::Serializer for DataSerializer {
    type Ok = Data;
    type Error = Error;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeVec;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeMap;

    fn serialize_bool(self, v: bool) -> Result<Data> {
        Ok(Data::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Data> {
        Ok(Data::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Data> {
        Ok(Data::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Data> {
        Ok(Data::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Data> {
        Ok(Data::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Data> {
        Ok(Data::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Data> {
        Ok(Data::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Data> {
        Ok(Data::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Data> {
        Ok(i64::try_from(v).map_or_else(|_| Data::BigInt(BigInt::from(v)), Data::Int))
    }

    fn serialize_f32(self, v: f32) -> Result<Data> {
        Ok(Data::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Data> {
        Ok(Data::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Data> {
        Ok(Data::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Data> {
        Ok(Data::Text(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Data> {
        Ok(Data::List(v.iter().map(|&b| Data::from(b)).collect()))
    }

    fn serialize_none(self) -> Result<Data> {
        Ok(Data::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Data>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Data> {
        Ok(Data::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Data> {
        Ok(Data::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Data> {
        Ok(Data::Text(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Data>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Data>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(Some(variant), to_data(value)?))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec::new(None))
    }

    fn serialize_tuple(self, _len: usize) -> Result<SerializeVec> {
        Ok(SerializeVec::new(None))
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<SerializeVec> {
        Ok(SerializeVec::new(None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeVec> {
        Ok(SerializeVec::new(Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<SerializeMap> {
        Ok(SerializeMap::new(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeMap> {
        Ok(SerializeMap::new(Some(variant)))
    }
}

impl SerializeVec {
    fn new(variant: Option<&'static str>) -> Self {
        SerializeVec {
            vec: Vec::new(),
            variant,
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.vec.push(to_data(value)?);
        Ok(())
    }

    fn finish(self) -> Data {
        tagged(self.variant, Data::List(self.vec))
    }
}

impl SerializeMap {
    fn new(variant: Option<&'static str>) -> Self {
        SerializeMap {
            map: DataMap::new(),
            current_key: None,
            variant,
        }
    }

    fn finish(self) -> Data {
        tagged(self.variant, Data::Map(self.map))
    }
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Data;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Data> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Data;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Data> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Data> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SerializeVec {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Data> {
        Ok(self.finish())
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Data;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.current_key = Some(key_text(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| Error::custom("serialize_value called without serialize_key"))?;
        self.map.insert(key, to_data(value)?);
        Ok(())
    }

    fn end(self) -> Result<Data> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_string(), to_data(value)?);
        Ok(())
    }

    fn end(self) -> Result<Data> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for SerializeMap {
    type Ok = Data;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_string(), to_data(value)?);
        Ok(())
    }

    fn end(self) -> Result<Data> {
        Ok(self.finish())
    }
}

/// Converts any `Serialize` value into a [`Data`] tree.
///
/// # Errors
///
/// Fails on map keys without a text form.
pub fn to_data<T: Serialize + ?Sized>(value: &T) -> Result<Data> {
    value.serialize(DataSerializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn kat<T: Serialize>(value: &T) -> String {
        let mut ser = Serializer::new(Options::new());
        value.serialize(&mut ser).unwrap();
        ser.into_inner().unwrap()
    }

    #[derive(Serialize)]
    enum Shape {
        Dot,
        Circle(f64),
        Line(i32, i32),
        Rect { w: u8, h: u8 },
    }

    #[derive(Serialize)]
    struct Pair(i8, i16);

    #[test]
    fn test_scalars() {
        assert_eq!(kat(&true), "b(true)");
        assert_eq!(kat(&-3i8), "B(-3)");
        assert_eq!(kat(&7u64), "l(7)");
        assert_eq!(kat(&u64::MAX), "I(18446744073709551615)");
        assert_eq!(kat(&'('), "c(^()");
        assert_eq!(kat(&"a)b"), "s(a^)b)");
        assert_eq!(kat(&Option::<i32>::None), "$()");
        assert_eq!(kat(&1.5f32), "f(1.5)");
    }

    #[test]
    fn test_collections() {
        assert_eq!(kat(&vec![1, 2]), "L{i(1)i(2)}");
        assert_eq!(kat(&(1, "x")), "A{i(1)s(x)}");
        assert_eq!(kat(&Pair(1, 2)), "Pair{B(1)u(2)}");
        let mut map = BTreeMap::new();
        map.insert(2, "b");
        map.insert(1, "a");
        assert_eq!(kat(&map), "M{s:1(a)s:2(b)}");
    }

    #[test]
    fn test_variants() {
        assert_eq!(kat(&Shape::Dot), "Shape(Dot)");
        assert_eq!(kat(&Shape::Circle(2.0)), "M{d:Circle(2)}");
        assert_eq!(kat(&Shape::Line(1, 2)), "M{A:Line{i(1)i(2)}}");
        assert_eq!(kat(&Shape::Rect { w: 3, h: 4 }), "M{Shape:Rect{i:w(3)i:h(4)}}");

        let mut ser = Serializer::new(Options::new().with_enum_as_index(true));
        Shape::Dot.serialize(&mut ser).unwrap();
        assert_eq!(ser.into_inner().unwrap(), "Shape(0)");
    }

    #[test]
    fn test_to_data() {
        assert_eq!(to_data(&Shape::Dot).unwrap(), Data::Text("Dot".into()));
        let rect = to_data(&Shape::Rect { w: 3, h: 4 }).unwrap();
        assert_eq!(rect.get("Rect").and_then(|r| r.get("w")), Some(&Data::Int(3)));
        assert_eq!(
            to_data(&u64::MAX).unwrap(),
            Data::BigInt(BigInt::from(u64::MAX))
        );
        assert!(to_data(&BTreeMap::from([(vec![1], 2)])).is_err());
    }
}
