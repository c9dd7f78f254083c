//! Map, list, set and array codecs, and the [`Encode`] impls of the std
//! collections they serve.
//!
//! Writing works from [`Shape`], so any map-like or sequence-like value can be
//! written. Reading is untyped: members decode to [`Data`] through the tag of
//! each member. Typed sequences use [`VecCodec`](super::VecCodec).

use crate::builder::Builder;
use crate::{
    Alias, Chan, Coder, Context, Data, DataMap, Encode, Error, Framing, Object, Result, Shape,
    Space, TypeDesc, Value,
};
use indexmap::IndexMap;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Map,
    List,
    Set,
    Array,
}

/// Collects untyped members into a [`Data`] collection.
pub struct DataBuilder {
    kind: Kind,
    bare: bool,
    map: DataMap,
    items: Vec<Data>,
    pending: Option<String>,
}

impl DataBuilder {
    fn new(kind: Kind, bare: bool) -> Self {
        DataBuilder {
            kind,
            bare,
            map: DataMap::new(),
            items: Vec::new(),
            pending: None,
        }
    }

    fn insert(&mut self, alias: Option<String>, data: Data) {
        match self.kind {
            Kind::Map => {
                self.map.insert(alias.unwrap_or_default(), data);
            }
            Kind::Set if self.items.contains(&data) => {}
            Kind::List | Kind::Set | Kind::Array => self.items.push(data),
        }
    }
}

fn alias_text(alias: Option<&Alias>) -> Result<Option<String>> {
    alias.map(|a| a.as_str().map(str::to_owned)).transpose()
}

/// Untagged members read as `$`.
fn tag(space: &Space) -> Result<&str> {
    let space = space.as_str()?;
    Ok(if space.is_empty() { "$" } else { space })
}

fn into_data(obj: Option<Object>) -> Data {
    obj.map_or(Data::Null, Data::from_object)
}

impl Builder for DataBuilder {
    fn on_value(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        alias: Option<&Alias>,
        value: &Value,
    ) -> Result<()> {
        let Some(coder) = ctx.registry.resolve_read(None, None, tag(space)?) else {
            tracing::trace!(%space, "unknown tag in untyped compound, skipping");
            return Ok(());
        };
        let data = into_data(coder.read(ctx, value)?);
        self.insert(alias_text(alias)?, data);
        Ok(())
    }

    fn on_child(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        alias: Option<&Alias>,
    ) -> Result<Option<Box<dyn Builder>>> {
        let builder = ctx
            .registry
            .resolve_read(None, None, tag(space)?)
            .and_then(|coder| coder.builder(None));
        if builder.is_some() {
            self.pending = Some(alias_text(alias)?.unwrap_or_default());
        }
        Ok(builder)
    }

    fn on_child_end(&mut self, _ctx: &Context<'_>, result: Option<Object>) -> Result<()> {
        let alias = self.pending.take();
        self.insert(alias, into_data(result));
        Ok(())
    }

    fn on_close(self: Box<Self>, _ctx: &Context<'_>) -> Result<Option<Object>> {
        let this = *self;
        let obj: Object = match (this.kind, this.bare) {
            (Kind::Map, true) => Box::new(this.map),
            (Kind::Map, false) => Box::new(Data::Map(this.map)),
            (_, true) => Box::new(this.items),
            (Kind::List, false) => Box::new(Data::List(this.items)),
            (Kind::Set, false) => Box::new(Data::Set(this.items)),
            (Kind::Array, false) => Box::new(Data::Array(this.items)),
        };
        Ok(Some(obj))
    }
}

fn write_items(chan: &mut Chan<'_>, value: &dyn Encode) -> Result<()> {
    match value.shape() {
        Shape::List(items) | Shape::Set(items) | Shape::Array(items) => {
            for item in items {
                chan.set(None, item)?;
            }
            Ok(())
        }
        _ => Err(Error::unsupported_type("value is not a sequence")),
    }
}

macro_rules! sequence_coder {
    ($(#[$meta:meta])* $name:ident, $space:literal, $kind:expr) => {
        $(#[$meta])*
        pub struct $name;

        impl Coder for $name {
            fn space(&self) -> &str {
                $space
            }

            fn framing(&self) -> Framing {
                Framing::Compound
            }

            fn accepts(&self, desc: &TypeDesc) -> bool {
                desc.is::<Data>() || desc.is::<Vec<Data>>()
            }

            fn builder(&self, expected: Option<&TypeDesc>) -> Option<Box<dyn Builder>> {
                let bare = expected.map_or(false, |desc| desc.is::<Vec<Data>>());
                Some(Box::new(DataBuilder::new($kind, bare)))
            }

            fn write_members(&self, chan: &mut Chan<'_>, value: &dyn Encode) -> Result<()> {
                write_items(chan, value)
            }
        }
    };
}

sequence_coder!(
    /// `L{...}`: ordered members without aliases.
    ListCoder,
    "L",
    Kind::List
);
sequence_coder!(
    /// `S{...}`: like `L`, duplicates dropped on read.
    SetCoder,
    "S",
    Kind::Set
);
sequence_coder!(
    /// `A{...}`: fixed-size sequences.
    ArrayCoder,
    "A",
    Kind::Array
);

/// `M{...}`: members keyed by alias.
pub struct MapCoder;

impl Coder for MapCoder {
    fn space(&self) -> &str {
        "M"
    }

    fn framing(&self) -> Framing {
        Framing::Compound
    }

    fn accepts(&self, desc: &TypeDesc) -> bool {
        desc.is::<Data>() || desc.is::<DataMap>()
    }

    fn builder(&self, expected: Option<&TypeDesc>) -> Option<Box<dyn Builder>> {
        let bare = expected.map_or(false, |desc| desc.is::<DataMap>());
        Some(Box::new(DataBuilder::new(Kind::Map, bare)))
    }

    fn write_members(&self, chan: &mut Chan<'_>, value: &dyn Encode) -> Result<()> {
        match value.shape() {
            Shape::Map(entries) => {
                for (key, item) in entries {
                    chan.set(Some(&key), item)?;
                }
                Ok(())
            }
            _ => Err(Error::unsupported_type("value is not a map")),
        }
    }
}

fn items<'a, T: Encode + 'a>(iter: impl Iterator<Item = &'a T>) -> Vec<&'a dyn Encode> {
    iter.map(|item| item as &dyn Encode).collect()
}

fn entries<'a, K: Display + 'a, V: Encode + 'a>(
    iter: impl Iterator<Item = (&'a K, &'a V)>,
) -> Vec<(String, &'a dyn Encode)> {
    iter.map(|(k, v)| (k.to_string(), v as &dyn Encode)).collect()
}

impl<T: Encode + 'static> Encode for Vec<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::List(items(self.iter()))
    }
}

impl<T: Encode + 'static, const N: usize> Encode for [T; N] {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Array(items(self.iter()))
    }
}

impl<T: Encode + 'static, S: 'static> Encode for HashSet<T, S> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Set(items(self.iter()))
    }
}

impl<T: Encode + 'static> Encode for BTreeSet<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Set(items(self.iter()))
    }
}

impl<K: Display + 'static, V: Encode + 'static, S: 'static> Encode for HashMap<K, V, S> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Map(entries(self.iter()))
    }
}

impl<K: Display + 'static, V: Encode + 'static> Encode for BTreeMap<K, V> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Map(entries(self.iter()))
    }
}

impl<K: Display + 'static, V: Encode + 'static, S: 'static> Encode for IndexMap<K, V, S> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Map(entries(self.iter()))
    }
}

impl<T: Encode + 'static> Encode for Option<T> {
    fn as_any(&self) -> &dyn Any {
        match self {
            Some(value) => value.as_any(),
            None => self,
        }
    }

    fn is_null(&self) -> bool {
        match self {
            Some(value) => value.is_null(),
            None => true,
        }
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Some(value) => value.shape(),
            None => Shape::Opaque,
        }
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn as_any(&self) -> &dyn Any {
        (**self).as_any()
    }

    fn is_null(&self) -> bool {
        (**self).is_null()
    }

    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}
