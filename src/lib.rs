//! # kat
//!
//! A self-describing text serialization format with tagged values and
//! incremental object assembly.
//!
//! ## What is Kat?
//!
//! Every value carries its type tag (its *space*), an optional member name
//! (its *alias*), and either a scalar payload or nested members:
//!
//! ```text
//! space:alias(value)
//! space:alias{members}
//! ```
//!
//! `Story{i:id(100001)s:title(KAT+)M:meta{i:view(99)}}` is a `Story` with an
//! `i`nt `id`, a `s`tring `title` and a `M`ap `meta`. The delimiters `^`, `(`
//! and `)` are escaped with `^`; whitespace inside tags and aliases is written
//! as `^s`, `^r`, `^n` and `^t`.
//!
//! ## Key Features
//!
//! - **Codec registry**: values are written and read by codecs looked up by
//!   runtime type or by tag, with layered registries for private overrides
//! - **Collect-then-construct**: immutable types built through constructors
//!   are decoded in one pass, with members in any order
//! - **Pooled buffers**: output and token buffers come from a size-classed pool
//! - **Serde front-end**: any `Serialize` type can be written as Kat text
//!
//! ## Quick Start
//!
//! ### Serde types
//!
//! ```rust
//! use kat::to_string;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: i32,
//!     name: String,
//! }
//!
//! let user = User { id: 1, name: "kraity".into() };
//! assert_eq!(to_string(&user).unwrap(), "User{i:id(1)s:name(kraity)}");
//! ```
//!
//! ### Mapped types
//!
//! ```rust
//! use kat::{decode, encode, impl_encode, Registry, Sketch};
//!
//! #[derive(Debug, PartialEq)]
//! struct Art {
//!     id: i64,
//!     tag: String,
//!     name: String,
//! }
//! impl_encode!(Art);
//!
//! Registry::global().register_sketch(
//!     Sketch::with_args("Art", |args| {
//!         Ok(Art {
//!             id: args.required(0)?,
//!             tag: args.take(1)?.unwrap_or_default(),
//!             name: String::new(),
//!         })
//!     })
//!     .param::<i64>("id")
//!     .param::<String>("tag")
//!     .alias("meta")
//!     .field::<String>("name", |a| &a.name, |a, v| a.name = v)
//!     .getter::<i64>("id", |a| &a.id)
//!     .getter::<String>("meta", |a| &a.tag),
//! );
//!
//! let art: Art = decode("{:id(1):name(kraity):meta(katplus)}").unwrap().unwrap();
//! assert_eq!(art, Art { id: 1, tag: "katplus".into(), name: "kraity".into() });
//!
//! let text = encode(&art).unwrap();
//! assert_eq!(text, "Art{s:name(kraity)l:id(1)s:meta(katplus)}");
//! assert_eq!(decode::<Art>(&text).unwrap(), Some(art));
//! ```
//!
//! ### Dynamic values
//!
//! ```rust
//! use kat::{data, decode_data, Data};
//!
//! let value = decode_data("M{i:id(1)L:tags{s(a)s(b)}}").unwrap();
//! assert_eq!(value, data!({ "id": 1, "tags": ["a", "b"] }));
//! ```
//!
//! ## Logging
//!
//! The crate reports through [`tracing`]: codec registration and object
//! construction at `debug`, skipped members at `trace`, and pool limit
//! violations at `error`. No subscriber is installed.

pub mod builder;
pub mod chain;
pub mod chan;
pub mod codecs;
pub mod coder;
pub mod error;
pub mod escape;
pub mod flow;
pub mod macros;
pub mod map;
pub mod options;
pub mod parser;
pub mod pool;
pub mod registry;
pub mod ser;
pub mod sketch;
pub mod value;

pub use builder::{Assembler, Builder, Events};
pub use chain::{Alias, Chain, Space, Value};
pub use chan::Chan;
pub use coder::{Coder, Context, Encode, EnumRepr, Framing, Object, SelfEncode, Shape, TypeDesc};
pub use error::{Error, Result};
pub use flow::Flow;
pub use map::DataMap;
pub use options::{Options, PoolConfig};
pub use parser::Parser;
pub use pool::BufferPool;
pub use registry::Registry;
pub use ser::{to_data, DataSerializer, Serializer};
pub use sketch::{Arguments, Sketch, SketchCodec};
pub use value::{Data, Entity};

use codecs::MapCoder;
use coder::cast;
use serde::Serialize;
use std::any::Any;
use std::io;
use std::sync::Arc;

/// Encodes a value with the global registry.
///
/// A value no codec can write produces an empty string.
///
/// # Examples
///
/// ```rust
/// use kat::encode;
///
/// assert_eq!(encode(&vec![1, 2]).unwrap(), "L{i(1)i(2)}");
/// assert_eq!(encode(&Some("kat")).unwrap(), "s(kat)");
/// ```
///
/// # Errors
///
/// Propagates codec and buffer failures.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn encode(value: &dyn Encode) -> Result<String> {
    encode_with(value, Registry::global(), Options::new())
}

/// Encodes a value with the global registry, one member per line.
///
/// # Errors
///
/// Propagates codec and buffer failures.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn encode_pretty(value: &dyn Encode) -> Result<String> {
    encode_with(value, Registry::global(), Options::pretty())
}

/// Encodes a value with a given registry and options.
///
/// # Errors
///
/// Propagates codec and buffer failures, and balance failures when
/// [`Options::balance_check`] is on.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn encode_with(value: &dyn Encode, registry: &Registry, options: Options) -> Result<String> {
    let mut chan = Chan::new(registry, options);
    if !chan.set(None, value)? {
        tracing::trace!("top-level value has no codec, output is empty");
    }
    chan.finish()
}

/// Encodes a compound whose members are written by `members`.
///
/// # Examples
///
/// ```rust
/// use kat::encode_entry;
///
/// let text = encode_entry(Some("Story"), |chan| {
///     chan.set(Some("id"), &100001)?;
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(text, "Story{i:id(100001)}");
/// ```
///
/// # Errors
///
/// Propagates the closure's error as well as buffer failures.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn encode_entry<F>(space: Option<&str>, members: F) -> Result<String>
where
    F: for<'r> FnOnce(&mut Chan<'r>) -> Result<()>,
{
    let mut chan = Chan::new(Registry::global(), Options::new());
    chan.set_entry(None, space, members)?;
    chan.finish()
}

/// Decodes a value of type `T` with the global registry.
///
/// Returns `Ok(None)` for empty input, for null and for a root no codec
/// could read.
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] when no codec is bound to `T`, and
/// malformed-input or construction errors from the input.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn decode<T: Any>(text: &str) -> Result<Option<T>> {
    let desc = TypeDesc::of::<T>();
    if desc.is::<Data>() {
        let data: coder::Object = Box::new(decode_data(text)?);
        return Ok(cast::<T>(data).ok());
    }
    let registry = Registry::global();
    let structural = desc.is::<DataMap>() || desc.is::<Vec<Data>>();
    if !structural && registry.by_type(desc.id()).is_none() {
        return Err(Error::unsupported_type(desc.name()));
    }
    match decode_with(text, registry, &Options::new(), Some(desc))? {
        None => Ok(None),
        Some(obj) => cast::<T>(obj)
            .map(Some)
            .map_err(|_| Error::custom(format!("decoded value is not a {}", desc.name()))),
    }
}

/// Decodes with a given registry, expecting a value of `expected`.
///
/// # Errors
///
/// Returns malformed-input errors positioned in `text`, and construction
/// errors raised while assembling objects.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn decode_with(
    text: &str,
    registry: &Registry,
    options: &Options,
    expected: Option<TypeDesc>,
) -> Result<Option<Object>> {
    let assembler = Assembler::new(Context::new(registry, options), expected);
    assemble(text.as_bytes(), assembler)
}

/// Decodes untyped input into a [`Data`] tree. A root tag nobody owns is
/// read as a map.
///
/// # Examples
///
/// ```rust
/// use kat::{decode_data, Data};
///
/// let value = decode_data("Story{i:id(1)$:note(0xFF)}").unwrap();
/// assert_eq!(value.get("id"), Some(&Data::Int(1)));
/// assert_eq!(value.get("note"), Some(&Data::Int(255)));
/// assert_eq!(decode_data("").unwrap(), Data::Null);
/// ```
///
/// # Errors
///
/// Returns malformed-input errors positioned in `text`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn decode_data(text: &str) -> Result<Data> {
    let options = Options::new();
    let assembler = Assembler::new(
        Context::new(Registry::global(), &options),
        Some(TypeDesc::of::<Data>()),
    )
    .with_fallback(Arc::new(MapCoder));
    Ok(assemble(text.as_bytes(), assembler)?.map_or(Data::Null, Data::from_object))
}

/// Converts untyped [`Data`] into a `T` registered with the global registry.
///
/// The data is fed to `T`'s builder member by member, so sketches with
/// constructor arguments are assembled exactly as when decoding text.
///
/// # Examples
///
/// ```rust
/// use kat::{data, from_data_with, impl_encode, Registry, Sketch};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct User { id: i32, name: String }
/// impl_encode!(User);
///
/// let registry = Registry::with_defaults();
/// registry.register_sketch(
///     Sketch::new("User", User::default)
///         .field::<i32>("id", |u| &u.id, |u, v| u.id = v)
///         .field::<String>("name", |u| &u.name, |u, v| u.name = v),
/// );
/// let user: User = from_data_with(&data!({ "id": 1, "name": "kraity" }), &registry)
///     .unwrap()
///     .unwrap();
/// assert_eq!(user, User { id: 1, name: "kraity".into() });
/// ```
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] when no codec is bound to `T`, and the
/// malformed-input or construction errors its builder raises.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_data<T: Any>(data: &Data) -> Result<Option<T>> {
    from_data_with(data, Registry::global())
}

/// [`from_data`] with a given registry.
///
/// # Errors
///
/// See [`from_data`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_data_with<T: Any>(data: &Data, registry: &Registry) -> Result<Option<T>> {
    let desc = TypeDesc::of::<T>();
    if desc.is::<Data>() {
        let obj: Object = Box::new(data.clone());
        return Ok(cast::<T>(obj).ok());
    }
    if registry.by_type(desc.id()).is_none() {
        return Err(Error::unsupported_type(desc.name()));
    }
    let options = Options::new();
    let mut assembler = Assembler::new(Context::new(registry, &options), Some(desc));
    data.replay(&mut assembler)?;
    match assembler.finish()? {
        None => Ok(None),
        Some(obj) => cast::<T>(obj)
            .map(Some)
            .map_err(|_| Error::custom(format!("converted value is not a {}", desc.name()))),
    }
}

fn assemble(input: &[u8], mut assembler: Assembler<'_>) -> Result<Option<Object>> {
    Parser::new(input).parse(&mut assembler)?;
    assembler.finish()
}

/// Serialize any `T: Serialize` to a Kat string.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    to_string_with_options(value, Options::new())
}

/// Serialize any `T: Serialize` to a pretty-printed Kat string.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string_pretty<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    to_string_with_options(value, Options::pretty())
}

/// Serialize any `T: Serialize` to a Kat string with custom options.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string_with_options<T>(value: &T, options: Options) -> Result<String>
where
    T: ?Sized + Serialize,
{
    let mut serializer = Serializer::new(options);
    value.serialize(&mut serializer)?;
    serializer.into_inner()
}

/// Serialize any `T: Serialize` to a writer in Kat format.
///
/// # Examples
///
/// ```rust
/// use kat::to_writer;
///
/// let mut buffer = Vec::new();
/// to_writer(&mut buffer, &[1u8, 2]).unwrap();
/// assert_eq!(buffer, b"A{i(1)i(2)}");
/// ```
///
/// # Errors
///
/// Returns an error if serialization fails or writing to the writer fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W, T>(mut writer: W, value: &T) -> Result<()>
where
    W: io::Write,
    T: ?Sized + Serialize,
{
    let text = to_string(value)?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| Error::io(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_primitives() {
        assert_eq!(decode::<i32>("i(42)").unwrap(), Some(42));
        assert_eq!(decode::<String>("s(a^)b)").unwrap(), Some("a)b".to_string()));
        assert_eq!(decode::<bool>("$()").unwrap(), None);
        assert_eq!(decode::<i64>("").unwrap(), None);
    }

    #[test]
    fn test_decode_unsupported_type() {
        struct Unknown;
        assert!(matches!(
            decode::<Unknown>("Unknown{}"),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_decode_structural() {
        let map = decode::<DataMap>("M{i:a(1)}").unwrap().unwrap();
        assert_eq!(map.get("a"), Some(&Data::Int(1)));
        let data = decode::<Data>("L{b(true)}").unwrap().unwrap();
        assert_eq!(data, Data::List(vec![Data::Bool(true)]));
    }

    #[test]
    fn test_encode_unresolvable_is_empty() {
        struct Opaque;
        impl_encode!(Opaque);
        assert_eq!(encode(&Opaque).unwrap(), "");
    }

    #[test]
    fn test_decode_data_fallback_root() {
        let data = decode_data("{:id(1):name(kraity)}").unwrap();
        assert_eq!(data.get("name").and_then(Data::as_str), Some("kraity"));
    }
}
