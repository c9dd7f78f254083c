//! The codec contract and the runtime capabilities values expose to writers.
//!
//! A [`Coder`] bridges one runtime type and its wire form. It owns a default
//! [`Space`](crate::Space) tag, declares its [`Framing`], reads leaf
//! [`Value`]s, hands out [`Builder`]s for compound input, and writes values
//! through [`Flow`] (scalar payloads) or [`Chan`] (compound members).
//!
//! Values enter the writer as `&dyn Encode`. [`Encode::as_any`] lets the
//! registry find a codec registered for the concrete type, and
//! [`Encode::shape`] describes what the value is when no codec is registered:
//! self-describing, an enum, an array, or a map/list/set.
//!
//! ```rust
//! use kat::{encode, Chan, Encode, Result, SelfEncode, Shape};
//! use std::any::Any;
//!
//! struct Point { x: i32, y: i32 }
//!
//! impl Encode for Point {
//!     fn as_any(&self) -> &dyn Any { self }
//!     fn shape(&self) -> Shape<'_> { Shape::Kat(self) }
//! }
//!
//! impl SelfEncode for Point {
//!     fn space(&self) -> &str { "Point" }
//!     fn write_members(&self, chan: &mut Chan<'_>) -> Result<()> {
//!         chan.set(Some("x"), &self.x)?;
//!         chan.set(Some("y"), &self.y)?;
//!         Ok(())
//!     }
//! }
//!
//! assert_eq!(encode(&Point { x: 1, y: -2 }).unwrap(), "Point{i:x(1)i:y(-2)}");
//! ```

use crate::builder::Builder;
use crate::value::Data;
use crate::{Chan, Flow, Options, Registry, Result, Value};
use std::any::{type_name, Any, TypeId};
use std::fmt;

/// A decoded value of any type.
pub type Object = Box<dyn Any + Send + Sync>;

/// Delimiters a codec writes its payload with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// `space:alias(value)`
    Scalar,
    /// `space:alias{members}`
    Compound,
}

/// Shared state visible to codecs and builders during a decode.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub registry: &'a Registry,
    pub options: &'a Options,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(registry: &'a Registry, options: &'a Options) -> Self {
        Context { registry, options }
    }
}

/// Runtime description of an expected type.
///
/// Primitive types carry a zero value used to fill constructor arguments the
/// input never supplied.
#[derive(Clone, Copy)]
pub struct TypeDesc {
    id: TypeId,
    name: &'static str,
    zero: Option<fn() -> Object>,
}

fn zero_of<T: Default + Any + Send + Sync>() -> Object {
    Box::new(T::default())
}

macro_rules! primitive_zero {
    ($id:expr, $($ty:ty),*) => {
        $(
            if $id == TypeId::of::<$ty>() {
                return Some(zero_of::<$ty> as fn() -> Object);
            }
        )*
    };
}

fn primitive_zero(id: TypeId) -> Option<fn() -> Object> {
    primitive_zero!(id, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);
    None
}

impl TypeDesc {
    /// Describes `T`, detecting the primitive types that have a zero value.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        let id = TypeId::of::<T>();
        TypeDesc {
            id,
            name: type_name::<T>(),
            zero: primitive_zero(id),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.zero.is_some()
    }

    /// A fresh zero value for primitive types.
    #[must_use]
    pub fn zero(&self) -> Option<Object> {
        self.zero.map(|make| make())
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeDesc").field(&self.name).finish()
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Encode/decode strategy for one kind of value.
///
/// Implementations are stateless and shared between threads; per-object
/// decode state lives in the [`Builder`] returned by [`Coder::builder`].
pub trait Coder: Send + Sync + 'static {
    /// Default tag written before values of this codec.
    fn space(&self) -> &str {
        "$"
    }

    fn framing(&self) -> Framing {
        Framing::Scalar
    }

    /// Whether values this codec produces can populate `desc`.
    fn accepts(&self, desc: &TypeDesc) -> bool {
        let _ = desc;
        false
    }

    /// Decodes a leaf value. `Ok(None)` stands for null.
    fn read(&self, ctx: &Context<'_>, value: &Value) -> Result<Option<Object>> {
        let _ = (ctx, value);
        Ok(None)
    }

    /// Builder for compound input, if this codec accepts any.
    fn builder(&self, expected: Option<&TypeDesc>) -> Option<Box<dyn Builder>> {
        let _ = expected;
        None
    }

    /// Writes the payload between `(` and `)`.
    fn write_value(&self, flow: &mut Flow, value: &dyn Encode) -> Result<()> {
        let _ = (flow, value);
        Ok(())
    }

    /// Writes the members between `{` and `}`.
    fn write_members(&self, chan: &mut Chan<'_>, value: &dyn Encode) -> Result<()> {
        let _ = (chan, value);
        Ok(())
    }
}

/// How an enum value identifies itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumRepr {
    /// Tag written for the enum, usually its type name.
    pub space: &'static str,
    pub name: &'static str,
    pub ordinal: usize,
}

/// Structure of a value as seen by the writer.
pub enum Shape<'a> {
    /// Nothing known beyond the concrete type.
    Opaque,
    /// The value writes itself.
    Kat(&'a dyn SelfEncode),
    Enum(EnumRepr),
    Array(Vec<&'a dyn Encode>),
    List(Vec<&'a dyn Encode>),
    Set(Vec<&'a dyn Encode>),
    Map(Vec<(String, &'a dyn Encode)>),
}

/// A value that can be handed to [`Chan::set`].
pub trait Encode {
    /// The concrete value, for codec lookup and downcasting.
    fn as_any(&self) -> &dyn Any;

    fn is_null(&self) -> bool {
        false
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Opaque
    }
}

/// Values that know their own tag and wire form.
pub trait SelfEncode {
    fn space(&self) -> &str;

    fn framing(&self) -> Framing {
        Framing::Compound
    }

    fn write_value(&self, flow: &mut Flow) -> Result<()> {
        let _ = flow;
        Ok(())
    }

    fn write_members(&self, chan: &mut Chan<'_>) -> Result<()> {
        let _ = chan;
        Ok(())
    }
}

/// Downcasts a decoded object to `V`.
///
/// Anything can become a [`Data`] and a `Data` map or sequence can become
/// its bare collection type. Returns the object back on mismatch.
pub fn cast<V: Any>(obj: Object) -> std::result::Result<V, Object> {
    let obj = match obj.downcast::<V>() {
        Ok(v) => return Ok(*v),
        Err(obj) => obj,
    };
    let target = TypeId::of::<V>();
    let converted: Object = if target == TypeId::of::<Data>() {
        Box::new(Data::from_object(obj))
    } else if target == TypeId::of::<crate::DataMap>() {
        match obj.downcast::<Data>() {
            Ok(data) => match *data {
                Data::Map(map) => Box::new(map),
                other => Box::new(other),
            },
            Err(obj) => obj,
        }
    } else if target == TypeId::of::<Vec<Data>>() {
        match obj.downcast::<Data>() {
            Ok(data) => match *data {
                Data::List(items) | Data::Set(items) | Data::Array(items) => Box::new(items),
                other => Box::new(other),
            },
            Err(obj) => obj,
        }
    } else {
        obj
    };
    converted.downcast::<V>().map(|v| *v)
}

macro_rules! encode_leaf {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn as_any(&self) -> &dyn Any {
                    self
                }
            }
        )*
    };
}

encode_leaf!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    &'static str,
    num_bigint::BigInt
);
