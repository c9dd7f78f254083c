//! Built-in codecs.
//!
//! | tag | type | framing |
//! |-----|------|---------|
//! | `$` | any scalar, guessed on read; `${...}` reads as a map | scalar |
//! | `s` | `String` | scalar |
//! | `b` | `bool` | scalar |
//! | `c` | `char` | scalar |
//! | `B` | `i8` | scalar |
//! | `u` | `i16` | scalar |
//! | `i` | `i32` (also `u8`, `u16`) | scalar |
//! | `l` | `i64` (also `u32`, `u64`) | scalar |
//! | `f` | `f32` | scalar |
//! | `d` | `f64` | scalar |
//! | `I` | `BigInt` | scalar |
//! | `M` `L` `S` `A` | [`Data`] maps, lists, sets, arrays | compound |
//! | `E` | [`Error`] | compound |
//!
//! [`EnumCodec`] and [`VecCodec`] are not installed by default; register them
//! for the concrete types that need them.

pub mod enums;
pub mod error;
pub mod structural;
pub mod vec;

pub use enums::EnumCodec;
pub use error::ErrorCoder;
pub use structural::{ArrayCoder, ListCoder, MapCoder, SetCoder};
pub use vec::VecCodec;

use crate::{Coder, Context, Data, Encode, Error, Flow, Object, Registry, Result, TypeDesc, Value};
use num_bigint::BigInt;
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

/// A type with a single-token wire form.
pub trait Leaf: Any + Send + Sync + Sized {
    /// Parses a payload. Blank payloads of non-text types read as `None`.
    fn read_leaf(value: &Value) -> Result<Option<Self>>;

    fn write_leaf(&self, flow: &mut Flow) -> Result<()>;
}

fn invalid<T>(value: &Value) -> Error {
    Error::malformed(format!("`{}` is not a valid {}", value, type_name::<T>()))
}

macro_rules! int_leaf {
    ($($ty:ty),*) => {
        $(
            impl Leaf for $ty {
                fn read_leaf(value: &Value) -> Result<Option<Self>> {
                    if value.is_blank() {
                        return Ok(None);
                    }
                    value
                        .to_i128()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .map(Some)
                        .ok_or_else(|| invalid::<$ty>(value))
                }

                fn write_leaf(&self, flow: &mut Flow) -> Result<()> {
                    flow.add_display(self)
                }
            }
        )*
    };
}

int_leaf!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Raw IEEE bits of a float payload written in `0x` form.
fn float_bits(value: &Value) -> Option<u64> {
    match value.trimmed() {
        [b'0', b'x' | b'X', ..] => value.to_i128().and_then(|v| u64::try_from(v).ok()),
        _ => None,
    }
}

impl Leaf for f32 {
    fn read_leaf(value: &Value) -> Result<Option<Self>> {
        if value.is_blank() {
            return Ok(None);
        }
        if let Some(bits) = float_bits(value) {
            return u32::try_from(bits)
                .map(|b| Some(f32::from_bits(b)))
                .map_err(|_| invalid::<f32>(value));
        }
        value.to_f32().map(Some).ok_or_else(|| invalid::<f32>(value))
    }

    fn write_leaf(&self, flow: &mut Flow) -> Result<()> {
        flow.add_f32(*self)
    }
}

impl Leaf for f64 {
    fn read_leaf(value: &Value) -> Result<Option<Self>> {
        if value.is_blank() {
            return Ok(None);
        }
        if let Some(bits) = float_bits(value) {
            return Ok(Some(f64::from_bits(bits)));
        }
        value.to_f64().map(Some).ok_or_else(|| invalid::<f64>(value))
    }

    fn write_leaf(&self, flow: &mut Flow) -> Result<()> {
        flow.add_f64(*self)
    }
}

impl Leaf for bool {
    fn read_leaf(value: &Value) -> Result<Option<Self>> {
        if value.is_blank() {
            return Ok(None);
        }
        match value.trimmed() {
            b"1" => Ok(Some(true)),
            b"0" => Ok(Some(false)),
            _ => value.to_bool().map(Some).ok_or_else(|| invalid::<bool>(value)),
        }
    }

    fn write_leaf(&self, flow: &mut Flow) -> Result<()> {
        flow.add_bool(*self)
    }
}

impl Leaf for char {
    fn read_leaf(value: &Value) -> Result<Option<Self>> {
        Ok(value.as_str()?.chars().next())
    }

    fn write_leaf(&self, flow: &mut Flow) -> Result<()> {
        flow.add_char(*self)
    }
}

impl Leaf for String {
    fn read_leaf(value: &Value) -> Result<Option<Self>> {
        value.as_str().map(|s| Some(s.to_owned()))
    }

    fn write_leaf(&self, flow: &mut Flow) -> Result<()> {
        flow.add_text(self)
    }
}

impl Leaf for BigInt {
    fn read_leaf(value: &Value) -> Result<Option<Self>> {
        if value.is_blank() {
            return Ok(None);
        }
        let trimmed = value.trimmed();
        let (negative, rest) = match trimmed {
            [b'-', rest @ ..] => (true, rest),
            [b'+', rest @ ..] => (false, rest),
            _ => (false, trimmed),
        };
        let parsed = match rest {
            [b'0', b'x' | b'X', hex @ ..] => BigInt::parse_bytes(hex, 16),
            _ => BigInt::parse_bytes(rest, 10),
        };
        parsed
            .map(|v| Some(if negative { -v } else { v }))
            .ok_or_else(|| invalid::<BigInt>(value))
    }

    fn write_leaf(&self, flow: &mut Flow) -> Result<()> {
        flow.add_display(self)
    }
}

/// Codec for any [`Leaf`] type under a fixed tag.
pub struct ScalarCoder<T> {
    space: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Leaf> ScalarCoder<T> {
    #[must_use]
    pub fn new(space: &'static str) -> Self {
        ScalarCoder {
            space,
            _marker: PhantomData,
        }
    }
}

impl<T: Leaf> Coder for ScalarCoder<T> {
    fn space(&self) -> &str {
        self.space
    }

    fn accepts(&self, desc: &TypeDesc) -> bool {
        desc.is::<T>() || desc.is::<Data>()
    }

    fn read(&self, _ctx: &Context<'_>, value: &Value) -> Result<Option<Object>> {
        Ok(T::read_leaf(value)?.map(|v| Box::new(v) as Object))
    }

    fn write_value(&self, flow: &mut Flow, value: &dyn Encode) -> Result<()> {
        match value.as_any().downcast_ref::<T>() {
            Some(v) => v.write_leaf(flow),
            None => Err(Error::unsupported_type(type_name::<T>())),
        }
    }
}

/// Writes borrowed string literals under `s`.
struct StrCoder;

impl Coder for StrCoder {
    fn space(&self) -> &str {
        "s"
    }

    fn write_value(&self, flow: &mut Flow, value: &dyn Encode) -> Result<()> {
        match value.as_any().downcast_ref::<&'static str>() {
            Some(text) => flow.add_text(text),
            None => Err(Error::unsupported_type("&str")),
        }
    }
}

/// The untyped `$` codec.
///
/// On read it guesses the narrowest scalar: booleans, `i32`, `i64`, `f64`,
/// then text. `${...}` builds a [`Data`] map.
pub struct ObjectCoder;

impl ObjectCoder {
    fn guess(value: &Value) -> Result<Option<Object>> {
        if value.is_blank() {
            return Ok(None);
        }
        if let Some(b) = value.to_bool() {
            return Ok(Some(Box::new(b)));
        }
        if let Some(n) = value.to_i128() {
            if let Ok(v) = i32::try_from(n) {
                return Ok(Some(Box::new(v)));
            }
            if let Ok(v) = i64::try_from(n) {
                return Ok(Some(Box::new(v)));
            }
        }
        let numeric = value
            .trimmed()
            .iter()
            .all(|b| matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E'));
        if numeric {
            if let Some(f) = value.to_f64() {
                return Ok(Some(Box::new(f)));
            }
        }
        Ok(Some(Box::new(value.as_str()?.to_owned())))
    }
}

impl Coder for ObjectCoder {
    fn accepts(&self, desc: &TypeDesc) -> bool {
        desc.is::<Data>()
    }

    fn read(&self, _ctx: &Context<'_>, value: &Value) -> Result<Option<Object>> {
        Self::guess(value)
    }

    fn builder(&self, expected: Option<&TypeDesc>) -> Option<Box<dyn crate::Builder>> {
        MapCoder.builder(expected)
    }
}

/// Installs every built-in codec into `registry`.
pub fn install_defaults(registry: &Registry) {
    registry.register_space(Arc::new(ObjectCoder));
    registry.register::<String>(Arc::new(ScalarCoder::<String>::new("s")));
    registry.register::<&'static str>(Arc::new(StrCoder));
    registry.register::<bool>(Arc::new(ScalarCoder::<bool>::new("b")));
    registry.register::<char>(Arc::new(ScalarCoder::<char>::new("c")));
    registry.register::<i8>(Arc::new(ScalarCoder::<i8>::new("B")));
    registry.register::<i16>(Arc::new(ScalarCoder::<i16>::new("u")));
    registry.register::<i32>(Arc::new(ScalarCoder::<i32>::new("i")));
    registry.register::<i64>(Arc::new(ScalarCoder::<i64>::new("l")));
    registry.register::<f32>(Arc::new(ScalarCoder::<f32>::new("f")));
    registry.register::<f64>(Arc::new(ScalarCoder::<f64>::new("d")));
    registry.register::<BigInt>(Arc::new(ScalarCoder::<BigInt>::new("I")));
    // unsigned types borrow the signed tags without claiming them
    registry.register::<u8>(Arc::new(ScalarCoder::<u8>::new("i")));
    registry.register::<u16>(Arc::new(ScalarCoder::<u16>::new("i")));
    registry.register::<u32>(Arc::new(ScalarCoder::<u32>::new("l")));
    registry.register::<u64>(Arc::new(ScalarCoder::<u64>::new("l")));

    registry.register_space(Arc::new(MapCoder));
    registry.register_space(Arc::new(ListCoder));
    registry.register_space(Arc::new(SetCoder));
    registry.register_space(Arc::new(ArrayCoder));
    registry.register::<Error>(Arc::new(ErrorCoder));
}

/// Reads a leaf with a registered codec and downcasts it; used by tests and
/// hand-written builders.
///
/// # Errors
///
/// Fails when the codec rejects the payload or produces another type.
pub fn read_as<T: Any>(ctx: &Context<'_>, coder: &dyn Coder, value: &Value) -> Result<Option<T>> {
    match coder.read(ctx, value)? {
        None => Ok(None),
        Some(obj) => crate::coder::cast::<T>(obj)
            .map(Some)
            .map_err(|_| Error::malformed(format!("`{}` did not decode to {}", value, type_name::<T>()))),
    }
}
