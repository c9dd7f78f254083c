//! The `E` codec: errors as compounds.
//!
//! Every error writes its numeric [`Error::code`] under `c` and its message
//! under `m`. Variants with structured fields add them as extra members so a
//! decoded error displays exactly like the one written.
//!
//! ```rust
//! use kat::{encode, Error};
//!
//! let err = Error::malformed("dangling escape");
//! assert_eq!(encode(&err).unwrap(), "E{i:c(3)s:m(dangling escape)}");
//! ```

use crate::builder::Builder;
use crate::{
    Alias, Chan, Coder, Context, Encode, Error, Framing, Object, Result, Space, TypeDesc, Value,
};
use std::any::Any;

/// Codec for [`Error`] under `E`.
pub struct ErrorCoder;

impl Coder for ErrorCoder {
    fn space(&self) -> &str {
        "E"
    }

    fn framing(&self) -> Framing {
        Framing::Compound
    }

    fn accepts(&self, desc: &TypeDesc) -> bool {
        desc.is::<Error>()
    }

    fn builder(&self, _expected: Option<&TypeDesc>) -> Option<Box<dyn Builder>> {
        Some(Box::<ErrorBuilder>::default())
    }

    fn write_members(&self, chan: &mut Chan<'_>, value: &dyn Encode) -> Result<()> {
        let Some(err) = value.as_any().downcast_ref::<Error>() else {
            return Err(Error::unsupported_type("value is not an error"));
        };
        chan.set(Some("c"), &err.code())?;
        match err {
            Error::Syntax { line, col, msg } => {
                chan.set(Some("m"), msg)?;
                chan.set(Some("line"), &(*line as u64))?;
                chan.set(Some("col"), &(*col as u64))?;
            }
            Error::Construction { target, msg } => {
                chan.set(Some("m"), msg)?;
                chan.set(Some("target"), target)?;
            }
            Error::ResourceLimit { requested, limit } => {
                chan.set(Some("m"), &err.to_string())?;
                chan.set(Some("requested"), &(*requested as u64))?;
                chan.set(Some("limit"), &(*limit as u64))?;
            }
            Error::Io(msg)
            | Error::Malformed(msg)
            | Error::UnsupportedType(msg)
            | Error::Config(msg)
            | Error::Custom(msg) => {
                chan.set(Some("m"), msg)?;
            }
        }
        Ok(())
    }
}

impl Encode for Error {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct ErrorBuilder {
    code: i32,
    message: String,
    target: String,
    line: usize,
    col: usize,
    requested: usize,
    limit: usize,
}

fn size(value: &Value) -> usize {
    value
        .to_i128()
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or_default()
}

impl Builder for ErrorBuilder {
    fn on_value(
        &mut self,
        _ctx: &Context<'_>,
        _space: &Space,
        alias: Option<&Alias>,
        value: &Value,
    ) -> Result<()> {
        let Some(alias) = alias else {
            return Ok(());
        };
        match alias.as_str()? {
            "c" => self.code = value.to_i32().unwrap_or_default(),
            "m" => self.message = value.as_str()?.to_owned(),
            "target" => self.target = value.as_str()?.to_owned(),
            "line" => self.line = size(value),
            "col" => self.col = size(value),
            "requested" => self.requested = size(value),
            "limit" => self.limit = size(value),
            other => tracing::trace!(alias = other, "unknown error member, skipping"),
        }
        Ok(())
    }

    fn on_child(
        &mut self,
        _ctx: &Context<'_>,
        _space: &Space,
        _alias: Option<&Alias>,
    ) -> Result<Option<Box<dyn Builder>>> {
        Ok(None)
    }

    fn on_child_end(&mut self, _ctx: &Context<'_>, _result: Option<Object>) -> Result<()> {
        Ok(())
    }

    fn on_close(self: Box<Self>, _ctx: &Context<'_>) -> Result<Option<Object>> {
        let b = *self;
        let err = match b.code {
            1 => Error::Io(b.message),
            2 => Error::Syntax {
                line: b.line,
                col: b.col,
                msg: b.message,
            },
            3 => Error::Malformed(b.message),
            4 => Error::Construction {
                target: b.target,
                msg: b.message,
            },
            5 => Error::ResourceLimit {
                requested: b.requested,
                limit: b.limit,
            },
            6 => Error::UnsupportedType(b.message),
            7 => Error::Config(b.message),
            _ => Error::Custom(b.message),
        };
        Ok(Some(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode};

    fn roundtrip(err: &Error) -> Error {
        let text = encode(err).unwrap();
        decode::<Error>(&text).unwrap().unwrap()
    }

    #[test]
    fn test_error_roundtrip() {
        let cases = [
            Error::io("disk full"),
            Error::syntax(3, 7, "unexpected `)`"),
            Error::malformed("dangling escape"),
            Error::construction("Point", "x must not be negative"),
            Error::resource_limit(20480, 16384),
            Error::unsupported_type("Unknown"),
            Error::config("pool scale must be greater than zero"),
            Error::custom("(nested) ^caret"),
        ];
        for err in &cases {
            let back = roundtrip(err);
            assert_eq!(back.code(), err.code(), "{err}");
            assert_eq!(back.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_error_wire_form() {
        assert_eq!(
            encode(&Error::construction("Art", "missing tag")).unwrap(),
            "E{i:c(4)s:m(missing tag)s:target(Art)}"
        );
        assert_eq!(
            encode(&Error::syntax(1, 2, "x")).unwrap(),
            "E{i:c(2)s:m(x)l:line(1)l:col(2)}"
        );
    }

    #[test]
    fn test_unknown_code_reads_as_custom() {
        let err = decode::<Error>("E{i:c(99)s:m(odd)s:extra(1)}").unwrap().unwrap();
        assert!(matches!(err, Error::Custom(ref m) if m == "odd"));
    }
}
