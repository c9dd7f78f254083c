use crate::{Coder, Context, Data, Encode, Error, Flow, Object, Result, TypeDesc, Value};
use std::any::{type_name, Any};

/// Codec for a closed set of values, read by name or by ordinal.
///
/// ```rust
/// use kat::codecs::EnumCodec;
/// use kat::{decode_with, Options, Registry, TypeDesc};
/// use std::sync::Arc;
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// enum Role { Guest, Admin }
///
/// let registry = Registry::layered(Registry::global().clone());
/// registry.register::<Role>(Arc::new(EnumCodec::new("Role", vec![("Guest", Role::Guest), ("Admin", Role::Admin)])));
///
/// let expected = TypeDesc::of::<Role>();
/// let role = decode_with("Role(Admin)", &registry, &Options::new(), Some(expected)).unwrap().unwrap();
/// assert_eq!(*role.downcast::<Role>().unwrap(), Role::Admin);
/// let role = decode_with("Role(0)", &registry, &Options::new(), Some(expected)).unwrap().unwrap();
/// assert_eq!(*role.downcast::<Role>().unwrap(), Role::Guest);
/// ```
pub struct EnumCodec<T> {
    space: &'static str,
    variants: Vec<(&'static str, T)>,
}

impl<T> EnumCodec<T>
where
    T: Clone + PartialEq + Any + Send + Sync,
{
    #[must_use]
    pub fn new(space: &'static str, variants: Vec<(&'static str, T)>) -> Self {
        EnumCodec { space, variants }
    }

    fn position(&self, value: &T) -> Option<usize> {
        self.variants.iter().position(|(_, v)| v == value)
    }
}

impl<T> Coder for EnumCodec<T>
where
    T: Clone + PartialEq + Any + Send + Sync,
{
    fn space(&self) -> &str {
        self.space
    }

    fn accepts(&self, desc: &TypeDesc) -> bool {
        desc.is::<T>() || desc.is::<Data>()
    }

    fn read(&self, _ctx: &Context<'_>, value: &Value) -> Result<Option<Object>> {
        if value.is_blank() {
            return Ok(None);
        }
        let found = if value.trimmed().iter().all(u8::is_ascii_digit) {
            value
                .to_i64()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| self.variants.get(i))
        } else {
            let name = value.trimmed();
            self.variants.iter().find(|(n, _)| n.as_bytes() == name)
        };
        match found {
            Some((_, v)) => Ok(Some(Box::new(v.clone()))),
            None => {
                tracing::trace!(space = self.space, %value, "unknown enum constant");
                Ok(None)
            }
        }
    }

    fn write_value(&self, flow: &mut Flow, value: &dyn Encode) -> Result<()> {
        let index = value
            .as_any()
            .downcast_ref::<T>()
            .and_then(|v| self.position(v))
            .ok_or_else(|| Error::unsupported_type(type_name::<T>()))?;
        if flow.options().enum_as_index {
            flow.add_display(index)
        } else {
            flow.add_text(self.variants[index].0)
        }
    }
}
