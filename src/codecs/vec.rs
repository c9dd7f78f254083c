use crate::builder::Builder;
use crate::coder::cast;
use crate::{
    Alias, Chan, Coder, Context, Data, Encode, Error, Framing, Object, Result, Space, TypeDesc,
    Value,
};
use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

/// `L{...}` codec for `Vec<T>` with a known element type.
///
/// Each element resolves against `T` first, so untagged or loosely tagged
/// elements still land in the vector. Elements that resolve to nothing are
/// dropped.
pub struct VecCodec<T> {
    item: Option<Arc<dyn Coder>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Encode + Any + Send + Sync> VecCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        VecCodec {
            item: None,
            _marker: PhantomData,
        }
    }

    /// Uses `coder` for every element instead of the registry.
    #[must_use]
    pub fn with_item(coder: Arc<dyn Coder>) -> Self {
        VecCodec {
            item: Some(coder),
            _marker: PhantomData,
        }
    }
}

impl<T: Encode + Any + Send + Sync> Default for VecCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Encode + Any + Send + Sync> Coder for VecCodec<T> {
    fn space(&self) -> &str {
        "L"
    }

    fn framing(&self) -> Framing {
        Framing::Compound
    }

    fn accepts(&self, desc: &TypeDesc) -> bool {
        desc.is::<Vec<T>>() || desc.is::<Data>()
    }

    fn builder(&self, _expected: Option<&TypeDesc>) -> Option<Box<dyn Builder>> {
        Some(Box::new(VecBuilder::<T> {
            item: self.item.clone(),
            desc: TypeDesc::of::<T>(),
            items: Vec::new(),
        }))
    }

    fn write_members(&self, chan: &mut Chan<'_>, value: &dyn Encode) -> Result<()> {
        let items = value
            .as_any()
            .downcast_ref::<Vec<T>>()
            .ok_or_else(|| Error::unsupported_type(type_name::<Vec<T>>()))?;
        for item in items {
            chan.set_with(None, self.item.as_deref(), item)?;
        }
        Ok(())
    }
}

struct VecBuilder<T> {
    item: Option<Arc<dyn Coder>>,
    desc: TypeDesc,
    items: Vec<T>,
}

impl<T: Any + Send + Sync> VecBuilder<T> {
    fn push(&mut self, obj: Option<Object>) {
        match obj.map(cast::<T>) {
            Some(Ok(item)) => self.items.push(item),
            Some(Err(_)) => tracing::trace!(item = type_name::<T>(), "element of another type, dropping"),
            None => {}
        }
    }
}

impl<T: Any + Send + Sync> Builder for VecBuilder<T> {
    fn on_value(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        _alias: Option<&Alias>,
        value: &Value,
    ) -> Result<()> {
        if let Some(coder) = ctx
            .registry
            .resolve_read(self.item.as_ref(), Some(&self.desc), space.as_str()?)
        {
            let obj = coder.read(ctx, value)?;
            self.push(obj);
        }
        Ok(())
    }

    fn on_child(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        _alias: Option<&Alias>,
    ) -> Result<Option<Box<dyn Builder>>> {
        Ok(ctx
            .registry
            .resolve_read(self.item.as_ref(), Some(&self.desc), space.as_str()?)
            .and_then(|coder| coder.builder(Some(&self.desc))))
    }

    fn on_child_end(&mut self, _ctx: &Context<'_>, result: Option<Object>) -> Result<()> {
        self.push(result);
        Ok(())
    }

    fn on_close(self: Box<Self>, _ctx: &Context<'_>) -> Result<Option<Object>> {
        Ok(Some(Box::new(self.items)))
    }
}
