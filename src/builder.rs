//! Incremental object assembly from the token stream.
//!
//! The parser reports what it sees through [`Events`]. The [`Assembler`]
//! answers those events by keeping a stack of [`Builder`]s, one per open
//! compound, and by counting the depth of subtrees nobody asked for so they
//! can be skipped without losing track of the braces.
//!
//! [`SketchBuilder`] is the builder behind [`Sketch`]-mapped types. Targets
//! that need constructor arguments are assembled in two phases: members are
//! collected until every argument has arrived, the constructor runs once, then
//! the field values that came early are applied in arrival order.

use crate::coder::cast;
use crate::sketch::{Arguments, Make, Sketch};
use crate::{Alias, Coder, Context, Error, Object, Result, Space, TypeDesc, Value};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

/// Per-object decode state, created when a compound opens and consumed when
/// it closes.
pub trait Builder {
    fn on_open(&mut self, ctx: &Context<'_>, space: &Space, alias: Option<&Alias>) -> Result<()> {
        let _ = (ctx, space, alias);
        Ok(())
    }

    /// A leaf member.
    fn on_value(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        alias: Option<&Alias>,
        value: &Value,
    ) -> Result<()>;

    /// A nested compound. `None` makes the assembler skip the whole subtree.
    fn on_child(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        alias: Option<&Alias>,
    ) -> Result<Option<Box<dyn Builder>>>;

    /// Result of the child last returned by [`Builder::on_child`].
    fn on_child_end(&mut self, ctx: &Context<'_>, result: Option<Object>) -> Result<()>;

    fn on_close(self: Box<Self>, ctx: &Context<'_>) -> Result<Option<Object>>;
}

/// Callbacks emitted by the tokenizer.
pub trait Events {
    /// The root compound opens.
    fn compound_start(&mut self, space: &Space, alias: Option<&Alias>) -> Result<()>;
    fn member(&mut self, space: &Space, alias: Option<&Alias>, value: &Value) -> Result<()>;
    fn child_start(&mut self, space: &Space, alias: Option<&Alias>) -> Result<()>;
    fn child_end(&mut self) -> Result<()>;
    /// The root compound closes.
    fn compound_end(&mut self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Open,
    Done,
}

/// Drives builders from tokenizer events and holds the root result.
pub struct Assembler<'a> {
    ctx: Context<'a>,
    expected: Option<TypeDesc>,
    coder: Option<Arc<dyn Coder>>,
    fallback: Option<Arc<dyn Coder>>,
    stack: Vec<Box<dyn Builder>>,
    skip: usize,
    state: State,
    result: Option<Object>,
}

impl<'a> Assembler<'a> {
    #[must_use]
    pub fn new(ctx: Context<'a>, expected: Option<TypeDesc>) -> Self {
        Assembler {
            ctx,
            expected,
            coder: None,
            fallback: None,
            stack: Vec::new(),
            skip: 0,
            state: State::Idle,
            result: None,
        }
    }

    /// Decodes the root with `coder` regardless of its tag.
    #[must_use]
    pub fn with_coder(mut self, coder: Arc<dyn Coder>) -> Self {
        self.coder = Some(coder);
        self
    }

    /// Decodes the root with `coder` when its tag resolves to nothing.
    #[must_use]
    pub fn with_fallback(mut self, coder: Arc<dyn Coder>) -> Self {
        self.fallback = Some(coder);
        self
    }

    /// The root value, or `None` for empty input, null or an unresolved root.
    ///
    /// # Errors
    ///
    /// Fails when a compound is still open.
    pub fn finish(self) -> Result<Option<Object>> {
        if self.state == State::Open {
            return Err(Error::malformed("unterminated compound"));
        }
        Ok(self.result)
    }

    fn resolve_root(&self, space: &Space) -> Result<Option<Arc<dyn Coder>>> {
        Ok(self
            .ctx
            .registry
            .resolve_read(self.coder.as_ref(), self.expected.as_ref(), space.as_str()?)
            .or_else(|| self.fallback.clone()))
    }

    fn top(&mut self) -> Result<&mut Box<dyn Builder>> {
        self.stack
            .last_mut()
            .ok_or_else(|| Error::malformed("member outside of a compound"))
    }
}

impl Events for Assembler<'_> {
    fn compound_start(&mut self, space: &Space, alias: Option<&Alias>) -> Result<()> {
        if self.state != State::Idle {
            return Err(Error::malformed("more than one root value"));
        }
        self.state = State::Open;
        let builder = self
            .resolve_root(space)?
            .and_then(|coder| coder.builder(self.expected.as_ref()));
        match builder {
            Some(mut builder) => {
                builder.on_open(&self.ctx, space, alias)?;
                self.stack.push(builder);
            }
            None => {
                tracing::trace!(%space, "no builder for root compound, skipping");
                self.skip = 1;
            }
        }
        Ok(())
    }

    fn member(&mut self, space: &Space, alias: Option<&Alias>, value: &Value) -> Result<()> {
        match self.state {
            State::Idle => {
                self.state = State::Done;
                if let Some(coder) = self.resolve_root(space)? {
                    self.result = coder.read(&self.ctx, value)?;
                } else {
                    tracing::trace!(%space, "no codec for root value");
                }
                Ok(())
            }
            State::Done => Err(Error::malformed("more than one root value")),
            State::Open if self.skip > 0 => Ok(()),
            State::Open => {
                let ctx = self.ctx;
                self.top()?.on_value(&ctx, space, alias, value)
            }
        }
    }

    fn child_start(&mut self, space: &Space, alias: Option<&Alias>) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::malformed("nested compound outside of a compound"));
        }
        if self.skip > 0 {
            self.skip += 1;
            return Ok(());
        }
        let ctx = self.ctx;
        match self.top()?.on_child(&ctx, space, alias)? {
            Some(mut child) => {
                child.on_open(&ctx, space, alias)?;
                self.stack.push(child);
            }
            None => {
                tracing::trace!(%space, ?alias, "unresolved nested compound, skipping");
                self.skip = 1;
            }
        }
        Ok(())
    }

    fn child_end(&mut self) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::malformed("unbalanced compound end"));
        }
        if self.skip > 0 {
            if self.skip == 1 && self.stack.is_empty() {
                return Err(Error::malformed("unbalanced compound end"));
            }
            self.skip -= 1;
            return Ok(());
        }
        if self.stack.len() < 2 {
            return Err(Error::malformed("unbalanced compound end"));
        }
        let ctx = self.ctx;
        let child = self
            .stack
            .pop()
            .ok_or_else(|| Error::malformed("unbalanced compound end"))?;
        let result = child.on_close(&ctx)?;
        self.top()?.on_child_end(&ctx, result)
    }

    fn compound_end(&mut self) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::malformed("unbalanced compound end"));
        }
        if self.skip > 0 {
            if self.skip != 1 || !self.stack.is_empty() {
                return Err(Error::malformed("unbalanced compound end"));
            }
            self.skip = 0;
            self.state = State::Done;
            return Ok(());
        }
        if self.stack.len() != 1 {
            return Err(Error::malformed("unbalanced compound end"));
        }
        let ctx = self.ctx;
        let root = self
            .stack
            .pop()
            .ok_or_else(|| Error::malformed("unbalanced compound end"))?;
        self.result = root.on_close(&ctx)?;
        self.state = State::Done;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Param(usize),
    Field(usize),
}

/// Builder for a [`Sketch`]-mapped type.
pub struct SketchBuilder<T> {
    sketch: Arc<Sketch<T>>,
    entity: Option<T>,
    args: Vec<Option<Object>>,
    supplied: Vec<bool>,
    remaining: usize,
    queue: VecDeque<(usize, Object)>,
    index: usize,
    pending: Option<Target>,
}

impl<T: Any + Send + Sync> SketchBuilder<T> {
    #[must_use]
    pub fn new(sketch: Arc<Sketch<T>>) -> Self {
        SketchBuilder {
            sketch,
            entity: None,
            args: Vec::new(),
            supplied: Vec::new(),
            remaining: 0,
            queue: VecDeque::new(),
            index: 0,
            pending: None,
        }
    }

    /// Maps the next member onto an argument slot or a writable field.
    fn resolve(&mut self, alias: Option<&Alias>) -> Result<Option<Target>> {
        let ordinal = self.index;
        self.index += 1;
        let params = self.sketch.params();
        let constructing = self.entity.is_none();
        let target = match alias {
            None => {
                if constructing && ordinal < params.len() {
                    Some(Target::Param(ordinal))
                } else {
                    ordinal
                        .checked_sub(params.len())
                        .and_then(|nth| self.sketch.writable_nth(nth))
                        .map(Target::Field)
                }
            }
            Some(alias) if alias.is_empty() => None,
            Some(alias) => {
                let name = alias.as_str()?;
                let param = if constructing {
                    params.iter().position(|p| p.matches(name))
                } else {
                    None
                };
                match param {
                    Some(i) => Some(Target::Param(i)),
                    None => self.sketch.writable_named(name).map(Target::Field),
                }
            }
        };
        Ok(target)
    }

    fn slot(&self, target: Target) -> (Option<&Arc<dyn Coder>>, &TypeDesc) {
        match target {
            Target::Param(i) => {
                let param = &self.sketch.params()[i];
                (param.coder(), param.desc())
            }
            Target::Field(i) => {
                let field = &self.sketch.fields()[i];
                (field.coder(), field.desc())
            }
        }
    }

    fn resolve_coder(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        alias: Option<&Alias>,
    ) -> Result<Option<(Target, Arc<dyn Coder>, TypeDesc)>> {
        let Some(target) = self.resolve(alias)? else {
            tracing::trace!(sketch = self.sketch.space(), ?alias, "unknown member, skipping");
            return Ok(None);
        };
        let (explicit, desc) = self.slot(target);
        let desc = *desc;
        match ctx.registry.resolve_read(explicit, Some(&desc), space.as_str()?) {
            Some(coder) => Ok(Some((target, coder, desc))),
            None => {
                tracing::trace!(sketch = self.sketch.space(), %space, ?alias, "no codec for member, skipping");
                Ok(None)
            }
        }
    }

    fn accept(&mut self, target: Target, obj: Option<Object>) -> Result<()> {
        match target {
            Target::Param(i) => {
                if self.supplied[i] {
                    tracing::trace!(sketch = self.sketch.space(), param = i, "argument already supplied");
                    return Ok(());
                }
                self.args[i] = obj;
                self.supplied[i] = true;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.construct()?;
                }
            }
            Target::Field(i) => {
                let Some(obj) = obj else {
                    return Ok(());
                };
                if self.entity.is_some() {
                    self.apply(i, obj);
                } else {
                    self.queue.push_back((i, obj));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, field: usize, obj: Object) {
        let Some(entity) = self.entity.as_mut() else {
            return;
        };
        if self.sketch.fields()[field].apply(entity, obj).is_err() {
            tracing::trace!(
                sketch = self.sketch.space(),
                field = self.sketch.fields()[field].name(),
                "value of another type, dropping"
            );
        }
    }

    fn construct(&mut self) -> Result<()> {
        let target = self.sketch.space();
        let entity = match self.sketch.make() {
            Make::Empty(make) => make(),
            Make::Args(make) => {
                let slots = std::mem::take(&mut self.args);
                let mut arguments = Arguments::new(target, self.sketch.params(), slots);
                make(&mut arguments).map_err(|err| {
                    if err.is_construction() {
                        err
                    } else {
                        Error::construction(target, err)
                    }
                })?
            }
        };
        tracing::debug!(sketch = target, queued = self.queue.len(), "constructed");
        self.entity = Some(entity);
        while let Some((field, obj)) = self.queue.pop_front() {
            self.apply(field, obj);
        }
        Ok(())
    }
}

impl<T: Any + Send + Sync> Builder for SketchBuilder<T> {
    fn on_open(&mut self, _ctx: &Context<'_>, _space: &Space, _alias: Option<&Alias>) -> Result<()> {
        if let Make::Empty(make) = self.sketch.make() {
            self.entity = Some(make());
            return Ok(());
        }
        let count = self.sketch.params().len();
        self.args = (0..count).map(|_| None).collect();
        self.supplied = vec![false; count];
        self.remaining = count;
        if count == 0 {
            self.construct()?;
        }
        Ok(())
    }

    fn on_value(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        alias: Option<&Alias>,
        value: &Value,
    ) -> Result<()> {
        if let Some((target, coder, _)) = self.resolve_coder(ctx, space, alias)? {
            let obj = coder.read(ctx, value)?;
            self.accept(target, obj)?;
        }
        Ok(())
    }

    fn on_child(
        &mut self,
        ctx: &Context<'_>,
        space: &Space,
        alias: Option<&Alias>,
    ) -> Result<Option<Box<dyn Builder>>> {
        let Some((target, coder, desc)) = self.resolve_coder(ctx, space, alias)? else {
            return Ok(None);
        };
        let child = coder.builder(Some(&desc));
        if child.is_some() {
            self.pending = Some(target);
        }
        Ok(child)
    }

    fn on_child_end(&mut self, _ctx: &Context<'_>, result: Option<Object>) -> Result<()> {
        match self.pending.take() {
            Some(target) => self.accept(target, result),
            None => Err(Error::malformed("nested result without a pending member")),
        }
    }

    fn on_close(mut self: Box<Self>, _ctx: &Context<'_>) -> Result<Option<Object>> {
        if self.entity.is_none() {
            let params = self.sketch.clone();
            for (i, param) in params.params().iter().enumerate() {
                if !self.supplied[i] {
                    self.args[i] = param.desc().zero();
                }
            }
            self.construct()?;
        }
        match self.entity.take() {
            Some(entity) => Ok(Some(Box::new(entity))),
            None => Ok(None),
        }
    }
}

/// Reads a constructor argument, converting through [`cast`].
pub(crate) fn take_arg<A: Any>(target: &str, name: &str, slot: Option<Object>) -> Result<Option<A>> {
    match slot.map(cast::<A>) {
        None => Ok(None),
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(_)) => Err(Error::construction(
            target,
            format!("argument `{name}` is not a {}", std::any::type_name::<A>()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Options, Registry};

    fn space(s: &str) -> Space {
        Space::from(s)
    }

    fn alias(s: &str) -> Alias {
        Alias::from(s)
    }

    #[test]
    fn test_root_leaf() {
        let registry = Registry::with_defaults();
        let options = Options::new();
        let mut asm = Assembler::new(Context::new(&registry, &options), Some(TypeDesc::of::<i32>()));
        asm.member(&space("i"), None, &Value::from("42")).unwrap();
        let out = asm.finish().unwrap().unwrap();
        assert_eq!(*out.downcast::<i32>().unwrap(), 42);
    }

    #[test]
    fn test_skipped_root_keeps_balance() {
        let registry = Registry::with_defaults();
        let options = Options::new();
        let mut asm = Assembler::new(Context::new(&registry, &options), Some(TypeDesc::of::<i32>()));
        asm.compound_start(&space("Nope"), None).unwrap();
        asm.child_start(&space("M"), Some(&alias("x"))).unwrap();
        asm.member(&space("i"), None, &Value::from("1")).unwrap();
        asm.child_end().unwrap();
        asm.compound_end().unwrap();
        assert!(asm.finish().unwrap().is_none());
    }

    #[test]
    fn test_order_violations() {
        let registry = Registry::with_defaults();
        let options = Options::new();
        let ctx = Context::new(&registry, &options);

        let mut asm = Assembler::new(ctx, None);
        assert!(asm.child_end().unwrap_err().is_malformed());

        let mut asm = Assembler::new(ctx, None);
        asm.compound_start(&space("M"), None).unwrap();
        assert!(asm.child_end().unwrap_err().is_malformed());

        let mut asm = Assembler::new(ctx, None);
        asm.compound_start(&space("M"), None).unwrap();
        assert!(asm.finish().unwrap_err().is_malformed());

        let mut asm = Assembler::new(ctx, None);
        asm.member(&space("i"), None, &Value::from("1")).unwrap();
        assert!(asm
            .member(&space("i"), None, &Value::from("2"))
            .unwrap_err()
            .is_malformed());
    }
}
