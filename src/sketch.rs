//! Mapping descriptors for user types.
//!
//! A [`Sketch`] lists how a type is built and which members it exposes: the
//! constructor parameters, in order, and the fields with their getters and
//! setters. Each member has a primary name, optional extra aliases, an
//! expected type and optionally its own codec.
//!
//! Registering a sketch yields a [`SketchCodec`], which writes the readable
//! fields in declaration order and reads through a
//! [`SketchBuilder`](crate::builder::SketchBuilder).
//!
//! ```rust
//! use kat::{decode_with, encode_with, impl_encode, Options, Registry, Sketch, TypeDesc};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct User {
//!     id: i32,
//!     name: String,
//! }
//! impl_encode!(User);
//!
//! let registry = Registry::layered(Registry::global().clone());
//! registry.register_sketch(
//!     Sketch::new("User", User::default)
//!         .field::<i32>("id", |u| &u.id, |u, v| u.id = v)
//!         .field::<String>("name", |u| &u.name, |u, v| u.name = v),
//! );
//!
//! let user = User { id: 1, name: "kraity".into() };
//! let text = encode_with(&user, &registry, Options::new()).unwrap();
//! assert_eq!(text, "User{i:id(1)s:name(kraity)}");
//!
//! let back = decode_with(&text, &registry, &Options::new(), Some(TypeDesc::of::<User>()))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(*back.downcast::<User>().unwrap(), user);
//! ```

use crate::builder::{take_arg, Builder, SketchBuilder};
use crate::coder::cast;
use crate::{Chan, Coder, Data, Encode, Error, Framing, Object, Result, TypeDesc};
use std::any::{type_name, Any};
use std::sync::Arc;

type Getter<T> = Box<dyn (for<'a> Fn(&'a T) -> &'a dyn Encode) + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Object) -> std::result::Result<(), Object> + Send + Sync>;

pub(crate) enum Make<T> {
    Empty(Box<dyn Fn() -> T + Send + Sync>),
    Args(Box<dyn Fn(&mut Arguments<'_>) -> Result<T> + Send + Sync>),
}

/// A constructor parameter.
pub struct Param {
    names: Vec<String>,
    desc: TypeDesc,
    coder: Option<Arc<dyn Coder>>,
}

impl Param {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    #[must_use]
    pub fn desc(&self) -> &TypeDesc {
        &self.desc
    }

    #[must_use]
    pub fn coder(&self) -> Option<&Arc<dyn Coder>> {
        self.coder.as_ref()
    }

    /// Whether `name` is the primary name or one of the aliases.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// A field with an optional getter and setter.
pub struct Field<T> {
    names: Vec<String>,
    desc: TypeDesc,
    coder: Option<Arc<dyn Coder>>,
    get: Option<Getter<T>>,
    set: Option<Setter<T>>,
}

impl<T> Field<T> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    #[must_use]
    pub fn desc(&self) -> &TypeDesc {
        &self.desc
    }

    #[must_use]
    pub fn coder(&self) -> Option<&Arc<dyn Coder>> {
        self.coder.as_ref()
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.get.is_some()
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Stores `obj` into `target`; hands it back when it has another type.
    pub(crate) fn apply(&self, target: &mut T, obj: Object) -> std::result::Result<(), Object> {
        match &self.set {
            Some(set) => set(target, obj),
            None => Err(obj),
        }
    }
}

/// Constructor arguments collected from the input, indexed like the params.
pub struct Arguments<'a> {
    target: &'a str,
    params: &'a [Param],
    slots: Vec<Option<Object>>,
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(target: &'a str, params: &'a [Param], slots: Vec<Option<Object>>) -> Self {
        Arguments {
            target,
            params,
            slots,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Takes argument `index`. `None` when it was null or never supplied and
    /// has no zero value.
    ///
    /// # Errors
    ///
    /// Returns a construction error for an unknown index or a value of
    /// another type.
    pub fn take<A: Any>(&mut self, index: usize) -> Result<Option<A>> {
        let name = self
            .params
            .get(index)
            .map(Param::name)
            .ok_or_else(|| Error::construction(self.target, format!("no argument at {index}")))?;
        let slot = self.slots.get_mut(index).and_then(Option::take);
        take_arg(self.target, name, slot)
    }

    /// Like [`Arguments::take`] but a missing value is an error.
    ///
    /// # Errors
    ///
    /// Returns a construction error when the argument is absent.
    pub fn required<A: Any>(&mut self, index: usize) -> Result<A> {
        match self.take(index)? {
            Some(value) => Ok(value),
            None => Err(Error::construction(
                self.target,
                format!("missing argument `{}`", self.params[index].name()),
            )),
        }
    }
}

enum Last {
    Nothing,
    Param(usize),
    Field(usize),
}

/// Mapping descriptor for `T`.
pub struct Sketch<T> {
    space: String,
    params: Vec<Param>,
    fields: Vec<Field<T>>,
    make: Make<T>,
    last: Last,
}

fn erase<T, F>(f: F) -> F
where
    F: for<'a> Fn(&'a T) -> &'a dyn Encode,
{
    f
}

fn setter<T, V, S>(set: S) -> Setter<T>
where
    V: Any,
    S: Fn(&mut T, V) + Send + Sync + 'static,
{
    Box::new(move |target: &mut T, obj: Object| {
        let value = cast::<V>(obj)?;
        set(target, value);
        Ok(())
    })
}

impl<T: Any + Send + Sync> Sketch<T> {
    /// A type built by `make` before any member is read.
    pub fn new<F>(space: &str, make: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_make(space, Make::Empty(Box::new(make)))
    }

    /// A type built from constructor arguments. Declare the arguments with
    /// [`Sketch::param`] in constructor order.
    pub fn with_args<F>(space: &str, make: F) -> Self
    where
        F: Fn(&mut Arguments<'_>) -> Result<T> + Send + Sync + 'static,
    {
        Self::with_make(space, Make::Args(Box::new(make)))
    }

    fn with_make(space: &str, make: Make<T>) -> Self {
        Sketch {
            space: space.to_string(),
            params: Vec::new(),
            fields: Vec::new(),
            make,
            last: Last::Nothing,
        }
    }

    #[must_use]
    pub fn param<V: Any>(mut self, name: &str) -> Self {
        self.params.push(Param {
            names: vec![name.to_string()],
            desc: TypeDesc::of::<V>(),
            coder: None,
        });
        self.last = Last::Param(self.params.len() - 1);
        self
    }

    /// A read-write field.
    #[must_use]
    pub fn field<V>(
        mut self,
        name: &str,
        get: impl (Fn(&T) -> &V) + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: Encode + Any,
    {
        self.push_field::<V>(
            name,
            Some(Box::new(erase(move |t: &T| get(t) as &dyn Encode))),
            Some(setter(set)),
        );
        self
    }

    /// A field that is written but never read back.
    #[must_use]
    pub fn getter<V>(mut self, name: &str, get: impl (Fn(&T) -> &V) + Send + Sync + 'static) -> Self
    where
        V: Encode + Any,
    {
        self.push_field::<V>(
            name,
            Some(Box::new(erase(move |t: &T| get(t) as &dyn Encode))),
            None,
        );
        self
    }

    /// A field that is read but never written.
    #[must_use]
    pub fn setter<V: Any>(mut self, name: &str, set: impl Fn(&mut T, V) + Send + Sync + 'static) -> Self {
        self.push_field::<V>(name, None, Some(setter(set)));
        self
    }

    fn push_field<V: Any>(&mut self, name: &str, get: Option<Getter<T>>, set: Option<Setter<T>>) {
        self.fields.push(Field {
            names: vec![name.to_string()],
            desc: TypeDesc::of::<V>(),
            coder: None,
            get,
            set,
        });
        self.last = Last::Field(self.fields.len() - 1);
    }

    /// Adds another accepted name to the member declared last.
    #[must_use]
    pub fn alias(mut self, name: &str) -> Self {
        let name = name.to_string();
        match self.last {
            Last::Param(i) => self.params[i].names.push(name),
            Last::Field(i) => self.fields[i].names.push(name),
            Last::Nothing => tracing::warn!(space = %self.space, %name, "alias before any member"),
        }
        self
    }

    /// Pins the codec of the member declared last.
    #[must_use]
    pub fn coder(mut self, coder: Arc<dyn Coder>) -> Self {
        match self.last {
            Last::Param(i) => self.params[i].coder = Some(coder),
            Last::Field(i) => self.fields[i].coder = Some(coder),
            Last::Nothing => tracing::warn!(space = %self.space, "codec before any member"),
        }
        self
    }
}

impl<T> Sketch<T> {
    #[must_use]
    pub fn space(&self) -> &str {
        &self.space
    }

    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[must_use]
    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub(crate) fn make(&self) -> &Make<T> {
        &self.make
    }

    /// Index of the `nth` writable field.
    pub(crate) fn writable_nth(&self, nth: usize) -> Option<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_writable())
            .nth(nth)
            .map(|(i, _)| i)
    }

    pub(crate) fn writable_named(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.is_writable() && f.matches(name))
    }
}

/// Codec derived from a [`Sketch`].
pub struct SketchCodec<T> {
    sketch: Arc<Sketch<T>>,
}

impl<T: Any + Send + Sync> SketchCodec<T> {
    #[must_use]
    pub fn new(sketch: Sketch<T>) -> Self {
        SketchCodec {
            sketch: Arc::new(sketch),
        }
    }
}

impl<T: Any + Send + Sync> Coder for SketchCodec<T> {
    fn space(&self) -> &str {
        &self.sketch.space
    }

    fn framing(&self) -> Framing {
        Framing::Compound
    }

    fn accepts(&self, desc: &TypeDesc) -> bool {
        desc.is::<T>() || desc.is::<Data>()
    }

    fn builder(&self, _expected: Option<&TypeDesc>) -> Option<Box<dyn Builder>> {
        Some(Box::new(SketchBuilder::new(self.sketch.clone())))
    }

    fn write_members(&self, chan: &mut Chan<'_>, value: &dyn Encode) -> Result<()> {
        let target = value
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| Error::unsupported_type(type_name::<T>()))?;
        for field in &self.sketch.fields {
            if let Some(get) = &field.get {
                chan.set_with(Some(field.name()), field.coder.as_deref(), get(target))?;
            }
        }
        Ok(())
    }
}
