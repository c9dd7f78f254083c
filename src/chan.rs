//! Value-level writer.
//!
//! [`Chan`] turns values into tokens. For each value it picks a codec (see
//! [`Chan::set_with`] for the order), writes the tag and alias, then lets the
//! codec fill either the scalar payload or the compound members.
//!
//! ```rust
//! use kat::{Chan, Options, Registry};
//!
//! let mut chan = Chan::new(Registry::global(), Options::new());
//! chan.set_entry(None, Some("Story"), |chan| {
//!     chan.set(Some("id"), &100001)?;
//!     chan.set(Some("title"), &"KAT+")?;
//!     chan.set_entry(Some("meta"), None, |chan| {
//!         chan.set(Some("view"), &99)?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! assert_eq!(
//!     chan.finish().unwrap(),
//!     "Story{i:id(100001)s:title(KAT+)M:meta{i:view(99)}}"
//! );
//! ```

use crate::codecs::structural::{ArrayCoder, ListCoder, MapCoder, SetCoder};
use crate::{Coder, Encode, Flow, Framing, Options, Registry, Result, Shape};
use std::sync::Arc;

/// Writer resolving codecs for each value against a [`Registry`].
pub struct Chan<'r> {
    flow: Flow,
    registry: &'r Registry,
}

impl<'r> Chan<'r> {
    /// Creates a writer over a fresh pooled buffer.
    #[must_use]
    pub fn new(registry: &'r Registry, options: Options) -> Self {
        Chan {
            flow: Flow::new(options),
            registry,
        }
    }

    /// Creates a writer continuing an existing [`Flow`].
    #[must_use]
    pub fn with_flow(registry: &'r Registry, flow: Flow) -> Self {
        Chan { flow, registry }
    }

    pub fn flow(&mut self) -> &mut Flow {
        &mut self.flow
    }

    #[must_use]
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        self.flow.options()
    }

    /// Writes `value` under `alias`. Returns `false` when nothing could encode it.
    ///
    /// # Errors
    ///
    /// Propagates codec and buffer failures.
    pub fn set(&mut self, alias: Option<&str>, value: &dyn Encode) -> Result<bool> {
        self.set_with(alias, None, value)
    }

    /// Writes `value` with an optional explicit codec.
    ///
    /// Resolution order: null values, the explicit codec, the codec bound to
    /// the value's type, the value's own wire form, enums, arrays, then maps,
    /// lists and sets. Values matching none of these are skipped with `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Propagates codec and buffer failures.
    pub fn set_with(
        &mut self,
        alias: Option<&str>,
        coder: Option<&dyn Coder>,
        value: &dyn Encode,
    ) -> Result<bool> {
        if value.is_null() {
            self.set_null(alias)?;
            return Ok(true);
        }
        if let Some(coder) = coder {
            self.emit(coder.space(), alias, coder, value)?;
            return Ok(true);
        }
        if let Some(coder) = self.registry.by_type(value.as_any().type_id()) {
            self.emit(coder.space(), alias, coder.as_ref(), value)?;
            return Ok(true);
        }
        match value.shape() {
            Shape::Kat(kat) => {
                self.flow.add_space(kat.space())?;
                self.flow.add_alias(alias)?;
                match kat.framing() {
                    Framing::Scalar => {
                        self.flow.open_scalar()?;
                        kat.write_value(&mut self.flow)?;
                        self.flow.close_scalar()?;
                    }
                    Framing::Compound => {
                        self.flow.open_compound()?;
                        kat.write_members(self)?;
                        self.flow.close_compound()?;
                    }
                }
            }
            Shape::Enum(repr) => {
                self.flow.add_space(repr.space)?;
                self.flow.add_alias(alias)?;
                self.flow.open_scalar()?;
                if self.flow.options().enum_as_index {
                    self.flow.add_display(repr.ordinal)?;
                } else {
                    self.flow.add_text(repr.name)?;
                }
                self.flow.close_scalar()?;
            }
            Shape::Array(_) => self.emit_structural(alias, &ArrayCoder, value)?,
            Shape::Map(_) => self.emit_structural(alias, &MapCoder, value)?,
            Shape::List(_) => self.emit_structural(alias, &ListCoder, value)?,
            Shape::Set(_) => self.emit_structural(alias, &SetCoder, value)?,
            Shape::Opaque => {
                tracing::trace!(?alias, "no codec for value, skipping");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Structural values go through the registered tag codec when it was
    /// overridden, else the built-in one.
    fn emit_structural(
        &mut self,
        alias: Option<&str>,
        builtin: &dyn Coder,
        value: &dyn Encode,
    ) -> Result<()> {
        match self.registry.by_space(builtin.space()) {
            Some(coder) => self.emit(builtin.space(), alias, coder.as_ref(), value),
            None => self.emit(builtin.space(), alias, builtin, value),
        }
    }

    /// Writes `space:alias` and the codec's payload.
    ///
    /// # Errors
    ///
    /// Propagates codec and buffer failures.
    pub fn emit(
        &mut self,
        space: &str,
        alias: Option<&str>,
        coder: &dyn Coder,
        value: &dyn Encode,
    ) -> Result<()> {
        self.flow.add_space(space)?;
        self.flow.add_alias(alias)?;
        match coder.framing() {
            Framing::Scalar => {
                self.flow.open_scalar()?;
                coder.write_value(&mut self.flow, value)?;
                self.flow.close_scalar()
            }
            Framing::Compound => {
                self.flow.open_compound()?;
                coder.write_members(self, value)?;
                self.flow.close_compound()
            }
        }
    }

    /// Writes `$:alias()`.
    pub fn set_null(&mut self, alias: Option<&str>) -> Result<()> {
        self.flow.add_space("$")?;
        self.flow.add_alias(alias)?;
        self.flow.open_scalar()?;
        self.flow.close_scalar()
    }

    /// Writes a compound whose members come from `members`. The tag defaults to `M`.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error as well as buffer failures.
    pub fn set_entry<F>(&mut self, alias: Option<&str>, space: Option<&str>, members: F) -> Result<()>
    where
        F: FnOnce(&mut Chan<'r>) -> Result<()>,
    {
        self.flow.add_space(space.unwrap_or("M"))?;
        self.flow.add_alias(alias)?;
        self.flow.open_compound()?;
        members(self)?;
        self.flow.close_compound()
    }

    /// Writes `value` with a shared codec handle.
    ///
    /// # Errors
    ///
    /// Propagates codec and buffer failures.
    pub fn set_coded(&mut self, alias: Option<&str>, coder: &Arc<dyn Coder>, value: &dyn Encode) -> Result<bool> {
        self.set_with(alias, Some(coder.as_ref()), value)
    }

    /// Ends writing and returns the text.
    ///
    /// # Errors
    ///
    /// See [`Flow::finish`].
    pub fn finish(self) -> Result<String> {
        self.flow.finish()
    }

    #[must_use]
    pub fn into_flow(self) -> Flow {
        self.flow
    }
}
