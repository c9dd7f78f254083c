//! Type and tag indexed codec registry.
//!
//! A [`Registry`] answers two questions: which codec writes a value of a given
//! runtime type, and which codec reads a member given its declared type and
//! its tag. Lookups that miss fall back to an optional parent registry, so a
//! caller can layer private codecs over [`Registry::global`] without touching it.
//!
//! ```rust
//! use kat::{codecs::ScalarCoder, Coder, Registry, TypeDesc};
//! use std::sync::Arc;
//!
//! let registry = Registry::layered(Registry::global().clone());
//! registry.register::<u16>(Arc::new(ScalarCoder::<u16>::new("U")));
//!
//! let coder = registry.resolve_read(None, Some(&TypeDesc::of::<u16>()), "i").unwrap();
//! assert_eq!(coder.space(), "U");
//! ```

use crate::codecs;
use crate::sketch::{Sketch, SketchCodec};
use crate::{Coder, TypeDesc};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

/// Codec lookup tables guarded by reader-writer locks.
pub struct Registry {
    types: RwLock<HashMap<TypeId, Arc<dyn Coder>>>,
    spaces: RwLock<HashMap<String, Arc<dyn Coder>>>,
    parent: Option<Arc<Registry>>,
}

impl Registry {
    /// Creates an empty registry with no fallback.
    #[must_use]
    pub fn new() -> Self {
        Registry {
            types: RwLock::new(HashMap::new()),
            spaces: RwLock::new(HashMap::new()),
            parent: None,
        }
    }

    /// Creates an empty registry that defers to `parent` on a miss.
    #[must_use]
    pub fn layered(parent: Arc<Registry>) -> Self {
        Registry {
            parent: Some(parent),
            ..Registry::new()
        }
    }

    /// Creates a registry holding the built-in codecs.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Registry::new();
        codecs::install_defaults(&registry);
        registry
    }

    /// The process-wide registry, built with the defaults on first use.
    pub fn global() -> &'static Arc<Registry> {
        GLOBAL.get_or_init(|| Arc::new(Registry::with_defaults()))
    }

    /// Binds `coder` to `T`, replacing any previous binding for that type.
    ///
    /// The coder's tag is claimed only if no other codec owns it yet, so the
    /// first codec registered for a tag keeps reading it.
    pub fn register<T: Any>(&self, coder: Arc<dyn Coder>) {
        self.register_type(TypeId::of::<T>(), std::any::type_name::<T>(), coder);
    }

    pub(crate) fn register_type(&self, id: TypeId, name: &str, coder: Arc<dyn Coder>) {
        let space = coder.space().to_string();
        tracing::debug!(type_name = name, %space, "registering codec");
        self.spaces
            .write()
            .entry(space)
            .or_insert_with(|| coder.clone());
        self.types.write().insert(id, coder);
    }

    /// Binds `coder` to its tag only, replacing the previous owner of the tag.
    pub fn register_space(&self, coder: Arc<dyn Coder>) {
        let space = coder.space().to_string();
        tracing::debug!(%space, "registering tag codec");
        self.spaces.write().insert(space, coder);
    }

    /// Registers the codec derived from a mapping descriptor under both its
    /// type and its tag.
    pub fn register_sketch<T: Any + Send + Sync>(&self, sketch: Sketch<T>) -> Arc<dyn Coder> {
        let coder: Arc<dyn Coder> = Arc::new(SketchCodec::new(sketch));
        self.register_space(coder.clone());
        self.types.write().insert(TypeId::of::<T>(), coder.clone());
        coder
    }

    /// Codec bound to exactly this type.
    #[must_use]
    pub fn by_type(&self, id: TypeId) -> Option<Arc<dyn Coder>> {
        if let Some(coder) = self.types.read().get(&id) {
            return Some(coder.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.by_type(id))
    }

    /// Codec owning a tag.
    #[must_use]
    pub fn by_space(&self, space: &str) -> Option<Arc<dyn Coder>> {
        if let Some(coder) = self.spaces.read().get(space) {
            return Some(coder.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.by_space(space))
    }

    /// Picks the codec for an incoming member.
    ///
    /// An explicit codec wins, then one bound to the expected type, then the
    /// tag's codec if it accepts the expected type. `None` means the member
    /// is skipped.
    #[must_use]
    pub fn resolve_read(
        &self,
        explicit: Option<&Arc<dyn Coder>>,
        expected: Option<&TypeDesc>,
        space: &str,
    ) -> Option<Arc<dyn Coder>> {
        if let Some(coder) = explicit {
            return Some(coder.clone());
        }
        if let Some(desc) = expected {
            if let Some(coder) = self.by_type(desc.id()) {
                return Some(coder);
            }
        }
        let coder = self.by_space(space)?;
        match expected {
            Some(desc) if !coder.accepts(desc) => {
                tracing::trace!(%space, expected = desc.name(), "tag codec rejects expected type");
                None
            }
            _ => Some(coder),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut spaces: Vec<String> = self.spaces.read().keys().cloned().collect();
        spaces.sort();
        f.debug_struct("Registry")
            .field("types", &self.types.read().len())
            .field("spaces", &spaces)
            .field("layered", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::ScalarCoder;
    use crate::{Data, Framing};

    struct Tagged(&'static str);

    impl Coder for Tagged {
        fn space(&self) -> &str {
            self.0
        }

        fn accepts(&self, desc: &TypeDesc) -> bool {
            desc.is::<String>()
        }
    }

    #[test]
    fn test_defaults_present() {
        let registry = Registry::with_defaults();
        for space in ["$", "s", "b", "i", "l", "f", "d", "c", "B", "u", "I", "M", "L", "S", "A"] {
            assert!(registry.by_space(space).is_some(), "missing {space}");
        }
        assert_eq!(registry.by_type(TypeId::of::<i32>()).unwrap().space(), "i");
        assert_eq!(registry.by_type(TypeId::of::<u32>()).unwrap().space(), "l");
        assert_eq!(registry.by_space("M").unwrap().framing(), Framing::Compound);
    }

    #[test]
    fn test_priority_explicit_type_tag() {
        let registry = Registry::with_defaults();
        let explicit: Arc<dyn Coder> = Arc::new(Tagged("X"));
        let i32_desc = TypeDesc::of::<i32>();

        let coder = registry.resolve_read(Some(&explicit), Some(&i32_desc), "s").unwrap();
        assert_eq!(coder.space(), "X");

        let coder = registry.resolve_read(None, Some(&i32_desc), "s").unwrap();
        assert_eq!(coder.space(), "i");

        let coder = registry.resolve_read(None, None, "s").unwrap();
        assert_eq!(coder.space(), "s");
    }

    #[test]
    fn test_tag_must_accept_expected() {
        let registry = Registry::new();
        registry.register_space(Arc::new(Tagged("T")));
        let string = TypeDesc::of::<String>();
        let float = TypeDesc::of::<f64>();
        assert!(registry.resolve_read(None, Some(&string), "T").is_some());
        assert!(registry.resolve_read(None, Some(&float), "T").is_none());
        assert!(registry.resolve_read(None, None, "unknown").is_none());
    }

    #[test]
    fn test_first_tag_owner_wins() {
        let registry = Registry::new();
        registry.register::<i32>(Arc::new(ScalarCoder::<i32>::new("n")));
        registry.register::<i64>(Arc::new(ScalarCoder::<i64>::new("n")));
        assert!(registry.by_space("n").unwrap().accepts(&TypeDesc::of::<i32>()));
        assert!(!registry.by_space("n").unwrap().accepts(&TypeDesc::of::<i64>()));

        registry.register_space(Arc::new(ScalarCoder::<i64>::new("n")));
        assert!(registry.by_space("n").unwrap().accepts(&TypeDesc::of::<i64>()));
    }

    #[test]
    fn test_layered_fallback() {
        let parent = Arc::new(Registry::with_defaults());
        let child = Registry::layered(parent.clone());
        child.register::<i32>(Arc::new(Tagged("Z")));

        assert_eq!(child.by_type(TypeId::of::<i32>()).unwrap().space(), "Z");
        assert_eq!(parent.by_type(TypeId::of::<i32>()).unwrap().space(), "i");
        assert_eq!(child.by_space("s").unwrap().space(), "s");
        assert!(child.by_space("Z").is_some());
        assert!(child.by_type(TypeId::of::<Data>()).is_none());
    }
}
