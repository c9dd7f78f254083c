//! Configuration for Kat writers and the buffer pool.
//!
//! - [`Options`]: per-operation writer flags (pretty printing, enum style, float bits, balance checks)
//! - [`PoolConfig`]: size classes and hard limit of the process-wide [`BufferPool`](crate::BufferPool)
//!
//! ## Examples
//!
//! ```rust
//! use kat::{encode_with, Options, Registry};
//!
//! let options = Options::new().with_balance_check(true);
//! let text = encode_with(&vec![1, 2], Registry::global(), options).unwrap();
//! assert_eq!(text, "L{i(1)i(2)}");
//! ```

use crate::{Error, Result};

/// Writer flags.
///
/// # Examples
///
/// ```rust
/// use kat::Options;
///
/// // Compact output, enums written by name
/// let options = Options::new();
/// assert!(!options.pretty);
///
/// // Two-space indentation per nesting level
/// let options = Options::pretty().with_enum_as_index(true);
/// assert!(options.pretty && options.enum_as_index);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    /// Break members onto their own lines and indent nested compounds.
    pub pretty: bool,
    /// Write enum values as their ordinal instead of their name.
    pub enum_as_index: bool,
    /// Track open delimiters and reject unbalanced output.
    pub balance_check: bool,
    /// Write `f` and `d` values as the hex of their IEEE bits.
    pub float_as_bitmap: bool,
}

impl Options {
    /// Creates default options (compact, enums by name, no balance tracking).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options for pretty-printed output.
    #[must_use]
    pub fn pretty() -> Self {
        Options {
            pretty: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    #[must_use]
    pub fn with_enum_as_index(mut self, enum_as_index: bool) -> Self {
        self.enum_as_index = enum_as_index;
        self
    }

    /// Enables the debug mode that verifies every `open` has a matching `close`.
    #[must_use]
    pub fn with_balance_check(mut self, balance_check: bool) -> Self {
        self.balance_check = balance_check;
        self
    }

    /// Writes floats as `0x` and their raw bits, which read back without rounding.
    #[must_use]
    pub fn with_float_as_bitmap(mut self, float_as_bitmap: bool) -> Self {
        self.float_as_bitmap = float_as_bitmap;
        self
    }
}

/// Size-class layout of a [`BufferPool`](crate::BufferPool).
///
/// A buffer of `n` bytes belongs to class `n / scale`. Classes below `size` are
/// retained on release (at most `depth` buffers each), classes in
/// `size..limit` are allocated and dropped, and anything at or beyond `limit`
/// is refused.
///
/// # Examples
///
/// ```rust
/// use kat::PoolConfig;
///
/// let config = PoolConfig::default();
/// assert_eq!((config.size, config.limit, config.scale), (8, 16, 1024));
/// assert!(config.validate().is_ok());
///
/// let broken = PoolConfig { limit: 4, ..PoolConfig::default() };
/// assert!(broken.validate().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub size: usize,
    pub limit: usize,
    pub scale: usize,
    pub depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            size: 8,
            limit: 16,
            scale: 1024,
            depth: 2,
        }
    }
}

impl PoolConfig {
    /// Reads `KAT_POOL_SIZE`, `KAT_POOL_LIMIT`, `KAT_POOL_SCALE` and
    /// `KAT_POOL_DEPTH`, falling back to the defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a variable is not a number or the
    /// resulting layout is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PoolConfig::default();
        let read = |key: &str, fallback: usize| -> Result<usize> {
            match lookup(key) {
                None => Ok(fallback),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| Error::config(format!("{key} must be a number, got `{raw}`"))),
            }
        };
        let config = PoolConfig {
            size: read("KAT_POOL_SIZE", defaults.size)?,
            limit: read("KAT_POOL_LIMIT", defaults.limit)?,
            scale: read("KAT_POOL_SCALE", defaults.scale)?,
            depth: read("KAT_POOL_DEPTH", defaults.depth)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the layout is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `scale` is zero or `limit < size`.
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(Error::config("pool scale must be greater than zero"));
        }
        if self.limit < self.size {
            return Err(Error::config(format!(
                "pool limit ({}) must not be below the class count ({})",
                self.limit, self.size
            )));
        }
        Ok(())
    }

    /// Largest byte length a request may have before it is refused.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.limit.saturating_mul(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config =
            PoolConfig::from_lookup(lookup(&[("KAT_POOL_SIZE", "4"), ("KAT_POOL_SCALE", " 512 ")]))
                .unwrap();
        assert_eq!(config.size, 4);
        assert_eq!(config.scale, 512);
        assert_eq!(config.limit, 16);
        assert_eq!(config.max_bytes(), 16 * 512);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let err = PoolConfig::from_lookup(lookup(&[("KAT_POOL_LIMIT", "lots")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = PoolConfig::from_lookup(lookup(&[("KAT_POOL_LIMIT", "2")])).unwrap_err();
        assert!(err.to_string().contains("class count"));
    }

    #[test]
    fn test_builder_flags() {
        let options = Options::new()
            .with_pretty(true)
            .with_enum_as_index(true)
            .with_balance_check(true);
        assert!(options.pretty);
        assert!(options.enum_as_index);
        assert!(options.balance_check);
        assert_eq!(Options::pretty(), Options::new().with_pretty(true));
    }
}
