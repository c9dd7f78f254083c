//! Growable byte sequences and the three token kinds built on them.
//!
//! [`Chain`] is the buffer behind every writer and every decoded token. It
//! grows through an optional [`BufferPool`], caches its content hash until the
//! next mutation, and offers lenient numeric views used by the leaf codecs.
//!
//! [`Space`], [`Alias`] and [`Value`] wrap a chain for the tag, member name and
//! payload positions of `space:alias(value)`.

use crate::{BufferPool, Error, Result};
use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// An exclusively owned, growable byte sequence.
///
/// # Examples
///
/// ```rust
/// use kat::Chain;
///
/// let chain = Chain::from(" 0x1F ");
/// assert_eq!(chain.to_i32(), Some(31));
/// assert_eq!(Chain::from("-12").to_i64(), Some(-12));
/// assert_eq!(Chain::from("1.5e3").to_f64(), Some(1500.0));
/// ```
pub struct Chain {
    bytes: Vec<u8>,
    hash: Cell<u32>,
    pool: Option<&'static BufferPool>,
}

impl Chain {
    /// Creates an empty chain that grows with the default allocator.
    #[must_use]
    pub fn new() -> Self {
        Chain {
            bytes: Vec::new(),
            hash: Cell::new(0),
            pool: None,
        }
    }

    /// Creates an empty chain whose storage is checked out of `pool`.
    #[must_use]
    pub fn with_pool(pool: &'static BufferPool) -> Self {
        Chain {
            bytes: Vec::new(),
            hash: Cell::new(0),
            pool: Some(pool),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Views the contents as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns a malformed-input error if the bytes are not valid UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes).map_err(|e| Error::malformed(format!("invalid UTF-8: {e}")))
    }

    /// Makes room for `additional` more bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLimit`] when a pooled chain would exceed the pool limit.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self.bytes.len().saturating_add(additional);
        if needed <= self.bytes.capacity() {
            return Ok(());
        }
        match self.pool {
            Some(pool) => {
                let current = std::mem::take(&mut self.bytes);
                self.bytes = pool.resize(current, needed)?;
            }
            None => {
                let target = needed.max(self.bytes.capacity() * 2).max(16);
                self.bytes.reserve_exact(target - self.bytes.len());
            }
        }
        Ok(())
    }

    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.reserve(1)?;
        self.bytes.push(byte);
        self.hash.set(0);
        Ok(())
    }

    pub fn extend(&mut self, src: &[u8]) -> Result<()> {
        self.reserve(src.len())?;
        self.bytes.extend_from_slice(src);
        self.hash.set(0);
        Ok(())
    }

    /// Empties the chain, keeping its storage.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.hash.set(0);
    }

    /// Mutable access for in-place writers. Capacity must be reserved first.
    pub(crate) fn bytes_mut(&mut self) -> &mut Vec<u8> {
        self.hash.set(0);
        &mut self.bytes
    }

    /// Copies `start..end` into a new, unpooled chain.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    #[must_use]
    pub fn sub_chain(&self, start: usize, end: usize) -> Chain {
        Chain::from(&self.bytes[start..end])
    }

    /// Content hash, computed once per mutation.
    #[must_use]
    pub fn hash_code(&self) -> u32 {
        let cached = self.hash.get();
        if cached != 0 || self.bytes.is_empty() {
            return cached;
        }
        let hash = self
            .bytes
            .iter()
            .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
        self.hash.set(hash);
        hash
    }

    /// Takes the bytes out, leaving the buffer with the caller instead of the pool.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Contents with surrounding ASCII whitespace removed.
    #[must_use]
    pub fn trimmed(&self) -> &[u8] {
        trim_ascii(&self.bytes)
    }

    /// `true` when nothing but ASCII whitespace is present.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }

    /// Integer view accepting `[+-]digits` and `[+-]0x` hex digits.
    #[must_use]
    pub fn to_i128(&self) -> Option<i128> {
        parse_integer(self.trimmed())
    }

    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        self.to_i128().and_then(|v| i64::try_from(v).ok())
    }

    #[must_use]
    pub fn to_i32(&self) -> Option<i32> {
        self.to_i128().and_then(|v| i32::try_from(v).ok())
    }

    /// Floating point view: decimal and scientific forms, then integer forms.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        let text = std::str::from_utf8(self.trimmed()).ok()?;
        match text.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => parse_integer(text.as_bytes()).map(|v| v as f64),
        }
    }

    #[must_use]
    pub fn to_f32(&self) -> Option<f32> {
        let text = std::str::from_utf8(self.trimmed()).ok()?;
        match text.parse::<f32>() {
            Ok(v) => Some(v),
            Err(_) => parse_integer(text.as_bytes()).map(|v| v as f32),
        }
    }

    /// `true`/`True`/`TRUE` and their `false` counterparts.
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self.trimmed() {
            b"true" | b"True" | b"TRUE" => Some(true),
            b"false" | b"False" | b"FALSE" => Some(false),
            _ => None,
        }
    }
}

/// Value of an ASCII hex digit.
#[must_use]
pub fn digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}

fn parse_integer(src: &[u8]) -> Option<i128> {
    let (negative, rest) = match src.first()? {
        b'-' => (true, &src[1..]),
        b'+' => (false, &src[1..]),
        _ => (false, src),
    };
    let (radix, digits) = match rest {
        [b'0', b'x' | b'X', tail @ ..] => (16u32, tail),
        _ => (10u32, rest),
    };
    if digits.is_empty() {
        return None;
    }
    let mut magnitude: i128 = 0;
    for &b in digits {
        let d = digit(b).filter(|d| u32::from(*d) < radix)?;
        magnitude = magnitude
            .checked_mul(i128::from(radix))?
            .checked_add(i128::from(d))?;
    }
    Some(if negative { -magnitude } else { magnitude })
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        if let Some(pool) = self.pool {
            pool.release(std::mem::take(&mut self.bytes));
        }
    }
}

impl Clone for Chain {
    fn clone(&self) -> Self {
        Chain::from(self.as_bytes())
    }
}

impl From<&[u8]> for Chain {
    fn from(bytes: &[u8]) -> Self {
        Chain {
            bytes: bytes.to_vec(),
            hash: Cell::new(0),
            pool: None,
        }
    }
}

impl From<&str> for Chain {
    fn from(text: &str) -> Self {
        Chain::from(text.as_bytes())
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Chain {}

impl PartialEq<str> for Chain {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for Chain {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl std::hash::Hash for Chain {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Write for Chain {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.extend(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

macro_rules! token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash)]
        pub struct $name(Chain);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                $name(Chain::new())
            }

            #[must_use]
            pub fn with_pool(pool: &'static BufferPool) -> Self {
                $name(Chain::with_pool(pool))
            }

            #[must_use]
            pub fn into_chain(self) -> Chain {
                self.0
            }
        }

        impl Deref for $name {
            type Target = Chain;

            fn deref(&self) -> &Chain {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Chain {
                &mut self.0
            }
        }

        impl From<&str> for $name {
            fn from(text: &str) -> Self {
                $name(Chain::from(text))
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == **other
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

token!(
    /// Type tag preceding a member, such as `s`, `M` or `User`. Compared case-sensitively.
    Space
);
token!(
    /// Member name following `:`. An absent alias is modelled as `Option::None`;
    /// an empty `Alias` is the distinct "present but empty" state.
    Alias
);
token!(
    /// Unescaped payload found between `(` and `)`.
    Value
);
