//! Byte-level token writer.
//!
//! [`Flow`] appends grammar tokens to a pooled [`Chain`]: tags, aliases,
//! scalar and compound delimiters, and escaped payloads. It knows nothing about
//! types; [`Chan`](crate::Chan) drives it from values.
//!
//! ## Pretty printing
//!
//! With [`Options::pretty`] every member starts on its own line, indented two
//! spaces per enclosing compound, and closing braces line up with the member
//! that opened them:
//!
//! ```rust
//! use kat::{Flow, Options};
//!
//! let mut flow = Flow::new(Options::pretty());
//! flow.add_space("User").unwrap();
//! flow.open_compound().unwrap();
//! flow.add_space("i").unwrap();
//! flow.add_alias(Some("id")).unwrap();
//! flow.open_scalar().unwrap();
//! flow.add_i32(1).unwrap();
//! flow.close_scalar().unwrap();
//! flow.close_compound().unwrap();
//!
//! assert_eq!(flow.finish().unwrap(), "User{\n  i:id(1)\n}");
//! ```

use crate::escape::{self, Context};
use crate::{BufferPool, Chain, Error, Options, Result};
use std::fmt::{self, Write as _};

const INDENT: &[u8] = b"  ";

/// Token writer over a growable buffer.
pub struct Flow {
    chain: Chain,
    depth: usize,
    options: Options,
    balance: Option<Vec<u8>>,
}

impl Flow {
    /// Creates a writer backed by the global [`BufferPool`].
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self::with_chain(Chain::with_pool(BufferPool::global()), options)
    }

    /// Creates a writer that appends to `chain`.
    #[must_use]
    pub fn with_chain(chain: Chain, options: Options) -> Self {
        Flow {
            chain,
            depth: usize::from(options.pretty),
            balance: options.balance_check.then(Vec::new),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current nesting depth. Always zero unless pretty printing.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.chain.as_bytes()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Truncates output back to `len` bytes; used to undo a partially written member.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.chain.bytes_mut().truncate(len);
    }

    fn opened(&mut self, closer: u8) {
        if let Some(stack) = self.balance.as_mut() {
            stack.push(closer);
        }
    }

    fn closed(&mut self, closer: u8) -> Result<()> {
        if let Some(stack) = self.balance.as_mut() {
            match stack.pop() {
                Some(expected) if expected == closer => {}
                Some(expected) => {
                    return Err(Error::malformed(format!(
                        "`{}` closed while `{}` was expected",
                        closer as char, expected as char
                    )))
                }
                None => {
                    return Err(Error::malformed(format!(
                        "`{}` closed with nothing open",
                        closer as char
                    )))
                }
            }
        }
        Ok(())
    }

    fn newline(&mut self, levels: usize) -> Result<()> {
        self.chain.reserve(1 + levels * INDENT.len())?;
        self.chain.push(b'\n')?;
        for _ in 0..levels {
            self.chain.extend(INDENT)?;
        }
        Ok(())
    }

    pub fn open_scalar(&mut self) -> Result<()> {
        self.opened(b')');
        self.chain.push(b'(')
    }

    pub fn close_scalar(&mut self) -> Result<()> {
        self.closed(b')')?;
        self.chain.push(b')')
    }

    pub fn open_compound(&mut self) -> Result<()> {
        self.opened(b'}');
        if self.depth != 0 {
            self.depth += 1;
        }
        self.chain.push(b'{')
    }

    pub fn close_compound(&mut self) -> Result<()> {
        self.closed(b'}')?;
        if self.depth != 0 {
            self.depth -= 1;
            let range = self.depth;
            if range > 1 {
                self.newline(range - 1)?;
            } else {
                self.newline(0)?;
            }
        }
        self.chain.push(b'}')
    }

    /// Writes a type tag, starting a new line first when pretty printing inside a compound.
    pub fn add_space(&mut self, space: &str) -> Result<()> {
        if self.depth > 1 {
            self.newline(self.depth - 1)?;
        }
        self.write_escaped(Context::Space, space.as_bytes())
    }

    /// Writes `:alias`, or nothing for an absent alias.
    pub fn add_alias(&mut self, alias: Option<&str>) -> Result<()> {
        match alias {
            None => Ok(()),
            Some(name) => {
                self.chain.push(b':')?;
                self.write_escaped(Context::Alias, name.as_bytes())
            }
        }
    }

    fn write_escaped(&mut self, ctx: Context, src: &[u8]) -> Result<()> {
        self.chain.reserve(escape::escaped_len(ctx, src))?;
        escape::escape_into(ctx, src, self.chain.bytes_mut());
        Ok(())
    }

    /// Appends one payload byte, escaping delimiters.
    pub fn add_byte(&mut self, byte: u8) -> Result<()> {
        self.write_escaped(Context::Value, &[byte])
    }

    pub fn add_char(&mut self, ch: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.add_bytes(ch.encode_utf8(&mut buf).as_bytes())
    }

    pub fn add_text(&mut self, text: &str) -> Result<()> {
        self.add_bytes(text.as_bytes())
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_escaped(Context::Value, bytes)
    }

    /// Appends bytes verbatim. The caller vouches they need no escaping.
    pub fn add_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.chain.extend(bytes)
    }

    /// Appends the `Display` form of a value that never contains delimiters.
    pub fn add_display<T: fmt::Display>(&mut self, value: T) -> Result<()> {
        let mark = self.chain.len();
        if write!(self.chain, "{value}").is_err() {
            self.truncate(mark);
            return Err(Error::custom("formatting failed"));
        }
        Ok(())
    }

    pub fn add_i32(&mut self, value: i32) -> Result<()> {
        self.add_display(value)
    }

    pub fn add_i64(&mut self, value: i64) -> Result<()> {
        self.add_display(value)
    }

    pub fn add_u64(&mut self, value: u64) -> Result<()> {
        self.add_display(value)
    }

    /// Appends a float, or its IEEE bits when [`Options::float_as_bitmap`] is set.
    pub fn add_f32(&mut self, value: f32) -> Result<()> {
        if self.options.float_as_bitmap {
            return self.add_hex_upper(u64::from(value.to_bits()));
        }
        if !value.is_finite() {
            return self.add_non_finite(f64::from(value));
        }
        self.add_finite(value, f64::from(value.abs()))
    }

    /// Appends a float, or its IEEE bits when [`Options::float_as_bitmap`] is set.
    ///
    /// Very large and very small magnitudes use exponent form. Non-finite
    /// values are spelled `Infinity`, `-Infinity` and `NaN`.
    pub fn add_f64(&mut self, value: f64) -> Result<()> {
        if self.options.float_as_bitmap {
            return self.add_hex_upper(value.to_bits());
        }
        if !value.is_finite() {
            return self.add_non_finite(value);
        }
        self.add_finite(value, value.abs())
    }

    fn add_finite<F: fmt::Display + fmt::LowerExp>(&mut self, value: F, magnitude: f64) -> Result<()> {
        if magnitude >= 1e16 || (magnitude != 0.0 && magnitude < 1e-5) {
            self.add_display(format_args!("{value:e}"))
        } else {
            self.add_display(value)
        }
    }

    fn add_non_finite(&mut self, value: f64) -> Result<()> {
        if value.is_nan() {
            self.add_raw(b"NaN")
        } else if value > 0.0 {
            self.add_raw(b"Infinity")
        } else {
            self.add_raw(b"-Infinity")
        }
    }

    pub fn add_bool(&mut self, value: bool) -> Result<()> {
        self.add_raw(if value { b"true" } else { b"false" })
    }

    /// Appends `0x` and the lowercase hex digits of `value`.
    pub fn add_hex_lower(&mut self, value: u64) -> Result<()> {
        self.add_display(format_args!("0x{value:x}"))
    }

    pub fn add_hex_upper(&mut self, value: u64) -> Result<()> {
        self.add_display(format_args!("0x{value:X}"))
    }

    /// Ends writing and copies the output into a `String`, returning the
    /// buffer to its pool.
    ///
    /// # Errors
    ///
    /// Fails when balance checking is on and a delimiter is still open, or when
    /// raw bytes left the output invalid UTF-8.
    pub fn finish(self) -> Result<String> {
        if let Some(stack) = &self.balance {
            if let Some(&closer) = stack.last() {
                return Err(Error::malformed(format!(
                    "{} delimiter(s) left open, innermost expects `{}`",
                    stack.len(),
                    closer as char
                )));
            }
        }
        self.chain.as_str().map(str::to_owned)
    }

    /// Ends writing and hands over the underlying chain.
    #[must_use]
    pub fn into_chain(self) -> Chain {
        self.chain
    }
}
