//! Tokenizer for Kat text.
//!
//! The [`Parser`] walks the input once, byte by byte, and reports each
//! member to an [`Events`] sink. Tokens are unescaped into pooled buffers that
//! are reused from one member to the next.
//!
//! Bytes up to and including `0x20` are ignored between and inside tags and
//! aliases; inside a value every byte counts.
//!
//! ```rust
//! use kat::builder::Events;
//! use kat::parser::Parser;
//! use kat::{Alias, Result, Space, Value};
//!
//! #[derive(Default)]
//! struct Trace(Vec<String>);
//!
//! impl Events for Trace {
//!     fn compound_start(&mut self, space: &Space, _: Option<&Alias>) -> Result<()> {
//!         self.0.push(format!("start {space}"));
//!         Ok(())
//!     }
//!     fn member(&mut self, space: &Space, alias: Option<&Alias>, value: &Value) -> Result<()> {
//!         let alias = alias.map(|a| a.to_string()).unwrap_or_default();
//!         self.0.push(format!("{space}:{alias}={value}"));
//!         Ok(())
//!     }
//!     fn child_start(&mut self, space: &Space, _: Option<&Alias>) -> Result<()> {
//!         self.0.push(format!("child {space}"));
//!         Ok(())
//!     }
//!     fn child_end(&mut self) -> Result<()> {
//!         self.0.push("end".into());
//!         Ok(())
//!     }
//!     fn compound_end(&mut self) -> Result<()> {
//!         self.0.push("done".into());
//!         Ok(())
//!     }
//! }
//!
//! let mut trace = Trace::default();
//! Parser::new(b"User{i:id(1)M:meta{s:note(a^)b)}}").parse(&mut trace).unwrap();
//! assert_eq!(
//!     trace.0,
//!     vec!["start User", "i:id=1", "child M", "s:note=a)b", "end", "done"]
//! );
//! ```

use crate::builder::Events;
use crate::escape::{unescape_byte, CARET};
use crate::{Alias, BufferPool, Chain, Error, Result, Space, Value};

/// Single-pass tokenizer with line and column tracking.
pub struct Parser<'a> {
    input: &'a [u8],
    position: usize,
    line: usize,
    column: usize,
    pool: &'static BufferPool,
}

/// Byte that ended a tag or alias.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Stop {
    Colon,
    Scalar,
    Compound,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_pool(input, BufferPool::global())
    }

    /// Uses `pool` for the token buffers.
    #[must_use]
    pub fn with_pool(input: &'a [u8], pool: &'static BufferPool) -> Self {
        Parser {
            input,
            position: 0,
            line: 1,
            column: 1,
            pool,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.position += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b <= 0x20) {
            self.next();
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::syntax(self.line, self.column, msg)
    }

    /// Gives positionless errors raised by the sink the current position.
    fn locate(&self, err: Error) -> Error {
        match err {
            Error::Malformed(msg) => Error::syntax(self.line, self.column, &msg),
            other => other,
        }
    }

    fn unescape(&mut self, dst: &mut Chain) -> Result<()> {
        match self.next() {
            Some(code) => dst.push(unescape_byte(code)),
            None => Err(self.error("dangling escape `^` at end of input")),
        }
    }

    /// Reads a tag or alias up to the next delimiter.
    fn read_tag(&mut self, dst: &mut Chain, colon_stops: bool) -> Result<Stop> {
        loop {
            let Some(b) = self.next() else {
                return Err(self.error("unexpected end of input"));
            };
            match b {
                b':' if colon_stops => return Ok(Stop::Colon),
                b'(' => return Ok(Stop::Scalar),
                b'{' => return Ok(Stop::Compound),
                b')' => return Err(self.error("unexpected `)`")),
                b'}' => return Err(self.error("unexpected `}`")),
                CARET => self.unescape(dst)?,
                b if b <= 0x20 => {}
                b => dst.push(b)?,
            }
        }
    }

    fn read_value(&mut self, dst: &mut Chain) -> Result<()> {
        loop {
            match self.next() {
                None => return Err(self.error("unexpected end of input")),
                Some(b')') => return Ok(()),
                Some(CARET) => self.unescape(dst)?,
                Some(b) => dst.push(b)?,
            }
        }
    }

    /// Tokenizes the whole input into `events`.
    ///
    /// Empty or blank input produces no events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] for lexical errors and for event-order
    /// violations reported by the sink.
    pub fn parse<E: Events>(&mut self, events: &mut E) -> Result<()> {
        let mut space = Space::with_pool(self.pool);
        let mut alias = Alias::with_pool(self.pool);
        let mut value = Value::with_pool(self.pool);
        let mut depth = 0usize;
        let mut done = false;

        loop {
            self.skip_whitespace();
            let Some(b) = self.peek() else {
                if depth > 0 {
                    return Err(self.error("unexpected end of input"));
                }
                return Ok(());
            };
            if done {
                return Err(self.error("trailing characters after root value"));
            }
            if b == b'}' {
                if depth == 0 {
                    return Err(self.error("unexpected `}`"));
                }
                self.next();
                depth -= 1;
                let res = if depth == 0 {
                    done = true;
                    events.compound_end()
                } else {
                    events.child_end()
                };
                res.map_err(|err| self.locate(err))?;
                continue;
            }

            space.clear();
            alias.clear();
            let mut stop = self.read_tag(&mut space, true)?;
            let named = stop == Stop::Colon;
            if named {
                stop = self.read_tag(&mut alias, false)?;
            }
            let alias_ref = if named { Some(&alias) } else { None };

            let res = match stop {
                Stop::Scalar => {
                    value.clear();
                    self.read_value(&mut value)?;
                    if depth == 0 {
                        done = true;
                    }
                    events.member(&space, alias_ref, &value)
                }
                Stop::Compound => {
                    depth += 1;
                    if depth == 1 {
                        events.compound_start(&space, alias_ref)
                    } else {
                        events.child_start(&space, alias_ref)
                    }
                }
                Stop::Colon => Err(Error::malformed("unexpected `:`")),
            };
            res.map_err(|err| self.locate(err))?;
        }
    }
}
