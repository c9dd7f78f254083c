//! Byte-level escaping rules of the three lexical contexts.
//!
//! | context | `^` `(` `)` | ` ` `\r` `\n` `\t` | other controls | non-ASCII |
//! |---------|-------------|--------------------|----------------|-----------|
//! | space   | `^` + byte  | `^s` `^r` `^n` `^t` | dropped        | dropped   |
//! | alias   | `^` + byte  | `^s` `^r` `^n` `^t` | dropped        | dropped   |
//! | value   | `^` + byte  | verbatim           | verbatim       | verbatim  |
//!
//! Decoding is shared: `^` followed by `s`, `r`, `n` or `t` yields the control
//! byte, `^` followed by anything else yields that byte.
//!
//! ```rust
//! use kat::escape::{escape, unescape, Context};
//!
//! let escaped = escape(Context::Alias, b"a b(c)");
//! assert_eq!(escaped, b"a^sb^(c^)");
//! assert_eq!(unescape(&escaped).unwrap(), b"a b(c)");
//! ```

use crate::{Error, Result};

/// Lexical position of the bytes being escaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Context {
    Space,
    Alias,
    Value,
}

/// Escape introducer.
pub const CARET: u8 = b'^';

/// Appends `src` escaped for `ctx` to `dst`.
pub fn escape_into(ctx: Context, src: &[u8], dst: &mut Vec<u8>) {
    match ctx {
        Context::Value => {
            for &b in src {
                if matches!(b, b'^' | b'(' | b')') {
                    dst.push(CARET);
                }
                dst.push(b);
            }
        }
        Context::Space | Context::Alias => {
            for &b in src {
                match b {
                    b' ' => dst.extend_from_slice(b"^s"),
                    b'\r' => dst.extend_from_slice(b"^r"),
                    b'\n' => dst.extend_from_slice(b"^n"),
                    b'\t' => dst.extend_from_slice(b"^t"),
                    0x00..=0x20 | 0x80..=0xFF => {}
                    b'^' | b'(' | b')' => {
                        dst.push(CARET);
                        dst.push(b);
                    }
                    _ => dst.push(b),
                }
            }
        }
    }
}

#[must_use]
pub fn escape(ctx: Context, src: &[u8]) -> Vec<u8> {
    let mut dst = Vec::with_capacity(escaped_len(ctx, src));
    escape_into(ctx, src, &mut dst);
    dst
}

/// Exact length of `src` once escaped for `ctx`.
#[must_use]
pub fn escaped_len(ctx: Context, src: &[u8]) -> usize {
    match ctx {
        Context::Value => src.len() + src.iter().filter(|&&b| matches!(b, b'^' | b'(' | b')')).count(),
        Context::Space | Context::Alias => src
            .iter()
            .map(|&b| match b {
                b' ' | b'\r' | b'\n' | b'\t' | b'^' | b'(' | b')' => 2,
                0x00..=0x20 | 0x80..=0xFF => 0,
                _ => 1,
            })
            .sum(),
    }
}

/// Maps the byte following `^` to the byte it stands for.
#[must_use]
pub const fn unescape_byte(code: u8) -> u8 {
    match code {
        b's' => b' ',
        b'r' => b'\r',
        b'n' => b'\n',
        b't' => b'\t',
        other => other,
    }
}

/// Appends the decoded form of `src` to `dst`.
///
/// # Errors
///
/// Returns a malformed-input error when `src` ends with a lone `^`.
pub fn unescape_into(src: &[u8], dst: &mut Vec<u8>) -> Result<()> {
    let mut iter = src.iter();
    while let Some(&b) = iter.next() {
        if b == CARET {
            match iter.next() {
                Some(&code) => dst.push(unescape_byte(code)),
                None => return Err(Error::malformed("dangling escape `^` at end of token")),
            }
        } else {
            dst.push(b);
        }
    }
    Ok(())
}

/// # Errors
///
/// See [`unescape_into`].
pub fn unescape(src: &[u8]) -> Result<Vec<u8>> {
    let mut dst = Vec::with_capacity(src.len());
    unescape_into(src, &mut dst)?;
    Ok(dst)
}

/// `true` when `byte` survives escaping in `ctx` unchanged in meaning.
#[must_use]
pub const fn is_legal(ctx: Context, byte: u8) -> bool {
    match ctx {
        Context::Value => true,
        Context::Space | Context::Alias => match byte {
            b' ' | b'\r' | b'\n' | b'\t' => true,
            0x00..=0x20 | 0x80..=0xFF => false,
            _ => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_escapes_only_delimiters() {
        assert_eq!(escape(Context::Value, b"a^b(c)d"), b"a^^b^(c^)d");
        assert_eq!(escape(Context::Value, b" \n\t\x01"), b" \n\t\x01");
        assert_eq!(escape(Context::Value, "\u{1F600}k".as_bytes()), "\u{1F600}k".as_bytes());
    }

    #[test]
    fn test_tag_controls() {
        assert_eq!(escape(Context::Space, b"a b\r\n\t"), b"a^sb^r^n^t");
        assert_eq!(escape(Context::Space, b"x\x00\x07\x1fy"), b"xy");
        assert_eq!(escape(Context::Alias, b"(^)"), b"^(^^^)");
    }

    #[test]
    fn test_tags_drop_non_ascii() {
        assert_eq!(escape(Context::Space, "Us\u{e9}r".as_bytes()), b"Usr");
        assert_eq!(escape(Context::Alias, "\u{540d}name".as_bytes()), b"name");
        // `{`, `}` and `:` are not part of the escape set
        assert_eq!(escape(Context::Alias, b"a:b{c}"), b"a:b{c}");
    }

    #[test]
    fn test_unescape_codes() {
        assert_eq!(unescape(b"^s^r^n^t").unwrap(), b" \r\n\t");
        assert_eq!(unescape(b"^^^(^)^x").unwrap(), b"^()x");
        assert_eq!(unescape(b"plain").unwrap(), b"plain");
    }

    #[test]
    fn test_dangling_caret() {
        let err = unescape(b"abc^").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_legal_alphabet() {
        assert!(is_legal(Context::Space, b' '));
        assert!(!is_legal(Context::Space, 0x01));
        assert!(!is_legal(Context::Alias, 0xC3));
        assert!(is_legal(Context::Value, 0xC3));
    }

    #[test]
    fn test_escaped_len_is_exact() {
        let cases: [(Context, &[u8]); 4] = [
            (Context::Value, b"plain"),
            (Context::Value, b"f(x)^2"),
            (Context::Alias, b"a b\x01(c)\xC3"),
            (Context::Space, b"\t^x"),
        ];
        for (ctx, src) in cases {
            assert_eq!(escaped_len(ctx, src), escape(ctx, src).len());
        }
    }
}
