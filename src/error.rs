//! Error types for Kat encoding and decoding.
//!
//! Every failure surfaced by the crate is one of a small set of kinds so callers
//! can tell "the text was broken" apart from "the text was fine but the target
//! type rejected it":
//!
//! - **Malformed input**: [`Error::Syntax`] (positioned, raised by the parser) and
//!   [`Error::Malformed`] (strict value reads, event-order violations, writer
//!   balance checks)
//! - **Construction**: [`Error::Construction`], the target constructor refused the data
//! - **Resource limit**: [`Error::ResourceLimit`], a buffer request went past the
//!   pool's hard limit; never retried
//! - **Unsupported type**: [`Error::UnsupportedType`], nothing in the registry can
//!   decode the requested top-level type
//!
//! Members that cannot be resolved are not errors: encoding reports `Ok(false)`
//! and decoding skips them.
//!
//! ## Examples
//!
//! ```rust
//! use kat::{decode_data, Error};
//!
//! let result = decode_data("M{s:name(kraity)");
//! assert!(result.is_err());
//!
//! if let Err(err) = result {
//!     assert!(err.is_malformed());
//!     eprintln!("Parse error: {}", err);
//! }
//! ```

use std::fmt;
use thiserror::Error;

/// Represents all possible errors that can occur while encoding or decoding Kat.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error during reading or writing
    #[error("IO error: {0}")]
    Io(String),

    /// Lexical error with the position it was found at
    #[error("Syntax error at line {line}, column {col}: {msg}")]
    Syntax { line: usize, col: usize, msg: String },

    /// Malformed input detected without positional information
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// The target type rejected the decoded data
    #[error("Failed to construct {target}: {msg}")]
    Construction { target: String, msg: String },

    /// A buffer request exceeded the pool's hard limit
    #[error("Buffer of {requested} bytes exceeds the pool limit of {limit} bytes")]
    ResourceLimit { requested: usize, limit: usize },

    /// Unsupported type for decoding
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Invalid pool or writer configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a syntax error with line and column information.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kat::Error;
    ///
    /// let err = Error::syntax(10, 5, "unexpected `)`");
    /// assert!(err.to_string().contains("line 10"));
    /// ```
    pub fn syntax(line: usize, col: usize, msg: &str) -> Self {
        Error::Syntax {
            line,
            col,
            msg: msg.to_string(),
        }
    }

    /// Creates a malformed-input error without position.
    pub fn malformed<T: fmt::Display>(msg: T) -> Self {
        Error::Malformed(msg.to_string())
    }

    /// Creates a construction error for `target`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kat::Error;
    ///
    /// let err = Error::construction("Art", "missing tag");
    /// assert!(err.is_construction());
    /// assert!(err.to_string().contains("Art"));
    /// ```
    pub fn construction<T: fmt::Display>(target: &str, msg: T) -> Self {
        Error::Construction {
            target: target.to_string(),
            msg: msg.to_string(),
        }
    }

    /// Creates a resource-limit error.
    pub fn resource_limit(requested: usize, limit: usize) -> Self {
        Error::ResourceLimit { requested, limit }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(msg: &str) -> Self {
        Error::UnsupportedType(msg.to_string())
    }

    /// Creates a configuration error.
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Numeric code written under `c` by the `E` codec.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Error::Io(_) => 1,
            Error::Syntax { .. } => 2,
            Error::Malformed(_) => 3,
            Error::Construction { .. } => 4,
            Error::ResourceLimit { .. } => 5,
            Error::UnsupportedType(_) => 6,
            Error::Config(_) => 7,
            Error::Custom(_) => 0,
        }
    }

    /// `true` for both positioned and unpositioned malformed-input errors.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Syntax { .. } | Error::Malformed(_))
    }

    #[must_use]
    pub fn is_construction(&self) -> bool {
        matches!(self, Error::Construction { .. })
    }

    #[must_use]
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Error::ResourceLimit { .. })
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(Error::syntax(1, 2, "x").is_malformed());
        assert!(Error::malformed("x").is_malformed());
        assert!(!Error::construction("T", "x").is_malformed());
        assert!(Error::construction("T", "x").is_construction());
        assert!(Error::resource_limit(10, 5).is_resource_limit());
        assert!(!Error::custom("x").is_resource_limit());
    }

    #[test]
    fn test_display() {
        let err = Error::resource_limit(20480, 16384);
        assert_eq!(
            err.to_string(),
            "Buffer of 20480 bytes exceeds the pool limit of 16384 bytes"
        );
        let err = Error::syntax(3, 7, "unexpected end of input");
        assert_eq!(
            err.to_string(),
            "Syntax error at line 3, column 7: unexpected end of input"
        );
    }
}
