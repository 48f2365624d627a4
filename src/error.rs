//! Central error types.
//!
//! Every error is a caller-input error: nothing is retried internally, the
//! caller fixes the input (binds the prefix, supplies one root, aligns the
//! encodings) and calls again.

use core::fmt;

/// All errors raised while resolving, converting, reading or writing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A tag or attribute name references a prefix with no binding in scope.
    UnresolvedPrefix {
        /// Der nicht gebundene Prefix (leer fuer den Default-Namespace).
        prefix: String,
    },
    /// Literal conversion yielded zero or more than one top-level root.
    InvalidStructure {
        /// Anzahl der tatsaechlich erzeugten Roots.
        roots: usize,
    },
    /// The declared output encoding differs from the destination encoding.
    EncodingMismatch {
        declared: String,
        actual: String,
    },
    /// The literal notation could not be read or converted.
    InvalidLiteral {
        message: String,
        /// Byte-Offset im Quelltext (0 wenn nicht aus Text gelesen).
        offset: usize,
    },
    /// The tokenizer rejected the input.
    XmlParseError(String),
    /// End-element without matching start, or open elements at document end.
    UnbalancedEvents(String),
    /// Content that has no XML representation (e.g. `--` in a comment).
    InvalidContent(String),
    /// Writing to the destination failed.
    IoError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedPrefix { prefix } => {
                if prefix.is_empty() {
                    write!(f, "unresolved default namespace")
                } else {
                    write!(f, "unresolved namespace prefix '{prefix}'")
                }
            }
            Self::InvalidStructure { roots } => {
                write!(f, "invalid structure: expected exactly one root, found {roots}")
            }
            Self::EncodingMismatch { declared, actual } => write!(
                f,
                "encoding mismatch: declared '{declared}' but destination uses '{actual}'"
            ),
            Self::InvalidLiteral { message, offset } => {
                write!(f, "invalid literal at offset {offset}: {message}")
            }
            Self::XmlParseError(msg) => write!(f, "XML parse error: {msg}"),
            Self::UnbalancedEvents(msg) => write!(f, "unbalanced event stream: {msg}"),
            Self::InvalidContent(msg) => write!(f, "invalid content: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

impl Error {
    /// Erstellt einen `UnresolvedPrefix` Fehler.
    pub fn unresolved_prefix(prefix: impl Into<String>) -> Self {
        Self::UnresolvedPrefix { prefix: prefix.into() }
    }

    /// Erstellt einen `InvalidLiteral` Fehler mit Offset.
    pub fn invalid_literal(message: impl Into<String>, offset: usize) -> Self {
        Self::InvalidLiteral { message: message.into(), offset }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_prefix_display() {
        let msg = Error::unresolved_prefix("foo").to_string();
        assert!(msg.contains("'foo'"), "{msg}");
        assert!(msg.contains("prefix"), "{msg}");
    }

    #[test]
    fn unresolved_default_namespace_display() {
        let msg = Error::unresolved_prefix("").to_string();
        assert!(msg.contains("default namespace"), "{msg}");
    }

    #[test]
    fn invalid_structure_display() {
        let msg = Error::InvalidStructure { roots: 2 }.to_string();
        assert!(msg.contains("exactly one root"), "{msg}");
        assert!(msg.contains('2'), "{msg}");
    }

    #[test]
    fn encoding_mismatch_display() {
        let e = Error::EncodingMismatch {
            declared: "ISO-8859-1".into(),
            actual: "UTF-8".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("ISO-8859-1"), "{msg}");
        assert!(msg.contains("UTF-8"), "{msg}");
    }

    #[test]
    fn invalid_literal_display() {
        let msg = Error::invalid_literal("unexpected ']'", 7).to_string();
        assert!(msg.contains("offset 7"), "{msg}");
        assert!(msg.contains("unexpected ']'"), "{msg}");
    }

    #[test]
    fn io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let e: Error = io.into();
        assert!(matches!(e, Error::IoError(ref m) if m.contains("pipe closed")));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&Error::XmlParseError("x".into()));
    }
}
