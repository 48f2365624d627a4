//! Reader and writer configuration.
//!
//! # Beispiel
//!
//! ```
//! use xmlbridge::options::{ReadOptions, WriteOptions};
//!
//! let read = ReadOptions::default().with_preserve_comments(true);
//! assert!(read.skip_whitespace());
//! assert!(read.preserve_comments());
//!
//! let write = WriteOptions::default().with_declaration(false);
//! assert_eq!(write.encoding(), "UTF-8");
//! assert!(!write.declaration());
//! ```

/// Controls which constructs [`XmlEventReader`](crate::reader::XmlEventReader)
/// reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub(crate) skip_whitespace: bool,
    pub(crate) preserve_comments: bool,
    pub(crate) preserve_cdata: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            skip_whitespace: true,
            preserve_comments: false,
            preserve_cdata: false,
        }
    }
}

impl ReadOptions {
    // --- Getter ---

    /// Whitespace-only text is dropped (default: true).
    pub fn skip_whitespace(&self) -> bool { self.skip_whitespace }
    /// Comments are reported as comment events (default: false).
    pub fn preserve_comments(&self) -> bool { self.preserve_comments }
    /// CDATA sections are reported as CData events instead of characters
    /// (default: false).
    pub fn preserve_cdata(&self) -> bool { self.preserve_cdata }

    // --- Builder-Setter ---

    /// Setzt Whitespace-Filterung.
    pub fn with_skip_whitespace(mut self, val: bool) -> Self { self.skip_whitespace = val; self }
    /// Setzt Comment-Erhalt.
    pub fn with_preserve_comments(mut self, val: bool) -> Self { self.preserve_comments = val; self }
    /// Setzt CDATA-Erhalt.
    pub fn with_preserve_cdata(mut self, val: bool) -> Self { self.preserve_cdata = val; self }

    /// Reports everything the event model can carry: whitespace, comments
    /// and CDATA sections.
    pub fn lossless() -> Self {
        Self {
            skip_whitespace: false,
            preserve_comments: true,
            preserve_cdata: true,
        }
    }
}

/// Controls the document frame written by
/// [`XmlEventWriter`](crate::writer::XmlEventWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub(crate) encoding: String,
    pub(crate) version: String,
    pub(crate) declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            encoding: "UTF-8".to_string(),
            version: "1.0".to_string(),
            declaration: true,
        }
    }
}

impl WriteOptions {
    // --- Getter ---

    /// Declared output encoding. Only UTF-8 (any case, with or without the
    /// hyphen) can be written to a byte sink.
    pub fn encoding(&self) -> &str { &self.encoding }
    /// Declared XML version.
    pub fn version(&self) -> &str { &self.version }
    /// Whether the `<?xml ...?>` declaration is written.
    pub fn declaration(&self) -> bool { self.declaration }

    // --- Builder-Setter ---

    /// Setzt das Encoding.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self { self.encoding = encoding.into(); self }
    /// Setzt die XML-Version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self { self.version = version.into(); self }
    /// Setzt ob die XML-Deklaration geschrieben wird.
    pub fn with_declaration(mut self, val: bool) -> Self { self.declaration = val; self }

    /// True if the declared encoding names UTF-8.
    pub(crate) fn is_utf8(&self) -> bool {
        let enc = self.encoding.as_str();
        enc.eq_ignore_ascii_case("utf-8") || enc.eq_ignore_ascii_case("utf8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_defaults() {
        let opts = ReadOptions::default();
        assert!(opts.skip_whitespace());
        assert!(!opts.preserve_comments());
        assert!(!opts.preserve_cdata());
    }

    #[test]
    fn read_lossless() {
        let opts = ReadOptions::lossless();
        assert!(!opts.skip_whitespace());
        assert!(opts.preserve_comments());
        assert!(opts.preserve_cdata());
    }

    #[test]
    fn write_defaults_and_builder() {
        let opts = WriteOptions::default();
        assert_eq!(opts.version(), "1.0");
        assert!(opts.declaration());
        assert!(opts.is_utf8());

        let latin = opts.clone().with_encoding("ISO-8859-1").with_version("1.1");
        assert_eq!(latin.encoding(), "ISO-8859-1");
        assert_eq!(latin.version(), "1.1");
        assert!(!latin.is_utf8());
        assert!(WriteOptions::default().with_encoding("utf8").is_utf8());
    }
}
