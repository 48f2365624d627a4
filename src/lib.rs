//! xmlbridge: lazy bridge between XML event streams and node trees
//!
//! Both directions are pull-based: [`tree`] rebuilds nodes from events one
//! sibling at a time, [`generator`] flattens heterogeneous content into events
//! one event at a time. [`namespace`] resolves names against scoped prefix
//! tables, [`sexp`] is a compact literal notation for building trees.
//!
//! # Beispiel
//!
//! ```
//! use xmlbridge::sexp::{Sexp, to_single_root};
//! use xmlbridge::{emit_str, parse_str};
//!
//! let node = parse_str(r#"<a xmlns="urn:x"><b>x</b>y</a>"#).unwrap();
//! let el = node.as_element().unwrap();
//! assert_eq!(el.tag().to_clark(), "{urn:x}a");
//! assert_eq!(el.text(), "xy");
//!
//! let lit = to_single_root(&Sexp::parse_all(r#"[:a [:b "x"] "y"]"#).unwrap()).unwrap();
//! assert_eq!(
//!     emit_str(&lit).unwrap(),
//!     r#"<?xml version="1.0" encoding="UTF-8"?><a><b>x</b>y</a>"#
//! );
//! ```

use std::io::{BufRead, Write};

use log::debug;

pub mod error;
pub mod event;
pub mod generator;
pub mod namespace;
pub mod node;
pub mod options;
pub mod qname;
pub mod reader;
pub mod sexp;
pub mod tree;
pub mod writer;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent; nur für interne Tabellen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

// Public API: Datenmodell
pub use event::{Event, EventKind};
pub use node::{Attributes, Element, Node};
pub use qname::QName;

// Public API: Algorithmen
pub use generator::{Content, flatten, flatten_node, flatten_nodes};
pub use namespace::{NamespaceContext, resolve_attribute, resolve_tag};
pub use sexp::Sexp;
pub use tree::{Forest, TreeBuilder, XmlTreeBuilder, build_forest, nodes_from_events};

// Public API: Lesen/Schreiben
pub use options::{ReadOptions, WriteOptions};
pub use reader::XmlEventReader;
pub use writer::XmlEventWriter;

/// Top-level nodes of `source`, built lazily as the caller iterates.
pub fn parse_events<R: BufRead>(
    source: R,
    opts: ReadOptions,
) -> Forest<XmlEventReader<R>, XmlTreeBuilder> {
    nodes_from_events(XmlEventReader::new(source, opts))
}

/// Parses a complete document into its root element.
pub fn parse<R: BufRead>(source: R, opts: ReadOptions) -> Result<Node> {
    debug!("parse start ({opts:?})");
    let mut roots = parse_events(source, opts);
    let root = roots.next().transpose()?;
    let extra = roots.try_fold(0usize, |n, r| r.map(|_| n + 1))?;
    match root {
        Some(root) if extra == 0 => {
            debug!("parse end");
            Ok(root)
        }
        Some(_) => Err(Error::InvalidStructure { roots: extra + 1 }),
        None => Err(Error::InvalidStructure { roots: 0 }),
    }
}

/// Parses a document held in memory, with default [`ReadOptions`].
pub fn parse_str(xml: &str) -> Result<Node> {
    parse(xml.as_bytes(), ReadOptions::default())
}

/// Flattens `roots` and writes them as one document into `out`.
///
/// The encoding is checked before the first byte is written.
pub fn emit<W: Write>(roots: &[Content], out: W, opts: &WriteOptions) -> Result<W> {
    let mut writer = XmlEventWriter::new(out, opts.clone())?;
    writer.start_document()?;
    for event in flatten(roots) {
        writer.write_event(&event)?;
    }
    writer.end_document()
}

/// Writes a single node as a document.
pub fn emit_node<W: Write>(node: &Node, out: W, opts: &WriteOptions) -> Result<W> {
    let mut writer = XmlEventWriter::new(out, opts.clone())?;
    writer.start_document()?;
    for event in flatten_node(node) {
        writer.write_event(&event)?;
    }
    writer.end_document()
}

/// Serializes a node as a UTF-8 document string.
pub fn emit_str(node: &Node) -> Result<String> {
    let buf = emit_node(node, Vec::new(), &WriteOptions::default())?;
    String::from_utf8(buf).map_err(|_| Error::IoError("XML output is not valid UTF-8".into()))
}
