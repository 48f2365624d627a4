//! Literal notation for building trees.
//!
//! ```text
//! [:tag {:attr "value"} content...]
//! ```
//!
//! A vector whose head is a keyword opens an element, an optional map in
//! second position holds the attributes, everything after is content. Content
//! items convert recursively:
//!
//! - a list `( ... )` is spliced into the parent,
//! - a bare keyword is an empty element,
//! - `[:-cdata "x"]` / `[:-comment "x"]` make CData and comment nodes,
//! - other scalars become text, `nil` contributes nothing.
//!
//! Attribute values are coerced to strings during conversion.
//!
//! # Beispiel
//!
//! ```
//! use xmlbridge::sexp::{Sexp, to_single_root};
//!
//! let expr = Sexp::parse_all(r#"[:a {:id 1} [:b "x"] "y"]"#).unwrap();
//! let root = to_single_root(&expr).unwrap();
//! let el = root.as_element().unwrap();
//! assert_eq!(el.attrs().get_local("id"), Some("1"));
//! assert_eq!(el.text(), "xy");
//! ```

use std::rc::Rc;

use memchr::{memchr, memchr2};

use crate::generator::float_text;
use crate::node::{Attributes, Element, Node};
use crate::qname::QName;
use crate::{Error, Result};

/// Reserved tag producing a CData node.
pub const CDATA_TAG: &str = "-cdata";
/// Reserved tag producing a comment node.
pub const COMMENT_TAG: &str = "-comment";

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexp {
    /// `[...]`: element form when headed by a keyword.
    Vector(Vec<Sexp>),
    /// `(...)`: ordered sequence, spliced into its parent.
    List(Vec<Sexp>),
    /// `:name`, `:prefix/name` or `:prefix:name`.
    Keyword(QName),
    /// `{:k v ...}`: attribute map.
    Map(Vec<(QName, Sexp)>),
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    /// An already built node, used as is.
    Node(Node),
}

impl Sexp {
    pub fn keyword(name: impl Into<QName>) -> Self {
        Sexp::Keyword(name.into())
    }

    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Sexp::Str(s.into())
    }

    /// String form of a scalar; `None` for collections and nodes.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Sexp::Str(s) => Some(s.to_string()),
            Sexp::Int(i) => Some(i.to_string()),
            Sexp::Float(f) => Some(float_text(*f)),
            Sexp::Bool(b) => Some(b.to_string()),
            Sexp::Keyword(q) => Some(q.local_name.to_string()),
            Sexp::Nil => Some(String::new()),
            Sexp::Vector(_) | Sexp::List(_) | Sexp::Map(_) | Sexp::Node(_) => None,
        }
    }

    /// Reads every form of `src`.
    pub fn parse_all(src: &str) -> Result<Vec<Sexp>> {
        let mut reader = LiteralReader::new(src);
        let mut forms = Vec::new();
        loop {
            reader.skip_whitespace();
            if reader.at_end() {
                return Ok(forms);
            }
            forms.push(reader.read_form()?);
        }
    }

    /// Reads exactly one form.
    pub fn parse(src: &str) -> Result<Sexp> {
        let mut forms = Self::parse_all(src)?;
        if forms.len() != 1 {
            return Err(Error::invalid_literal(
                format!("expected one form, found {}", forms.len()),
                0,
            ));
        }
        Ok(forms.remove(0))
    }
}

impl From<&str> for Sexp {
    fn from(s: &str) -> Self {
        Sexp::str(s)
    }
}

impl From<Node> for Sexp {
    fn from(n: Node) -> Self {
        Sexp::Node(n)
    }
}

// ============================================================================
// Konvertierung Sexp -> Node
// ============================================================================

/// Converts one literal into the nodes it stands for (zero, one or many).
pub fn sexp_as_nodes(expr: &Sexp) -> Result<Vec<Node>> {
    let mut out = Vec::new();
    push_nodes(expr, &mut out)?;
    Ok(out)
}

/// Converts several sibling literals.
pub fn sexps_as_nodes(exprs: &[Sexp]) -> Result<Vec<Node>> {
    let mut out = Vec::new();
    for expr in exprs {
        push_nodes(expr, &mut out)?;
    }
    Ok(out)
}

/// Converts sibling literals that must yield exactly one root.
pub fn to_single_root(exprs: &[Sexp]) -> Result<Node> {
    let mut nodes = sexps_as_nodes(exprs)?;
    if nodes.len() != 1 {
        return Err(Error::InvalidStructure { roots: nodes.len() });
    }
    Ok(nodes.remove(0))
}

fn push_nodes(expr: &Sexp, out: &mut Vec<Node>) -> Result<()> {
    match expr {
        Sexp::Vector(items) => out.push(element_form(items)?),
        Sexp::List(items) => {
            for item in items {
                push_nodes(item, out)?;
            }
        }
        Sexp::Keyword(tag) => out.push(Node::Element(Element::empty(tag.clone()))),
        Sexp::Nil => {}
        Sexp::Node(node) => out.push(node.clone()),
        Sexp::Map(_) => {
            return Err(Error::invalid_literal("attribute map outside of element form", 0));
        }
        scalar => {
            // scalar_text ist fuer alle uebrigen Varianten Some
            if let Some(text) = scalar.scalar_text() {
                out.push(Node::text(text));
            }
        }
    }
    Ok(())
}

fn element_form(items: &[Sexp]) -> Result<Node> {
    let Some((head, rest)) = items.split_first() else {
        return Err(Error::invalid_literal("empty element form", 0));
    };
    let Sexp::Keyword(tag) = head else {
        return Err(Error::invalid_literal(
            format!("element form must start with a keyword, found {head:?}"),
            0,
        ));
    };

    let (attrs, content) = match rest.split_first() {
        Some((Sexp::Map(entries), content)) => (coerce_attrs(entries)?, content),
        _ => (Attributes::new(), rest),
    };

    if is_reserved(tag, CDATA_TAG) {
        return Ok(Node::cdata(single_text(content, CDATA_TAG)?));
    }
    if is_reserved(tag, COMMENT_TAG) {
        return Ok(Node::comment(single_text(content, COMMENT_TAG)?));
    }

    let mut children = Vec::with_capacity(content.len());
    for item in content {
        push_nodes(item, &mut children)?;
    }
    Ok(Node::Element(Element::new(tag.clone(), attrs, children)))
}

fn is_reserved(tag: &QName, reserved: &str) -> bool {
    tag.prefix.is_none() && tag.uri.is_none() && &*tag.local_name == reserved
}

fn single_text(content: &[Sexp], tag: &str) -> Result<String> {
    match content {
        [] => Ok(String::new()),
        [item] => item.scalar_text().ok_or_else(|| {
            Error::invalid_literal(format!("{tag} content must be a scalar"), 0)
        }),
        _ => Err(Error::invalid_literal(
            format!("{tag} takes a single content item, found {}", content.len()),
            0,
        )),
    }
}

fn coerce_attrs(entries: &[(QName, Sexp)]) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    for (name, value) in entries {
        let text = value.scalar_text().ok_or_else(|| {
            Error::invalid_literal(format!("attribute '{name}' needs a scalar value"), 0)
        })?;
        attrs.insert(name.clone(), text);
    }
    Ok(attrs)
}

// ============================================================================
// Text-Reader fuer die Literal-Notation
// ============================================================================

struct LiteralReader<'a> {
    src: &'a str,
    pos: usize,
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(b, b',' | b'[' | b']' | b'(' | b')' | b'{' | b'}' | b'"' | b';')
}

impl<'a> LiteralReader<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::invalid_literal(message, self.pos)
    }

    /// Whitespace, Kommas und `;`-Kommentare ueberspringen.
    fn skip_whitespace(&mut self) {
        let bytes = self.src.as_bytes();
        while let Some(&b) = bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b == b',' {
                self.pos += 1;
            } else if b == b';' {
                self.pos = match memchr(b'\n', &bytes[self.pos..]) {
                    Some(off) => self.pos + off + 1,
                    None => bytes.len(),
                };
            } else {
                break;
            }
        }
    }

    fn read_form(&mut self) -> Result<Sexp> {
        let Some(b) = self.peek() else {
            return Err(self.err("unexpected end of input"));
        };
        match b {
            b'[' => {
                self.pos += 1;
                Ok(Sexp::Vector(self.read_until(b']')?))
            }
            b'(' => {
                self.pos += 1;
                Ok(Sexp::List(self.read_until(b')')?))
            }
            b'{' => {
                let start = self.pos;
                self.pos += 1;
                self.read_map(start)
            }
            b']' | b')' | b'}' => Err(self.err(format!("unexpected '{}'", b as char))),
            b'"' => self.read_string(),
            b':' => {
                self.pos += 1;
                let token = self.read_token();
                if token.is_empty() {
                    return Err(self.err("empty keyword"));
                }
                Ok(Sexp::Keyword(keyword_name(token)))
            }
            _ => {
                let start = self.pos;
                let token = self.read_token();
                atom(token).ok_or_else(|| {
                    Error::invalid_literal(format!("unknown symbol '{token}'"), start)
                })
            }
        }
    }

    fn read_until(&mut self, close: u8) -> Result<Vec<Sexp>> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.err(format!("missing '{}'", close as char))),
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    fn read_map(&mut self, start: usize) -> Result<Sexp> {
        let forms = self.read_until(b'}')?;
        if forms.len() % 2 != 0 {
            return Err(Error::invalid_literal("map needs an even number of forms", start));
        }
        let mut entries = Vec::with_capacity(forms.len() / 2);
        let mut it = forms.into_iter();
        while let (Some(key), Some(value)) = (it.next(), it.next()) {
            let Sexp::Keyword(name) = key else {
                return Err(Error::invalid_literal("map keys must be keywords", start));
            };
            entries.push((name, value));
        }
        Ok(Sexp::Map(entries))
    }

    fn read_string(&mut self) -> Result<Sexp> {
        let start = self.pos;
        self.pos += 1;
        let bytes = self.src.as_bytes();
        let mut out = String::new();
        loop {
            let Some(off) = memchr2(b'"', b'\\', &bytes[self.pos..]) else {
                return Err(Error::invalid_literal("unterminated string", start));
            };
            out.push_str(&self.src[self.pos..self.pos + off]);
            self.pos += off;
            if bytes[self.pos] == b'"' {
                self.pos += 1;
                return Ok(Sexp::Str(out.into()));
            }
            let escaped = match bytes.get(self.pos + 1) {
                Some(b'"') => '"',
                Some(b'\\') => '\\',
                Some(b'n') => '\n',
                Some(b't') => '\t',
                Some(b'r') => '\r',
                _ => return Err(self.err("invalid escape sequence")),
            };
            out.push(escaped);
            self.pos += 2;
        }
    }

    fn read_token(&mut self) -> &'a str {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && !is_delimiter(bytes[self.pos]) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }
}

/// `p/local` and `p:local` are prefixed names; anything else is local.
fn keyword_name(token: &str) -> QName {
    match token.split_once('/') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
            QName::prefixed(prefix, local)
        }
        _ => QName::parse(token),
    }
}

fn atom(token: &str) -> Option<Sexp> {
    match token {
        "nil" => Some(Sexp::Nil),
        "true" => Some(Sexp::Bool(true)),
        "false" => Some(Sexp::Bool(false)),
        _ => token
            .parse::<i64>()
            .map(Sexp::Int)
            .ok()
            .or_else(|| token.parse::<f64>().ok().filter(|f| f.is_finite()).map(Sexp::Float)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, content: Vec<Node>) -> Node {
        Node::element(tag, Attributes::new(), content)
    }

    #[test]
    fn nested_element_form() {
        let expr = Sexp::parse(r#"[:a [:b "x"] "y"]"#).unwrap();
        let nodes = sexp_as_nodes(&expr).unwrap();
        assert_eq!(
            nodes,
            vec![el("a", vec![el("b", vec![Node::text("x")]), Node::text("y")])]
        );
    }

    #[test]
    fn attribute_values_coerced() {
        let expr = Sexp::parse(r#"[:a {:n 1, :f 1.5, :w 2.0, :b true, :k :kw, :s "s", :z nil}]"#).unwrap();
        let node = to_single_root(&[expr]).unwrap();
        let attrs = node.as_element().unwrap().attrs();
        assert_eq!(attrs.get_local("n"), Some("1"));
        assert_eq!(attrs.get_local("f"), Some("1.5"));
        assert_eq!(attrs.get_local("w"), Some("2.0"));
        assert_eq!(attrs.get_local("b"), Some("true"));
        assert_eq!(attrs.get_local("k"), Some("kw"));
        assert_eq!(attrs.get_local("s"), Some("s"));
        assert_eq!(attrs.get_local("z"), Some(""));
    }

    #[test]
    fn list_is_spliced() {
        let expr = Sexp::parse(r#"[:a ("x" [:b] "y") "z"]"#).unwrap();
        let node = to_single_root(&[expr]).unwrap();
        assert_eq!(
            node,
            el("a", vec![Node::text("x"), el("b", vec![]), Node::text("y"), Node::text("z")])
        );
    }

    #[test]
    fn bare_keyword_is_empty_element() {
        let nodes = sexp_as_nodes(&Sexp::keyword("br")).unwrap();
        assert_eq!(nodes, vec![el("br", vec![])]);
    }

    #[test]
    fn nil_contributes_nothing() {
        let expr = Sexp::parse("[:a nil 1 nil]").unwrap();
        let node = to_single_root(&[expr]).unwrap();
        assert_eq!(node, el("a", vec![Node::text("1")]));
        assert!(sexp_as_nodes(&Sexp::Nil).unwrap().is_empty());
    }

    #[test]
    fn reserved_cdata_and_comment() {
        let expr = Sexp::parse(r#"[:a [:-cdata "<x>"] [:-comment "note"]]"#).unwrap();
        let node = to_single_root(&[expr]).unwrap();
        assert_eq!(
            node,
            el("a", vec![Node::cdata("<x>"), Node::comment("note")])
        );
    }

    #[test]
    fn cdata_mit_mehreren_items_ist_fehler() {
        let expr = Sexp::parse(r#"[:-cdata "a" "b"]"#).unwrap();
        assert!(matches!(sexp_as_nodes(&expr), Err(Error::InvalidLiteral { .. })));
    }

    #[test]
    fn single_root_rejects_zero_and_many() {
        let two = Sexp::parse_all("[:a] [:b]").unwrap();
        assert_eq!(to_single_root(&two), Err(Error::InvalidStructure { roots: 2 }));
        assert_eq!(to_single_root(&[Sexp::Nil]), Err(Error::InvalidStructure { roots: 0 }));
        assert_eq!(to_single_root(&[]), Err(Error::InvalidStructure { roots: 0 }));
    }

    #[test]
    fn single_root_through_list() {
        let expr = Sexp::parse("([:a] [:b])").unwrap();
        assert_eq!(to_single_root(&[expr]), Err(Error::InvalidStructure { roots: 2 }));
    }

    #[test]
    fn prefixed_keywords() {
        let expr = Sexp::parse("[:svg/rect {:xlink/href \"#a\"}]").unwrap();
        let node = to_single_root(&[expr]).unwrap();
        let el = node.as_element().unwrap();
        assert_eq!(el.tag().prefix.as_deref(), Some("svg"));
        assert_eq!(el.attrs().get(&QName::prefixed("xlink", "href")), Some("#a"));

        let colon = Sexp::parse(":svg:rect").unwrap();
        assert_eq!(colon, Sexp::Keyword(QName::prefixed("svg", "rect")));
    }

    #[test]
    fn prebuilt_node_passes_through() {
        let inner = el("b", vec![Node::text("x")]);
        let expr = Sexp::Vector(vec![Sexp::keyword("a"), Sexp::Node(inner.clone())]);
        assert_eq!(to_single_root(&[expr]).unwrap(), el("a", vec![inner]));
    }

    #[test]
    fn vector_without_keyword_head_fails() {
        let expr = Sexp::parse(r#"["a" "b"]"#).unwrap();
        assert!(matches!(sexp_as_nodes(&expr), Err(Error::InvalidLiteral { .. })));
    }

    #[test]
    fn reader_strings_and_comments() {
        let forms = Sexp::parse_all("; leading comment\n\"a\\\"b\\n\" 42 -7 2.5 false").unwrap();
        assert_eq!(
            forms,
            vec![
                Sexp::str("a\"b\n"),
                Sexp::Int(42),
                Sexp::Int(-7),
                Sexp::Float(2.5),
                Sexp::Bool(false),
            ]
        );
    }

    #[test]
    fn reader_errors_carry_offset() {
        let err = Sexp::parse_all("[:a ]]").unwrap_err();
        assert_eq!(err, Error::invalid_literal("unexpected ']'", 5));
        assert!(matches!(
            Sexp::parse_all("[:a \"open"),
            Err(Error::InvalidLiteral { offset: 4, .. })
        ));
        assert!(matches!(Sexp::parse_all("{:a}"), Err(Error::InvalidLiteral { .. })));
        assert!(matches!(Sexp::parse_all("[:a foo]"), Err(Error::InvalidLiteral { .. })));
        assert!(matches!(Sexp::parse_all("[:a"), Err(Error::InvalidLiteral { .. })));
    }
}
