//! Immutable document tree.
//!
//! Nodes are built by the tree bridge (from events), by direct construction
//! or from literal notation, and are only read afterwards. Content order is
//! significant and kept through every transformation.

use std::rc::Rc;

use crate::qname::QName;

/// Ordered attribute mapping with unique keys.
///
/// Keys are compared as attribute names (see [`same_attribute`]); inserting
/// a key that is already present replaces its value in place. Equality
/// between two mappings ignores order (XML attribute order carries no
/// meaning).
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: Vec<(QName, Rc<str>)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces. Returns the previous value.
    ///
    /// An unprefixed, unresolved key only replaces a key in no namespace:
    /// `k` does not overwrite `{urn:x}k`.
    pub fn insert(&mut self, name: QName, value: impl Into<Rc<str>>) -> Option<Rc<str>> {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| same_attribute(k, &name)) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Builder-Variante von [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<QName>, value: impl Into<Rc<str>>) -> Self {
        self.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &QName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| same_attribute(k, name))
            .map(|(_, v)| &**v)
    }

    /// Lookup by local name only, ignoring namespaces.
    pub fn get_local(&self, local_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| &*k.local_name == local_name)
            .map(|(_, v)| &**v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QName, &str)> {
        self.entries.iter().map(|(k, v)| (k, &**v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key equality for attributes.
///
/// Like [`QName`] equality, except that an unprefixed unresolved name counts
/// as "no namespace" (unprefixed attributes never take the default
/// namespace) when compared with a resolved one.
pub fn same_attribute(a: &QName, b: &QName) -> bool {
    if a.local_name != b.local_name {
        return false;
    }
    match (&a.uri, &b.uri) {
        (Some(ua), Some(ub)) => ua == ub,
        (Some(uri), None) if b.prefix.is_none() => uri.is_empty(),
        (None, Some(uri)) if a.prefix.is_none() => uri.is_empty(),
        _ => a.prefix == b.prefix,
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<QName>, V: Into<Rc<str>>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k.into(), v);
        }
        attrs
    }
}

/// An element: tag, attributes and ordered content.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: QName,
    attrs: Attributes,
    content: Vec<Node>,
}

impl Element {
    pub fn new(
        tag: impl Into<QName>,
        attrs: Attributes,
        content: impl IntoIterator<Item = Node>,
    ) -> Self {
        Self {
            tag: tag.into(),
            attrs,
            content: content.into_iter().collect(),
        }
    }

    /// Like [`new`](Self::new), but drops absent items.
    pub fn from_optional(
        tag: impl Into<QName>,
        attrs: Attributes,
        content: impl IntoIterator<Item = Option<Node>>,
    ) -> Self {
        Self::new(tag, attrs, content.into_iter().flatten())
    }

    /// Element without attributes and content.
    pub fn empty(tag: impl Into<QName>) -> Self {
        Self::new(tag, Attributes::new(), [])
    }

    pub fn tag(&self) -> &QName {
        &self.tag
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    /// Child elements only, in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.content.iter().filter_map(Node::as_element)
    }

    /// Concatenated text and CData of the whole subtree.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.content, &mut out);
        out
    }
}

fn collect_text(content: &[Node], out: &mut String) {
    let mut pending: Vec<&[Node]> = vec![content];
    while let Some(level) = pending.pop() {
        let Some((node, rest)) = level.split_first() else {
            continue;
        };
        pending.push(rest);
        match node {
            Node::Element(el) => pending.push(&el.content),
            Node::Text(s) | Node::CData(s) => out.push_str(s),
            Node::Comment(_) => {}
        }
    }
}

/// Abbau ohne Rekursion: Kinder werden vor dem Drop ausgehaengt, damit tiefe
/// Baeume den Call-Stack nicht sprengen.
impl Drop for Element {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.content);
        while let Some(node) = pending.pop() {
            if let Node::Element(mut el) = node {
                pending.append(&mut el.content);
            }
        }
    }
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data.
    Text(Rc<str>),
    /// Verbatim character data, written as a CDATA section.
    CData(Rc<str>),
    Comment(Rc<str>),
}

impl Node {
    pub fn element(
        tag: impl Into<QName>,
        attrs: Attributes,
        content: impl IntoIterator<Item = Node>,
    ) -> Self {
        Node::Element(Element::new(tag, attrs, content))
    }

    pub fn text(s: impl Into<Rc<str>>) -> Self {
        Node::Text(s.into())
    }

    pub fn cdata(s: impl Into<Rc<str>>) -> Self {
        Node::CData(s.into())
    }

    pub fn comment(s: impl Into<Rc<str>>) -> Self {
        Node::Comment(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::text(s)
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_items_are_dropped() {
        let el = Element::from_optional(
            "a",
            Attributes::new(),
            [Some(Node::text("x")), None, Some(Node::comment("c")), None],
        );
        assert_eq!(el.content(), &[Node::text("x"), Node::comment("c")]);
    }

    #[test]
    fn attribute_keys_unique() {
        let mut attrs = Attributes::new();
        assert_eq!(attrs.insert(QName::local("id"), "1"), None);
        assert_eq!(attrs.insert(QName::local("id"), "2").as_deref(), Some("1"));
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get(&QName::local("id")), Some("2"));
    }

    #[test]
    fn unprefixed_key_does_not_replace_namespaced_key() {
        let mut attrs = Attributes::new();
        attrs.insert(QName::resolved("urn:x", "k"), "ns");
        assert_eq!(attrs.insert(QName::local("k"), "plain"), None);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get(&QName::resolved("urn:x", "k")), Some("ns"));
        assert_eq!(attrs.get(&QName::local("k")), Some("plain"));
        assert_eq!(attrs.get(&QName::resolved("", "k")), Some("plain"));
    }

    #[test]
    fn unprefixed_key_matches_no_namespace() {
        let mut attrs = Attributes::new().with(QName::resolved("", "k"), "1");
        assert_eq!(attrs.insert(QName::local("k"), "2").as_deref(), Some("1"));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn tiefer_baum_wird_ohne_rekursion_abgebaut() {
        let mut node = Node::text("leaf");
        for _ in 0..100_000 {
            node = Node::element("e", Attributes::new(), [node]);
        }
        assert_eq!(node.as_element().map(Element::text).as_deref(), Some("leaf"));
        drop(node);
    }

    #[test]
    fn attribute_equality_ignores_order() {
        let a: Attributes = [("x", "1"), ("y", "2")].into_iter().collect();
        let b: Attributes = [("y", "2"), ("x", "1")].into_iter().collect();
        let c: Attributes = [("y", "2"), ("x", "3")].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn attributes_namespace_aware_lookup() {
        let attrs = Attributes::new().with(QName::with_prefix("urn:x", "id", "p"), "7");
        assert_eq!(attrs.get(&QName::prefixed("p", "id")), Some("7"));
        assert_eq!(attrs.get(&QName::resolved("urn:y", "id")), None);
        assert_eq!(attrs.get_local("id"), Some("7"));
    }

    #[test]
    fn element_text_and_children() {
        let el = Element::new(
            "a",
            Attributes::new(),
            [
                Node::element("b", Attributes::new(), [Node::text("x")]),
                Node::comment("ignored"),
                Node::text("y"),
                Node::cdata("<z>"),
            ],
        );
        assert_eq!(el.text(), "xy<z>");
        assert_eq!(el.children().count(), 1);
        assert_eq!(el.children().next().map(|c| c.tag().to_string()), Some("b".into()));
    }

    #[test]
    fn content_order_matters() {
        let a = Node::element("a", Attributes::new(), [Node::text("1"), Node::text("2")]);
        let b = Node::element("a", Attributes::new(), [Node::text("2"), Node::text("1")]);
        assert_ne!(a, b);
    }
}
