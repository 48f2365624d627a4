//! Integrationstests: Baum → Events → Baum, und Baum → Bytes → Baum.

use xmlbridge::options::{ReadOptions, WriteOptions};
use xmlbridge::tree::collect_nodes;
use xmlbridge::{
    Attributes, Content, Event, Node, QName, emit, emit_node, emit_str, flatten, flatten_node,
    parse, parse_str,
};

// ============================================================================
// Hilfsfunktionen
// ============================================================================

fn el(tag: impl Into<QName>, attrs: Attributes, content: impl IntoIterator<Item = Node>) -> Node {
    Node::element(tag, attrs, content)
}

fn no_decl() -> WriteOptions {
    WriteOptions::default().with_declaration(false)
}

fn to_string(node: &Node, opts: &WriteOptions) -> String {
    String::from_utf8(emit_node(node, Vec::new(), opts).unwrap()).unwrap()
}

fn sample() -> Node {
    el(
        QName::resolved("urn:x", "a"),
        Attributes::new()
            .with("id", "1")
            .with(QName::resolved("urn:y", "k"), "v & \"w\""),
        [
            el(QName::with_prefix("urn:p", "b", "p"), Attributes::new(), [Node::text("x < y")]),
            Node::text("tail"),
            el(QName::resolved("", "c"), Attributes::new(), []),
        ],
    )
}

// ============================================================================
// Baum <-> Events
// ============================================================================

#[test]
fn tree_events_tree() {
    let tree = sample();
    let events: Vec<Event> = flatten_node(&tree).collect();
    assert_eq!(events.len(), 8);
    let rebuilt = collect_nodes(events).unwrap();
    assert_eq!(rebuilt, vec![tree]);
}

#[test]
fn sibling_roots_survive() {
    let roots = vec![
        Content::from(el("a", Attributes::new(), [Node::text("1")])),
        Content::from(el("b", Attributes::new(), [])),
    ];
    let rebuilt = collect_nodes(flatten(&roots)).unwrap();
    assert_eq!(
        rebuilt,
        vec![el("a", Attributes::new(), [Node::text("1")]), el("b", Attributes::new(), [])]
    );
}

#[test]
fn scalar_content_becomes_text() {
    let roots = vec![Content::from(Node::element("a", Attributes::new(), []))];
    let mut events: Vec<Event> = flatten(&roots).collect();
    // Skalare direkt als Inhalt einfuegen
    let extra = vec![Content::Int(42), Content::Bool(false), Content::Absent];
    events.splice(1..1, flatten(&extra));
    let rebuilt = collect_nodes(events).unwrap();
    let a = rebuilt[0].as_element().unwrap();
    assert_eq!(a.content(), &[Node::text("42"), Node::text("false"), Node::text("")]);
}

// ============================================================================
// Baum <-> Bytes
// ============================================================================

#[test]
fn tree_bytes_tree() {
    let tree = sample();
    let xml = emit_str(&tree).unwrap();
    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    let back = parse_str(&xml).unwrap();
    assert_eq!(back, tree);
}

#[test]
fn emitted_xml_is_namespace_correct() {
    let xml = emit_str(&sample()).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().namespace(), Some("urn:x"));
    assert_eq!(root.tag_name().name(), "a");
    assert_eq!(root.attribute("id"), Some("1"));
    assert_eq!(root.attribute(("urn:y", "k")), Some("v & \"w\""));

    let children: Vec<_> = root.children().filter(|n| n.is_element()).collect();
    assert_eq!(children[0].tag_name().namespace(), Some("urn:p"));
    assert_eq!(children[0].text(), Some("x < y"));
    assert_eq!(children[1].tag_name().namespace(), None);
}

#[test]
fn document_parse_emit_parse_is_stable() {
    let xml = r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:item p:n="1" plain="2">one</p:item><item>two &amp; three</item></r>"#;
    let first = parse_str(xml).unwrap();
    let again = parse_str(&emit_str(&first).unwrap()).unwrap();
    assert_eq!(again, first);

    let root = first.as_element().unwrap();
    let items: Vec<_> = root.children().collect();
    assert_eq!(items[0].tag().uri.as_deref(), Some("urn:p"));
    assert_eq!(items[0].attrs().get(&QName::resolved("urn:p", "n")), Some("1"));
    assert_eq!(items[1].tag().uri.as_deref(), Some("urn:d"));
    assert_eq!(items[1].text(), "two & three");
}

#[test]
fn prefixes_survive_when_in_scope() {
    let xml = r#"<p:a xmlns:p="urn:p"><p:b/></p:a>"#;
    let node = parse_str(xml).unwrap();
    assert_eq!(to_string(&node, &no_decl()), xml);
}

#[test]
fn comments_and_cdata_lossless() {
    let xml = "<a>\n  <!--c--><![CDATA[<x>]]></a>";
    let node = parse(xml.as_bytes(), ReadOptions::lossless()).unwrap();
    let a = node.as_element().unwrap();
    assert_eq!(
        a.content(),
        &[Node::text("\n  "), Node::comment("c"), Node::cdata("<x>")]
    );
    assert_eq!(to_string(&node, &no_decl()), xml);
}

#[test]
fn emit_writes_into_any_sink() {
    let roots = vec![Content::from(sample())];
    let mut sink: Vec<u8> = Vec::new();
    emit(&roots, &mut sink, &no_decl()).unwrap();
    let text = String::from_utf8(sink).unwrap();
    assert!(text.starts_with(r#"<a xmlns="urn:x""#));
    assert!(roxmltree::Document::parse(&text).is_ok());
}
