//! Heterogeneous content → flat event stream, lazily.
//!
//! [`Content`] is the closed set of things that can be flattened: elements,
//! pre-built events, ordered sequences, text, booleans, numbers, CData,
//! comments and absent values. Every item has a first event and a rest: what
//! has to be processed after it, given the pending work-list.
//!
//! | Item | first event | rest |
//! |---|---|---|
//! | element | start-element | content, end-element, continuation |
//! | sequence | first event of its head | head's rest, with the tail queued in front of the continuation |
//! | text / bool / number | characters | continuation |
//! | CData / comment | CData / comment | continuation |
//! | event | the event itself | continuation |
//! | absent | empty characters | continuation |
//!
//! [`flatten`] keeps the work-list as a stack and emits events in document
//! pre-order, one per `next()` call. Nothing is computed ahead of demand.

use std::rc::Rc;

use crate::event::Event;
use crate::node::{Element, Node};
use crate::qname::QName;

/// Anything that can be flattened into events.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Element(Element),
    /// A pre-built event, passed through unchanged.
    Event(Event),
    /// Ordered sequence, flattened in place.
    Seq(Vec<Content>),
    Text(Rc<str>),
    Bool(bool),
    Int(i64),
    Float(f64),
    CData(Rc<str>),
    Comment(Rc<str>),
    /// Absent value: still occupies one (empty) characters event.
    Absent,
}

impl From<Node> for Content {
    fn from(node: Node) -> Self {
        match node {
            Node::Element(el) => Content::Element(el),
            Node::Text(s) => Content::Text(s),
            Node::CData(s) => Content::CData(s),
            Node::Comment(s) => Content::Comment(s),
        }
    }
}

impl From<Element> for Content {
    fn from(el: Element) -> Self {
        Content::Element(el)
    }
}

impl From<Event> for Content {
    fn from(ev: Event) -> Self {
        Content::Event(ev)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.into())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s.into())
    }
}

impl From<bool> for Content {
    fn from(b: bool) -> Self {
        Content::Bool(b)
    }
}

impl From<i64> for Content {
    fn from(i: i64) -> Self {
        Content::Int(i)
    }
}

impl From<f64> for Content {
    fn from(f: f64) -> Self {
        Content::Float(f)
    }
}

impl<T: Into<Content>> From<Vec<T>> for Content {
    fn from(items: Vec<T>) -> Self {
        Content::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Content>> From<Option<T>> for Content {
    fn from(item: Option<T>) -> Self {
        item.map_or(Content::Absent, Into::into)
    }
}

/// Canonical text of a float: Rust `Display`, but whole values keep a `.0`
/// so they still read back as floats (`1.0`, not `1`).
pub(crate) fn float_text(f: f64) -> String {
    let text = f.to_string();
    if f.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

/// One entry of the work-list. Slices are sequences whose tail is pushed
/// back on demand instead of being expanded eagerly.
#[derive(Debug, Clone, Copy)]
enum Work<'a> {
    Content(&'a Content),
    Node(&'a Node),
    Contents(&'a [Content]),
    Nodes(&'a [Node]),
    End(&'a QName),
}

fn start_of(el: &Element) -> Event {
    Event::StartElement { name: el.tag().clone(), attrs: el.attrs().clone() }
}

/// Wie `rest_events` fuer Elemente: Inhalt, dann End-Event, dann Fortsetzung.
fn push_element_rest<'a>(el: &'a Element, stack: &mut Vec<Work<'a>>) {
    stack.push(Work::End(el.tag()));
    if !el.content().is_empty() {
        stack.push(Work::Nodes(el.content()));
    }
}

impl<'a> Work<'a> {
    fn first_event(&self) -> Event {
        match *self {
            Work::Node(node) => match node {
                Node::Element(el) => start_of(el),
                Node::Text(s) => Event::Characters(Rc::clone(s)),
                Node::CData(s) => Event::CData(Rc::clone(s)),
                Node::Comment(s) => Event::Comment(Rc::clone(s)),
            },
            Work::Content(content) => match content {
                Content::Element(el) => start_of(el),
                Content::Event(ev) => ev.clone(),
                Content::Seq(items) => Work::Contents(items).first_event(),
                Content::Text(s) => Event::Characters(Rc::clone(s)),
                Content::Bool(b) => Event::characters(b.to_string()),
                Content::Int(i) => Event::characters(i.to_string()),
                Content::Float(f) => Event::characters(float_text(*f)),
                Content::CData(s) => Event::CData(Rc::clone(s)),
                Content::Comment(s) => Event::Comment(Rc::clone(s)),
                Content::Absent => Event::characters(""),
            },
            // Leere Sequenz verhaelt sich wie ein fehlender Wert
            Work::Contents(items) => match items.first() {
                Some(head) => Work::Content(head).first_event(),
                None => Event::characters(""),
            },
            Work::Nodes(nodes) => match nodes.first() {
                Some(head) => Work::Node(head).first_event(),
                None => Event::characters(""),
            },
            Work::End(name) => Event::EndElement { name: name.clone() },
        }
    }

    /// Pushes what follows this item on top of the continuation `stack`.
    fn rest_events(self, stack: &mut Vec<Work<'a>>) {
        match self {
            Work::Node(Node::Element(el)) | Work::Content(Content::Element(el)) => {
                push_element_rest(el, stack);
            }
            Work::Content(Content::Seq(items)) => Work::Contents(items).rest_events(stack),
            Work::Contents(items) => {
                if let Some((head, tail)) = items.split_first() {
                    if !tail.is_empty() {
                        stack.push(Work::Contents(tail));
                    }
                    Work::Content(head).rest_events(stack);
                }
            }
            Work::Nodes(nodes) => {
                if let Some((head, tail)) = nodes.split_first() {
                    if !tail.is_empty() {
                        stack.push(Work::Nodes(tail));
                    }
                    Work::Node(head).rest_events(stack);
                }
            }
            Work::Node(_) | Work::Content(_) | Work::End(_) => {}
        }
    }
}

/// Lazy, single-pass event stream over borrowed content.
#[derive(Debug, Clone)]
pub struct Events<'a> {
    stack: Vec<Work<'a>>,
}

impl Iterator for Events<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let head = self.stack.pop()?;
        let event = head.first_event();
        head.rest_events(&mut self.stack);
        Some(event)
    }
}

/// Flattens `roots` into events in document pre-order.
pub fn flatten(roots: &[Content]) -> Events<'_> {
    let mut stack = Vec::new();
    if !roots.is_empty() {
        stack.push(Work::Contents(roots));
    }
    Events { stack }
}

/// Flattens a slice of nodes.
pub fn flatten_nodes(roots: &[Node]) -> Events<'_> {
    let mut stack = Vec::new();
    if !roots.is_empty() {
        stack.push(Work::Nodes(roots));
    }
    Events { stack }
}

/// Flattens a single node.
pub fn flatten_node(root: &Node) -> Events<'_> {
    flatten_nodes(std::slice::from_ref(root))
}
