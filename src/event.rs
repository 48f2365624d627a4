//! Flat event model.
//!
//! A well-formed event sequence is balanced: every start-element has a later
//! end-element with the same name, nested in strict stack order.

use std::rc::Rc;

use crate::node::Attributes;
use crate::qname::QName;

/// The kind of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartElement,
    EndElement,
    Characters,
    CData,
    Comment,
}

/// One unit of a flattened document.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Opens an element.
    StartElement { name: QName, attrs: Attributes },
    /// Closes the element opened with the same name.
    EndElement { name: QName },
    /// Character data.
    Characters(Rc<str>),
    /// Verbatim character data (CDATA section).
    CData(Rc<str>),
    /// A comment.
    Comment(Rc<str>),
}

impl Event {
    pub fn start(name: impl Into<QName>, attrs: Attributes) -> Self {
        Event::StartElement { name: name.into(), attrs }
    }

    pub fn end(name: impl Into<QName>) -> Self {
        Event::EndElement { name: name.into() }
    }

    pub fn characters(text: impl Into<Rc<str>>) -> Self {
        Event::Characters(text.into())
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::StartElement { .. } => EventKind::StartElement,
            Event::EndElement { .. } => EventKind::EndElement,
            Event::Characters(_) => EventKind::Characters,
            Event::CData(_) => EventKind::CData,
            Event::Comment(_) => EventKind::Comment,
        }
    }

    /// Element name of start/end events.
    pub fn name(&self) -> Option<&QName> {
        match self {
            Event::StartElement { name, .. } | Event::EndElement { name } => Some(name),
            _ => None,
        }
    }

    /// Attributes of a start event.
    pub fn attrs(&self) -> Option<&Attributes> {
        match self {
            Event::StartElement { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    /// Text of characters, CData and comment events.
    pub fn text(&self) -> Option<&str> {
        match self {
            Event::Characters(s) | Event::CData(s) | Event::Comment(s) => Some(s),
            _ => None,
        }
    }
}
