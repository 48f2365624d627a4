//! XML text → [`Event`]s, one at a time.
//!
//! [`XmlEventReader`] wraps a `quick_xml::NsReader` as a pull cursor. It is
//! the only place where raw text is tokenized; everything downstream works on
//! events.
//!
//! - Names are resolved while reading: tags take the default namespace,
//!   unprefixed attributes are in no namespace. `xmlns` declarations only
//!   feed resolution and are not reported as attributes.
//! - Adjacent text, CDATA sections and entity or character references
//!   coalesce into one characters event (unless CDATA is preserved).
//! - Empty elements expand to a start/end pair.
//! - The XML declaration, DOCTYPE and processing instructions are skipped.
//!   So are comments outside the root element.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::BufRead;
use std::rc::Rc;

use log::trace;
use memchr::memchr;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::name::{QName as XmlQName, ResolveResult};
use quick_xml::reader::NsReader;

use crate::event::Event;
use crate::node::Attributes;
use crate::options::ReadOptions;
use crate::qname::QName;
use crate::{Error, Result};

/// One raw token, already decoded and owned.
enum Raw {
    Start { name: QName, attrs: Attributes, empty: bool },
    End,
    Text(String),
    CData(String),
    Comment(String),
    Skip,
    Eof,
}

/// Pull cursor over an XML document, yielding `Result<Event>` in document
/// order. After the first error the iterator is exhausted.
pub struct XmlEventReader<R> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    opts: ReadOptions,
    /// Namen der offenen Elemente, fuer End-Events.
    open: Vec<QName>,
    /// CH-Coalescing: wird vor jedem Nicht-Text-Event geflusht.
    pending_text: Option<String>,
    queued: VecDeque<Event>,
    done: bool,
}

impl<R: BufRead> XmlEventReader<R> {
    pub fn new(source: R, opts: ReadOptions) -> Self {
        let mut reader = NsReader::from_reader(source);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            opts,
            open: Vec::new(),
            pending_text: None,
            queued: VecDeque::new(),
            done: false,
        }
    }

    pub fn options(&self) -> ReadOptions {
        self.opts
    }

    /// Number of elements opened and not yet closed.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Byte offset of the tokenizer in the source.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position()
    }

    /// Gives the source back, positioned after the last token read.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn read_raw(&mut self) -> Result<Raw> {
        self.buf.clear();
        let raw = match self.reader.read_event_into(&mut self.buf) {
            Ok(XmlEvent::Start(e)) => {
                let (name, attrs) = start_parts(&self.reader, &e)?;
                Raw::Start { name, attrs, empty: false }
            }
            Ok(XmlEvent::Empty(e)) => {
                let (name, attrs) = start_parts(&self.reader, &e)?;
                Raw::Start { name, attrs, empty: true }
            }
            Ok(XmlEvent::End(_)) => Raw::End,
            Ok(XmlEvent::Text(e)) => {
                let raw = utf8(&e)?;
                let text = quick_xml::escape::unescape(raw)
                    .map_err(|er| Error::XmlParseError(er.to_string()))?;
                Raw::Text(normalize_line_endings(&text).into_owned())
            }
            Ok(XmlEvent::CData(e)) => {
                let raw = e.into_inner();
                Raw::CData(normalize_line_endings(utf8(&raw)?).into_owned())
            }
            Ok(XmlEvent::Comment(e)) => Raw::Comment(normalize_line_endings(utf8(&e)?).into_owned()),
            Ok(XmlEvent::GeneralRef(e)) => {
                let name = utf8(&e)?;
                Raw::Text(resolve_reference(name)?)
            }
            Ok(XmlEvent::PI(e)) => {
                trace!("skipping processing instruction ({} bytes)", e.len());
                Raw::Skip
            }
            Ok(XmlEvent::DocType(e)) => {
                trace!("skipping DOCTYPE ({} bytes)", e.len());
                Raw::Skip
            }
            Ok(XmlEvent::Decl(_)) => Raw::Skip,
            Ok(XmlEvent::Eof) => Raw::Eof,
            Err(e) => {
                return Err(Error::XmlParseError(format!(
                    "parse XML error at {}: {e}",
                    self.reader.buffer_position()
                )));
            }
        };
        Ok(raw)
    }

    fn coalesce(&mut self, value: String) -> Result<()> {
        if self.open.is_empty() {
            if !is_xml_whitespace(&value) {
                return Err(Error::XmlParseError(format!(
                    "character data outside root element at {}",
                    self.reader.buffer_position()
                )));
            }
            return Ok(());
        }
        match &mut self.pending_text {
            Some(existing) => existing.push_str(&value),
            None => self.pending_text = Some(value),
        }
        Ok(())
    }

    /// Stellt gepufferten Text vor die bereits eingereihten Events.
    fn flush_text(&mut self) {
        let Some(text) = self.pending_text.take() else {
            return;
        };
        if self.opts.skip_whitespace && is_xml_whitespace(&text) {
            return;
        }
        self.queued.push_front(Event::Characters(Rc::from(text)));
    }

    fn read_next(&mut self) -> Result<Option<Event>> {
        loop {
            match self.read_raw()? {
                Raw::Start { name, attrs, empty } => {
                    self.queued.push_back(Event::StartElement { name: name.clone(), attrs });
                    if empty {
                        self.queued.push_back(Event::EndElement { name });
                    } else {
                        self.open.push(name);
                    }
                }
                Raw::End => {
                    let name = self.open.pop().ok_or_else(|| {
                        Error::XmlParseError(format!(
                            "unexpected end tag at {}",
                            self.reader.buffer_position()
                        ))
                    })?;
                    self.queued.push_back(Event::EndElement { name });
                }
                Raw::Text(value) => {
                    self.coalesce(value)?;
                    continue;
                }
                Raw::CData(value) => {
                    if self.opts.preserve_cdata && !self.open.is_empty() {
                        self.queued.push_back(Event::CData(Rc::from(value)));
                    } else {
                        self.coalesce(value)?;
                        continue;
                    }
                }
                Raw::Comment(text) => {
                    // Kein Flush wenn Comments verworfen werden, Text laeuft weiter
                    if !self.opts.preserve_comments || self.open.is_empty() {
                        continue;
                    }
                    self.queued.push_back(Event::Comment(Rc::from(text)));
                }
                Raw::Skip => continue,
                Raw::Eof => {
                    self.done = true;
                    self.flush_text();
                    if let Some(name) = self.open.last() {
                        return Err(Error::XmlParseError(format!(
                            "unexpected end of input, <{name}> not closed"
                        )));
                    }
                }
            }
            self.flush_text();
            return Ok(self.queued.pop_front());
        }
    }
}

impl<R: BufRead> Iterator for XmlEventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Result<Event>> {
        if let Some(event) = self.queued.pop_front() {
            return Some(Ok(event));
        }
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.queued.clear();
                Some(Err(e))
            }
        }
    }
}

/// Runs `f` with a reader over `source`; the source is released when `f`
/// returns, on success and on error.
pub fn with_reader<R: BufRead, T>(
    source: R,
    opts: ReadOptions,
    f: impl FnOnce(&mut XmlEventReader<R>) -> Result<T>,
) -> Result<T> {
    let mut reader = XmlEventReader::new(source, opts);
    f(&mut reader)
}

fn start_parts<R>(reader: &NsReader<R>, e: &BytesStart<'_>) -> Result<(QName, Attributes)> {
    let (ns, local) = reader.resolver().resolve_element(e.name());
    let name = make_qname(ns, local.as_ref(), e.name())?;

    let mut attrs = Attributes::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|er| Error::XmlParseError(er.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (ns, local) = reader.resolver().resolve_attribute(attr.key);
        let qname = make_qname(ns, local.as_ref(), attr.key)?;
        let raw = utf8(&attr.value)?;
        let value = quick_xml::escape::unescape(raw)
            .map_err(|er| Error::XmlParseError(er.to_string()))?;
        attrs.insert(qname, normalize_line_endings(&value).as_ref());
    }
    Ok((name, attrs))
}

fn make_qname(ns: ResolveResult<'_>, local: &[u8], raw: XmlQName<'_>) -> Result<QName> {
    let uri: Rc<str> = match ns {
        ResolveResult::Bound(ns) => Rc::from(utf8(ns.as_ref())?),
        ResolveResult::Unbound => Rc::from(""),
        ResolveResult::Unknown(prefix) => {
            return Err(Error::unresolved_prefix(String::from_utf8_lossy(&prefix)));
        }
    };
    let prefix = match raw.prefix() {
        Some(p) => Some(Rc::from(utf8(p.as_ref())?)),
        None => None,
    };
    Ok(QName::from_parts(Rc::from(utf8(local)?), prefix, Some(uri)))
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|er| Error::XmlParseError(er.to_string()))
}

fn is_xml_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

/// `&name;` im Text: Zeichenreferenz oder vordefinierte Entity.
fn resolve_reference(name: &str) -> Result<String> {
    if let Some(digits) = name.strip_prefix('#') {
        let code_point = match digits.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => digits.parse::<u32>().ok(),
        };
        return code_point
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| Error::XmlParseError(format!("invalid character reference &{name};")));
    }
    resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| Error::XmlParseError(format!("unknown entity &{name};")))
}

/// XML 1.0 Sec. 2.11: \r\n -> \n, alleinstehende \r -> \n
fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if memchr(b'\r', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}
