//! [`Event`]s → XML bytes.
//!
//! [`XmlEventWriter`] streams directly into `W: Write`. A start tag stays
//! pending until the next event so that declarations added with
//! [`write_namespace`](XmlEventWriter::write_namespace) still land on it, and
//! so that an element closed right away is written as `<a/>`.
//!
//! Every element opens a namespace scope. When the start tag is flushed:
//!
//! 1. `xmlns` / `xmlns:p` attributes become declarations of that scope.
//! 2. The tag name is resolved (unresolved names) or declared (resolved names
//!    whose binding is not in scope). An unprefixed name in no namespace
//!    below a default namespace gets `xmlns=""`.
//! 3. Attribute names follow; a resolved attribute without a usable prefix
//!    gets an existing prefix for its URI or a synthesized `ns0`, `ns1`, ...
//!
//! All of this is computed before the first byte of the tag is written, so an
//! unbound prefix leaves no partial output for that element.
//!
//! Errors are fatal: after the first failed call the writer refuses every
//! further call, including [`end_document`](XmlEventWriter::end_document).

use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::event::Event;
use crate::namespace::{NamespaceContext, resolve_attribute, resolve_tag};
use crate::node::Attributes;
use crate::options::WriteOptions;
use crate::qname::{QName, name_equals};
use crate::{Error, Result};

/// Streaming XML writer.
pub struct XmlEventWriter<W: Write> {
    writer: W,
    opts: WriteOptions,
    ctx: NamespaceContext,
    open: Vec<OpenElement>,
    pending: Option<PendingStart>,
    synthetic_ns_counter: usize,
    /// Gesetzt nach dem ersten Fehler; Ausgabe ist dann unvollstaendig.
    failed: bool,
}

struct OpenElement {
    name: QName,
    /// Geschriebener Tag (`p:local`), fuer den End-Tag.
    tag: String,
}

struct PendingStart {
    name: QName,
    attrs: Attributes,
    decls: Vec<(Rc<str>, Rc<str>)>,
}

/// A start tag with every name settled, ready to be written.
struct StartTag {
    name: QName,
    tag: String,
    decls: Vec<(Rc<str>, Rc<str>)>,
    attrs: Vec<(String, Rc<str>)>,
}

impl<W: Write> XmlEventWriter<W> {
    /// Creates a writer. Fails with [`Error::EncodingMismatch`] unless the
    /// declared encoding is UTF-8, before anything is written.
    pub fn new(writer: W, opts: WriteOptions) -> Result<Self> {
        if !opts.is_utf8() {
            return Err(Error::EncodingMismatch {
                declared: opts.encoding,
                actual: "UTF-8".to_string(),
            });
        }
        Ok(Self {
            writer,
            opts,
            ctx: NamespaceContext::new(),
            open: Vec::new(),
            pending: None,
            synthetic_ns_counter: 0,
            failed: false,
        })
    }

    /// Writes the XML declaration (unless disabled in the options).
    pub fn start_document(&mut self) -> Result<()> {
        self.guarded(|w| {
            if w.opts.declaration {
                write!(
                    w.writer,
                    "<?xml version=\"{}\" encoding=\"{}\"?>",
                    w.opts.version, w.opts.encoding
                )?;
            }
            Ok(())
        })
    }

    /// Checks that every element was closed, flushes and returns the sink.
    pub fn end_document(mut self) -> Result<W> {
        self.guarded(|_| Ok(()))?;
        if let Some(pending) = &self.pending {
            return Err(Error::UnbalancedEvents(format!("<{}> not closed", pending.name)));
        }
        if let Some(open) = self.open.last() {
            return Err(Error::UnbalancedEvents(format!("<{}> not closed", open.tag)));
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Bindings visible at the current position, innermost first.
    pub fn namespaces(&self) -> Vec<(&str, &str)> {
        self.ctx.bindings()
    }

    /// Number of open elements, including a pending start tag.
    pub fn depth(&self) -> usize {
        self.open.len() + usize::from(self.pending.is_some())
    }

    /// Declares `prefix` on the start tag just written.
    pub fn write_namespace(&mut self, prefix: impl Into<Rc<str>>, uri: impl Into<Rc<str>>) -> Result<()> {
        let (prefix, uri) = (prefix.into(), uri.into());
        self.guarded(|w| {
            let Some(pending) = w.pending.as_mut() else {
                return Err(Error::UnbalancedEvents(
                    "namespace declaration outside a start tag".into(),
                ));
            };
            declare(&mut w.ctx, &mut pending.decls, prefix, uri);
            Ok(())
        })
    }

    /// Declares the default namespace on the start tag just written.
    pub fn write_default_namespace(&mut self, uri: impl Into<Rc<str>>) -> Result<()> {
        self.write_namespace("", uri)
    }

    pub fn write_event(&mut self, event: &Event) -> Result<()> {
        self.guarded(|w| w.apply(event))
    }

    /// Runs `op` unless an earlier call failed; a failure here stops the writer.
    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.failed {
            return Err(Error::UnbalancedEvents(
                "writer stopped after an earlier error, output is incomplete".into(),
            ));
        }
        let res = op(self);
        if res.is_err() {
            self.failed = true;
        }
        res
    }

    fn apply(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::StartElement { name, attrs } => {
                self.flush_pending(false)?;
                self.ctx.push_scope();
                self.pending = Some(PendingStart {
                    name: name.clone(),
                    attrs: attrs.clone(),
                    decls: Vec::new(),
                });
            }
            Event::EndElement { name } => self.write_end(name)?,
            Event::Characters(text) => {
                self.flush_pending(false)?;
                write_escaped_text(&mut self.writer, text)?;
            }
            Event::CData(text) => {
                self.flush_pending(false)?;
                write_cdata(&mut self.writer, text)?;
            }
            Event::Comment(text) => {
                self.flush_pending(false)?;
                write_comment(&mut self.writer, text)?;
            }
        }
        Ok(())
    }

    pub fn write_events<'e>(&mut self, events: impl IntoIterator<Item = &'e Event>) -> Result<()> {
        for event in events {
            self.write_event(event)?;
        }
        Ok(())
    }

    fn write_end(&mut self, name: &QName) -> Result<()> {
        if let Some(pending) = &self.pending {
            if !name_equals(&pending.name, name) {
                return Err(Error::UnbalancedEvents(format!(
                    "</{name}> does not close <{}>",
                    pending.name
                )));
            }
            return self.flush_pending(true);
        }
        let open = self.open.pop().ok_or_else(|| {
            Error::UnbalancedEvents(format!("</{name}> without open element"))
        })?;
        if !name_equals(&open.name, name) {
            return Err(Error::UnbalancedEvents(format!(
                "</{name}> does not close <{}>",
                open.tag
            )));
        }
        self.writer.write_all(b"</")?;
        self.writer.write_all(open.tag.as_bytes())?;
        self.writer.write_all(b">")?;
        self.ctx.pop_scope();
        Ok(())
    }

    /// Schreibt den gepufferten Start-Tag und pusht das Element auf den Stack.
    fn flush_pending(&mut self, self_closing: bool) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let start = self.plan_start(pending)?;

        let out = &mut self.writer;
        out.write_all(b"<")?;
        out.write_all(start.tag.as_bytes())?;
        for (prefix, uri) in &start.decls {
            if prefix.is_empty() {
                out.write_all(b" xmlns=\"")?;
            } else {
                out.write_all(b" xmlns:")?;
                out.write_all(prefix.as_bytes())?;
                out.write_all(b"=\"")?;
            }
            write_escaped_attr(out, uri)?;
            out.write_all(b"\"")?;
        }
        for (name, value) in &start.attrs {
            out.write_all(b" ")?;
            out.write_all(name.as_bytes())?;
            out.write_all(b"=\"")?;
            write_escaped_attr(out, value)?;
            out.write_all(b"\"")?;
        }

        if self_closing {
            out.write_all(b"/>")?;
            self.ctx.pop_scope();
        } else {
            out.write_all(b">")?;
            self.open.push(OpenElement { name: start.name, tag: start.tag });
        }
        Ok(())
    }

    fn plan_start(&mut self, pending: PendingStart) -> Result<StartTag> {
        let PendingStart { name, attrs, mut decls } = pending;

        let mut plain = Vec::with_capacity(attrs.len());
        for (key, value) in attrs.iter() {
            match declared_prefix(key) {
                Some(prefix) => declare(&mut self.ctx, &mut decls, prefix, Rc::from(value)),
                None => plain.push((key, value)),
            }
        }

        let tag = qualified(self.element_prefix(&name, &mut decls)?, &name.local_name);

        let mut written = Vec::with_capacity(plain.len());
        for (key, value) in plain {
            let attr = qualified(self.attribute_prefix(key, &mut decls)?, &key.local_name);
            written.push((attr, Rc::from(value)));
        }

        Ok(StartTag { name, tag, decls, attrs: written })
    }

    fn element_prefix(
        &mut self,
        name: &QName,
        decls: &mut Vec<(Rc<str>, Rc<str>)>,
    ) -> Result<Option<Rc<str>>> {
        let Some(uri) = name.uri.clone() else {
            resolve_tag(name, &self.ctx)?;
            return Ok(name.prefix.clone());
        };
        // Ein Prefix kann nicht an "kein Namespace" gebunden werden
        match name.prefix.clone().filter(|_| !uri.is_empty()) {
            Some(prefix) => {
                if self.ctx.lookup(&prefix) == Some(&*uri) {
                    return Ok(Some(prefix));
                }
                if !self.ctx.is_bound_locally(&prefix) {
                    declare(&mut self.ctx, decls, Rc::clone(&prefix), uri);
                    return Ok(Some(prefix));
                }
                Ok(Some(self.prefix_for(&uri, decls)))
            }
            None => {
                if self.ctx.default_namespace() == &*uri {
                    return Ok(None);
                }
                if !self.ctx.is_bound_locally("") {
                    declare(&mut self.ctx, decls, Rc::from(""), uri);
                    return Ok(None);
                }
                if uri.is_empty() {
                    return Err(Error::InvalidContent(format!(
                        "<{}> is in no namespace but declares a default namespace",
                        name.local_name
                    )));
                }
                Ok(Some(self.prefix_for(&uri, decls)))
            }
        }
    }

    fn attribute_prefix(
        &mut self,
        key: &QName,
        decls: &mut Vec<(Rc<str>, Rc<str>)>,
    ) -> Result<Option<Rc<str>>> {
        let Some(uri) = key.uri.clone() else {
            if key.prefix.is_some() {
                resolve_attribute(key, &self.ctx)?;
            }
            return Ok(key.prefix.clone());
        };
        if uri.is_empty() {
            return Ok(None);
        }
        if let Some(prefix) = key.prefix.clone() {
            match self.ctx.lookup(&prefix) {
                Some(bound) if *bound == *uri => return Ok(Some(prefix)),
                // Nur ungebundene Prefixe deklarieren, sonst aendert sich der Tag-Name
                None => {
                    declare(&mut self.ctx, decls, Rc::clone(&prefix), uri);
                    return Ok(Some(prefix));
                }
                Some(_) => {}
            }
        }
        Ok(Some(self.prefix_for(&uri, decls)))
    }

    /// A non-empty prefix bound to `uri`, declaring `ns{n}` if there is none.
    fn prefix_for(&mut self, uri: &Rc<str>, decls: &mut Vec<(Rc<str>, Rc<str>)>) -> Rc<str> {
        if let Some(prefix) = self.ctx.prefix_for_uri(uri).filter(|p| !p.is_empty()) {
            return Rc::from(prefix);
        }
        let prefix: Rc<str> = loop {
            let candidate = format!("ns{}", self.synthetic_ns_counter);
            self.synthetic_ns_counter += 1;
            if self.ctx.lookup(&candidate).is_none() {
                break candidate.into();
            }
        };
        debug!("synthesized namespace declaration xmlns:{prefix}=\"{uri}\"");
        declare(&mut self.ctx, decls, Rc::clone(&prefix), Rc::clone(uri));
        prefix
    }
}

/// Bindet `prefix` im aktuellen Scope und merkt die Deklaration fuer den Tag.
fn declare(
    ctx: &mut NamespaceContext,
    decls: &mut Vec<(Rc<str>, Rc<str>)>,
    prefix: Rc<str>,
    uri: Rc<str>,
) {
    match decls.iter_mut().find(|(p, _)| *p == prefix) {
        Some(slot) => slot.1 = Rc::clone(&uri),
        None => decls.push((Rc::clone(&prefix), Rc::clone(&uri))),
    }
    ctx.bind(prefix, uri);
}

/// `xmlns:p` declares `p`, a bare `xmlns` the default namespace.
fn declared_prefix(key: &QName) -> Option<Rc<str>> {
    match key.prefix.as_deref() {
        Some("xmlns") => Some(Rc::clone(&key.local_name)),
        None if &*key.local_name == "xmlns" => Some(Rc::from("")),
        _ => None,
    }
}

fn qualified(prefix: Option<Rc<str>>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

/// Sucht drei Zeichen gleichzeitig (memchr3); Bloecke ohne Escape-Zeichen
/// werden in einem Stueck geschrieben.
fn write_escaped(out: &mut impl Write, s: &str, needle: [u8; 3], replacement: [&[u8]; 3]) -> Result<()> {
    let bytes = s.as_bytes();
    let mut start = 0;
    while let Some(offset) = memchr::memchr3(needle[0], needle[1], needle[2], &bytes[start..]) {
        let pos = start + offset;
        out.write_all(&bytes[start..pos])?;
        let idx = needle.iter().position(|&n| n == bytes[pos]).unwrap_or(0);
        out.write_all(replacement[idx])?;
        start = pos + 1;
    }
    out.write_all(&bytes[start..])?;
    Ok(())
}

/// Text: & < > → &amp; &lt; &gt;
fn write_escaped_text(out: &mut impl Write, s: &str) -> Result<()> {
    write_escaped(out, s, [b'&', b'<', b'>'], [b"&amp;", b"&lt;", b"&gt;"])
}

/// Attribut-Werte: & < " → &amp; &lt; &quot;
fn write_escaped_attr(out: &mut impl Write, s: &str) -> Result<()> {
    write_escaped(out, s, [b'&', b'<', b'"'], [b"&amp;", b"&lt;", b"&quot;"])
}

/// `]]>` im Inhalt wird auf zwei CDATA-Sektionen aufgeteilt.
fn write_cdata(out: &mut impl Write, text: &str) -> Result<()> {
    out.write_all(b"<![CDATA[")?;
    let mut parts = text.split("]]>");
    if let Some(first) = parts.next() {
        out.write_all(first.as_bytes())?;
    }
    for part in parts {
        out.write_all(b"]]]]><![CDATA[>")?;
        out.write_all(part.as_bytes())?;
    }
    out.write_all(b"]]>")?;
    Ok(())
}

/// XML 1.0 Section 2.5: kein `--`, kein `-` am Ende.
fn write_comment(out: &mut impl Write, text: &str) -> Result<()> {
    if text.contains("--") || text.ends_with('-') {
        return Err(Error::InvalidContent(format!(
            "comment contains '--' or ends with '-': {text:?}"
        )));
    }
    out.write_all(b"<!--")?;
    out.write_all(text.as_bytes())?;
    out.write_all(b"-->")?;
    Ok(())
}
