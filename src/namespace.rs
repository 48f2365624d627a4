//! Namespace resolution (Namespaces in XML 1.0).
//!
//! [`NamespaceContext`] is the scoped prefix table visible at one position of
//! a tree or event stream. Tags and attributes resolve differently:
//!
//! - [`resolve_tag`]: an unprefixed tag takes the ambient default namespace.
//! - [`resolve_attribute`]: an unprefixed attribute has no namespace, whatever
//!   the default is (Namespaces in XML 1.0, section 6.2).
//!
//! Already resolved names are returned unchanged; their uri is never
//! recomputed.

use std::rc::Rc;

use crate::qname::QName;
use crate::sexp::Sexp;
use crate::{Error, FastHashMap, Result};

/// Fest gebundener Namespace des `xml` Prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Fest gebundener Namespace des `xmlns` Prefix.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Scoped prefix to URI bindings. The empty prefix is the default namespace.
///
/// The outermost scope binds `xml` and `xmlns` and maps the default
/// namespace to `""` (no namespace); it is never popped.
#[derive(Debug, Clone)]
pub struct NamespaceContext {
    scopes: Vec<FastHashMap<Rc<str>, Rc<str>>>,
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceContext {
    pub fn new() -> Self {
        let mut base = FastHashMap::default();
        base.insert(Rc::from(""), Rc::from(""));
        base.insert(Rc::from("xml"), Rc::from(XML_NAMESPACE));
        base.insert(Rc::from("xmlns"), Rc::from(XMLNS_NAMESPACE));
        Self { scopes: vec![base] }
    }

    /// Context with one scope holding `bindings` on top of the base scope.
    pub fn from_bindings<P, U>(bindings: impl IntoIterator<Item = (P, U)>) -> Self
    where
        P: Into<Rc<str>>,
        U: Into<Rc<str>>,
    {
        let mut ctx = Self::new();
        ctx.push_scope();
        for (prefix, uri) in bindings {
            ctx.bind(prefix, uri);
        }
        ctx
    }

    /// Opens a nested scope (entering an element).
    pub fn push_scope(&mut self) {
        self.scopes.push(FastHashMap::default());
    }

    /// Closes the innermost scope. The base scope stays.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of open scopes above the base scope.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Binds `prefix` in the innermost scope, shadowing outer bindings.
    pub fn bind(&mut self, prefix: impl Into<Rc<str>>, uri: impl Into<Rc<str>>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(prefix.into(), uri.into());
        }
    }

    /// Innermost binding of `prefix` (`""` for the default namespace).
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix))
            .map(|uri| &**uri)
    }

    /// Whether the innermost scope itself binds `prefix`.
    pub fn is_bound_locally(&self, prefix: &str) -> bool {
        self.scopes.last().is_some_and(|scope| scope.contains_key(prefix))
    }

    /// The ambient default namespace (`""` if none).
    pub fn default_namespace(&self) -> &str {
        self.lookup("").unwrap_or("")
    }

    /// A prefix currently bound to `uri` and not shadowed by an inner scope.
    ///
    /// Non-empty prefixes are preferred over the default namespace so the
    /// result is usable for attributes too.
    pub fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        let mut default_hit = None;
        for scope in self.scopes.iter().rev() {
            for (prefix, bound) in scope {
                if &**bound != uri || self.lookup(prefix) != Some(uri) {
                    continue;
                }
                if prefix.is_empty() {
                    default_hit = Some("");
                } else {
                    return Some(&**prefix);
                }
            }
        }
        default_hit
    }

    /// All visible bindings, innermost first, shadowed ones left out.
    pub fn bindings(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = Vec::new();
        for scope in self.scopes.iter().rev() {
            for (prefix, uri) in scope {
                if !out.iter().any(|(p, _)| *p == &**prefix) {
                    out.push((&**prefix, &**uri));
                }
            }
        }
        out
    }
}

/// Resolves an element name. Unprefixed tags inherit the default namespace.
pub fn resolve_tag(name: &QName, ctx: &NamespaceContext) -> Result<QName> {
    if name.is_resolved() {
        return Ok(name.clone());
    }
    let prefix = name.prefix.as_deref().unwrap_or("");
    match ctx.lookup(prefix) {
        Some(uri) => Ok(name.with_uri(uri)),
        None => Err(Error::unresolved_prefix(prefix)),
    }
}

/// Resolves an attribute name. Only prefixed names are looked up; an
/// unprefixed attribute is in no namespace.
pub fn resolve_attribute(name: &QName, ctx: &NamespaceContext) -> Result<QName> {
    if name.is_resolved() {
        return Ok(name.clone());
    }
    match name.prefix.as_deref() {
        None => Ok(name.with_uri("")),
        Some(prefix) => ctx
            .lookup(prefix)
            .map(|uri| name.with_uri(uri))
            .ok_or_else(|| Error::unresolved_prefix(prefix)),
    }
}

/// Rewrites a literal tree ahead of conversion: every keyword (tag or
/// attribute key) whose prefix is bound in `table` becomes a resolved name.
///
/// Unprefixed and unknown-prefix keywords stay as they are and resolve later
/// against the context in effect at emit time.
pub fn resolve_literal(expr: &Sexp, table: &NamespaceContext) -> Sexp {
    match expr {
        Sexp::Keyword(name) => Sexp::Keyword(resolve_static(name, table)),
        Sexp::Vector(items) => {
            Sexp::Vector(items.iter().map(|i| resolve_literal(i, table)).collect())
        }
        Sexp::List(items) => {
            Sexp::List(items.iter().map(|i| resolve_literal(i, table)).collect())
        }
        Sexp::Map(entries) => Sexp::Map(
            entries
                .iter()
                .map(|(k, v)| (resolve_static(k, table), resolve_literal(v, table)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_static(name: &QName, table: &NamespaceContext) -> QName {
    match (&name.uri, name.prefix.as_deref()) {
        (None, Some(prefix)) => match table.lookup(prefix) {
            Some(uri) => name.with_uri(uri),
            None => name.clone(),
        },
        _ => name.clone(),
    }
}
