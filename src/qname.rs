//! Qualified names.
//!
//! A [`QName`] has a local part, an optional prefix and an optional namespace
//! URI. It is *resolved* once the URI is known; an empty URI means "no
//! namespace". Resolution itself lives in [`crate::namespace`].
//!
//! ## Gleichheit
//!
//! `PartialEq` ist bewusst permissiv: sind beide Seiten aufgeloest, entscheidet
//! die URI; sonst der rohe Prefix. Damit laesst sich ein unaufgeloester Name
//! direkt mit einem aufgeloesten vergleichen, ohne beide vorher aufzuloesen.
//! Die Relation ist nicht transitiv, daher gibt es kein `Eq` und kein `Hash`.

use std::fmt;
use std::rc::Rc;

/// A name with local part, optional prefix and optional namespace URI.
#[derive(Clone)]
pub struct QName {
    /// The local part.
    pub local_name: Rc<str>,
    /// The prefix as written (never the empty string, that is `None`).
    pub prefix: Option<Rc<str>>,
    /// The namespace URI once resolved. `Some("")` means "no namespace".
    pub uri: Option<Rc<str>>,
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QName")
            .field("local_name", &self.local_name)
            .field("prefix", &self.prefix)
            .field("uri", &self.uri)
            .finish()
    }
}

/// Namespace-aware equality, see the module docs.
impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        name_equals(self, other)
    }
}

/// `prefix:local` oder nur `local`.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(pfx) => write!(f, "{pfx}:{}", self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

/// Local names match exactly; then uris if both are resolved, raw prefixes
/// otherwise.
pub fn name_equals(a: &QName, b: &QName) -> bool {
    if a.local_name != b.local_name {
        return false;
    }
    match (&a.uri, &b.uri) {
        (Some(ua), Some(ub)) => ua == ub,
        _ => a.prefix == b.prefix,
    }
}

fn non_empty(prefix: Option<Rc<str>>) -> Option<Rc<str>> {
    prefix.filter(|p| !p.is_empty())
}

impl QName {
    /// Unresolved name without prefix.
    pub fn local(local_name: impl Into<Rc<str>>) -> Self {
        Self { local_name: local_name.into(), prefix: None, uri: None }
    }

    /// Unresolved name with a prefix. An empty prefix is stored as `None`.
    pub fn prefixed(prefix: impl Into<Rc<str>>, local_name: impl Into<Rc<str>>) -> Self {
        Self {
            local_name: local_name.into(),
            prefix: non_empty(Some(prefix.into())),
            uri: None,
        }
    }

    /// Resolved name without prefix.
    pub fn resolved(uri: impl Into<Rc<str>>, local_name: impl Into<Rc<str>>) -> Self {
        Self { local_name: local_name.into(), prefix: None, uri: Some(uri.into()) }
    }

    /// Resolved name that also remembers the prefix it was written with.
    pub fn with_prefix(
        uri: impl Into<Rc<str>>,
        local_name: impl Into<Rc<str>>,
        prefix: impl Into<Rc<str>>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            prefix: non_empty(Some(prefix.into())),
            uri: Some(uri.into()),
        }
    }

    pub(crate) fn from_parts(
        local_name: Rc<str>,
        prefix: Option<Rc<str>>,
        uri: Option<Rc<str>>,
    ) -> Self {
        Self { local_name, prefix: non_empty(prefix), uri }
    }

    /// Parses `prefix:local` (unresolved) or Clark notation `{uri}local`
    /// (resolved).
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix('{')
            && let Some(close) = rest.find('}')
        {
            return Self::resolved(&rest[..close], &rest[close + 1..]);
        }
        match raw.split_once(':') {
            Some((pfx, local)) => Self::prefixed(pfx, local),
            None => Self::local(raw),
        }
    }

    /// Whether the namespace URI is known.
    pub fn is_resolved(&self) -> bool {
        self.uri.is_some()
    }

    /// The URI, treating "no namespace" and "unresolved" alike as `""`.
    pub fn uri_or_empty(&self) -> &str {
        self.uri.as_deref().unwrap_or("")
    }

    /// Same name with the given URI; the prefix is kept.
    pub fn with_uri(&self, uri: impl Into<Rc<str>>) -> Self {
        Self {
            local_name: Rc::clone(&self.local_name),
            prefix: self.prefix.clone(),
            uri: Some(uri.into()),
        }
    }

    /// Clark notation: `{uri}local`, or just `local` without namespace.
    pub fn to_clark(&self) -> String {
        match self.uri.as_deref() {
            Some(uri) if !uri.is_empty() => format!("{{{uri}}}{}", self.local_name),
            _ => self.local_name.to_string(),
        }
    }
}

impl From<&str> for QName {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
