use std::fmt;
use std::sync::OnceLock;

use fancy_regex::Regex;

use crate::{Error, Result};

/// Pseudo-event that runs a callback once at bind time and is never registered.
pub(crate) const INIT_EVENT: &str = "init";

/// `type[.namespace]`, e.g. `click` or `click.menu`.
///
/// Query keys (for `off`, `bound` and `trigger`) may leave the type empty (`.menu`) to match
/// every type in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    event_type: String,
    namespace: Option<String>,
}

fn key_grammar() -> Result<&'static Regex> {
    static KEY_GRAMMAR: OnceLock<std::result::Result<Regex, String>> = OnceLock::new();
    KEY_GRAMMAR
        .get_or_init(|| {
            Regex::new(
                r"^(?P<type>[A-Za-z0-9_:-]*)(?:\.(?P<namespace>[A-Za-z0-9_:-]+(?:\.[A-Za-z0-9_:-]+)*))?$",
            )
                .map_err(|err| err.to_string())
        })
        .as_ref()
        .map_err(|err| Error::InvalidEventKey(format!("event key grammar: {err}")))
}

impl EventKey {
    /// Parses a key used to bind; the type segment is required.
    pub fn parse(key: &str) -> Result<Self> {
        let parsed = Self::parse_query(key)?;
        if parsed.event_type.is_empty() {
            return Err(Error::InvalidEventKey(key.to_string()));
        }
        Ok(parsed)
    }

    /// Parses a key used to match existing bindings; `.namespace` alone is accepted.
    pub fn parse_query(key: &str) -> Result<Self> {
        let invalid = || Error::InvalidEventKey(key.to_string());
        let captures = key_grammar()?
            .captures(key)
            .map_err(|err| Error::InvalidEventKey(format!("{key}: {err}")))?
            .ok_or_else(invalid)?;

        let event_type = captures
            .name("type")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let namespace = captures.name("namespace").map(|m| m.as_str().to_string());
        if event_type.is_empty() && namespace.is_none() {
            return Err(invalid());
        }
        Ok(Self {
            event_type,
            namespace,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub(crate) fn is_init(&self) -> bool {
        self.event_type == INIT_EVENT
    }

    /// Appends `namespace` when the key does not carry one of its own.
    pub(crate) fn with_default_namespace(mut self, namespace: Option<&str>) -> Self {
        if self.namespace.is_none() {
            self.namespace = namespace
                .filter(|ns| !ns.is_empty())
                .map(ToOwned::to_owned);
        }
        self
    }

    /// Query semantics: an empty type matches any type, an absent namespace any namespace.
    /// Namespaces compare on their first segment, so `click.a` matches `click.a.b`.
    pub(crate) fn matches(&self, bound: &EventKey) -> bool {
        if !self.event_type.is_empty() && self.event_type != bound.event_type {
            return false;
        }
        match self.namespace.as_deref() {
            Some(namespace) => bound
                .namespace
                .as_deref()
                .is_some_and(|own| first_segment(own) == first_segment(namespace)),
            None => true,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}.{}", self.event_type, namespace),
            None => f.write_str(&self.event_type),
        }
    }
}

fn first_segment(namespace: &str) -> &str {
    namespace.split('.').next().unwrap_or(namespace)
}

/// Splits a space-separated key list (`"click blur.form"`) into its tokens.
pub(crate) fn split_keys(keys: &str) -> impl Iterator<Item = &str> {
    keys.split_ascii_whitespace()
}
