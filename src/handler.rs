use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dom::NodeId;
use crate::event::Event;
use crate::options::Target;
use crate::page::Page;
use crate::registry::BindingId;
use crate::Result;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`Handler`]; shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

type Callback = dyn Fn(&mut Page, &Invocation) -> Result<()>;

/// A user callback with a stable identity.
///
/// Bindings, unbinding and queries compare handlers by [`HandlerId`], never by the closure
/// itself: bind the same `Handler` (or a clone of it) to get deduplication, and pass it back
/// to [`Page::off_handler`] to remove exactly its bindings.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    callback: Rc<Callback>,
}

impl Handler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut Page, &Invocation) -> Result<()> + 'static,
    {
        Self {
            id: HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)),
            callback: Rc::new(callback),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub(crate) fn call(&self, page: &mut Page, invocation: &Invocation) -> Result<()> {
        (self.callback)(page, invocation)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.id.0).finish()
    }
}

/// Callback argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Target(Target),
    Event(Event),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Self::Target(target) => Some(target),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<NodeId> for Value {
    fn from(value: NodeId) -> Self {
        Self::Target(Target::Node(value))
    }
}

impl From<Target> for Value {
    fn from(value: Target) -> Self {
        Self::Target(value)
    }
}

/// What a callback receives for one firing of a binding.
///
/// `args()` is the full argument list: slot 0 is the event, slot 1 the element (the delegated
/// match for delegated bindings), followed by the extra arguments from
/// [`BindOptions::args`](crate::BindOptions::args).
#[derive(Debug, Clone)]
pub struct Invocation {
    pub(crate) binding: BindingId,
    pub(crate) event: Event,
    pub(crate) scope: Target,
    pub(crate) args: Vec<Value>,
}

impl Invocation {
    pub fn binding(&self) -> BindingId {
        self.binding
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Invocation context: the bound element unless overridden by `scope` or delegation.
    pub fn scope(&self) -> &Target {
        &self.scope
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn element(&self) -> Option<&Target> {
        self.args.get(1).and_then(Value::as_target)
    }

    /// Shortcut for the element slot when it is a DOM node.
    pub fn node(&self) -> Option<NodeId> {
        self.element().and_then(Target::node)
    }

    pub fn extra_args(&self) -> &[Value] {
        self.args.get(2..).unwrap_or_default()
    }
}

/// Inserts the event and element slots ahead of the caller's arguments, unless slot 1 already
/// holds the element.
pub(crate) fn with_leading_slots(args: &[Value], element: &Target) -> Vec<Value> {
    if matches!(args.get(1), Some(Value::Target(existing)) if existing == element) {
        return args.to_vec();
    }
    let mut out = Vec::with_capacity(args.len() + 2);
    out.push(Value::Null);
    out.push(Value::Target(element.clone()));
    out.extend_from_slice(args);
    out
}
