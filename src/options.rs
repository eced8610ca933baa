use crate::dom::NodeId;
use crate::event_key::split_keys;
use crate::handler::{Handler, HandlerId, Value, with_leading_slots};

/// Something a binding can be attached to.
///
/// Virtual targets stand for objects outside the DOM tree (a viewport, a breakpoint source);
/// they support no native events and are only reachable through custom events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Node(NodeId),
    Virtual(String),
}

impl Target {
    pub fn virtual_target(name: impl Into<String>) -> Self {
        Self::Virtual(name.into())
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(node) => Some(*node),
            Self::Virtual(_) => None,
        }
    }
}

impl From<NodeId> for Target {
    fn from(value: NodeId) -> Self {
        Self::Node(value)
    }
}

/// Caller-facing description of one or more targets.
///
/// Selectors are resolved against the live tree every time the selection is used, which is
/// what delegated bindings rely on. Two selections are equal when their selector text (or
/// their fixed target list) is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selection {
    Selector(String),
    Targets(Vec<Target>),
}

impl Selection {
    pub(crate) fn label(&self) -> String {
        match self {
            Self::Selector(selector) => selector.clone(),
            Self::Targets(targets) => format!("{} target(s)", targets.len()),
        }
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Self::Selector(value.to_string())
    }
}

impl From<String> for Selection {
    fn from(value: String) -> Self {
        Self::Selector(value)
    }
}

impl From<&String> for Selection {
    fn from(value: &String) -> Self {
        Self::Selector(value.clone())
    }
}

impl From<NodeId> for Selection {
    fn from(value: NodeId) -> Self {
        Self::Targets(vec![Target::Node(value)])
    }
}

impl From<Target> for Selection {
    fn from(value: Target) -> Self {
        Self::Targets(vec![value])
    }
}

impl From<&Target> for Selection {
    fn from(value: &Target) -> Self {
        Self::Targets(vec![value.clone()])
    }
}

impl From<Vec<NodeId>> for Selection {
    fn from(value: Vec<NodeId>) -> Self {
        Self::Targets(value.into_iter().map(Target::Node).collect())
    }
}

impl From<&[NodeId]> for Selection {
    fn from(value: &[NodeId]) -> Self {
        Self::Targets(value.iter().copied().map(Target::Node).collect())
    }
}

impl From<Vec<Target>> for Selection {
    fn from(value: Vec<Target>) -> Self {
        Self::Targets(value)
    }
}

impl From<&Selection> for Selection {
    fn from(value: &Selection) -> Self {
        value.clone()
    }
}

/// Per-binding options. Unset fields fall back to the defaults: no extra arguments, not
/// one-shot, scope = the bound element, no namespace, no delegation, no immediate run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindOptions {
    pub args: Vec<Value>,
    pub once: bool,
    pub scope: Option<Target>,
    pub namespace: Option<String>,
    pub delegate: Option<Selection>,
    pub init: bool,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn scope(mut self, scope: impl Into<Target>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Registers on the delegate root(s) instead; the requested targets become the selection
    /// each event's target is matched against.
    pub fn delegate(mut self, root: impl Into<Selection>) -> Self {
        self.delegate = Some(root.into());
        self
    }

    pub fn init(mut self, init: bool) -> Self {
        self.init = init;
        self
    }

    /// Options as stored on a binding for `element`: scope filled in, argument slots inserted.
    pub(crate) fn resolve_for(&self, element: &Target) -> Self {
        Self {
            args: with_leading_slots(&self.args, element),
            scope: Some(self.scope.clone().unwrap_or_else(|| element.clone())),
            ..self.clone()
        }
    }
}

/// Event keys mapped to their handlers, in bind order.
pub type EventMap = Vec<(String, Handler)>;

/// The accepted call shapes of `on`; every shape flattens to one entry per event key.
#[derive(Debug, Clone)]
pub enum BindRequest {
    /// Several selections, each with its own event map.
    Bulk(Vec<(Selection, EventMap)>),
    /// One (possibly space-separated) key with one handler.
    Single {
        target: Selection,
        key: String,
        handler: Handler,
    },
    /// One selection with an event map.
    Map { target: Selection, events: EventMap },
}

#[derive(Debug, Clone)]
pub(crate) struct BindEntry {
    pub(crate) target: Selection,
    pub(crate) key: String,
    pub(crate) handler: Handler,
}

impl BindRequest {
    /// Flattens the request into one entry per key token, in request order.
    pub(crate) fn normalize(self) -> Vec<BindEntry> {
        let groups = match self {
            Self::Bulk(groups) => groups,
            Self::Single {
                target,
                key,
                handler,
            } => vec![(target, vec![(key, handler)])],
            Self::Map { target, events } => vec![(target, events)],
        };

        let mut entries = Vec::new();
        for (target, events) in groups {
            for (keys, handler) in events {
                for key in split_keys(&keys) {
                    entries.push(BindEntry {
                        target: target.clone(),
                        key: key.to_string(),
                        handler: handler.clone(),
                    });
                }
            }
        }
        entries
    }
}

/// Which events an [`UnbindRequest`] removes.
#[derive(Debug, Clone, Default)]
pub enum UnbindEvents {
    #[default]
    All,
    /// Space-separated keys, each removing independently.
    Keys(String),
    /// Keys mapped to the specific handler to remove for each.
    Map(EventMap),
}

/// The accepted call shapes of `off`.
#[derive(Debug, Clone, Default)]
pub struct UnbindRequest {
    /// `None` removes across every target.
    pub target: Option<Selection>,
    pub events: UnbindEvents,
    pub handler: Option<Handler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnbindFilter {
    pub(crate) key: Option<String>,
    pub(crate) handler: Option<HandlerId>,
}

impl UnbindRequest {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn target(target: impl Into<Selection>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn keys(mut self, keys: impl Into<String>) -> Self {
        self.events = UnbindEvents::Keys(keys.into());
        self
    }

    pub fn handler(mut self, handler: &Handler) -> Self {
        self.handler = Some(handler.clone());
        self
    }

    pub(crate) fn normalize(self) -> (Option<Selection>, Vec<UnbindFilter>) {
        let handler = self.handler.as_ref().map(Handler::id);
        let filters = match self.events {
            UnbindEvents::All => vec![UnbindFilter { key: None, handler }],
            UnbindEvents::Keys(keys) if split_keys(&keys).next().is_none() => {
                vec![UnbindFilter { key: None, handler }]
            }
            UnbindEvents::Keys(keys) => split_keys(&keys)
                .map(|key| UnbindFilter {
                    key: Some(key.to_string()),
                    handler,
                })
                .collect(),
            UnbindEvents::Map(events) => events
                .iter()
                .flat_map(|(keys, handler)| {
                    split_keys(keys).map(move |key| UnbindFilter {
                        key: Some(key.to_string()),
                        handler: Some(handler.id()),
                    })
                })
                .collect(),
        };
        (self.target, filters)
    }
}
