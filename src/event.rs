use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::dom::NodeId;
use crate::options::Target;

#[derive(Debug, Default)]
struct EventFlags {
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
}

/// Event object handed to callbacks.
///
/// Clones share their cancellation flags, so `prevent_default` called from one listener is
/// visible to the dispatcher and to every later listener of the same dispatch. Synthetic events
/// (from [`Page::trigger`](crate::Page::trigger) and immediate `init` invocations) carry no-op
/// `prevent_default` / `stop_propagation`.
#[derive(Clone)]
pub struct Event {
    event_type: String,
    target: Target,
    current_target: Option<Target>,
    synthetic: bool,
    flags: Rc<EventFlags>,
}

impl Event {
    pub(crate) fn native(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target: Target::Node(target),
            current_target: None,
            synthetic: false,
            flags: Rc::default(),
        }
    }

    pub(crate) fn synthetic(event_type: &str, target: Target) -> Self {
        Self {
            event_type: event_type.to_string(),
            current_target: Some(target.clone()),
            target,
            synthetic: true,
            flags: Rc::default(),
        }
    }

    /// An event raised by a custom event implementation on behalf of one of its bindings.
    pub(crate) fn custom(event_type: &str, target: Target) -> Self {
        Self {
            synthetic: false,
            ..Self::synthetic(event_type, target)
        }
    }

    pub(crate) fn with_current_target(mut self, current: Target) -> Self {
        self.current_target = Some(current);
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The node (or virtual target) the event was aimed at.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The node whose listener is running; `None` only before dispatch reaches a listener.
    pub fn current_target(&self) -> Option<&Target> {
        self.current_target.as_ref()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn prevent_default(&self) {
        if !self.synthetic {
            self.flags.default_prevented.set(true);
        }
    }

    pub fn stop_propagation(&self) {
        if !self.synthetic {
            self.flags.propagation_stopped.set(true);
        }
    }

    pub fn stop_immediate_propagation(&self) {
        if !self.synthetic {
            self.flags.propagation_stopped.set(true);
            self.flags.immediate_propagation_stopped.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.flags.default_prevented.get()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.flags.propagation_stopped.get()
    }

    pub(crate) fn immediate_propagation_stopped(&self) -> bool {
        self.flags.immediate_propagation_stopped.get()
    }

    pub(crate) fn outcome(&self) -> EventOutcome {
        EventOutcome {
            default_prevented: self.default_prevented(),
            propagation_stopped: self.propagation_stopped(),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.event_type == other.event_type
            && self.target == other.target
            && self.synthetic == other.synthetic
            && Rc::ptr_eq(&self.flags, &other.flags)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .field("current_target", &self.current_target)
            .field("synthetic", &self.synthetic)
            .field("default_prevented", &self.default_prevented())
            .field("propagation_stopped", &self.propagation_stopped())
            .finish()
    }
}

/// Result of a native dispatch through [`Page::dispatch`](crate::Page::dispatch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}
