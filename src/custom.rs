use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::event_key::EventKey;
use crate::handler::Handler;
use crate::options::{BindOptions, Target};
use crate::page::Page;
use crate::registry::BindingId;
use crate::Result;

/// Attach or detach hook of a custom event type.
pub type CustomHook = Rc<dyn Fn(&mut Page, &CustomBinding) -> Result<()>>;

/// What a custom event's hooks see of the binding being attached or detached.
///
/// Keep `binding` around to raise the event later through [`Page::fire`].
#[derive(Debug, Clone)]
pub struct CustomBinding {
    pub binding: BindingId,
    pub target: Target,
    pub key: EventKey,
    pub handler: Handler,
    pub options: BindOptions,
}

#[derive(Clone)]
struct CustomEvent {
    attach: CustomHook,
    detach: CustomHook,
}

/// Event types outside the native vocabulary, keyed by type name.
#[derive(Clone, Default)]
pub(crate) struct CustomEventTable {
    entries: HashMap<String, CustomEvent>,
}

impl CustomEventTable {
    pub(crate) fn insert(&mut self, name: &str, attach: CustomHook, detach: CustomHook) {
        self.entries
            .insert(name.to_string(), CustomEvent { attach, detach });
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn attach_hook(&self, name: &str) -> Option<CustomHook> {
        self.entries.get(name).map(|entry| Rc::clone(&entry.attach))
    }

    pub(crate) fn detach_hook(&self, name: &str) -> Option<CustomHook> {
        self.entries.get(name).map(|entry| Rc::clone(&entry.detach))
    }
}

impl fmt::Debug for CustomEventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.entries.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("CustomEventTable")
            .field("events", &names)
            .finish()
    }
}

impl Page {
    /// Registers (or replaces) a custom event type.
    ///
    /// `attach` runs once for every binding of `name` before the binding is recorded; an error
    /// from it aborts that binding. `detach` runs once when the binding is removed. Entries are
    /// never removed.
    pub fn add_event<A, D>(&mut self, name: &str, attach: A, detach: D)
    where
        A: Fn(&mut Page, &CustomBinding) -> Result<()> + 'static,
        D: Fn(&mut Page, &CustomBinding) -> Result<()> + 'static,
    {
        tracing::debug!(event = name, "custom event registered");
        self.custom_events
            .insert(name, Rc::new(attach), Rc::new(detach));
    }

    pub fn has_custom_event(&self, name: &str) -> bool {
        self.custom_events.contains(name)
    }
}
