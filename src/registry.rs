use std::fmt;
use std::rc::Rc;

use crate::event_key::EventKey;
use crate::handler::{Handler, HandlerId};
use crate::options::{BindOptions, Selection, Target};

/// Handle of one binding record, returned by `on` and accepted by
/// [`Page::off_binding`](crate::Page::off_binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// How a binding reaches its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A non-capturing listener in the page's native listener store.
    Native,
    /// Handed to the attach hook of a custom event type.
    Custom,
}

/// One active binding.
///
/// For delegated bindings `element` is the delegate root the listener lives on, and
/// `delegate` holds the selection each event's target is matched against.
#[derive(Debug, Clone)]
pub struct Binding {
    pub(crate) id: BindingId,
    pub(crate) element: Target,
    pub(crate) key: EventKey,
    pub(crate) handler: Handler,
    pub(crate) options: BindOptions,
    pub(crate) delegate: Option<Selection>,
    pub(crate) registration: Registration,
}

impl Binding {
    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn element(&self) -> &Target {
        &self.element
    }

    /// The full key including namespace, e.g. `click.menu`.
    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn event_type(&self) -> &str {
        self.key.event_type()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.key.namespace()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler.id()
    }

    /// Options as resolved at bind time: scope filled in, argument slots inserted.
    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    pub fn delegate(&self) -> Option<&Selection> {
        self.delegate.as_ref()
    }

    pub fn registration(&self) -> Registration {
        self.registration
    }
}

/// Insertion-ordered set of binding records.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    records: Vec<Rc<Binding>>,
    next_id: u64,
}

impl Registry {
    pub(crate) fn next_id(&mut self) -> BindingId {
        self.next_id += 1;
        BindingId(self.next_id)
    }

    pub(crate) fn add(&mut self, binding: Binding) -> Rc<Binding> {
        let binding = Rc::new(binding);
        self.records.push(Rc::clone(&binding));
        binding
    }

    pub(crate) fn remove(&mut self, id: BindingId) -> Option<Rc<Binding>> {
        let pos = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(pos))
    }

    pub(crate) fn get(&self, id: BindingId) -> Option<Rc<Binding>> {
        self.records.iter().find(|record| record.id == id).cloned()
    }

    pub(crate) fn contains(&self, id: BindingId) -> bool {
        self.records.iter().any(|record| record.id == id)
    }

    pub(crate) fn all(&self) -> &[Rc<Binding>] {
        &self.records
    }

    pub(crate) fn query<P>(&self, mut predicate: P) -> Vec<Rc<Binding>>
    where
        P: FnMut(&Binding) -> bool,
    {
        self.records
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeId;
    use crate::Result;

    fn record(registry: &mut Registry, node: usize, key: &str) -> Result<Binding> {
        Ok(Binding {
            id: registry.next_id(),
            element: Target::Node(NodeId(node)),
            key: EventKey::parse(key)?,
            handler: Handler::new(|_, _| Ok(())),
            options: BindOptions::default(),
            delegate: None,
            registration: Registration::Native,
        })
    }

    #[test]
    fn records_keep_insertion_order_across_removal() -> Result<()> {
        let mut registry = Registry::default();
        let first = record(&mut registry, 1, "click")?;
        let second = record(&mut registry, 2, "blur")?;
        let third = record(&mut registry, 1, "focus")?;
        let (a, b, c) = (first.id, second.id, third.id);
        registry.add(first);
        registry.add(second);
        registry.add(third);

        assert!(registry.remove(b).is_some());
        assert!(registry.remove(b).is_none());
        assert_eq!(
            registry.all().iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![a, c]
        );
        assert_eq!(registry.all().len(), 2);
        assert!(registry.contains(c));
        Ok(())
    }

    #[test]
    fn query_filters_without_mutating() -> Result<()> {
        let mut registry = Registry::default();
        for (node, key) in [(1, "click"), (2, "click"), (1, "blur")] {
            let binding = record(&mut registry, node, key)?;
            registry.add(binding);
        }
        let on_first = registry.query(|r| r.element == Target::Node(NodeId(1)));
        assert_eq!(on_first.len(), 2);
        assert_eq!(on_first[1].event_type(), "blur");
        assert_eq!(registry.all().len(), 3);
        Ok(())
    }
}
