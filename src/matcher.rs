use std::rc::Rc;

use crate::event_key::EventKey;
use crate::handler::{Handler, HandlerId};
use crate::options::{Selection, Target};
use crate::page::Page;
use crate::registry::{Binding, BindingId, Registry};
use crate::Result;

/// How a query treats the delegation descriptor of a record.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DelegateFilter<'a> {
    /// Direct and delegated records alike.
    Any,
    /// Only records without a descriptor.
    Direct,
    /// Only records whose descriptor equals this selection.
    Delegated(&'a Selection),
}

impl DelegateFilter<'_> {
    fn accepts(&self, record: Option<&Selection>) -> bool {
        match (self, record) {
            (Self::Any, _) => true,
            (Self::Direct, None) => true,
            (Self::Delegated(wanted), Some(stored)) => *wanted == stored,
            _ => false,
        }
    }
}

/// Conjunction of optional filters; an absent filter accepts every record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Query<'a> {
    pub(crate) elements: Option<&'a [Target]>,
    pub(crate) key: Option<&'a EventKey>,
    pub(crate) handler: Option<HandlerId>,
    pub(crate) delegate: DelegateFilter<'a>,
}

impl Query<'_> {
    pub(crate) fn everything() -> Self {
        Self {
            elements: None,
            key: None,
            handler: None,
            delegate: DelegateFilter::Any,
        }
    }

    fn accepts(&self, record: &Binding) -> bool {
        self.elements
            .is_none_or(|elements| elements.contains(&record.element))
            && self.key.is_none_or(|key| key.matches(&record.key))
            && self
                .handler
                .is_none_or(|handler| handler == record.handler.id())
            && self.delegate.accepts(record.delegate.as_ref())
    }
}

/// Matching records in registry order.
pub(crate) fn find(registry: &Registry, query: &Query<'_>) -> Vec<Rc<Binding>> {
    registry.query(|record| query.accepts(record))
}

impl Page {
    /// Bindings on `target`, optionally narrowed by event key (`click`, `click.ns`, `.ns`),
    /// handler identity and delegation descriptor, in bind order.
    ///
    /// A `delegate` filter only matches delegated bindings registered with an equal selection.
    /// Without it, direct and delegated bindings are both returned.
    pub fn bound(
        &self,
        target: impl Into<Selection>,
        event: Option<&str>,
        handler: Option<&Handler>,
        delegate: Option<&Selection>,
    ) -> Result<Vec<Rc<Binding>>> {
        let elements = self.resolve(&target.into())?;
        self.bound_in(Some(&elements), event, handler, delegate)
    }

    /// Like [`Page::bound`] across every target.
    pub fn bound_anywhere(
        &self,
        event: Option<&str>,
        handler: Option<&Handler>,
        delegate: Option<&Selection>,
    ) -> Result<Vec<Rc<Binding>>> {
        self.bound_in(None, event, handler, delegate)
    }

    pub fn all_bindings(&self) -> Vec<Rc<Binding>> {
        self.registry.all().to_vec()
    }

    pub fn binding(&self, id: BindingId) -> Option<Rc<Binding>> {
        self.registry.get(id)
    }

    fn bound_in(
        &self,
        elements: Option<&[Target]>,
        event: Option<&str>,
        handler: Option<&Handler>,
        delegate: Option<&Selection>,
    ) -> Result<Vec<Rc<Binding>>> {
        let key = event.map(EventKey::parse_query).transpose()?;
        let query = Query {
            elements,
            key: key.as_ref(),
            handler: handler.map(Handler::id),
            delegate: delegate.map_or(DelegateFilter::Any, DelegateFilter::Delegated),
        };
        Ok(find(&self.registry, &query))
    }
}
