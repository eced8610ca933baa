use crate::event_key::EventKey;
use crate::handler::Handler;
use crate::matcher::{DelegateFilter, Query, find};
use crate::options::{EventMap, Selection, Target, UnbindEvents, UnbindRequest};
use crate::page::Page;
use crate::registry::{BindingId, Registration};
use crate::Result;

impl Page {
    /// Removes the bindings on `target` matching any of the space-separated `keys`
    /// (`click`, `click.ns`, `.ns`). An empty `keys` removes every binding on `target`.
    pub fn off(&mut self, target: impl Into<Selection>, keys: &str) -> Result<usize> {
        self.unbind(UnbindRequest::target(target).keys(keys))
    }

    /// Removes every binding on the page.
    pub fn off_all(&mut self) -> Result<usize> {
        self.unbind(UnbindRequest::everything())
    }

    pub fn off_target(&mut self, target: impl Into<Selection>) -> Result<usize> {
        self.unbind(UnbindRequest::target(target))
    }

    pub fn off_handler(
        &mut self,
        target: impl Into<Selection>,
        keys: &str,
        handler: &Handler,
    ) -> Result<usize> {
        self.unbind(UnbindRequest::target(target).keys(keys).handler(handler))
    }

    /// Each key removes only the bindings of the handler it is mapped to.
    pub fn off_map(&mut self, target: impl Into<Selection>, events: EventMap) -> Result<usize> {
        self.unbind(UnbindRequest {
            target: Some(target.into()),
            events: UnbindEvents::Map(events),
            handler: None,
        })
    }

    /// Returns the number of bindings removed.
    pub fn unbind(&mut self, request: UnbindRequest) -> Result<usize> {
        let (target, filters) = request.normalize();
        let elements = target
            .map(|selection| self.resolve(&selection))
            .transpose()?;
        let filters = filters
            .into_iter()
            .map(|filter| {
                let key = filter
                    .key
                    .as_deref()
                    .map(EventKey::parse_query)
                    .transpose()?;
                Ok((key, filter.handler))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut removed = 0;
        for (key, handler) in &filters {
            let matches = find(
                &self.registry,
                &Query {
                    elements: elements.as_deref(),
                    key: key.as_ref(),
                    handler: *handler,
                    delegate: DelegateFilter::Any,
                },
            );
            for record in matches {
                if self.unbind_record(record.id)? {
                    removed += 1;
                }
            }
        }
        tracing::debug!(removed, "unbind");
        Ok(removed)
    }

    /// Removes one binding by handle; `false` when it is already gone.
    pub fn off_binding(&mut self, id: BindingId) -> Result<bool> {
        self.unbind_record(id)
    }

    /// Removes every binding whose element has been detached from the document.
    ///
    /// Detaching a node never drops its bindings on its own; call this after removing
    /// subtrees to release them.
    pub fn prune_detached(&mut self) -> Result<usize> {
        let stale = self.registry.query(|record| match record.element {
            Target::Node(node) => !self.dom.is_connected(node),
            Target::Virtual(_) => false,
        });
        let mut removed = 0;
        for record in stale {
            if self.unbind_record(record.id)? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "pruned bindings on detached nodes");
        }
        Ok(removed)
    }

    /// Reverses the registration, then drops the record. A failing detach hook leaves the
    /// record in place.
    pub(crate) fn unbind_record(&mut self, id: BindingId) -> Result<bool> {
        let Some(record) = self.registry.get(id) else {
            return Ok(false);
        };
        match record.registration {
            Registration::Native => {
                if let Target::Node(node) = record.element {
                    self.listeners.remove(node, record.event_type(), id);
                }
            }
            Registration::Custom => {
                if let Some(detach) = self.custom_events.detach_hook(record.event_type()) {
                    detach(self, &record.custom_binding())?;
                    tracing::debug!(event = record.event_type(), binding = %id, "custom detach");
                }
            }
        }

        if self.registry.remove(id).is_none() {
            return Ok(false);
        }
        if self.trace_bindings_enabled() {
            let element = self.target_label(&record.element);
            self.trace_binding_line(format!(
                "[unbind] {} target={element} handler={} binding={id}",
                record.key,
                record.handler.id()
            ));
        }
        Ok(true)
    }
}
