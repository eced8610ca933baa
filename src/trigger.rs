use std::rc::Rc;

use crate::event::Event;
use crate::event_key::EventKey;
use crate::handler::{Invocation, Value};
use crate::matcher::{Query, find};
use crate::options::{Selection, Target};
use crate::page::Page;
use crate::registry::{Binding, BindingId};
use crate::Result;

impl Page {
    /// Runs every binding on `target` whose key matches `name` (`click`, `click.ns`, `.ns`),
    /// in bind order, with a synthetic event whose target is the bound element.
    ///
    /// No native dispatch happens: no bubbling, no default actions. Matches are collected up
    /// front, so a callback removing another matched binding does not stop it from running.
    /// Returns how many callbacks ran.
    pub fn trigger(&mut self, target: impl Into<Selection>, name: &str) -> Result<usize> {
        let elements = self.resolve(&target.into())?;
        let key = EventKey::parse_query(name)?;
        let matches = find(
            &self.registry,
            &Query {
                elements: Some(&elements),
                key: Some(&key),
                ..Query::everything()
            },
        );
        tracing::debug!(key = %key, matches = matches.len(), "trigger");
        if self.trace_bindings_enabled() {
            let labels = elements
                .iter()
                .map(|element| self.target_label(element))
                .collect::<Vec<_>>()
                .join(",");
            self.trace_binding_line(format!(
                "[trigger] {key} targets={labels} matches={}",
                matches.len()
            ));
        }

        let mut ran = 0;
        for binding in &matches {
            let event = Event::synthetic(binding.event_type(), binding.element.clone());
            if self.invoke_wrapper(binding, event)? {
                ran += 1;
            }
        }
        Ok(ran)
    }

    /// Raises the event of one binding from a custom event implementation.
    ///
    /// `origin` becomes the event's target; for delegated bindings it is what the delegate
    /// selection is matched against. Returns `false` when the binding is gone or delegation
    /// found no match.
    pub fn fire(&mut self, binding: BindingId, origin: impl Into<Target>) -> Result<bool> {
        let Some(record) = self.registry.get(binding) else {
            return Ok(false);
        };
        let event = Event::custom(record.event_type(), origin.into())
            .with_current_target(record.element.clone());
        self.invoke_wrapper(&record, event)
    }

    /// The dispatch wrapper: resolves delegation, runs the callback, then drops `once`
    /// bindings. Returns whether the callback ran.
    pub(crate) fn invoke_wrapper(&mut self, binding: &Rc<Binding>, event: Event) -> Result<bool> {
        let mut args = binding.options.args.clone();
        let scope = match &binding.delegate {
            Some(selection) => {
                let Some(matched) = self.delegated_match(selection, event.target())? else {
                    tracing::trace!(binding = %binding.id, "delegation found no match");
                    return Ok(false);
                };
                if let Some(slot) = args.get_mut(1) {
                    *slot = Value::Target(matched.clone());
                }
                matched
            }
            None => binding
                .options
                .scope
                .clone()
                .unwrap_or_else(|| binding.element.clone()),
        };
        if let Some(slot) = args.first_mut() {
            *slot = Value::Event(event.clone());
        }

        let invocation = Invocation {
            binding: binding.id,
            event,
            scope,
            args,
        };
        binding.handler.call(self, &invocation)?;

        if binding.options.once && self.registry.contains(binding.id) {
            self.unbind_record(binding.id)?;
        }
        Ok(true)
    }

    /// First element of the current resolution of `selection` that contains `origin`.
    fn delegated_match(&self, selection: &Selection, origin: &Target) -> Result<Option<Target>> {
        let candidates = self.resolve(selection)?;
        Ok(candidates
            .into_iter()
            .find(|candidate| self.target_contains(candidate, origin)))
    }

    fn target_contains(&self, container: &Target, target: &Target) -> bool {
        match (container, target) {
            (Target::Node(container), Target::Node(node)) => self.dom.contains(*container, *node),
            _ => container == target,
        }
    }
}
