use std::rc::Rc;
use std::slice;

use crate::custom::CustomBinding;
use crate::event::Event;
use crate::event_key::EventKey;
use crate::handler::Handler;
use crate::matcher::{DelegateFilter, Query, find};
use crate::native::supports_native_event;
use crate::options::{BindOptions, BindRequest, EventMap, Selection, Target};
use crate::page::Page;
use crate::registry::{Binding, BindingId, Registration};
use crate::Result;

impl Page {
    /// Binds `handler` to every key in `keys` (space-separated, each `type[.namespace]`) on
    /// every target of `target`.
    ///
    /// Returns the handles of the bindings created. Rebinding an existing
    /// (element, key, handler, delegate) combination and binding a type the target neither
    /// supports natively nor knows as a custom event are silent no-ops.
    pub fn on(
        &mut self,
        target: impl Into<Selection>,
        keys: &str,
        handler: &Handler,
    ) -> Result<Vec<BindingId>> {
        self.on_with(target, keys, handler, BindOptions::default())
    }

    pub fn on_with(
        &mut self,
        target: impl Into<Selection>,
        keys: &str,
        handler: &Handler,
        options: BindOptions,
    ) -> Result<Vec<BindingId>> {
        self.bind(
            BindRequest::Single {
                target: target.into(),
                key: keys.to_string(),
                handler: handler.clone(),
            },
            options,
        )
    }

    pub fn on_map(
        &mut self,
        target: impl Into<Selection>,
        events: EventMap,
        options: BindOptions,
    ) -> Result<Vec<BindingId>> {
        self.bind(
            BindRequest::Map {
                target: target.into(),
                events,
            },
            options,
        )
    }

    pub fn on_bulk(
        &mut self,
        groups: Vec<(Selection, EventMap)>,
        options: BindOptions,
    ) -> Result<Vec<BindingId>> {
        self.bind(BindRequest::Bulk(groups), options)
    }

    /// Every key is validated before anything is bound, so a malformed key binds nothing.
    ///
    /// The bind is all or nothing: when an attach hook or an `init` callback fails, the
    /// records this call already created are unbound again before the error is returned.
    /// Callbacks that already ran are not undone.
    pub fn bind(&mut self, request: BindRequest, options: BindOptions) -> Result<Vec<BindingId>> {
        let entries = request
            .normalize()
            .into_iter()
            .map(|entry| {
                let key = EventKey::parse(&entry.key)?
                    .with_default_namespace(options.namespace.as_deref());
                Ok((entry.target, key, entry.handler))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut created = Vec::new();
        for (target, key, handler) in entries {
            if let Err(err) = self.bind_entry(&target, &key, &handler, &options, &mut created) {
                self.roll_back(&created);
                return Err(err);
            }
        }
        Ok(created)
    }

    fn roll_back(&mut self, created: &[BindingId]) {
        for id in created.iter().rev() {
            if let Err(err) = self.unbind_record(*id) {
                tracing::warn!(binding = %id, error = %err, "rollback could not unbind");
            }
        }
    }

    fn bind_entry(
        &mut self,
        target: &Selection,
        key: &EventKey,
        handler: &Handler,
        options: &BindOptions,
        created: &mut Vec<BindingId>,
    ) -> Result<()> {
        let (elements, delegate) = match &options.delegate {
            Some(root) => (self.resolve(root)?, Some(target.clone())),
            None => (self.resolve(target)?, None),
        };

        for element in elements {
            let resolved = options.resolve_for(&element);
            let binding = Binding {
                id: self.registry.next_id(),
                element,
                key: key.clone(),
                handler: handler.clone(),
                options: resolved,
                delegate: delegate.clone(),
                registration: Registration::Native,
            };

            if key.is_init() {
                self.run_init(&Rc::new(binding))?;
                continue;
            }

            let registered = if self.is_duplicate(&binding) {
                tracing::debug!(key = %key, handler = %handler.id(), "skipped duplicate binding");
                self.trace_bind("skip duplicate", &binding);
                None
            } else {
                self.register(binding.clone())?
            };

            if let Some(record) = &registered {
                created.push(record.id);
            }
            if options.init {
                let record = registered.unwrap_or_else(|| Rc::new(binding));
                self.run_init(&record)?;
            }
        }
        Ok(())
    }

    /// Same element, same handler and same delegation descriptor, with the new key matching
    /// as a query: a bare `click` is already covered by `click.ns`, not the other way round.
    fn is_duplicate(&self, binding: &Binding) -> bool {
        let delegate = binding
            .delegate
            .as_ref()
            .map_or(DelegateFilter::Direct, DelegateFilter::Delegated);
        !find(
            &self.registry,
            &Query {
                elements: Some(slice::from_ref(&binding.element)),
                key: Some(&binding.key),
                handler: Some(binding.handler.id()),
                delegate,
            },
        )
        .is_empty()
    }

    /// Native listener first, custom attach hook second; `None` when the type is neither.
    fn register(&mut self, mut binding: Binding) -> Result<Option<Rc<Binding>>> {
        let event_type = binding.key.event_type().to_string();
        if supports_native_event(&self.dom, &binding.element, &event_type) {
            if let Target::Node(node) = binding.element {
                self.listeners.add(node, &event_type, binding.id);
            }
            binding.registration = Registration::Native;
        } else if let Some(attach) = self.custom_events.attach_hook(&event_type) {
            attach(self, &binding.custom_binding())?;
            binding.registration = Registration::Custom;
            tracing::debug!(event = %event_type, binding = %binding.id, "custom attach");
        } else {
            tracing::debug!(
                event = %event_type,
                element = ?binding.element,
                "unsupported event type, nothing bound"
            );
            self.trace_bind("unsupported", &binding);
            return Ok(None);
        }

        tracing::debug!(key = %binding.key, binding = %binding.id, "bound");
        self.trace_bind("add", &binding);
        Ok(Some(self.registry.add(binding)))
    }

    /// Immediate invocation at bind time, with a synthetic event aimed at the bound element.
    fn run_init(&mut self, binding: &Rc<Binding>) -> Result<()> {
        let event = Event::synthetic(binding.event_type(), binding.element.clone());
        self.trace_bind("init", binding);
        self.invoke_wrapper(binding, event)?;
        Ok(())
    }

    fn trace_bind(&mut self, action: &str, binding: &Binding) {
        if !self.trace_bindings_enabled() {
            return;
        }
        let element = self.target_label(&binding.element);
        let delegate = binding
            .delegate
            .as_ref()
            .map(|selection| format!(" delegate={}", selection.label()))
            .unwrap_or_default();
        self.trace_binding_line(format!(
            "[bind] {action} {} target={element}{delegate} handler={} binding={}",
            binding.key,
            binding.handler.id(),
            binding.id
        ));
    }
}

impl Binding {
    pub(crate) fn custom_binding(&self) -> CustomBinding {
        CustomBinding {
            binding: self.id,
            target: self.element.clone(),
            key: self.key.clone(),
            handler: self.handler.clone(),
            options: self.options.clone(),
        }
    }
}
