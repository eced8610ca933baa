use std::collections::VecDeque;

use crate::custom::CustomEventTable;
use crate::dom::{Dom, NodeId};
use crate::event::{Event, EventOutcome};
use crate::html::parse_html;
use crate::native::NativeListenerStore;
use crate::options::{Selection, Target};
use crate::registry::Registry;
use crate::{Error, Result};

const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;
const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Debug)]
struct TraceState {
    enabled: bool,
    events: bool,
    bindings: bool,
    logs: VecDeque<String>,
    log_limit: usize,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            bindings: true,
            logs: VecDeque::new(),
            log_limit: DEFAULT_TRACE_LOG_LIMIT,
        }
    }
}

/// One document together with everything bound to it.
///
/// A `Page` owns its DOM, its binding registry, its native listeners and its custom event
/// table. Nothing is shared between pages, so independent pages (one per test, one per
/// embedded widget) never see each other's bindings.
#[derive(Debug)]
pub struct Page {
    pub(crate) dom: Dom,
    pub(crate) listeners: NativeListenerStore,
    pub(crate) registry: Registry,
    pub(crate) custom_events: CustomEventTable,
    trace: TraceState,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            dom: Dom::new(),
            listeners: NativeListenerStore::default(),
            registry: Registry::default(),
            custom_events: CustomEventTable::default(),
            trace: TraceState::default(),
        }
    }

    pub fn from_html(html: &str) -> Result<Self> {
        Ok(Self {
            dom: parse_html(html)?,
            ..Self::new()
        })
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace.enabled = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace.events = enabled;
    }

    pub fn set_trace_bindings(&mut self, enabled: bool) {
        self.trace.bindings = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace.log_limit = max_entries;
        while self.trace.logs.len() > self.trace.log_limit {
            self.trace.logs.pop_front();
        }
        Ok(())
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace.logs.drain(..).collect()
    }

    pub fn document(&self) -> NodeId {
        self.dom.root
    }

    /// First element matching `selector`.
    pub fn select(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    /// Every element matching `selector`, in document order. No match is not an error.
    pub fn select_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.dom.query_selector_all(selector)
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        self.checked(node)?;
        self.dom.matches_selector(node, selector)
    }

    /// Inclusive containment: a node contains itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        self.checked(ancestor)?;
        self.checked(node)?;
        Ok(self.dom.contains(ancestor, node))
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.checked(node)?;
        Ok(self.dom.parent(node))
    }

    pub fn is_connected(&self, node: NodeId) -> Result<bool> {
        self.checked(node)?;
        Ok(self.dom.is_connected(node))
    }

    pub fn text(&self, node: NodeId) -> Result<String> {
        self.checked(node)?;
        Ok(self.dom.text_content(node))
    }

    pub fn set_text(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.checked(node)?;
        self.dom.set_text_content(node, value)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Result<Option<String>> {
        self.checked(node)?;
        Ok(self.dom.attr(node, name))
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.checked(node)?;
        self.dom.set_attr(node, name, value)
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Result<()> {
        self.checked(node)?;
        self.dom.remove_attr(node, name)
    }

    pub fn has_class(&self, node: NodeId, class_name: &str) -> Result<bool> {
        self.checked(node)?;
        Ok(self.dom.class_contains(node, class_name))
    }

    pub fn add_class(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.checked(node)?;
        self.dom.class_add(node, class_name)
    }

    pub fn remove_class(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.checked(node)?;
        self.dom.class_remove(node, class_name)
    }

    pub fn inner_html(&self, node: NodeId) -> Result<String> {
        self.checked(node)?;
        Ok(self.dom.inner_html(node))
    }

    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<()> {
        self.checked(node)?;
        self.dom.set_inner_html(node, html)
    }

    /// Parses `html` and appends the result to `node`; returns the new top-level nodes.
    pub fn append_html(&mut self, node: NodeId, html: &str) -> Result<Vec<NodeId>> {
        self.checked(node)?;
        self.dom.append_html(node, html)
    }

    /// Detaches `node` and its subtree. Bindings on detached nodes stay registered until
    /// they are removed with `off` or [`Page::prune_detached`].
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        self.checked(node)?;
        self.dom.remove_node(node)
    }

    /// Resolves a selection against the current tree.
    pub fn resolve(&self, selection: &Selection) -> Result<Vec<Target>> {
        match selection {
            Selection::Selector(selector) => Ok(self
                .dom
                .query_selector_all(selector)?
                .into_iter()
                .map(Target::Node)
                .collect()),
            Selection::Targets(targets) => {
                for target in targets {
                    if let Target::Node(node) = target {
                        self.checked(*node)?;
                    }
                }
                Ok(targets.clone())
            }
        }
    }

    pub fn click(&mut self, selector: &str) -> Result<EventOutcome> {
        self.dispatch(selector, "click")
    }

    /// Dispatches a native `event_type` event at the first element matching `selector`.
    pub fn dispatch(&mut self, selector: &str, event_type: &str) -> Result<EventOutcome> {
        let target = self.select(selector)?;
        self.dispatch_node(target, event_type)
    }

    /// Native dispatch: the target first, then bubbling up to the document.
    ///
    /// Bindings only ever register bubbling listeners, so there is no capture walk.
    pub fn dispatch_node(&mut self, target: NodeId, event_type: &str) -> Result<EventOutcome> {
        self.checked(target)?;
        let event = Event::native(event_type, target);
        tracing::trace!(event = event_type, node = %self.dom.node_label(target), "native dispatch");

        let mut cursor = Some(target);
        while let Some(node) = cursor {
            let phase = if node == target { "target" } else { "bubble" };
            self.invoke_native_listeners(node, &event, phase)?;
            if event.propagation_stopped() {
                self.trace_event_done(&event, "propagation_stopped");
                return Ok(event.outcome());
            }
            cursor = self.dom.parent(node);
        }

        self.trace_event_done(&event, "completed");
        Ok(event.outcome())
    }

    fn invoke_native_listeners(&mut self, node: NodeId, event: &Event, phase: &str) -> Result<()> {
        for listener in self.listeners.get(node, event.event_type()) {
            // Removed by an earlier listener of this dispatch.
            if !self.listeners.contains(node, event.event_type(), listener) {
                continue;
            }
            let Some(binding) = self.registry.get(listener) else {
                continue;
            };
            if self.trace_events_enabled() {
                let target_label = self.target_label(event.target());
                let current_label = self.dom.node_label(node);
                self.trace_event_line(format!(
                    "[event] {} target={} current={} phase={} binding={} default_prevented={}",
                    event.event_type(),
                    target_label,
                    current_label,
                    phase,
                    binding.id,
                    event.default_prevented()
                ));
            }
            self.invoke_wrapper(&binding, event.clone().with_current_target(Target::Node(node)))?;
            if event.immediate_propagation_stopped() {
                break;
            }
        }
        Ok(())
    }

    fn trace_event_done(&mut self, event: &Event, outcome: &str) {
        if !self.trace_events_enabled() {
            return;
        }
        let target_label = self.target_label(event.target());
        self.trace_event_line(format!(
            "[event] done {} target={} outcome={} default_prevented={} propagation_stopped={}",
            event.event_type(),
            target_label,
            outcome,
            event.default_prevented(),
            event.propagation_stopped()
        ));
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_class(&self, selector: &str, class_name: &str, expected: bool) -> Result<()> {
        let target = self.select(selector)?;
        let actual = self.dom.class_contains(target, class_name);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("class {class_name}={expected}"),
                actual: format!("class {class_name}={actual}"),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select(selector)?;
        Ok(())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn node_snippet(&self, node: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node), SNIPPET_MAX_CHARS)
    }

    pub(crate) fn checked(&self, node: NodeId) -> Result<NodeId> {
        if self.dom.is_valid_node(node) {
            Ok(node)
        } else {
            Err(Error::InvalidNode(format!("unknown node-{}", node.index())))
        }
    }

    pub(crate) fn target_label(&self, target: &Target) -> String {
        match target {
            Target::Node(node) if self.dom.is_valid_node(*node) => self.dom.node_label(*node),
            Target::Node(node) => format!("node-{}", node.index()),
            Target::Virtual(name) => format!("virtual:{name}"),
        }
    }

    pub(crate) fn trace_events_enabled(&self) -> bool {
        self.trace.enabled && self.trace.events
    }

    pub(crate) fn trace_bindings_enabled(&self) -> bool {
        self.trace.enabled && self.trace.bindings
    }

    pub(crate) fn trace_event_line(&mut self, line: String) {
        if self.trace_events_enabled() {
            self.trace_line(line);
        }
    }

    pub(crate) fn trace_binding_line(&mut self, line: String) {
        if self.trace_bindings_enabled() {
            self.trace_line(line);
        }
    }

    fn trace_line(&mut self, line: String) {
        tracing::debug!(target: "dom_events::trace", "{line}");
        if self.trace.logs.len() >= self.trace.log_limit {
            self.trace.logs.pop_front();
        }
        self.trace.logs.push_back(line);
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = it.next() else {
            return out;
        };
        out.push(ch);
    }
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}
