use std::collections::HashMap;

use crate::dom::{Dom, NodeId};
use crate::options::Target;
use crate::registry::BindingId;

/// Event types every element (and the document) exposes as `on<type>`.
const ELEMENT_EVENTS: &[&str] = &[
    // mouse
    "click",
    "dblclick",
    "auxclick",
    "contextmenu",
    "mousedown",
    "mouseup",
    "mousemove",
    "mouseover",
    "mouseout",
    "mouseenter",
    "mouseleave",
    "wheel",
    // pointer
    "pointerdown",
    "pointerup",
    "pointermove",
    "pointerover",
    "pointerout",
    "pointerenter",
    "pointerleave",
    "pointercancel",
    "gotpointercapture",
    "lostpointercapture",
    // touch
    "touchstart",
    "touchend",
    "touchmove",
    "touchcancel",
    // keyboard
    "keydown",
    "keyup",
    "keypress",
    "beforeinput",
    "input",
    // focus
    "focus",
    "blur",
    "focusin",
    "focusout",
    // form
    "change",
    "submit",
    "reset",
    "invalid",
    "select",
    "toggle",
    // drag and drop
    "drag",
    "dragstart",
    "dragend",
    "dragenter",
    "dragleave",
    "dragover",
    "drop",
    // clipboard
    "copy",
    "cut",
    "paste",
    // media
    "play",
    "pause",
    "ended",
    "playing",
    "seeking",
    "seeked",
    "timeupdate",
    "volumechange",
    "canplay",
    "canplaythrough",
    "loadeddata",
    "loadedmetadata",
    // animation and transition
    "animationstart",
    "animationend",
    "animationiteration",
    "transitionstart",
    "transitionend",
    "transitionrun",
    "transitioncancel",
    // resources and layout
    "load",
    "error",
    "abort",
    "scroll",
    "scrollend",
    "resize",
];

/// Extra types only the document answers to.
const DOCUMENT_EVENTS: &[&str] = &["readystatechange", "visibilitychange", "selectionchange"];

/// The `on<type>` check: whether `target` handles `event_type` natively.
pub(crate) fn supports_native_event(dom: &Dom, target: &Target, event_type: &str) -> bool {
    let Target::Node(node) = target else {
        return false;
    };
    if dom.is_document(*node) {
        return ELEMENT_EVENTS.contains(&event_type) || DOCUMENT_EVENTS.contains(&event_type);
    }
    dom.element(*node).is_some() && ELEMENT_EVENTS.contains(&event_type)
}

/// Per node, per event type bubbling listener lists in registration order.
#[derive(Debug, Default, Clone)]
pub(crate) struct NativeListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<BindingId>>>,
}

impl NativeListenerStore {
    pub(crate) fn add(&mut self, node_id: NodeId, event: &str, binding: BindingId) {
        let listeners = self
            .map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default();

        if listeners.contains(&binding) {
            return;
        }
        listeners.push(binding);
    }

    pub(crate) fn remove(&mut self, node_id: NodeId, event: &str, binding: BindingId) -> bool {
        let Some(events) = self.map.get_mut(&node_id) else {
            return false;
        };
        let Some(listeners) = events.get_mut(event) else {
            return false;
        };

        let Some(pos) = listeners.iter().position(|listener| *listener == binding) else {
            return false;
        };
        listeners.remove(pos);
        if listeners.is_empty() {
            events.remove(event);
        }
        if events.is_empty() {
            self.map.remove(&node_id);
        }
        true
    }

    pub(crate) fn get(&self, node_id: NodeId, event: &str) -> Vec<BindingId> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn contains(&self, node_id: NodeId, event: &str, binding: BindingId) -> bool {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .is_some_and(|listeners| listeners.contains(&binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;
    use crate::registry::Registry;
    use crate::Result;

    #[test]
    fn vocabulary_depends_on_the_target_kind() -> Result<()> {
        let dom = parse_html("<div id='box'>text</div>")?;
        let node = dom.by_id("box").expect("box exists");
        let text = dom.children(node)[0];
        let element = Target::Node(node);
        let document = Target::Node(dom.root);

        assert!(supports_native_event(&dom, &element, "click"));
        assert!(!supports_native_event(&dom, &element, "swipe"));
        assert!(!supports_native_event(&dom, &element, "visibilitychange"));
        assert!(supports_native_event(&dom, &document, "visibilitychange"));
        assert!(!supports_native_event(&dom, &Target::Node(text), "click"));
        assert!(!supports_native_event(&dom, &Target::virtual_target("viewport"), "resize"));
        Ok(())
    }

    #[test]
    fn store_dedupes_and_cleans_up_empty_lists() {
        let mut ids = Registry::default();
        let (a, b) = (ids.next_id(), ids.next_id());
        let mut store = NativeListenerStore::default();
        let node = NodeId(3);

        store.add(node, "click", a);
        store.add(node, "click", a);
        store.add(node, "click", b);
        assert_eq!(store.get(node, "click"), vec![a, b]);
        assert!(store.get(node, "blur").is_empty());

        assert!(store.remove(node, "click", a));
        assert!(!store.remove(node, "click", a));
        assert!(store.remove(node, "click", b));
        assert!(!store.contains(node, "click", b));
        assert!(store.map.is_empty());
    }
}
