use std::collections::{HashMap, HashSet};

use crate::html::parse_html;
use crate::selector::{SelectorPart, matches_selector_chain, parse_selector_groups};
use crate::{Error, Result};

/// Handle of a node in a [`Page`](crate::Page)'s DOM arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let element = Element { tag_name, attrs };
        let id = self.create_node(Some(parent), NodeType::Element(element));
        if let Some(id_attr) = self
            .element(id)
            .and_then(|element| element.attrs.get("id").cloned())
        {
            if self.is_connected(id) {
                self.id_index.insert(id_attr, id);
            }
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn is_valid_node(&self, node_id: NodeId) -> bool {
        node_id.0 < self.nodes.len()
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn is_document(&self, node_id: NodeId) -> bool {
        matches!(
            self.nodes.get(node_id.0).map(|n| &n.node_type),
            Some(NodeType::Document)
        )
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0)?.parent
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Inclusive containment: a node contains itself.
    pub(crate) fn contains(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        let mut cursor = Some(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub(crate) fn is_connected(&self, node_id: NodeId) -> bool {
        self.contains(self.root, node_id)
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id)
            .and_then(|e| e.attrs.get(&name.to_ascii_lowercase()).cloned())
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let lowered = name.to_ascii_lowercase();
        let connected = self.is_connected(node_id);
        let old = {
            let element = self.element_mut(node_id).ok_or_else(|| {
                Error::InvalidNode(format!("setAttribute target node-{}", node_id.0))
            })?;
            element.attrs.insert(lowered.clone(), value.to_string())
        };

        if lowered == "id" && connected {
            if let Some(old) = old {
                self.id_index.remove(&old);
            }
            if !value.is_empty() {
                self.id_index.insert(value.to_string(), node_id);
            }
        }
        Ok(())
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let lowered = name.to_ascii_lowercase();
        let removed = {
            let element = self.element_mut(node_id).ok_or_else(|| {
                Error::InvalidNode(format!("removeAttribute target node-{}", node_id.0))
            })?;
            element.attrs.remove(&lowered)
        };
        if lowered == "id" {
            if let Some(old) = removed {
                if self.id_index.get(&old) == Some(&node_id) {
                    self.id_index.remove(&old);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn class_contains(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|element| has_class(element, class_name))
    }

    pub(crate) fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self.element_mut(node_id).ok_or_else(|| {
            Error::InvalidNode(format!("classList target node-{}", node_id.0))
        })?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        if !classes.iter().any(|name| name == class_name) {
            classes.push(class_name.to_string());
        }
        set_class_attr(element, &classes);
        Ok(())
    }

    pub(crate) fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self.element_mut(node_id).ok_or_else(|| {
            Error::InvalidNode(format!("classList target node-{}", node_id.0))
        })?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        classes.retain(|name| name != class_name);
        set_class_attr(element, &classes);
        Ok(())
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document | NodeType::Element(_) => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.text_content(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
        }
    }

    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self.element(node_id).is_none() {
            return Err(Error::InvalidNode(format!(
                "textContent target node-{}",
                node_id.0
            )));
        }
        let old_children = std::mem::take(&mut self.nodes[node_id.0].children);
        for child in old_children {
            self.nodes[child.0].parent = None;
        }
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
        self.rebuild_id_index();
        Ok(())
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node_id) {
            out.push_str(&self.dump_node(*child));
        }
        out
    }

    pub(crate) fn set_inner_html(&mut self, node_id: NodeId, html: &str) -> Result<()> {
        if self.element(node_id).is_none() {
            return Err(Error::InvalidNode(format!(
                "innerHTML target node-{}",
                node_id.0
            )));
        }

        let fragment = parse_html(html)?;

        let old_children = std::mem::take(&mut self.nodes[node_id.0].children);
        for child in old_children {
            self.nodes[child.0].parent = None;
        }

        let children = fragment.nodes[fragment.root.0].children.clone();
        for child in children {
            self.clone_subtree_from_dom(&fragment, child, node_id);
        }

        self.rebuild_id_index();
        Ok(())
    }

    pub(crate) fn append_html(&mut self, node_id: NodeId, html: &str) -> Result<Vec<NodeId>> {
        if self.element(node_id).is_none() && !self.is_document(node_id) {
            return Err(Error::InvalidNode(format!(
                "append target node-{}",
                node_id.0
            )));
        }
        let fragment = parse_html(html)?;
        let children = fragment.nodes[fragment.root.0].children.clone();
        let mut created = Vec::with_capacity(children.len());
        for child in children {
            created.push(self.clone_subtree_from_dom(&fragment, child, node_id));
        }
        self.rebuild_id_index();
        Ok(created)
    }

    fn clone_subtree_from_dom(&mut self, source: &Dom, source_node: NodeId, parent: NodeId) -> NodeId {
        let node_type = source.nodes[source_node.0].node_type.clone();
        let node = self.create_node(Some(parent), node_type);
        for child in &source.nodes[source_node.0].children {
            self.clone_subtree_from_dom(source, *child, node);
        }
        node
    }

    /// Detaches `node` (and its subtree) from its parent. Detaching a detached node is a no-op.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::InvalidNode("cannot remove document root".into()));
        }
        let Some(parent) = self.parent(node) else {
            return Ok(());
        };
        self.nodes[parent.0].children.retain(|id| *id != node);
        self.nodes[node.0].parent = None;
        self.rebuild_id_index();
        Ok(())
    }

    pub(crate) fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let all = self.query_selector_all(selector)?;
        Ok(all.into_iter().next())
    }

    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;

        if groups.len() == 1 && groups[0].len() == 1 {
            if let Some(id) = groups[0][0].step.id_only() {
                return Ok(self.by_id(id).into_iter().collect());
            }
        }

        let mut ids = Vec::new();
        self.collect_elements_dfs(self.root, &mut ids);
        Ok(self.filter_matching(ids, &groups))
    }

    pub(crate) fn matches_selector(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        if self.element(node_id).is_none() {
            return Ok(false);
        }

        let groups = parse_selector_groups(selector)?;
        Ok(groups
            .iter()
            .any(|steps| matches_selector_chain(self, node_id, steps)))
    }

    fn filter_matching(&self, candidates: Vec<NodeId>, groups: &[Vec<SelectorPart>]) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for candidate in candidates {
            if groups
                .iter()
                .any(|steps| matches_selector_chain(self, candidate, steps))
                && seen.insert(candidate)
            {
                matched.push(candidate);
            }
        }
        matched
    }

    fn rebuild_id_index(&mut self) {
        let mut next = HashMap::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if let NodeType::Element(element) = &self.nodes[node.0].node_type {
                if let Some(id) = element.attrs.get("id") {
                    if !id.is_empty() {
                        next.entry(id.clone()).or_insert(node);
                    }
                }
            }
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        self.id_index = next;
    }

    fn collect_elements_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        if matches!(self.nodes[node_id.0].node_type, NodeType::Element(_)) {
            out.push(node_id);
        }
        for child in &self.nodes[node_id.0].children {
            self.collect_elements_dfs(*child, out);
        }
    }

    pub(crate) fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        let children = &self.nodes[parent.0].children;
        let pos = children.iter().position(|id| *id == node_id)?;
        children[..pos]
            .iter()
            .rev()
            .find(|sibling| self.element(**sibling).is_some())
            .copied()
    }

    pub(crate) fn next_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        let children = &self.nodes[parent.0].children;
        let pos = children.iter().position(|id| *id == node_id)?;
        children[pos + 1..]
            .iter()
            .find(|sibling| self.element(**sibling).is_some())
            .copied()
    }

    pub(crate) fn dump_node(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
            NodeType::Element(element) => {
                let mut out = String::new();
                out.push('<');
                out.push_str(&element.tag_name);
                let mut attrs = element.attrs.iter().collect::<Vec<_>>();
                attrs.sort();
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(v);
                    out.push('"');
                }
                out.push('>');
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
                out
            }
        }
    }

    /// Short label for trace lines: `#id`, the tag name, or `node-N`.
    pub(crate) fn node_label(&self, node: NodeId) -> String {
        if let Some(id) = self.attr(node, "id") {
            if !id.is_empty() {
                return format!("#{id}");
            }
        }
        if self.is_document(node) {
            return "document".to_string();
        }
        self.tag_name(node)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("node-{}", node.0))
    }
}

pub(crate) fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| {
            value
                .split_whitespace()
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

fn set_class_attr(element: &mut Element, classes: &[String]) {
    if classes.is_empty() {
        element.attrs.remove("class");
    } else {
        element.attrs.insert("class".to_string(), classes.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Result<Dom> {
        parse_html(
            r#"
            <ul id='list' class='parent'>
              <li class='item'>1</li>
              <li class='item'><span id='deep'>2</span></li>
            </ul>
            "#,
        )
    }

    #[test]
    fn contains_is_inclusive_and_walks_ancestors() -> Result<()> {
        let dom = sample()?;
        let list = dom.by_id("list").expect("list exists");
        let deep = dom.by_id("deep").expect("deep exists");
        assert!(dom.contains(list, deep));
        assert!(dom.contains(deep, deep));
        assert!(!dom.contains(deep, list));
        Ok(())
    }

    #[test]
    fn removed_nodes_are_disconnected_and_leave_the_id_index() -> Result<()> {
        let mut dom = sample()?;
        let deep = dom.by_id("deep").expect("deep exists");
        dom.remove_node(deep)?;
        assert!(!dom.is_connected(deep));
        assert_eq!(dom.by_id("deep"), None);
        assert!(dom.query_selector_all("#deep")?.is_empty());
        Ok(())
    }

    #[test]
    fn class_helpers_round_trip_tokens() -> Result<()> {
        let mut dom = sample()?;
        let list = dom.by_id("list").expect("list exists");
        dom.class_add(list, "open")?;
        dom.class_add(list, "open")?;
        assert_eq!(dom.attr(list, "class").as_deref(), Some("parent open"));
        dom.class_remove(list, "parent")?;
        assert!(!dom.class_contains(list, "parent"));
        assert!(dom.class_contains(list, "open"));
        Ok(())
    }

    #[test]
    fn set_inner_html_replaces_children_and_reindexes() -> Result<()> {
        let mut dom = sample()?;
        let list = dom.by_id("list").expect("list exists");
        dom.set_inner_html(list, "<li id='fresh' class='item'>new</li>")?;
        assert_eq!(dom.by_id("deep"), None);
        assert!(dom.by_id("fresh").is_some());
        assert_eq!(dom.query_selector_all(".item")?.len(), 1);
        Ok(())
    }
}
