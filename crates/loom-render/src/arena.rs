//! Arena of mounted nodes
//!
//! Nodes are addressed by [`NodeIndex`]; indices stay valid for the life of
//! the arena and removed slots are never reused, so a stale index simply
//! finds nothing.

use std::collections::HashMap;
use std::sync::Arc;

use loom_core::{ComponentDefinition, PropertyMap, WidgetKind};
use loom_script::Handler;

use crate::schema::BehaviorSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

/// Resolution state of a node
#[derive(Debug, Clone)]
pub enum NodeStatus {
    Unresolved,
    Loading,
    Ready(Arc<ComponentDefinition>),
    Error(String),
}

impl NodeStatus {
    pub fn name(&self) -> &'static str {
        match self {
            NodeStatus::Unresolved => "unresolved",
            NodeStatus::Loading => "loading",
            NodeStatus::Ready(_) => "ready",
            NodeStatus::Error(_) => "error",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, NodeStatus::Ready(_))
    }

    pub fn definition(&self) -> Option<&Arc<ComponentDefinition>> {
        match self {
            NodeStatus::Ready(def) => Some(def),
            _ => None,
        }
    }
}

/// Event or method code, compiled once at mount time
#[derive(Debug, Clone)]
pub struct CompiledCode {
    pub source: String,
    /// `None` when no code shape accepted the source; running it is a no-op
    pub handler: Option<Handler>,
    pub affected: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Child {
    Node(NodeIndex),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    /// Type tag as written in the tree
    pub tag: String,
    pub kind: WidgetKind,
    pub declared: PropertyMap,
    pub styles: PropertyMap,
    pub events: HashMap<String, CompiledCode>,
    pub methods: HashMap<String, CompiledCode>,
    pub region: Option<String>,
    pub behaviors: Vec<BehaviorSpec>,
    pub status: NodeStatus,
    pub parent: Option<NodeIndex>,
    pub children: Vec<Child>,
}

#[derive(Debug, Default)]
pub struct TreeArena {
    slots: Vec<Option<Node>>,
    by_id: HashMap<String, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeIndex {
        let index = NodeIndex(self.slots.len());
        self.by_id.insert(node.id.clone(), index);
        if node.parent.is_none() {
            self.roots.push(index);
        }
        self.slots.push(Some(node));
        index
    }

    pub fn get(&self, index: NodeIndex) -> Option<&Node> {
        self.slots.get(index.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: NodeIndex) -> Option<&mut Node> {
        self.slots.get_mut(index.0).and_then(Option::as_mut)
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn by_id(&self, id: &str) -> Option<&Node> {
        self.index_of(id).and_then(|index| self.get(index))
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Live nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|node| (NodeIndex(i), node)))
    }

    /// Child node indices of a node
    pub fn child_nodes(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.get(index)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| match child {
                        Child::Node(i) => Some(*i),
                        Child::Text(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The node and all its descendants, parents before children
    pub fn subtree(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            if self.get(current).is_none() {
                continue;
            }
            out.push(current);
            let mut children = self.child_nodes(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Detach and drop a subtree; returns the removed nodes
    pub fn remove_subtree(&mut self, index: NodeIndex) -> Vec<Node> {
        let doomed = self.subtree(index);

        if let Some(parent) = self.get(index).and_then(|node| node.parent) {
            if let Some(parent) = self.get_mut(parent) {
                parent
                    .children
                    .retain(|child| !matches!(child, Child::Node(i) if *i == index));
            }
        }
        self.roots.retain(|root| *root != index);

        let mut removed = Vec::with_capacity(doomed.len());
        for i in doomed {
            if let Some(node) = self.slots.get_mut(i.0).and_then(Option::take) {
                self.by_id.remove(&node.id);
                removed.push(node);
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_id.clear();
        self.roots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<NodeIndex>) -> Node {
        Node {
            id: id.to_string(),
            tag: "container".to_string(),
            kind: WidgetKind::Container,
            declared: PropertyMap::new(),
            styles: PropertyMap::new(),
            events: HashMap::new(),
            methods: HashMap::new(),
            region: None,
            behaviors: Vec::new(),
            status: NodeStatus::Unresolved,
            parent,
            children: Vec::new(),
        }
    }

    fn tree() -> (TreeArena, NodeIndex, NodeIndex, NodeIndex) {
        let mut arena = TreeArena::new();
        let root = arena.insert(node("root", None));
        let a = arena.insert(node("a", Some(root)));
        let b = arena.insert(node("b", Some(a)));
        arena.get_mut(root).unwrap().children.push(Child::Node(a));
        arena.get_mut(a).unwrap().children.push(Child::Node(b));
        (arena, root, a, b)
    }

    #[test]
    fn test_subtree_order() {
        let (arena, root, a, b) = tree();
        assert_eq!(arena.subtree(root), vec![root, a, b]);
        assert_eq!(arena.roots(), &[root]);
    }

    #[test]
    fn test_remove_subtree_detaches_and_keeps_indices_stable() {
        let (mut arena, root, a, b) = tree();
        let removed = arena.remove_subtree(a);

        assert_eq!(removed.len(), 2);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_none());
        assert!(arena.child_nodes(root).is_empty());
        assert!(!arena.contains_id("b"));

        let c = arena.insert(node("c", None));
        assert_ne!(c, a);
        assert_eq!(arena.len(), 2);
    }
}
