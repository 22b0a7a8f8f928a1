//! The span tree and its traversals.
//!
//! Nodes live in an arena owned by [`SpanTree`]; parent links are plain ids
//! and never own anything. Index 0 is the synthetic root every timeline hangs
//! from, and ids are handed out in creation order, so a node's id is also its
//! arena slot.
//!
//! Traversals borrow the tree immutably. Starting or stopping spans while an
//! iterator is alive is therefore rejected at compile time.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{SpanError, SpanResult};
use crate::label::SpanLabel;
use crate::stats::NodeStats;

/// Name of the synthetic root node.
pub const ROOT_LABEL: &str = "root";

/// Identifier of a span node, unique and increasing within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// The synthetic root.
    pub const ROOT: NodeId = NodeId(0);

    /// Raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single timed, labeled unit of work.
#[derive(Debug, Clone)]
pub struct SpanNode {
    id: NodeId,
    label: SpanLabel,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    stats: NodeStats,
    /// Set while this node is the innermost open node.
    resumed_at: Option<Instant>,
    stopped: bool,
}

impl SpanNode {
    fn new(id: NodeId, label: SpanLabel, parent: Option<NodeId>) -> Self {
        Self {
            id,
            label,
            parent,
            children: Vec::new(),
            stats: NodeStats::default(),
            resumed_at: None,
            stopped: false,
        }
    }

    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node label.
    pub fn label(&self) -> &SpanLabel {
        &self.label
    }

    /// Parent id; `None` only for the synthetic root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in start order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Node statistics.
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// Whether the node's cookie has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn stats_mut(&mut self) -> &mut NodeStats {
        &mut self.stats
    }

    /// Begin accruing self time.
    pub(crate) fn resume(&mut self, now: Instant) {
        self.resumed_at = Some(now);
    }

    /// Stop accruing self time and bank the elapsed interval.
    pub(crate) fn pause(&mut self, now: Instant) {
        if let Some(since) = self.resumed_at.take() {
            self.stats.time_self += now.saturating_duration_since(since);
        }
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.stopped = true;
    }
}

/// Arena of span nodes rooted at a synthetic root.
#[derive(Debug, Clone)]
pub struct SpanTree {
    nodes: Vec<SpanNode>,
}

impl Default for SpanTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanTree {
    /// Create a tree containing only the synthetic root.
    pub fn new() -> Self {
        Self {
            nodes: vec![SpanNode::new(NodeId::ROOT, SpanLabel::new(ROOT_LABEL), None)],
        }
    }

    /// Append a new child under `parent` and return its id.
    pub(crate) fn create_child(&mut self, parent: NodeId, label: SpanLabel) -> SpanResult<NodeId> {
        if parent.index() >= self.nodes.len() {
            return Err(SpanError::UnknownNode(parent));
        }
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(SpanNode::new(id, label, Some(parent)));
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    /// Number of nodes, including the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but the synthetic root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Option<&SpanNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> SpanResult<&mut SpanNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or(SpanError::UnknownNode(id))
    }

    /// Borrowed handle to the synthetic root.
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: NodeId::ROOT,
        }
    }

    /// Borrowed handle to a node.
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.get(id).map(|_| NodeRef { tree: self, id })
    }

    /// The frozen sub-tree rooted at `id`.
    pub fn subtree(&self, id: NodeId) -> SpanResult<SubTree<'_>> {
        self.get(id)
            .map(|_| SubTree { tree: self, root: id })
            .ok_or(SpanError::UnknownNode(id))
    }
}

/// Borrowed handle to one node of a [`SpanTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a SpanTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn node(&self) -> &'a SpanNode {
        &self.tree.nodes[self.id.index()]
    }

    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node label.
    pub fn label(&self) -> &'a SpanLabel {
        &self.node().label
    }

    /// Shorthand for the label name.
    pub fn name(&self) -> &'a str {
        self.node().label.name()
    }

    /// Node statistics.
    pub fn stats(&self) -> &'a NodeStats {
        &self.node().stats
    }

    /// Whether this is the synthetic root.
    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    /// Whether the node has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.node().stopped
    }

    /// Parent node; `None` for the synthetic root.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    /// Child ids in start order.
    pub fn child_ids(&self) -> &'a [NodeId] {
        &self.node().children
    }

    /// Children in start order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    /// Parent, grandparent, ... up to but excluding the synthetic root.
    pub fn ancestors(&self) -> Ancestors<'a> {
        Ancestors {
            tree: self.tree,
            next: self.node().parent,
        }
    }

    /// This node and its descendants, node before children.
    pub fn pre_order(&self) -> PreOrder<'a> {
        PreOrder {
            tree: self.tree,
            stack: vec![self.id],
        }
    }

    /// Descendants before this node.
    pub fn post_order(&self) -> PostOrder<'a> {
        PostOrder {
            tree: self.tree,
            stack: vec![(self.id, false)],
        }
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// A frozen view of the tree below one node.
#[derive(Clone, Copy)]
pub struct SubTree<'a> {
    tree: &'a SpanTree,
    root: NodeId,
}

impl<'a> SubTree<'a> {
    /// The sub-tree's root node.
    pub fn root(&self) -> NodeRef<'a> {
        NodeRef {
            tree: self.tree,
            id: self.root,
        }
    }

    /// Pre-order traversal. Each call returns a fresh iterator.
    pub fn pre_order(&self) -> PreOrder<'a> {
        self.root().pre_order()
    }

    /// Post-order traversal. Each call returns a fresh iterator.
    pub fn post_order(&self) -> PostOrder<'a> {
        self.root().post_order()
    }

    /// First node in pre-order whose label name is `name`.
    pub fn find(&self, name: &str) -> Option<NodeRef<'a>> {
        self.pre_order().find(|node| node.name() == name)
    }

    /// Number of nodes in the sub-tree, including its root.
    pub fn len(&self) -> usize {
        self.pre_order().count()
    }

    /// A sub-tree always contains at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for SubTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubTree")
            .field("root", &self.root)
            .field("len", &self.len())
            .finish()
    }
}

/// Depth-first, node before children, children in start order.
pub struct PreOrder<'a> {
    tree: &'a SpanTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.index()];
        self.stack.extend(node.children.iter().rev());
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }
}

/// Depth-first, all descendants before the node itself.
pub struct PostOrder<'a> {
    tree: &'a SpanTree,
    /// `(node, children already pushed)`
    stack: Vec<(NodeId, bool)>,
}

impl<'a> Iterator for PostOrder<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, expanded) = self.stack.pop()?;
            if expanded {
                return Some(NodeRef {
                    tree: self.tree,
                    id,
                });
            }
            self.stack.push((id, true));
            let node = &self.tree.nodes[id.index()];
            self.stack
                .extend(node.children.iter().rev().map(|&child| (child, false)));
        }
    }
}

/// Nearest ancestor first, stopping before the synthetic root.
pub struct Ancestors<'a> {
    tree: &'a SpanTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.filter(|id| *id != NodeId::ROOT)?;
        self.next = self.tree.nodes[id.index()].parent;
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // a
    // ├── b1
    // │   └── c1
    // └── b2
    //     ├── c2
    //     └── c3
    fn example_tree() -> (SpanTree, NodeId) {
        let mut tree = SpanTree::new();
        let a = tree.create_child(NodeId::ROOT, "a".into()).unwrap();
        let b1 = tree.create_child(a, SpanLabel::build_node("b1")).unwrap();
        tree.create_child(b1, "c1".into()).unwrap();
        let b2 = tree.create_child(a, "b2".into()).unwrap();
        tree.create_child(b2, SpanLabel::build_node("c2")).unwrap();
        tree.create_child(b2, "c3".into()).unwrap();
        (tree, a)
    }

    fn names<'a>(nodes: impl Iterator<Item = NodeRef<'a>>) -> Vec<&'a str> {
        nodes.map(|n| n.name()).collect()
    }

    #[test]
    fn test_ids_follow_creation_order() {
        let (tree, a) = example_tree();
        assert_eq!(a.as_u64(), 1);
        let ids: Vec<u64> = tree
            .subtree(a)
            .unwrap()
            .pre_order()
            .map(|n| n.id().as_u64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pre_order() {
        let (tree, a) = example_tree();
        let sub = tree.subtree(a).unwrap();
        assert_eq!(names(sub.pre_order()), vec!["a", "b1", "c1", "b2", "c2", "c3"]);
    }

    #[test]
    fn test_post_order() {
        let (tree, a) = example_tree();
        let sub = tree.subtree(a).unwrap();
        assert_eq!(names(sub.post_order()), vec!["c1", "b1", "c2", "c3", "b2", "a"]);
    }

    #[test]
    fn test_ancestors_exclude_root() {
        let (tree, a) = example_tree();
        let c2 = tree.subtree(a).unwrap().find("c2").unwrap();
        assert_eq!(names(c2.ancestors()), vec!["b2", "a"]);
        assert_eq!(tree.root().ancestors().count(), 0);
    }

    #[test]
    fn test_iterators_are_restartable() {
        let (tree, a) = example_tree();
        let sub = tree.subtree(a).unwrap();
        let mut first = sub.pre_order();
        first.next();
        assert_eq!(sub.pre_order().count(), 6);
        assert_eq!(first.count(), 5);
    }

    #[test]
    fn test_children_in_insertion_order() {
        let (tree, a) = example_tree();
        let node = tree.node(a).unwrap();
        assert_eq!(names(node.children()), vec!["b1", "b2"]);
        assert_eq!(node.parent().unwrap().id(), NodeId::ROOT);
    }

    #[test]
    fn test_subtree_of_leaf() {
        let (tree, a) = example_tree();
        let c3 = tree.subtree(a).unwrap().find("c3").unwrap();
        let sub = tree.subtree(c3.id()).unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(names(sub.post_order()), vec!["c3"]);
    }

    #[test]
    fn test_unknown_node() {
        let tree = SpanTree::new();
        assert!(matches!(
            tree.subtree(NodeId(42)),
            Err(SpanError::UnknownNode(_))
        ));
        assert!(tree.is_empty());
    }
}
