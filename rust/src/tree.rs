//! Arena tree for the traveling network.
//!
//! Nodes and edges live in id-keyed maps; parent, child and edge links are
//! plain ids, so removing a node is a map removal and nothing can dangle.
//! Ids are handed out monotonically and never reused, which makes map
//! iteration order equal to creation order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Tolerance used when checking derived quantities (positions, lengths).
const TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Activity state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Leaf tip that can branch, grow or switch.
    Free,
    /// Leaf tip that is shrinking back toward its parent.
    Retract,
    /// Node with at least one child (or the root before anything happens).
    Internal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub is_leaf: bool,
    pub state: NodeState,
    pub edge_from_parent: Option<EdgeId>,
    pub x: f64,
    pub y: f64,
}

impl Node {
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Directed parent -> child segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub parent: NodeId,
    pub child: NodeId,
    pub length: f64,
    /// Absolute direction from the parent, in radians.
    pub angle: f64,
}

/// What `detach_leaf` removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detached {
    pub node: NodeId,
    pub edge: EdgeId,
    pub parent: NodeId,
    /// The parent lost its last child and is now a retracting leaf.
    pub parent_became_leaf: bool,
}

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    root: NodeId,
    next_node_id: u64,
    next_edge_id: u64,
}

impl Tree {
    /// Tree holding only an internal root at the origin.
    pub fn with_root() -> Self {
        let root = NodeId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                parent: None,
                children: Vec::new(),
                is_leaf: true,
                state: NodeState::Internal,
                edge_from_parent: None,
                x: 0.0,
                y: 0.0,
            },
        );

        Tree {
            nodes,
            edges: BTreeMap::new(),
            root,
            next_node_id: 1,
            next_edge_id: 0,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, NetworkError> {
        self.nodes.get(&id).ok_or(NetworkError::MissingNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, NetworkError> {
        self.nodes.get_mut(&id).ok_or(NetworkError::MissingNode(id))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge, NetworkError> {
        self.edges.get(&id).ok_or(NetworkError::MissingEdge(id))
    }

    /// Edge connecting `id` to its parent, if any.
    pub fn incoming_edge(&self, id: NodeId) -> Result<Option<&Edge>, NetworkError> {
        match self.node(id)?.edge_from_parent {
            Some(eid) => self.edge(eid).map(Some),
            None => Ok(None),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Leaves currently in `state`, in creation order.
    pub fn leaves(&self, state: NodeState) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.is_leaf && n.state == state)
            .map(|n| n.id)
            .collect()
    }

    /// Exact sum of all edge lengths.
    pub fn total_length(&self) -> f64 {
        self.edges.values().map(|e| e.length).sum()
    }

    /// Create a free leaf under `parent`, joined by a new edge.
    ///
    /// The parent stops being a leaf and becomes internal.
    pub fn attach_child(
        &mut self,
        parent: NodeId,
        length: f64,
        angle: f64,
    ) -> Result<NodeId, NetworkError> {
        let (px, py) = {
            let p = self.node(parent)?;
            (p.x, p.y)
        };

        let id = NodeId(self.next_node_id);
        let eid = EdgeId(self.next_edge_id);
        self.next_node_id += 1;
        self.next_edge_id += 1;

        self.edges.insert(
            eid,
            Edge {
                id: eid,
                parent,
                child: id,
                length,
                angle,
            },
        );
        self.nodes.insert(
            id,
            Node {
                id,
                parent: Some(parent),
                children: Vec::new(),
                is_leaf: true,
                state: NodeState::Free,
                edge_from_parent: Some(eid),
                x: px + length * angle.cos(),
                y: py + length * angle.sin(),
            },
        );

        let p = self.node_mut(parent)?;
        p.children.push(id);
        p.is_leaf = false;
        p.state = NodeState::Internal;

        Ok(id)
    }

    /// Add `delta` to the incoming edge of `id` and re-derive its position.
    ///
    /// Returns the new edge length, which may be non-positive; the caller
    /// decides whether to detach.
    pub fn adjust_length(&mut self, id: NodeId, delta: f64) -> Result<f64, NetworkError> {
        let node = self.node(id)?;
        let eid = node.edge_from_parent.ok_or(NetworkError::Detached(id))?;

        let edge = self.edges.get_mut(&eid).ok_or(NetworkError::MissingEdge(eid))?;
        edge.length += delta;
        let (parent, length, angle) = (edge.parent, edge.length, edge.angle);

        let (px, py) = {
            let p = self.node(parent)?;
            (p.x, p.y)
        };
        let node = self.node_mut(id)?;
        node.x = px + length * angle.cos();
        node.y = py + length * angle.sin();

        Ok(length)
    }

    /// Remove a childless node together with its incoming edge.
    ///
    /// If the parent is left without children it becomes a retracting leaf.
    pub fn detach_leaf(&mut self, id: NodeId) -> Result<Detached, NetworkError> {
        let node = self.node(id)?;
        if !node.children.is_empty() {
            return Err(NetworkError::NotALeaf(id));
        }
        let eid = node.edge_from_parent.ok_or(NetworkError::Detached(id))?;
        let parent = self.edge(eid)?.parent;

        // Validate the parent before mutating anything.
        self.node(parent)?;

        self.edges.remove(&eid);
        self.nodes.remove(&id);

        let p = self.node_mut(parent)?;
        p.children.retain(|&c| c != id);
        let parent_became_leaf = p.children.is_empty();
        if parent_became_leaf {
            p.is_leaf = true;
            p.state = NodeState::Retract;
        }

        Ok(Detached {
            node: id,
            edge: eid,
            parent,
            parent_became_leaf,
        })
    }

    /// Post-order traversal of nodes (leaves to root).
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(node) = self.nodes.get(&id) {
                for &child in node.children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }

        order
    }

    /// Verify every structural invariant of the arena.
    pub fn check_invariants(&self) -> Result<(), NetworkError> {
        let root = self.node(self.root)?;
        if root.parent.is_some() || root.edge_from_parent.is_some() {
            return Err(NetworkError::Invariant(format!("root {} has a parent", self.root)));
        }

        if self.edges.len() + 1 != self.nodes.len() {
            return Err(NetworkError::Invariant(format!(
                "{} edges for {} nodes",
                self.edges.len(),
                self.nodes.len()
            )));
        }

        for edge in self.edges.values() {
            let child = self.node(edge.child)?;
            if child.edge_from_parent != Some(edge.id) || child.parent != Some(edge.parent) {
                return Err(NetworkError::Invariant(format!(
                    "edge {} does not match child {}",
                    edge.id, edge.child
                )));
            }
            if edge.length < 0.0 {
                return Err(NetworkError::Invariant(format!(
                    "edge {} has negative length {}",
                    edge.id, edge.length
                )));
            }
            let parent = self.node(edge.parent)?;
            if !parent.children.contains(&edge.child) {
                return Err(NetworkError::Invariant(format!(
                    "{} missing from children of {}",
                    edge.child, edge.parent
                )));
            }
            let x = parent.x + edge.length * edge.angle.cos();
            let y = parent.y + edge.length * edge.angle.sin();
            if (x - child.x).abs() > TOLERANCE || (y - child.y).abs() > TOLERANCE {
                return Err(NetworkError::Invariant(format!(
                    "position of {} not derived from edge {}",
                    child.id, edge.id
                )));
            }
        }

        for node in self.nodes.values() {
            if node.is_leaf != node.children.is_empty() {
                return Err(NetworkError::Invariant(format!(
                    "{} has is_leaf={} with {} children",
                    node.id,
                    node.is_leaf,
                    node.children.len()
                )));
            }
            if node.is_leaf && node.id != self.root && node.state == NodeState::Internal {
                return Err(NetworkError::Invariant(format!("leaf {} is internal", node.id)));
            }
            if !node.is_leaf && node.state != NodeState::Internal {
                return Err(NetworkError::Invariant(format!(
                    "{} has children but state {:?}",
                    node.id, node.state
                )));
            }
            if node.id != self.root && node.edge_from_parent.is_none() {
                return Err(NetworkError::Detached(node.id));
            }
            for &child in &node.children {
                if self.node(child)?.parent != Some(node.id) {
                    return Err(NetworkError::Invariant(format!(
                        "{} lists {} as child but is not its parent",
                        node.id, child
                    )));
                }
            }
        }

        if self.post_order().len() != self.nodes.len() {
            return Err(NetworkError::Invariant("unreachable nodes".to_string()));
        }

        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::with_root()
    }
}
