//! Tree node and edge representation.
//!
//! A node represents one game state; an edge represents one action linking a
//! parent node to the child state it produces. Visit statistics live on the
//! edges: visit count `n`, cumulative value `w`, and mean value `q = w / n`.
//! Nodes and edges are stored in arenas and referenced by index, so the
//! parent back-reference on an edge is non-owning.

use serde::{Deserialize, Serialize};

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Index into the edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// A node in the search tree.
///
/// A node with no outgoing edges is a leaf; expansion fills `edges` with one
/// entry per legal action and happens at most once per node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node<S> {
    /// The game state this node represents.
    pub state: S,

    /// Content-derived identity of `state`. Two nodes are the same position
    /// exactly when their keys match; root advancement compares keys, not
    /// arena indices.
    pub key: u64,

    /// Outgoing edges in legal-action order. Empty until expanded.
    pub edges: Vec<EdgeId>,
}

impl<S> Node<S> {
    pub fn new(state: S, key: u64) -> Self {
        Self {
            state,
            key,
            edges: Vec::new(),
        }
    }

    /// Whether this node has not been expanded.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.edges.is_empty()
    }
}

/// An edge in the search tree: one action and its accumulated statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge<A> {
    /// Owning parent node (non-owning back-reference).
    pub parent: NodeId,

    /// Child node reached by playing `action`.
    pub child: NodeId,

    /// The action this edge represents.
    pub action: A,

    /// Visit count. Monotonically increasing while the edge is live.
    pub n: u32,

    /// Cumulative value from the searching player's perspective.
    pub w: f64,

    /// Mean value `w / n`; 0 while unvisited. Recomputed after every update.
    pub q: f64,
}

impl<A> Edge<A> {
    pub fn new(parent: NodeId, child: NodeId, action: A) -> Self {
        Self {
            parent,
            child,
            action,
            n: 0,
            w: 0.0,
            q: 0.0,
        }
    }

    /// Fold one backpropagation step into the statistics.
    #[inline]
    pub fn record(&mut self, value: f64, weight: u32) {
        self.n += weight;
        self.w += value;
        self.q = self.w / f64::from(self.n);
    }

    /// Re-express the statistics from the opponent's perspective:
    /// `w` becomes `n - w`. No-op on unvisited edges.
    #[inline]
    pub fn swap_perspective(&mut self) {
        if self.n > 0 {
            self.w = f64::from(self.n) - self.w;
            self.q = self.w / f64::from(self.n);
        }
    }
}
