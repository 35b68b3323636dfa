//! Search tree with arena allocation.
//!
//! Nodes and edges live in slot arenas and are referenced by `NodeId` /
//! `EdgeId` indices, which keeps the parent back-references non-owning and
//! makes bulk release trivial. Pruning never recurses: subtrees are walked
//! with an explicit stack and slots are returned to free lists strictly
//! children before parents, so no live edge ever points at a vacated slot.

use game_core::Game;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::node::{Edge, EdgeId, Node, NodeId};

/// A rooted game tree with a distinguished current root.
///
/// All nodes reachable from the root are owned by the tree; advancing the
/// root releases everything that falls outside the new reachable set.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "G::State: Serialize, G::Action: Serialize",
    deserialize = "G::State: serde::de::DeserializeOwned, G::Action: serde::de::DeserializeOwned"
))]
pub struct SearchTree<G: Game> {
    nodes: Vec<Option<Node<G::State>>>,
    edges: Vec<Option<Edge<G::Action>>>,
    free_nodes: Vec<u32>,
    free_edges: Vec<u32>,
    root: NodeId,
}

impl<G: Game> SearchTree<G> {
    /// Create a tree rooted at `state`.
    pub fn new(game: &G, state: G::State) -> Self {
        let key = game.state_key(&state);
        Self {
            nodes: vec![Some(Node::new(state, key))],
            edges: Vec::new(),
            free_nodes: Vec::new(),
            free_edges: Vec::new(),
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node<G::State> {
        self.nodes[id.0 as usize].as_ref().expect("node slot is live")
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<G::State> {
        self.nodes[id.0 as usize].as_mut().expect("node slot is live")
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge<G::Action> {
        self.edges[id.0 as usize].as_ref().expect("edge slot is live")
    }

    #[inline]
    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge<G::Action> {
        self.edges[id.0 as usize].as_mut().expect("edge slot is live")
    }

    /// Outgoing edges of the current root.
    pub fn root_edges(&self) -> &[EdgeId] {
        &self.node(self.root).edges
    }

    /// Number of live nodes.
    pub fn live_nodes(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    /// Number of live edges.
    pub fn live_edges(&self) -> usize {
        self.edges.len() - self.free_edges.len()
    }

    fn alloc_node(&mut self, node: Node<G::State>) -> NodeId {
        match self.free_nodes.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(node);
                NodeId(slot)
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Some(node));
                id
            }
        }
    }

    fn alloc_edge(&mut self, edge: Edge<G::Action>) -> EdgeId {
        match self.free_edges.pop() {
            Some(slot) => {
                self.edges[slot as usize] = Some(edge);
                EdgeId(slot)
            }
            None => {
                let id = EdgeId(self.edges.len() as u32);
                self.edges.push(Some(edge));
                id
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id.0 as usize] = None;
        self.free_nodes.push(id.0);
    }

    fn free_edge(&mut self, id: EdgeId) {
        self.edges[id.0 as usize] = None;
        self.free_edges.push(id.0);
    }

    /// Expand a leaf: one edge and child node per legal action.
    ///
    /// Returns true when at least one child state is terminal (the one-ply
    /// win/loss shortcut). Expansion happens at most once per node; calling
    /// this on an already expanded node only re-reports the flag.
    pub fn expand(&mut self, game: &G, id: NodeId) -> bool {
        if !self.node(id).is_leaf() {
            return self.node(id).edges.iter().any(|&eid| {
                let child = self.edge(eid).child;
                game.is_terminal(&self.node(child).state)
            });
        }

        let state = self.node(id).state.clone();
        let mut found_terminal = false;
        let mut out_edges = Vec::new();
        for action in game.legal_actions(&state) {
            let next = game.apply(&state, &action);
            if game.is_terminal(&next) {
                found_terminal = true;
            }
            let key = game.state_key(&next);
            let child = self.alloc_node(Node::new(next, key));
            out_edges.push(self.alloc_edge(Edge::new(id, child, action)));
        }
        trace!(node = id.0, edges = out_edges.len(), found_terminal, "expanded leaf");
        self.node_mut(id).edges = out_edges;
        found_terminal
    }

    /// Fold an evaluation result into every edge on the descent path.
    ///
    /// The path is ordered root to leaf; the walk runs leaf to root with the
    /// perspective sign starting at +1 on the deepest edge and flipping at
    /// every step, encoding the alternation of adversarial play. `q` is
    /// recomputed from `w` and `n` at each edge.
    pub fn backpropagate(&mut self, path: &[EdgeId], value: f64, weight: u32) {
        let mut sign = 1.0;
        for &eid in path.iter().rev() {
            let edge = self.edge_mut(eid);
            edge.record(value * sign, weight);
            trace!(edge = eid.0, n = edge.n, w = edge.w, q = edge.q, "backpropagated");
            sign = -sign;
        }
    }

    /// Release `eid` and everything below it.
    ///
    /// The subtree is collected in preorder with an explicit stack, then the
    /// slots are freed in reverse, which guarantees every node is released
    /// before any of its ancestors.
    fn prune_subtree(&mut self, eid: EdgeId) {
        let top = self.edge(eid).child;
        self.free_edge(eid);

        let mut order = vec![top];
        let mut stack = vec![top];
        while let Some(nid) = stack.pop() {
            for i in 0..self.node(nid).edges.len() {
                let child = self.edge(self.node(nid).edges[i]).child;
                order.push(child);
                stack.push(child);
            }
        }

        for &nid in order.iter().rev() {
            let out_edges = std::mem::take(&mut self.node_mut(nid).edges);
            for e in out_edges {
                self.free_edge(e);
            }
            self.free_node(nid);
        }
    }

    /// Advance the root to `target`, pruning every sibling subtree that does
    /// not lead there. A no-op (beyond the leaf/forced-move checks) when
    /// `target` is already the root by state identity.
    ///
    /// The new root is expanded immediately if it is a leaf. If any root edge
    /// now leads to a terminal state, that edge's action and child are
    /// returned as a forced move, short-circuiting search for this turn.
    pub fn advance_root(&mut self, game: &G, target: NodeId) -> Option<(G::Action, NodeId)> {
        if self.node(target).key != self.node(self.root).key {
            let old_root = self.root;
            self.root = target;
            let old_edges = std::mem::take(&mut self.node_mut(old_root).edges);
            for eid in old_edges {
                if self.edge(eid).child == target {
                    self.free_edge(eid);
                } else {
                    self.prune_subtree(eid);
                }
            }
            self.free_node(old_root);
            debug!(
                live_nodes = self.live_nodes(),
                live_edges = self.live_edges(),
                "advanced root"
            );
        }

        if self.node(self.root).is_leaf() {
            let _ = self.expand(game, self.root);
        }

        for &eid in &self.node(self.root).edges {
            let child = self.edge(eid).child;
            if game.is_terminal(&self.node(child).state) {
                return Some((self.edge(eid).action.clone(), child));
            }
        }
        None
    }

    /// Advance the root to the node representing `state`, reusing the
    /// matching child subtree when one exists and starting a fresh node
    /// otherwise. Same return contract as [`SearchTree::advance_root`].
    pub fn advance_root_to_state(
        &mut self,
        game: &G,
        state: G::State,
    ) -> Option<(G::Action, NodeId)> {
        let key = game.state_key(&state);
        let target = if key == self.node(self.root).key {
            self.root
        } else {
            let existing = self
                .node(self.root)
                .edges
                .iter()
                .map(|&eid| self.edge(eid).child)
                .find(|&child| self.node(child).key == key);
            existing.unwrap_or_else(|| self.alloc_node(Node::new(state, key)))
        };
        self.advance_root(game, target)
    }

    /// Prune every subtree rooted strictly below `depth` from the current
    /// root. Nodes at `depth` become leaves; everything above is untouched.
    /// Used to bound persisted-tree size.
    pub fn cut_tree(&mut self, depth: u32) {
        let mut stack = vec![(self.root, depth)];
        while let Some((nid, remaining)) = stack.pop() {
            if remaining == 0 {
                let out_edges = std::mem::take(&mut self.node_mut(nid).edges);
                for eid in out_edges {
                    self.prune_subtree(eid);
                }
            } else {
                for i in 0..self.node(nid).edges.len() {
                    let child = self.edge(self.node(nid).edges[i]).child;
                    stack.push((child, remaining - 1));
                }
            }
        }
    }

    /// Re-express every visited root edge from the opponent's perspective
    /// (`w` becomes `n - w`). Used when a tree built for one side is reused
    /// by the other. Applying it twice restores the original statistics.
    pub fn swap_values(&mut self) {
        let root_edges = self.node(self.root).edges.clone();
        for eid in root_edges {
            self.edge_mut(eid).swap_perspective();
        }
    }

    /// Release every node and edge in the tree.
    ///
    /// The tree must not be used afterwards; call at most once. Dropping the
    /// tree releases the arenas wholesale, so this is only needed when a
    /// session is reset in place.
    pub fn clear(&mut self) {
        let root = self.root;
        let out_edges = std::mem::take(&mut self.node_mut(root).edges);
        for eid in out_edges {
            self.prune_subtree(eid);
        }
        self.free_node(root);
    }

    /// Length of the longest root-to-leaf path.
    pub fn max_depth(&self) -> u32 {
        let mut deepest = 0;
        let mut stack = vec![(self.root, 0u32)];
        while let Some((nid, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            for &eid in &self.node(nid).edges {
                stack.push((self.edge(eid).child, depth + 1));
            }
        }
        deepest
    }
}
