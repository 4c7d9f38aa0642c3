//! Storage of the contact structure.
//!
//! Every pair of surviving nodes is either an *active* edge (a contact) or a
//! *complement* edge (a contact that may form later). The simulation only talks
//! to the [`ContactGraph`] trait, [`AdjacencyGraph`] is the default backend.

use crate::error::{Result, SimulationError};
use std::collections::BTreeSet;

pub type NodeId = usize;

/// Unordered node pair, stored with `u < v`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EdgeRef {
    u: NodeId,
    v: NodeId,
}

impl EdgeRef {
    pub fn new(a: NodeId, b: NodeId) -> EdgeRef {
        debug_assert!(a != b, "self loop {}-{}", a, b);
        EdgeRef {
            u: a.min(b),
            v: a.max(b),
        }
    }
    pub fn u(&self) -> NodeId {
        self.u
    }
    pub fn v(&self) -> NodeId {
        self.v
    }
    pub fn opposite(&self, node: NodeId) -> Option<NodeId> {
        if node == self.u {
            Some(self.v)
        } else if node == self.v {
            Some(self.u)
        } else {
            None
        }
    }
}

pub trait ContactGraph {
    /// `n` isolated nodes with ids `0..n`.
    fn with_population(n: usize) -> Self
    where
        Self: Sized;

    /// Number of surviving nodes.
    fn size(&self) -> usize;
    fn count_edges(&self) -> usize;
    fn contains_node(&self, node: NodeId) -> bool;
    fn degree(&self, node: NodeId) -> usize;
    fn is_active(&self, edge: EdgeRef) -> bool;

    fn is_complement(&self, edge: EdgeRef) -> bool {
        edge.u() != edge.v()
            && self.contains_node(edge.u())
            && self.contains_node(edge.v())
            && !self.is_active(edge)
    }

    fn nodes(&self) -> impl Iterator<Item = NodeId> + '_;
    fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
    fn active_edges(&self) -> impl Iterator<Item = EdgeRef> + '_;
    fn complement_edges(&self) -> impl Iterator<Item = EdgeRef> + '_;
    fn incident_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeRef> + '_;
    fn complement_incident_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeRef> + '_;

    /// Move a complement edge into the active graph.
    fn activate(&mut self, edge: EdgeRef) -> Result<()>;
    /// Move an active edge back into the complement.
    fn deactivate(&mut self, edge: EdgeRef) -> Result<()>;
    /// Remove a node together with all of its pairs. Returns its former neighbors.
    fn erase_node(&mut self, node: NodeId) -> Result<Vec<NodeId>>;
}

/// Adjacency sets over a fixed id range; dead ids are never reused.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdjacencyGraph {
    alive: BTreeSet<NodeId>,
    adjacency: Vec<BTreeSet<NodeId>>,
    edge_count: usize,
}

impl AdjacencyGraph {
    fn check_pair(&self, edge: EdgeRef) -> Result<()> {
        if !self.contains_node(edge.u()) || !self.contains_node(edge.v()) {
            return Err(SimulationError::inconsistency(format!(
                "edge {}-{} touches a removed node",
                edge.u(),
                edge.v()
            )));
        }
        Ok(())
    }
}

impl ContactGraph for AdjacencyGraph {
    fn with_population(n: usize) -> AdjacencyGraph {
        AdjacencyGraph {
            alive: (0..n).collect(),
            adjacency: vec![BTreeSet::new(); n],
            edge_count: 0,
        }
    }

    fn size(&self) -> usize {
        self.alive.len()
    }

    fn count_edges(&self) -> usize {
        self.edge_count
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.alive.contains(&node)
    }

    fn degree(&self, node: NodeId) -> usize {
        self.adjacency.get(node).map_or(0, |adj| adj.len())
    }

    fn is_active(&self, edge: EdgeRef) -> bool {
        self.adjacency
            .get(edge.u())
            .map_or(false, |adj| adj.contains(&edge.v()))
    }

    fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.alive.iter().copied()
    }

    fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.get(node).into_iter().flatten().copied()
    }

    fn active_edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.alive.iter().flat_map(move |&u| {
            self.adjacency[u]
                .range(u + 1..)
                .map(move |&v| EdgeRef::new(u, v))
        })
    }

    fn complement_edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.alive.iter().flat_map(move |&u| {
            self.alive
                .range(u + 1..)
                .filter(move |v| !self.adjacency[u].contains(*v))
                .map(move |&v| EdgeRef::new(u, v))
        })
    }

    fn incident_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeRef> + '_ {
        self.neighbors(node).map(move |v| EdgeRef::new(node, v))
    }

    fn complement_incident_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeRef> + '_ {
        let alive = self.contains_node(node);
        self.alive
            .iter()
            .filter(move |&&v| alive && v != node && !self.adjacency[node].contains(&v))
            .map(move |&v| EdgeRef::new(node, v))
    }

    fn activate(&mut self, edge: EdgeRef) -> Result<()> {
        self.check_pair(edge)?;
        if !self.adjacency[edge.u()].insert(edge.v()) {
            return Err(SimulationError::inconsistency(format!(
                "edge {}-{} is already active",
                edge.u(),
                edge.v()
            )));
        }
        self.adjacency[edge.v()].insert(edge.u());
        self.edge_count += 1;
        Ok(())
    }

    fn deactivate(&mut self, edge: EdgeRef) -> Result<()> {
        self.check_pair(edge)?;
        if !self.adjacency[edge.u()].remove(&edge.v()) {
            return Err(SimulationError::inconsistency(format!(
                "edge {}-{} is not active",
                edge.u(),
                edge.v()
            )));
        }
        self.adjacency[edge.v()].remove(&edge.u());
        self.edge_count -= 1;
        Ok(())
    }

    fn erase_node(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        if !self.alive.remove(&node) {
            return Err(SimulationError::inconsistency(format!(
                "node {} is not part of the network",
                node
            )));
        }
        let former = std::mem::take(&mut self.adjacency[node]);
        for &v in &former {
            self.adjacency[v].remove(&node);
        }
        self.edge_count -= former.len();
        Ok(former.into_iter().collect())
    }
}
