use crate::queue::JobId;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use primitives::{Address, CryptoHash};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

impl Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a transfer edge.
///
/// `Ready → Proving → Submitted → Confirmed`, with `Failed` reachable from
/// any non-terminal state. Terminal states are never left.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EdgeState {
    Ready,
    Proving,
    Submitted,
    Confirmed,
    Failed,
}

impl EdgeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EdgeState::Confirmed | EdgeState::Failed)
    }

    fn can_transition_to(self, next: EdgeState) -> bool {
        match (self, next) {
            (EdgeState::Ready, EdgeState::Proving)
            | (EdgeState::Proving, EdgeState::Submitted)
            | (EdgeState::Submitted, EdgeState::Confirmed) => true,
            (from, EdgeState::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// One transfer in the dependency graph.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    pub depends_on: Vec<EdgeId>,
    pub state: EdgeState,
    pub job: Option<JobId>,
    pub queue_position: Option<usize>,
    pub tx_hash: Option<CryptoHash>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub proof_completed_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Edge {
    fn new(id: EdgeId, from: Address, to: Address, amount: u64, depends_on: Vec<EdgeId>) -> Self {
        Self {
            id,
            from,
            to,
            amount,
            depends_on,
            state: EdgeState::Ready,
            job: None,
            queue_position: None,
            tx_hash: None,
            error: None,
            started_at: None,
            proof_completed_at: None,
            ended_at: None,
        }
    }

    /// Advance the lifecycle. An edge never revisits a prior state.
    pub(crate) fn transition(&mut self, next: EdgeState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Validation(format!(
                "edge {} cannot transition {} -> {next}",
                self.id, self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// A directed graph of transfer edges.
///
/// An edge is *ready* once every edge it depends on is `Confirmed`.
/// Dependencies must reference existing edges and must not form a cycle;
/// both are rejected at construction time, since either would leave the
/// scheduler running forever.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    edges: Vec<Edge>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge, depending on earlier edges.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a dependency on an unknown edge.
    pub fn add_edge(
        &mut self,
        from: Address,
        to: Address,
        amount: u64,
        depends_on: &[EdgeId],
    ) -> Result<EdgeId> {
        for dep in depends_on {
            if dep.0 >= self.edges.len() {
                return Err(Error::Validation(format!(
                    "edge depends on unknown edge {dep}"
                )));
            }
        }

        let id = EdgeId(self.edges.len());
        self.edges
            .push(Edge::new(id, from, to, amount, depends_on.to_vec()));
        Ok(id)
    }

    /// Reject graphs the scheduler could never complete.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the dependency graph contains a cycle.
    pub fn validate(&self) -> Result<()> {
        // Kahn's algorithm: if a topological order doesn't cover every edge,
        // the rest form a cycle
        let mut in_degree = vec![0usize; self.edges.len()];
        for edge in &self.edges {
            in_degree[edge.id.0] = edge.depends_on.len();
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| i)
            .collect();

        let mut visited = 0;
        while let Some(current) = queue.pop_front() {
            visited += 1;
            for edge in &self.edges {
                if edge.depends_on.contains(&EdgeId(current)) {
                    in_degree[edge.id.0] -= 1;
                    if in_degree[edge.id.0] == 0 {
                        queue.push_back(edge.id.0);
                    }
                }
            }
        }

        if visited != self.edges.len() {
            return Err(Error::Validation(
                "dependency graph contains a cycle".into(),
            ));
        }

        Ok(())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id.0)
    }

    /// Edges whose dependencies are all confirmed and which have not
    /// started yet.
    pub fn ready_edges(&self) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|edge| edge.state == EdgeState::Ready)
            .filter(|edge| {
                edge.depends_on
                    .iter()
                    .all(|dep| self.edge(*dep).map(|e| e.state) == Some(EdgeState::Confirmed))
            })
            .map(|edge| edge.id)
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| matches!(edge.state, EdgeState::Proving | EdgeState::Submitted))
            .count()
    }

    /// Completion: every edge terminal.
    pub fn is_complete(&self) -> bool {
        self.edges.iter().all(|edge| edge.state.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn ready_requires_confirmed_dependencies() {
        let mut topology = Topology::new();
        let first = topology.add_edge(addr(1), addr(2), 50, &[]).unwrap();
        let second = topology.add_edge(addr(2), addr(3), 25, &[first]).unwrap();

        assert_eq!(topology.ready_edges(), vec![first]);

        topology.edge_mut(first).unwrap().transition(EdgeState::Proving).unwrap();
        assert!(topology.ready_edges().is_empty());

        topology.edge_mut(first).unwrap().transition(EdgeState::Submitted).unwrap();
        topology.edge_mut(first).unwrap().transition(EdgeState::Confirmed).unwrap();
        assert_eq!(topology.ready_edges(), vec![second]);
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut topology = Topology::new();
        let err = topology
            .add_edge(addr(1), addr(2), 50, &[EdgeId(7)])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[test]
    fn transitions_are_monotonic() {
        let mut topology = Topology::new();
        let id = topology.add_edge(addr(1), addr(2), 50, &[]).unwrap();
        let edge = topology.edge_mut(id).unwrap();

        edge.transition(EdgeState::Proving).unwrap();
        edge.transition(EdgeState::Submitted).unwrap();
        edge.transition(EdgeState::Confirmed).unwrap();

        // terminal states are never left
        assert!(edge.transition(EdgeState::Proving).is_err());
        assert!(edge.transition(EdgeState::Failed).is_err());
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        let mut topology = Topology::new();
        for _ in 0..3 {
            topology.add_edge(addr(1), addr(2), 50, &[]).unwrap();
        }

        let ready = topology.edge_mut(EdgeId(0)).unwrap();
        ready.transition(EdgeState::Failed).unwrap();

        let proving = topology.edge_mut(EdgeId(1)).unwrap();
        proving.transition(EdgeState::Proving).unwrap();
        proving.transition(EdgeState::Failed).unwrap();

        let submitted = topology.edge_mut(EdgeId(2)).unwrap();
        submitted.transition(EdgeState::Proving).unwrap();
        submitted.transition(EdgeState::Submitted).unwrap();
        submitted.transition(EdgeState::Failed).unwrap();
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut topology = Topology::new();
        let id = topology.add_edge(addr(1), addr(2), 50, &[]).unwrap();
        let edge = topology.edge_mut(id).unwrap();

        assert!(edge.transition(EdgeState::Confirmed).is_err());
        assert!(edge.transition(EdgeState::Submitted).is_err());
    }

    #[test]
    fn acyclic_graph_validates() {
        let mut topology = Topology::new();
        let a = topology.add_edge(addr(1), addr(2), 1, &[]).unwrap();
        let b = topology.add_edge(addr(2), addr(3), 1, &[a]).unwrap();
        topology.add_edge(addr(3), addr(4), 1, &[a, b]).unwrap();

        topology.validate().unwrap();
    }

    #[test]
    fn cycle_is_rejected() {
        // Dependencies on unknown (future) edges can't be built through
        // add_edge, so wire a cycle directly
        let mut topology = Topology::new();
        let a = topology.add_edge(addr(1), addr(2), 1, &[]).unwrap();
        let b = topology.add_edge(addr(2), addr(3), 1, &[a]).unwrap();
        topology.edge_mut(a).unwrap().depends_on.push(b);

        let err = topology.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[test]
    fn complete_only_when_all_terminal() {
        let mut topology = Topology::new();
        let a = topology.add_edge(addr(1), addr(2), 1, &[]).unwrap();
        let b = topology.add_edge(addr(2), addr(3), 1, &[]).unwrap();

        assert!(!topology.is_complete());

        topology.edge_mut(a).unwrap().transition(EdgeState::Failed).unwrap();
        assert!(!topology.is_complete());

        let edge = topology.edge_mut(b).unwrap();
        edge.transition(EdgeState::Proving).unwrap();
        edge.transition(EdgeState::Submitted).unwrap();
        edge.transition(EdgeState::Confirmed).unwrap();
        assert!(topology.is_complete());
    }
}
