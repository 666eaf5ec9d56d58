//! Wait-for graph construction and cycle detection.
//!
//! Edge `A -> B` means A is blocked on something B holds. The graph is
//! rebuilt from the allocation state every detection round and discarded
//! afterwards.

use crate::allocation::AllocationState;
use crate::model::{PendingRequest, Process, ProcessState};
use crate::policy::DenyReason;
use stalemate_env::ProcessId;
use std::collections::{HashMap, VecDeque};

/// Directed wait-for graph over process ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    nodes: Vec<ProcessId>,
    edges: Vec<(ProcessId, ProcessId)>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: &[(ProcessId, ProcessId)]) -> Self {
        let mut graph = Self::new();
        for &(from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    /// Builds the graph for the current state.
    ///
    /// A process blocked on a specific resource waits on its holders. A
    /// process blocked on an unsafe banker denial waits on everybody holding
    /// anything, since no single holder is to blame.
    pub fn build(processes: &[Process], alloc: &AllocationState) -> Self {
        let mut graph = Self::new();

        for process in processes {
            if process.state != ProcessState::Blocked {
                continue;
            }
            let Some(request) = &process.current_request else {
                continue;
            };

            let targets: Vec<ProcessId> = if process.last_denial == Some(DenyReason::Unsafe) {
                (0..alloc.num_processes())
                    .map(ProcessId::new)
                    .filter(|&p| alloc.holds_any(p))
                    .collect()
            } else {
                match request {
                    PendingRequest::Unit(resource) => alloc.holders(*resource),
                    PendingRequest::Vector(amounts) => (0..alloc.num_processes())
                        .map(ProcessId::new)
                        .filter(|&p| {
                            amounts
                                .iter()
                                .enumerate()
                                .any(|(r, &amount)| amount > 0 && alloc.allocation()[(p.index(), r)] > 0)
                        })
                        .collect(),
                }
            };

            for holder in targets {
                if holder != process.id {
                    graph.add_edge(process.id, holder);
                }
            }
        }

        graph
    }

    /// Adds an edge (duplicates ignored).
    pub fn add_edge(&mut self, from: ProcessId, to: ProcessId) {
        for node in [from, to] {
            if !self.nodes.contains(&node) {
                self.nodes.push(node);
            }
        }
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
        }
    }

    pub fn edges(&self) -> &[(ProcessId, ProcessId)] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn successors(&self, node: ProcessId) -> impl Iterator<Item = ProcessId> + '_ {
        self.edges
            .iter()
            .filter(move |(from, _)| *from == node)
            .map(|&(_, to)| to)
    }

    /// Returns the shortest cycle, rotated to start at its lowest id.
    ///
    /// Runs a breadth-first search from every node; the first predecessor
    /// of the root reached closes the shortest cycle through that root.
    /// Ties go to the cycle through the lowest id.
    pub fn find_cycle(&self) -> Option<Vec<ProcessId>> {
        let mut roots = self.nodes.clone();
        roots.sort();

        let mut best: Option<Vec<ProcessId>> = None;
        for root in roots {
            if let Some(cycle) = self.shortest_cycle_through(root) {
                if best.as_ref().map_or(true, |b| cycle.len() < b.len()) {
                    best = Some(cycle);
                }
            }
        }

        best.map(canonical)
    }

    fn shortest_cycle_through(&self, root: ProcessId) -> Option<Vec<ProcessId>> {
        let mut parent: HashMap<ProcessId, ProcessId> = HashMap::new();
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            for next in self.successors(node) {
                if next == root {
                    let mut cycle = vec![node];
                    let mut cursor = node;
                    while let Some(&prev) = parent.get(&cursor) {
                        cycle.push(prev);
                        cursor = prev;
                    }
                    cycle.reverse();
                    return Some(cycle);
                }
                if !parent.contains_key(&next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

/// Rotates a cycle so its lowest id comes first.
fn canonical(mut cycle: Vec<ProcessId>) -> Vec<ProcessId> {
    if let Some(start) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| **p)
        .map(|(i, _)| i)
    {
        cycle.rotate_left(start);
    }
    cycle
}

/// Outcome of one detection round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub edges: Vec<(ProcessId, ProcessId)>,
    pub cycle: Option<Vec<ProcessId>>,
}

impl Detection {
    pub fn is_deadlock(&self) -> bool {
        self.cycle.is_some()
    }
}

/// Builds the wait-for graph and looks for a cycle.
pub fn detect(processes: &[Process], alloc: &AllocationState) -> Detection {
    let graph = WaitForGraph::build(processes, alloc);
    let cycle = graph.find_cycle();
    Detection {
        edges: graph.edges,
        cycle,
    }
}
