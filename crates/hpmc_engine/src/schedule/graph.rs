//! Task-dependency graph over `(device, stage)` nodes.
//!
//! Nodes hold one-shot closures. Edges are must-complete-before
//! constraints. Execution proceeds in waves: every node whose
//! predecessors have all finished runs concurrently on the rayon pool,
//! and the end of a wave is a barrier for the next.
//!
//! # Architecture
//!
//! ```text
//! (d, Narrow) ─────────────────────────────────────┐
//! (d, Count k) ─┬─> (d, Phase1 k) ─┐               ├─> host barrier
//!               └─> (d, Phase2 k) ─┴─> (d, Merge k)┘
//! ```

use rayon::prelude::*;

use super::ScheduleError;

/// Stage a node performs for its device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Trial move proposal.
    Propose,
    /// Narrow-phase overlap resolution.
    Narrow,
    /// Depletant count draw for an active pair.
    DepletantCount(usize),
    /// Insertion around the particle itself.
    DepletantPhase1(usize),
    /// Insertion around the particle's moving neighbours.
    DepletantPhase2(usize),
    /// Merge of phase-two results into the main accumulator.
    DepletantMerge(usize),
    /// Acceptance test folded into the outgoing reject flags.
    Accept,
}

/// Identity of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey {
    /// Execution unit the node runs for.
    pub device: usize,
    /// Work performed.
    pub stage: Stage,
}

/// Handle returned by [`TaskGraph::add_node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(usize);

type Task<'a> = Box<dyn FnOnce() + Send + 'a>;

struct Node<'a> {
    key: NodeKey,
    task: Task<'a>,
}

/// One-shot dependency graph of closures.
///
/// # Examples
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use hpmc_engine::schedule::{NodeKey, Stage, TaskGraph};
///
/// let hits = AtomicUsize::new(0);
/// let mut graph = TaskGraph::new();
/// let a = graph.add_node(NodeKey { device: 0, stage: Stage::Narrow }, || {
///     hits.fetch_add(1, Ordering::SeqCst);
/// });
/// let b = graph.add_node(NodeKey { device: 0, stage: Stage::Accept }, || {
///     assert_eq!(hits.load(Ordering::SeqCst), 1);
/// });
/// graph.add_edge(a, b).unwrap();
/// let waves = graph.execute().unwrap();
/// assert_eq!(waves.len(), 2);
/// ```
#[derive(Default)]
pub struct TaskGraph<'a> {
    nodes: Vec<Node<'a>>,
    edges: Vec<(usize, usize)>,
}

impl<'a> TaskGraph<'a> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node and returns its handle.
    pub fn add_node(&mut self, key: NodeKey, task: impl FnOnce() + Send + 'a) -> NodeId {
        self.nodes.push(Node {
            key,
            task: Box::new(task),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Requires `before` to complete before `after` starts.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::UnknownNode` if either handle is foreign.
    pub fn add_edge(&mut self, before: NodeId, after: NodeId) -> Result<(), ScheduleError> {
        for id in [before, after] {
            if id.0 >= self.nodes.len() {
                return Err(ScheduleError::UnknownNode(id.0));
            }
        }
        self.edges.push((before.0, after.0));
        Ok(())
    }

    /// Groups nodes into waves of mutually independent work.
    fn waves(&self) -> Result<Vec<Vec<usize>>, ScheduleError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut successors = vec![Vec::new(); n];
        for &(a, b) in &self.edges {
            indegree[b] += 1;
            successors[a].push(b);
        }
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut waves = Vec::new();
        let mut scheduled = 0;
        while !ready.is_empty() {
            let mut next = Vec::new();
            for &i in &ready {
                for &s in &successors[i] {
                    indegree[s] -= 1;
                    if indegree[s] == 0 {
                        next.push(s);
                    }
                }
            }
            scheduled += ready.len();
            waves.push(std::mem::replace(&mut ready, next));
        }
        if scheduled != n {
            return Err(ScheduleError::Cycle {
                remaining: n - scheduled,
            });
        }
        Ok(waves)
    }

    /// Runs every node respecting the edges and returns the executed waves.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::Cycle` before running anything if the edges
    /// contain a cycle.
    pub fn execute(self) -> Result<Vec<Vec<NodeKey>>, ScheduleError> {
        let waves = self.waves()?;
        let mut slots: Vec<Option<Node<'a>>> = self.nodes.into_iter().map(Some).collect();
        let mut trace = Vec::with_capacity(waves.len());
        for wave in waves {
            let nodes: Vec<Node<'a>> = wave.iter().filter_map(|&i| slots[i].take()).collect();
            trace.push(nodes.iter().map(|n| n.key).collect());
            nodes.into_par_iter().for_each(|node| (node.task)());
        }
        Ok(trace)
    }
}
