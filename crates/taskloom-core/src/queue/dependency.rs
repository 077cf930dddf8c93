//! Dependency graph for managing task dependencies.
//!
//! Design:
//! - Forward edges: task -> tasks it depends on (waits for)
//! - Reverse edges: task -> tasks that depend on it (waiting tasks)
//! - Invariant: edges and reverse_edges must be kept in sync
//! - Invariant: the graph is acyclic. `would_create_cycle` is checked before
//!   every `add_task`.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use super::cycle::find_cycle_from;
use crate::domain::TaskId;

/// Dependency graph for tracking task dependencies.
///
/// Edges may point at ids that are not (yet) known to the scheduler: a caller
/// can pre-allocate an id and submit the dependency later.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Forward edges: task -> tasks it depends on (waits for)
    edges: HashMap<TaskId, HashSet<TaskId>>,

    /// Reverse edges: task -> tasks that depend on it (waiting tasks)
    /// Enables O(1) lookup: "who is waiting for this task?"
    reverse_edges: HashMap<TaskId, HashSet<TaskId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Would adding `task -> deps` close a cycle?
    ///
    /// Returns the offending cycle. The graph is acyclic before the call, so
    /// any new cycle must pass through `task`; the search starts there.
    pub fn would_create_cycle(&self, task: TaskId, deps: &[TaskId]) -> Option<Vec<TaskId>> {
        find_cycle_from([task], |node| {
            if node == task {
                let mut next = self.dependencies(task);
                next.extend_from_slice(deps);
                next
            } else {
                self.dependencies(node)
            }
        })
    }

    /// Register `task` with its dependencies.
    pub fn add_task(&mut self, task: TaskId, deps: &[TaskId]) {
        for dep in deps {
            self.add_dependency(task, *dep);
        }
    }

    /// Add a dependency: `task` depends on `depends_on`.
    ///
    /// Example: add_dependency(task_b, task_a) means "B waits for A"
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        self.edges.entry(task).or_default().insert(depends_on);
        self.reverse_edges
            .entry(depends_on)
            .or_default()
            .insert(task);
    }

    /// Remove a dependency: `task` no longer depends on `depends_on`.
    pub fn remove_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        if let Entry::Occupied(mut e) = self.edges.entry(task) {
            e.get_mut().remove(&depends_on);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        if let Entry::Occupied(mut e) = self.reverse_edges.entry(depends_on) {
            e.get_mut().remove(&task);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }

    /// Drop every forward edge of `task`.
    ///
    /// Edges from other tasks into `task` are kept; those tasks still wait.
    pub fn remove_task(&mut self, task: TaskId) {
        for dep in self.dependencies(task) {
            self.remove_dependency(task, dep);
        }
    }

    /// Tasks waiting for `task`.
    ///
    /// Returns ALL tasks waiting for it, even if they have other dependencies.
    pub fn get_waiting_tasks(&self, task: TaskId) -> Vec<TaskId> {
        self.reverse_edges
            .get(&task)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn dependencies(&self, task: TaskId) -> Vec<TaskId> {
        self.edges
            .get(&task)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<const N: usize>() -> [TaskId; N] {
        std::array::from_fn(|_| TaskId::generate())
    }

    #[test]
    fn new_graph_has_no_edges() {
        let graph = DependencyGraph::new();
        let [a] = ids();
        assert!(graph.dependencies(a).is_empty());
        assert!(graph.get_waiting_tasks(a).is_empty());
    }

    #[test]
    fn add_dependency_creates_forward_and_reverse_edges() {
        let mut graph = DependencyGraph::new();
        let [a, b] = ids();

        graph.add_dependency(b, a); // B depends on A

        assert_eq!(graph.dependencies(b), vec![a]);
        assert!(graph.dependencies(a).is_empty());
        assert_eq!(graph.get_waiting_tasks(a), vec![b]);
    }

    #[test]
    fn remove_dependency_removes_both_edges() {
        let mut graph = DependencyGraph::new();
        let [a, b] = ids();

        graph.add_dependency(b, a);
        graph.remove_dependency(b, a);

        assert!(graph.dependencies(b).is_empty());
        assert!(graph.get_waiting_tasks(a).is_empty());
    }

    #[test]
    fn remove_task_keeps_incoming_edges() {
        let mut graph = DependencyGraph::new();
        let [a, b, c] = ids();

        // C -> B -> A
        graph.add_task(b, &[a]);
        graph.add_task(c, &[b]);
        graph.remove_task(b);

        assert!(graph.dependencies(b).is_empty());
        assert!(graph.get_waiting_tasks(a).is_empty());
        assert_eq!(graph.get_waiting_tasks(b), vec![c]);
    }

    #[test]
    fn multiple_dependencies() {
        let mut graph = DependencyGraph::new();
        let [a, b, c] = ids();

        graph.add_task(c, &[a, b]);

        let deps = graph.dependencies(c);
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&a));
        assert!(deps.contains(&b));
    }

    #[test]
    fn proposed_back_edge_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        let [a, b] = ids();

        // A depends on B (B not submitted yet)
        graph.add_task(a, &[b]);

        let cycle = graph.would_create_cycle(b, &[a]).unwrap();
        assert_eq!(cycle.len(), 2);
        assert!(cycle.contains(&a) && cycle.contains(&b));

        // checking does not mutate
        assert!(graph.dependencies(b).is_empty());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = DependencyGraph::new();
        let [a] = ids();
        assert_eq!(graph.would_create_cycle(a, &[a]), Some(vec![a]));
    }

    #[test]
    fn diamond_is_accepted() {
        let mut graph = DependencyGraph::new();
        let [a, b, c, d] = ids();

        graph.add_task(b, &[a]);
        graph.add_task(c, &[a]);
        assert!(graph.would_create_cycle(d, &[b, c]).is_none());
    }

    #[test]
    fn longer_cycle_through_new_task() {
        let mut graph = DependencyGraph::new();
        let [a, b, c] = ids();

        // A -> B -> C, then C -> A closes the loop
        graph.add_task(a, &[b]);
        graph.add_task(b, &[c]);
        let cycle = graph.would_create_cycle(c, &[a]).unwrap();
        assert_eq!(cycle.len(), 3);
    }
}
