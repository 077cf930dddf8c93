//! Generic cycle finder over a directed graph.
//!
//! Used for two different edge sets:
//! - admission: the dependency graph plus the edges a new task proposes
//! - deadlock detection: the blocked-by graph of queued tasks
//!
//! Iterative DFS with white/gray/black coloring, so deep chains cannot blow
//! the stack. Neighbors are visited in sorted order, which makes the reported
//! cycle deterministic for a given graph.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored, no cycle reachable through it.
    Black,
}

/// Find a cycle reachable from any of `starts`.
///
/// `neighbors(n)` returns the nodes `n` points to. Returns the nodes of the
/// first cycle found in path order (`c[0] -> c[1] -> ... -> c[0]`), or `None`.
pub fn find_cycle_from<N, I, F>(starts: I, mut neighbors: F) -> Option<Vec<N>>
where
    N: Copy + Eq + Hash + Ord,
    I: IntoIterator<Item = N>,
    F: FnMut(N) -> Vec<N>,
{
    let mut color: HashMap<N, Color> = HashMap::new();

    let mut sorted = |n: N| {
        let mut next = neighbors(n);
        next.sort();
        next.dedup();
        next.into_iter()
    };

    for start in starts {
        if color.contains_key(&start) {
            continue;
        }

        color.insert(start, Color::Gray);
        let mut path = vec![start];
        let mut stack = vec![sorted(start)];

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };

            match frame.next() {
                Some(next) => match color.get(&next) {
                    Some(Color::Gray) => {
                        if let Some(pos) = path.iter().position(|n| *n == next) {
                            return Some(path[pos..].to_vec());
                        }
                    }
                    Some(Color::Black) => {}
                    None => {
                        color.insert(next, Color::Gray);
                        path.push(next);
                        stack.push(sorted(next));
                    }
                },
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        color.insert(done, Color::Black);
                    }
                }
            }
        }
    }

    None
}

/// Find any cycle in an adjacency map.
pub fn find_cycle<N>(edges: &HashMap<N, HashSet<N>>) -> Option<Vec<N>>
where
    N: Copy + Eq + Hash + Ord,
{
    let mut starts: Vec<N> = edges.keys().copied().collect();
    starts.sort();
    find_cycle_from(starts, |n| {
        edges
            .get(&n)
            .map(|next| next.iter().copied().collect())
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(u32, u32)]) -> HashMap<u32, HashSet<u32>> {
        let mut g: HashMap<u32, HashSet<u32>> = HashMap::new();
        for (from, to) in edges {
            g.entry(*from).or_default().insert(*to);
        }
        g
    }

    /// Every consecutive pair (and the wrap-around) must be an edge.
    fn assert_is_cycle(g: &HashMap<u32, HashSet<u32>>, cycle: &[u32]) {
        assert!(!cycle.is_empty());
        for (i, from) in cycle.iter().enumerate() {
            let to = cycle[(i + 1) % cycle.len()];
            assert!(g[from].contains(&to), "{from} -> {to} is not an edge");
        }
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        assert!(find_cycle::<u32>(&HashMap::new()).is_none());
    }

    #[test]
    fn detect_simple_cycle() {
        let g = graph(&[(1, 2), (2, 1)]);
        let cycle = find_cycle(&g).unwrap();
        assert_eq!(cycle.len(), 2);
        assert_is_cycle(&g, &cycle);
    }

    #[test]
    fn detect_self_dependency() {
        let g = graph(&[(1, 1)]);
        assert_eq!(find_cycle(&g), Some(vec![1]));
    }

    #[test]
    fn detect_longer_cycle_behind_a_tail() {
        // 2 -> 1, and 2 -> 3 -> 4 -> 2
        let g = graph(&[(2, 1), (3, 2), (4, 3), (2, 4)]);
        let cycle = find_cycle(&g).unwrap();
        assert_eq!(cycle.len(), 3);
        assert!(!cycle.contains(&1));
        assert_is_cycle(&g, &cycle);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let g = graph(&[(2, 1), (3, 2), (3, 1)]);
        assert!(find_cycle(&g).is_none());
    }

    #[test]
    fn complex_dag_with_cross_edges() {
        //     1
        //    / \
        //   2   3
        //   |\ /|
        //   | X |
        //   |/ \|
        //   4   5
        let g = graph(&[(2, 1), (3, 1), (4, 2), (5, 2), (4, 3), (5, 3)]);
        assert!(find_cycle(&g).is_none());
    }

    #[test]
    fn two_disjoint_cycles_report_one() {
        let g = graph(&[(1, 2), (2, 1), (10, 11), (11, 10)]);
        let cycle = find_cycle(&g).unwrap();
        assert_eq!(cycle, vec![1, 2]);
    }

    #[test]
    fn search_can_be_limited_to_start_nodes() {
        // cycle 10 <-> 11 is unreachable from 1
        let g = graph(&[(1, 2), (10, 11), (11, 10)]);
        let found = find_cycle_from([1], |n| {
            g.get(&n)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default()
        });
        assert!(found.is_none());
    }

    #[test]
    fn long_chain_does_not_overflow() {
        let edges: Vec<(u32, u32)> = (0..50_000).map(|i| (i, i + 1)).collect();
        let g = graph(&edges);
        assert!(find_cycle(&g).is_none());
    }
}
