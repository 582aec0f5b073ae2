//! Deterministic topological ordering
//!
//! Kahn's algorithm over component insertion indices. Ties are always broken
//! by insertion order, so the same construction sequence yields the same
//! execution order on every run.

use std::collections::{HashMap, VecDeque};

use crate::error::{Result, WorkflowError};
use crate::graph::WorkflowGraph;
use crate::types::ComponentId;

/// Order every component so that each connection's source precedes its target
///
/// # Errors
///
/// `CyclicWorkflow` naming the components of one cycle when the graph
/// cannot be fully ordered.
pub fn execution_order(graph: &WorkflowGraph) -> Result<Vec<ComponentId>> {
    let ids = graph.component_ids();
    let sorted = kahn(graph, &ids);

    if sorted.order.len() < ids.len() {
        let components = extract_cycle(graph, &ids, &sorted.in_degree);
        return Err(WorkflowError::CyclicWorkflow { components });
    }

    Ok(sorted.order.into_iter().map(|i| ids[i].clone()).collect())
}

/// Components of one cycle, in connection direction; empty when acyclic
pub fn find_cycle(graph: &WorkflowGraph) -> Vec<ComponentId> {
    let ids = graph.component_ids();
    let sorted = kahn(graph, &ids);
    if sorted.order.len() == ids.len() {
        return Vec::new();
    }
    extract_cycle(graph, &ids, &sorted.in_degree)
}

struct Sorted {
    order: Vec<usize>,
    /// Remaining in-degree per component; non-zero entries were never ordered
    in_degree: Vec<usize>,
}

fn kahn(graph: &WorkflowGraph, ids: &[ComponentId]) -> Sorted {
    let index: HashMap<&ComponentId, usize> =
        ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut in_degree = vec![0usize; ids.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for connection in graph.connections() {
        let (Some(&from), Some(&to)) = (
            index.get(&connection.source_component),
            index.get(&connection.target_component),
        ) else {
            continue;
        };
        in_degree[to] += 1;
        successors[from].push(to);
    }

    let mut queue: VecDeque<usize> = (0..ids.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(ids.len());

    while let Some(current) = queue.pop_front() {
        order.push(current);

        let mut released = Vec::new();
        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                released.push(next);
            }
        }
        released.sort_unstable();
        queue.extend(released);
    }

    Sorted { order, in_degree }
}

/// Walk predecessors among the unordered components until one repeats
fn extract_cycle(
    graph: &WorkflowGraph,
    ids: &[ComponentId],
    in_degree: &[usize],
) -> Vec<ComponentId> {
    let remaining = |id: &ComponentId| {
        ids.iter()
            .position(|candidate| candidate == id)
            .is_some_and(|i| in_degree[i] > 0)
    };

    let Some(start) = (0..ids.len()).find(|&i| in_degree[i] > 0) else {
        return Vec::new();
    };

    let mut walk: Vec<&ComponentId> = vec![&ids[start]];
    loop {
        let Some(current) = walk.last().copied() else {
            return Vec::new();
        };
        // Every unordered component still has an unordered predecessor
        let Some(previous) = graph
            .incoming_connections(current)
            .map(|c| &c.source_component)
            .find(|source| remaining(source))
        else {
            return walk.into_iter().cloned().collect();
        };

        if let Some(pos) = walk.iter().position(|id| *id == previous) {
            let mut cycle: Vec<ComponentId> = walk[pos..].iter().map(|id| (*id).clone()).collect();
            cycle.reverse();
            cycle.rotate_right(1);
            return cycle;
        }
        walk.push(previous);
    }
}
