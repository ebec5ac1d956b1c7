//! Execution ordering from input-path dependencies.

use std::collections::{BTreeSet, HashMap};

use contracts::GraphError;

/// Topological order (Kahn) of `nodes`, given as `(name, producers it reads from)`.
///
/// Ties are broken by insertion order so the schedule is deterministic. Dependencies on
/// nodes that are not present are ignored: those inputs are unresolved, not ordered.
pub fn execution_order(nodes: &[(&str, Vec<&str>)]) -> Result<Vec<usize>, GraphError> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, i))
        .collect();

    let mut in_degree = vec![0usize; nodes.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (consumer, (_, producers)) in nodes.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for producer in producers {
            if let Some(&p) = index.get(producer) {
                if seen.insert(p) {
                    consumers[p].push(consumer);
                    in_degree[consumer] += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &consumer in &consumers[next] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                ready.insert(consumer);
            }
        }
    }

    if order.len() != nodes.len() {
        let nodes = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].0.to_string())
            .collect();
        return Err(GraphError::Cycle { nodes });
    }

    Ok(order)
}
