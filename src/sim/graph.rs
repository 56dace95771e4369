use fxhash::FxHashMap;

use crate::circuit::Circuit;
use crate::sim::netlist::Netlist;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Visiting,
    Done,
}

/// Dependencies between gates, as incoming edges
///
/// Every wire orders its source before its sink, except feedback wires: wires into a sequential
/// gate from a gate that depends on it. Those are read from the previous pass, so loops through
/// a flip-flop or a latch are not cycles.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    sequential: Vec<bool>,
    component: Vec<usize>,
    incoming: Vec<Vec<usize>>,
}

/// Order in which an acyclic graph is evaluated in a single pass
#[derive(Debug, Clone)]
pub struct Schedule {
    graph: DependencyGraph,
    order: Vec<usize>,
}

impl Schedule {
    /// Nodes in evaluation order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Returns whether the wire from `from` to `to` carries the value of the previous pass
    pub fn is_feedback(&self, from: usize, to: usize) -> bool {
        self.graph.is_feedback(from, to)
    }
}

impl DependencyGraph {
    /// Build the graph from (from, to) edges
    pub fn build<I: IntoIterator<Item = (usize, usize)>>(
        sequential: Vec<bool>,
        edges: I,
    ) -> DependencyGraph {
        let mut all = vec![Vec::new(); sequential.len()];
        for (from, to) in edges {
            if !all[to].contains(&from) {
                all[to].push(from);
            }
        }
        let component = components(&all);
        let incoming: Vec<Vec<usize>> = all
            .into_iter()
            .enumerate()
            .map(|(to, preds)| {
                preds
                    .into_iter()
                    .filter(|from| !(sequential[to] && component[*from] == component[to]))
                    .collect()
            })
            .collect();
        DependencyGraph {
            sequential,
            component,
            incoming,
        }
    }

    /// Build the graph of a netlist
    pub fn from_netlist(net: &Netlist) -> DependencyGraph {
        let sequential = net
            .nodes()
            .iter()
            .map(|n| n.element.is_sequential())
            .collect();
        Self::build(sequential, net.connections().iter().map(|c| (c.from, c.to)))
    }

    /// Build the graph of a circuit, ignoring wires whose gates do not exist
    pub fn from_circuit(circuit: &Circuit) -> DependencyGraph {
        let mut index = FxHashMap::default();
        for (i, g) in circuit.gates.iter().enumerate() {
            index.entry(g.id.as_str()).or_insert(i);
        }
        let sequential = circuit
            .gates
            .iter()
            .map(|g| g.kind.is_sequential())
            .collect();
        let edges = circuit.wires.iter().filter_map(|w| {
            Some((
                *index.get(w.from.gate_id.as_str())?,
                *index.get(w.to.gate_id.as_str())?,
            ))
        });
        Self::build(sequential, edges)
    }

    /// Return the number of nodes
    pub fn nb_nodes(&self) -> usize {
        self.sequential.len()
    }

    /// Nodes evaluated before node i in the same pass
    pub fn dependencies(&self, i: usize) -> &[usize] {
        &self.incoming[i]
    }

    /// Returns whether the wire from `from` to `to` closes a loop through sequential gate `to`
    pub fn is_feedback(&self, from: usize, to: usize) -> bool {
        self.sequential[to] && self.component[from] == self.component[to]
    }

    /// Order the nodes for a single pass, or return a combinational cycle
    pub fn schedule(self) -> Result<Schedule, Vec<usize>> {
        let order = self.topological_order()?;
        Ok(Schedule { graph: self, order })
    }

    /// Order the nodes so that each comes after its dependencies
    ///
    /// Feedback wires are not dependencies. On a combinational cycle, returns the cycle in signal order, with the first node
    /// repeated at the end.
    pub fn topological_order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let mut mark = vec![Mark::New; self.nb_nodes()];
        let mut order = Vec::with_capacity(self.nb_nodes());
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for root in 0..self.nb_nodes() {
            if mark[root] != Mark::New {
                continue;
            }
            mark[root] = Mark::Visiting;
            stack.push((root, 0));
            while let Some(&(node, child)) = stack.last() {
                if child < self.incoming[node].len() {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let p = self.incoming[node][child];
                    match mark[p] {
                        Mark::New => {
                            mark[p] = Mark::Visiting;
                            stack.push((p, 0));
                        }
                        Mark::Visiting => {
                            let pos = stack.iter().position(|(n, _)| *n == p).unwrap_or(0);
                            let mut cycle: Vec<usize> =
                                stack[pos..].iter().rev().map(|(n, _)| *n).collect();
                            cycle.push(cycle[0]);
                            return Err(cycle);
                        }
                        Mark::Done => (),
                    }
                } else {
                    mark[node] = Mark::Done;
                    order.push(node);
                    stack.pop();
                }
            }
        }
        Ok(order)
    }

    /// Returns whether the graph has a combinational cycle
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Number of combinational gates on the longest dependency path
    ///
    /// Edges closing a cycle are ignored.
    pub fn max_depth(&self) -> usize {
        let mut depth: Vec<Option<usize>> = vec![None; self.nb_nodes()];
        let mut visiting = vec![false; self.nb_nodes()];
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for root in 0..self.nb_nodes() {
            if depth[root].is_some() {
                continue;
            }
            visiting[root] = true;
            stack.push((root, 0));
            while let Some(&(node, child)) = stack.last() {
                if child < self.incoming[node].len() {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let p = self.incoming[node][child];
                    if depth[p].is_none() && !visiting[p] {
                        visiting[p] = true;
                        stack.push((p, 0));
                    }
                } else {
                    let d = if self.sequential[node] {
                        0
                    } else {
                        1 + self.incoming[node]
                            .iter()
                            .map(|p| depth[*p].unwrap_or(0))
                            .max()
                            .unwrap_or(0)
                    };
                    depth[node] = Some(d);
                    visiting[node] = false;
                    stack.pop();
                }
            }
        }
        depth.into_iter().flatten().max().unwrap_or(0)
    }
}

/// Strongly connected component of each node, from its incoming edges
fn components(incoming: &[Vec<usize>]) -> Vec<usize> {
    let n = incoming.len();
    let mut outgoing = vec![Vec::new(); n];
    for (to, preds) in incoming.iter().enumerate() {
        for from in preds {
            outgoing[*from].push(to);
        }
    }

    // Finishing order of a depth-first search along the wires
    let mut visited = vec![false; n];
    let mut finished = Vec::with_capacity(n);
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for root in 0..n {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        stack.push((root, 0));
        while let Some(&(node, child)) = stack.last() {
            if child < outgoing[node].len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let s = outgoing[node][child];
                if !visited[s] {
                    visited[s] = true;
                    stack.push((s, 0));
                }
            } else {
                finished.push(node);
                stack.pop();
            }
        }
    }

    // Nodes reached backwards from the latest finished node form its component
    let mut component = vec![usize::MAX; n];
    let mut nb_components = 0;
    for &root in finished.iter().rev() {
        if component[root] != usize::MAX {
            continue;
        }
        component[root] = nb_components;
        let mut todo = vec![root];
        while let Some(node) = todo.pop() {
            for &p in &incoming[node] {
                if component[p] == usize::MAX {
                    component[p] = nb_components;
                    todo.push(p);
                }
            }
        }
        nb_components += 1;
    }
    component
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order() {
        // 0 -> 2 -> 3, 1 -> 2, inserted out of order
        let g = DependencyGraph::build(vec![true, true, false, false], [(2, 3), (1, 2), (0, 2)]);
        let order = g.topological_order().unwrap();
        assert_eq!(order.len(), 4);
        let pos = |n: usize| order.iter().position(|x| *x == n).unwrap();
        assert!(pos(0) < pos(2));
        assert!(pos(1) < pos(2));
        assert!(pos(2) < pos(3));
        assert_eq!(g.max_depth(), 2);
    }

    #[test]
    fn test_cycle() {
        // A -> B -> A
        let g = DependencyGraph::build(vec![false, false], [(0, 1), (1, 0)]);
        let cycle = g.topological_order().unwrap_err();
        assert!(cycle.contains(&0));
        assert!(cycle.contains(&1));
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 3);
        assert_eq!(g.max_depth(), 2);
    }

    #[test]
    fn test_self_loop() {
        let g = DependencyGraph::build(vec![false], [(0, 0)]);
        assert_eq!(g.topological_order().unwrap_err(), vec![0, 0]);
    }

    #[test]
    fn test_sequential_break() {
        // Loop through a flip-flop is not a combinational cycle
        let g = DependencyGraph::build(vec![true, false], [(0, 1), (1, 0)]);
        assert!(!g.has_cycle());
        assert_eq!(g.dependencies(0), &[] as &[usize]);
        assert_eq!(g.dependencies(1), &[0]);
        assert!(g.is_feedback(1, 0));
        assert!(!g.is_feedback(0, 1));
        assert_eq!(g.max_depth(), 1);
    }

    #[test]
    fn test_sequential_sink() {
        // Input -> Not -> Latch: the latch comes after the inverter
        let g = DependencyGraph::build(vec![true, false, true], [(1, 2), (0, 1)]);
        assert!(!g.is_feedback(1, 2));
        let schedule = g.schedule().unwrap();
        let order = schedule.order();
        let pos = |n: usize| order.iter().position(|x| *x == n).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(1) < pos(2));
    }

    #[test]
    fn test_shift_loop() {
        // Two flip-flops feeding each other, on a common clock 2
        let g = DependencyGraph::build(vec![true, true, true], [(0, 1), (1, 0), (2, 0), (2, 1)]);
        assert!(g.is_feedback(0, 1));
        assert!(g.is_feedback(1, 0));
        assert!(!g.is_feedback(2, 0));
        assert!(!g.is_feedback(2, 1));
        let order = g.schedule().unwrap().order().to_vec();
        assert_eq!(order[0], 2);
    }

    #[test]
    fn test_ring() {
        let n = 5;
        let edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        let g = DependencyGraph::build(vec![false; n], edges);
        let cycle = g.topological_order().unwrap_err();
        assert_eq!(cycle.len(), n + 1);
        // Signal order: each node drives the next one
        for w in cycle.windows(2) {
            assert_eq!(w[1], (w[0] + 1) % n);
        }
    }
}
