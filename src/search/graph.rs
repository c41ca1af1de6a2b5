//! Optional state-space graph recording.
//!
//! When enabled, the engine mirrors every discovered state and firing into
//! a [`DiGraph`] for dot output. Meant for eyeballing small nets; big state
//! spaces make graphviz the bottleneck long before the checker.

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

pub struct StateGraph {
    graph: DiGraph<String, String>,
    /// State id to node, dense in discovery order.
    nodes: Vec<NodeIndex>,
}

impl StateGraph {
    pub fn new() -> Self {
        StateGraph {
            graph: DiGraph::new(),
            nodes: Vec::new(),
        }
    }

    /// Registers state `id` with its display label. Ids must arrive densely
    /// in order; anything else is silently renumbered.
    pub fn add_state(&mut self, id: u64, label: String) -> NodeIndex {
        let node = self.graph.add_node(label);
        if id as usize == self.nodes.len() {
            self.nodes.push(node);
        }
        node
    }

    pub fn add_edge(&mut self, parent: u64, child: u64, label: String) {
        if let (Some(&source), Some(&target)) =
            (self.nodes.get(parent as usize), self.nodes.get(child as usize))
        {
            self.graph.add_edge(source, target, label);
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn to_dot_string(&self) -> String {
        format!(
            "digraph {{\n{}\n}}",
            Dot::with_config(&self.graph, &[Config::GraphContentOnly])
        )
    }

    /// Writes the dot rendering to `path`, or to stdout when `None`.
    pub fn dot(&self, path: Option<&str>) -> std::io::Result<()> {
        let dot_string = self.to_dot_string();
        match path {
            Some(file_path) => {
                use std::fs::File;
                use std::io::Write;
                let mut file = File::create(file_path)?;
                file.write_all(dot_string.as_bytes())?;
                Ok(())
            }
            None => {
                println!("{}", dot_string);
                Ok(())
            }
        }
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        StateGraph::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_states_and_firings() {
        let mut graph = StateGraph::new();
        graph.add_state(0, "p: 2'r".to_owned());
        graph.add_state(1, "p: 1'r".to_owned());
        graph.add_edge(0, 1, "t[0]".to_owned());
        graph.add_edge(1, 1, "u[0]".to_owned());

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
        let dot = graph.to_dot_string();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("p: 2'r"));
        assert!(dot.contains("t[0]"));
    }

    #[test]
    fn edges_to_unknown_states_are_dropped() {
        let mut graph = StateGraph::new();
        graph.add_state(0, "s".to_owned());
        graph.add_edge(0, 9, "t".to_owned());
        assert_eq!(graph.edge_count(), 0);
    }
}
