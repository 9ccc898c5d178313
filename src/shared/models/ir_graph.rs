//! IR graph: flat arena of nodes, edges and symbols.
//!
//! Cyclic references are avoided by design (spec §9 "Cyclic references"):
//! the graph is a flat node arena keyed by string id, and the symbol table
//! / CFG / SSA map reference IR nodes by id rather than by pointer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{IrEdge, IrNode, Symbol};
use crate::errors::{NsssError, Result};

pub const MODULE_SCOPE: &str = "scope:module";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrGraph {
    pub nodes: Vec<IrNode>,
    pub edges: Vec<IrEdge>,
    pub symbols: Vec<Symbol>,
}

impl IrGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: IrNode) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn add_edge(&mut self, edge: IrEdge) {
        self.edges.push(edge);
    }

    pub fn add_symbol(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    /// Build an id -> node index for O(1) lookups.
    pub fn index(&self) -> HashMap<&str, &IrNode> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    pub fn node(&self, id: &str) -> Option<&IrNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut IrNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Validate the structural invariants from spec §3: every edge's
    /// endpoints exist; every node's parent_id (if set) exists; every
    /// scope_id is either the module scope or a child-scope string.
    pub fn validate(&self) -> Result<()> {
        let index = self.index();
        for edge in &self.edges {
            if !index.contains_key(edge.from_id.as_str()) {
                return Err(NsssError::ir(format!("dangling edge source: {}", edge.from_id)));
            }
            if !index.contains_key(edge.to_id.as_str()) {
                return Err(NsssError::ir(format!("dangling edge target: {}", edge.to_id)));
            }
        }
        for node in &self.nodes {
            if let Some(parent) = &node.parent_id {
                if !index.contains_key(parent.as_str()) {
                    return Err(NsssError::ir(format!("dangling parent: {}", parent)));
                }
            }
            if node.scope_id != MODULE_SCOPE && !node.scope_id.starts_with("scope:") {
                return Err(NsssError::ir(format!("malformed scope id: {}", node.scope_id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{EdgeType, IrEdge, NodeKind, Span};

    fn node(id: &str) -> IrNode {
        IrNode::new(id.to_string(), NodeKind::Name, Span::unknown("f.py"), None, MODULE_SCOPE.to_string())
    }

    #[test]
    fn validate_detects_dangling_edge() {
        let mut graph = IrGraph::new();
        graph.add_node(node("a"));
        graph.add_edge(IrEdge::new("a", "missing", EdgeType::Flow, None));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_graph() {
        let mut graph = IrGraph::new();
        graph.add_node(node("a"));
        graph.add_node(node("b"));
        graph.add_edge(IrEdge::new("a", "b", EdgeType::Flow, None));
        assert!(graph.validate().is_ok());
    }
}
