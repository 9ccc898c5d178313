//! CFG builder: groups the IR's statement-level nodes into basic blocks
//! per function/module unit and relabels the IR's own edges with CFG
//! labels (spec §4.4).
//!
//! The IR builder already produced most of the grouping we need: `Block`
//! nodes carry an ordered `stmt_ids` list, and branch/loop/try/match nodes
//! are already wired to their children with `True`/`False`/`Exception`/
//! `Flow`/`Break`/`Continue` edges. This pass only has to split straight
//! runs of statements at control-node boundaries and translate node-level
//! edges into block-level ones, following the teacher's plain-struct
//! domain-model texture (`features/ssa/domain/ssa_graph.rs`): small data
//! types, behavior lives in free functions instead of methods on them.

use std::collections::{HashMap, HashSet};

use crate::shared::models::{EdgeType, IrGraph, NodeKind, Value};

pub type BlockId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfgLabel {
    True,
    False,
    Next,
    Stop,
    AsyncNext,
    AsyncStop,
    Exception,
}

#[derive(Debug, Clone)]
pub struct CfgBlock {
    pub id: BlockId,
    pub stmt_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CfgEdge {
    pub from: BlockId,
    pub to: BlockId,
    pub label: CfgLabel,
}

/// One function's (or the module top-level's) control-flow graph.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub unit: String,
    pub blocks: Vec<CfgBlock>,
    pub edges: Vec<CfgEdge>,
    pub entry: BlockId,
}

/// Builds one CFG per `Module`/`Function` node, keyed by that node's id.
pub fn build_cfg(graph: &IrGraph) -> HashMap<String, Cfg> {
    let adjacency = build_adjacency(graph);
    let mut cfgs = HashMap::new();

    for node in &graph.nodes {
        if !matches!(node.kind, NodeKind::Module | NodeKind::Function) {
            continue;
        }
        let body_ids = string_list(node.get("body_ids"));

        let mut builder = UnitBuilder {
            graph,
            adjacency: &adjacency,
            blocks: Vec::new(),
            block_of: HashMap::new(),
            visited: HashSet::new(),
        };
        let entry = builder.process_group(&body_ids).unwrap_or_else(|| builder.new_block(Vec::new()));
        let edges = translate_edges(graph, &builder.block_of);

        cfgs.insert(node.id.clone(), Cfg { unit: node.id.clone(), blocks: builder.blocks, edges, entry });
    }

    cfgs
}

fn build_adjacency(graph: &IrGraph) -> HashMap<String, Vec<(String, EdgeType)>> {
    let mut adjacency: HashMap<String, Vec<(String, EdgeType)>> = HashMap::new();
    for edge in &graph.edges {
        adjacency.entry(edge.from_id.clone()).or_default().push((edge.to_id.clone(), edge.edge_type));
    }
    adjacency
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default()
}

fn is_branch_kind(kind: Option<NodeKind>) -> bool {
    matches!(
        kind,
        Some(NodeKind::If | NodeKind::While | NodeKind::For | NodeKind::Try | NodeKind::With | NodeKind::Match)
    )
}

fn is_block_boundary_kind(kind: Option<NodeKind>) -> bool {
    is_branch_kind(kind)
        || matches!(
            kind,
            Some(NodeKind::Return
                | NodeKind::Raise
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Function
                | NodeKind::Class)
        )
}

/// Splits a straight-line statement list into basic-block groups: a
/// control/terminator node is always its own single-node group.
fn split_into_blocks(graph: &IrGraph, ids: &[String]) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for id in ids {
        let kind = graph.node(id).map(|n| n.kind);
        if is_block_boundary_kind(kind) {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            groups.push(vec![id.clone()]);
        } else {
            current.push(id.clone());
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

struct UnitBuilder<'g> {
    graph: &'g IrGraph,
    adjacency: &'g HashMap<String, Vec<(String, EdgeType)>>,
    blocks: Vec<CfgBlock>,
    block_of: HashMap<String, BlockId>,
    visited: HashSet<String>,
}

impl<'g> UnitBuilder<'g> {
    fn kind_of(&self, id: &str) -> Option<NodeKind> {
        self.graph.node(id).map(|n| n.kind)
    }

    fn new_block(&mut self, ids: Vec<String>) -> BlockId {
        let bid = self.blocks.len();
        for id in &ids {
            self.block_of.insert(id.clone(), bid);
        }
        self.blocks.push(CfgBlock { id: bid, stmt_ids: ids });
        bid
    }

    fn block_stmt_ids(&self, id: &str) -> Vec<String> {
        string_list(self.graph.node(id).and_then(|n| n.get("stmt_ids")))
    }

    /// Splits `ids` into blocks and recursively discovers every block
    /// reachable from a branch/try/match node found in the run. Returns
    /// the id of the first block created, if any.
    fn process_group(&mut self, ids: &[String]) -> Option<BlockId> {
        if ids.is_empty() {
            return None;
        }
        let groups = split_into_blocks(self.graph, ids);
        let mut first = None;
        for group in groups {
            let branch_members: Vec<String> =
                group.iter().filter(|id| is_branch_kind(self.kind_of(id))).cloned().collect();
            let bid = self.new_block(group);
            if first.is_none() {
                first = Some(bid);
            }
            for cid in branch_members {
                self.expand_children(&cid);
            }
        }
        first
    }

    /// Resolves an edge target not yet assigned to a block: a `Block`
    /// node expands into its `stmt_ids`; anything else (a bare control
    /// node reached only by edge, e.g. an `elif`'s nested `If`) becomes
    /// its own singleton block.
    fn expand_or_create_block_for(&mut self, tid: &str) {
        if self.block_of.contains_key(tid) || self.visited.contains(tid) {
            return;
        }
        self.visited.insert(tid.to_string());

        match self.kind_of(tid) {
            Some(NodeKind::Block) => {
                let stmt_ids = self.block_stmt_ids(tid);
                let first = self.process_group(&stmt_ids);
                let bid = first.unwrap_or_else(|| self.new_block(Vec::new()));
                self.block_of.insert(tid.to_string(), bid);
            }
            Some(_) => {
                self.new_block(vec![tid.to_string()]);
            }
            None => return,
        }
        self.expand_children(tid);
    }

    fn expand_children(&mut self, cid: &str) {
        let targets = self.adjacency.get(cid).cloned().unwrap_or_default();
        for (to_id, edge_type) in targets {
            if matches!(
                edge_type,
                EdgeType::Flow
                    | EdgeType::True
                    | EdgeType::False
                    | EdgeType::Exception
                    | EdgeType::Break
                    | EdgeType::Continue
                    | EdgeType::Call
            ) {
                self.expand_or_create_block_for(&to_id);
            }
        }
    }
}

/// Maps every IR node id covered by `cfg`'s blocks back to its block id.
/// Shared by the SSA and taint passes, which both need to locate the
/// block a given IR node lives in.
pub fn block_membership(cfg: &Cfg) -> HashMap<String, BlockId> {
    let mut map = HashMap::new();
    for block in &cfg.blocks {
        for id in &block.stmt_ids {
            map.insert(id.clone(), block.id);
        }
    }
    map
}

/// Walks `node_id`'s `parent_id` chain up to the nearest ancestor that is
/// itself a member of some block (i.e. a statement), for expressions
/// nested inside a statement (call arguments, branch conditions, etc.).
pub fn containing_statement(graph: &IrGraph, block_of: &HashMap<String, BlockId>, node_id: &str) -> Option<String> {
    let mut current = node_id.to_string();
    loop {
        if block_of.contains_key(&current) {
            return Some(current);
        }
        current = graph.node(&current)?.parent_id.clone()?;
    }
}

/// True if `node_id` is `ancestor_id` or a descendant of it, walking
/// `parent_id` links.
pub fn is_within(graph: &IrGraph, ancestor_id: &str, node_id: &str) -> bool {
    let mut current = node_id.to_string();
    loop {
        if current == ancestor_id {
            return true;
        }
        match graph.node(&current).and_then(|n| n.parent_id.clone()) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// Block ids forward-reachable from `start` (inclusive) via CFG edges.
pub fn reachable_blocks(cfg: &Cfg, start: BlockId) -> HashSet<BlockId> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(b) = stack.pop() {
        if !seen.insert(b) {
            continue;
        }
        for edge in &cfg.edges {
            if edge.from == b {
                stack.push(edge.to);
            }
        }
    }
    seen
}

fn translate_edges(graph: &IrGraph, block_of: &HashMap<String, BlockId>) -> Vec<CfgEdge> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for edge in &graph.edges {
        let (Some(&from), Some(&to)) = (block_of.get(&edge.from_id), block_of.get(&edge.to_id)) else {
            continue;
        };
        if from == to {
            continue;
        }
        let label = label_for(graph, edge.edge_type, &edge.from_id, &edge.to_id);
        if seen.insert((from, to, label)) {
            edges.push(CfgEdge { from, to, label });
        }
    }
    edges
}

fn is_async_node(graph: &IrGraph, id: &str) -> bool {
    graph.node(id).and_then(|n| n.get("is_async")).and_then(Value::as_bool).unwrap_or(false)
}

fn label_for(graph: &IrGraph, edge_type: EdgeType, from_id: &str, to_id: &str) -> CfgLabel {
    match edge_type {
        EdgeType::True => CfgLabel::True,
        EdgeType::False => CfgLabel::False,
        EdgeType::Exception => CfgLabel::Exception,
        EdgeType::Continue => {
            if is_async_node(graph, to_id) {
                CfgLabel::AsyncNext
            } else {
                CfgLabel::Next
            }
        }
        EdgeType::Break => {
            let owner_async = graph
                .node(to_id)
                .and_then(|n| n.get("owner_id"))
                .and_then(Value::as_str)
                .map(|owner| is_async_node(graph, owner))
                .unwrap_or(false);
            if owner_async {
                CfgLabel::AsyncStop
            } else {
                CfgLabel::Stop
            }
        }
        EdgeType::Flow | EdgeType::Call => {
            if is_async_node(graph, from_id) {
                CfgLabel::AsyncNext
            } else {
                CfgLabel::Next
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineOptions;
    use crate::features::ir_generation::IrBuilder;
    use crate::features::parsing::{Parser, PythonParser};

    fn build_graph(source: &str) -> IrGraph {
        let options = PipelineOptions::default();
        let parser = PythonParser::new();
        let tree = parser.parse(source, "f.py").unwrap();
        IrBuilder::new(source, "f.py", &options).build(&tree)
    }

    #[test]
    fn straight_line_function_is_one_block() {
        let graph = build_graph("def f():\n    x = 1\n    y = 2\n");
        let cfgs = build_cfg(&graph);
        let func = graph.nodes.iter().find(|n| n.kind == NodeKind::Function).unwrap();
        let cfg = cfgs.get(&func.id).unwrap();
        assert_eq!(cfg.blocks.len(), 1);
        assert_eq!(cfg.blocks[0].stmt_ids.len(), 2);
    }

    #[test]
    fn if_statement_produces_branch_edges() {
        let graph = build_graph("def f(c):\n    if c:\n        x = 1\n    else:\n        x = 2\n");
        let cfgs = build_cfg(&graph);
        let func = graph.nodes.iter().find(|n| n.kind == NodeKind::Function).unwrap();
        let cfg = cfgs.get(&func.id).unwrap();
        assert!(cfg.edges.iter().any(|e| e.label == CfgLabel::True));
        assert!(cfg.edges.iter().any(|e| e.label == CfgLabel::False));
    }
}
