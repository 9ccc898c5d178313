//! Taint engine: explicit + implicit source→sink flow propagation with
//! provenance-preserving path reconstruction (spec §4.6).
//!
//! Built directly on the SSA/CFG artifacts from
//! [`crate::features::ssa`]/[`crate::features::flow_graph`] rather than
//! re-walking the IR for def/use sites, following the same "reuse what the
//! earlier passes already computed" texture those two modules use.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::TaintConfig;
use crate::features::flow_graph::{block_membership, containing_statement, is_within, reachable_blocks, BlockId, Cfg};
use crate::features::ssa::{SsaUnit, VersionDef};
use crate::shared::models::{IrGraph, NodeKind, Span, Value};

/// One reconstructed source→sink path (spec §3: `Taint flow`).
#[derive(Debug, Clone)]
pub struct TaintFlow {
    pub source: String,
    pub sink: String,
    pub path: Vec<String>,
    pub implicit: bool,
    pub sink_span: Span,
}

#[derive(Debug, Clone)]
struct TaintInfo {
    provenance: String,
    implicit: bool,
}

/// Resolves a `Name`/`Attribute` chain to a dotted path without consulting
/// any alias map. Distinct from `alias_resolver::resolve_callee`, which is
/// scope-aware and exists only to flag a fixed OS/subprocess sink list;
/// taint matching (spec §4.6) is exact-match against the resolved callee
/// name as it's written at the call site.
fn callee_path(graph: &IrGraph, node_id: &str) -> Option<String> {
    let node = graph.node(node_id)?;
    match node.kind {
        NodeKind::Name => node.get("name").and_then(Value::as_str).map(String::from),
        NodeKind::Attribute => {
            let value_id = node.get("value_id").and_then(Value::as_str)?;
            let attr = node.get("attr").and_then(Value::as_str)?;
            let base = callee_path(graph, value_id)?;
            Some(format!("{base}.{attr}"))
        }
        _ => None,
    }
}

fn call_callee_path(graph: &IrGraph, expr_id: &str) -> Option<String> {
    let node = graph.node(expr_id)?;
    if node.kind != NodeKind::Call {
        return None;
    }
    let callee_id = node.get("callee_id").and_then(Value::as_str)?;
    callee_path(graph, callee_id)
}

/// Runs the taint engine over every unit's CFG + SSA form, returning every
/// reconstructed flow across the whole graph.
pub fn analyze_taint(
    graph: &IrGraph,
    cfgs: &HashMap<String, Cfg>,
    ssa_units: &HashMap<String, SsaUnit>,
    config: &TaintConfig,
) -> Vec<TaintFlow> {
    let mut flows = Vec::new();
    for (unit_id, unit) in ssa_units {
        let Some(cfg) = cfgs.get(unit_id) else { continue };
        flows.extend(analyze_unit(graph, cfg, unit, config));
    }
    flows
}

/// Every `(node_id, version)` occurrence in `unit.ssa_map`, ordered by the
/// node's source position rather than `HashMap`'s per-process-randomized
/// iteration order. Built once per unit and threaded through every pass
/// that walks SSA occurrences, so flow ordering and provenance choice are
/// byte-identical across runs over identical input (spec §4.6).
fn ordered_ssa_occurrences<'a>(graph: &IrGraph, unit: &'a SsaUnit) -> Vec<(&'a str, &'a str)> {
    let mut entries: Vec<(&str, &str)> = unit.ssa_map.iter().map(|(id, version)| (id.as_str(), version.as_str())).collect();
    entries.sort_by(|(a_id, _), (b_id, _)| {
        let key = |id: &str| graph.node(id).map(|n| (n.span.start_line, n.span.start_col)).unwrap_or((i64::MAX, i64::MAX));
        key(a_id).cmp(&key(b_id)).then_with(|| a_id.cmp(b_id))
    });
    entries
}

fn analyze_unit(graph: &IrGraph, cfg: &Cfg, unit: &SsaUnit, config: &TaintConfig) -> Vec<TaintFlow> {
    let block_of = block_membership(cfg);
    let ordered_ssa = ordered_ssa_occurrences(graph, unit);

    // version -> occurrences that *use* it (every ssa_map entry that isn't
    // literally the def occurrence for that version).
    let mut version_uses: HashMap<String, Vec<String>> = HashMap::new();
    for (node_id, version) in &unit.ssa_map {
        let is_def_site = matches!(unit.version_defs.get(version), Some(VersionDef::Statement(id)) if id == node_id);
        if !is_def_site {
            version_uses.entry(version.clone()).or_default().push(node_id.clone());
        }
    }

    let mut phi_operand_index: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, phi) in unit.phi_nodes.iter().enumerate() {
        for version in phi.incoming.values() {
            phi_operand_index.entry(version.clone()).or_default().push(idx);
        }
    }

    let mut stmt_versions: HashMap<String, Vec<String>> = HashMap::new();
    for (version, def) in &unit.version_defs {
        if let VersionDef::Statement(stmt_id) = def {
            stmt_versions.entry(stmt_id.clone()).or_default().push(version.clone());
        }
    }

    let mut tainted: HashMap<String, TaintInfo> = HashMap::new();
    let mut worklist: VecDeque<String> = VecDeque::new();

    seed_explicit_sources(graph, &block_of, &stmt_versions, config, &mut tainted, &mut worklist);

    // Implicit seeding can hand fresh taint to versions that themselves feed
    // further explicit propagation (or another branch condition), so the two
    // passes alternate until neither adds anything new.
    loop {
        drain_worklist(graph, unit, &version_uses, &block_of, &stmt_versions, &phi_operand_index, config, &mut tainted, &mut worklist);
        let added = apply_implicit_flows(graph, cfg, unit, &block_of, &stmt_versions, &ordered_ssa, config, &mut tainted, &mut worklist);
        if !added {
            break;
        }
    }

    collect_sink_flows(graph, unit, &block_of, &ordered_ssa, config, &tainted)
}

fn seed_explicit_sources(
    graph: &IrGraph,
    block_of: &HashMap<String, BlockId>,
    stmt_versions: &HashMap<String, Vec<String>>,
    config: &TaintConfig,
    tainted: &mut HashMap<String, TaintInfo>,
    worklist: &mut VecDeque<String>,
) {
    for node in &graph.nodes {
        if node.kind != NodeKind::Assign || !block_of.contains_key(&node.id) {
            continue;
        }
        let Some(value_id) = node.get("value_id").and_then(Value::as_str) else { continue };
        let Some(name) = call_callee_path(graph, value_id) else { continue };
        if !config.is_source(&name) {
            continue;
        }
        for version in stmt_versions.get(&node.id).cloned().unwrap_or_default() {
            taint(tainted, worklist, version, name.clone(), false);
        }
    }
}

fn taint(tainted: &mut HashMap<String, TaintInfo>, worklist: &mut VecDeque<String>, version: String, provenance: String, implicit: bool) {
    if tainted.contains_key(&version) {
        return;
    }
    tainted.insert(version.clone(), TaintInfo { provenance, implicit });
    worklist.push_back(version);
}

fn is_sanitizer_statement(graph: &IrGraph, config: &TaintConfig, stmt_id: &str) -> bool {
    let Some(node) = graph.node(stmt_id) else { return false };
    if node.kind != NodeKind::Assign {
        return false;
    }
    let Some(value_id) = node.get("value_id").and_then(Value::as_str) else { return false };
    call_callee_path(graph, value_id).map(|name| config.is_sanitizer(&name)).unwrap_or(false)
}

/// Explicit propagation: a tainted version's uses carry provenance to the
/// defined versions of their containing statement (unless that statement is
/// a sanitizer call), and to any φ-result it feeds.
fn drain_worklist(
    graph: &IrGraph,
    unit: &SsaUnit,
    version_uses: &HashMap<String, Vec<String>>,
    block_of: &HashMap<String, BlockId>,
    stmt_versions: &HashMap<String, Vec<String>>,
    phi_operand_index: &HashMap<String, Vec<usize>>,
    config: &TaintConfig,
    tainted: &mut HashMap<String, TaintInfo>,
    worklist: &mut VecDeque<String>,
) {
    while let Some(version) = worklist.pop_front() {
        let info = tainted.get(&version).cloned().expect("worklist entries are always tainted");

        for use_id in version_uses.get(&version).cloned().unwrap_or_default() {
            let Some(stmt_id) = containing_statement(graph, block_of, &use_id) else { continue };
            if is_sanitizer_statement(graph, config, &stmt_id) {
                continue;
            }
            for def_version in stmt_versions.get(&stmt_id).cloned().unwrap_or_default() {
                taint(tainted, worklist, def_version, info.provenance.clone(), info.implicit);
            }
        }

        for &idx in phi_operand_index.get(&version).cloned().unwrap_or_default().iter() {
            let result = unit.phi_nodes[idx].result_version.clone();
            if !result.is_empty() {
                taint(tainted, worklist, result, info.provenance.clone(), info.implicit);
            }
        }
    }
}

/// Implicit propagation: a tainted (or directly source-producing) branch
/// condition taints every version defined in its control region. Returns
/// whether any new taint was seeded, so the caller can re-drain the
/// explicit worklist and retry until fixpoint.
fn apply_implicit_flows(
    graph: &IrGraph,
    cfg: &Cfg,
    unit: &SsaUnit,
    block_of: &HashMap<String, BlockId>,
    stmt_versions: &HashMap<String, Vec<String>>,
    ordered_ssa: &[(&str, &str)],
    config: &TaintConfig,
    tainted: &mut HashMap<String, TaintInfo>,
    worklist: &mut VecDeque<String>,
) -> bool {
    let mut added = false;

    for node in &graph.nodes {
        if !matches!(node.kind, NodeKind::If | NodeKind::While | NodeKind::For) {
            continue;
        }
        let Some(&branch_block) = block_of.get(&node.id) else { continue };
        let condition_id = match node.get("test_id").or_else(|| node.get("iter_id")).and_then(Value::as_str) {
            Some(id) => id,
            None => continue,
        };
        let Some(info) = condition_taint(graph, condition_id, ordered_ssa, tainted, config) else { continue };

        for block in control_region(cfg, branch_block) {
            let Some(block) = cfg.blocks.get(block) else { continue };
            for stmt_id in &block.stmt_ids {
                for version in stmt_versions.get(stmt_id).cloned().unwrap_or_default() {
                    if !tainted.contains_key(&version) {
                        taint(tainted, worklist, version, info.provenance.clone(), true);
                        added = true;
                    }
                }
            }
        }
    }

    added
}

/// Whether `condition_id` carries taint: either it's itself a bare call to
/// a source (`if secret():`, with no intermediate assignment — spec
/// scenario 3), or some use nested inside it already resolves to a tainted
/// SSA version.
fn condition_taint(
    graph: &IrGraph,
    condition_id: &str,
    ordered_ssa: &[(&str, &str)],
    tainted: &HashMap<String, TaintInfo>,
    config: &TaintConfig,
) -> Option<TaintInfo> {
    if let Some(name) = call_callee_path(graph, condition_id) {
        if config.is_source(&name) {
            return Some(TaintInfo { provenance: name, implicit: true });
        }
    }
    for &(node_id, version) in ordered_ssa {
        if let Some(info) = tainted.get(version) {
            if is_within(graph, condition_id, node_id) {
                return Some(TaintInfo { provenance: info.provenance.clone(), implicit: true });
            }
        }
    }
    None
}

/// `(∪ reachable(successor)) \ (∩ reachable(successor))`: every block
/// reachable from some but not all of the branch's successors (spec
/// §4.6's post-dominator-tree-free approximation of the control region).
fn control_region(cfg: &Cfg, branch_block: BlockId) -> HashSet<BlockId> {
    let successors: Vec<BlockId> = cfg.edges.iter().filter(|e| e.from == branch_block).map(|e| e.to).collect();
    if successors.is_empty() {
        return HashSet::new();
    }

    let reachable_sets: Vec<HashSet<BlockId>> = successors.iter().map(|&s| reachable_blocks(cfg, s)).collect();

    let mut union: HashSet<BlockId> = HashSet::new();
    for set in &reachable_sets {
        union.extend(set.iter().copied());
    }

    let mut intersection = reachable_sets[0].clone();
    for set in &reachable_sets[1..] {
        intersection = intersection.intersection(set).copied().collect();
    }

    union.difference(&intersection).copied().collect()
}

fn operand_versions(graph: &IrGraph, unit: &SsaUnit, ordered_ssa: &[(&str, &str)], version: &str) -> Vec<String> {
    match unit.version_defs.get(version) {
        Some(VersionDef::Phi(idx)) => unit.phi_nodes[*idx].incoming.values().cloned().collect(),
        Some(VersionDef::Statement(stmt_id)) => {
            let mut seen = HashSet::new();
            let mut operands = Vec::new();
            for &(node_id, v) in ordered_ssa {
                if v == version {
                    continue;
                }
                if is_within(graph, stmt_id, node_id) && seen.insert(v) {
                    operands.push(v.to_string());
                }
            }
            operands
        }
        None => Vec::new(),
    }
}

/// Backward DFS from a tainted sink-argument version through
/// `version_defs`, branching once per tainted operand and bottoming out at
/// the first version with no tainted operand of its own (the origin).
/// Cycles (shouldn't occur in well-formed SSA, but the rename pass doesn't
/// guarantee acyclicity in the face of malformed input) are broken by the
/// visiting set, matching spec §4.6's "cycles are broken by a visiting set".
fn reconstruct_paths(
    graph: &IrGraph,
    unit: &SsaUnit,
    ordered_ssa: &[(&str, &str)],
    tainted: &HashMap<String, TaintInfo>,
    version: &str,
    visiting: &mut HashSet<String>,
) -> Vec<Vec<String>> {
    if visiting.contains(version) {
        return vec![vec![version.to_string()]];
    }
    visiting.insert(version.to_string());

    let tainted_operands: Vec<String> =
        operand_versions(graph, unit, ordered_ssa, version).into_iter().filter(|o| tainted.contains_key(o)).collect();

    let paths = if tainted_operands.is_empty() {
        vec![vec![version.to_string()]]
    } else {
        let mut out = Vec::new();
        for operand in tainted_operands {
            for mut path in reconstruct_paths(graph, unit, ordered_ssa, tainted, &operand, visiting) {
                path.push(version.to_string());
                out.push(path);
            }
        }
        out
    };

    visiting.remove(version);
    paths
}

fn call_arg_ids(node_attrs: &Value) -> Vec<String> {
    node_attrs.as_list().map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect()).unwrap_or_default()
}

fn collect_sink_flows(
    graph: &IrGraph,
    unit: &SsaUnit,
    block_of: &HashMap<String, BlockId>,
    ordered_ssa: &[(&str, &str)],
    config: &TaintConfig,
    tainted: &HashMap<String, TaintInfo>,
) -> Vec<TaintFlow> {
    let mut flows = Vec::new();

    for node in &graph.nodes {
        if node.kind != NodeKind::Call {
            continue;
        }
        // Scope this call to the unit whose CFG/SSA we're working with.
        if containing_statement(graph, block_of, &node.id).is_none() {
            continue;
        }
        let Some(name) = call_callee_path(graph, &node.id) else { continue };
        if !config.is_sink(&name) {
            continue;
        }

        let mut arg_ids: Vec<String> = node.get("args").map(call_arg_ids).unwrap_or_default();
        if let Some(Value::List(keywords)) = node.get("keywords") {
            for kw in keywords {
                if let Value::Map(m) = kw {
                    if let Some(value_id) = m.get("value_id").and_then(Value::as_str) {
                        arg_ids.push(value_id.to_string());
                    }
                }
            }
        }

        for arg_id in arg_ids {
            let mut seen_versions: HashSet<&str> = HashSet::new();
            for &(used_node_id, version) in ordered_ssa {
                if !tainted.contains_key(version) || !is_within(graph, &arg_id, used_node_id) {
                    continue;
                }
                if !seen_versions.insert(version) {
                    continue;
                }
                let info = &tainted[version];
                let mut visiting = HashSet::new();
                for path in reconstruct_paths(graph, unit, ordered_ssa, tainted, version, &mut visiting) {
                    let implicit = path.iter().any(|v| tainted.get(v).map(|t| t.implicit).unwrap_or(false));
                    flows.push(TaintFlow {
                        source: info.provenance.clone(),
                        sink: name.clone(),
                        path,
                        implicit,
                        sink_span: node.span.clone(),
                    });
                }
            }
        }
    }

    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineOptions;
    use crate::features::flow_graph::build_cfg;
    use crate::features::ir_generation::IrBuilder;
    use crate::features::parsing::{Parser, PythonParser};
    use crate::features::ssa::transform_ssa;

    fn build_graph(source: &str) -> IrGraph {
        let options = PipelineOptions::default();
        let parser = PythonParser::new();
        let tree = parser.parse(source, "f.py").unwrap();
        IrBuilder::new(source, "f.py", &options).build(&tree)
    }

    #[test]
    fn explicit_flow_from_input_to_exec() {
        let graph = build_graph("def f():\n    x = input()\n    exec(x)\n");
        let cfgs = build_cfg(&graph);
        let ssa = transform_ssa(&graph, &cfgs);
        let config = TaintConfig::new(vec!["input".into()], vec!["exec".into()], vec![]);

        let flows = analyze_taint(&graph, &cfgs, &ssa, &config);

        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].source, "input");
        assert_eq!(flows[0].sink, "exec");
        assert_eq!(flows[0].path, vec!["x_1".to_string()]);
        assert!(!flows[0].implicit);
    }

    #[test]
    fn sanitized_value_produces_no_flow() {
        let graph = build_graph("def f():\n    x = sanitize(input())\n    exec(x)\n");
        let cfgs = build_cfg(&graph);
        let ssa = transform_ssa(&graph, &cfgs);
        let config = TaintConfig::new(vec!["input".into()], vec!["exec".into()], vec!["sanitize".into()]);

        let flows = analyze_taint(&graph, &cfgs, &ssa, &config);

        assert!(flows.is_empty());
    }

    #[test]
    fn implicit_flow_through_phi_merge() {
        let graph = build_graph("def f(u):\n    if secret():\n        y = 1\n    else:\n        y = 2\n    print(y)\n");
        let cfgs = build_cfg(&graph);
        let ssa = transform_ssa(&graph, &cfgs);
        let config = TaintConfig::new(vec!["secret".into()], vec!["print".into()], vec![]);

        let flows = analyze_taint(&graph, &cfgs, &ssa, &config);

        assert!(!flows.is_empty());
        assert!(flows.iter().all(|f| f.source == "secret" && f.sink == "print" && f.implicit));
        assert!(flows.iter().any(|f| f.path.contains(&"y_phi".to_string())));
    }
}
