//! Alias resolver: tracks `import ... as`, `from ... import ... as`, and
//! assignment aliases per scope, then resolves `Call` callees to a dotted
//! path and flags calls into a security-sensitive target set.
//!
//! Ported from the reference `alias_resolver` pass. One pass over the IR
//! in construction order (source order) is sufficient: an alias must be
//! defined textually before any call that uses it, and nodes are appended
//! to the graph in that same order by the IR builder.

use std::collections::HashMap;

use crate::shared::models::{push_unique_tag, IrGraph, NodeKind, Value, MODULE_SCOPE};

const SYSTEM_CALL_TARGETS: &[&str] = &[
    "os.system",
    "os.popen",
    "subprocess.call",
    "subprocess.run",
    "subprocess.Popen",
    "subprocess.check_output",
];

#[derive(Default)]
struct ScopeAliases {
    aliases: HashMap<String, String>,
    known_targets: std::collections::HashSet<String>,
}

/// Resolves aliased calls in place, setting `resolved_callee` and `tags`
/// (`sink`, plus `alias` when resolution crossed at least one hop) on
/// matching `Call` nodes.
pub fn resolve_aliased_calls(graph: &mut IrGraph) {
    let mut by_scope: HashMap<String, ScopeAliases> = HashMap::new();
    let index: HashMap<String, (NodeKind, std::collections::BTreeMap<String, Value>)> = graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), (n.kind, n.attrs.clone())))
        .collect();

    let node_ids: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();

    for id in &node_ids {
        let (kind, attrs) = index.get(id).unwrap().clone();
        let scope_id = graph.node(id).unwrap().scope_id.clone();
        match kind {
            NodeKind::Import => record_imports(&mut by_scope, &scope_id, &attrs),
            NodeKind::Assign => record_assignment_aliases(&mut by_scope, &index, &scope_id, &attrs),
            NodeKind::Call => resolve_call(graph, &mut by_scope, &index, id, &scope_id),
            _ => {}
        }
    }
}

fn scope_entry<'a>(by_scope: &'a mut HashMap<String, ScopeAliases>, scope_id: &str) -> &'a mut ScopeAliases {
    by_scope.entry(scope_id.to_string()).or_default()
}

fn record_imports(
    by_scope: &mut HashMap<String, ScopeAliases>,
    scope_id: &str,
    attrs: &std::collections::BTreeMap<String, Value>,
) {
    let module = attrs.get("module").and_then(Value::as_str);
    let names = attrs.get("names").and_then(Value::as_list).cloned().unwrap_or_default();
    let asnames = attrs.get("asnames").and_then(Value::as_list).cloned().unwrap_or_default();

    let scope = scope_entry(by_scope, scope_id);
    for (name, asname) in names.iter().zip(asnames.iter()) {
        let Some(name) = name.as_str() else { continue };
        let target = match module {
            Some(m) => format!("{m}.{name}"),
            None => name.to_string(),
        };
        scope.known_targets.insert(target.clone());
        let bound_name = asname.as_str().unwrap_or(name);
        scope.aliases.insert(bound_name.to_string(), target);
    }
}

fn record_assignment_aliases(
    by_scope: &mut HashMap<String, ScopeAliases>,
    index: &HashMap<String, (NodeKind, std::collections::BTreeMap<String, Value>)>,
    scope_id: &str,
    attrs: &std::collections::BTreeMap<String, Value>,
) {
    let targets = attrs.get("targets").and_then(Value::as_list).cloned().unwrap_or_default();
    let Some(value_id) = attrs.get("value_id").and_then(Value::as_str) else { return };
    let Some(resolved) = resolve_value_node(by_scope, index, scope_id, value_id) else { return };

    if targets.len() != 1 {
        return;
    }
    let Some(target_name) = targets[0].as_str() else { return };

    let scope = scope_entry(by_scope, scope_id);
    scope.aliases.insert(target_name.to_string(), resolved);
}

/// Resolves a `Name` or `Attribute` expression node into a dotted path, if
/// it chains back to a known target through the scope's alias map.
fn resolve_value_node(
    by_scope: &HashMap<String, ScopeAliases>,
    index: &HashMap<String, (NodeKind, std::collections::BTreeMap<String, Value>)>,
    scope_id: &str,
    node_id: &str,
) -> Option<String> {
    let (kind, attrs) = index.get(node_id)?;
    let path = match kind {
        NodeKind::Name => {
            let name = attrs.get("name").and_then(Value::as_str)?;
            lookup_alias(by_scope, scope_id, name)?
        }
        NodeKind::Attribute => {
            let value_id = attrs.get("value_id").and_then(Value::as_str)?;
            let attr = attrs.get("attr").and_then(Value::as_str)?;
            let base = resolve_value_node(by_scope, index, scope_id, value_id)?;
            format!("{base}.{attr}")
        }
        _ => return None,
    };
    if is_known_target(by_scope, scope_id, &path) {
        Some(path)
    } else {
        None
    }
}

fn scope_chain(scope_id: &str) -> Vec<String> {
    if scope_id == MODULE_SCOPE {
        vec![MODULE_SCOPE.to_string()]
    } else {
        vec![scope_id.to_string(), MODULE_SCOPE.to_string()]
    }
}

fn lookup_alias(by_scope: &HashMap<String, ScopeAliases>, scope_id: &str, name: &str) -> Option<String> {
    for scope in scope_chain(scope_id) {
        if let Some(scope) = by_scope.get(&scope) {
            if let Some(target) = scope.aliases.get(name) {
                return Some(target.clone());
            }
        }
    }
    None
}

/// Exact or dotted-prefix match against any scope in the chain's known
/// targets, matching `_is_known_target`'s prefix check.
fn is_known_target(by_scope: &HashMap<String, ScopeAliases>, scope_id: &str, path: &str) -> bool {
    for scope in scope_chain(scope_id) {
        if let Some(scope) = by_scope.get(&scope) {
            if scope.known_targets.contains(path) {
                return true;
            }
            if scope
                .known_targets
                .iter()
                .any(|known| path.starts_with(known.as_str()) && path[known.len()..].starts_with('.'))
            {
                return true;
            }
        }
    }
    false
}

fn resolve_call(
    graph: &mut IrGraph,
    by_scope: &mut HashMap<String, ScopeAliases>,
    index: &HashMap<String, (NodeKind, std::collections::BTreeMap<String, Value>)>,
    call_id: &str,
    scope_id: &str,
) {
    let Some(callee_id) = index.get(call_id).and_then(|(_, a)| a.get("callee_id")).and_then(Value::as_str) else {
        return;
    };
    let Some(resolved) = resolve_callee(by_scope, index, scope_id, callee_id) else {
        return;
    };
    if !SYSTEM_CALL_TARGETS.contains(&resolved.path.as_str()) {
        return;
    }

    if let Some(node) = graph.node_mut(call_id) {
        node.set("resolved_callee", Value::from(resolved.path.as_str()));
        push_unique_tag(&mut node.attrs, "sink");
        if resolved.crossed_alias {
            push_unique_tag(&mut node.attrs, "alias");
        }
    }
}

struct Resolved {
    path: String,
    crossed_alias: bool,
}

fn resolve_callee(
    by_scope: &HashMap<String, ScopeAliases>,
    index: &HashMap<String, (NodeKind, std::collections::BTreeMap<String, Value>)>,
    scope_id: &str,
    node_id: &str,
) -> Option<Resolved> {
    let (kind, attrs) = index.get(node_id)?;
    match kind {
        NodeKind::Name => {
            let name = attrs.get("name").and_then(Value::as_str)?;
            match lookup_alias(by_scope, scope_id, name) {
                Some(target) => {
                    let crossed = target != name;
                    Some(Resolved { path: target, crossed_alias: crossed })
                }
                None => Some(Resolved { path: name.to_string(), crossed_alias: false }),
            }
        }
        NodeKind::Attribute => {
            let value_id = attrs.get("value_id").and_then(Value::as_str)?;
            let attr = attrs.get("attr").and_then(Value::as_str)?;
            let base = resolve_callee(by_scope, index, scope_id, value_id)?;
            Some(Resolved { path: format!("{}.{attr}", base.path), crossed_alias: base.crossed_alias })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{IrNode, Span};

    fn name_node(id: &str, scope: &str, name: &str) -> IrNode {
        let mut n = IrNode::new(id.to_string(), NodeKind::Name, Span::unknown("f.py"), None, scope.to_string());
        n.set("name", Value::from(name));
        n
    }

    fn attr_node(id: &str, scope: &str, value_id: &str, attr: &str) -> IrNode {
        let mut n = IrNode::new(id.to_string(), NodeKind::Attribute, Span::unknown("f.py"), None, scope.to_string());
        n.set("value_id", Value::from(value_id));
        n.set("attr", Value::from(attr));
        n
    }

    fn import_node(id: &str, module: Option<&str>, name: &str, asname: Option<&str>) -> IrNode {
        let mut n = IrNode::new(id.to_string(), NodeKind::Import, Span::unknown("f.py"), None, MODULE_SCOPE.to_string());
        n.set("module", module.map(Value::from).unwrap_or(Value::Null));
        n.set("names", Value::List(vec![Value::from(name)]));
        n.set("asnames", Value::List(vec![asname.map(Value::from).unwrap_or(Value::Null)]));
        n
    }

    fn call_node(id: &str, scope: &str, callee_id: &str) -> IrNode {
        let mut n = IrNode::new(id.to_string(), NodeKind::Call, Span::unknown("f.py"), None, scope.to_string());
        n.set("callee_id", Value::from(callee_id));
        n
    }

    #[test]
    fn resolves_import_as_alias_to_system_sink() {
        let mut graph = IrGraph::new();
        graph.add_node(import_node("i1", None, "os", Some("o")));
        graph.add_node(name_node("n1", MODULE_SCOPE, "o"));
        graph.add_node(attr_node("a1", MODULE_SCOPE, "n1", "system"));
        graph.add_node(call_node("c1", MODULE_SCOPE, "a1"));

        resolve_aliased_calls(&mut graph);

        let call = graph.node("c1").unwrap();
        assert_eq!(call.get("resolved_callee").and_then(Value::as_str), Some("os.system"));
        let tags = call.get("tags").and_then(Value::as_list).unwrap();
        assert!(tags.iter().any(|t| t.as_str() == Some("sink")));
        assert!(tags.iter().any(|t| t.as_str() == Some("alias")));
    }

    #[test]
    fn direct_call_without_alias_has_no_alias_tag() {
        let mut graph = IrGraph::new();
        graph.add_node(import_node("i1", None, "os", None));
        graph.add_node(name_node("n1", MODULE_SCOPE, "os"));
        graph.add_node(attr_node("a1", MODULE_SCOPE, "n1", "system"));
        graph.add_node(call_node("c1", MODULE_SCOPE, "a1"));

        resolve_aliased_calls(&mut graph);

        let call = graph.node("c1").unwrap();
        assert_eq!(call.get("resolved_callee").and_then(Value::as_str), Some("os.system"));
        let tags = call.get("tags").and_then(Value::as_list).unwrap();
        assert!(!tags.iter().any(|t| t.as_str() == Some("alias")));
    }

    #[test]
    fn unrelated_call_is_left_unresolved() {
        let mut graph = IrGraph::new();
        graph.add_node(name_node("n1", MODULE_SCOPE, "print"));
        graph.add_node(call_node("c1", MODULE_SCOPE, "n1"));
        resolve_aliased_calls(&mut graph);
        assert!(graph.node("c1").unwrap().get("resolved_callee").is_none());
    }
}
