//! Dynamic-area tagger: marks `Call` nodes whose target can't be resolved
//! statically so downstream taint/ranking treats them conservatively.
//!
//! Grounded in the teacher's flat single-file feature modules
//! (`features/cache/fingerprint.rs`-style) and ported from the reference
//! `_dynamic_tagging` pass: any call to `eval`/`exec`/`compile`/
//! `__import__`/`getattr`/`setattr`, any `importlib.import_module` call, any
//! call through a dynamically-computed callable (the callee is itself a
//! `Call` or anything other than a bare `Name`/`Attribute`), and any call
//! whose argument list contains keyword expansion (`**kwargs`) gets tagged
//! `dynamic` + `unscannable`. A call whose `callee_id` is missing or
//! dangling gets the same pair of tags outright: there's nothing left to
//! resolve. Nodes that degraded to `unsupported` during IR construction are
//! tagged `dynamic` + `unscannable` for the same reason.

use crate::shared::models::{push_unique_tag, IrGraph, NodeKind, Value};

const DYNAMIC_CALLEE_NAMES: &[&str] =
    &["eval", "exec", "compile", "__import__", "getattr", "setattr"];
const DYNAMIC_ATTR_NAMES: &[&str] = &["import_module"];

/// Walks every node in `graph` and tags dynamic/unscannable areas in place.
pub fn tag_dynamic_areas(graph: &mut IrGraph) {
    let index: std::collections::HashMap<String, (NodeKind, std::collections::BTreeMap<String, Value>)> = graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), (n.kind, n.attrs.clone())))
        .collect();

    for node in &mut graph.nodes {
        if node.is_unsupported() {
            push_unique_tag(&mut node.attrs, "dynamic");
            push_unique_tag(&mut node.attrs, "unscannable");
            continue;
        }

        if node.kind != NodeKind::Call {
            continue;
        }

        let mut dynamic = false;

        match node.get("callee_id").and_then(Value::as_str) {
            Some(callee_id) => match index.get(callee_id) {
                Some((NodeKind::Name, attrs)) => {
                    let name = attrs.get("name").and_then(Value::as_str).unwrap_or("");
                    if DYNAMIC_CALLEE_NAMES.contains(&name) {
                        dynamic = true;
                    }
                }
                Some((NodeKind::Attribute, attrs)) => {
                    let attr = attrs.get("attr").and_then(Value::as_str).unwrap_or("");
                    if DYNAMIC_ATTR_NAMES.contains(&attr) {
                        dynamic = true;
                    }
                }
                Some((NodeKind::Call, _)) => dynamic = true,
                Some(_) => dynamic = true,
                // Dangling callee_id: the callee can't be inspected at all,
                // which is itself unscannable regardless of `dynamic`.
                None => {
                    push_unique_tag(&mut node.attrs, "dynamic");
                    push_unique_tag(&mut node.attrs, "unscannable");
                }
            },
            // Missing callee_id entirely: same treatment as a dangling one.
            None => {
                push_unique_tag(&mut node.attrs, "dynamic");
                push_unique_tag(&mut node.attrs, "unscannable");
            }
        }

        if !dynamic {
            if let Some(Value::List(keywords)) = node.get("keywords") {
                dynamic = keywords.iter().any(|kw| {
                    matches!(kw, Value::Map(m) if m.get("name").map(|v| matches!(v, Value::Null)).unwrap_or(true))
                });
            }
        }

        if dynamic {
            push_unique_tag(&mut node.attrs, "dynamic");
            push_unique_tag(&mut node.attrs, "unscannable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{IrNode, Span, MODULE_SCOPE};

    fn literal_name(id: &str, scope: &str, name: &str) -> IrNode {
        let mut n = IrNode::new(id.to_string(), NodeKind::Name, Span::unknown("f.py"), None, scope.to_string());
        n.set("name", Value::from(name));
        n
    }

    fn call_node(id: &str, callee_id: &str) -> IrNode {
        let mut n = IrNode::new(id.to_string(), NodeKind::Call, Span::unknown("f.py"), None, MODULE_SCOPE.to_string());
        n.set("callee_id", Value::from(callee_id));
        n.set("args", Value::List(vec![]));
        n.set("keywords", Value::List(vec![]));
        n
    }

    #[test]
    fn tags_eval_call_as_dynamic() {
        let mut graph = IrGraph::new();
        graph.add_node(literal_name("n1", MODULE_SCOPE, "eval"));
        graph.add_node(call_node("c1", "n1"));
        tag_dynamic_areas(&mut graph);
        let tags = graph.node("c1").unwrap().get("tags").cloned();
        assert!(matches!(tags, Some(Value::List(ref l)) if l.contains(&Value::from("dynamic"))));
    }

    #[test]
    fn leaves_plain_call_untagged() {
        let mut graph = IrGraph::new();
        graph.add_node(literal_name("n1", MODULE_SCOPE, "print"));
        graph.add_node(call_node("c1", "n1"));
        tag_dynamic_areas(&mut graph);
        assert!(graph.node("c1").unwrap().get("tags").is_none());
    }

    #[test]
    fn unsupported_nodes_get_dynamic_and_unscannable() {
        let mut graph = IrGraph::new();
        let mut n = IrNode::new("u1".into(), NodeKind::Literal, Span::unknown("f.py"), None, MODULE_SCOPE.to_string());
        n.set("unsupported", Value::Bool(true));
        graph.add_node(n);
        tag_dynamic_areas(&mut graph);
        let tags = graph.node("u1").unwrap().get("tags").cloned();
        match tags {
            Some(Value::List(l)) => {
                assert!(l.contains(&Value::from("dynamic")));
                assert!(l.contains(&Value::from("unscannable")));
            }
            _ => panic!("expected tags list"),
        }
    }
}
