//! End-to-end scenarios driving the public `Pipeline` API over small
//! Python snippets, one per concrete case.

use nsss_core::config::{PipelineOptions, TaintConfig};
use nsss_core::features::router::RoutingTarget;
use nsss_core::Pipeline;
use tempfile::tempdir;

fn pipeline(taint_config: TaintConfig, root: &std::path::Path) -> Pipeline {
    Pipeline::new(PipelineOptions::default(), taint_config, root, None).unwrap()
}

#[test]
fn explicit_sql_like_flow_routes_to_llm_at_high() {
    let dir = tempdir().unwrap();
    let config = TaintConfig::new(vec!["input".into()], vec!["exec".into()], vec![]);
    let mut pipeline = pipeline(config, dir.path());

    let source = "def f():\n    x = input()\n    exec(x)\n";
    let (report, findings) = pipeline.process_file(source, "f.py");

    assert!(report.error.is_none());
    assert_eq!(report.flows.len(), 1);
    let flow = &report.flows[0];
    assert_eq!(flow.source, "input");
    assert_eq!(flow.sink, "exec");
    assert_eq!(flow.path, vec!["x_1".to_string()]);
    assert!(!flow.implicit);

    let routing = report.routing.unwrap();
    assert_eq!(routing.items[0].target, RoutingTarget::Llm);
    assert_eq!(findings.len(), 1);
}

#[test]
fn sanitized_path_yields_zero_flows() {
    let dir = tempdir().unwrap();
    let config = TaintConfig::new(vec!["input".into()], vec!["exec".into()], vec!["sanitize".into()]);
    let mut pipeline = pipeline(config, dir.path());

    let source = "def f():\n    x = sanitize(input())\n    exec(x)\n";
    let (report, findings) = pipeline.process_file(source, "f.py");

    assert!(report.error.is_none());
    assert!(report.flows.is_empty());
    assert!(findings.is_empty());
}

#[test]
fn implicit_flow_through_branch_condition_carries_phi_merge() {
    let dir = tempdir().unwrap();
    let config = TaintConfig::new(vec!["secret".into()], vec!["print".into()], vec![]);
    let mut pipeline = pipeline(config, dir.path());

    let source = "def f(u):\n    if secret():\n        y = 1\n    else:\n        y = 2\n    print(y)\n";
    let (report, _findings) = pipeline.process_file(source, "f.py");

    assert!(report.error.is_none());
    assert!(!report.flows.is_empty());
    assert!(report.flows.iter().all(|f| f.implicit));
    assert!(report.flows.iter().any(|f| f.path.iter().any(|v| v.contains("phi"))));
}

#[test]
fn baseline_recurrence_tracks_new_existing_and_resolved() {
    let dir = tempdir().unwrap();
    let baseline_path = dir.path().join("baseline.json");
    let config = TaintConfig::new(vec!["input".into()], vec!["exec".into()], vec![]);
    let source = "def f():\n    x = input()\n    exec(x)\n".to_string();
    let files = vec![("f.py".to_string(), source)];

    let mut first = Pipeline::new(PipelineOptions::default(), config.clone(), dir.path(), Some(baseline_path.clone())).unwrap();
    let first_report = first.run_project(&files);
    let first_summary = first_report.baseline_summary.unwrap();
    assert_eq!(first_summary.new, 1);
    assert_eq!(first_summary.resolved, 0);

    let mut second = Pipeline::new(PipelineOptions::default(), config.clone(), dir.path(), Some(baseline_path.clone())).unwrap();
    let second_report = second.run_project(&files);
    let second_summary = second_report.baseline_summary.unwrap();
    assert_eq!(second_summary.new, 0);
    assert_eq!(second_summary.existing, 1);
    assert_eq!(second_summary.resolved, 0);

    // Touching an unrelated line keeps the snippet's normalized content
    // identical, so the fingerprint (and thus "existing" count) is stable.
    let touched = vec![("f.py".to_string(), "def f():\n    x = input()\n    exec(x)\n\n".to_string())];
    let mut third = Pipeline::new(PipelineOptions::default(), config, dir.path(), Some(baseline_path)).unwrap();
    let third_report = third.run_project(&touched);
    let third_summary = third_report.baseline_summary.unwrap();
    assert_eq!(third_summary.existing, 1);
    assert_eq!(third_summary.new, 0);
}

#[test]
fn alias_resolution_tags_resolved_system_call_as_sink() {
    use nsss_core::features::alias_resolver::resolve_aliased_calls;
    use nsss_core::features::ir_generation::IrBuilder;
    use nsss_core::features::parsing::{Parser, PythonParser};
    use nsss_core::shared::models::{NodeKind, Value};

    let options = PipelineOptions::default();
    let parser = PythonParser::new();
    let source = "import os as o\ndef run(c):\n    s = o.system\n    s(c)\n";
    let tree = parser.parse(source, "f.py").unwrap();
    let mut graph = IrBuilder::new(source, "f.py", &options).build(&tree);
    resolve_aliased_calls(&mut graph);

    let call = graph.nodes.iter().find(|n| n.kind == NodeKind::Call).expect("call node");
    assert_eq!(call.get("resolved_callee").and_then(Value::as_str), Some("os.system"));
    let tags = call.get("tags").and_then(Value::as_list).unwrap();
    let tag_names: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
    assert!(tag_names.contains(&"sink"));
    assert!(tag_names.contains(&"alias"));
}

#[test]
fn embedded_language_detector_flags_sql_literal_not_plain_text() {
    use nsss_core::features::ir_generation::detect_embedded_language;

    let (lang, confidence) = detect_embedded_language("SELECT * FROM users WHERE id = 1").expect("sql literal");
    assert_eq!(lang, "sql");
    assert!(confidence >= 0.9);

    assert!(detect_embedded_language("hello, world").is_none());
}
