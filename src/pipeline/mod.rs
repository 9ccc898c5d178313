//! Orchestrator: drives every stage in order for one file, then one
//! project (spec §5/§7).
//!
//! Stage order: parse -> IR -> dynamic tagging -> alias resolution ->
//! CFG -> SSA -> taint -> rank -> route -> baseline -> cache. A parse
//! failure is fatal for the file (no further stages run); an IR
//! validation failure skips CFG/SSA/taint/rank/route/baseline for that
//! file but still returns the raw graph when `emit_ir` is set; baseline
//! and persistence failures are recorded but never abort the scan.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::config::{ConfigError, PipelineOptions, TaintConfig};
use crate::errors::NsssError;
use crate::features::alias_resolver::resolve_aliased_calls;
use crate::features::baseline::{BaselineEngine, BaselineSummary, Finding};
use crate::features::dynamic_tagger::tag_dynamic_areas;
use crate::features::flow_graph::build_cfg;
use crate::features::ir_generation::IrBuilder;
use crate::features::parsing::{Parser, PythonParser};
use crate::features::persistence::{GraphPersistenceService, LoadMode, ManifestStore};
use crate::features::ranker::{rank, RankerOutput, RiskScoreItem};
use crate::features::router::{route, RoutingPlan};
use crate::features::ssa::transform_ssa;
use crate::features::taint_analysis::{analyze_taint, TaintFlow};
use crate::shared::models::{IrGraph, Value};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] NsssError),
}

/// Outcome for a single source file.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub file_path: String,
    pub graph: Option<IrGraph>,
    pub flows: Vec<TaintFlow>,
    pub ranked: Option<RankerOutput>,
    pub routing: Option<RoutingPlan>,
    pub findings_new: usize,
    pub findings_existing: usize,
    /// Set on a parse or IR-validation failure; downstream stages for
    /// this file were skipped.
    pub error: Option<String>,
}

impl FileReport {
    fn new(file_path: &str) -> Self {
        Self { file_path: file_path.to_string(), ..Default::default() }
    }
}

/// Outcome for an entire scan.
#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub files: Vec<FileReport>,
    pub baseline_summary: Option<BaselineSummary>,
}

/// Drives the full stage sequence for a set of files sharing one
/// project root, taint configuration and baseline/cache store.
pub struct Pipeline {
    options: PipelineOptions,
    taint_config: TaintConfig,
    parser: PythonParser,
    project_root: PathBuf,
    baseline: Option<BaselineEngine>,
    manifest: Option<ManifestStore>,
    persistence: GraphPersistenceService,
}

impl Pipeline {
    /// Validates `taint_config` up front (spec §7: configuration errors
    /// are fatal at startup, not per-file) and opens the baseline/cache
    /// stores if enabled.
    pub fn new(
        options: PipelineOptions,
        taint_config: TaintConfig,
        project_root: impl Into<PathBuf>,
        baseline_path: Option<PathBuf>,
    ) -> Result<Self, PipelineError> {
        taint_config.validate()?;
        let project_root = project_root.into();

        let baseline = if options.enable_baseline {
            let path = baseline_path.unwrap_or_else(|| PathBuf::from(".nsss/baseline.json"));
            Some(BaselineEngine::new(path, &project_root)?)
        } else {
            None
        };

        let manifest = if options.enable_cache { Some(ManifestStore::new(&project_root)?) } else { None };

        Ok(Self {
            options,
            taint_config,
            parser: PythonParser::new(),
            project_root,
            baseline,
            manifest,
            persistence: GraphPersistenceService::new(),
        })
    }

    /// Runs every stage for one file's source.
    pub fn process_file(&mut self, source: &str, file_path: &str) -> (FileReport, Vec<Finding>) {
        let mut report = FileReport::new(file_path);

        let tree = match self.parser.parse(source, file_path) {
            Ok(tree) => tree,
            Err(e) => {
                report.error = Some(e.to_string());
                return (report, Vec::new());
            }
        };

        let mut graph = IrBuilder::new(source, file_path, &self.options).build(&tree);

        if self.options.enable_dynamic_tagging {
            tag_dynamic_areas(&mut graph);
        }
        if self.options.enable_alias_resolution {
            resolve_aliased_calls(&mut graph);
        }

        if let Err(e) = graph.validate() {
            report.error = Some(e.to_string());
            if self.options.emit_ir {
                report.graph = Some(graph);
            }
            return (report, Vec::new());
        }

        if self.options.enable_cache {
            self.persist_graph(&graph, file_path);
        }

        if self.options.emit_ir {
            report.graph = Some(graph.clone());
        }

        if !self.options.enable_taint_analysis {
            return (report, Vec::new());
        }

        let cfgs = build_cfg(&graph);
        let ssa_units = transform_ssa(&graph, &cfgs);
        let flows = analyze_taint(&graph, &cfgs, &ssa_units, &self.taint_config);
        let ranked = rank(&flows, None);
        let routing = route(&ranked);

        let findings: Vec<Finding> = ranked.items.iter().filter_map(|item| to_finding(file_path, item)).collect();

        report.flows = flows;
        report.ranked = Some(ranked);
        report.routing = Some(routing);
        (report, findings)
    }

    fn persist_graph(&mut self, graph: &IrGraph, file_path: &str) {
        let Some(manifest) = self.manifest.as_ref() else { return };
        let path = Path::new(file_path);
        if let Err(e) = self.persistence.save_ir_graph(graph, path, &self.project_root, manifest) {
            warn!(file = file_path, error = %e, "graph cache write failed; continuing without cache");
        }
    }

    /// Whether a fresh cached graph is available for `file_path`
    /// (strict freshness: the file's content hash must be unchanged).
    pub fn has_fresh_cache(&self, file_path: &str) -> bool {
        let Some(manifest) = self.manifest.as_ref() else { return false };
        manifest.is_fresh(Path::new(file_path))
    }

    /// Loads the cached graph for `file_path` honoring `mode`.
    pub fn load_cached_graph(&self, file_path: &str, mode: LoadMode) -> Option<IrGraph> {
        let manifest = self.manifest.as_ref()?;
        match self.persistence.load_ir_graph(Path::new(file_path), &self.project_root, manifest, mode) {
            Ok(Some((graph, _meta))) => Some(graph),
            _ => None,
        }
    }

    /// Runs every file through `process_file`, then reconciles the
    /// baseline once for the whole project (new findings are merged
    /// into the existing store; previously-seen findings absent from
    /// this run count as resolved).
    pub fn run_project(&mut self, files: &[(String, String)]) -> ProjectReport {
        let mut reports = Vec::with_capacity(files.len());
        let mut all_findings: Vec<Finding> = Vec::new();
        let mut source_by_file: Vec<(String, Vec<String>)> = Vec::new();

        for (file_path, source) in files {
            let (report, findings) = self.process_file(source, file_path);
            source_by_file.push((file_path.clone(), source.lines().map(str::to_string).collect()));
            all_findings.extend(findings);
            reports.push(report);
        }

        let baseline_summary = if self.options.enable_baseline {
            self.reconcile_baseline(&all_findings, &source_by_file, &mut reports)
        } else {
            None
        };

        ProjectReport { files: reports, baseline_summary }
    }

    fn reconcile_baseline(
        &mut self,
        findings: &[Finding],
        source_by_file: &[(String, Vec<String>)],
        reports: &mut [FileReport],
    ) -> Option<BaselineSummary> {
        let engine = self.baseline.as_mut()?;
        let mut kept_by_file: std::collections::HashMap<String, Vec<Finding>> = std::collections::HashMap::new();

        for (file_path, lines) in source_by_file {
            let file_findings: Vec<Finding> = findings.iter().filter(|f| &f.file == file_path).cloned().collect();
            let (kept, stats) = engine.filter_findings(&file_findings, lines);
            if let Some(report) = reports.iter_mut().find(|r| &r.file_path == file_path) {
                report.findings_new = stats.new;
                report.findings_existing = stats.existing;
            }
            kept_by_file.insert(file_path.clone(), kept.into_iter().cloned().collect());
        }

        let summary = engine.summary();

        let mut merged = engine.entries();
        for (file_path, lines) in source_by_file {
            if let Some(kept) = kept_by_file.get(file_path) {
                merged.extend(engine.build_entries(kept, lines));
            }
        }
        if let Err(e) = engine.save(merged) {
            warn!(error = %e, "baseline store write failed; findings for this run are not persisted");
        }

        Some(summary)
    }
}

fn to_finding(file_path: &str, item: &RiskScoreItem) -> Option<Finding> {
    let line = item.line?;
    let column = item.column?;
    let source = item.metadata.get("source").and_then(Value::as_str).unwrap_or_default().to_string();
    let sink = item.metadata.get("sink").and_then(Value::as_str).unwrap_or_default().to_string();
    Some(Finding {
        rule_id: item.check_id.clone(),
        file: item.path.clone().unwrap_or_else(|| file_path.to_string()),
        line,
        column,
        end_line: line,
        sink,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options() -> PipelineOptions {
        PipelineOptions::default()
    }

    fn taint_config() -> TaintConfig {
        TaintConfig::new(vec!["input".into()], vec!["exec".into()], vec!["sanitize".into()])
    }

    #[test]
    fn explicit_taint_flow_is_reported_and_routed_to_llm() {
        let dir = tempdir().unwrap();
        let mut pipeline = Pipeline::new(options(), taint_config(), dir.path(), None).unwrap();

        let source = "x = input()\nexec(x)\n";
        let (report, findings) = pipeline.process_file(source, "app.py");

        assert!(report.error.is_none());
        assert!(!report.flows.is_empty());
        assert!(!findings.is_empty());
        let routing = report.routing.unwrap();
        assert_eq!(routing.items[0].target, crate::features::router::RoutingTarget::Llm);
    }

    #[test]
    fn malformed_source_is_fatal_for_the_file() {
        let dir = tempdir().unwrap();
        let mut pipeline = Pipeline::new(options(), taint_config(), dir.path(), None).unwrap();

        let (report, findings) = pipeline.process_file("def f(:\n", "broken.py");
        assert!(report.error.is_some());
        assert!(findings.is_empty());
    }

    #[test]
    fn rerun_with_unchanged_source_yields_no_new_findings() {
        let dir = tempdir().unwrap();
        let baseline_path = dir.path().join("baseline.json");
        let source = "x = input()\nexec(x)\n".to_string();
        let files = vec![("app.py".to_string(), source)];

        let mut first = Pipeline::new(options(), taint_config(), dir.path(), Some(baseline_path.clone())).unwrap();
        let first_report = first.run_project(&files);
        assert_eq!(first_report.baseline_summary.unwrap().new, 1);

        let mut second = Pipeline::new(options(), taint_config(), dir.path(), Some(baseline_path)).unwrap();
        let second_report = second.run_project(&files);
        let summary = second_report.baseline_summary.unwrap();
        assert_eq!(summary.new, 0);
        assert_eq!(summary.existing, 1);
    }
}
