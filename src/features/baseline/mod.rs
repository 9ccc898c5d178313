//! Baseline engine: stable fingerprinting and new/existing/resolved
//! accounting across re-scans (spec §4.9).
//!
//! Ported from the reference `BaselineEngine`. One intentional divergence
//! from the source: spec §3 fingerprints the pipe-joined identity string
//! through SHA-256 rather than storing it unhashed — see `DESIGN.md`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::Result;

const BASELINE_VERSION: &str = "1.0";

/// One input finding to be fingerprinted and (maybe) suppressed.
#[derive(Debug, Clone)]
pub struct Finding {
    pub rule_id: String,
    pub file: String,
    pub line: i64,
    pub column: i64,
    pub end_line: i64,
    pub sink: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub fingerprint: String,
    pub rule_id: String,
    pub file: String,
    pub line: i64,
    pub column: i64,
    pub sink: String,
    pub source: String,
    pub code_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineData {
    pub version: String,
    pub generated_at: String,
    pub project_root: String,
    pub entries: Vec<BaselineEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStats {
    pub new: usize,
    pub existing: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineSummary {
    pub total: usize,
    pub new: usize,
    pub existing: usize,
    pub resolved: usize,
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct BaselineEngine {
    storage_path: PathBuf,
    project_root: PathBuf,
    entries: HashMap<String, BaselineEntry>,
    observed: HashSet<String>,
    stats: FilterStats,
}

impl BaselineEngine {
    /// Loads (or initializes empty) the baseline store at `storage_path`,
    /// relative to `project_root` if not absolute.
    pub fn new(storage_path: impl AsRef<Path>, project_root: impl AsRef<Path>) -> Result<Self> {
        let project_root = project_root.as_ref().to_path_buf();
        let storage_path = if storage_path.as_ref().is_absolute() {
            storage_path.as_ref().to_path_buf()
        } else {
            project_root.join(storage_path)
        };

        let mut engine = Self { storage_path, project_root, entries: HashMap::new(), observed: HashSet::new(), stats: FilterStats::default() };
        engine.load()?;
        Ok(engine)
    }

    /// Rebuilds the in-memory fingerprint map from disk. A missing or
    /// unparseable store is treated as empty, not an error (spec §7:
    /// persistence failures are non-fatal).
    pub fn load(&mut self) -> Result<BaselineData> {
        let content = match std::fs::read_to_string(&self.storage_path) {
            Ok(c) if !c.is_empty() => c,
            _ => {
                self.entries.clear();
                return Ok(self.empty_baseline());
            }
        };

        match serde_json::from_str::<BaselineData>(&content) {
            Ok(data) => {
                self.entries = data.entries.iter().map(|e| (e.fingerprint.clone(), e.clone())).collect();
                Ok(data)
            }
            Err(_) => {
                self.entries.clear();
                Ok(self.empty_baseline())
            }
        }
    }

    pub fn save(&mut self, entries: Vec<BaselineEntry>) -> Result<()> {
        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = BaselineData {
            version: BASELINE_VERSION.to_string(),
            generated_at: now_iso(),
            project_root: self.project_root.to_string_lossy().to_string(),
            entries,
        };
        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.storage_path, json)?;
        self.entries = data.entries.iter().map(|e| (e.fingerprint.clone(), e.clone())).collect();
        Ok(())
    }

    pub fn build_entries(&self, findings: &[Finding], source_lines: &[String]) -> Vec<BaselineEntry> {
        findings.iter().map(|f| self.build_entry(f, source_lines)).collect()
    }

    /// Splits `findings` into those not already baselined, tracking which
    /// fingerprints were observed so `summary` can compute `resolved`.
    pub fn filter_findings<'a>(&mut self, findings: &'a [Finding], source_lines: &[String]) -> (Vec<&'a Finding>, FilterStats) {
        let mut kept = Vec::new();
        let mut round = FilterStats::default();

        for finding in findings {
            let entry = self.build_entry(finding, source_lines);
            self.observed.insert(entry.fingerprint.clone());
            if self.entries.contains_key(&entry.fingerprint) {
                round.existing += 1;
            } else {
                kept.push(finding);
                round.new += 1;
            }
        }

        self.stats.new += round.new;
        self.stats.existing += round.existing;
        (kept, round)
    }

    /// Current entries, for callers that need to merge in newly observed
    /// findings before calling `save`.
    pub fn entries(&self) -> Vec<BaselineEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn summary(&self) -> BaselineSummary {
        let total = self.entries.len();
        let observed_in_store = self.entries.keys().filter(|fp| self.observed.contains(*fp)).count();
        let resolved = total.saturating_sub(observed_in_store);
        BaselineSummary { total, new: self.stats.new, existing: self.stats.existing, resolved }
    }

    fn build_entry(&self, finding: &Finding, source_lines: &[String]) -> BaselineEntry {
        let snippet = extract_snippet(source_lines, finding.line, finding.end_line);
        let normalized = normalize_snippet(&snippet);
        let code_hash = sha256_hex(&normalized);
        let normalized_path = self.normalize_file_path(&finding.file);

        let fingerprint_source = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            finding.rule_id, normalized_path, finding.line, finding.column, finding.sink, finding.source, code_hash
        );
        let fingerprint = sha256_hex(&fingerprint_source);

        BaselineEntry {
            fingerprint,
            rule_id: finding.rule_id.clone(),
            file: normalized_path,
            line: finding.line,
            column: finding.column,
            sink: finding.sink.clone(),
            source: finding.source.clone(),
            code_hash,
            created_at: now_iso(),
        }
    }

    fn normalize_file_path(&self, file: &str) -> String {
        let path = Path::new(file);
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.project_root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
        } else {
            path.to_path_buf()
        };
        relative.to_string_lossy().replace('\\', "/")
    }

    fn empty_baseline(&self) -> BaselineData {
        BaselineData {
            version: BASELINE_VERSION.to_string(),
            generated_at: now_iso(),
            project_root: self.project_root.to_string_lossy().to_string(),
            entries: Vec::new(),
        }
    }
}

fn extract_snippet(source_lines: &[String], start_line: i64, end_line: i64) -> Vec<String> {
    if source_lines.is_empty() {
        return Vec::new();
    }
    let start = start_line.max(1) as usize;
    let end = end_line.max(start as i64) as usize;
    if start > source_lines.len() {
        return Vec::new();
    }
    let end = end.min(source_lines.len());
    source_lines[start - 1..end].to_vec()
}

fn normalize_snippet(lines: &[String]) -> String {
    lines.iter().map(|l| l.trim_end()).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn finding() -> Finding {
        Finding { rule_id: "TAINT_FLOW".into(), file: "app.py".into(), line: 2, column: 4, end_line: 2, sink: "exec".into(), source: "input".into() }
    }

    #[test]
    fn fingerprint_is_stable_across_reformatting_that_preserves_snippet() {
        let dir = tempdir().unwrap();
        let engine = BaselineEngine::new(dir.path().join("baseline.json"), dir.path()).unwrap();
        let lines = vec!["def f():".to_string(), "    exec(x)  ".to_string()];
        let lines_reformatted = vec!["def f():".to_string(), "    exec(x)".to_string()];

        let a = engine.build_entry(&finding(), &lines);
        let b = engine.build_entry(&finding(), &lines_reformatted);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn renaming_sink_changes_fingerprint() {
        let dir = tempdir().unwrap();
        let engine = BaselineEngine::new(dir.path().join("baseline.json"), dir.path()).unwrap();
        let lines = vec!["    exec(x)".to_string()];
        let mut other = finding();
        other.sink = "eval".into();

        let a = engine.build_entry(&finding(), &lines);
        let b = engine.build_entry(&other, &lines);
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn rerun_with_no_changes_yields_zero_new_findings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        let lines = vec!["    exec(x)".to_string()];

        let mut engine = BaselineEngine::new(&path, dir.path()).unwrap();
        let entries = engine.build_entries(&[finding()], &lines);
        engine.save(entries).unwrap();

        let mut second_run = BaselineEngine::new(&path, dir.path()).unwrap();
        let (kept, stats) = second_run.filter_findings(&[finding()], &lines);
        assert!(kept.is_empty());
        assert_eq!(stats.new, 0);
        assert_eq!(stats.existing, 1);
        assert_eq!(second_run.summary().resolved, 0);
    }
}
