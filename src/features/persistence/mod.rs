//! Graph persistence: content-hashed IR graph cache + manifest for
//! incremental scans (spec §4.10).
//!
//! Ported from the reference `graph_serializer.py`. The manifest's
//! read/write cycle is serialized through a `parking_lot::Mutex` rather
//! than the source's `threading.Lock`, matching how the rest of this
//! crate reaches for `parking_lot` over the stdlib equivalent (spec §5:
//! "the manifest store holds its own mutex around read/write cycles").

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::shared::models::IrGraph;

const GRAPH_CACHE_FILENAME: &str = "graph_v1.jsonl";
const MANIFEST_FILENAME: &str = "manifest.json";
const GRAPH_VERSION: &str = "1.0";

pub fn compute_project_hash(project_root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_root.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn cache_dir(project_root: &Path) -> PathBuf {
    project_root.join(".nsss").join("cache").join(compute_project_hash(project_root))
}

pub fn cache_path(project_root: &Path) -> PathBuf {
    cache_dir(project_root).join(GRAPH_CACHE_FILENAME)
}

pub fn manifest_path(project_root: &Path) -> PathBuf {
    cache_dir(project_root).join(MANIFEST_FILENAME)
}

pub fn compute_file_hash(path: &Path) -> Option<String> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf).ok()?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Some(format!("{:x}", hasher.finalize()))
}

/// Best-effort git HEAD resolution, falling back to `"unknown"` at the
/// call site if this returns `None` (spec §4.10).
pub fn read_git_commit_hash(project_root: &Path) -> Option<String> {
    let head_path = project_root.join(".git").join("HEAD");
    let head = std::fs::read_to_string(head_path).ok()?;
    let head = head.trim();
    if let Some(ref_path) = head.strip_prefix("ref:") {
        let ref_path = ref_path.trim();
        let full = project_root.join(".git").join(ref_path);
        std::fs::read_to_string(full).ok().map(|s| s.trim().to_string())
    } else if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphMetaRecord {
    #[serde(rename = "type")]
    record_type: String,
    version: String,
    timestamp: i64,
    project_root: String,
    commit_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
}

/// Metadata read back alongside a loaded graph.
#[derive(Debug, Clone)]
pub struct GraphMeta {
    pub version: String,
    pub timestamp: i64,
    pub project_root: String,
    pub commit_hash: String,
    pub file_path: Option<String>,
}

fn tagged_line<T: Serialize>(value: &T, record_type: &str) -> Result<String> {
    let mut json = serde_json::to_value(value)?;
    if let serde_json::Value::Object(ref mut map) = json {
        map.insert("record_type".to_string(), serde_json::Value::String(record_type.to_string()));
    }
    Ok(serde_json::to_string(&json)?)
}

/// Newline-delimited JSON reader/writer for one file's IR graph.
pub struct GraphSerializer;

impl GraphSerializer {
    pub fn save(&self, graph: &IrGraph, output_path: &Path, project_root: &Path, file_path: Option<&str>) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let commit_hash = read_git_commit_hash(project_root).unwrap_or_else(|| "unknown".to_string());
        let meta = GraphMetaRecord {
            record_type: "meta".to_string(),
            version: GRAPH_VERSION.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            project_root: project_root.to_string_lossy().to_string(),
            commit_hash,
            file_path: file_path.map(str::to_string),
        };

        let mut out = String::new();
        out.push_str(&serde_json::to_string(&meta)?);
        out.push('\n');
        for node in &graph.nodes {
            out.push_str(&tagged_line(node, "node")?);
            out.push('\n');
        }
        for edge in &graph.edges {
            out.push_str(&tagged_line(edge, "edge")?);
            out.push('\n');
        }
        for symbol in &graph.symbols {
            out.push_str(&tagged_line(symbol, "symbol")?);
            out.push('\n');
        }

        // Atomic write: stage to a sibling temp file, then rename.
        let tmp_path = output_path.with_extension("jsonl.tmp");
        std::fs::write(&tmp_path, out)?;
        std::fs::rename(&tmp_path, output_path)?;
        Ok(())
    }

    pub fn load(&self, input_path: &Path) -> Result<(IrGraph, GraphMeta)> {
        let content = std::fs::read_to_string(input_path)?;
        let mut lines = content.lines();

        let meta_line = lines.next().ok_or_else(|| crate::errors::NsssError::persistence("empty graph cache"))?;
        let meta: GraphMetaRecord = serde_json::from_str(meta_line)?;
        if meta.record_type != "meta" {
            return Err(crate::errors::NsssError::persistence("first line must be meta"));
        }
        if meta.version != GRAPH_VERSION {
            return Err(crate::errors::NsssError::persistence(format!("unsupported graph version: {}", meta.version)));
        }

        let mut graph = IrGraph::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line)?;
            match value.get("record_type").and_then(serde_json::Value::as_str) {
                Some("node") => graph.nodes.push(serde_json::from_value(value)?),
                Some("edge") => graph.edges.push(serde_json::from_value(value)?),
                Some("symbol") => graph.symbols.push(serde_json::from_value(value)?),
                _ => continue,
            }
        }

        Ok((
            graph,
            GraphMeta {
                version: meta.version,
                timestamp: meta.timestamp,
                project_root: meta.project_root,
                commit_hash: meta.commit_hash,
                file_path: meta.file_path,
            },
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file_path: String,
    pub file_hash: String,
    pub cache_path: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: String,
    updated_at: i64,
    entries: HashMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self { version: GRAPH_VERSION.to_string(), updated_at: 0, entries: HashMap::new() }
    }
}

/// Single-writer manifest store: `record`/`is_fresh` serialize through a
/// mutex, matching the per-project single-writer model in spec §5.
pub struct ManifestStore {
    project_root: PathBuf,
    manifest_path: PathBuf,
    state: Mutex<Manifest>,
}

impl ManifestStore {
    pub fn new(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        let manifest_path = manifest_path(&project_root);
        let state = match std::fs::read_to_string(&manifest_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Manifest::default(),
        };
        Ok(Self { project_root, manifest_path, state: Mutex::new(state) })
    }

    fn normalize(&self, file_path: &Path) -> String {
        let absolute = if file_path.is_absolute() { file_path.to_path_buf() } else { self.project_root.join(file_path) };
        absolute
            .strip_prefix(&self.project_root)
            .map(Path::to_path_buf)
            .unwrap_or(absolute)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Hashes `file_path` and records it against `cache_path`. Returns
    /// `None` (and records nothing) if the file can't be hashed.
    pub fn record(&self, file_path: &Path, cache_path: &Path) -> Result<Option<ManifestEntry>> {
        let Some(file_hash) = compute_file_hash(file_path) else { return Ok(None) };
        let normalized = self.normalize(file_path);
        let entry = ManifestEntry {
            file_path: normalized.clone(),
            file_hash,
            cache_path: cache_path.to_string_lossy().to_string(),
            updated_at: chrono::Utc::now().timestamp(),
        };

        let mut state = self.state.lock();
        state.entries.insert(normalized, entry.clone());
        state.updated_at = entry.updated_at;
        self.persist(&state)?;
        Ok(Some(entry))
    }

    pub fn is_fresh(&self, file_path: &Path) -> bool {
        let Some(file_hash) = compute_file_hash(file_path) else { return false };
        let normalized = self.normalize(file_path);
        let state = self.state.lock();
        state.entries.get(&normalized).map(|e| e.file_hash == file_hash).unwrap_or(false)
    }

    pub fn entry(&self, file_path: &Path) -> Option<ManifestEntry> {
        let normalized = self.normalize(file_path);
        self.state.lock().entries.get(&normalized).cloned()
    }

    fn persist(&self, manifest: &Manifest) -> Result<()> {
        if let Some(parent) = self.manifest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&self.manifest_path, json)?;
        Ok(())
    }
}

/// Whether a stale cache entry should be surfaced anyway (spec §4.10:
/// "strict mode returns no graph if stale; lax mode returns whatever
/// exists with the stale metadata").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Strict,
    Lax,
}

/// Combines [`GraphSerializer`] + [`ManifestStore`] into the single
/// save/load entry point the orchestrator uses per file.
pub struct GraphPersistenceService {
    serializer: GraphSerializer,
}

impl Default for GraphPersistenceService {
    fn default() -> Self {
        Self { serializer: GraphSerializer }
    }
}

impl GraphPersistenceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_ir_graph(&self, graph: &IrGraph, file_path: &Path, project_root: &Path, manifest: &ManifestStore) -> Result<PathBuf> {
        let path = cache_path(project_root);
        self.serializer.save(graph, &path, project_root, file_path.to_str())?;
        manifest.record(file_path, &path)?;
        Ok(path)
    }

    /// Loads the cached graph for `file_path` iff the manifest considers
    /// it fresh (or `mode` is `Lax`).
    pub fn load_ir_graph(&self, file_path: &Path, project_root: &Path, manifest: &ManifestStore, mode: LoadMode) -> Result<Option<(IrGraph, GraphMeta)>> {
        if mode == LoadMode::Strict && !manifest.is_fresh(file_path) {
            return Ok(None);
        }
        let path = cache_path(project_root);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.serializer.load(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{EdgeType, IrEdge, IrNode, NodeKind, Span, Symbol, SymbolKind, MODULE_SCOPE};
    use tempfile::tempdir;

    fn sample_graph() -> IrGraph {
        let mut graph = IrGraph::new();
        graph.add_node(IrNode::new("n1".into(), NodeKind::Module, Span::unknown("f.py"), None, MODULE_SCOPE.to_string()));
        graph.add_node(IrNode::new("n2".into(), NodeKind::Name, Span::unknown("f.py"), Some("n1".into()), MODULE_SCOPE.to_string()));
        graph.add_edge(IrEdge::new("n1", "n2", EdgeType::Flow, None));
        graph.add_symbol(Symbol::new("x", SymbolKind::Var, MODULE_SCOPE));
        graph
    }

    #[test]
    fn round_trip_save_then_load_is_equal() {
        let dir = tempdir().unwrap();
        let graph = sample_graph();
        let serializer = GraphSerializer;
        let path = dir.path().join("graph_v1.jsonl");

        serializer.save(&graph, &path, dir.path(), Some("f.py")).unwrap();
        let (loaded, meta) = serializer.load(&path).unwrap();

        assert_eq!(loaded.nodes.len(), graph.nodes.len());
        assert_eq!(loaded.edges.len(), graph.edges.len());
        assert_eq!(loaded.symbols.len(), graph.symbols.len());
        assert_eq!(meta.version, "1.0");
    }

    #[test]
    fn manifest_tracks_freshness_by_file_hash() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("f.py");
        std::fs::write(&file_path, "x = 1\n").unwrap();

        let manifest = ManifestStore::new(dir.path()).unwrap();
        assert!(!manifest.is_fresh(&file_path));

        manifest.record(&file_path, Path::new("irrelevant")).unwrap();
        assert!(manifest.is_fresh(&file_path));

        std::fs::write(&file_path, "x = 2\n").unwrap();
        assert!(!manifest.is_fresh(&file_path));
    }
}
