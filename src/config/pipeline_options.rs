//! Pipeline options: booleans toggling optional stages/preprocessing.

use serde::{Deserialize, Serialize};

/// Options exposed by the core (spec §6): whether to emit IR, strip
/// docstrings/comments during parsing, run the dynamic-area tagger, and
/// run alias resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub emit_ir: bool,
    pub strip_docstrings: bool,
    pub strip_comments: bool,
    pub enable_dynamic_tagging: bool,
    pub enable_alias_resolution: bool,
    pub enable_taint_analysis: bool,
    pub enable_baseline: bool,
    pub enable_cache: bool,
    /// Strings longer than this (bytes) are truncated in IR literals.
    pub max_literal_len: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            emit_ir: true,
            strip_docstrings: false,
            strip_comments: false,
            enable_dynamic_tagging: true,
            enable_alias_resolution: true,
            enable_taint_analysis: true,
            enable_baseline: true,
            enable_cache: true,
            max_literal_len: 200,
        }
    }
}
