//! Configuration system
//!
//! Two inputs exposed by the core (spec §6): the taint configuration
//! (source/sink/sanitizer fully-qualified names) and pipeline options
//! (booleans toggling IR emission, docstring stripping, dynamic tagging,
//! alias resolution). Both load from a programmatic builder or from YAML,
//! following the teacher's `config/pipeline_config.rs` layered-preset
//! pattern at a scope matched to this crate's needs.

mod error;
mod pipeline_options;
mod taint_config;

pub use error::{ConfigError, ConfigResult};
pub use pipeline_options::PipelineOptions;
pub use taint_config::TaintConfig;
