//! nsss-core: static security analyzer core.
//!
//! Parses Python source into an IR graph, builds CFG/SSA, resolves
//! aliases and dynamic call sites, runs taint analysis, ranks and routes
//! findings, and tracks them across re-scans via a content-hashed
//! baseline and graph cache (spec §1-§10).

pub mod config;
pub mod errors;
pub mod features;
pub mod pipeline;
pub mod shared;

pub use errors::{NsssError, Result};
pub use pipeline::{FileReport, Pipeline, PipelineError, ProjectReport};
