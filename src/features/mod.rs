//! Feature modules: one pipeline stage per directory (spec §4).

pub mod alias_resolver;
pub mod baseline;
pub mod dynamic_tagger;
pub mod flow_graph;
pub mod ir_generation;
pub mod parsing;
pub mod persistence;
pub mod ranker;
pub mod router;
pub mod ssa;
pub mod taint_analysis;
