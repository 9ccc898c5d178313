//! Parsing feature: wraps the tree-sitter front end behind a `Parser` port.
//!
//! Grounded in the teacher's `features/parsing/infrastructure/tree_sitter/*`
//! and `features/parsing/plugins/python.rs`: a `tree-sitter` +
//! `tree-sitter-python` parser exposed through a small trait so the rest of
//! the pipeline never depends on the concrete grammar crate.

mod ports;
mod tree_sitter_parser;

pub use ports::Parser;
pub use tree_sitter_parser::PythonParser;
