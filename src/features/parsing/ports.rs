//! Parser port (interface)
//!
//! Contract from spec §6: `parse(text, path) -> AST | SyntaxError`. Out of
//! scope for this crate: the AST representation is the tree-sitter concrete
//! syntax tree; only the IR builder (the core's actual deliverable)
//! interprets it.

use tree_sitter::Tree;

use crate::errors::Result;

/// Parser trait — abstraction over the parsing implementation, so the IR
/// builder and orchestrator depend only on this seam.
pub trait Parser: Send + Sync {
    /// Parse source code into a concrete syntax tree. Raises a `NsssError::
    /// Syntax` error on invalid input; never swallows partial failures.
    fn parse(&self, source: &str, file_path: &str) -> Result<Tree>;

    fn language_name(&self) -> &'static str;
}
