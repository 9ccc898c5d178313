//! tree-sitter-python adapter

use tree_sitter::{Parser as TsParser, Tree};

use super::ports::Parser;
use crate::errors::{NsssError, Result};

/// Python front end backed by `tree-sitter` + `tree-sitter-python`.
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PythonParser {
    fn parse(&self, source: &str, file_path: &str) -> Result<Tree> {
        let mut parser = TsParser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| NsssError::ir(format!("failed to load grammar: {e}")))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| NsssError::syntax(file_path, "parser produced no tree"))?;

        if tree.root_node().has_error() {
            return Err(NsssError::syntax(file_path, "source contains a syntax error"));
        }

        Ok(tree)
    }

    fn language_name(&self) -> &'static str {
        "python"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_source() {
        let parser = PythonParser::new();
        let tree = parser.parse("x = 1\n", "f.py").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn rejects_malformed_source() {
        let parser = PythonParser::new();
        let result = parser.parse("def f(:\n", "f.py");
        assert!(result.is_err());
    }
}
