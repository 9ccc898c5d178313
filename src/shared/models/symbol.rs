//! Symbol table model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Var,
    Param,
    Import,
    Class,
    Function,
}

/// Symbol: `(name, kind, scope_id, defs, uses)` plus `is_global`/`is_nonlocal`
/// flags. Uniquely keyed by `(scope_id, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scope_id: String,
    #[serde(default)]
    pub defs: Vec<String>,
    #[serde(default)]
    pub uses: Vec<String>,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    pub is_nonlocal: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, scope_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            scope_id: scope_id.into(),
            defs: Vec::new(),
            uses: Vec::new(),
            is_global: false,
            is_nonlocal: false,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.scope_id.clone(), self.name.clone())
    }
}
