//! IR node model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Span, Value};

/// Structural kind of an IR node, mirroring the abstract syntax of the
/// source language (currently: Python).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Module,
    Function,
    Class,
    Block,
    If,
    While,
    For,
    Try,
    With,
    Match,
    Return,
    Raise,
    Break,
    Continue,
    Assign,
    Delete,
    Assert,
    Import,
    Call,
    Name,
    Literal,
    Attribute,
    Subscript,
    BinOp,
    BoolOp,
    UnaryOp,
    Compare,
    Lambda,
    IfExp,
    NamedExpr,
    Await,
    Yield,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "Module",
            NodeKind::Function => "Function",
            NodeKind::Class => "Class",
            NodeKind::Block => "Block",
            NodeKind::If => "If",
            NodeKind::While => "While",
            NodeKind::For => "For",
            NodeKind::Try => "Try",
            NodeKind::With => "With",
            NodeKind::Match => "Match",
            NodeKind::Return => "Return",
            NodeKind::Raise => "Raise",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::Assign => "Assign",
            NodeKind::Delete => "Delete",
            NodeKind::Assert => "Assert",
            NodeKind::Import => "Import",
            NodeKind::Call => "Call",
            NodeKind::Name => "Name",
            NodeKind::Literal => "Literal",
            NodeKind::Attribute => "Attribute",
            NodeKind::Subscript => "Subscript",
            NodeKind::BinOp => "BinOp",
            NodeKind::BoolOp => "BoolOp",
            NodeKind::UnaryOp => "UnaryOp",
            NodeKind::Compare => "Compare",
            NodeKind::Lambda => "Lambda",
            NodeKind::IfExp => "IfExp",
            NodeKind::NamedExpr => "NamedExpr",
            NodeKind::Await => "Await",
            NodeKind::Yield => "Yield",
        }
    }
}

/// IR node. Stable id format: `"{kind}:{file}:{line}:{col}:{seq}"` where
/// `seq` is a parse-order counter (see `IdAllocator`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrNode {
    pub id: String,
    pub kind: NodeKind,
    pub span: Span,
    pub parent_id: Option<String>,
    pub scope_id: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, Value>,
}

impl IrNode {
    pub fn new(id: String, kind: NodeKind, span: Span, parent_id: Option<String>, scope_id: String) -> Self {
        Self {
            id,
            kind,
            span,
            parent_id,
            scope_id,
            attrs: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.attrs.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn is_unsupported(&self) -> bool {
        self.get("unsupported").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Allocates stable IR node ids in strict parse order.
#[derive(Debug, Default)]
pub struct IdAllocator {
    seq: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { seq: 0 }
    }

    pub fn next_id(&mut self, kind: NodeKind, file: &str, line: i64, col: i64) -> String {
        let seq = self.seq;
        self.seq += 1;
        format!("{}:{}:{}:{}:{}", kind.as_str(), file, line, col, seq)
    }
}
