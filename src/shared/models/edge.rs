//! IR edge model

use serde::{Deserialize, Serialize};

/// IR edge type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// Sequential control flow.
    Flow,
    /// Conditional branch taken when the guard is true.
    True,
    /// Conditional branch taken when the guard is false.
    False,
    /// Try body to exception handler.
    Exception,
    /// Loop body to loop exit.
    Break,
    /// Loop body back to loop header.
    Continue,
    /// Synthesized call edge.
    Call,
}

/// IR edge: `(from_id, to_id, type, guard_id?)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrEdge {
    pub from_id: String,
    pub to_id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub guard_id: Option<String>,
}

impl IrEdge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, edge_type: EdgeType, guard_id: Option<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            edge_type,
            guard_id,
        }
    }
}
