//! Error types for nsss-core
//!
//! Unified error handling across the crate, structured along the stage
//! taxonomy in the spec's error-handling design (parse / IR / CFG-SSA /
//! taint-ranker / persistence / configuration).

use thiserror::Error;

/// Main error type for nsss-core operations.
#[derive(Debug, Error)]
pub enum NsssError {
    /// Source is syntactically invalid. Fatal for the file.
    #[error("syntax error in {file}: {message}")]
    Syntax { file: String, message: String },

    /// IR traversal failure; non-fatal for stages that don't need IR.
    #[error("IR stage error: {0}")]
    Ir(String),

    /// CFG/SSA construction failure; non-fatal, skips taint stage.
    #[error("flow graph / SSA stage error: {0}")]
    FlowGraph(String),

    /// Taint or ranker failure; non-fatal, baseline still runs.
    #[error("taint/ranker stage error: {0}")]
    Taint(String),

    /// Persistence failure; non-fatal, cache bypassed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration; fatal at orchestrator startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error, wrapped from std.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NsssError {
    pub fn syntax(file: impl Into<String>, message: impl Into<String>) -> Self {
        NsssError::Syntax {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn ir(msg: impl Into<String>) -> Self {
        NsssError::Ir(msg.into())
    }

    pub fn flow_graph(msg: impl Into<String>) -> Self {
        NsssError::FlowGraph(msg.into())
    }

    pub fn taint(msg: impl Into<String>) -> Self {
        NsssError::Taint(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        NsssError::Persistence(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        NsssError::Config(msg.into())
    }
}

/// Result type alias for nsss-core operations.
pub type Result<T> = std::result::Result<T, NsssError>;
