//! Layered error definitions
//!
//! Categorized by source: node contract / wiring / config file / io.
//! An unhealthy sample is a data state, never an error.

use thiserror::Error;

use crate::StreamType;

/// Unified graph error type
#[derive(Debug, Error)]
pub enum GraphError {
    // ===== Node Contract Errors =====
    /// Static declaration rejected at `init`
    #[error("invalid descriptor for node '{node}': {message}")]
    InvalidDescriptor { node: String, message: String },

    /// Runtime configuration rejected at `set_config`; previous config stays in effect
    #[error("invalid config for node '{node}': {message}")]
    InvalidConfig { node: String, message: String },

    /// Wiring references a stream that does not exist (yet)
    #[error("unresolved stream path '{path}'")]
    UnresolvedPath { path: String },

    /// Lifecycle contract violated, e.g. `process` before `start`
    #[error("fatal sequence error on node '{node}': {operation} not allowed in state {state}")]
    FatalSequence {
        node: String,
        operation: &'static str,
        state: String,
    },

    // ===== Wiring Errors =====
    /// Malformed `node/output` string
    #[error("invalid stream path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// Upstream stream type differs from the declared input type
    #[error("stream '{path}' has type {actual}, expected {expected}")]
    StreamTypeMismatch {
        path: String,
        expected: StreamType,
        actual: StreamType,
    },

    /// Input index beyond the node's declared inputs
    #[error("node '{node}' has {count} inputs, index {index} is out of range")]
    InputIndexOutOfRange {
        node: String,
        index: usize,
        count: usize,
    },

    /// Node name already used in the graph
    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),

    /// Node name not present in the graph
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// Wiring introduces a dependency cycle
    #[error("wiring cycle detected through nodes: {nodes:?}")]
    Cycle { nodes: Vec<String> },

    /// Factory does not know how to build the node type
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    // ===== Configuration File Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Create descriptor error
    pub fn invalid_descriptor(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create runtime config error
    pub fn invalid_config(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create unresolved path error
    pub fn unresolved(path: impl Into<String>) -> Self {
        Self::UnresolvedPath { path: path.into() }
    }

    /// Create lifecycle violation error
    pub fn fatal_sequence(
        node: impl Into<String>,
        operation: &'static str,
        state: impl ToString,
    ) -> Self {
        Self::FatalSequence {
            node: node.into(),
            operation,
            state: state.to_string(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Recoverable wiring condition that is retried on the next rewire
    pub fn is_deferrable(&self) -> bool {
        matches!(self, Self::UnresolvedPath { .. })
    }

    /// Programming-contract violation; the host must stop driving the graph
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalSequence { .. })
    }
}
