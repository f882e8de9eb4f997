//! Interpreter errors

use loom_core::RuntimeError;
use thiserror::Error;

/// A node type could not be resolved to a definition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("No component registered for type '{tag}'")]
    NotRegistered { tag: String },

    #[error("Resolving type '{tag}' failed: {reason}")]
    Failed { tag: String, reason: String },
}

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("Invalid tree description: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Node '{id}' is {status} and cannot handle events")]
    NotReady { id: String, status: &'static str },

    #[error("Node '{node}' has no method '{method}'")]
    UnknownMethod { node: String, method: String },

    #[error("Duplicate node id '{0}' in tree")]
    DuplicateId(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
pub type InterpretResult<T> = Result<T, InterpretError>;

impl ResolveError {
    pub fn not_registered(tag: impl Into<String>) -> Self {
        Self::NotRegistered { tag: tag.into() }
    }
}
