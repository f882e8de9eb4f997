//! Handler language errors

use thiserror::Error;

/// Source text did not parse
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Syntax error:\n{errors}")]
    Syntax { errors: String },
}

/// No code shape accepted the source
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("No code shape could compile the handler (tried: {tried:?})\n{errors}")]
    NoMatchingShape {
        tried: Vec<&'static str>,
        errors: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Runtime failure of a compiled handler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("Step limit of {max} exceeded")]
    StepLimit { max: usize },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Cannot assign to constant '{0}'")]
    AssignToConstant(String),

    #[error("Variable '{0}' is already declared in this scope")]
    Redeclared(String),

    #[error("Invalid assignment target")]
    InvalidTarget,

    #[error("'{0}' is not a function")]
    NotCallable(String),

    #[error("Unknown method '{method}' on {receiver}")]
    UnknownMethod { receiver: &'static str, method: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Array index {index} is too far past the end (length {len})")]
    IndexOutOfRange { index: f64, len: usize },

    #[error("Value exceeds the size limit of {limit}")]
    TooLarge { limit: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;
pub type CompileResult<T> = Result<T, CompileError>;
pub type ExecResult<T> = Result<T, ExecError>;

impl ExecError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn unknown_method(receiver: &'static str, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            receiver,
            method: method.into(),
        }
    }
}
