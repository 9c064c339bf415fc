//! Error types shared by the library.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration, parsing or evaluating queries.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid parameter, unreadable parameter file
    #[error("config error: {0}")]
    Config(String),

    /// Malformed query string or query file line
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Operator evaluated under a retrieval model that does not define it
    #[error("the {operator} operator is not supported by the {model} retrieval model")]
    ModelMismatch {
        operator: &'static str,
        model: &'static str,
    },

    /// Read failure in the index access layer
    #[error("index access error: {0}")]
    IndexAccess(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Query language errors. Every variant names the offending token or query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unknown field in '{token}'")]
    UnknownField { token: String },

    #[error("malformed proximity distance in '{token}'")]
    MalformedDistance { token: String },

    #[error("unknown query operator '{token}'")]
    UnknownOperator { token: String },

    #[error("expected a weight, found '{token}'")]
    ExpectedWeight { token: String },

    #[error("operand of {operator} has no weight")]
    MissingWeight { operator: String },

    #[error("weight without an operand in {operator}")]
    DanglingWeight { operator: String },

    #[error("{operator} cannot take the scoring operator {operand} as an argument")]
    InvalidOperand { operator: String, operand: String },

    #[error("unbalanced parentheses in '{query}'")]
    UnbalancedParentheses { query: String },

    #[error("unconsumed tokens after the end of '{query}'")]
    TrailingTokens { query: String },

    #[error("missing ':' in query line '{line}'")]
    MissingQueryId { line: String },
}

impl Error {
    pub(crate) fn index(msg: impl Into<String>) -> Self {
        Error::IndexAccess(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
