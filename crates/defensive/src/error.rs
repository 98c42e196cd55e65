//! Error types for contracts
//!
//! Provides the definition-time signature error, the field-path-qualified
//! validation error, and the contract error that carries a causal chain of
//! the contract boundaries it crossed.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed `service#method` signature
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid signature. Must be in format \"service-name#method-name\". Received \"{signature}\".")]
pub struct SignatureError {
    pub signature: String,
}

/// A single constraint violation
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Validation error: '{path}' {message}.")]
pub struct ValidationError {
    /// Dotted path to the offending value, e.g. `params.inner.b`
    pub path: String,
    /// Human-readable constraint description
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// One contract boundary an error crossed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalFrame {
    /// `service#method` of the contract
    pub signature: String,
    /// Formatted (redacted) input of the failing invocation
    pub input: String,
}

/// What went wrong at the innermost boundary
#[derive(Debug)]
pub enum ErrorKind {
    /// Arguments were rejected before the implementation ran
    Validation(ValidationError),
    /// The implementation itself failed
    Runtime(anyhow::Error),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation(err) => fmt::Display::fmt(err, f),
            ErrorKind::Runtime(err) => fmt::Display::fmt(err, f),
        }
    }
}

/// Error returned by every contract call.
///
/// `chain` is innermost first: the contract that raised comes first and
/// every enclosing contract appends itself behind it.
#[derive(Debug)]
pub struct ContractError {
    kind: ErrorKind,
    chain: Vec<CausalFrame>,
}

impl ContractError {
    pub(crate) fn new(kind: ErrorKind, frame: CausalFrame) -> Self {
        Self {
            kind,
            chain: vec![frame],
        }
    }

    /// Record that the error crossed one more (outer) contract boundary.
    pub(crate) fn push_boundary(&mut self, frame: CausalFrame) {
        self.chain.push(frame);
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Frames from the raising contract outward.
    pub fn chain(&self) -> &[CausalFrame] {
        &self.chain
    }

    /// Signatures of the chain, innermost first.
    pub fn signatures(&self) -> Vec<&str> {
        self.chain.iter().map(|f| f.signature.as_str()).collect()
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match &self.kind {
            ErrorKind::Validation(err) => Some(err),
            ErrorKind::Runtime(_) => None,
        }
    }

    /// Serializable summary for transports and reports.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            error: if self.is_validation() {
                "VALIDATION_ERROR".to_string()
            } else {
                "CONTRACT_ERROR".to_string()
            },
            message: self.kind.to_string(),
            chain: self.chain.clone(),
        }
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for ContractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Validation(err) => Some(err),
            ErrorKind::Runtime(err) => Some(err.as_ref()),
        }
    }
}

/// Serializable view of a `ContractError`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
    pub message: String,
    pub chain: Vec<CausalFrame>,
}

/// Failure returned by a contract implementation.
///
/// `Contract` marks an error that already crossed a contract boundary and
/// carries a chain; `Raised` is anything else. Both convert with `?`.
#[derive(Debug)]
pub enum Fault {
    Contract(ContractError),
    Raised(anyhow::Error),
}

impl Fault {
    /// Raise a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Fault::Raised(anyhow::Error::msg(message))
    }

    /// Raise any standard error.
    pub fn raised<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Fault::Raised(anyhow::Error::new(err))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Contract(err) => fmt::Display::fmt(err, f),
            Fault::Raised(err) => write!(f, "{:#}", err),
        }
    }
}

impl From<ContractError> for Fault {
    fn from(err: ContractError) -> Self {
        Fault::Contract(err)
    }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        Fault::Raised(err)
    }
}

/// Errors loading contract configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type alias for contract calls
pub type Result<T> = std::result::Result<T, ContractError>;
