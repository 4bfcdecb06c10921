//! Error types for the code index.
//!
//! Structured per-subsystem `thiserror` enums, all convertible into the
//! top-level [`IndexError`] at the facade boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the wire-format scanner (`spec.md` §7).
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode wire record: {reason}")]
    DecodeWire { reason: String },

    #[error("record length exceeded remaining bytes: expected {expected}, available {available}")]
    Truncated { expected: u64, available: u64 },

    #[error("varint exceeded 10 bytes")]
    VarintOverflow,

    #[error("required field used wire type {wire_type}, expected length-delimited")]
    UnexpectedWireType { wire_type: u64 },

    #[error("{} file(s) failed during folder scan", .0.len())]
    Aggregate(Vec<ScannerError>),
}

impl ScannerError {
    /// Flattened list of underlying errors, for reporting.
    pub fn causes(&self) -> Vec<&ScannerError> {
        match self {
            ScannerError::Aggregate(errs) => errs.iter().collect(),
            other => vec![other],
        }
    }
}

/// Symbol-moniker grammar failures (`spec.md` §4.B).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("malformed symbol '{input}': {reason}")]
    MalformedSymbol { input: String, reason: String },
}

/// Failures specific to the prefix tree / descriptor lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("get_symbol_information_from_descriptors called with empty descriptors")]
    EmptyDescriptors,
}

/// Top-level error type every public operation in `spec.md` §6 returns.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("scanner failure: {0}")]
    Scanner(#[from] ScannerError),

    #[error("symbol parser failure: {0}")]
    Symbol(#[from] SymbolError),

    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("operation not implemented: {operation}")]
    NotImplemented { operation: String },

    #[error("{} underlying failure(s) during folder operation", .0.len())]
    Aggregate(Vec<IndexError>),
}

impl IndexError {
    pub fn aggregate(errors: Vec<IndexError>) -> Self {
        IndexError::Aggregate(errors)
    }

    /// Context message prefixed onto a scanner failure, matching the
    /// propagation policy in `spec.md` §7 ("failed to consume length",
    /// "failed to parse symbol moniker", ...).
    pub fn with_context(self, context: &str) -> Self {
        match self {
            IndexError::Scanner(ScannerError::DecodeWire { reason }) => {
                IndexError::Scanner(ScannerError::DecodeWire {
                    reason: format!("{context}: {reason}"),
                })
            }
            other => other,
        }
    }
}

pub type ScannerResult<T> = Result<T, ScannerError>;
pub type SymbolResult<T> = Result<T, SymbolError>;
pub type TreeResult<T> = Result<T, TreeError>;
pub type IndexResult<T> = Result<T, IndexError>;
