// Error Types - Typed failures for every pipeline boundary
// Absorbed failures (retrieval, synthesis, repair) never leave the scenario path.

use thiserror::Error;

/// Document index lookups
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Retrieval unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query embedding failed: {0}")]
    Embedding(String),

    #[error("Query embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { actual: usize, expected: usize },

    #[error("Retrieval timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Language-model calls
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle request failed: {0}")]
    Request(String),

    #[error("Oracle returned status {status}")]
    Status { status: u16 },

    #[error("Oracle response could not be decoded: {0}")]
    Decode(String),

    #[error("Oracle timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Anything that keeps the synthesizer from producing a candidate scenario
#[derive(Debug, Error)]
pub enum SynthesisFailure {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Oracle response contains no JSON object")]
    NoJsonObject,

    #[error("Oracle response does not match the scenario schema: {0}")]
    Schema(String),
}

/// Velocity repair could not fix a scenario
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("Body '{body}' has no primary to orbit")]
    NoPrimary { body: String },

    #[error("Primary of '{body}' has non-positive mass")]
    NonPositivePrimaryMass { body: String },

    #[error("Body '{body}' still fails checks after repair: {reason}")]
    StillInvalid { body: String, reason: String },
}

/// Numerical integration cannot continue
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntegratorError {
    #[error("Close encounter between '{first}' and '{second}' at {separation:e} AU")]
    SingularEncounter {
        first: String,
        second: String,
        separation: f64,
    },

    #[error("Non-finite state for body '{body}'")]
    NonFinite { body: String },

    #[error("Adaptive step budget exhausted after {substeps} substeps ({remaining:e} yr left)")]
    StepBudgetExhausted { substeps: usize, remaining: f64 },

    #[error("Integration task failed: {0}")]
    Task(String),
}

/// Malformed or out-of-place client messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("No active simulation")]
    NoSession,
}

/// Loading the prebuilt document index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to read index {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse index: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Document '{id}' has {actual} dimensions, index declares {expected}")]
    Dimension {
        id: String,
        expected: usize,
        actual: usize,
    },
}

/// Loading the orbital catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog entry '{name}' is invalid: {reason}")]
    InvalidEntry { name: String, reason: String },
}
