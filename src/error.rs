//! Error types for tokenlens.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the specific condition (an empty centroid is not the same failure as a
//! tokenizer that cannot be loaded).

use std::path::PathBuf;

use thiserror::Error;

use crate::tokenizer::TokenId;

/// Validation errors for shapes and configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Matrix data has {actual} values, expected {rows} x {dim} = {expected}")]
    InvalidShape {
        rows: usize,
        dim: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row} has {actual} dimensions, expected {expected}")]
    RaggedRows {
        row: usize,
        actual: usize,
        expected: usize,
    },

    #[error("Vector has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        actual: usize,
        expected: usize,
    },

    #[error("Raw matrix has {raw} rows but the normalized matrix has {normalized}")]
    VocabMismatch {
        raw: usize,
        normalized: usize,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Failures of the analysis pipelines themselves.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Common-string set produced no token ids; centroid is undefined")]
    EmptyCentroid,

    #[error("Query text encoded to zero token ids")]
    EmptyQuery,

    #[error("Token id {id} is outside the vocabulary (size {vocab_size})")]
    TokenOutOfRange {
        id: TokenId,
        vocab_size: usize,
    },
}

/// Failure reported by a tokenizer implementation.
#[derive(Debug, Error)]
#[error("Tokenizer error: {message}")]
pub struct TokenizerError {
    message: String,
}

impl TokenizerError {
    /// Creates a tokenizer error from any displayable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The underlying message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while loading configuration, tokenizers or weights.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {what}: {message}")]
    Parse {
        what: String,
        message: String,
    },

    #[error("No embedding tensor found in {path} (tried: {tried})")]
    TensorMissing {
        path: PathBuf,
        tried: String,
    },

    #[error("Tensor '{name}' has unsupported dtype {dtype}")]
    UnsupportedDtype {
        name: String,
        dtype: String,
    },

    #[error("Tensor '{name}' has shape {shape:?}, expected a 2-D matrix")]
    NotAMatrix {
        name: String,
        shape: Vec<usize>,
    },
}

/// Top-level error type for tokenlens.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("{0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

impl LensError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an analysis error.
    #[must_use]
    pub const fn is_analysis(&self) -> bool {
        matches!(self, Self::Analysis(_))
    }

    /// Returns true if the tokenizer collaborator failed.
    #[must_use]
    pub const fn is_tokenizer(&self) -> bool {
        matches!(self, Self::Tokenizer(_))
    }

    /// Returns true if loading an external resource failed.
    #[must_use]
    pub const fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }

    /// Returns true for the empty-centroid condition.
    #[must_use]
    pub const fn is_empty_centroid(&self) -> bool {
        matches!(self, Self::Analysis(AnalysisError::EmptyCentroid))
    }

    /// Returns true for the empty-query condition.
    #[must_use]
    pub const fn is_empty_query(&self) -> bool {
        matches!(self, Self::Analysis(AnalysisError::EmptyQuery))
    }
}

/// Result type alias for tokenlens operations.
pub type LensResult<T> = Result<T, LensError>;
