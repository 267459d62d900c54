//! Analysis parameters.
//!
//! Everything that used to be a baked-in constant (the common-string list,
//! the zero-norm floor, the non-finite sentinel, the token length limit) is a
//! field here so tests can substitute small synthetic vocabularies.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LensResult, LoadError, ValidationError};
use crate::typeable::TypeabilityFilter;

/// Smallest norm a vector is divided by.
pub const DEFAULT_NORM_FLOOR: f32 = 1e-8;

/// Score assigned to non-finite similarities so they sort last.
pub const DEFAULT_SENTINEL: f32 = -1e9;

/// Longest decoded token (in chars) that still counts as typeable.
pub const DEFAULT_MAX_TOKEN_CHARS: usize = 10;

/// Frequent surface strings whose embeddings define "ordinary language".
pub const DEFAULT_COMMON_STRINGS: &[&str] = &[
    "the", "a", "an", "and", "of", "to", "in", "on", "for", "with", "at", "by", "from", "is", "are",
    "was", "were", "be", "this", "that", "it", ",", ".", "-", "_", "0", "1", "2", "3", "4", "5",
    "6", "7", "8", "9", "i", "rt", "ing",
];

/// How a common string contributes token ids to the centroid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentroidStrategy {
    /// Only the first sub-token of each string.
    #[default]
    FirstSubToken,
    /// Every sub-token of each string.
    SequenceMean,
}

/// Parameters shared by the rare-token and nearest-token pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Lower bound on the divisor used when normalizing.
    pub norm_floor: f32,
    /// Replacement for NaN/inf similarity scores.
    pub sentinel: f32,
    /// Maximum decoded length of a typeable token.
    pub max_token_chars: usize,
    /// Regex for tokens too ordinary to report. It must match the whole
    /// token (it is anchored as `^(?:pattern)$`). `None` uses the built-in
    /// plain-ASCII-alphanumeric rule.
    pub plain_token_pattern: Option<String>,
    /// Ordered common-string set used to build the centroid.
    pub common_strings: Vec<String>,
    /// Centroid construction strategy.
    pub centroid_strategy: CentroidStrategy,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            norm_floor: DEFAULT_NORM_FLOOR,
            sentinel: DEFAULT_SENTINEL,
            max_token_chars: DEFAULT_MAX_TOKEN_CHARS,
            plain_token_pattern: None,
            common_strings: DEFAULT_COMMON_STRINGS.iter().map(ToString::to_string).collect(),
            centroid_strategy: CentroidStrategy::default(),
        }
    }
}

impl LensConfig {
    /// Replaces the common-string set.
    #[must_use]
    pub fn with_common_strings<I, S>(mut self, strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common_strings = strings.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the centroid strategy.
    #[must_use]
    pub const fn with_centroid_strategy(mut self, strategy: CentroidStrategy) -> Self {
        self.centroid_strategy = strategy;
        self
    }

    /// Sets the normalization floor.
    #[must_use]
    pub const fn with_norm_floor(mut self, floor: f32) -> Self {
        self.norm_floor = floor;
        self
    }

    /// Sets the typeable length limit.
    #[must_use]
    pub const fn with_max_token_chars(mut self, max: usize) -> Self {
        self.max_token_chars = max;
        self
    }

    /// Sets a custom plain-token regex.
    #[must_use]
    pub fn with_plain_token_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.plain_token_pattern = Some(pattern.into());
        self
    }

    /// Checks parameter ranges and compiles the plain-token pattern.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the floor is not a positive finite
    /// number, the sentinel is not finite, the length limit is zero, or the
    /// plain-token pattern does not compile.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.norm_floor.is_finite() && self.norm_floor > 0.0) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("norm_floor must be positive and finite, got {}", self.norm_floor),
            });
        }
        if !self.sentinel.is_finite() {
            return Err(ValidationError::InvalidConfig {
                reason: format!("sentinel must be finite, got {}", self.sentinel),
            });
        }
        if self.max_token_chars == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_token_chars must be at least 1".to_string(),
            });
        }
        TypeabilityFilter::from_config(self)?;
        Ok(())
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    /// Returns a load error on malformed JSON and a validation error on
    /// out-of-range values.
    pub fn from_json_str(json: &str) -> LensResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| LoadError::Parse {
            what: "config".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file.
    ///
    /// # Errors
    /// See [`LensConfig::from_json_str`]; I/O failures are load errors.
    pub fn from_json_file(path: impl AsRef<Path>) -> LensResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
