//! # tokenlens - Embedding-space token analysis
//!
//! tokenlens inspects a vocabulary through its input embedding matrix. It
//! answers two questions:
//!
//! - **Which single tokens are rare?** Every id is scored against a centroid
//!   of common tokens; typeable, canonical tokens furthest from it come first.
//! - **Which tokens sit nearest to a piece of text?** The text's sub-token
//!   embeddings are averaged into one query vector and ranked against every
//!   vocabulary row.
//!
//! ## Core Concepts
//!
//! - **EmbeddingMatrix**: `vocab_size x dim` rows, one per token id
//! - **NormalizedMatrix / UnitVector**: outputs of the normalizer; the only
//!   inputs the similarity ranker accepts
//! - **Tokenizer / EmbeddingSource**: the two collaborator capabilities
//! - **LensConfig**: floor, sentinel, common strings and filter parameters
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tokenlens::{find_rare_tokens, nearest_tokens, EmbeddingMatrix, NormalizedMatrix};
//!
//! let normalized = NormalizedMatrix::with_default_floor(&matrix);
//! for c in find_rare_tokens(&normalized, &tokenizer, 50)? {
//!     println!("{:.4} {} {:?}", c.similarity, c.id, c.token);
//! }
//!
//! let result = nearest_tokens(&matrix, &tokenizer, "hello world", 20)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod centroid;
pub mod config;
pub mod error;
pub mod matrix;
pub mod nearest;
pub mod normalize;
pub mod rare;
pub mod report;
pub mod similarity;
pub mod tokenizer;
pub mod typeable;

#[cfg(feature = "hf")]
pub mod hf;

// Re-export primary types at crate root for convenience
pub use centroid::{build_centroid, Centroid};
pub use config::{CentroidStrategy, LensConfig, DEFAULT_COMMON_STRINGS};
pub use error::{AnalysisError, LensError, LensResult, LoadError, TokenizerError, ValidationError};
pub use matrix::{EmbeddingMatrix, MatrixFingerprint};
pub use nearest::{nearest_tokens, NearestTokenSearch, NearestTokens, Neighbor, QueryVector};
pub use normalize::{NormalizedMatrix, UnitVector};
pub use rare::{find_rare_tokens, Candidate, RareTokenFinder, RareTokenReport};
pub use similarity::{cosine_similarity, SimilarityScores};
pub use tokenizer::{EmbeddingSource, LexiconTokenizer, TokenId, Tokenizer};
pub use typeable::{typeable, TypeabilityFilter};

#[cfg(feature = "hf")]
pub use hf::{HfTokenizer, SafetensorsEmbeddings};
