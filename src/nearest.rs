//! Nearest-token search for free text.
//!
//! The text is encoded without special tokens, its raw sub-token embeddings
//! are averaged into one query vector, and the query is normalized and ranked
//! against every normalized vocabulary row. No filtering is applied: any
//! token, special or not, may come back.

use serde::Serialize;

use crate::config::LensConfig;
use crate::error::{AnalysisError, LensResult, ValidationError};
use crate::matrix::EmbeddingMatrix;
use crate::normalize::{NormalizedMatrix, UnitVector};
use crate::similarity::SimilarityScores;
use crate::tokenizer::{TokenId, Tokenizer};

/// Query vector plus the sub-tokens it was built from.
#[derive(Debug, Clone)]
pub struct QueryVector {
    vector: UnitVector,
    ids: Vec<TokenId>,
    subtokens: Vec<String>,
}

impl QueryVector {
    /// Encodes `text`, averages the raw rows of its ids and normalizes the mean.
    ///
    /// # Errors
    /// `EmptyQuery` if the text encodes to no ids, `TokenOutOfRange` for ids
    /// outside the matrix, and tokenizer failures.
    pub fn build<T: Tokenizer + ?Sized>(
        text: &str,
        tokenizer: &T,
        matrix: &EmbeddingMatrix,
        floor: f32,
    ) -> LensResult<Self> {
        let ids = tokenizer.encode(text, false)?;
        if ids.is_empty() {
            return Err(AnalysisError::EmptyQuery.into());
        }

        let mean = matrix.mean_of(&ids)?;
        let vector = UnitVector::new(&mean, floor);
        let subtokens = ids
            .iter()
            .map(|&id| tokenizer.decode(&[id]))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vector,
            ids,
            subtokens,
        })
    }

    /// The normalized query vector.
    #[must_use]
    pub const fn vector(&self) -> &UnitVector {
        &self.vector
    }

    /// Token ids of the query text, in order.
    #[must_use]
    pub fn ids(&self) -> &[TokenId] {
        &self.ids
    }

    /// Each query id decoded on its own.
    #[must_use]
    pub fn subtokens(&self) -> &[String] {
        &self.subtokens
    }
}

/// One ranked neighbor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    /// Decoded surface string.
    pub token: String,
    /// Vocabulary id.
    pub id: TokenId,
    /// Cosine similarity to the query vector.
    pub similarity: f32,
}

/// Result of a nearest-token search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestTokens {
    /// Token ids of the query text.
    pub query_ids: Vec<TokenId>,
    /// Each query id decoded individually.
    pub query_subtokens: Vec<String>,
    /// Neighbors, descending by similarity.
    pub neighbors: Vec<Neighbor>,
    /// Similarities that were non-finite and replaced by the sentinel.
    pub non_finite: usize,
}

/// Configured nearest-token search.
#[derive(Debug, Clone, Default)]
pub struct NearestTokenSearch {
    config: LensConfig,
}

impl NearestTokenSearch {
    /// Creates a search from a validated configuration.
    ///
    /// # Errors
    /// Returns the configuration's validation error.
    pub fn new(config: LensConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Normalizes `matrix`, then searches.
    ///
    /// # Errors
    /// See [`NearestTokenSearch::search_normalized`].
    pub fn search<T: Tokenizer + ?Sized>(
        &self,
        matrix: &EmbeddingMatrix,
        tokenizer: &T,
        text: &str,
        k: usize,
    ) -> LensResult<NearestTokens> {
        let normalized = NormalizedMatrix::new(matrix, self.config.norm_floor);
        self.search_normalized(matrix, &normalized, tokenizer, text, k)
    }

    /// Searches with a normalized matrix computed once and shared across
    /// queries. `raw` supplies the query's sub-token rows.
    ///
    /// # Errors
    /// `EmptyQuery`, `TokenOutOfRange`, `DimensionMismatch` or
    /// `VocabMismatch` when `raw` and `normalized` disagree in shape, and
    /// tokenizer failures.
    pub fn search_normalized<T: Tokenizer + ?Sized>(
        &self,
        raw: &EmbeddingMatrix,
        normalized: &NormalizedMatrix,
        tokenizer: &T,
        text: &str,
        k: usize,
    ) -> LensResult<NearestTokens> {
        if raw.dim() != normalized.dim() {
            return Err(ValidationError::DimensionMismatch {
                actual: raw.dim(),
                expected: normalized.dim(),
            }
            .into());
        }
        if raw.vocab_size() != normalized.vocab_size() {
            return Err(ValidationError::VocabMismatch {
                raw: raw.vocab_size(),
                normalized: normalized.vocab_size(),
            }
            .into());
        }

        let query = QueryVector::build(text, tokenizer, raw, self.config.norm_floor)?;
        let sims = SimilarityScores::compute(normalized, query.vector(), self.config.sentinel)?;

        let neighbors = sims
            .top_k(k)
            .into_iter()
            .map(|(id, similarity)| -> LensResult<Neighbor> {
                Ok(Neighbor {
                    token: tokenizer.decode(&[id])?,
                    id,
                    similarity,
                })
            })
            .collect::<LensResult<Vec<_>>>()?;

        tracing::debug!(
            query_ids = query.ids().len(),
            returned = neighbors.len(),
            "nearest-token search finished"
        );

        Ok(NearestTokens {
            query_ids: query.ids,
            query_subtokens: query.subtokens,
            neighbors,
            non_finite: sims.non_finite(),
        })
    }
}

/// The `k` vocabulary tokens nearest to `text`'s mean sub-token embedding.
///
/// # Errors
/// `EmptyQuery` if `text` encodes to nothing; see
/// [`NearestTokenSearch::search_normalized`] for the rest.
pub fn nearest_tokens<T: Tokenizer + ?Sized>(
    matrix: &EmbeddingMatrix,
    tokenizer: &T,
    text: &str,
    k: usize,
) -> LensResult<NearestTokens> {
    NearestTokenSearch::default().search(matrix, tokenizer, text, k)
}
