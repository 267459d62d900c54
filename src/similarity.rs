//! Cosine similarity ranking.
//!
//! Rows of a [`NormalizedMatrix`] and a [`UnitVector`] are already unit norm,
//! so the dot product is the cosine similarity. Non-finite scores (NaN or
//! infinite embeddings upstream) are replaced by a sentinel and counted
//! instead of failing the run.

use std::cmp::Ordering;

use crate::error::ValidationError;
use crate::normalize::{l2_norm, NormalizedMatrix, UnitVector};
use crate::tokenizer::TokenId;

/// Dot product, accumulated in `f64`.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    #[allow(clippy::cast_possible_truncation)]
    let sum = sum as f32;
    sum
}

/// Cosine similarity of two arbitrary vectors. Zero if either is zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= 0.0 {
        return 0.0;
    }
    let num: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    #[allow(clippy::cast_possible_truncation)]
    let sim = (num / denom) as f32;
    sim
}

/// Descending by score, ascending by id on ties.
fn by_score_desc(a: &(TokenId, f32), b: &(TokenId, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// One similarity per vocabulary row plus the ids whose score was replaced
/// by the sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityScores {
    scores: Vec<f32>,
    substituted: Vec<TokenId>,
}

impl SimilarityScores {
    /// Scores every row of `matrix` against `reference`.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if the reference has a different dimension
    /// than the matrix rows.
    pub fn compute(
        matrix: &NormalizedMatrix,
        reference: &UnitVector,
        sentinel: f32,
    ) -> Result<Self, ValidationError> {
        if reference.dim() != matrix.dim() {
            return Err(ValidationError::DimensionMismatch {
                actual: reference.dim(),
                expected: matrix.dim(),
            });
        }
        if reference.is_degenerate() {
            tracing::warn!("ranking against a degenerate reference vector; all scores will be ~0");
        }

        let r = reference.as_slice();
        let mut substituted = Vec::new();
        let scores = matrix
            .matrix()
            .rows()
            .zip(0..=TokenId::MAX)
            .map(|(row, id)| {
                let s = dot(row, r);
                if s.is_finite() {
                    s
                } else {
                    substituted.push(id);
                    sentinel
                }
            })
            .collect();

        if !substituted.is_empty() {
            tracing::warn!(
                count = substituted.len(),
                first = substituted[0],
                sentinel,
                "non-finite similarities replaced"
            );
        }
        Ok(Self {
            scores,
            substituted,
        })
    }

    /// Scores in id order.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.scores
    }

    /// Score of one id.
    #[must_use]
    pub fn get(&self, id: TokenId) -> Option<f32> {
        self.scores.get(usize::try_from(id).ok()?).copied()
    }

    /// How many scores were non-finite and replaced by the sentinel.
    #[must_use]
    pub fn non_finite(&self) -> usize {
        self.substituted.len()
    }

    /// Ids whose score was replaced by the sentinel, ascending.
    #[must_use]
    pub fn substituted(&self) -> &[TokenId] {
        &self.substituted
    }

    /// True if `id`'s score is the sentinel standing in for a non-finite value.
    #[must_use]
    pub fn is_substituted(&self, id: TokenId) -> bool {
        self.substituted.binary_search(&id).is_ok()
    }

    /// Number of scores (equals the vocabulary size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true if there are no scores.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The `k` highest-scoring ids, descending; ties go to the lower id.
    /// `k` is clamped to the vocabulary size.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(TokenId, f32)> {
        let mut scored: Vec<(TokenId, f32)> = (0..=TokenId::MAX)
            .zip(self.scores.iter().copied())
            .collect();
        let k = k.min(scored.len());
        if k == 0 {
            return Vec::new();
        }
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_score_desc);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_score_desc);
        scored
    }
}
