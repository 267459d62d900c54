//! Common-token centroid.
//!
//! Each common string is encoded without special tokens and contributes its
//! first sub-token id (or all of them, under [`CentroidStrategy::SequenceMean`]).
//! Ids are deduplicated in first-seen order, their normalized rows averaged,
//! and the mean re-normalized.

use std::collections::HashSet;

use crate::config::CentroidStrategy;
use crate::error::{AnalysisError, LensResult};
use crate::normalize::{NormalizedMatrix, UnitVector};
use crate::tokenizer::{TokenId, Tokenizer};

/// Reference vector for "ordinary language".
#[derive(Debug, Clone)]
pub struct Centroid {
    vector: UnitVector,
    representative_ids: Vec<TokenId>,
}

impl Centroid {
    /// The centroid vector.
    #[must_use]
    pub const fn vector(&self) -> &UnitVector {
        &self.vector
    }

    /// Deduplicated ids the centroid averages, in first-seen order.
    #[must_use]
    pub fn representative_ids(&self) -> &[TokenId] {
        &self.representative_ids
    }
}

/// Maps each common string to its representative id(s), deduplicated.
///
/// Strings that encode to nothing are skipped.
///
/// # Errors
/// Propagates tokenizer failures.
pub fn representative_ids<T, S>(
    strings: &[S],
    tokenizer: &T,
    strategy: CentroidStrategy,
) -> LensResult<Vec<TokenId>>
where
    T: Tokenizer + ?Sized,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for s in strings {
        let encoded = tokenizer.encode(s.as_ref(), false)?;
        let picked = match strategy {
            CentroidStrategy::FirstSubToken => &encoded[..encoded.len().min(1)],
            CentroidStrategy::SequenceMean => &encoded[..],
        };
        if picked.is_empty() {
            tracing::debug!(string = s.as_ref(), "common string encodes to no ids");
        }
        for &id in picked {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

/// Builds the common-token centroid over a normalized matrix.
///
/// # Errors
/// `EmptyCentroid` if no string yields an id, `TokenOutOfRange` if the
/// tokenizer returns an id the matrix has no row for, and tokenizer
/// failures.
pub fn build_centroid<T, S>(
    strings: &[S],
    tokenizer: &T,
    matrix: &NormalizedMatrix,
    strategy: CentroidStrategy,
) -> LensResult<Centroid>
where
    T: Tokenizer + ?Sized,
    S: AsRef<str>,
{
    let ids = representative_ids(strings, tokenizer, strategy)?;
    if ids.is_empty() {
        return Err(AnalysisError::EmptyCentroid.into());
    }

    let mean = matrix.matrix().mean_of(&ids)?;
    let vector = UnitVector::new(&mean, matrix.floor());
    tracing::debug!(ids = ids.len(), ?strategy, "built common-token centroid");

    Ok(Centroid {
        vector,
        representative_ids: ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::EmbeddingMatrix;
    use crate::tokenizer::LexiconTokenizer;

    fn vocab() -> (LexiconTokenizer, NormalizedMatrix) {
        let tok = LexiconTokenizer::new(["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"])
            .with_alias("the", 7)
            .with_alias("a", 7)
            .with_alias("xy", 2);
        let rows: Vec<Vec<f32>> = (0..8u8)
            .map(|i| vec![f32::from(i) + 1.0, 2.0, -f32::from(i)])
            .collect();
        let m = EmbeddingMatrix::from_rows(&rows).unwrap();
        (tok, NormalizedMatrix::with_default_floor(&m))
    }

    #[test]
    fn duplicate_representatives_collapse_to_one_row() {
        let (tok, n) = vocab();
        let c = build_centroid(&["the", "a"], &tok, &n, CentroidStrategy::FirstSubToken).unwrap();
        assert_eq!(c.representative_ids(), &[7]);
        for (a, b) in c.vector().as_slice().iter().zip(n.matrix().row(7).unwrap()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn first_sub_token_only_by_default() {
        let (tok, _) = vocab();
        // "t3t1" encodes to [3, 1].
        let ids = representative_ids(&["t3t1", "xy", "the"], &tok, CentroidStrategy::FirstSubToken)
            .unwrap();
        assert_eq!(ids, vec![3, 2, 7]);
    }

    #[test]
    fn sequence_mean_uses_every_sub_token() {
        let (tok, n) = vocab();
        let ids = representative_ids(&["t3t1", "t1"], &tok, CentroidStrategy::SequenceMean).unwrap();
        assert_eq!(ids, vec![3, 1]);

        let c = build_centroid(&["t3t1"], &tok, &n, CentroidStrategy::SequenceMean).unwrap();
        assert_eq!(c.representative_ids(), &[3, 1]);
        assert!(!c.vector().is_degenerate());
    }

    #[test]
    fn centroid_is_unit_norm() {
        let (tok, n) = vocab();
        let c = build_centroid(&["t0", "t5", "t7"], &tok, &n, CentroidStrategy::FirstSubToken)
            .unwrap();
        let norm = crate::normalize::l2_norm(c.vector().as_slice());
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unencodable_strings_yield_empty_centroid() {
        let (tok, n) = vocab();
        let err = build_centroid(&["???", ""], &tok, &n, CentroidStrategy::FirstSubToken).unwrap_err();
        assert!(err.is_empty_centroid());

        let none: [&str; 0] = [];
        let err = build_centroid(&none, &tok, &n, CentroidStrategy::FirstSubToken).unwrap_err();
        assert!(err.is_empty_centroid());
    }

    #[test]
    fn ids_beyond_matrix_are_reported() {
        let (_, n) = vocab();
        let tok = LexiconTokenizer::new(["t0"]).with_alias("far", 40);
        let err = build_centroid(&["far"], &tok, &n, CentroidStrategy::FirstSubToken).unwrap_err();
        assert!(err.is_analysis());
        assert!(!err.is_empty_centroid());
    }
}
