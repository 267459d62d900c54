//! Rare-token discovery.
//!
//! Every vocabulary id is scored against the common-token centroid. Ids whose
//! decoded text is typeable and re-encodes to exactly that id are kept and
//! sorted ascending, so the tokens furthest from ordinary language come first.
//! Ids whose similarity is non-finite are never candidates; they are only
//! counted.

use serde::Serialize;

use crate::centroid::build_centroid;
use crate::config::LensConfig;
use crate::error::{LensResult, ValidationError};
use crate::matrix::EmbeddingMatrix;
use crate::normalize::NormalizedMatrix;
use crate::similarity::SimilarityScores;
use crate::tokenizer::{TokenId, Tokenizer};
use crate::typeable::TypeabilityFilter;

/// A surviving rare-token candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Cosine similarity to the common-token centroid.
    pub similarity: f32,
    /// Vocabulary id.
    pub id: TokenId,
    /// Decoded surface string.
    pub token: String,
}

/// Candidates plus the diagnostics gathered while producing them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RareTokenReport {
    /// Up to `n` candidates, ascending by similarity.
    pub candidates: Vec<Candidate>,
    /// Ids the centroid was averaged from.
    pub centroid_ids: Vec<TokenId>,
    /// Ids dropped because their similarity was non-finite.
    pub non_finite: usize,
    /// Ids dropped by the typeability filter.
    pub rejected_untypeable: usize,
    /// Ids whose decoded text does not re-encode to the same single id.
    pub rejected_non_canonical: usize,
}

/// True if `surface` encodes (without special tokens) to exactly `[id]`.
///
/// Tokens that fail this decode to text the tokenizer would spell
/// differently, so typing the text would not reproduce the token.
///
/// # Errors
/// Propagates tokenizer failures.
pub fn is_canonical<T: Tokenizer + ?Sized>(
    tokenizer: &T,
    id: TokenId,
    surface: &str,
) -> LensResult<bool> {
    let encoded = tokenizer.encode(surface, false)?;
    Ok(encoded.as_slice() == [id])
}

/// Configured rare-token search.
#[derive(Debug, Clone, Default)]
pub struct RareTokenFinder {
    config: LensConfig,
    filter: TypeabilityFilter,
}

impl RareTokenFinder {
    /// Creates a finder from a validated configuration.
    ///
    /// # Errors
    /// Returns the configuration's validation error.
    pub fn new(config: LensConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let filter = TypeabilityFilter::from_config(&config)?;
        Ok(Self { config, filter })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &LensConfig {
        &self.config
    }

    /// Runs the search over an already normalized matrix.
    ///
    /// # Errors
    /// `EmptyCentroid` if the common-string set yields no ids, plus
    /// tokenizer and range failures.
    pub fn run<T: Tokenizer + ?Sized>(
        &self,
        matrix: &NormalizedMatrix,
        tokenizer: &T,
        n: usize,
    ) -> LensResult<RareTokenReport> {
        let centroid = build_centroid(
            self.config.common_strings.as_slice(),
            tokenizer,
            matrix,
            self.config.centroid_strategy,
        )?;
        let sims = SimilarityScores::compute(matrix, centroid.vector(), self.config.sentinel)?;

        let mut candidates = Vec::new();
        let mut rejected_untypeable = 0usize;
        let mut rejected_non_canonical = 0usize;

        for (id, &similarity) in (0..=TokenId::MAX).zip(sims.as_slice()) {
            // A sentinel score would sort first in ascending order.
            if sims.is_substituted(id) {
                continue;
            }
            let token = tokenizer.decode(&[id])?;
            if let Some(reason) = self.filter.rejection(&token) {
                tracing::trace!(id, %reason, "token not typeable");
                rejected_untypeable += 1;
                continue;
            }
            if !is_canonical(tokenizer, id, &token)? {
                tracing::debug!(id, token = %token.escape_debug(), "token does not round-trip");
                rejected_non_canonical += 1;
                continue;
            }
            candidates.push(Candidate {
                similarity,
                id,
                token,
            });
        }

        // Stable sort: equal similarities stay in id order.
        candidates.sort_by(|a, b| a.similarity.total_cmp(&b.similarity));
        candidates.truncate(n);

        tracing::debug!(
            kept = candidates.len(),
            rejected_untypeable,
            rejected_non_canonical,
            "rare-token search finished"
        );

        Ok(RareTokenReport {
            candidates,
            centroid_ids: centroid.representative_ids().to_vec(),
            non_finite: sims.non_finite(),
            rejected_untypeable,
            rejected_non_canonical,
        })
    }

    /// Normalizes `matrix` with the configured floor, then runs the search.
    ///
    /// # Errors
    /// See [`RareTokenFinder::run`].
    pub fn run_on_embeddings<T: Tokenizer + ?Sized>(
        &self,
        matrix: &EmbeddingMatrix,
        tokenizer: &T,
        n: usize,
    ) -> LensResult<RareTokenReport> {
        let normalized = NormalizedMatrix::new(matrix, self.config.norm_floor);
        self.run(&normalized, tokenizer, n)
    }
}

/// Up to `n` rare, typeable, canonical tokens, ascending by similarity to
/// the default common-token centroid.
///
/// # Errors
/// See [`RareTokenFinder::run`].
pub fn find_rare_tokens<T: Tokenizer + ?Sized>(
    matrix: &NormalizedMatrix,
    tokenizer: &T,
    n: usize,
) -> LensResult<Vec<Candidate>> {
    Ok(RareTokenFinder::default().run(matrix, tokenizer, n)?.candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::LexiconTokenizer;
    use crate::typeable::typeable;

    // Ids 0..=3 are common words clustered near +x. The rest are symbols
    // spread around the circle, plus a few traps for the filters.
    fn fixture() -> (LexiconTokenizer, NormalizedMatrix) {
        let tokens = [
            "the", ",", "of", "and", // 0..=3 common
            "@@", "→", "~~", "§", // 4..=7 symbols
            "word", "a b", "", // 8..=10 filter traps
            "@", "@@@", // 11, 12 symbols
            "\u{fffd}", // 13 trap
        ];
        let rows: Vec<[f32; 2]> = vec![
            [1.0, 0.05],
            [0.98, 0.1],
            [0.99, -0.05],
            [1.0, 0.0],
            [-1.0, 0.0],
            [0.0, 1.0],
            [-0.7, -0.7],
            [0.5, 0.5],
            [-1.0, 0.1],
            [-1.0, -0.1],
            [-1.0, 0.2],
            [0.3, -0.9],
            [-0.9, 0.3],
            [-1.0, 0.0],
        ];
        let tok = LexiconTokenizer::new(tokens);
        let m = EmbeddingMatrix::from_rows(&rows).unwrap();
        (tok, NormalizedMatrix::with_default_floor(&m))
    }

    fn finder() -> RareTokenFinder {
        RareTokenFinder::new(LensConfig::default().with_common_strings(["the", ",", "of", "and"]))
            .unwrap()
    }

    #[test]
    fn candidates_are_sorted_ascending_and_bounded() {
        let (tok, n) = fixture();
        let report = finder().run(&n, &tok, 3).unwrap();

        assert_eq!(report.candidates.len(), 3);
        assert!(report
            .candidates
            .windows(2)
            .all(|w| w[0].similarity <= w[1].similarity));
        assert_eq!(report.candidates[0].token, "@@");
        assert_eq!(report.centroid_ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn every_candidate_is_typeable_and_canonical() {
        let (tok, n) = fixture();
        let report = finder().run(&n, &tok, 100).unwrap();

        for c in &report.candidates {
            assert!(typeable(&c.token), "{:?} should be typeable", c.token);
            assert!(is_canonical(&tok, c.id, &c.token).unwrap());
        }
        let ids: Vec<TokenId> = report.candidates.iter().map(|c| c.id).collect();
        for trap in [0, 8, 9, 10, 13] {
            assert!(!ids.contains(&trap), "id {trap} should be filtered");
        }
        assert_eq!(report.non_finite, 0);
    }

    #[test]
    fn non_canonical_tokens_are_dropped() {
        // "<" decodes from id 1 but encodes to id 0 ("<" is listed first).
        let tok = LexiconTokenizer::new(["<", "<", ">"]);
        let m = EmbeddingMatrix::from_rows(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]).unwrap();
        let n = NormalizedMatrix::with_default_floor(&m);
        let finder = RareTokenFinder::new(LensConfig::default().with_common_strings(["<"])).unwrap();

        let report = finder.run(&n, &tok, 10).unwrap();
        let ids: Vec<TokenId> = report.candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 0]);
        assert_eq!(report.rejected_non_canonical, 1);
    }

    #[test]
    fn non_finite_rows_are_counted_not_ranked() {
        let tok = LexiconTokenizer::new(["the", "@@", "§", "~~"]);
        let m = EmbeddingMatrix::from_rows(&[[1.0, 0.0], [-1.0, 0.0], [f32::NAN, 1.0], [0.0, 1.0]])
            .unwrap();
        let n = NormalizedMatrix::with_default_floor(&m);
        let finder = RareTokenFinder::new(LensConfig::default().with_common_strings(["the"])).unwrap();

        let report = finder.run(&n, &tok, 3).unwrap();
        let ids: Vec<TokenId> = report.candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(report.non_finite, 1);
        assert!(report.candidates.iter().all(|c| c.similarity.is_finite()));
        assert!(report.candidates.iter().all(|c| c.similarity > -1.5));
    }

    #[test]
    fn empty_common_set_signals_empty_centroid() {
        let (tok, n) = fixture();
        let finder =
            RareTokenFinder::new(LensConfig::default().with_common_strings(["zzz", "qqq"])).unwrap();
        let err = finder.run(&n, &tok, 5).unwrap_err();
        assert!(err.is_empty_centroid());
    }

    #[test]
    fn find_rare_tokens_uses_default_common_strings() {
        let (tok, n) = fixture();
        let out = find_rare_tokens(&n, &tok, 2).unwrap();
        assert!(out.len() <= 2);
        assert!(out.windows(2).all(|w| w[0].similarity <= w[1].similarity));
    }

    #[test]
    fn zero_n_returns_nothing() {
        let (tok, n) = fixture();
        assert!(finder().run(&n, &tok, 0).unwrap().candidates.is_empty());
    }

    #[test]
    fn run_on_embeddings_normalizes_first() {
        let tok = LexiconTokenizer::new(["the", "@@"]);
        let m = EmbeddingMatrix::from_rows(&[[10.0, 0.0], [0.0, -4.0]]).unwrap();
        let finder = RareTokenFinder::new(LensConfig::default().with_common_strings(["the"])).unwrap();

        let report = finder.run_on_embeddings(&m, &tok, 5).unwrap();
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].id, 1);
        assert!(report.candidates[0].similarity.abs() < 1e-6);
    }
}
