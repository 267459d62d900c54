//! Embedding normalization.
//!
//! Vectors are divided by their Euclidean norm, or by the floor when the
//! norm falls below it, so all-zero rows never divide by zero. The ranker only
//! accepts the types produced here, which keeps unnormalized input out of it.

use serde::Serialize;

use crate::config::DEFAULT_NORM_FLOOR;
use crate::matrix::EmbeddingMatrix;
use crate::tokenizer::TokenId;

/// Euclidean norm, accumulated in `f64`.
#[must_use]
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

/// Appends `v / max(norm, floor)` to `out`; returns true if the floor applied.
fn scale_into(v: &[f32], floor: f32, out: &mut Vec<f32>) -> bool {
    let norm = l2_norm(v);
    let floor = f64::from(floor);
    let degenerate = norm < floor;
    let divisor = if degenerate { floor } else { norm };
    #[allow(clippy::cast_possible_truncation)]
    out.extend(v.iter().map(|&x| (f64::from(x) / divisor) as f32));
    degenerate
}

/// A vector that went through the normalizer.
///
/// Unit norm unless [`UnitVector::is_degenerate`] is true, in which case the
/// input norm was below the floor and the values are the input scaled by
/// `1 / floor` (the zero vector stays zero).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitVector {
    values: Vec<f32>,
    degenerate: bool,
}

impl UnitVector {
    /// Normalizes `v` with the given floor.
    #[must_use]
    pub fn new(v: &[f32], floor: f32) -> Self {
        let mut values = Vec::with_capacity(v.len());
        let degenerate = scale_into(v, floor, &mut values);
        if degenerate {
            tracing::warn!(dim = v.len(), "degenerate vector: norm below floor {floor}");
        }
        Self { values, degenerate }
    }

    /// Normalizes `v` with [`DEFAULT_NORM_FLOOR`].
    #[must_use]
    pub fn with_default_floor(v: &[f32]) -> Self {
        Self::new(v, DEFAULT_NORM_FLOOR)
    }

    /// The normalized components.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Dimensionality.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// True if the input norm was below the floor.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Consumes the vector, returning its components.
    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }
}

/// Row-normalized copy of an [`EmbeddingMatrix`].
#[derive(Debug, Clone)]
pub struct NormalizedMatrix {
    matrix: EmbeddingMatrix,
    degenerate_rows: Vec<TokenId>,
    floor: f32,
}

impl NormalizedMatrix {
    /// Normalizes every row of `matrix`. The input is left untouched.
    #[must_use]
    pub fn new(matrix: &EmbeddingMatrix, floor: f32) -> Self {
        let mut data = Vec::with_capacity(matrix.as_slice().len());
        let mut degenerate_rows = Vec::new();

        for (row, id) in matrix.rows().zip(0..=TokenId::MAX) {
            if scale_into(row, floor, &mut data) {
                degenerate_rows.push(id);
            }
        }

        if !degenerate_rows.is_empty() {
            tracing::warn!(
                count = degenerate_rows.len(),
                first = degenerate_rows[0],
                "degenerate embedding rows: norm below floor {floor}"
            );
        }

        Self {
            matrix: EmbeddingMatrix::from_raw_parts(data, matrix.vocab_size(), matrix.dim()),
            degenerate_rows,
            floor,
        }
    }

    /// Normalizes with [`DEFAULT_NORM_FLOOR`].
    #[must_use]
    pub fn with_default_floor(matrix: &EmbeddingMatrix) -> Self {
        Self::new(matrix, DEFAULT_NORM_FLOOR)
    }

    /// The normalized matrix.
    #[must_use]
    pub const fn matrix(&self) -> &EmbeddingMatrix {
        &self.matrix
    }

    /// Ids whose norm fell below the floor, ascending.
    #[must_use]
    pub fn degenerate_rows(&self) -> &[TokenId] {
        &self.degenerate_rows
    }

    /// Floor used during normalization.
    #[must_use]
    pub const fn floor(&self) -> f32 {
        self.floor
    }

    /// Number of rows.
    #[must_use]
    pub const fn vocab_size(&self) -> usize {
        self.matrix.vocab_size()
    }

    /// Embedding dimensionality.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.matrix.dim()
    }
}
