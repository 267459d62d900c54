//! Row-major embedding matrix.
//!
//! Row `i` holds the embedding of vocabulary id `i`. The matrix is immutable
//! once built; everything downstream derives new vectors from it.

use std::fmt;

use blake3::Hasher;

use crate::error::{AnalysisError, LensResult, ValidationError};
use crate::tokenizer::TokenId;

/// A `vocab_size x dim` matrix of `f32` embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    vocab_size: usize,
    dim: usize,
}

impl EmbeddingMatrix {
    /// Builds a matrix from flat row-major data.
    ///
    /// # Errors
    /// Returns `InvalidShape` if `data.len() != vocab_size * dim`.
    pub fn new(data: Vec<f32>, vocab_size: usize, dim: usize) -> Result<Self, ValidationError> {
        let expected = vocab_size.checked_mul(dim).ok_or_else(|| ValidationError::InvalidShape {
            rows: vocab_size,
            dim,
            expected: usize::MAX,
            actual: data.len(),
        })?;
        if data.len() != expected {
            return Err(ValidationError::InvalidShape {
                rows: vocab_size,
                dim,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            vocab_size,
            dim,
        })
    }

    /// Shape-preserving constructor for matrices derived row by row.
    pub(crate) fn from_raw_parts(data: Vec<f32>, vocab_size: usize, dim: usize) -> Self {
        debug_assert_eq!(data.len(), vocab_size * dim);
        Self {
            data,
            vocab_size,
            dim,
        }
    }

    /// Builds a matrix from a list of equally sized rows.
    ///
    /// # Errors
    /// Returns `RaggedRows` if any row differs in length from the first.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, ValidationError> {
        let dim = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(ValidationError::RaggedRows {
                    row: i,
                    actual: row.len(),
                    expected: dim,
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(data, rows.len(), dim)
    }

    /// Number of rows (vocabulary entries).
    #[must_use]
    pub const fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Embedding dimensionality.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Returns true if the matrix has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.vocab_size == 0
    }

    /// Row for `id`, or `None` if out of range.
    #[must_use]
    pub fn row(&self, id: TokenId) -> Option<&[f32]> {
        let i = usize::try_from(id).ok()?;
        if i >= self.vocab_size {
            return None;
        }
        let start = i * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// Row for `id`, failing with `TokenOutOfRange`.
    ///
    /// # Errors
    /// Returns `TokenOutOfRange` if `id >= vocab_size`.
    pub fn try_row(&self, id: TokenId) -> LensResult<&[f32]> {
        self.row(id).ok_or_else(|| {
            AnalysisError::TokenOutOfRange {
                id,
                vocab_size: self.vocab_size,
            }
            .into()
        })
    }

    /// Iterates rows in id order.
    ///
    /// Always yields `vocab_size` rows; a zero-dim matrix yields empty slices.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        let dim = self.dim;
        (0..self.vocab_size).map(move |i| &self.data[i * dim..(i + 1) * dim])
    }

    /// Arithmetic mean of the rows selected by `ids` (repeats count twice).
    ///
    /// An empty `ids` slice yields the zero vector.
    ///
    /// # Errors
    /// Returns `TokenOutOfRange` if any id has no row.
    pub fn mean_of(&self, ids: &[TokenId]) -> LensResult<Vec<f32>> {
        let mut acc = vec![0.0f64; self.dim];
        for &id in ids {
            for (a, &x) in acc.iter_mut().zip(self.try_row(id)?) {
                *a += f64::from(x);
            }
        }
        if ids.is_empty() {
            return Ok(vec![0.0; self.dim]);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = ids.len() as f64;
        #[allow(clippy::cast_possible_truncation)]
        Ok(acc.into_iter().map(|a| (a / n) as f32).collect())
    }

    /// Flat row-major view.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Stable content digest over the shape and raw values.
    ///
    /// Lets a printed ranking be tied back to the exact matrix it came from.
    #[must_use]
    pub fn fingerprint(&self) -> MatrixFingerprint {
        let mut h = Hasher::new();
        h.update(&(self.vocab_size as u64).to_le_bytes());
        h.update(&(self.dim as u64).to_le_bytes());
        for x in &self.data {
            h.update(&x.to_le_bytes());
        }
        MatrixFingerprint(*h.finalize().as_bytes())
    }
}

/// blake3 digest of an [`EmbeddingMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixFingerprint([u8; 32]);

impl MatrixFingerprint {
    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as lowercase hex, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for MatrixFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
