//! Adapters for Hugging Face artifacts.
//!
//! [`HfTokenizer`] wraps a `tokenizer.json` and [`SafetensorsEmbeddings`]
//! reads the input embedding tensor out of a `.safetensors` file. Only that
//! one tensor is touched; no model is built.

use std::path::{Path, PathBuf};

use safetensors::{Dtype, SafeTensors};

use crate::error::{LensResult, LoadError, TokenizerError};
use crate::matrix::EmbeddingMatrix;
use crate::tokenizer::{EmbeddingSource, TokenId, Tokenizer};

/// Tensor names tried, in order, when none is given explicitly.
pub const EMBEDDING_TENSOR_NAMES: &[&str] = &[
    "model.embed_tokens.weight",
    "embed_tokens.weight",
    "model.language_model.embed_tokens.weight",
    "transformer.wte.weight",
    "tok_embeddings.weight",
];

/// A `tokenizers::Tokenizer` loaded from `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Loads a tokenizer file.
    ///
    /// # Errors
    /// Returns `LoadError::Parse` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            tracing::error!(path = %path.display(), "tokenizer load failed: {e}");
            LoadError::Parse {
                what: format!("tokenizer {}", path.display()),
                message: e.to_string(),
            }
        })?;
        tracing::info!(
            path = %path.display(),
            vocab = inner.get_vocab_size(true),
            "loaded tokenizer"
        );
        Ok(Self { inner })
    }

    /// Wraps an already constructed tokenizer.
    #[must_use]
    pub const fn new(inner: tokenizers::Tokenizer) -> Self {
        Self { inner }
    }

    /// Vocabulary size including added tokens.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>, TokenizerError> {
        self.inner
            .encode(text, add_special_tokens)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| TokenizerError::new(e.to_string()))
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizerError> {
        self.inner
            .decode(ids, false)
            .map_err(|e| TokenizerError::new(e.to_string()))
    }
}

/// Embedding matrix stored in a `.safetensors` file.
#[derive(Debug, Clone)]
pub struct SafetensorsEmbeddings {
    path: PathBuf,
    tensor: Option<String>,
}

impl SafetensorsEmbeddings {
    /// Reads from `path`, probing [`EMBEDDING_TENSOR_NAMES`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tensor: None,
        }
    }

    /// Reads one specific tensor instead of probing.
    #[must_use]
    pub fn with_tensor(mut self, name: impl Into<String>) -> Self {
        self.tensor = Some(name.into());
        self
    }

    /// Source file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EmbeddingSource for SafetensorsEmbeddings {
    fn embeddings(&self) -> LensResult<EmbeddingMatrix> {
        let bytes = std::fs::read(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        matrix_from_safetensors(&bytes, self.tensor.as_deref(), &self.path)
    }
}

/// Extracts a 2-D embedding tensor from serialized safetensors bytes.
///
/// `name` selects the tensor; `None` probes [`EMBEDDING_TENSOR_NAMES`].
/// `origin` is only used in error messages.
///
/// # Errors
/// Parse failures, a missing tensor, a non-2-D shape, or a dtype other than
/// F32/F16/BF16.
pub fn matrix_from_safetensors(
    bytes: &[u8],
    name: Option<&str>,
    origin: &Path,
) -> LensResult<EmbeddingMatrix> {
    let tensors = SafeTensors::deserialize(bytes).map_err(|e| LoadError::Parse {
        what: format!("safetensors {}", origin.display()),
        message: e.to_string(),
    })?;

    let candidates: Vec<&str> = match name {
        Some(n) => vec![n],
        None => EMBEDDING_TENSOR_NAMES.to_vec(),
    };
    let (name, view) = candidates
        .iter()
        .find_map(|&n| tensors.tensor(n).ok().map(|v| (n, v)))
        .ok_or_else(|| LoadError::TensorMissing {
            path: origin.to_path_buf(),
            tried: candidates.join(", "),
        })?;

    let shape = view.shape();
    if shape.len() != 2 {
        return Err(LoadError::NotAMatrix {
            name: name.to_string(),
            shape: shape.to_vec(),
        }
        .into());
    }
    let (rows, dim) = (shape[0], shape[1]);

    let data = decode_values(name, view.dtype(), view.data())?;
    tracing::info!(tensor = name, rows, dim, dtype = ?view.dtype(), "loaded embedding tensor");
    Ok(EmbeddingMatrix::new(data, rows, dim)?)
}

fn decode_values(name: &str, dtype: Dtype, raw: &[u8]) -> Result<Vec<f32>, LoadError> {
    let values = match dtype {
        Dtype::F32 => raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F16 => raw
            .chunks_exact(2)
            .map(|c| half::f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        Dtype::BF16 => raw
            .chunks_exact(2)
            .map(|c| half::bf16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        other => {
            return Err(LoadError::UnsupportedDtype {
                name: name.to_string(),
                dtype: format!("{other:?}"),
            })
        }
    };
    Ok(values)
}
