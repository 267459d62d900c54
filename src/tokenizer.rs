//! Collaborator traits and an in-memory lexicon tokenizer.
//!
//! The analysis core never loads models. It talks to a tokenizer and an
//! embedding provider through the traits below, which lets tests run on tiny
//! synthetic vocabularies and lets the `hf` feature plug in real files.

use std::collections::HashMap;

use crate::error::{LensResult, TokenizerError};
use crate::matrix::EmbeddingMatrix;

/// Vocabulary id; indexes a row of the embedding matrix.
pub type TokenId = u32;

/// Text <-> token id conversion.
pub trait Tokenizer: Send + Sync {
    /// Encode `text` into ids, optionally adding the model's special tokens.
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>, TokenizerError>;

    /// Decode ids back into text, keeping special tokens.
    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizerError>;
}

/// Provider of a vocabulary's input embedding matrix.
pub trait EmbeddingSource: Send + Sync {
    /// Returns the `vocab_size x dim` embedding matrix.
    fn embeddings(&self) -> LensResult<EmbeddingMatrix>;
}

impl EmbeddingSource for EmbeddingMatrix {
    fn embeddings(&self) -> LensResult<EmbeddingMatrix> {
        Ok(self.clone())
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>, TokenizerError> {
        (**self).encode(text, add_special_tokens)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizerError> {
        (**self).decode(ids)
    }
}

/// Greedy longest-match tokenizer over a fixed list of surface strings.
///
/// Token `i` is the `i`-th string passed to [`LexiconTokenizer::new`].
/// Aliases map additional surface strings onto existing ids for encoding
/// only. Characters no entry covers are dropped. Ids without an entry decode
/// to the empty string.
#[derive(Debug, Clone, Default)]
pub struct LexiconTokenizer {
    tokens: Vec<String>,
    lookup: HashMap<String, TokenId>,
    max_chars: usize,
    bos: Option<TokenId>,
}

impl LexiconTokenizer {
    /// Creates a tokenizer whose vocabulary is `tokens`, in id order.
    ///
    /// When a string appears twice, encoding resolves to its first id.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lexicon = Self::default();
        for (token, id) in tokens.into_iter().zip(0..=TokenId::MAX) {
            let token = token.into();
            lexicon.register(token.clone(), id);
            lexicon.tokens.push(token);
        }
        lexicon
    }

    /// Adds an encode-only alias for an existing id.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, id: TokenId) -> Self {
        self.register(alias.into(), id);
        self
    }

    /// Sets a beginning-of-sequence id prepended when special tokens are requested.
    #[must_use]
    pub const fn with_bos(mut self, id: TokenId) -> Self {
        self.bos = Some(id);
        self
    }

    /// Number of vocabulary entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the vocabulary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn register(&mut self, surface: String, id: TokenId) {
        if surface.is_empty() {
            return;
        }
        self.max_chars = self.max_chars.max(surface.chars().count());
        self.lookup.entry(surface).or_insert(id);
    }
}

impl Tokenizer for LexiconTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<TokenId>, TokenizerError> {
        let mut ids = Vec::new();
        if add_special_tokens {
            ids.extend(self.bos);
        }

        // Byte offsets of every char boundary, including the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        let mut pos = 0;
        while pos + 1 < bounds.len() {
            let longest = (pos + 1..bounds.len())
                .take(self.max_chars)
                .rev()
                .find_map(|end| {
                    self.lookup
                        .get(&text[bounds[pos]..bounds[end]])
                        .map(|&id| (end, id))
                });
            match longest {
                Some((end, id)) => {
                    ids.push(id);
                    pos = end;
                }
                None => pos += 1,
            }
        }
        Ok(ids)
    }

    fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizerError> {
        Ok(ids
            .iter()
            .filter_map(|&id| self.tokens.get(usize::try_from(id).ok()?))
            .map(String::as_str)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> LexiconTokenizer {
        LexiconTokenizer::new(["a", "b", "ab", "abc", "→", " "])
    }

    #[test]
    fn encode_prefers_longest_match() {
        let tok = lexicon();
        assert_eq!(tok.encode("abcab", false).unwrap(), vec![3, 2]);
        assert_eq!(tok.encode("ba", false).unwrap(), vec![1, 0]);
    }

    #[test]
    fn encode_handles_multibyte_and_unknown_chars() {
        let tok = lexicon();
        assert_eq!(tok.encode("a→zb", false).unwrap(), vec![0, 4, 1]);
        assert!(tok.encode("", false).unwrap().is_empty());
        assert!(tok.encode("zzz", false).unwrap().is_empty());
    }

    #[test]
    fn special_tokens_prepend_bos() {
        let tok = lexicon().with_bos(5);
        assert_eq!(tok.encode("a", true).unwrap(), vec![5, 0]);
        assert_eq!(tok.encode("a", false).unwrap(), vec![0]);
    }

    #[test]
    fn aliases_encode_to_existing_ids() {
        let tok = LexiconTokenizer::new(["x", "y"]).with_alias("the", 1);
        assert_eq!(tok.encode("the", false).unwrap(), vec![1]);
        assert_eq!(tok.decode(&[1]).unwrap(), "y");
    }

    #[test]
    fn decode_concatenates_and_skips_unknown_ids() {
        let tok = lexicon();
        assert_eq!(tok.decode(&[0, 5, 1]).unwrap(), "a b");
        assert_eq!(tok.decode(&[42]).unwrap(), "");
    }

    #[test]
    fn duplicate_surface_resolves_to_first_id() {
        let tok = LexiconTokenizer::new(["q", "q"]);
        assert_eq!(tok.len(), 2);
        assert_eq!(tok.encode("q", false).unwrap(), vec![0]);
    }
}
