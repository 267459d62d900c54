//! Typeability filter for decoded single tokens.
//!
//! A token is worth reporting when a person can type it as-is and it is not
//! an ordinary word: no whitespace, no U+FFFD, short, and not plain ASCII
//! letters/digits.

use std::fmt;

use regex::Regex;

use crate::config::{LensConfig, DEFAULT_MAX_TOKEN_CHARS};
use crate::error::ValidationError;

/// Why a token failed the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Decoded to the empty string.
    Empty,
    /// Contains whitespace.
    Whitespace,
    /// Contains the Unicode replacement character.
    ReplacementChar,
    /// Longer than the configured limit.
    TooLong,
    /// Matches the plain-token rule.
    Plain,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Whitespace => write!(f, "whitespace"),
            Self::ReplacementChar => write!(f, "replacement character"),
            Self::TooLong => write!(f, "too long"),
            Self::Plain => write!(f, "plain alphanumeric"),
        }
    }
}

/// Broad whitespace: Unicode `White_Space` plus the ASCII separators
/// U+001C..=U+001F.
fn is_space(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

fn is_plain_ascii_alnum(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Predicate selecting safe, unusual single-token strings.
#[derive(Debug, Clone)]
pub struct TypeabilityFilter {
    max_chars: usize,
    plain: Option<Regex>,
}

impl Default for TypeabilityFilter {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_TOKEN_CHARS,
            plain: None,
        }
    }
}

impl TypeabilityFilter {
    /// Builds the filter described by `config`.
    ///
    /// The plain-token pattern is anchored at both ends, so it must match the
    /// whole token.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the plain-token pattern does not compile.
    pub fn from_config(config: &LensConfig) -> Result<Self, ValidationError> {
        let plain = config
            .plain_token_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    ValidationError::InvalidConfig {
                        reason: format!("invalid plain_token_pattern '{pattern}': {e}"),
                    }
                })
            })
            .transpose()?;
        Ok(Self {
            max_chars: config.max_token_chars,
            plain,
        })
    }

    /// Maximum accepted length in chars.
    #[must_use]
    pub const fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// The first rule `s` breaks, if any.
    #[must_use]
    pub fn rejection(&self, s: &str) -> Option<Rejection> {
        if s.is_empty() {
            return Some(Rejection::Empty);
        }
        if s.chars().any(is_space) {
            return Some(Rejection::Whitespace);
        }
        if s.contains('\u{fffd}') {
            return Some(Rejection::ReplacementChar);
        }
        if s.chars().count() > self.max_chars {
            return Some(Rejection::TooLong);
        }
        let plain = match &self.plain {
            Some(re) => re.is_match(s),
            None => is_plain_ascii_alnum(s),
        };
        plain.then_some(Rejection::Plain)
    }

    /// True if `s` passes every rule.
    #[must_use]
    pub fn accepts(&self, s: &str) -> bool {
        self.rejection(s).is_none()
    }
}

/// Default-rule typeability check.
#[must_use]
pub fn typeable(s: &str) -> bool {
    TypeabilityFilter::default().accepts(s)
}
