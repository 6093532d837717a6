//! Token types and the vocabulary that numbers them.
//!
//! A [`Vocabulary`] is the registry for one grammar-construction session. It
//! hands out [`TokenType`]s with increasing indices in creation order and keeps
//! the [`TokenGroup`] partition used for alternation shorthand and for
//! readable "expected" labels. Nothing here is process-global: two
//! vocabularies never share counters.

use regex::Regex;
use std::fmt;
use thiserror::Error;

pub mod group;

pub use group::TokenGroup;

/// The identity of a terminal everywhere in a compiled table.
pub type TokenIndex = i32;

/// Index reserved for the end-of-input sentinel.
pub const EOF: TokenIndex = -1;

/// Display name of the end-of-input sentinel.
pub const EOF_NAME: &str = "EOF";

/// Errors raised while registering token types.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token's pattern is not a valid regular expression.
    #[error("invalid pattern for token '{name}': {source}")]
    InvalidPattern {
        /// Name of the offending token type.
        name: String,
        /// The underlying regex compilation failure.
        #[source]
        source: regex::Error,
    },

    /// The vocabulary ran out of terminal indices.
    #[error("too many token types (limit is {})", TokenIndex::MAX)]
    TooManyTokens,
}

/// A terminal of the grammar: a name, a matching pattern, and its index.
///
/// Immutable once created. The pattern is compiled anchored at the start of
/// the remaining input, so the lexer can try it at any offset.
#[derive(Debug, Clone)]
pub struct TokenType {
    name: String,
    pattern: String,
    index: TokenIndex,
    matcher: Regex,
}

impl TokenType {
    /// The token type's name, as it appears in CST leaves and error labels.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern source as supplied at creation time.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The terminal index assigned by the vocabulary.
    #[must_use]
    pub fn index(&self) -> TokenIndex {
        self.index
    }

    /// Returns the length in bytes of a non-empty match at the start of `input`.
    pub(crate) fn match_len(&self, input: &str) -> Option<usize> {
        self.matcher
            .find(input)
            .map(|m| m.end())
            .filter(|&len| len > 0)
    }
}

impl PartialEq for TokenType {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.name == other.name
    }
}

impl Eq for TokenType {}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// Registry of token types and token groups for one grammar.
///
/// Token indices start at 0 and increase with each [`Vocabulary::token`]
/// call. Group indices increase the same way with [`Vocabulary::group`];
/// [`Vocabulary::redefine_group`] replaces a group in place.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    tokens: Vec<TokenType>,
    groups: group::GroupRegistry,
}

impl Vocabulary {
    /// Creates an empty vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new token type with the next free index.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidPattern`] if `pattern` does not compile,
    /// or [`TokenError::TooManyTokens`] if the index space is exhausted.
    pub fn token(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<TokenType, TokenError> {
        let name = name.into();
        let pattern = pattern.into();
        let index = TokenIndex::try_from(self.tokens.len()).map_err(|_| TokenError::TooManyTokens)?;
        let matcher = Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
            TokenError::InvalidPattern {
                name: name.clone(),
                source,
            }
        })?;

        let token = TokenType {
            name,
            pattern,
            index,
            matcher,
        };
        self.tokens.push(token.clone());
        Ok(token)
    }

    /// Registers a token type whose pattern matches `literal` verbatim.
    ///
    /// # Errors
    ///
    /// Same as [`Vocabulary::token`].
    pub fn literal(
        &mut self,
        name: impl Into<String>,
        literal: &str,
    ) -> Result<TokenType, TokenError> {
        self.token(name, regex::escape(literal))
    }

    /// Creates a new group over `members` with the next free group index.
    pub fn group(&mut self, name: impl Into<String>, members: &[&TokenType]) -> TokenGroup {
        self.groups.create(name.into(), members)
    }

    /// Replaces the group at `group_index` (or creates it) with a new member set.
    ///
    /// Reverse lookups of tokens that belonged only to the old definition
    /// are purged.
    pub fn redefine_group(
        &mut self,
        group_index: usize,
        name: impl Into<String>,
        members: &[&TokenType],
    ) -> TokenGroup {
        self.groups.replace(group_index, name.into(), members)
    }

    /// All token types in creation order.
    #[must_use]
    pub fn tokens(&self) -> &[TokenType] {
        &self.tokens
    }

    /// Looks up a token type by index.
    #[must_use]
    pub fn get(&self, index: TokenIndex) -> Option<&TokenType> {
        usize::try_from(index).ok().and_then(|i| self.tokens.get(i))
    }

    /// The name of the terminal at `index`, including the end-of-input sentinel.
    #[must_use]
    pub fn name_of(&self, index: TokenIndex) -> Option<&str> {
        if index == EOF {
            return Some(EOF_NAME);
        }
        self.get(index).map(TokenType::name)
    }

    /// All current groups, ordered by group index.
    #[must_use]
    pub fn groups(&self) -> Vec<TokenGroup> {
        self.groups.iter().cloned().collect()
    }

    /// The group a token belongs to, if any.
    #[must_use]
    pub fn group_of(&self, index: TokenIndex) -> Option<&TokenGroup> {
        self.groups.group_of(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_creation_order() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let b = vocab.token("B", "b").unwrap();
        let c = vocab.literal("Plus", "+").unwrap();

        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));
        assert_eq!(vocab.name_of(1), Some("B"));
        assert_eq!(vocab.name_of(EOF), Some(EOF_NAME));
        assert_eq!(vocab.name_of(7), None);
    }

    #[test]
    fn test_separate_vocabularies_do_not_share_counters() {
        let mut first = Vocabulary::new();
        let mut second = Vocabulary::new();
        first.token("A", "a").unwrap();
        first.token("B", "b").unwrap();

        assert_eq!(second.token("C", "c").unwrap().index(), 0);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let mut vocab = Vocabulary::new();
        let err = vocab.token("Broken", "(").unwrap_err();
        assert!(matches!(err, TokenError::InvalidPattern { ref name, .. } if name == "Broken"));
        assert!(vocab.tokens().is_empty());
    }

    #[test]
    fn test_match_is_anchored_and_non_empty() {
        let mut vocab = Vocabulary::new();
        let digits = vocab.token("Digits", r"\d*").unwrap();

        assert_eq!(digits.match_len("123abc"), Some(3));
        assert_eq!(digits.match_len("abc123"), None);
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let mut vocab = Vocabulary::new();
        let star = vocab.literal("Star", "*").unwrap();
        assert_eq!(star.match_len("*x"), Some(1));
        assert_eq!(star.match_len("x*"), None);
    }
}
