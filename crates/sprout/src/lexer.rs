//! First-match tokenizer over a vocabulary's token types.
//!
//! At each offset the lexer tries the token patterns in the order they were
//! supplied and commits to the first one that matches. This is not
//! longest-match: keywords must be listed before the identifier pattern that
//! would also accept them.

use crate::token::{TokenGroup, TokenIndex, TokenType, EOF, EOF_NAME};
use std::collections::HashSet;
use thiserror::Error;

/// A positioned token produced by the lexer.
///
/// Lines and columns are 1-based; offsets are byte offsets into the input.
/// The end column and end offset are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The matched text.
    pub image: String,
    /// Name of the token type.
    pub name: String,
    /// Index of the token type ([`EOF`] for the sentinel).
    pub kind: TokenIndex,
    /// Line of the first character.
    pub line: usize,
    /// Column of the first character.
    pub start_column: usize,
    /// Column of the last character.
    pub end_column: usize,
    /// Offset of the first byte.
    pub start_offset: usize,
    /// Offset of the last byte.
    pub end_offset: usize,
}

impl Token {
    /// Returns `true` for the end-of-input sentinel.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == EOF
    }
}

/// An unmatched character. Tokenization stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct LexError {
    /// Human-readable description.
    pub message: String,
    /// Line of the offending character.
    pub line: usize,
    /// Column of the offending character.
    pub column: usize,
    /// Byte offset of the offending character.
    pub offset: usize,
}

/// Output of [`Lexer::tokenize`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LexingResult {
    /// Tokens in source order. Ends with the sentinel unless an error occurred.
    pub tokens: Vec<Token>,
    /// At most one lexical error.
    pub errors: Vec<LexError>,
    /// The token groups known to the lexer, for downstream labelling.
    pub groups: Vec<TokenGroup>,
}

/// Tokenizer configured with an ordered token list and a skip set.
#[derive(Debug, Clone)]
pub struct Lexer {
    token_types: Vec<TokenType>,
    skip: HashSet<TokenIndex>,
    groups: Vec<TokenGroup>,
}

impl Lexer {
    /// Creates a lexer that tries `token_types` in the given order.
    #[must_use]
    pub fn new(token_types: &[TokenType]) -> Self {
        Self {
            token_types: token_types.to_vec(),
            skip: HashSet::new(),
            groups: Vec::new(),
        }
    }

    /// Adds a token type whose matches advance the scan but are not emitted.
    #[must_use]
    pub fn skip(mut self, token_type: &TokenType) -> Self {
        self.skip.insert(token_type.index());
        self
    }

    /// Sets the groups reported alongside the tokens.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<TokenGroup>) -> Self {
        self.groups = groups;
        self
    }

    /// Splits `text` into tokens.
    ///
    /// On success the last token is the end-of-input sentinel. On the first
    /// unmatched character a [`LexError`] is recorded and scanning stops; the
    /// partial token list is returned without a sentinel.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> LexingResult {
        let lines = LineIndex::new(text);
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            let matched = self
                .token_types
                .iter()
                .find_map(|tt| tt.match_len(rest).map(|len| (tt, len)));

            let Some((token_type, len)) = matched else {
                let (line, column) = lines.position(pos);
                let ch = rest.chars().next().unwrap_or_default();
                errors.push(LexError {
                    message: format!("Unexpected character '{ch}'"),
                    line,
                    column,
                    offset: pos,
                });
                log::debug!("lexing stopped at offset {pos}");
                break;
            };

            if !self.skip.contains(&token_type.index()) {
                let end = pos + len - 1;
                let (line, start_column) = lines.position(pos);
                let (_, end_column) = lines.position(end);
                tokens.push(Token {
                    image: rest[..len].to_string(),
                    name: token_type.name().to_string(),
                    kind: token_type.index(),
                    line,
                    start_column,
                    end_column,
                    start_offset: pos,
                    end_offset: end,
                });
            }
            pos += len;
        }

        if errors.is_empty() {
            let (line, column) = lines.position(text.len());
            tokens.push(Token {
                image: String::new(),
                name: EOF_NAME.to_string(),
                kind: EOF,
                line,
                start_column: column,
                end_column: column,
                start_offset: text.len(),
                end_offset: text.len(),
            });
        }

        LexingResult {
            tokens,
            errors,
            groups: self.groups.clone(),
        }
    }
}

/// Sorted newline offsets of one input, for offset-to-position lookups.
struct LineIndex {
    breaks: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        Self {
            breaks: text
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| (b == b'\n').then_some(i))
                .collect(),
        }
    }

    /// 1-based `(line, column)` of a byte offset.
    fn position(&self, offset: usize) -> (usize, usize) {
        let before = self.breaks.partition_point(|&nl| nl < offset);
        let column = match before {
            0 => offset + 1,
            n => offset - self.breaks[n - 1],
        };
        (before + 1, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Vocabulary;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    struct Fixture {
        lexer: Lexer,
    }

    fn fixture() -> Fixture {
        let mut vocab = Vocabulary::new();
        let let_kw = vocab.token("Let", "let").unwrap();
        let ident = vocab.token("Identifier", r"[a-zA-Z_]\w*").unwrap();
        let number = vocab.token("NumberLiteral", r"\d+").unwrap();
        let ws = vocab.token("WhiteSpace", r"\s+").unwrap();
        let lexer = Lexer::new(&[let_kw, number, ws.clone(), ident]).skip(&ws);
        Fixture { lexer }
    }

    fn names(result: &LexingResult) -> Vec<&str> {
        result.tokens.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_tokenize_let_statement() {
        let result = fixture().lexer.tokenize("let test");
        assert!(result.errors.is_empty());
        assert_eq!(names(&result), vec!["Let", "Identifier", "EOF"]);

        let ident = &result.tokens[1];
        assert_eq!(ident.image, "test");
        assert_eq!((ident.start_offset, ident.end_offset), (4, 7));
        assert_eq!((ident.start_column, ident.end_column), (5, 8));
    }

    #[test]
    fn test_positions_across_newlines() {
        let result = fixture().lexer.tokenize("let    myVar\n42");
        let number = &result.tokens[2];
        assert_eq!(number.image, "42");
        assert_eq!(number.line, 2);
        assert_eq!((number.start_column, number.end_column), (1, 2));
        assert_eq!(number.start_offset, 13);

        let eof = result.tokens.last().unwrap();
        assert!(eof.is_eof());
        assert_eq!((eof.line, eof.start_column, eof.start_offset), (2, 3, 15));
    }

    #[test]
    fn test_first_match_wins_over_longest() {
        let result = fixture().lexer.tokenize("letter");
        let images: Vec<_> = result.tokens.iter().map(|t| t.image.as_str()).collect();
        assert_eq!(images, vec!["let", "ter", ""]);
    }

    #[test]
    fn test_invalid_character_stops_scanning() {
        let result = fixture().lexer.tokenize("let ~ more");
        assert_eq!(names(&result), vec!["Let"]);
        assert_eq!(
            result.errors,
            vec![LexError {
                message: "Unexpected character '~'".to_string(),
                line: 1,
                column: 5,
                offset: 4,
            }]
        );
    }

    #[test]
    fn test_groups_are_reported() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        vocab.group("Letters", &[&a]);
        let result = Lexer::new(vocab.tokens())
            .with_groups(vocab.groups())
            .tokenize("aa");
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.tokens.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_valid_input_ends_with_single_sentinel(words in prop::collection::vec("[a-z]{1,6}|[0-9]{1,4}", 0..8)) {
            let text = words.join(" ");
            let result = fixture().lexer.tokenize(&text);
            prop_assert!(result.errors.is_empty());
            prop_assert_eq!(result.tokens.iter().filter(|t| t.is_eof()).count(), 1);
            prop_assert!(result.tokens.last().unwrap().is_eof());
        }

        #[test]
        fn prop_one_illegal_character_yields_one_error(prefix in "[a-z ]{0,10}", suffix in "[a-z ]{0,10}") {
            let text = format!("{prefix}#{suffix}");
            let result = fixture().lexer.tokenize(&text);
            prop_assert_eq!(result.errors.len(), 1);
            prop_assert_eq!(result.errors[0].offset, prefix.len());
            prop_assert!(result.tokens.iter().all(|t| !t.is_eof()));
        }
    }

    #[test]
    fn test_empty_input_is_just_the_sentinel() {
        let result = fixture().lexer.tokenize("");
        assert!(result.errors.is_empty());
        assert_eq!(names(&result), vec!["EOF"]);
    }
}
