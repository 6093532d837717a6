//! An LR(1) grammar compiler and table-driven CST parser.
//!
//! Grammars are described with a builder DSL over a [`Vocabulary`] of token
//! types, compiled once into a serializable [`Table`], and run by a
//! [`Parser`] over the tokens produced by a [`Lexer`].
//!
//! ```
//! use sprout::{Grammar, Lexer, Parser, Table, Vocabulary};
//!
//! let mut vocab = Vocabulary::new();
//! let let_kw = vocab.token("Let", "let")?;
//! let ident = vocab.token("Identifier", "[a-z]+")?;
//! let ws = vocab.token("Whitespace", r"\s+")?;
//!
//! let mut grammar = Grammar::new();
//! let main = grammar.rule("Main", |r| {
//!     r.consume(&let_kw).consume(&ident);
//! })?;
//! let table = Table::build(&vocab, &grammar, main)?;
//!
//! let lexer = Lexer::new(&[let_kw, ident, ws.clone()]).skip(&ws);
//! let result = Parser::new(&table).parse(&lexer.tokenize("let test").tokens)?;
//! assert_eq!(result.cst.map(|cst| cst.children().len()), Some(2));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::multiple_crate_versions)]

/// Token types, token groups, and the vocabulary that numbers them.
pub mod token;

/// Turning text into positioned tokens.
pub mod lexer;

/// The grammar builder and the production compiler.
///
/// Everything downstream consumes the flat production list built here, so
/// symbol numbering and the synthetic repetition nonterminals are fixed at
/// this stage.
pub mod grammar;

/// Grammar validation and consistency checking utilities.
///
/// Validation protects the compiler from grammars whose productions could
/// never make progress, and reports suspicious but legal shapes through the
/// `log` facade.
pub mod validate;

/// FIRST sets, item closures, and the canonical LR(1) collection.
pub mod automaton;

/// The compiled, serializable action/goto table.
pub mod table;

/// The shift/reduce engine and its CST.
pub mod parser;

/// Folding a finished CST into caller values.
pub mod visitor;

/// Next-token suggestions for editors.
pub mod complete;

pub use complete::{CompleteError, Completer};
pub use grammar::{compile, Grammar, GrammarError, RuleBuilder, RuleId, Symbol};
pub use lexer::{LexError, Lexer, LexingResult, Token};
pub use parser::{Cst, ParseError, ParseResult, Parser, Suggestion, SyntaxError};
pub use table::{Action, Table, TableError};
pub use token::{TokenError, TokenGroup, TokenIndex, TokenType, Vocabulary};
pub use validate::{validate, ValidationError};
pub use visitor::{VisitError, Visitor};
