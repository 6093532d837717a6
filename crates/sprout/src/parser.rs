//! Table-driven shift/reduce parsing into a concrete syntax tree.
//!
//! The engine keeps a state stack and a node stack. Syntax errors are
//! recorded and the cursor skips ahead to the next token the current state
//! can act on, so a single run reports every error it meets. Nodes of the
//! synthetic `MANY_<n>` nonterminals are spliced into their parents before
//! the tree is returned.

use crate::grammar::is_repetition;
use crate::lexer::Token;
use crate::table::{Action, Table};
use crate::token::TokenIndex;
use thiserror::Error;

/// A token leaf of the CST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenNode {
    /// Name of the token type.
    pub name: String,
    /// The matched text.
    pub image: String,
    /// Index of the token type.
    pub kind: TokenIndex,
    /// Line of the first character.
    pub line: usize,
    /// Column of the first character.
    pub start_column: usize,
    /// Column of the last character (inclusive).
    pub end_column: usize,
    /// Offset of the first byte.
    pub start_offset: usize,
    /// Offset of the last byte (inclusive).
    pub end_offset: usize,
}

impl From<&Token> for TokenNode {
    fn from(token: &Token) -> Self {
        Self {
            name: token.name.clone(),
            image: token.image.clone(),
            kind: token.kind,
            line: token.line,
            start_column: token.start_column,
            end_column: token.end_column,
            start_offset: token.start_offset,
            end_offset: token.end_offset,
        }
    }
}

/// An internal CST node, labelled by the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The rule name.
    pub name: String,
    /// Children in source order.
    pub children: Vec<Cst>,
}

/// A concrete syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cst {
    /// A matched token.
    Token(TokenNode),
    /// A reduced rule.
    Node(Node),
}

impl Cst {
    /// The rule name or token type name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Cst::Token(leaf) => &leaf.name,
            Cst::Node(node) => &node.name,
        }
    }

    /// Children of an internal node; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Cst] {
        match self {
            Cst::Token(_) => &[],
            Cst::Node(node) => &node.children,
        }
    }
}

/// A token the parser had no action for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected '{found}' at line {line}, column {start_column}; expected one of: {}", .expected.join(", "))]
pub struct SyntaxError {
    /// The image of the offending token.
    pub found: String,
    /// Line of the offending token.
    pub line: usize,
    /// First column of the offending token.
    pub start_column: usize,
    /// Last column of the offending token.
    pub end_column: usize,
    /// Legal labels, with grouped tokens collapsed to their group name.
    pub expected: Vec<String>,
    /// Every legal token name.
    pub expected_all_tokens: Vec<String>,
}

/// Output of [`Parser::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    /// The tree, or the first partial subtree if the input was not accepted.
    pub cst: Option<Cst>,
    /// Every syntax error met during the run.
    pub errors: Vec<SyntaxError>,
    /// The state stack when parsing stopped.
    pub state_stack: Vec<usize>,
}

/// Output of [`Parser::suggest`]: where the input stops being a valid prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// The state the parser was in.
    pub state: usize,
    /// Legal labels in that state.
    pub expected: Vec<String>,
    /// Every legal token name in that state.
    pub expected_all_tokens: Vec<String>,
    /// Index of the first token that was not consumed.
    pub index: usize,
}

/// Failures that indicate a misuse of the parser or an inconsistent table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The token list ended before the parse finished. Token lists for
    /// [`Parser::parse`] must end with the `EOF` sentinel.
    #[error("ran out of input at token {index} of {len}")]
    InputExhausted {
        /// The cursor position.
        index: usize,
        /// Number of tokens supplied.
        len: usize,
    },

    /// A reduce led to a state with no goto for the reduced nonterminal.
    #[error("no goto from state {state} on '{head}'")]
    MissingGoto {
        /// The state uncovered by the reduce.
        state: usize,
        /// The reduced nonterminal.
        head: String,
    },

    /// A reduce popped more entries than the stacks hold.
    #[error("stack underflow reducing production {0}")]
    StackUnderflow(usize),

    /// The table names a production it does not contain.
    #[error("unknown production {0}")]
    UnknownProduction(usize),

    /// A production head has no nonterminal index in the table.
    #[error("unknown nonterminal '{0}'")]
    UnknownNonterminal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Parse,
    Suggest,
}

enum Outcome {
    Parsed(ParseResult),
    Suggested(Suggestion),
}

/// A parser over a compiled [`Table`].
///
/// The parser holds no per-run state; one instance can serve any number of
/// parses, including concurrent ones.
#[derive(Debug, Clone)]
pub struct Parser<'t> {
    table: &'t Table,
    heads: Vec<Option<usize>>,
}

impl<'t> Parser<'t> {
    /// Creates a parser for `table`.
    #[must_use]
    pub fn new(table: &'t Table) -> Self {
        let heads = table
            .productions
            .iter()
            .map(|production| table.nonterminal_index(&production.head))
            .collect();
        Self { table, heads }
    }

    /// The table driving this parser.
    #[must_use]
    pub fn table(&self) -> &'t Table {
        self.table
    }

    /// Parses `tokens`, which must end with the `EOF` sentinel.
    ///
    /// Syntax errors are recovered from and reported in the result.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InputExhausted`] if the tokens run out before
    /// the parse finishes, or another [`ParseError`] if the table is
    /// inconsistent.
    pub fn parse(&self, tokens: &[Token]) -> Result<ParseResult, ParseError> {
        match self.run(tokens, Mode::Parse)? {
            Outcome::Parsed(result) => Ok(result),
            Outcome::Suggested(suggestion) => Err(ParseError::InputExhausted {
                index: suggestion.index,
                len: tokens.len(),
            }),
        }
    }

    /// Runs `tokens` (minus a trailing `EOF`) until the parser gets stuck or
    /// the input runs out, and reports what it would accept at that point.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the table is inconsistent.
    pub fn suggest(&self, tokens: &[Token]) -> Result<Suggestion, ParseError> {
        let tokens = match tokens.split_last() {
            Some((last, rest)) if last.is_eof() => rest,
            _ => tokens,
        };
        match self.run(tokens, Mode::Suggest)? {
            Outcome::Suggested(suggestion) => Ok(suggestion),
            Outcome::Parsed(result) => {
                let state = result.state_stack.last().copied().unwrap_or(0);
                Ok(self.suggestion(state, tokens.len()))
            }
        }
    }

    fn run(&self, tokens: &[Token], mode: Mode) -> Result<Outcome, ParseError> {
        let mut states: Vec<usize> = vec![0];
        let mut nodes: Vec<Cst> = Vec::new();
        let mut errors: Vec<SyntaxError> = Vec::new();
        let mut index = 0;

        loop {
            let state = *states.last().ok_or(ParseError::StackUnderflow(0))?;

            let Some(token) = tokens.get(index) else {
                return match mode {
                    Mode::Suggest => Ok(Outcome::Suggested(self.suggestion(state, index))),
                    Mode::Parse => Err(ParseError::InputExhausted {
                        index,
                        len: tokens.len(),
                    }),
                };
            };

            let Some(action) = self.table.action(state, token.kind) else {
                if mode == Mode::Suggest {
                    return Ok(Outcome::Suggested(self.suggestion(state, index)));
                }
                log::trace!("state {state}: no action on {} '{}'", token.name, token.image);
                errors.push(self.syntax_error(state, token));

                if token.is_eof() {
                    return Ok(Outcome::Parsed(finish(nodes, errors, states)));
                }
                // panic mode: skip to the next token this state can act on
                match tokens[index + 1..]
                    .iter()
                    .position(|next| self.table.action(state, next.kind).is_some())
                {
                    Some(skipped) => index += skipped + 1,
                    None => return Ok(Outcome::Parsed(finish(nodes, errors, states))),
                }
                continue;
            };

            log::trace!("state {state}, token {} '{}': {action:?}", token.name, token.image);
            match action {
                Action::Shift(target) => {
                    nodes.push(Cst::Token(TokenNode::from(token)));
                    states.push(target);
                    index += 1;
                }
                Action::Reduce(production) => {
                    self.reduce(production, &mut states, &mut nodes)?;
                }
                Action::Accept => {
                    return Ok(match mode {
                        Mode::Parse => Outcome::Parsed(finish(nodes, errors, states)),
                        Mode::Suggest => Outcome::Suggested(self.suggestion(state, index)),
                    });
                }
            }
        }
    }

    fn reduce(
        &self,
        production: usize,
        states: &mut Vec<usize>,
        nodes: &mut Vec<Cst>,
    ) -> Result<(), ParseError> {
        let rule = self
            .table
            .productions
            .get(production)
            .ok_or(ParseError::UnknownProduction(production))?;
        let head = self
            .heads
            .get(production)
            .copied()
            .flatten()
            .ok_or_else(|| ParseError::UnknownNonterminal(rule.head.clone()))?;

        let len = rule.body.len();
        if nodes.len() < len || states.len() <= len {
            return Err(ParseError::StackUnderflow(production));
        }
        let children = nodes.split_off(nodes.len() - len);
        states.truncate(states.len() - len);

        let uncovered = *states.last().ok_or(ParseError::StackUnderflow(production))?;
        let next = self
            .table
            .goto(uncovered, head)
            .ok_or_else(|| ParseError::MissingGoto {
                state: uncovered,
                head: rule.head.clone(),
            })?;

        nodes.push(Cst::Node(Node {
            name: rule.head.clone(),
            children,
        }));
        states.push(next);
        Ok(())
    }

    fn syntax_error(&self, state: usize, token: &Token) -> SyntaxError {
        let expected = self.table.expected(state);
        SyntaxError {
            found: token.image.clone(),
            line: token.line,
            start_column: token.start_column,
            end_column: token.end_column,
            expected: expected.labels,
            expected_all_tokens: expected.tokens,
        }
    }

    fn suggestion(&self, state: usize, index: usize) -> Suggestion {
        let expected = self.table.expected(state);
        Suggestion {
            state,
            expected: expected.labels,
            expected_all_tokens: expected.tokens,
            index,
        }
    }
}

fn finish(nodes: Vec<Cst>, errors: Vec<SyntaxError>, state_stack: Vec<usize>) -> ParseResult {
    ParseResult {
        cst: flatten_children(nodes).into_iter().next(),
        errors,
        state_stack,
    }
}

/// Splices repetition nodes into their parents, at every depth.
///
/// A repetition chain is right-nested (`MANY -> item MANY`), so chains are
/// unrolled with an explicit stack rather than by recursion.
fn flatten_children(children: Vec<Cst>) -> Vec<Cst> {
    let mut flat = Vec::with_capacity(children.len());
    let mut pending = vec![children.into_iter()];

    while let Some(iter) = pending.last_mut() {
        let Some(child) = iter.next() else {
            pending.pop();
            continue;
        };
        match child {
            Cst::Node(node) if is_repetition(&node.name) => pending.push(node.children.into_iter()),
            Cst::Node(mut node) => {
                node.children = flatten_children(std::mem::take(&mut node.children));
                flat.push(Cst::Node(node));
            }
            leaf @ Cst::Token(_) => flat.push(leaf),
        }
    }

    flat
}
