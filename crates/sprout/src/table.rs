//! Action and goto tables.
//!
//! A [`Table`] is the compiled artifact of a grammar: everything the
//! [`Parser`](crate::parser::Parser) needs and nothing else. It serializes
//! through [`facet_json`]; numerically keyed maps are stored as vectors of
//! entries sorted by key so the JSON text is a pure function of the grammar.

use crate::automaton::Automaton;
use crate::grammar::{
    compile, CompiledGrammar, Grammar, GrammarError, NonterminalEntry, Production, RuleId, Symbol,
    AUGMENTED_START,
};
use crate::token::{TokenIndex, Vocabulary, EOF, EOF_NAME};
use facet::Facet;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while building or loading a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// The grammar failed to compile.
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// The JSON text is not a valid table.
    #[error("failed to deserialize table: {0}")]
    Deserialize(String),
}

/// A parser decision for one (state, terminal) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum Action {
    /// Consume the token and move to the given state.
    Shift(usize),
    /// Reduce by the production with the given index.
    Reduce(usize),
    /// The input is a complete sentence.
    Accept,
}

/// One cell of an action row.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct ActionEntry {
    /// The lookahead terminal.
    pub terminal: TokenIndex,
    /// What to do on it.
    pub action: Action,
}

/// One cell of a goto row.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct GotoEntry {
    /// The nonterminal just reduced.
    pub nonterminal: usize,
    /// The state to push.
    pub state: usize,
}

/// Name and group of a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct TerminalName {
    /// The terminal index.
    pub index: TokenIndex,
    /// The token type name, or `EOF`.
    pub name: String,
    /// The group reported in place of this terminal, if any.
    pub group: Option<String>,
}

/// A serialized LR(1) item.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct ItemRecord {
    /// Production index.
    pub production: usize,
    /// Dot position.
    pub dot: usize,
    /// Sorted lookahead terminals.
    pub lookaheads: Vec<TokenIndex>,
}

/// A serialized state transition.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct TransitionRecord {
    /// The symbol consumed.
    pub symbol: Symbol,
    /// The successor state.
    pub target: usize,
}

/// A serialized automaton state.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct StateRecord {
    /// Items ordered by (production, dot).
    pub items: Vec<ItemRecord>,
    /// Transitions ordered by symbol.
    pub transitions: Vec<TransitionRecord>,
}

/// An action-table slot claimed by more than one item.
///
/// The later item wins; the record keeps what it replaced.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Conflict {
    /// The state whose row conflicted.
    pub state: usize,
    /// The contested lookahead.
    pub terminal: TokenIndex,
    /// The action that was overwritten.
    pub previous: Action,
    /// The action kept in the table.
    pub chosen: Action,
}

/// Readable description of what a state accepts next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expected {
    /// Group names first, then names of tokens outside any group.
    pub labels: Vec<String>,
    /// Every legal token name.
    pub tokens: Vec<String>,
}

/// The compiled parse table of a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Table {
    /// Action rows, one per state, sorted by terminal.
    pub actions: Vec<Vec<ActionEntry>>,
    /// Goto rows, one per state, sorted by nonterminal.
    pub gotos: Vec<Vec<GotoEntry>>,
    /// Every terminal of the vocabulary plus `EOF`, sorted by index.
    pub terminals: Vec<TerminalName>,
    /// The production list; production 0 is `S' -> Root`.
    pub productions: Vec<Production>,
    /// Nonterminal names and indices.
    pub nonterminals: Vec<NonterminalEntry>,
    /// The canonical collection the rows were derived from.
    pub states: Vec<StateRecord>,
    /// Every overwritten action slot, in build order.
    pub conflicts: Vec<Conflict>,
}

impl Table {
    /// Compiles `grammar` from `root` and builds its table.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Grammar`] if the grammar does not validate or
    /// compile.
    pub fn build(vocab: &Vocabulary, grammar: &Grammar, root: RuleId) -> Result<Self, TableError> {
        let compiled = compile(grammar, root)?;
        let automaton = Automaton::build(&compiled);
        Ok(TableBuilder::new(vocab, &compiled, &automaton).build())
    }

    /// Loads a table serialized by [`Table::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Deserialize`] if `json` is not a valid table.
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        facet_json::from_str(json).map_err(|e| TableError::Deserialize(e.to_string()))
    }

    /// Serializes the table to JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        facet_json::to_string(self)
    }

    /// Number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.actions.len()
    }

    /// The action for `terminal` in `state`.
    #[must_use]
    pub fn action(&self, state: usize, terminal: TokenIndex) -> Option<Action> {
        let row = self.actions.get(state)?;
        row.binary_search_by_key(&terminal, |entry| entry.terminal)
            .ok()
            .map(|i| row[i].action)
    }

    /// The state reached from `state` after reducing to `nonterminal`.
    #[must_use]
    pub fn goto(&self, state: usize, nonterminal: usize) -> Option<usize> {
        let row = self.gotos.get(state)?;
        row.binary_search_by_key(&nonterminal, |entry| entry.nonterminal)
            .ok()
            .map(|i| row[i].state)
    }

    fn terminal(&self, index: TokenIndex) -> Option<&TerminalName> {
        self.terminals
            .binary_search_by_key(&index, |entry| entry.index)
            .ok()
            .map(|i| &self.terminals[i])
    }

    /// The token name of `terminal`.
    #[must_use]
    pub fn terminal_name(&self, terminal: TokenIndex) -> Option<&str> {
        self.terminal(terminal).map(|entry| entry.name.as_str())
    }

    /// The group `terminal` is reported as, if any.
    #[must_use]
    pub fn group_of(&self, terminal: TokenIndex) -> Option<&str> {
        self.terminal(terminal).and_then(|entry| entry.group.as_deref())
    }

    /// Index of the nonterminal called `name`.
    #[must_use]
    pub fn nonterminal_index(&self, name: &str) -> Option<usize> {
        self.nonterminals
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.index)
    }

    /// The recorded action-table overwrites.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// What `state` accepts next, as group labels and token names.
    ///
    /// Terminals are visited in index order with `EOF` last.
    #[must_use]
    pub fn expected(&self, state: usize) -> Expected {
        let Some(row) = self.actions.get(state) else {
            return Expected::default();
        };
        let ordered = row
            .iter()
            .filter(|entry| entry.terminal != EOF)
            .chain(row.iter().filter(|entry| entry.terminal == EOF));

        let mut groups: Vec<String> = Vec::new();
        let mut ungrouped: Vec<String> = Vec::new();
        let mut tokens: Vec<String> = Vec::new();
        for entry in ordered {
            let Some(terminal) = self.terminal(entry.terminal) else {
                continue;
            };
            match &terminal.group {
                Some(group) => push_unique(&mut groups, group),
                None => push_unique(&mut ungrouped, &terminal.name),
            }
            push_unique(&mut tokens, &terminal.name);
        }

        groups.extend(ungrouped);
        Expected {
            labels: groups,
            tokens,
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Derives action and goto rows from a canonical collection.
struct TableBuilder<'a> {
    vocab: &'a Vocabulary,
    grammar: &'a CompiledGrammar,
    automaton: &'a Automaton,
    conflicts: Vec<Conflict>,
}

impl<'a> TableBuilder<'a> {
    fn new(vocab: &'a Vocabulary, grammar: &'a CompiledGrammar, automaton: &'a Automaton) -> Self {
        Self {
            vocab,
            grammar,
            automaton,
            conflicts: Vec::new(),
        }
    }

    fn build(mut self) -> Table {
        let mut actions = Vec::with_capacity(self.automaton.states.len());
        let mut gotos = Vec::with_capacity(self.automaton.states.len());

        for index in 0..self.automaton.states.len() {
            actions.push(self.action_row(index));
            gotos.push(self.goto_row(index));
        }

        let cells: usize = actions.iter().map(Vec::len).sum();
        log::debug!(
            "table has {} states, {cells} action cells, {} conflicts",
            actions.len(),
            self.conflicts.len()
        );

        Table {
            actions,
            gotos,
            terminals: self.terminals(),
            productions: self.grammar.productions.clone(),
            nonterminals: self.grammar.nonterminals.clone(),
            states: self.state_records(),
            conflicts: self.conflicts,
        }
    }

    fn action_row(&mut self, index: usize) -> Vec<ActionEntry> {
        let state = &self.automaton.states[index];
        let mut row: BTreeMap<TokenIndex, Action> = BTreeMap::new();

        for (core, lookaheads) in state.items.iter() {
            let production = &self.grammar.productions[core.production];
            match production.body.get(core.dot) {
                Some(&Symbol::Terminal(terminal)) => {
                    if let Some(&target) = state.transitions.get(&Symbol::Terminal(terminal)) {
                        self.set(&mut row, index, terminal, Action::Shift(target));
                    }
                }
                Some(Symbol::Nonterminal(_)) => {}
                None => {
                    let action = if production.head == AUGMENTED_START {
                        Action::Accept
                    } else {
                        Action::Reduce(core.production)
                    };
                    for &lookahead in lookaheads {
                        self.set(&mut row, index, lookahead, action);
                    }
                }
            }
        }

        row.into_iter()
            .map(|(terminal, action)| ActionEntry { terminal, action })
            .collect()
    }

    fn set(
        &mut self,
        row: &mut BTreeMap<TokenIndex, Action>,
        state: usize,
        terminal: TokenIndex,
        action: Action,
    ) {
        if let Some(previous) = row.insert(terminal, action) {
            if previous != action {
                log::warn!(
                    "conflict in state {state} on terminal {terminal}: {previous:?} replaced by {action:?}"
                );
                self.conflicts.push(Conflict {
                    state,
                    terminal,
                    previous,
                    chosen: action,
                });
            }
        }
    }

    fn goto_row(&self, index: usize) -> Vec<GotoEntry> {
        self.automaton.states[index]
            .transitions
            .iter()
            .filter_map(|(symbol, &state)| {
                symbol
                    .nonterminal()
                    .map(|nonterminal| GotoEntry { nonterminal, state })
            })
            .collect()
    }

    fn terminals(&self) -> Vec<TerminalName> {
        let eof = TerminalName {
            index: EOF,
            name: EOF_NAME.to_string(),
            group: None,
        };
        std::iter::once(eof)
            .chain(self.vocab.tokens().iter().map(|token| TerminalName {
                index: token.index(),
                name: token.name().to_string(),
                group: self
                    .vocab
                    .group_of(token.index())
                    .map(|group| group.name.clone()),
            }))
            .collect()
    }

    fn state_records(&self) -> Vec<StateRecord> {
        self.automaton
            .states
            .iter()
            .map(|state| StateRecord {
                items: state
                    .items
                    .iter()
                    .map(|(core, lookaheads)| ItemRecord {
                        production: core.production,
                        dot: core.dot,
                        lookaheads: lookaheads.iter().copied().collect(),
                    })
                    .collect(),
                transitions: state
                    .transitions
                    .iter()
                    .map(|(&symbol, &target)| TransitionRecord { symbol, target })
                    .collect(),
            })
            .collect()
    }
}
