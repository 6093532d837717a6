//! Canonical LR(1) item sets.
//!
//! Items are keyed by their core (production, dot); two items with the same
//! core are the same item and their lookahead sets merge. States are
//! deduplicated by their full content, lookaheads included, so this is the
//! canonical collection rather than an LALR merge.

use crate::grammar::{CompiledGrammar, Symbol};
use crate::token::{TokenIndex, EOF};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

pub mod first;

pub use first::FirstSets;

/// A production with a dot position, without lookaheads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemCore {
    /// Index into the production list.
    pub production: usize,
    /// Number of body symbols already matched.
    pub dot: usize,
}

impl ItemCore {
    /// Creates an item core.
    #[must_use]
    pub fn new(production: usize, dot: usize) -> Self {
        Self { production, dot }
    }
}

/// A set of LR(1) items: cores mapped to their merged lookaheads.
///
/// Iteration is ordered by core, which makes every derived artifact
/// independent of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ItemSet {
    items: BTreeMap<ItemCore, BTreeSet<TokenIndex>>,
}

impl ItemSet {
    /// Creates an empty item set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item, merging lookaheads into an existing item with the same core.
    ///
    /// Returns `true` if the item is new or its lookahead set grew.
    pub fn insert(
        &mut self,
        core: ItemCore,
        lookaheads: impl IntoIterator<Item = TokenIndex>,
    ) -> bool {
        match self.items.get_mut(&core) {
            Some(existing) => {
                let before = existing.len();
                existing.extend(lookaheads);
                existing.len() > before
            }
            None => {
                self.items.insert(core, lookaheads.into_iter().collect());
                true
            }
        }
    }

    /// Lookaheads of the item with this core.
    #[must_use]
    pub fn lookaheads(&self, core: ItemCore) -> Option<&BTreeSet<TokenIndex>> {
        self.items.get(&core)
    }

    /// Items in core order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemCore, &BTreeSet<TokenIndex>)> {
        self.items.iter().map(|(core, lookaheads)| (*core, lookaheads))
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the set holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The canonical textual key: `production.dot.lookaheads` triples joined by `|`.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ItemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (core, lookaheads)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{}.{}.", core.production, core.dot)?;
            for (j, lookahead) in lookaheads.iter().enumerate() {
                if j > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{lookahead}")?;
            }
        }
        Ok(())
    }
}

/// One state of the automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// The closed item set.
    pub items: ItemSet,
    /// Successor state per symbol.
    pub transitions: BTreeMap<Symbol, usize>,
}

/// The canonical collection of LR(1) states. State 0 is the start state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    /// States in discovery (breadth-first) order.
    pub states: Vec<State>,
}

impl Automaton {
    /// Builds the canonical collection for `grammar`.
    #[must_use]
    pub fn build(grammar: &CompiledGrammar) -> Self {
        AutomatonBuilder::new(grammar).build()
    }
}

/// Closure, goto and the canonical collection over one compiled grammar.
#[derive(Debug)]
pub struct AutomatonBuilder<'g> {
    grammar: &'g CompiledGrammar,
    first: FirstSets,
    by_head: HashMap<usize, Vec<usize>>,
}

impl<'g> AutomatonBuilder<'g> {
    /// Prepares the FIRST sets and per-head production lists of `grammar`.
    #[must_use]
    pub fn new(grammar: &'g CompiledGrammar) -> Self {
        let mut by_head: HashMap<usize, Vec<usize>> = HashMap::new();
        for (production, head) in grammar.head_indices().into_iter().enumerate() {
            if let Some(head) = head {
                by_head.entry(head).or_default().push(production);
            }
        }
        Self {
            grammar,
            first: FirstSets::compute(grammar),
            by_head,
        }
    }

    /// The FIRST sets used for lookahead computation.
    #[must_use]
    pub fn first_sets(&self) -> &FirstSets {
        &self.first
    }

    fn next_symbol(&self, core: ItemCore) -> Option<Symbol> {
        self.grammar
            .productions
            .get(core.production)
            .and_then(|production| production.body.get(core.dot))
            .copied()
    }

    /// Expands `items` with every item reachable without consuming input.
    ///
    /// For an item `A -> α . B β` with lookaheads `L`, each production
    /// `B -> γ` contributes `B -> . γ` with lookaheads `FIRST(β)`, plus `L`
    /// when `β` is nullable. Growth of an existing item's lookaheads is
    /// propagated until nothing changes.
    #[must_use]
    pub fn closure(&self, mut items: ItemSet) -> ItemSet {
        let mut work: VecDeque<ItemCore> = items.iter().map(|(core, _)| core).collect();

        while let Some(core) = work.pop_front() {
            let Some(Symbol::Nonterminal(head)) = self.next_symbol(core) else {
                continue;
            };
            let Some(productions) = self.by_head.get(&head) else {
                continue;
            };

            let beta = &self.grammar.productions[core.production].body[core.dot + 1..];
            let mut lookaheads = self.first.first_of_sequence(beta);
            if self.first.sequence_nullable(beta) {
                if let Some(own) = items.lookaheads(core) {
                    lookaheads.extend(own.iter().copied());
                }
            }

            for &production in productions {
                let seed = ItemCore::new(production, 0);
                if items.insert(seed, lookaheads.iter().copied()) {
                    work.push_back(seed);
                }
            }
        }

        items
    }

    /// Advances every item of `items` whose next symbol is `symbol`, then closes.
    #[must_use]
    pub fn goto(&self, items: &ItemSet, symbol: Symbol) -> ItemSet {
        let mut moved = ItemSet::new();
        for (core, lookaheads) in items.iter() {
            if self.next_symbol(core) == Some(symbol) {
                moved.insert(
                    ItemCore::new(core.production, core.dot + 1),
                    lookaheads.iter().copied(),
                );
            }
        }
        self.closure(moved)
    }

    /// Builds the canonical collection breadth-first from `S' -> . Root, {EOF}`.
    #[must_use]
    pub fn build(&self) -> Automaton {
        let mut start = ItemSet::new();
        start.insert(ItemCore::new(0, 0), [EOF]);
        let start = self.closure(start);

        let mut seen: HashMap<ItemSet, usize> = HashMap::from([(start.clone(), 0)]);
        let mut states = vec![State {
            items: start,
            transitions: BTreeMap::new(),
        }];
        let mut queue = VecDeque::from([0]);

        while let Some(index) = queue.pop_front() {
            let symbols: BTreeSet<Symbol> = states[index]
                .items
                .iter()
                .filter_map(|(core, _)| self.next_symbol(core))
                .collect();
            let targets: Vec<(Symbol, ItemSet)> = symbols
                .into_iter()
                .map(|symbol| (symbol, self.goto(&states[index].items, symbol)))
                .filter(|(_, items)| !items.is_empty())
                .collect();

            for (symbol, items) in targets {
                let target = match seen.get(&items) {
                    Some(&existing) => existing,
                    None => {
                        let fresh = states.len();
                        seen.insert(items.clone(), fresh);
                        states.push(State {
                            items,
                            transitions: BTreeMap::new(),
                        });
                        queue.push_back(fresh);
                        fresh
                    }
                };
                states[index].transitions.insert(symbol, target);
            }
        }

        log::debug!("built {} LR(1) states", states.len());
        Automaton { states }
    }
}
