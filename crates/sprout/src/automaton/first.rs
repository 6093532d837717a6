//! FIRST sets and nullability.
//!
//! Both are computed once per grammar as a least fixpoint over the
//! productions, so cyclic nonterminals (`A -> A`, mutual recursion) terminate
//! without special cases.

use crate::grammar::{CompiledGrammar, Symbol};
use crate::token::TokenIndex;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Nullability and FIRST sets of every nonterminal in a grammar.
#[derive(Debug, Clone, Default)]
pub struct FirstSets {
    nullable: HashSet<usize>,
    first: HashMap<usize, BTreeSet<TokenIndex>>,
}

impl FirstSets {
    /// Computes the sets for `grammar`.
    #[must_use]
    pub fn compute(grammar: &CompiledGrammar) -> Self {
        let heads = grammar.head_indices();
        let mut sets = FirstSets::default();

        loop {
            let mut changed = false;
            for (production, head) in grammar.productions.iter().zip(&heads) {
                let Some(head) = *head else {
                    continue;
                };

                if !sets.nullable.contains(&head) && sets.sequence_nullable(&production.body) {
                    sets.nullable.insert(head);
                    changed = true;
                }

                let found = sets.first_of_sequence(&production.body);
                let entry = sets.first.entry(head).or_default();
                let before = entry.len();
                entry.extend(found);
                changed |= entry.len() > before;
            }
            if !changed {
                return sets;
            }
        }
    }

    /// Terminals are never nullable; a nonterminal is nullable if some
    /// production of it derives the empty string.
    #[must_use]
    pub fn is_nullable(&self, symbol: Symbol) -> bool {
        symbol
            .nonterminal()
            .is_some_and(|index| self.nullable.contains(&index))
    }

    /// Returns `true` if every symbol of `seq` is nullable (so also for `[]`).
    #[must_use]
    pub fn sequence_nullable(&self, seq: &[Symbol]) -> bool {
        seq.iter().all(|&symbol| self.is_nullable(symbol))
    }

    /// FIRST of a single symbol.
    #[must_use]
    pub fn first(&self, symbol: Symbol) -> BTreeSet<TokenIndex> {
        match symbol {
            Symbol::Terminal(index) => BTreeSet::from([index]),
            Symbol::Nonterminal(index) => self.first.get(&index).cloned().unwrap_or_default(),
        }
    }

    /// FIRST of a sequence: the union of FIRST of each symbol up to and
    /// including the first non-nullable one.
    #[must_use]
    pub fn first_of_sequence(&self, seq: &[Symbol]) -> BTreeSet<TokenIndex> {
        let mut result = BTreeSet::new();
        for &symbol in seq {
            result.extend(self.first(symbol));
            if !self.is_nullable(symbol) {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{NonterminalEntry, Production};

    fn t(index: TokenIndex) -> Symbol {
        Symbol::Terminal(index)
    }

    fn n(index: usize) -> Symbol {
        Symbol::Nonterminal(index)
    }

    fn production(head: &str, body: Vec<Symbol>) -> Production {
        Production {
            head: head.to_string(),
            body,
        }
    }

    /// S' -> A ; A -> B c ; A -> A d ; B -> ε ; B -> b ; C -> C
    fn grammar() -> CompiledGrammar {
        CompiledGrammar {
            productions: vec![
                production("S'", vec![n(10_000)]),
                production("A", vec![n(10_001), t(2)]),
                production("A", vec![n(10_000), t(3)]),
                production("B", vec![]),
                production("B", vec![t(1)]),
                production("C", vec![n(10_002)]),
            ],
            nonterminals: vec![
                NonterminalEntry {
                    name: "A".to_string(),
                    index: 10_000,
                },
                NonterminalEntry {
                    name: "B".to_string(),
                    index: 10_001,
                },
                NonterminalEntry {
                    name: "C".to_string(),
                    index: 10_002,
                },
                NonterminalEntry {
                    name: "S'".to_string(),
                    index: 99_999,
                },
            ],
        }
    }

    #[test]
    fn test_nullability() {
        let sets = FirstSets::compute(&grammar());
        assert!(sets.is_nullable(n(10_001)));
        assert!(!sets.is_nullable(n(10_000)));
        assert!(!sets.is_nullable(n(10_002)));
        assert!(!sets.is_nullable(t(1)));
        assert!(sets.sequence_nullable(&[]));
    }

    #[test]
    fn test_first_skips_past_nullable_prefix() {
        let sets = FirstSets::compute(&grammar());
        assert_eq!(sets.first(n(10_001)), BTreeSet::from([1]));
        assert_eq!(sets.first(n(10_000)), BTreeSet::from([1, 2]));
        assert_eq!(sets.first_of_sequence(&[n(10_001), t(3), t(4)]), BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_cyclic_nonterminal_terminates_empty() {
        let sets = FirstSets::compute(&grammar());
        assert!(sets.first(n(10_002)).is_empty());
    }
}
