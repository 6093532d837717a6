//! Expansion of rule bodies into flat context-free productions.
//!
//! Each [`Impl`] transforms the list of partial bodies accumulated so far.
//! Options and alternations fork every partial body; repetitions mint a
//! right-recursive `MANY_<n>` nonterminal with exactly two kinds of
//! production (`MANY_<n> -> ε` and `MANY_<n> -> C MANY_<n>` per expansion
//! `C` of the repeated body) and append that single symbol instead.

use super::rules::{visit_sub_rules, Impl, RuleId};
use super::{Grammar, GrammarError, AUGMENTED_START, REPETITION_PREFIX};
use crate::token::TokenIndex;
use crate::validate::{validate, ValidationError};
use facet::Facet;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Index of the first nonterminal assigned by the compiler.
pub const FIRST_NONTERMINAL: usize = 10_000;

/// Index reserved for the augmented start symbol `S'`.
pub const AUGMENTED_START_INDEX: usize = 99_999;

/// A grammar symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
#[repr(u8)]
pub enum Symbol {
    /// A token type, by token index.
    Terminal(TokenIndex),
    /// A rule or synthetic repetition, by nonterminal index.
    Nonterminal(usize),
}

impl Symbol {
    /// Returns `true` for terminals.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    /// Returns the nonterminal index, if this is a nonterminal.
    #[must_use]
    pub fn nonterminal(self) -> Option<usize> {
        match self {
            Symbol::Nonterminal(index) => Some(index),
            Symbol::Terminal(_) => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Terminal(index) => write!(f, "t{index}"),
            Symbol::Nonterminal(index) => write!(f, "n{index}"),
        }
    }
}

/// One rewrite rule: `head -> body`.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Production {
    /// Name of the nonterminal being rewritten.
    pub head: String,
    /// The ordered right-hand side; empty for ε.
    pub body: Vec<Symbol>,
}

/// A nonterminal name and the index assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct NonterminalEntry {
    /// The rule name, `MANY_<n>`, or `S'`.
    pub name: String,
    /// The assigned index.
    pub index: usize,
}

/// The flat production list of a grammar.
///
/// Production 0 is always `S' -> Root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGrammar {
    /// All productions.
    pub productions: Vec<Production>,
    /// Nonterminal indices in first-seen order, followed by `S'`.
    pub nonterminals: Vec<NonterminalEntry>,
}

impl CompiledGrammar {
    /// Index of the nonterminal called `name`.
    #[must_use]
    pub fn nonterminal_index(&self, name: &str) -> Option<usize> {
        self.nonterminals
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.index)
    }

    /// Name of the nonterminal at `index`.
    #[must_use]
    pub fn nonterminal_name(&self, index: usize) -> Option<&str> {
        self.nonterminals
            .iter()
            .find(|entry| entry.index == index)
            .map(|entry| entry.name.as_str())
    }

    /// Head nonterminal index of each production, in production order.
    pub(crate) fn head_indices(&self) -> Vec<Option<usize>> {
        let by_name: HashMap<&str, usize> = self
            .nonterminals
            .iter()
            .map(|entry| (entry.name.as_str(), entry.index))
            .collect();
        self.productions
            .iter()
            .map(|production| by_name.get(production.head.as_str()).copied())
            .collect()
    }
}

/// Validates `grammar` and expands it, starting from `root`.
///
/// # Errors
///
/// Returns [`GrammarError::Invalid`] if validation fails, or
/// [`GrammarError::UnknownRule`] for a handle from another grammar.
pub fn compile(grammar: &Grammar, root: RuleId) -> Result<CompiledGrammar, GrammarError> {
    validate(grammar, root)?;

    let mut compiler = ProductionCompiler {
        grammar,
        productions: Vec::new(),
        indices: HashMap::new(),
        order: Vec::new(),
        compiled: HashSet::new(),
        repetitions: 0,
    };
    let root_name = compiler.rule_name(root)?;
    let root_index = compiler.nonterminal(&root_name);
    compiler.productions.push(Production {
        head: AUGMENTED_START.to_string(),
        body: vec![Symbol::Nonterminal(root_index)],
    });
    compiler.compile_rule(root)?;

    let mut nonterminals = compiler.order;
    nonterminals.push(NonterminalEntry {
        name: AUGMENTED_START.to_string(),
        index: AUGMENTED_START_INDEX,
    });
    log::debug!(
        "compiled {} productions over {} nonterminals",
        compiler.productions.len(),
        nonterminals.len()
    );

    Ok(CompiledGrammar {
        productions: compiler.productions,
        nonterminals,
    })
}

type Bodies = Vec<Vec<Symbol>>;

struct ProductionCompiler<'g> {
    grammar: &'g Grammar,
    productions: Vec<Production>,
    indices: HashMap<String, usize>,
    order: Vec<NonterminalEntry>,
    compiled: HashSet<RuleId>,
    repetitions: usize,
}

impl ProductionCompiler<'_> {
    fn rule_name(&self, id: RuleId) -> Result<String, GrammarError> {
        self.grammar
            .get(id)
            .map(|rule| rule.name.clone())
            .ok_or(GrammarError::UnknownRule(id.0))
    }

    fn nonterminal(&mut self, name: &str) -> usize {
        if let Some(&index) = self.indices.get(name) {
            return index;
        }
        let index = FIRST_NONTERMINAL + self.order.len();
        self.indices.insert(name.to_string(), index);
        self.order.push(NonterminalEntry {
            name: name.to_string(),
            index,
        });
        index
    }

    fn compile_rule(&mut self, id: RuleId) -> Result<(), GrammarError> {
        if !self.compiled.insert(id) {
            return Ok(());
        }
        let grammar = self.grammar;
        let rule = grammar.get(id).ok_or(GrammarError::UnknownRule(id.0))?;
        let body = rule
            .body
            .as_ref()
            .ok_or_else(|| ValidationError::Undefined(rule.name.clone()))?;

        self.nonterminal(&rule.name);
        let bodies = self.expand_seq(body, vec![Vec::new()])?;
        self.push_all(&rule.name, bodies);

        let mut referenced = Vec::new();
        visit_sub_rules(body, &mut |sub| referenced.push(sub));
        for sub in referenced {
            self.compile_rule(sub)?;
        }
        Ok(())
    }

    /// Pushes one production per distinct body.
    fn push_all(&mut self, head: &str, bodies: Bodies) {
        let mut seen = HashSet::new();
        for body in bodies {
            if seen.insert(body.clone()) {
                self.productions.push(Production {
                    head: head.to_string(),
                    body,
                });
            }
        }
    }

    fn expand_seq(&mut self, seq: &[Impl], acc: Bodies) -> Result<Bodies, GrammarError> {
        seq.iter()
            .try_fold(acc, |acc, op| self.expand_impl(op, acc))
    }

    fn expand_impl(&mut self, op: &Impl, acc: Bodies) -> Result<Bodies, GrammarError> {
        let expanded = match op {
            Impl::Consume(token) => append(acc, Symbol::Terminal(*token)),
            Impl::SubRule(id) => {
                let name = self.rule_name(*id)?;
                let index = self.nonterminal(&name);
                append(acc, Symbol::Nonterminal(index))
            }
            Impl::Option(child) => {
                let children = self.expand_seq(child, vec![Vec::new()])?;
                let with = product(&acc, &children);
                let mut without = acc;
                without.extend(with);
                without
            }
            Impl::Or(alternatives) => {
                let mut results = Vec::new();
                for alternative in alternatives {
                    let children = self.expand_seq(alternative, vec![Vec::new()])?;
                    results.extend(product(&acc, &children));
                }
                results
            }
            Impl::UseGroup { members, .. } => members
                .iter()
                .flat_map(|&member| append(acc.clone(), Symbol::Terminal(member)))
                .collect(),
            Impl::Many(child) => {
                let name = format!("{REPETITION_PREFIX}{}", self.repetitions);
                self.repetitions += 1;
                let index = self.nonterminal(&name);
                let children = self.expand_seq(child, vec![Vec::new()])?;

                let mut bodies = vec![Vec::new()];
                bodies.extend(children.into_iter().map(|mut body| {
                    body.push(Symbol::Nonterminal(index));
                    body
                }));
                self.push_all(&name, bodies);
                append(acc, Symbol::Nonterminal(index))
            }
        };
        Ok(expanded)
    }
}

fn append(mut acc: Bodies, symbol: Symbol) -> Bodies {
    for body in &mut acc {
        body.push(symbol);
    }
    acc
}

fn product(acc: &[Vec<Symbol>], children: &[Vec<Symbol>]) -> Bodies {
    acc.iter()
        .flat_map(|prefix| {
            children.iter().map(move |child| {
                let mut body = prefix.clone();
                body.extend_from_slice(child);
                body
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Vocabulary;
    use pretty_assertions::assert_eq;

    fn t(index: TokenIndex) -> Symbol {
        Symbol::Terminal(index)
    }

    fn n(index: usize) -> Symbol {
        Symbol::Nonterminal(index)
    }

    fn bodies_of<'a>(compiled: &'a CompiledGrammar, head: &str) -> Vec<&'a [Symbol]> {
        compiled
            .productions
            .iter()
            .filter(|p| p.head == head)
            .map(|p| p.body.as_slice())
            .collect()
    }

    #[test]
    fn test_sequence_with_augmented_start() {
        let mut vocab = Vocabulary::new();
        let let_kw = vocab.token("Let", "let").unwrap();
        let ident = vocab.token("Identifier", r"[a-z]+").unwrap();
        let mut grammar = Grammar::new();
        let main = grammar
            .rule("Main", |r| {
                r.consume(&let_kw).consume(&ident);
            })
            .unwrap();

        let compiled = compile(&grammar, main).unwrap();

        assert_eq!(
            compiled.productions,
            vec![
                Production {
                    head: "S'".to_string(),
                    body: vec![n(10_000)],
                },
                Production {
                    head: "Main".to_string(),
                    body: vec![t(0), t(1)],
                },
            ]
        );
        assert_eq!(compiled.nonterminal_index("Main"), Some(10_000));
        assert_eq!(compiled.nonterminal_name(AUGMENTED_START_INDEX), Some("S'"));
    }

    #[test]
    fn test_option_and_group_fork_bodies() {
        let mut vocab = Vocabulary::new();
        let let_kw = vocab.token("Let", "let").unwrap();
        let ident = vocab.token("Identifier", r"[a-z]+").unwrap();
        let num = vocab.token("Typenumber", "number").unwrap();
        let string = vocab.token("Typestring", "string").unwrap();
        let types = vocab.group("TypeGroup", &[&num, &string]);
        let mut grammar = Grammar::new();
        let main = grammar
            .rule("Main", |r| {
                r.consume(&let_kw).consume(&ident).option(|r| {
                    r.use_group(&types);
                });
            })
            .unwrap();

        let compiled = compile(&grammar, main).unwrap();

        assert_eq!(
            bodies_of(&compiled, "Main"),
            vec![
                &[t(0), t(1)][..],
                &[t(0), t(1), t(2)][..],
                &[t(0), t(1), t(3)][..],
            ]
        );
    }

    #[test]
    fn test_many_mints_right_recursive_nonterminal() {
        let mut vocab = Vocabulary::new();
        let let_kw = vocab.token("Let", "let").unwrap();
        let ident = vocab.token("Identifier", r"[a-z]+").unwrap();
        let mut grammar = Grammar::new();
        let stmt = grammar.declare("LetStatement").unwrap();
        let program = grammar
            .rule("Program", |r| {
                r.many(|r| {
                    r.sub_rule(stmt);
                });
            })
            .unwrap();
        grammar
            .define(stmt, |r| {
                r.consume(&let_kw).consume(&ident);
            })
            .unwrap();

        let compiled = compile(&grammar, program).unwrap();

        // Program = 10000, MANY_0 = 10001, LetStatement = 10002
        assert_eq!(compiled.nonterminal_index("MANY_0"), Some(10_001));
        assert_eq!(compiled.nonterminal_index("LetStatement"), Some(10_002));
        assert_eq!(bodies_of(&compiled, "MANY_0"), vec![&[][..], &[n(10_002), n(10_001)][..]]);
        assert_eq!(bodies_of(&compiled, "Program"), vec![&[n(10_001)][..]]);
        assert_eq!(bodies_of(&compiled, "LetStatement"), vec![&[t(0), t(1)][..]]);
    }

    #[test]
    fn test_mutual_recursion_compiles_each_rule_once() {
        let mut vocab = Vocabulary::new();
        let open = vocab.literal("Open", "(").unwrap();
        let close = vocab.literal("Close", ")").unwrap();
        let atom = vocab.token("Atom", "[a-z]+").unwrap();
        let mut grammar = Grammar::new();
        let expr = grammar.declare("Expr").unwrap();
        let list = grammar.declare("List").unwrap();
        grammar
            .define(expr, |r| {
                r.or(|alts| {
                    alts.alt(|r| {
                        r.consume(&atom);
                    })
                    .alt(|r| {
                        r.sub_rule(list);
                    });
                });
            })
            .unwrap();
        grammar
            .define(list, |r| {
                r.consume(&open).sub_rule(expr).consume(&close);
            })
            .unwrap();

        let compiled = compile(&grammar, expr).unwrap();

        assert_eq!(bodies_of(&compiled, "Expr").len(), 2);
        assert_eq!(bodies_of(&compiled, "List"), vec![&[t(0), n(10_000), t(1)][..]]);
        assert_eq!(compiled.productions.len(), 4);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let b = vocab.token("B", "b").unwrap();
        let mut grammar = Grammar::new();
        let main = grammar
            .rule("Main", |r| {
                r.many(|r| {
                    r.consume(&a);
                })
                .many(|r| {
                    r.consume(&b);
                });
            })
            .unwrap();

        assert_eq!(compile(&grammar, main).unwrap(), compile(&grammar, main).unwrap());
    }
}
