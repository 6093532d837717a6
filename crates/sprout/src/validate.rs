//! Validation routines for grammars.
//!
//! This module performs structural checks over a [`Grammar`] before it is
//! expanded into productions: every reachable rule must have a body, every
//! alternation must offer at least one alternative, and no repetition may
//! repeat a body that matches the empty string, and no rule may derive itself
//! through a chain of single-rule bodies. Unreachable rules and left
//! recursion are reported through the `log` facade but are not errors.

use crate::grammar::rules::{visit_sub_rules, walk};
use crate::grammar::{Grammar, Impl, RuleId};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Represents a validation failure encountered when checking a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A reachable rule was declared but never given a body.
    #[error("rule '{0}' is declared but never defined")]
    Undefined(String),

    /// An alternation or group offers nothing to match.
    #[error("rule '{0}' contains an alternation with no alternatives")]
    EmptyAlternation(String),

    /// A repetition's body can match the empty string.
    #[error("rule '{0}' repeats a body that can match nothing")]
    NullableRepetition(String),

    /// A rule can derive itself without consuming input, so a parse could
    /// reduce it forever.
    #[error("rule '{0}' can derive itself without consuming input")]
    UnitCycle(String),

    /// A rule handle does not belong to the grammar.
    #[error("unknown rule handle #{0}")]
    UnknownRule(usize),
}

/// Performs semantic validation of a [`Grammar`] rooted at `root`.
///
/// This function runs several consistency passes over the grammar:
///
/// - Checks that all rules reachable from `root` are defined.
/// - Warns about unreachable rules.
/// - Rejects empty alternations and nullable repetitions.
/// - Rejects unit cycles (`A => B => A` with nothing else consumed).
/// - Notes immediate left recursion.
///
/// # Errors
///
/// Returns a [`ValidationError`] if any structural rule violation is detected.
pub fn validate(grammar: &Grammar, root: RuleId) -> Result<(), ValidationError> {
    if grammar.get(root).is_none() {
        return Err(ValidationError::UnknownRule(root.index()));
    }
    let reachable = reachable_rules(grammar, root);

    check_undefined_rules(grammar, &reachable)?;
    check_unreachable_rules(grammar, &reachable);
    check_alternations(grammar, &reachable)?;
    check_repetitions(grammar, &reachable)?;
    check_unit_cycles(grammar, &reachable)?;
    check_left_recursion(grammar, &reachable);

    Ok(())
}

fn reachable_rules(grammar: &Grammar, root: RuleId) -> BTreeSet<RuleId> {
    let mut reachable = BTreeSet::new();
    let mut to_visit = vec![root];

    while let Some(id) = to_visit.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(body) = grammar.get(id).and_then(|rule| rule.body.as_ref()) {
            visit_sub_rules(body, &mut |sub| to_visit.push(sub));
        }
    }

    reachable
}

fn check_undefined_rules(
    grammar: &Grammar,
    reachable: &BTreeSet<RuleId>,
) -> Result<(), ValidationError> {
    for &id in reachable {
        match grammar.get(id) {
            Some(rule) if rule.is_defined() => {}
            Some(rule) => return Err(ValidationError::Undefined(rule.name.clone())),
            None => return Err(ValidationError::UnknownRule(id.index())),
        }
    }
    Ok(())
}

fn check_unreachable_rules(grammar: &Grammar, reachable: &BTreeSet<RuleId>) {
    for (id, rule) in grammar.rules() {
        if !reachable.contains(&id) {
            log::warn!("unreachable rule '{}'", rule.name);
        }
    }
}

fn check_alternations(
    grammar: &Grammar,
    reachable: &BTreeSet<RuleId>,
) -> Result<(), ValidationError> {
    for (name, body) in reachable_bodies(grammar, reachable) {
        let mut empty = false;
        walk(body, &mut |op| match op {
            Impl::Or(alternatives) => empty |= alternatives.is_empty(),
            Impl::UseGroup { members, .. } => empty |= members.is_empty(),
            _ => {}
        });
        if empty {
            return Err(ValidationError::EmptyAlternation(name.to_string()));
        }
    }
    Ok(())
}

fn check_repetitions(
    grammar: &Grammar,
    reachable: &BTreeSet<RuleId>,
) -> Result<(), ValidationError> {
    let nullable = nullable_rules(grammar, reachable);

    for (name, body) in reachable_bodies(grammar, reachable) {
        let mut offending = false;
        walk(body, &mut |op| {
            if let Impl::Many(child) = op {
                offending |= seq_nullable(child, &nullable);
            }
        });
        if offending {
            return Err(ValidationError::NullableRepetition(name.to_string()));
        }
    }
    Ok(())
}

/// Least fixpoint of the rules that can derive the empty string.
fn nullable_rules(grammar: &Grammar, reachable: &BTreeSet<RuleId>) -> HashSet<RuleId> {
    let mut nullable = HashSet::new();
    loop {
        let mut changed = false;
        for &id in reachable {
            let Some(body) = grammar.get(id).and_then(|rule| rule.body.as_ref()) else {
                continue;
            };
            if !nullable.contains(&id) && seq_nullable(body, &nullable) {
                nullable.insert(id);
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}

fn seq_nullable(seq: &[Impl], nullable: &HashSet<RuleId>) -> bool {
    seq.iter().all(|op| impl_nullable(op, nullable))
}

fn impl_nullable(op: &Impl, nullable: &HashSet<RuleId>) -> bool {
    match op {
        Impl::Consume(_) | Impl::UseGroup { .. } => false,
        Impl::Option(_) | Impl::Many(_) => true,
        Impl::Or(alternatives) => alternatives
            .iter()
            .any(|alternative| seq_nullable(alternative, nullable)),
        Impl::SubRule(id) => nullable.contains(id),
    }
}

fn check_unit_cycles(
    grammar: &Grammar,
    reachable: &BTreeSet<RuleId>,
) -> Result<(), ValidationError> {
    let nullable = nullable_rules(grammar, reachable);
    let edges: BTreeMap<RuleId, BTreeSet<RuleId>> = reachable
        .iter()
        .filter_map(|&id| {
            let body = grammar.get(id)?.body.as_deref()?;
            Some((id, seq_unit_targets(body, &nullable)))
        })
        .collect();

    for &id in edges.keys() {
        if derives_itself(id, &edges) {
            let name = grammar.get(id).map_or_else(String::new, |rule| rule.name.clone());
            return Err(ValidationError::UnitCycle(name));
        }
    }
    Ok(())
}

/// Rules the sequence can derive on their own, every sibling deriving ε.
fn seq_unit_targets(seq: &[Impl], nullable: &HashSet<RuleId>) -> BTreeSet<RuleId> {
    let mut targets = BTreeSet::new();
    for (i, op) in seq.iter().enumerate() {
        let rest_nullable = seq
            .iter()
            .enumerate()
            .all(|(j, other)| j == i || impl_nullable(other, nullable));
        if rest_nullable {
            targets.extend(impl_unit_targets(op, nullable));
        }
    }
    targets
}

fn impl_unit_targets(op: &Impl, nullable: &HashSet<RuleId>) -> BTreeSet<RuleId> {
    match op {
        Impl::SubRule(id) => BTreeSet::from([*id]),
        Impl::Consume(_) | Impl::UseGroup { .. } => BTreeSet::new(),
        Impl::Option(child) | Impl::Many(child) => seq_unit_targets(child, nullable),
        Impl::Or(alternatives) => alternatives
            .iter()
            .flat_map(|alternative| seq_unit_targets(alternative, nullable))
            .collect(),
    }
}

fn derives_itself(start: RuleId, edges: &BTreeMap<RuleId, BTreeSet<RuleId>>) -> bool {
    let mut seen = BTreeSet::new();
    let mut to_visit: Vec<RuleId> = edges.get(&start).into_iter().flatten().copied().collect();

    while let Some(id) = to_visit.pop() {
        if id == start {
            return true;
        }
        if seen.insert(id) {
            to_visit.extend(edges.get(&id).into_iter().flatten().copied());
        }
    }
    false
}

fn check_left_recursion(grammar: &Grammar, reachable: &BTreeSet<RuleId>) {
    // LR tables handle left recursion natively; this is informational only
    for &id in reachable {
        let Some(rule) = grammar.get(id) else {
            continue;
        };
        if rule
            .body
            .as_deref()
            .is_some_and(|body| starts_with_rule(body, id))
        {
            log::info!("rule '{}' is left recursive", rule.name);
        }
    }
}

fn starts_with_rule(seq: &[Impl], target: RuleId) -> bool {
    match seq.first() {
        Some(Impl::SubRule(id)) => *id == target,
        Some(Impl::Or(alternatives)) => alternatives
            .iter()
            .any(|alternative| starts_with_rule(alternative, target)),
        Some(Impl::Option(child) | Impl::Many(child)) => {
            starts_with_rule(child, target) || starts_with_rule(&seq[1..], target)
        }
        Some(Impl::Consume(_) | Impl::UseGroup { .. }) | None => false,
    }
}

fn reachable_bodies<'g>(
    grammar: &'g Grammar,
    reachable: &BTreeSet<RuleId>,
) -> Vec<(&'g str, &'g [Impl])> {
    reachable
        .iter()
        .filter_map(|&id| grammar.get(id))
        .filter_map(|rule| rule.body.as_deref().map(|body| (rule.name.as_str(), body)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Vocabulary;
    use rstest::rstest;

    #[test]
    fn test_valid_grammar_passes() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let mut grammar = Grammar::new();
        let main = grammar
            .rule("Main", |r| {
                r.many(|r| {
                    r.consume(&a);
                });
            })
            .unwrap();

        assert_eq!(validate(&grammar, main), Ok(()));
    }

    #[test]
    fn test_undefined_reference_is_rejected() {
        let mut grammar = Grammar::new();
        let missing = grammar.declare("Missing").unwrap();
        let main = grammar
            .rule("Main", |r| {
                r.sub_rule(missing);
            })
            .unwrap();

        assert_eq!(
            validate(&grammar, main),
            Err(ValidationError::Undefined("Missing".to_string()))
        );
    }

    #[test]
    fn test_unreachable_undefined_rule_is_only_a_warning() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let mut grammar = Grammar::new();
        grammar.declare("Orphan").unwrap();
        let main = grammar
            .rule("Main", |r| {
                r.consume(&a);
            })
            .unwrap();

        assert_eq!(validate(&grammar, main), Ok(()));
    }

    #[rstest]
    #[case::empty_or(false)]
    #[case::empty_group(true)]
    fn test_empty_alternation_is_rejected(#[case] use_group: bool) {
        let mut vocab = Vocabulary::new();
        let empty = vocab.group("Nothing", &[]);
        let mut grammar = Grammar::new();
        let main = grammar
            .rule("Main", |r| {
                if use_group {
                    r.use_group(&empty);
                } else {
                    r.or(|_| {});
                }
            })
            .unwrap();

        assert_eq!(
            validate(&grammar, main),
            Err(ValidationError::EmptyAlternation("Main".to_string()))
        );
    }

    #[rstest]
    #[case::empty_body(0)]
    #[case::optional_body(1)]
    #[case::nullable_sub_rule(2)]
    fn test_nullable_repetition_is_rejected(#[case] shape: u8) {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let mut grammar = Grammar::new();
        let maybe = grammar
            .rule("Maybe", |r| {
                r.option(|r| {
                    r.consume(&a);
                });
            })
            .unwrap();
        let main = grammar
            .rule("Main", |r| {
                r.consume(&a);
                r.many(|r| match shape {
                    0 => {}
                    1 => {
                        r.option(|r| {
                            r.consume(&a);
                        });
                    }
                    _ => {
                        r.sub_rule(maybe);
                    }
                });
            })
            .unwrap();

        assert_eq!(
            validate(&grammar, main),
            Err(ValidationError::NullableRepetition("Main".to_string()))
        );
    }

    #[rstest]
    #[case::direct(0)]
    #[case::behind_nullable_prefix(1)]
    #[case::mutual(2)]
    #[case::inside_option(3)]
    fn test_unit_cycle_is_rejected(#[case] shape: u8) {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let mut grammar = Grammar::new();
        let main = grammar.declare("Main").unwrap();
        let other = grammar
            .rule("Other", |r| {
                r.sub_rule(main);
            })
            .unwrap();
        let maybe = grammar
            .rule("Maybe", |r| {
                r.option(|r| {
                    r.consume(&a);
                });
            })
            .unwrap();
        grammar
            .define(main, |r| {
                r.or(|alts| {
                    alts.alt(|r| match shape {
                        0 => {
                            r.sub_rule(main);
                        }
                        1 => {
                            r.sub_rule(maybe).sub_rule(main);
                        }
                        2 => {
                            r.sub_rule(other);
                        }
                        _ => {
                            r.option(|r| {
                                r.sub_rule(main);
                            });
                        }
                    })
                    .alt(|r| {
                        r.consume(&a);
                    });
                });
            })
            .unwrap();

        assert_eq!(
            validate(&grammar, main),
            Err(ValidationError::UnitCycle("Main".to_string()))
        );
    }

    #[test]
    fn test_recursion_through_input_is_not_a_unit_cycle() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let mut grammar = Grammar::new();
        let main = grammar.declare("Main").unwrap();
        grammar
            .define(main, |r| {
                r.or(|alts| {
                    alts.alt(|r| {
                        r.consume(&a).sub_rule(main);
                    })
                    .alt(|r| {
                        r.consume(&a);
                    });
                });
            })
            .unwrap();

        assert_eq!(validate(&grammar, main), Ok(()));
    }

    #[test]
    fn test_left_recursion_is_allowed() {
        let mut vocab = Vocabulary::new();
        let plus = vocab.literal("Plus", "+").unwrap();
        let num = vocab.token("Num", "[0-9]+").unwrap();
        let mut grammar = Grammar::new();
        let expr = grammar.declare("Expr").unwrap();
        grammar
            .define(expr, |r| {
                r.or(|alts| {
                    alts.alt(|r| {
                        r.sub_rule(expr).consume(&plus).consume(&num);
                    })
                    .alt(|r| {
                        r.consume(&num);
                    });
                });
            })
            .unwrap();

        assert!(starts_with_rule(
            grammar.get(expr).unwrap().body.as_deref().unwrap(),
            expr
        ));
        assert_eq!(validate(&grammar, expr), Ok(()));
    }
}
