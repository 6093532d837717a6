//! The operation tree recorded for each rule body.
//!
//! A rule body is a sequence of [`Impl`] operations. The builder context
//! ([`RuleBuilder`]) appends operations; nested bodies (optional parts,
//! repetitions, alternatives) are recorded as whole sequences and expanded
//! in place by the production compiler.

use crate::token::{TokenGroup, TokenIndex, TokenType};

/// Handle to a rule in a [`Grammar`](crate::grammar::Grammar) arena.
///
/// Handles exist before their rule body does, which is what allows a body
/// to reference rules defined later (or itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    /// Position of the rule in its grammar's arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single operation in a rule body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Impl {
    /// Match one token of the given type.
    Consume(TokenIndex),

    /// Zero or one occurrence of the inner sequence.
    Option(Vec<Impl>),

    /// Zero or more occurrences of the inner sequence.
    Many(Vec<Impl>),

    /// Exactly one of the alternative sequences.
    Or(Vec<Vec<Impl>>),

    /// A reference to another rule.
    SubRule(RuleId),

    /// Any one member of a token group.
    UseGroup {
        /// Group name, kept for diagnostics.
        name: String,
        /// Member token indices.
        members: Vec<TokenIndex>,
    },
}

/// Calls `visit` on every operation in `body`, parents before children.
pub(crate) fn walk(body: &[Impl], visit: &mut impl FnMut(&Impl)) {
    for op in body {
        visit(op);
        match op {
            Impl::Option(child) | Impl::Many(child) => walk(child, visit),
            Impl::Or(alternatives) => {
                for alternative in alternatives {
                    walk(alternative, visit);
                }
            }
            Impl::Consume(_) | Impl::SubRule(_) | Impl::UseGroup { .. } => {}
        }
    }
}

/// Calls `visit` for every rule referenced anywhere in `body`, in order.
pub(crate) fn visit_sub_rules(body: &[Impl], visit: &mut impl FnMut(RuleId)) {
    walk(body, &mut |op| {
        if let Impl::SubRule(id) = op {
            visit(*id);
        }
    });
}

/// A named rule and its recorded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// The rule's name; becomes the CST node type of its reductions.
    pub name: String,

    /// The body, or `None` while the rule is only declared.
    pub body: Option<Vec<Impl>>,
}

impl Rule {
    /// Returns `true` once the rule has a body.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }
}

/// Builder context handed to rule-definition closures.
#[derive(Debug, Default)]
pub struct RuleBuilder {
    body: Vec<Impl>,
}

impl RuleBuilder {
    pub(crate) fn build(define: impl FnOnce(&mut RuleBuilder)) -> Vec<Impl> {
        let mut builder = RuleBuilder::default();
        define(&mut builder);
        builder.body
    }

    /// Matches one token of `token_type`.
    pub fn consume(&mut self, token_type: &TokenType) -> &mut Self {
        self.body.push(Impl::Consume(token_type.index()));
        self
    }

    /// Matches the body built by `define` zero or one time.
    pub fn option(&mut self, define: impl FnOnce(&mut RuleBuilder)) -> &mut Self {
        self.body.push(Impl::Option(Self::build(define)));
        self
    }

    /// Matches the body built by `define` zero or more times.
    pub fn many(&mut self, define: impl FnOnce(&mut RuleBuilder)) -> &mut Self {
        self.body.push(Impl::Many(Self::build(define)));
        self
    }

    /// Matches exactly one of the alternatives registered on [`Alternatives`].
    pub fn or(&mut self, define: impl FnOnce(&mut Alternatives)) -> &mut Self {
        let mut alternatives = Alternatives::default();
        define(&mut alternatives);
        self.body.push(Impl::Or(alternatives.branches));
        self
    }

    /// Matches the rule behind `rule`.
    pub fn sub_rule(&mut self, rule: RuleId) -> &mut Self {
        self.body.push(Impl::SubRule(rule));
        self
    }

    /// Matches any one member of `group`.
    ///
    /// A single-member group records a plain consume.
    pub fn use_group(&mut self, group: &TokenGroup) -> &mut Self {
        match group.members.as_slice() {
            [only] => self.body.push(Impl::Consume(*only)),
            members => self.body.push(Impl::UseGroup {
                name: group.name.clone(),
                members: members.to_vec(),
            }),
        }
        self
    }
}

/// Collects the branches of an [`RuleBuilder::or`] operation.
#[derive(Debug, Default)]
pub struct Alternatives {
    branches: Vec<Vec<Impl>>,
}

impl Alternatives {
    /// Adds one alternative, built by `define`.
    pub fn alt(&mut self, define: impl FnOnce(&mut RuleBuilder)) -> &mut Self {
        self.branches.push(RuleBuilder::build(define));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Vocabulary;

    #[test]
    fn test_builder_records_operations_in_order() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let b = vocab.token("B", "b").unwrap();
        let c = vocab.token("C", "c").unwrap();

        let body = RuleBuilder::build(|r| {
            r.consume(&a);
            r.option(|r| {
                r.consume(&b);
            });
            r.or(|alts| {
                alts.alt(|r| {
                    r.consume(&b);
                })
                .alt(|r| {
                    r.consume(&c).consume(&c);
                });
            });
            r.sub_rule(RuleId(3));
        });

        assert_eq!(
            body,
            vec![
                Impl::Consume(0),
                Impl::Option(vec![Impl::Consume(1)]),
                Impl::Or(vec![vec![Impl::Consume(1)], vec![Impl::Consume(2), Impl::Consume(2)]]),
                Impl::SubRule(RuleId(3)),
            ]
        );
    }

    #[test]
    fn test_single_member_group_is_a_consume() {
        let mut vocab = Vocabulary::new();
        let a = vocab.token("A", "a").unwrap();
        let b = vocab.token("B", "b").unwrap();
        let single = vocab.group("Single", &[&a]);
        let pair = vocab.group("Pair", &[&a, &b]);

        let body = RuleBuilder::build(|r| {
            r.use_group(&single).use_group(&pair);
        });

        assert_eq!(body[0], Impl::Consume(0));
        assert!(matches!(&body[1], Impl::UseGroup { name, members } if name == "Pair" && members == &vec![0, 1]));
    }
}
