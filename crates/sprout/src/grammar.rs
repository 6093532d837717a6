//! Grammar description: an arena of named rules built through a small DSL.
//!
//! Rules are created in two phases. [`Grammar::declare`] registers a name
//! and returns a [`RuleId`] handle; [`Grammar::define`] records the body.
//! Bodies refer to other rules only through handles, so self- and mutual
//! recursion need no special treatment. [`Grammar::rule`] does both steps at
//! once for rules with no forward references.
//!
//! ```text
//! let stmt = grammar.declare("Statement")?;
//! let program = grammar.rule("Program", |r| {
//!     r.many(|r| { r.sub_rule(stmt); });
//! })?;
//! grammar.define(stmt, |r| { r.consume(&let_kw).consume(&ident); })?;
//! ```

use std::collections::HashMap;
use thiserror::Error;

pub mod productions;
pub mod rules;

pub use productions::{compile, CompiledGrammar, NonterminalEntry, Production, Symbol};
pub use rules::{Alternatives, Impl, Rule, RuleBuilder, RuleId};

use crate::validate::ValidationError;

/// Name of the augmented start symbol.
pub const AUGMENTED_START: &str = "S'";

/// Prefix of the synthetic nonterminals minted for repetitions.
pub const REPETITION_PREFIX: &str = "MANY_";

/// Returns `true` if `name` is a synthetic repetition nonterminal.
#[must_use]
pub fn is_repetition(name: &str) -> bool {
    name.starts_with(REPETITION_PREFIX)
}

/// Errors raised while describing or compiling a grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// A rule with this name already exists.
    #[error("rule '{0}' is already declared")]
    DuplicateRule(String),

    /// The name collides with a compiler-generated symbol.
    #[error("rule name '{0}' is reserved")]
    ReservedName(String),

    /// [`Grammar::define`] was called twice for the same rule.
    #[error("rule '{0}' already has a body")]
    AlreadyDefined(String),

    /// The handle does not belong to this grammar.
    #[error("unknown rule handle #{0}")]
    UnknownRule(usize),

    /// The grammar failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// An arena of rules addressed by [`RuleId`].
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: Vec<Rule>,
    names: HashMap<String, RuleId>,
}

impl Grammar {
    /// Creates an empty grammar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule name without a body.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::DuplicateRule`] if the name is taken, or
    /// [`GrammarError::ReservedName`] for `S'` and names starting with `MANY_`.
    pub fn declare(&mut self, name: impl Into<String>) -> Result<RuleId, GrammarError> {
        let name = name.into();
        if name == AUGMENTED_START || is_repetition(&name) {
            return Err(GrammarError::ReservedName(name));
        }
        if self.names.contains_key(&name) {
            return Err(GrammarError::DuplicateRule(name));
        }

        let id = RuleId(self.rules.len());
        self.names.insert(name.clone(), id);
        self.rules.push(Rule { name, body: None });
        Ok(id)
    }

    /// Records the body of a declared rule.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::UnknownRule`] for a foreign handle and
    /// [`GrammarError::AlreadyDefined`] if the rule already has a body.
    pub fn define(
        &mut self,
        id: RuleId,
        define: impl FnOnce(&mut RuleBuilder),
    ) -> Result<RuleId, GrammarError> {
        let rule = self
            .rules
            .get_mut(id.0)
            .ok_or(GrammarError::UnknownRule(id.0))?;
        if rule.is_defined() {
            return Err(GrammarError::AlreadyDefined(rule.name.clone()));
        }
        rule.body = Some(RuleBuilder::build(define));
        Ok(id)
    }

    /// Declares and defines a rule in one step.
    ///
    /// # Errors
    ///
    /// Same as [`Grammar::declare`].
    pub fn rule(
        &mut self,
        name: impl Into<String>,
        define: impl FnOnce(&mut RuleBuilder),
    ) -> Result<RuleId, GrammarError> {
        let id = self.declare(name)?;
        self.define(id, define)
    }

    /// Looks up a rule by handle.
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0)
    }

    /// Looks up a rule handle by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<RuleId> {
        self.names.get(name).copied()
    }

    /// All rules with their handles, in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().enumerate().map(|(i, rule)| (RuleId(i), rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Vocabulary;

    #[test]
    fn test_forward_reference_through_declare() {
        let mut vocab = Vocabulary::new();
        let let_kw = vocab.token("Let", "let").unwrap();
        let mut grammar = Grammar::new();

        let stmt = grammar.declare("Statement").unwrap();
        let program = grammar
            .rule("Program", |r| {
                r.many(|r| {
                    r.sub_rule(stmt);
                });
            })
            .unwrap();
        grammar
            .define(stmt, |r| {
                r.consume(&let_kw);
            })
            .unwrap();

        assert_eq!(grammar.find("Program"), Some(program));
        assert!(grammar.get(stmt).is_some_and(Rule::is_defined));
        assert_eq!(grammar.rules().count(), 2);
    }

    #[test]
    fn test_duplicate_and_reserved_names() {
        let mut grammar = Grammar::new();
        grammar.declare("Main").unwrap();

        assert!(matches!(grammar.declare("Main"), Err(GrammarError::DuplicateRule(_))));
        assert!(matches!(grammar.declare("S'"), Err(GrammarError::ReservedName(_))));
        assert!(matches!(grammar.declare("MANY_3"), Err(GrammarError::ReservedName(_))));
    }

    #[test]
    fn test_define_twice_is_rejected() {
        let mut grammar = Grammar::new();
        let main = grammar.rule("Main", |_| {}).unwrap();
        let err = grammar.define(main, |_| {}).unwrap_err();
        assert!(matches!(err, GrammarError::AlreadyDefined(name) if name == "Main"));
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut grammar = Grammar::new();
        assert!(matches!(
            grammar.define(RuleId(9), |_| {}),
            Err(GrammarError::UnknownRule(9))
        ));
    }
}
