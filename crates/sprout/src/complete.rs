//! Next-token suggestions for editor completion.
//!
//! A [`Completer`] turns table labels (token names or group names) into
//! caller-chosen completion strings. It reads either the expected labels of
//! a [`SyntaxError`] or the action row of a state on a parser's state stack.

use crate::parser::SyntaxError;
use crate::table::{Action, Table};
use crate::token::TokenIndex;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while producing suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompleteError {
    /// No suggestions were registered for this label.
    #[error("no suggestions registered for '{0}'")]
    Unmapped(String),
}

/// Maps table labels to completion strings.
#[derive(Debug, Clone)]
pub struct Completer<'t> {
    table: &'t Table,
    suggestions: HashMap<String, Vec<String>>,
}

impl<'t> Completer<'t> {
    /// Creates a completer with no registered suggestions.
    #[must_use]
    pub fn new(table: &'t Table) -> Self {
        Self {
            table,
            suggestions: HashMap::new(),
        }
    }

    /// Registers the completions offered for `label`.
    ///
    /// `None` offers the label itself.
    pub fn set_suggestions(
        &mut self,
        label: impl Into<String>,
        suggestions: Option<Vec<String>>,
    ) -> &mut Self {
        let label = label.into();
        let suggestions = suggestions.unwrap_or_else(|| vec![label.clone()]);
        self.suggestions.insert(label, suggestions);
        self
    }

    /// The completions registered for `label`.
    ///
    /// # Errors
    ///
    /// Returns [`CompleteError::Unmapped`] if nothing is registered.
    pub fn suggestions_for(&self, label: &str) -> Result<&[String], CompleteError> {
        self.suggestions
            .get(label)
            .map(Vec::as_slice)
            .ok_or_else(|| CompleteError::Unmapped(label.to_string()))
    }

    /// Completions for every label the error expected, in label order.
    ///
    /// # Errors
    ///
    /// Returns [`CompleteError::Unmapped`] for the first label without
    /// registered suggestions.
    pub fn suggest_from_error(&self, error: &SyntaxError) -> Result<Vec<String>, CompleteError> {
        let mut out = Vec::new();
        for label in &error.expected {
            extend_unique(&mut out, self.suggestions_for(label)?);
        }
        Ok(out)
    }

    /// Completions for the tokens that may follow the given state stack.
    ///
    /// Reads the state just below the top of the stack (or the only state).
    /// Shift entries contribute their token directly. Reduce entries are
    /// simulated on a copy of the stack, and the shift entries of the goto
    /// target contribute their tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CompleteError::Unmapped`] for the first token name without
    /// registered suggestions.
    pub fn suggest_from_state(&self, state_stack: &[usize]) -> Result<Vec<String>, CompleteError> {
        let depth = match state_stack.len() {
            0 => return Ok(Vec::new()),
            1 => 0,
            len => len - 2,
        };
        let stack = &state_stack[..=depth];
        let state = stack[depth];
        let Some(row) = self.table.actions.get(state) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for entry in row {
            match entry.action {
                Action::Shift(_) => self.extend_with_token(&mut out, entry.terminal)?,
                Action::Reduce(production) => {
                    let Some(target) = self.goto_after_reduce(stack, production) else {
                        continue;
                    };
                    let Some(next_row) = self.table.actions.get(target) else {
                        continue;
                    };
                    for next in next_row {
                        if matches!(next.action, Action::Shift(_)) {
                            self.extend_with_token(&mut out, next.terminal)?;
                        }
                    }
                }
                Action::Accept => {}
            }
        }
        Ok(out)
    }

    fn goto_after_reduce(&self, stack: &[usize], production: usize) -> Option<usize> {
        let rule = self.table.productions.get(production)?;
        let remaining = stack.len().checked_sub(rule.body.len())?;
        let uncovered = *stack[..remaining].last()?;
        let head = self.table.nonterminal_index(&rule.head)?;
        self.table.goto(uncovered, head)
    }

    fn extend_with_token(&self, out: &mut Vec<String>, terminal: TokenIndex) -> Result<(), CompleteError> {
        if let Some(name) = self.table.terminal_name(terminal) {
            extend_unique(out, self.suggestions_for(name)?);
        }
        Ok(())
    }
}

fn extend_unique(out: &mut Vec<String>, suggestions: &[String]) {
    for suggestion in suggestions {
        if !out.contains(suggestion) {
            out.push(suggestion.clone());
        }
    }
}
