//! Bottom-up folds over a finished CST.
//!
//! A [`Visitor`] maps every token leaf through one leaf handler and every
//! internal node through the handler registered for its rule name, feeding
//! each handler the already-folded values of its children. Rule names are
//! grammar-defined, so coverage is checked at runtime: either up front with
//! [`Visitor::ensure_covers`] or lazily when an unhandled node is reached.

use crate::grammar::{is_repetition, AUGMENTED_START};
use crate::parser::{Cst, Node, ParseResult, TokenNode};
use crate::table::Table;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while folding a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisitError {
    /// The parse produced no tree.
    #[error("the CST is empty")]
    EmptyTree,

    /// A node type has no registered handler.
    #[error("no handler registered for node type '{0}'")]
    Unhandled(String),

    /// Rules of the table that have no registered handler.
    #[error("no handlers for rules: {}", .0.join(", "))]
    MissingHandlers(Vec<String>),
}

type LeafHandler<'a, T> = Box<dyn FnMut(&TokenNode) -> T + 'a>;
type NodeHandler<'a, T> = Box<dyn FnMut(&Node, Vec<T>) -> T + 'a>;

/// A fold from CST nodes to values of type `T`.
pub struct Visitor<'a, T> {
    leaf: LeafHandler<'a, T>,
    handlers: HashMap<String, NodeHandler<'a, T>>,
}

impl<'a, T> Visitor<'a, T> {
    /// Creates a visitor that maps token leaves through `leaf`.
    pub fn new(leaf: impl FnMut(&TokenNode) -> T + 'a) -> Self {
        Self {
            leaf: Box::new(leaf),
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for nodes named `name`, replacing any previous one.
    #[must_use]
    pub fn on(
        mut self,
        name: impl Into<String>,
        handler: impl FnMut(&Node, Vec<T>) -> T + 'a,
    ) -> Self {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    /// Returns `true` if a handler is registered for `name`.
    #[must_use]
    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Checks that every rule of `table` has a handler.
    ///
    /// Repetition nonterminals and `S'` never appear in a returned tree and
    /// are not required.
    ///
    /// # Errors
    ///
    /// Returns [`VisitError::MissingHandlers`] listing the uncovered rules.
    pub fn ensure_covers(&self, table: &Table) -> Result<(), VisitError> {
        let missing: Vec<String> = table
            .nonterminals
            .iter()
            .map(|entry| entry.name.as_str())
            .filter(|name| *name != AUGMENTED_START && !is_repetition(name))
            .filter(|name| !self.handles(name))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(VisitError::MissingHandlers(missing))
        }
    }

    /// Folds the tree of a parse result.
    ///
    /// # Errors
    ///
    /// Returns [`VisitError::EmptyTree`] if the result has no tree, or
    /// [`VisitError::Unhandled`] for a node type without a handler.
    pub fn visit(&mut self, result: &ParseResult) -> Result<T, VisitError> {
        let cst = result.cst.as_ref().ok_or(VisitError::EmptyTree)?;
        self.visit_cst(cst)
    }

    /// Folds `root` in post-order without recursion.
    ///
    /// # Errors
    ///
    /// Returns [`VisitError::Unhandled`] for a node type without a handler.
    pub fn visit_cst(&mut self, root: &Cst) -> Result<T, VisitError> {
        enum Frame<'c> {
            Enter(&'c Cst),
            Exit(&'c Node),
        }

        let mut stack = vec![Frame::Enter(root)];
        let mut values: Vec<T> = Vec::new();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(Cst::Token(leaf)) => values.push((self.leaf)(leaf)),
                Frame::Enter(Cst::Node(node)) => {
                    stack.push(Frame::Exit(node));
                    stack.extend(node.children.iter().rev().map(Frame::Enter));
                }
                Frame::Exit(node) => {
                    let handler = self
                        .handlers
                        .get_mut(&node.name)
                        .ok_or_else(|| VisitError::Unhandled(node.name.clone()))?;
                    let children = values.split_off(values.len() - node.children.len());
                    values.push(handler(node, children));
                }
            }
        }

        values.pop().ok_or(VisitError::EmptyTree)
    }
}

impl<T> std::fmt::Debug for Visitor<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("Visitor").field("handlers", &names).finish_non_exhaustive()
    }
}
