//! Token groups.
//!
//! Groups name a set of token types. Rule bodies use them as alternation
//! shorthand, and error reporting collapses the members of a group into the
//! group's name.

use super::{TokenIndex, TokenType};
use std::collections::{BTreeMap, HashMap};

/// A named set of token types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGroup {
    /// The label reported in place of any member token.
    pub name: String,

    /// The group's slot in the registry. Redefining a slot replaces the group.
    pub group_index: usize,

    /// Member token indices, in the order they were supplied.
    pub members: Vec<TokenIndex>,
}

impl TokenGroup {
    /// Returns `true` if `index` is one of this group's members.
    #[must_use]
    pub fn contains(&self, index: TokenIndex) -> bool {
        self.members.contains(&index)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct GroupRegistry {
    groups: BTreeMap<usize, TokenGroup>,
    by_token: HashMap<TokenIndex, usize>,
    next_index: usize,
}

impl GroupRegistry {
    pub(crate) fn create(&mut self, name: String, members: &[&TokenType]) -> TokenGroup {
        let index = self.next_index;
        self.replace(index, name, members)
    }

    pub(crate) fn replace(
        &mut self,
        group_index: usize,
        name: String,
        members: &[&TokenType],
    ) -> TokenGroup {
        // purge stale reverse lookups left by a previous definition
        self.by_token.retain(|_, owner| *owner != group_index);

        let group = TokenGroup {
            name,
            group_index,
            members: members.iter().map(|t| t.index()).collect(),
        };
        for &member in &group.members {
            self.by_token.insert(member, group_index);
        }
        self.groups.insert(group_index, group.clone());
        // tokens dropped from this slot fall back to another group listing them
        for (&owner, other) in self.groups.iter().rev() {
            for &member in &other.members {
                self.by_token.entry(member).or_insert(owner);
            }
        }
        self.next_index = self.next_index.max(group_index + 1);
        group
    }

    pub(crate) fn group_of(&self, index: TokenIndex) -> Option<&TokenGroup> {
        self.by_token
            .get(&index)
            .and_then(|owner| self.groups.get(owner))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &TokenGroup> {
        self.groups.values()
    }
}
