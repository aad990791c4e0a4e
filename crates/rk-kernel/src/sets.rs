//! `ActionSets` — the state-tagged collections of a model.
//!
//! One insertion-ordered set per tracked [`ActionState`].  The model moves an
//! action between sets only inside `Model::set_state`, which is what keeps
//! every live action in exactly one set (or none, when `Detached`).

use indexmap::IndexSet;
use rk_core::ActionId;

use crate::ActionState;

#[derive(Default)]
pub struct ActionSets {
    sets: [IndexSet<ActionId>; 5],
}

impl ActionSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` to the back of the collection for `state`.
    pub(crate) fn insert(&mut self, state: ActionState, id: ActionId) {
        if let Some(i) = state.collection() {
            self.sets[i].insert(id);
        }
    }

    /// Unlink `id` from the collection for `state`, preserving the order of
    /// the remaining members.
    pub(crate) fn remove(&mut self, state: ActionState, id: ActionId) -> bool {
        match state.collection() {
            Some(i) => self.sets[i].shift_remove(&id),
            None => false,
        }
    }

    pub fn contains(&self, state: ActionState, id: ActionId) -> bool {
        state.collection().is_some_and(|i| self.sets[i].contains(&id))
    }

    pub fn len(&self, state: ActionState) -> usize {
        state.collection().map_or(0, |i| self.sets[i].len())
    }

    /// Members of the collection for `state`, oldest first.
    pub fn iter(&self, state: ActionState) -> impl Iterator<Item = ActionId> + '_ {
        state
            .collection()
            .into_iter()
            .flat_map(move |i| self.sets[i].iter().copied())
    }

    /// Total number of tracked actions across all collections.
    pub fn total(&self) -> usize {
        self.sets.iter().map(IndexSet::len).sum()
    }
}
