//! Conflict table shared by the queue manager and the executor.
//!
//! Both sides go through the same `conflicts` / `interrupts` functions so a
//! merge decision and the interrupt it triggers can never disagree.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::types::ActionType;

/// Symmetric pairs of action types that cannot run at the same time.
const CONFLICT_PAIRS: [(ActionType, ActionType); 3] = [
    (ActionType::MoveForward, ActionType::MoveBack),
    (ActionType::MoveLeft, ActionType::MoveRight),
    (ActionType::Attack, ActionType::Charge),
];

/// Adjacency lookup built from `CONFLICT_PAIRS`.
#[derive(Debug, Default)]
pub struct ConflictTable {
    edges: HashMap<ActionType, HashSet<ActionType>>,
}

impl ConflictTable {
    fn build() -> Self {
        let mut table = Self::default();
        for (a, b) in CONFLICT_PAIRS {
            table.edges.entry(a).or_default().insert(b);
            table.edges.entry(b).or_default().insert(a);
        }
        table
    }

    /// The process-wide table.
    pub fn global() -> &'static ConflictTable {
        static TABLE: OnceLock<ConflictTable> = OnceLock::new();
        TABLE.get_or_init(Self::build)
    }

    /// Types that cannot coexist with `action_type`.
    pub fn conflicts_of(&self, action_type: ActionType) -> impl Iterator<Item = ActionType> + '_ {
        self.edges
            .get(&action_type)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn conflicts_with(&self, a: ActionType, b: ActionType) -> bool {
        self.edges.get(&a).is_some_and(|set| set.contains(&b))
    }
}

/// Whether `a` conflicts with any type in `others`.
pub fn conflicts(a: ActionType, others: impl IntoIterator<Item = ActionType>) -> bool {
    let table = ConflictTable::global();
    others.into_iter().any(|b| table.conflicts_with(a, b))
}

pub fn conflicts_with(a: ActionType, b: ActionType) -> bool {
    ConflictTable::global().conflicts_with(a, b)
}

/// Whether a running action of type `running` must be cancelled when
/// `incoming` types are layered on top of it.
///
/// On top of the conflict table, a running `attack` is superseded by an
/// incoming `attack`: the newer count or duration wins instead of the two
/// being added together.
pub fn interrupts(running: ActionType, incoming: impl IntoIterator<Item = ActionType>) -> bool {
    let table = ConflictTable::global();
    incoming.into_iter().any(|b| {
        table.conflicts_with(running, b)
            || (running == ActionType::Attack && b == ActionType::Attack)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_pairs_are_symmetric() {
        for (a, b) in CONFLICT_PAIRS {
            assert!(conflicts_with(a, b));
            assert!(conflicts_with(b, a));
        }
    }

    #[test]
    fn test_unrelated_types_do_not_conflict() {
        assert!(!conflicts_with(ActionType::MoveForward, ActionType::Skill));
        assert!(!conflicts_with(ActionType::MoveForward, ActionType::MoveLeft));
        assert!(!conflicts_with(ActionType::Charge, ActionType::MoveForward));
        assert!(!conflicts_with(ActionType::Attack, ActionType::Attack));
    }

    #[test]
    fn test_conflicts_against_set() {
        assert!(conflicts(
            ActionType::MoveBack,
            [ActionType::Skill, ActionType::MoveForward]
        ));
        assert!(!conflicts(
            ActionType::MoveForward,
            [ActionType::Skill, ActionType::Charge]
        ));
        assert!(!conflicts(ActionType::MoveForward, []));
    }

    #[test]
    fn test_conflicts_of() {
        let table = ConflictTable::global();
        let of_attack: Vec<_> = table.conflicts_of(ActionType::Attack).collect();
        assert_eq!(of_attack, vec![ActionType::Charge]);
        assert_eq!(table.conflicts_of(ActionType::Jump).count(), 0);
    }

    #[test]
    fn test_newer_attack_supersedes_running_attack() {
        assert!(interrupts(ActionType::Attack, [ActionType::Attack]));
        assert!(interrupts(ActionType::Attack, [ActionType::Charge]));
        assert!(interrupts(ActionType::MoveForward, [ActionType::MoveBack]));
        assert!(!interrupts(ActionType::MoveForward, [ActionType::Charge]));
        assert!(!interrupts(ActionType::Skill, [ActionType::Skill]));
    }
}
