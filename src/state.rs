use crate::cost::{CostBreakdown, CostModel};
use crate::driver::Move;
use crate::error::StructuralInfeasibility;
use crate::feasibility::FeasibilityRules;
use crate::problem::ProblemIndex;

/// Total participant→slot mapping with its occupancy index and cached cost.
///
/// The mapping is the single source of truth. Occupancy and cost are caches
/// kept in step by [`AssignmentState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentState {
    slot_of: Vec<usize>,
    occupancy: Vec<u32>,
    cost: CostBreakdown,
}

impl AssignmentState {
    /// Builds the starting point of a search.
    ///
    /// Locked participants go to their pre-assigned slot. Everyone else, in
    /// input order, takes the first preferred slot with room left, otherwise
    /// the slot with the most room left.
    pub fn seed(
        index: &ProblemIndex,
        rules: &FeasibilityRules,
        cost_model: &CostModel<'_>,
    ) -> Result<Self, StructuralInfeasibility> {
        let num_participants = index.num_participants();
        let mut slot_of = vec![usize::MAX; num_participants];
        let mut occupancy = vec![0u32; index.num_slots()];

        for p in 0..num_participants {
            if let Some(slot) = rules.locked_slot(p) {
                slot_of[p] = slot;
                occupancy[slot] += 1;
            }
        }

        for p in 0..num_participants {
            if rules.is_locked(p) {
                continue;
            }
            let preferred = index
                .preferences(p)
                .iter()
                .copied()
                .find(|&s| occupancy[s] < rules.max_fill(s));
            let slot = preferred
                .or_else(|| {
                    (0..index.num_slots())
                        .filter(|&s| occupancy[s] < rules.max_fill(s))
                        .max_by_key(|&s| {
                            (rules.max_fill(s) - occupancy[s], std::cmp::Reverse(s))
                        })
                })
                .ok_or_else(|| StructuralInfeasibility::InsufficientCapacity {
                    participants: num_participants,
                    capacity: (0..index.num_slots())
                        .map(|s| u64::from(rules.max_fill(s)))
                        .sum(),
                })?;
            slot_of[p] = slot;
            occupancy[slot] += 1;
        }

        Ok(Self::from_slots(slot_of, index, rules, cost_model))
    }

    /// Wraps an existing total mapping, deriving occupancy and cost.
    pub fn from_slots(
        slot_of: Vec<usize>,
        index: &ProblemIndex,
        rules: &FeasibilityRules,
        cost_model: &CostModel<'_>,
    ) -> Self {
        debug_assert_eq!(slot_of.len(), index.num_participants());
        let mut occupancy = vec![0u32; index.num_slots()];
        for &slot in &slot_of {
            occupancy[slot] += 1;
        }
        debug_assert!(
            occupancy
                .iter()
                .enumerate()
                .all(|(s, &occ)| occ <= rules.max_fill(s)),
            "called `AssignmentState::from_slots` with a slot above maxFill"
        );
        let cost = cost_model.evaluate(&slot_of, &occupancy);
        Self {
            slot_of,
            occupancy,
            cost,
        }
    }

    #[inline]
    pub fn slot_of(&self, participant: usize) -> usize {
        self.slot_of[participant]
    }

    #[inline]
    pub fn occupancy(&self, slot: usize) -> u32 {
        self.occupancy[slot]
    }

    #[inline]
    pub fn assignment(&self) -> &[usize] {
        &self.slot_of
    }

    #[inline]
    pub fn occupancies(&self) -> &[u32] {
        &self.occupancy
    }

    #[inline]
    pub fn cost(&self) -> &CostBreakdown {
        &self.cost
    }

    /// Applies `mv`, folding the precomputed `delta` into the cached cost.
    pub fn apply(&mut self, mv: &Move, delta: CostBreakdown) {
        match *mv {
            Move::Reassign {
                participant,
                from,
                to,
            } => {
                debug_assert_eq!(self.slot_of[participant], from);
                self.slot_of[participant] = to;
                self.occupancy[from] -= 1;
                self.occupancy[to] += 1;
            }
            Move::Swap {
                first,
                first_slot,
                second,
                second_slot,
            } => {
                debug_assert_eq!(self.slot_of[first], first_slot);
                debug_assert_eq!(self.slot_of[second], second_slot);
                self.slot_of[first] = second_slot;
                self.slot_of[second] = first_slot;
            }
        }
        self.cost += delta;
    }

    /// Whether the cached cost agrees with a from-scratch evaluation.
    pub fn is_consistent(&self, cost_model: &CostModel<'_>) -> bool {
        cost_model.full_cost(self) == self.cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CostConfig, Participant, PreAssignment, ProblemModel, Slot, SlotCategory};

    fn costs() -> CostConfig {
        CostConfig {
            weight_min_filled: 1,
            weight_pref: 1,
            weight_pair: 1,
            weight_sec_diff: 1,
            pen_game_min: 1,
            pen_prac_min: 1,
            pen_not_paired: 1,
            pen_section: 1,
        }
    }

    fn model() -> ProblemModel {
        ProblemModel {
            slots: vec![
                Slot {
                    id: 100,
                    category: SlotCategory::Game,
                    min_fill: 1,
                    max_fill: 2,
                },
                Slot {
                    id: 200,
                    category: SlotCategory::Practice,
                    min_fill: 0,
                    max_fill: 3,
                },
                Slot {
                    id: 300,
                    category: SlotCategory::Practice,
                    min_fill: 0,
                    max_fill: 1,
                },
            ],
            participants: vec![
                Participant {
                    id: 1,
                    pairing_group: None,
                    preferences: vec![100],
                },
                Participant {
                    id: 2,
                    pairing_group: None,
                    preferences: vec![100, 300],
                },
                Participant {
                    id: 3,
                    pairing_group: None,
                    preferences: vec![100, 300],
                },
                Participant {
                    id: 4,
                    pairing_group: None,
                    preferences: vec![],
                },
            ],
            pre_assignments: vec![PreAssignment {
                participant_id: 1,
                slot_id: 100,
            }],
        }
    }

    #[test]
    fn test_seed_respects_locks_preferences_and_capacity() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let state = AssignmentState::seed(&index, &rules, &cost_model).unwrap();

        // 1 locked to 100, 2 gets the last seat in 100, 3 falls to its second
        // choice, 4 takes the roomiest slot
        assert_eq!(state.assignment(), &[0, 0, 2, 1]);
        assert_eq!(state.occupancies(), &[2, 1, 1]);
        assert!(state.is_consistent(&cost_model));
        for s in 0..index.num_slots() {
            assert!(state.occupancy(s) <= rules.max_fill(s));
        }
    }

    #[test]
    fn test_apply_then_revert_restores_everything() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let original = AssignmentState::seed(&index, &rules, &cost_model).unwrap();

        let swap = Move::Swap {
            first: 1,
            first_slot: 0,
            second: 2,
            second_slot: 2,
        };
        assert!(rules.is_legal_swap(1, 2, &original));
        let mut state = original.clone();
        let delta = cost_model.delta_cost(&state, &swap);
        state.apply(&swap, delta);
        assert_ne!(state, original);
        assert!(state.is_consistent(&cost_model));
        state.apply(&swap.inverse(), -delta);
        assert_eq!(state, original);

        let reassign = Move::Reassign {
            participant: 2,
            from: 2,
            to: 1,
        };
        assert!(rules.is_legal_move(2, 2, 1, &original));
        let mut state = original.clone();
        let delta = cost_model.delta_cost(&state, &reassign);
        state.apply(&reassign, delta);
        assert_eq!(state.occupancies(), &[2, 2, 0]);
        assert!(state.is_consistent(&cost_model));
        state.apply(&reassign.inverse(), -delta);
        assert_eq!(state, original);
    }

    #[test]
    fn test_full_slots_block_reassignment() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let state = AssignmentState::seed(&index, &rules, &cost_model).unwrap();
        assert!(!rules.is_legal_move(3, 1, 0, &state));
        assert!(!rules.is_legal_move(3, 1, 2, &state));
        assert!(!rules.is_legal_move(0, 0, 1, &state));
    }
}
