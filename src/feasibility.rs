use crate::error::StructuralInfeasibility;
use crate::problem::ProblemIndex;
use crate::state::AssignmentState;

/// Hard bounds derived once from the problem.
///
/// `max_fill` is the only bound enforced when a move is made. Minimum fill is
/// a soft deficit priced by the cost model and read from [`ProblemIndex`].
#[derive(Debug, Clone)]
pub struct FeasibilityRules {
    max_fill: Vec<u32>,
    locked: Vec<Option<usize>>,
}

impl FeasibilityRules {
    pub fn new(index: &ProblemIndex) -> Result<Self, StructuralInfeasibility> {
        let max_fill: Vec<u32> = (0..index.num_slots()).map(|s| index.max_fill(s)).collect();
        let locked: Vec<Option<usize>> = (0..index.num_participants())
            .map(|p| index.pre_assigned(p))
            .collect();

        let mut locked_count = vec![0u32; index.num_slots()];
        for slot in locked.iter().flatten() {
            locked_count[*slot] += 1;
        }
        for (slot, &count) in locked_count.iter().enumerate() {
            if count > max_fill[slot] {
                return Err(StructuralInfeasibility::LockedOverCapacity {
                    slot_id: index.slot_id(slot),
                    locked: count,
                    max_fill: max_fill[slot],
                });
            }
        }

        let capacity: u64 = max_fill.iter().map(|&m| u64::from(m)).sum();
        if (index.num_participants() as u64) > capacity {
            return Err(StructuralInfeasibility::InsufficientCapacity {
                participants: index.num_participants(),
                capacity,
            });
        }

        Ok(Self {
            max_fill,
            locked,
        })
    }

    #[inline]
    pub fn max_fill(&self, slot: usize) -> u32 {
        self.max_fill[slot]
    }

    /// The slot the participant is pinned to, if any.
    #[inline]
    pub fn locked_slot(&self, participant: usize) -> Option<usize> {
        self.locked[participant]
    }

    #[inline]
    pub fn is_locked(&self, participant: usize) -> bool {
        self.locked[participant].is_some()
    }

    #[inline]
    pub fn has_room(&self, slot: usize, state: &AssignmentState) -> bool {
        state.occupancy(slot) < self.max_fill[slot]
    }

    /// Whether moving `participant` from `from` to `to` keeps every hard bound.
    pub fn is_legal_move(
        &self,
        participant: usize,
        from: usize,
        to: usize,
        state: &AssignmentState,
    ) -> bool {
        !self.is_locked(participant)
            && from != to
            && state.slot_of(participant) == from
            && self.has_room(to, state)
    }

    /// Exchanging two participants never changes occupancy, so only locks and
    /// distinct slots matter.
    pub fn is_legal_swap(&self, first: usize, second: usize, state: &AssignmentState) -> bool {
        first != second
            && !self.is_locked(first)
            && !self.is_locked(second)
            && state.slot_of(first) != state.slot_of(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModel;
    use crate::data::{
        CostConfig, Participant, PreAssignment, ProblemModel, Slot, SlotCategory,
    };

    fn zero_costs() -> CostConfig {
        CostConfig {
            weight_min_filled: 0,
            weight_pref: 0,
            weight_pair: 0,
            weight_sec_diff: 0,
            pen_game_min: 0,
            pen_prac_min: 0,
            pen_not_paired: 0,
            pen_section: 0,
        }
    }

    fn model(max_fill: &[u32], participants: u32, locks: &[(u32, u32)]) -> ProblemModel {
        ProblemModel {
            slots: max_fill
                .iter()
                .enumerate()
                .map(|(i, &max)| Slot {
                    id: i as u32,
                    category: SlotCategory::Game,
                    min_fill: 0,
                    max_fill: max,
                })
                .collect(),
            participants: (0..participants)
                .map(|id| Participant {
                    id,
                    pairing_group: None,
                    preferences: vec![],
                })
                .collect(),
            pre_assignments: locks
                .iter()
                .map(|&(participant_id, slot_id)| PreAssignment {
                    participant_id,
                    slot_id,
                })
                .collect(),
        }
    }

    #[test]
    fn test_two_locks_into_single_seat_is_infeasible() {
        let index = ProblemIndex::new(&model(&[1, 3], 2, &[(0, 0), (1, 0)])).unwrap();
        assert_eq!(
            FeasibilityRules::new(&index).unwrap_err(),
            StructuralInfeasibility::LockedOverCapacity {
                slot_id: 0,
                locked: 2,
                max_fill: 1
            }
        );
    }

    #[test]
    fn test_lock_filling_slot_routes_others_elsewhere() {
        let index = ProblemIndex::new(&model(&[1, 3], 2, &[(0, 0)])).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        assert_eq!(rules.locked_slot(0), Some(0));
        assert!(!rules.is_locked(1));

        let cost_model = CostModel::new(&index, zero_costs());
        let state = AssignmentState::seed(&index, &rules, &cost_model).unwrap();
        assert_eq!(state.slot_of(0), 0);
        assert_eq!(state.slot_of(1), 1);
    }

    #[test]
    fn test_total_capacity_below_participants_is_infeasible() {
        let index = ProblemIndex::new(&model(&[1, 1], 3, &[])).unwrap();
        assert_eq!(
            FeasibilityRules::new(&index).unwrap_err(),
            StructuralInfeasibility::InsufficientCapacity {
                participants: 3,
                capacity: 2
            }
        );
    }

    #[test]
    fn test_legal_move_checks() {
        let index = ProblemIndex::new(&model(&[2, 1, 2], 3, &[(0, 0)])).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, zero_costs());
        // 0 locked in slot 0, 1 in slot 1 (full), 2 in slot 2
        let state = AssignmentState::from_slots(vec![0, 1, 2], &index, &rules, &cost_model);

        assert!(!rules.is_legal_move(0, 0, 2, &state), "locked participant");
        assert!(!rules.is_legal_move(2, 2, 1, &state), "target at maxFill");
        assert!(!rules.is_legal_move(2, 2, 2, &state), "same slot");
        assert!(!rules.is_legal_move(2, 0, 1, &state), "stale source slot");
        assert!(rules.is_legal_move(2, 2, 0, &state));
        assert!(rules.is_legal_move(1, 1, 2, &state));

        assert!(rules.is_legal_swap(1, 2, &state));
        assert!(!rules.is_legal_swap(0, 2, &state));
        assert!(!rules.is_legal_swap(2, 2, &state));
    }
}
