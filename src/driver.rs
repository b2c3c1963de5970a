use crate::cost::CostModel;
use crate::data::MoveOrder;
use crate::feasibility::FeasibilityRules;
use crate::problem::ProblemIndex;
use crate::state::AssignmentState;
use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;
use std::cmp::Reverse;

/// A single step through the assignment space, over dense indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// Moves one participant into another slot.
    Reassign {
        participant: usize,
        from: usize,
        to: usize,
    },
    /// Exchanges the slots of two participants. Occupancy is unchanged.
    Swap {
        first: usize,
        first_slot: usize,
        second: usize,
        second_slot: usize,
    },
}

impl Move {
    /// The slot `participant` ends up in, if this move relocates it.
    #[inline]
    pub fn relocation(&self, participant: usize) -> Option<usize> {
        match *self {
            Move::Reassign {
                participant: p, to, ..
            } if p == participant => Some(to),
            Move::Swap {
                first, second_slot, ..
            } if first == participant => Some(second_slot),
            Move::Swap {
                second, first_slot, ..
            } if second == participant => Some(first_slot),
            _ => None,
        }
    }

    pub fn inverse(&self) -> Move {
        match *self {
            Move::Reassign {
                participant,
                from,
                to,
            } => Move::Reassign {
                participant,
                from: to,
                to: from,
            },
            Move::Swap {
                first,
                first_slot,
                second,
                second_slot,
            } => Move::Swap {
                first,
                first_slot: second_slot,
                second,
                second_slot: first_slot,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reassign { pos: usize, target: usize },
    Swap { i: usize, j: usize },
    Done,
}

/// Lazy, finite enumeration of the legal moves from one state.
///
/// Every legal reassignment comes first, participant by participant, then
/// every legal swap. Each call to [`SearchDriver::propose_moves`] starts a
/// fresh sequence.
#[derive(Debug)]
pub struct MoveSequence<'a> {
    rules: &'a FeasibilityRules,
    index: &'a ProblemIndex,
    state: &'a AssignmentState,
    guided: bool,
    participants: Vec<usize>,
    slot_order: Vec<usize>,
    targets: Vec<usize>,
    phase: Phase,
}

impl MoveSequence<'_> {
    fn load_targets(&mut self, participant: usize) {
        self.targets.clear();
        if !self.guided {
            self.targets.extend_from_slice(&self.slot_order);
            return;
        }
        let (index, state) = (self.index, self.state);
        let mates = index
            .group_of(participant)
            .map(|g| index.group_members(g))
            .unwrap_or_default()
            .iter()
            .map(|&m| state.slot_of(m));
        let underfilled = self
            .slot_order
            .iter()
            .copied()
            .filter(|&s| state.occupancy(s) < index.min_fill(s));
        let ordered = index
            .preferences(participant)
            .iter()
            .copied()
            .chain(mates)
            .chain(underfilled)
            .chain(self.slot_order.iter().copied())
            .unique();
        self.targets.extend(ordered);
    }
}

impl Iterator for MoveSequence<'_> {
    type Item = Move;

    fn next(&mut self) -> Option<Move> {
        loop {
            match self.phase {
                Phase::Reassign { pos, target } => {
                    let Some(&participant) = self.participants.get(pos) else {
                        self.phase = Phase::Swap { i: 0, j: 1 };
                        continue;
                    };
                    if target == 0 {
                        self.load_targets(participant);
                    }
                    let Some(&to) = self.targets.get(target) else {
                        self.phase = Phase::Reassign {
                            pos: pos + 1,
                            target: 0,
                        };
                        continue;
                    };
                    self.phase = Phase::Reassign {
                        pos,
                        target: target + 1,
                    };
                    let from = self.state.slot_of(participant);
                    if self.rules.is_legal_move(participant, from, to, self.state) {
                        return Some(Move::Reassign {
                            participant,
                            from,
                            to,
                        });
                    }
                }
                Phase::Swap { i, j } => {
                    if i >= self.participants.len() {
                        self.phase = Phase::Done;
                        continue;
                    }
                    if j >= self.participants.len() {
                        self.phase = Phase::Swap { i: i + 1, j: i + 2 };
                        continue;
                    }
                    self.phase = Phase::Swap { i, j: j + 1 };
                    let (first, second) = (self.participants[i], self.participants[j]);
                    if self.rules.is_legal_swap(first, second, self.state) {
                        return Some(Move::Swap {
                            first,
                            first_slot: self.state.slot_of(first),
                            second,
                            second_slot: self.state.slot_of(second),
                        });
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}

/// Generates and applies moves for the goal controller.
#[derive(Debug, Clone, Copy)]
pub struct SearchDriver<'a> {
    rules: &'a FeasibilityRules,
    cost_model: CostModel<'a>,
    order: MoveOrder,
}

impl<'a> SearchDriver<'a> {
    pub fn new(rules: &'a FeasibilityRules, cost_model: CostModel<'a>, order: MoveOrder) -> Self {
        Self {
            rules,
            cost_model,
            order,
        }
    }

    #[inline]
    pub fn cost_model(&self) -> &CostModel<'a> {
        &self.cost_model
    }

    /// Starts a new pass over the neighborhood of `state`.
    ///
    /// Preference-guided order puts participants in split pairing groups
    /// first, then the ones furthest from their top choice. Randomised order
    /// shuffles participants and slots with `rng`.
    pub fn propose_moves<'s, R>(
        &'s self,
        state: &'s AssignmentState,
        rng: &mut R,
    ) -> MoveSequence<'s>
    where
        R: Rng + ?Sized,
    {
        let index = self.cost_model.index();
        let unlocked = (0..index.num_participants()).filter(|&p| !self.rules.is_locked(p));
        let mut slot_order: Vec<usize> = (0..index.num_slots()).collect();

        let participants = match self.order {
            MoveOrder::PreferenceGuided => unlocked
                .sorted_by_key(|&p| {
                    let split = index
                        .group_of(p)
                        .is_some_and(|g| self.cost_model.is_split(g, |m| state.slot_of(m)));
                    Reverse((split, index.preference_rank(p, state.slot_of(p))))
                })
                .collect(),
            MoveOrder::Randomized => {
                let mut participants: Vec<usize> = unlocked.collect();
                participants.shuffle(rng);
                slot_order.shuffle(rng);
                participants
            }
        };

        MoveSequence {
            rules: self.rules,
            index,
            state,
            guided: self.order == MoveOrder::PreferenceGuided,
            participants,
            slot_order,
            targets: Vec::with_capacity(index.num_slots()),
            phase: Phase::Reassign { pos: 0, target: 0 },
        }
    }

    /// Applies `mv` in place and hands the state back for chaining.
    pub fn apply_move<'s>(
        &self,
        state: &'s mut AssignmentState,
        mv: &Move,
    ) -> &'s mut AssignmentState {
        let delta = self.cost_model.delta_cost(state, mv);
        state.apply(mv, delta);
        state
    }

    /// Reverses a move previously applied to `state`.
    pub fn undo_move<'s>(
        &self,
        state: &'s mut AssignmentState,
        mv: &Move,
    ) -> &'s mut AssignmentState {
        self.apply_move(state, &mv.inverse())
    }
}

/// Applied moves, newest last, so a run can walk back without copying state.
#[derive(Debug, Clone, Default)]
pub struct MoveLog {
    moves: Vec<Move>,
}

impl MoveLog {
    #[inline]
    pub fn record(&mut self, mv: Move) {
        self.moves.push(mv);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.moves.clear();
    }

    /// Undoes every recorded move, newest first, and empties the log.
    pub fn rollback(&mut self, driver: &SearchDriver<'_>, state: &mut AssignmentState) {
        while let Some(mv) = self.moves.pop() {
            driver.undo_move(state, &mv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CostConfig, Participant, PreAssignment, ProblemModel, Slot, SlotCategory};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn costs() -> CostConfig {
        CostConfig {
            weight_min_filled: 1,
            weight_pref: 2,
            weight_pair: 3,
            weight_sec_diff: 1,
            pen_game_min: 1,
            pen_prac_min: 1,
            pen_not_paired: 4,
            pen_section: 1,
        }
    }

    fn model() -> ProblemModel {
        let slot = |id, category, max_fill| Slot {
            id,
            category,
            min_fill: 1,
            max_fill,
        };
        ProblemModel {
            slots: vec![
                slot(0, SlotCategory::Game, 2),
                slot(1, SlotCategory::Section, 3),
                slot(2, SlotCategory::Section, 1),
                slot(3, SlotCategory::Practice, 2),
            ],
            participants: vec![
                Participant {
                    id: 0,
                    pairing_group: Some(1),
                    preferences: vec![0],
                },
                Participant {
                    id: 1,
                    pairing_group: Some(1),
                    preferences: vec![3, 1],
                },
                Participant {
                    id: 2,
                    pairing_group: None,
                    preferences: vec![2],
                },
                Participant {
                    id: 3,
                    pairing_group: None,
                    preferences: vec![],
                },
                Participant {
                    id: 4,
                    pairing_group: None,
                    preferences: vec![1],
                },
            ],
            pre_assignments: vec![PreAssignment {
                participant_id: 4,
                slot_id: 1,
            }],
        }
    }

    /// Brute-force list of every legal move.
    fn legal_moves(
        rules: &FeasibilityRules,
        state: &AssignmentState,
        n: usize,
        m: usize,
    ) -> HashSet<Move> {
        let mut moves = HashSet::new();
        for p in 0..n {
            for to in 0..m {
                if rules.is_legal_move(p, state.slot_of(p), to, state) {
                    moves.insert(Move::Reassign {
                        participant: p,
                        from: state.slot_of(p),
                        to,
                    });
                }
            }
            for q in 0..n {
                if p < q && rules.is_legal_swap(p, q, state) {
                    moves.insert(Move::Swap {
                        first: p,
                        first_slot: state.slot_of(p),
                        second: q,
                        second_slot: state.slot_of(q),
                    });
                }
            }
        }
        moves
    }

    #[test]
    fn test_sequence_is_complete_for_both_orders() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let state = AssignmentState::seed(&index, &rules, &cost_model).unwrap();
        let expected = legal_moves(&rules, &state, index.num_participants(), index.num_slots());
        assert!(!expected.is_empty());

        let mut rng = StdRng::seed_from_u64(7);
        for order in [MoveOrder::PreferenceGuided, MoveOrder::Randomized] {
            let driver = SearchDriver::new(&rules, cost_model, order);
            let proposed: Vec<Move> = driver.propose_moves(&state, &mut rng).collect();
            let unique: HashSet<Move> = proposed.iter().copied().collect();
            assert_eq!(unique.len(), proposed.len(), "{order:?} repeats a move");
            assert_eq!(unique, expected, "{order:?}");
        }
    }

    #[test]
    fn test_locked_participants_never_move() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let state = AssignmentState::seed(&index, &rules, &cost_model).unwrap();
        let driver = SearchDriver::new(&rules, cost_model, MoveOrder::PreferenceGuided);
        let mut rng = StdRng::seed_from_u64(0);
        for mv in driver.propose_moves(&state, &mut rng) {
            assert_eq!(mv.relocation(4), None, "{mv:?} moves a locked participant");
        }
    }

    #[test]
    fn test_guided_order_starts_with_preferred_slot() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        // pair 0/1 split, 1 far from its top choice
        let state = AssignmentState::from_slots(vec![0, 1, 2, 0, 1], &index, &rules, &cost_model);
        let driver = SearchDriver::new(&rules, cost_model, MoveOrder::PreferenceGuided);
        let mut rng = StdRng::seed_from_u64(0);
        let first = driver.propose_moves(&state, &mut rng).next();
        assert_eq!(
            first,
            Some(Move::Reassign {
                participant: 1,
                from: 1,
                to: 3
            })
        );
    }

    #[test]
    fn test_guided_order_tries_underfilled_slots_before_the_rest() {
        let slot = |id, category, min_fill| Slot {
            id,
            category,
            min_fill,
            max_fill: 3,
        };
        let loose = |id| Participant {
            id,
            pairing_group: None,
            preferences: vec![],
        };
        let model = ProblemModel {
            slots: vec![
                slot(10, SlotCategory::Game, 0),
                slot(11, SlotCategory::Practice, 0),
                slot(12, SlotCategory::Practice, 2),
            ],
            participants: vec![loose(0), loose(1)],
            pre_assignments: vec![],
        };
        let index = ProblemIndex::new(&model).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let state = AssignmentState::from_slots(vec![0, 0], &index, &rules, &cost_model);
        let driver = SearchDriver::new(&rules, cost_model, MoveOrder::PreferenceGuided);

        let first = driver
            .propose_moves(&state, &mut StdRng::seed_from_u64(0))
            .next();
        assert_eq!(
            first,
            Some(Move::Reassign {
                participant: 0,
                from: 0,
                to: 2
            })
        );
    }

    #[test]
    fn test_randomized_order_is_reproducible() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let state = AssignmentState::seed(&index, &rules, &cost_model).unwrap();
        let driver = SearchDriver::new(&rules, cost_model, MoveOrder::Randomized);
        let a: Vec<Move> = driver
            .propose_moves(&state, &mut StdRng::seed_from_u64(99))
            .collect();
        let b: Vec<Move> = driver
            .propose_moves(&state, &mut StdRng::seed_from_u64(99))
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_move_log_rollback_restores_state() {
        let index = ProblemIndex::new(&model()).unwrap();
        let rules = FeasibilityRules::new(&index).unwrap();
        let cost_model = CostModel::new(&index, costs());
        let original = AssignmentState::seed(&index, &rules, &cost_model).unwrap();
        let driver = SearchDriver::new(&rules, cost_model, MoveOrder::Randomized);
        let mut rng = StdRng::seed_from_u64(3);

        let mut state = original.clone();
        let mut log = MoveLog::default();
        for _ in 0..4 {
            let Some(mv) = driver.propose_moves(&state, &mut rng).next() else {
                break;
            };
            driver.apply_move(&mut state, &mv);
            log.record(mv);
            assert!(state.is_consistent(&cost_model));
        }
        assert_eq!(log.len(), 4);
        log.rollback(&driver, &mut state);
        assert!(log.is_empty());
        assert_eq!(state, original);
    }

    #[test]
    fn test_inverse_and_relocation() {
        let mv = Move::Swap {
            first: 1,
            first_slot: 4,
            second: 2,
            second_slot: 5,
        };
        assert_eq!(mv.relocation(1), Some(5));
        assert_eq!(mv.relocation(2), Some(4));
        assert_eq!(mv.relocation(3), None);
        assert_eq!(mv.inverse().inverse(), mv);

        let mv = Move::Reassign {
            participant: 0,
            from: 1,
            to: 2,
        };
        assert_eq!(
            mv.inverse(),
            Move::Reassign {
                participant: 0,
                from: 2,
                to: 1
            }
        );
    }
}
