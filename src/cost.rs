use crate::data::{CostConfig, SlotCategory, UnmetSoftConstraint};
use crate::driver::Move;
use crate::error::ConfigurationError;
use crate::problem::ProblemIndex;
use crate::state::AssignmentState;
use itertools::Itertools;
use serde::Serialize;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Cost split by term: four weighted soft terms and four penalty surcharges.
///
/// Full evaluations only ever hold non-negative components. Deltas use the
/// same type and may be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub min_filled: i64,
    pub preference: i64,
    pub pairing: i64,
    pub section_diff: i64,
    pub game_min: i64,
    pub practice_min: i64,
    pub not_paired: i64,
    pub section: i64,
}

impl CostBreakdown {
    #[inline]
    pub fn total(&self) -> i64 {
        self.min_filled
            + self.preference
            + self.pairing
            + self.section_diff
            + self.game_min
            + self.practice_min
            + self.not_paired
            + self.section
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

macro_rules! componentwise {
    ($op_trait:ident, $op_fn:ident, $assign_trait:ident, $assign_fn:ident, $op:tt) => {
        impl $op_trait for CostBreakdown {
            type Output = CostBreakdown;

            #[inline]
            fn $op_fn(self, rhs: CostBreakdown) -> CostBreakdown {
                CostBreakdown {
                    min_filled: self.min_filled $op rhs.min_filled,
                    preference: self.preference $op rhs.preference,
                    pairing: self.pairing $op rhs.pairing,
                    section_diff: self.section_diff $op rhs.section_diff,
                    game_min: self.game_min $op rhs.game_min,
                    practice_min: self.practice_min $op rhs.practice_min,
                    not_paired: self.not_paired $op rhs.not_paired,
                    section: self.section $op rhs.section,
                }
            }
        }

        impl $assign_trait for CostBreakdown {
            #[inline]
            fn $assign_fn(&mut self, rhs: CostBreakdown) {
                *self = *self $op rhs;
            }
        }
    };
}

componentwise!(Add, add, AddAssign, add_assign, +);
componentwise!(Sub, sub, SubAssign, sub_assign, -);

impl Neg for CostBreakdown {
    type Output = CostBreakdown;

    #[inline]
    fn neg(self) -> CostBreakdown {
        CostBreakdown::default() - self
    }
}

impl std::iter::Sum for CostBreakdown {
    fn sum<I: Iterator<Item = CostBreakdown>>(iter: I) -> Self {
        iter.fold(CostBreakdown::default(), Add::add)
    }
}

/// Largest value any single weighted term may reach. Eight of them, and the
/// differences taken while pricing a move, stay well inside `i64`.
const MAX_TERM: i64 = i64::MAX / 32;

/// Prices assignments. Never mutates the state it looks at.
#[derive(Debug, Clone, Copy)]
pub struct CostModel<'a> {
    index: &'a ProblemIndex,
    config: CostConfig,
}

impl<'a> CostModel<'a> {
    pub fn new(index: &'a ProblemIndex, config: CostConfig) -> Self {
        Self { index, config }
    }

    #[inline]
    pub fn index(&self) -> &'a ProblemIndex {
        self.index
    }

    /// Rejects weights that could overflow a cost on this problem.
    ///
    /// Each value is multiplied by the largest count its term can see, e.g.
    /// the summed minimum fill for `weightMinFilled`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let index = self.index;
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        let slots_of = |category: SlotCategory| {
            count(
                (0..index.num_slots())
                    .filter(|&s| index.category(s) == category)
                    .count(),
            )
        };
        let total_min_fill: i64 = (0..index.num_slots())
            .map(|s| i64::from(index.min_fill(s)))
            .sum();
        let total_ranks = count(
            (0..index.num_participants())
                .map(|p| index.preferences(p).len())
                .sum(),
        );
        let groups = count(index.num_groups());
        let magnitudes = [
            total_min_fill,
            total_ranks,
            groups,
            count(index.num_participants()),
            slots_of(SlotCategory::Game),
            slots_of(SlotCategory::Practice),
            groups,
            1,
        ];

        for ((field, value), magnitude) in self.config.fields().into_iter().zip(magnitudes) {
            if value.checked_mul(magnitude).is_none_or(|term| term > MAX_TERM) {
                return Err(ConfigurationError::ValueTooLarge {
                    field,
                    value,
                    max: MAX_TERM / magnitude.max(1),
                });
            }
        }
        Ok(())
    }

    /// Evaluates every term from scratch.
    pub fn full_cost(&self, state: &AssignmentState) -> CostBreakdown {
        self.evaluate(state.assignment(), state.occupancies())
    }

    /// Evaluates a raw participant→slot mapping with its occupancy counts.
    pub(crate) fn evaluate(&self, slot_of: &[usize], occupancy: &[u32]) -> CostBreakdown {
        let slots: CostBreakdown = occupancy
            .iter()
            .enumerate()
            .map(|(slot, &occ)| self.slot_terms(slot, occ))
            .sum();
        let participants: CostBreakdown = slot_of
            .iter()
            .enumerate()
            .map(|(p, &slot)| self.participant_terms(p, slot))
            .sum();
        let groups: CostBreakdown = (0..self.index.num_groups())
            .map(|g| self.group_terms(g, |p| slot_of[p]))
            .sum();
        slots + participants + groups + self.section_terms(|s| occupancy[s])
    }

    /// Cost change if `mv` were applied to `state`.
    ///
    /// Only the slots, participants and pairing groups the move touches are
    /// evaluated. The result equals `full_cost(after) - full_cost(before)`.
    pub fn delta_cost(&self, state: &AssignmentState, mv: &Move) -> CostBreakdown {
        let after = |p: usize| mv.relocation(p).unwrap_or_else(|| state.slot_of(p));
        let before = |p: usize| state.slot_of(p);

        match *mv {
            Move::Reassign {
                participant,
                from,
                to,
            } => {
                let occ_from = state.occupancy(from);
                let occ_to = state.occupancy(to);
                let mut delta = self.slot_terms(from, occ_from.saturating_sub(1))
                    - self.slot_terms(from, occ_from)
                    + self.slot_terms(to, occ_to + 1)
                    - self.slot_terms(to, occ_to);

                delta += self.participant_terms(participant, to)
                    - self.participant_terms(participant, from);

                if let Some(group) = self.index.group_of(participant) {
                    delta += self.group_terms(group, after) - self.group_terms(group, before);
                }

                if self.index.category(from) == SlotCategory::Section
                    || self.index.category(to) == SlotCategory::Section
                {
                    let shifted = |s: usize| {
                        let occ = state.occupancy(s);
                        if s == from {
                            occ.saturating_sub(1)
                        } else if s == to {
                            occ + 1
                        } else {
                            occ
                        }
                    };
                    delta += self.section_terms(shifted)
                        - self.section_terms(|s| state.occupancy(s));
                }
                delta
            }
            Move::Swap {
                first,
                first_slot,
                second,
                second_slot,
            } => {
                let mut delta = self.participant_terms(first, second_slot)
                    - self.participant_terms(first, first_slot)
                    + self.participant_terms(second, first_slot)
                    - self.participant_terms(second, second_slot);

                let groups = [self.index.group_of(first), self.index.group_of(second)];
                for group in groups.into_iter().flatten().unique() {
                    delta += self.group_terms(group, after) - self.group_terms(group, before);
                }
                delta
            }
        }
    }

    /// Human-readable list of every soft constraint the state violates.
    pub fn unmet_constraints(&self, state: &AssignmentState) -> Vec<UnmetSoftConstraint> {
        let index = self.index;
        let mut unmet = Vec::new();

        for slot in 0..index.num_slots() {
            let occ = state.occupancy(slot);
            if occ < index.min_fill(slot) {
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Minimum Fill".to_string(),
                    description: format!(
                        "Slot {} ({}) holds {} participants but needs at least {}.",
                        index.slot_id(slot),
                        index.category(slot),
                        occ,
                        index.min_fill(slot)
                    ),
                });
            }
        }

        for p in 0..index.num_participants() {
            let slot = state.slot_of(p);
            let rank = index.preference_rank(p, slot);
            if rank > 0 {
                let top = index.preferences(p)[0];
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Preference".to_string(),
                    description: format!(
                        "Participant {} is in slot {} instead of top choice {} (rank distance {}).",
                        index.participant_id(p),
                        index.slot_id(slot),
                        index.slot_id(top),
                        rank
                    ),
                });
            }
        }

        for group in 0..index.num_groups() {
            let members = index.group_members(group);
            if self.is_split(group, |p| state.slot_of(p)) {
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Pairing".to_string(),
                    description: format!(
                        "Participants {} are split across slots {}.",
                        members.iter().map(|&p| index.participant_id(p)).join(", "),
                        members
                            .iter()
                            .map(|&p| index.slot_id(state.slot_of(p)))
                            .unique()
                            .join(", ")
                    ),
                });
            }
        }

        if let Some((low, high)) = self.section_spread(|s| state.occupancy(s)) {
            if high - low > 1 {
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Section Balance".to_string(),
                    description: format!(
                        "Section sizes range from {} to {} participants.",
                        low, high
                    ),
                });
            }
        }

        unmet
    }

    /// Whether a pairing group's members occupy more than one slot.
    pub fn is_split(&self, group: usize, slot_of: impl Fn(usize) -> usize) -> bool {
        self.index
            .group_members(group)
            .iter()
            .map(|&p| slot_of(p))
            .dedup()
            .nth(1)
            .is_some()
    }

    fn slot_terms(&self, slot: usize, occupancy: u32) -> CostBreakdown {
        let deficit = i64::from(self.index.min_fill(slot).saturating_sub(occupancy));
        let mut terms = CostBreakdown {
            min_filled: self.config.weight_min_filled * deficit,
            ..CostBreakdown::default()
        };
        if deficit > 0 {
            match self.index.category(slot) {
                SlotCategory::Game => terms.game_min = self.config.pen_game_min,
                SlotCategory::Practice => terms.practice_min = self.config.pen_prac_min,
                SlotCategory::Section => {}
            }
        }
        terms
    }

    fn participant_terms(&self, participant: usize, slot: usize) -> CostBreakdown {
        CostBreakdown {
            preference: self.config.weight_pref
                * i64::from(self.index.preference_rank(participant, slot)),
            ..CostBreakdown::default()
        }
    }

    fn group_terms(&self, group: usize, slot_of: impl Fn(usize) -> usize) -> CostBreakdown {
        if self.is_split(group, slot_of) {
            CostBreakdown {
                pairing: self.config.weight_pair,
                not_paired: self.config.pen_not_paired,
                ..CostBreakdown::default()
            }
        } else {
            CostBreakdown::default()
        }
    }

    fn section_terms(&self, occupancy: impl Fn(usize) -> u32) -> CostBreakdown {
        let excess = match self.section_spread(occupancy) {
            Some((low, high)) => i64::from((high - low).saturating_sub(1)),
            None => 0,
        };
        if excess == 0 {
            return CostBreakdown::default();
        }
        CostBreakdown {
            section_diff: self.config.weight_sec_diff * excess,
            section: self.config.pen_section,
            ..CostBreakdown::default()
        }
    }

    /// Smallest and largest section occupancy, if there are at least two sections.
    fn section_spread(&self, occupancy: impl Fn(usize) -> u32) -> Option<(u32, u32)> {
        let sections = self.index.section_slots();
        if sections.len() < 2 {
            return None;
        }
        sections
            .iter()
            .map(|&s| occupancy(s))
            .minmax()
            .into_option()
    }
}
