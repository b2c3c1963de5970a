use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cost::CostBreakdown;
use crate::error::ConfigurationError;
use crate::goal::SearchStatus;

// Type aliases for clarity
pub type SlotId = u32;
pub type ParticipantId = u32;
pub type GroupId = u32;

/// The kind of activity a slot hosts. Decides which penalty class applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotCategory {
    Game,
    Practice,
    Section,
}

impl fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotCategory::Game => write!(f, "game"),
            SlotCategory::Practice => write!(f, "practice"),
            SlotCategory::Section => write!(f, "section"),
        }
    }
}

/// A schedulable activity instance with occupancy bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: SlotId,
    pub category: SlotCategory,
    pub min_fill: u32,
    pub max_fill: u32,
}

/// Someone who has to be placed in exactly one slot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(default)]
    pub pairing_group: Option<GroupId>,
    /// Slots in order of preference, most wanted first.
    #[serde(default)]
    pub preferences: Vec<SlotId>,
}

/// Binds a participant to a slot for the whole search.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAssignment {
    pub participant_id: ParticipantId,
    pub slot_id: SlotId,
}

/// The parsed problem: slots, participants and pre-assignments.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemModel {
    pub slots: Vec<Slot>,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub pre_assignments: Vec<PreAssignment>,
}

// diagnostic dump of the parsed structure
impl fmt::Display for ProblemModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Slots:")?;
        for slot in &self.slots {
            writeln!(
                f,
                "  {} [{}] fill {}..={}",
                slot.id, slot.category, slot.min_fill, slot.max_fill
            )?;
        }
        writeln!(f, "Participants:")?;
        for participant in &self.participants {
            write!(f, "  {}", participant.id)?;
            if let Some(group) = participant.pairing_group {
                write!(f, " group {}", group)?;
            }
            writeln!(f, " prefers {:?}", participant.preferences)?;
        }
        writeln!(f, "Pre-assignments:")?;
        for pre in &self.pre_assignments {
            writeln!(f, "  {} -> {}", pre.participant_id, pre.slot_id)?;
        }
        Ok(())
    }
}

/// Largest weight or penalty accepted before looking at the problem.
pub const MAX_COST_VALUE: i64 = u32::MAX as i64;

/// Most independent runs a single request may ask for.
pub const MAX_RESTARTS: usize = 256;

/// The four soft-constraint weights and four penalty magnitudes.
///
/// Every field is required. Values are signed on the wire so that a negative
/// number is reported by [`CostConfig::validate`] instead of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostConfig {
    pub weight_min_filled: i64,
    pub weight_pref: i64,
    pub weight_pair: i64,
    pub weight_sec_diff: i64,
    pub pen_game_min: i64,
    pub pen_prac_min: i64,
    pub pen_not_paired: i64,
    pub pen_section: i64,
}

impl CostConfig {
    /// Named fields in wire order.
    pub fn fields(&self) -> [(&'static str, i64); 8] {
        [
            ("weightMinFilled", self.weight_min_filled),
            ("weightPref", self.weight_pref),
            ("weightPair", self.weight_pair),
            ("weightSecDiff", self.weight_sec_diff),
            ("penGameMin", self.pen_game_min),
            ("penPracMin", self.pen_prac_min),
            ("penNotPaired", self.pen_not_paired),
            ("penSection", self.pen_section),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (field, value) in self.fields() {
            if value < 0 {
                return Err(ConfigurationError::NegativeValue { field, value });
            }
            if value > MAX_COST_VALUE {
                return Err(ConfigurationError::ValueTooLarge {
                    field,
                    value,
                    max: MAX_COST_VALUE,
                });
            }
        }
        Ok(())
    }
}

/// How the search driver orders candidate moves within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveOrder {
    #[default]
    PreferenceGuided,
    Randomized,
}

/// Geometric cooling for the annealing acceptance rule.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub min_temperature: f64,
}

/// Budget and strategy for the search loop.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub max_iterations: u64,
    pub time_limit_ms: Option<u64>,
    pub move_order: MoveOrder,
    pub annealing: Option<AnnealingConfig>,
    pub restarts: usize,
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            time_limit_ms: None,
            move_order: MoveOrder::PreferenceGuided,
            annealing: None,
            restarts: 1,
            seed: 1234,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.restarts == 0 {
            return Err(ConfigurationError::InvalidSearchParameter {
                field: "restarts",
                reason: "at least one run is required",
            });
        }
        if self.restarts > MAX_RESTARTS {
            return Err(ConfigurationError::InvalidSearchParameter {
                field: "restarts",
                reason: "at most 256 runs are allowed",
            });
        }
        if let Some(annealing) = &self.annealing {
            if !annealing.initial_temperature.is_finite() || annealing.initial_temperature <= 0.0 {
                return Err(ConfigurationError::InvalidSearchParameter {
                    field: "annealing.initialTemperature",
                    reason: "must be a positive finite number",
                });
            }
            if !(annealing.cooling_rate > 0.0 && annealing.cooling_rate < 1.0) {
                return Err(ConfigurationError::InvalidSearchParameter {
                    field: "annealing.coolingRate",
                    reason: "must lie strictly between 0 and 1",
                });
            }
            if !annealing.min_temperature.is_finite() || annealing.min_temperature < 0.0 {
                return Err(ConfigurationError::InvalidSearchParameter {
                    field: "annealing.minTemperature",
                    reason: "must be a non-negative finite number",
                });
            }
        }
        Ok(())
    }
}

/// The complete input for one solve call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub problem: ProblemModel,
    pub costs: CostConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Where one participant ended up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantAssignment {
    pub participant_id: ParticipantId,
    pub slot_id: SlotId,
    pub locked: bool,
}

/// Describes a soft constraint that was not met in the final assignment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub status: SearchStatus,
    pub assignments: Vec<ParticipantAssignment>,
    pub cost: CostBreakdown,
    pub total_cost: i64,
    pub iterations: u64,
    pub elapsed_ms: u128,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}
