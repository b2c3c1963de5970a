use std::fmt;

use crate::data::{ParticipantId, SlotId};

/// A weight, penalty or search parameter is out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    NegativeValue {
        field: &'static str,
        value: i64,
    },
    ValueTooLarge {
        field: &'static str,
        value: i64,
        max: i64,
    },
    InvalidSearchParameter {
        field: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeValue { field, value } => {
                write!(f, "{} must be non-negative, got {}", field, value)
            }
            Self::ValueTooLarge { field, value, max } => {
                write!(f, "{} must be at most {}, got {}", field, max, value)
            }
            Self::InvalidSearchParameter { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// The problem references things that do not exist or contradicts itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidModel {
    DuplicateSlot(SlotId),
    DuplicateParticipant(ParticipantId),
    UnknownPreferredSlot {
        participant_id: ParticipantId,
        slot_id: SlotId,
    },
    UnknownPreAssignedSlot {
        participant_id: ParticipantId,
        slot_id: SlotId,
    },
    UnknownParticipant(ParticipantId),
    ConflictingPreAssignment(ParticipantId),
    InvertedBounds {
        slot_id: SlotId,
        min_fill: u32,
        max_fill: u32,
    },
}

impl fmt::Display for InvalidModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSlot(id) => write!(f, "Slot {} is defined more than once", id),
            Self::DuplicateParticipant(id) => {
                write!(f, "Participant {} is defined more than once", id)
            }
            Self::UnknownPreferredSlot {
                participant_id,
                slot_id,
            } => write!(
                f,
                "Participant {} prefers unknown slot {}",
                participant_id, slot_id
            ),
            Self::UnknownPreAssignedSlot {
                participant_id,
                slot_id,
            } => write!(
                f,
                "Participant {} is pre-assigned to unknown slot {}",
                participant_id, slot_id
            ),
            Self::UnknownParticipant(id) => {
                write!(f, "Pre-assignment names unknown participant {}", id)
            }
            Self::ConflictingPreAssignment(id) => {
                write!(f, "Participant {} is pre-assigned more than once", id)
            }
            Self::InvertedBounds {
                slot_id,
                min_fill,
                max_fill,
            } => write!(
                f,
                "Slot {} has minFill {} above maxFill {}",
                slot_id, min_fill, max_fill
            ),
        }
    }
}

impl std::error::Error for InvalidModel {}

/// Pre-assignments and hard capacities cannot be satisfied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralInfeasibility {
    LockedOverCapacity {
        slot_id: SlotId,
        locked: u32,
        max_fill: u32,
    },
    InsufficientCapacity {
        participants: usize,
        capacity: u64,
    },
}

impl fmt::Display for StructuralInfeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockedOverCapacity {
                slot_id,
                locked,
                max_fill,
            } => write!(
                f,
                "Slot {} has {} locked participants but maxFill {}",
                slot_id, locked, max_fill
            ),
            Self::InsufficientCapacity {
                participants,
                capacity,
            } => write!(
                f,
                "{} participants do not fit into a total capacity of {}",
                participants, capacity
            ),
        }
    }
}

impl std::error::Error for StructuralInfeasibility {}

/// Everything that aborts a run before the search loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    Configuration(ConfigurationError),
    InvalidModel(InvalidModel),
    Infeasible(StructuralInfeasibility),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "Configuration error: {}", e),
            Self::InvalidModel(e) => write!(f, "Invalid problem: {}", e),
            Self::Infeasible(e) => write!(f, "Structural infeasibility: {}", e),
        }
    }
}

impl std::error::Error for SolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::InvalidModel(e) => Some(e),
            Self::Infeasible(e) => Some(e),
        }
    }
}

impl From<ConfigurationError> for SolveError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<InvalidModel> for SolveError {
    fn from(e: InvalidModel) -> Self {
        Self::InvalidModel(e)
    }
}

impl From<StructuralInfeasibility> for SolveError {
    fn from(e: StructuralInfeasibility) -> Self {
        Self::Infeasible(e)
    }
}
