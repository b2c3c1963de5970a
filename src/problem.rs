use crate::data::{ParticipantId, ProblemModel, SlotCategory, SlotId};
use crate::error::InvalidModel;
use itertools::Itertools;
use std::collections::HashMap;

/// Dense, validated view of a [`ProblemModel`].
///
/// Slots and participants are addressed by their position in the input
/// vectors from here on; ids only reappear when results are reported.
#[derive(Debug, Clone)]
pub struct ProblemIndex {
    slot_ids: Vec<SlotId>,
    categories: Vec<SlotCategory>,
    min_fill: Vec<u32>,
    max_fill: Vec<u32>,
    participant_ids: Vec<ParticipantId>,
    preferences: Vec<Vec<usize>>,
    group_of: Vec<Option<usize>>,
    groups: Vec<Vec<usize>>,
    section_slots: Vec<usize>,
    pre_assigned: Vec<Option<usize>>,
}

impl ProblemIndex {
    pub fn new(model: &ProblemModel) -> Result<Self, InvalidModel> {
        let mut slot_pos: HashMap<SlotId, usize> = HashMap::with_capacity(model.slots.len());
        for (pos, slot) in model.slots.iter().enumerate() {
            if slot_pos.insert(slot.id, pos).is_some() {
                return Err(InvalidModel::DuplicateSlot(slot.id));
            }
            if slot.min_fill > slot.max_fill {
                return Err(InvalidModel::InvertedBounds {
                    slot_id: slot.id,
                    min_fill: slot.min_fill,
                    max_fill: slot.max_fill,
                });
            }
        }

        let mut participant_pos: HashMap<ParticipantId, usize> =
            HashMap::with_capacity(model.participants.len());
        let mut preferences = Vec::with_capacity(model.participants.len());
        for (pos, participant) in model.participants.iter().enumerate() {
            if participant_pos.insert(participant.id, pos).is_some() {
                return Err(InvalidModel::DuplicateParticipant(participant.id));
            }
            let ranked = participant
                .preferences
                .iter()
                .map(|slot_id| {
                    slot_pos
                        .get(slot_id)
                        .copied()
                        .ok_or(InvalidModel::UnknownPreferredSlot {
                            participant_id: participant.id,
                            slot_id: *slot_id,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            // a repeated entry keeps its best rank
            preferences.push(ranked.into_iter().unique().collect());
        }

        let mut pre_assigned = vec![None; model.participants.len()];
        for pre in &model.pre_assignments {
            let participant = *participant_pos
                .get(&pre.participant_id)
                .ok_or(InvalidModel::UnknownParticipant(pre.participant_id))?;
            let slot = *slot_pos
                .get(&pre.slot_id)
                .ok_or(InvalidModel::UnknownPreAssignedSlot {
                    participant_id: pre.participant_id,
                    slot_id: pre.slot_id,
                })?;
            match pre_assigned[participant] {
                Some(existing) if existing != slot => {
                    return Err(InvalidModel::ConflictingPreAssignment(pre.participant_id));
                }
                _ => pre_assigned[participant] = Some(slot),
            }
        }

        // Groups are numbered in order of first appearance to stay deterministic.
        let members_by_group = model
            .participants
            .iter()
            .enumerate()
            .filter_map(|(pos, p)| p.pairing_group.map(|g| (g, pos)))
            .into_group_map();
        let group_order = model
            .participants
            .iter()
            .filter_map(|p| p.pairing_group)
            .unique()
            .collect_vec();
        let mut group_of = vec![None; model.participants.len()];
        let mut groups = Vec::with_capacity(group_order.len());
        for group_id in group_order {
            let members = members_by_group
                .get(&group_id)
                .cloned()
                .unwrap_or_default();
            for &member in &members {
                group_of[member] = Some(groups.len());
            }
            groups.push(members);
        }

        let section_slots = model
            .slots
            .iter()
            .positions(|s| s.category == SlotCategory::Section)
            .collect();

        Ok(Self {
            slot_ids: model.slots.iter().map(|s| s.id).collect(),
            categories: model.slots.iter().map(|s| s.category).collect(),
            min_fill: model.slots.iter().map(|s| s.min_fill).collect(),
            max_fill: model.slots.iter().map(|s| s.max_fill).collect(),
            participant_ids: model.participants.iter().map(|p| p.id).collect(),
            preferences,
            group_of,
            groups,
            section_slots,
            pre_assigned,
        })
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.slot_ids.len()
    }

    #[inline]
    pub fn num_participants(&self) -> usize {
        self.participant_ids.len()
    }

    #[inline]
    pub fn slot_id(&self, slot: usize) -> SlotId {
        self.slot_ids[slot]
    }

    #[inline]
    pub fn participant_id(&self, participant: usize) -> ParticipantId {
        self.participant_ids[participant]
    }

    #[inline]
    pub fn category(&self, slot: usize) -> SlotCategory {
        self.categories[slot]
    }

    #[inline]
    pub fn min_fill(&self, slot: usize) -> u32 {
        self.min_fill[slot]
    }

    #[inline]
    pub fn max_fill(&self, slot: usize) -> u32 {
        self.max_fill[slot]
    }

    /// Slot indices the participant asked for, best first.
    #[inline]
    pub fn preferences(&self, participant: usize) -> &[usize] {
        &self.preferences[participant]
    }

    /// Distance from the participant's top choice.
    ///
    /// An unlisted slot ranks behind every listed one; a participant without
    /// preferences is content anywhere.
    pub fn preference_rank(&self, participant: usize, slot: usize) -> u32 {
        let prefs = &self.preferences[participant];
        let rank = prefs.iter().position(|&s| s == slot).unwrap_or(prefs.len());
        rank as u32
    }

    #[inline]
    pub fn group_of(&self, participant: usize) -> Option<usize> {
        self.group_of[participant]
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn group_members(&self, group: usize) -> &[usize] {
        &self.groups[group]
    }

    #[inline]
    pub fn section_slots(&self) -> &[usize] {
        &self.section_slots
    }

    #[inline]
    pub fn pre_assigned(&self, participant: usize) -> Option<usize> {
        self.pre_assigned[participant]
    }
}
