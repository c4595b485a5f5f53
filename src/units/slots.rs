use crate::entities::actor::ActorId;
use crate::units::group::GroupId;
use crate::world::time::GameTick;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    group: GroupId,
    created_at: GameTick,
}

/// Fixed-size table of concurrently active groups per caster. Insertion
/// when full reports the group with the oldest creation tick for eviction;
/// the caller destroys it before completing the insert.
#[derive(Debug, Default)]
pub struct CasterSlots {
    max_per_caster: usize,
    by_caster: HashMap<ActorId, Vec<Slot>>,
}

impl CasterSlots {
    pub fn new(max_per_caster: usize) -> Self {
        Self {
            max_per_caster: max_per_caster.max(1),
            by_caster: HashMap::new(),
        }
    }

    /// Group that must be evicted before `caster` can hold another one, or
    /// `None` when a slot is free.
    pub fn eviction_candidate(&self, caster: ActorId) -> Option<GroupId> {
        let slots = self.by_caster.get(&caster)?;
        if slots.len() < self.max_per_caster {
            return None;
        }
        slots
            .iter()
            .min_by_key(|slot| slot.created_at)
            .map(|slot| slot.group)
    }

    /// Caller must have evicted first when the table was full.
    pub fn insert(&mut self, caster: ActorId, group: GroupId, created_at: GameTick) {
        let slots = self.by_caster.entry(caster).or_default();
        debug_assert!(slots.len() < self.max_per_caster);
        slots.push(Slot { group, created_at });
    }

    pub fn remove(&mut self, caster: ActorId, group: GroupId) {
        if let Some(slots) = self.by_caster.get_mut(&caster) {
            slots.retain(|slot| slot.group != group);
            if slots.is_empty() {
                self.by_caster.remove(&caster);
            }
        }
    }

    pub fn groups_of(&self, caster: ActorId) -> Vec<GroupId> {
        self.by_caster
            .get(&caster)
            .map(|slots| slots.iter().map(|slot| slot.group).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, caster: ActorId) -> usize {
        self.by_caster.get(&caster).map(Vec::len).unwrap_or(0)
    }
}
