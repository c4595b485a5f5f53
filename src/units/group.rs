use crate::combat::skills::{SkillId, UnitKind};
use crate::entities::actor::{ActorId, Affiliation, CategoryMask, TargetMask};
use crate::entities::status::StatusEffectKind;
use crate::units::unit::UnitId;
use crate::world::position::MapId;
use crate::world::time::GameTick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u32);

/// A caster-owned collection of skill units sharing one cast's identity and
/// lifecycle. Units never outlive their group.
#[derive(Debug, Clone)]
pub struct SkillUnitGroup {
    pub id: GroupId,
    pub caster: ActorId,
    /// Membership snapshot captured at creation for fast checks; the caster
    /// itself is re-resolved by id whenever it is actually needed.
    pub caster_affiliation: Affiliation,
    pub skill: SkillId,
    pub skill_lv: u8,
    pub unit_kind: UnitKind,
    pub map: MapId,
    pub created_at: GameTick,
    /// Nominal lifetime in ms; 0 marks a non-expiring aura group.
    pub limit: u64,
    /// Effect period; `None` leaves throttling to the per-entity tickset.
    pub interval: Option<u64>,
    pub target_mask: TargetMask,
    pub category_mask: CategoryMask,
    /// Footprint; fixed once placement finishes.
    pub units: Vec<UnitId>,
    pub alive_count: u32,
    pub song_dance: bool,
    pub aura: bool,
    pub caster_linked: bool,
    pub val1: i32,
    pub val2: i32,
    pub val3: i32,
    /// Companion group torn down together with this one.
    pub link_group: Option<GroupId>,
    pub linked_status: Option<StatusEffectKind>,
    /// Set once teardown has begun; guards re-entrant destruction.
    pub doomed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSpaceExhausted;

impl std::fmt::Display for IdSpaceExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skill unit group id space exhausted")
    }
}

impl std::error::Error for IdSpaceExhausted {}

/// Wraparound-safe group id allocator. Ids below the floor are reserved for
/// other object classes; allocation scans upward through the reuse range and
/// wraps, failing only when every id in the range is live.
#[derive(Debug, Clone)]
pub struct GroupIdAllocator {
    floor: u32,
    next: u32,
}

impl GroupIdAllocator {
    pub fn new(floor: u32) -> Self {
        Self { floor, next: floor }
    }

    pub fn alloc(&mut self, in_use: impl Fn(GroupId) -> bool) -> Result<GroupId, IdSpaceExhausted> {
        let span = (u32::MAX - self.floor) as u64 + 1;
        for _ in 0..span {
            let candidate = GroupId(self.next);
            self.next = if self.next == u32::MAX {
                self.floor
            } else {
                self.next + 1
            };
            if !in_use(candidate) {
                return Ok(candidate);
            }
        }
        Err(IdSpaceExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_start_at_the_floor_and_increase() {
        let mut alloc = GroupIdAllocator::new(0x10000);
        let a = alloc.alloc(|_| false).expect("alloc");
        let b = alloc.alloc(|_| false).expect("alloc");
        assert_eq!(a, GroupId(0x10000));
        assert_eq!(b, GroupId(0x10001));
    }

    #[test]
    fn allocation_skips_live_ids() {
        let mut alloc = GroupIdAllocator::new(10);
        let live: HashSet<u32> = [10, 11, 13].into_iter().collect();
        let id = alloc.alloc(|id| live.contains(&id.0)).expect("alloc");
        assert_eq!(id, GroupId(12));
    }

    #[test]
    fn allocation_wraps_to_the_floor() {
        let mut alloc = GroupIdAllocator::new(u32::MAX - 1);
        assert_eq!(alloc.alloc(|_| false), Ok(GroupId(u32::MAX - 1)));
        assert_eq!(alloc.alloc(|_| false), Ok(GroupId(u32::MAX)));
        assert_eq!(alloc.alloc(|_| false), Ok(GroupId(u32::MAX - 1)));
    }

    #[test]
    fn full_range_is_a_clean_error() {
        let mut alloc = GroupIdAllocator::new(u32::MAX - 2);
        assert_eq!(alloc.alloc(|_| true), Err(IdSpaceExhausted));
        // The allocator stays usable once ids free up.
        assert!(alloc.alloc(|_| false).is_ok());
    }
}
