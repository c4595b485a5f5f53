use crate::combat::skills::UnitKind;
use crate::units::group::GroupId;
use crate::world::position::Position;
use crate::world::time::GameTick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub u32);

/// One occupied map cell belonging to a group. Mutable per-cell state lives
/// here; shared skill identity and timing live on the group.
#[derive(Debug, Clone)]
pub struct SkillUnit {
    pub id: UnitId,
    pub group: GroupId,
    pub pos: Position,
    /// False once logically removed; such a unit must never be
    /// target-matched or dispatched. Purged at the next reap point.
    pub alive: bool,
    pub kind: UnitKind,
    pub val1: i32,
    pub val2: i32,
    pub val3: i32,
    pub val4: i32,
    /// Trigger radius; -1 disables proximity triggering for this cell.
    pub range: i16,
    /// Absolute expiry of this cell. May outlive the group's nominal limit
    /// when an overlap rule extended it.
    pub limit: GameTick,
    pub hidden: bool,
    /// Penalty-variant toggle while two incompatible songs overlap here.
    pub dissonance: bool,
}

impl SkillUnit {
    pub fn covers(&self, pos: Position) -> bool {
        self.pos == pos
    }

    pub fn in_trigger_range(&self, pos: Position) -> bool {
        self.pos.within_range(pos, self.range)
    }
}
