use crate::combat::skills::SkillId;
use crate::entities::actor::ActorId;
use crate::units::group::GroupId;
use crate::units::unit::UnitId;
use crate::world::position::Position;
use crate::world::time::GameTick;

/// Event classes handed to the external per-skill payload layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Entity found standing in a unit's cell, or a unit created under it.
    Place,
    /// Periodic re-application while inside the trigger radius.
    Interval,
    /// Entity left one cell of the footprint.
    Out,
    /// Entity left the whole group footprint.
    Left,
    /// Unit ran its expiration action (meteor strike, trap burnout).
    Expire,
    /// Pure visual signal, e.g. the tick before a meteor lands.
    VisualCue,
}

/// One dispatched effect occurrence. The engine records these in order;
/// the payload layer drains them and applies skill-specific damage logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectTrigger {
    pub kind: TriggerKind,
    pub skill: SkillId,
    pub skill_lv: u8,
    pub group: GroupId,
    pub unit: UnitId,
    pub pos: Position,
    /// Affected entity; `None` for unit-only events such as visual cues.
    pub entity: Option<ActorId>,
    pub tick: GameTick,
}
