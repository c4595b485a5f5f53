pub mod combat;
pub mod config;
pub mod entities;
pub mod telemetry;
pub mod units;
pub mod world;

pub use combat::skills::{SkillId, SkillUnitDef, UnitKind};
pub use combat::triggers::{EffectTrigger, TriggerKind};
pub use config::EngineConfig;
pub use entities::actor::{ActorId, Affiliation, CategoryMask, PartyId, TargetMask};
pub use entities::status::{StatusEffectKind, StatusParams};
pub use units::engine::{PlaceError, PlacedCells, UnitEngine, WorldAdapter};
pub use units::group::{GroupId, SkillUnitGroup};
pub use units::unit::{SkillUnit, UnitId};
pub use world::position::{MapId, Position, PositionDelta};
pub use world::time::{GameClock, GameTick};
