use crate::combat::skills::SkillId;
use crate::entities::actor::ActorId;
use crate::world::time::GameTick;
use std::collections::HashMap;

/// Per-entity-per-effect-family throttling records. Keyed by skill id, so
/// overlapping groups of the same skill share one throttle while unrelated
/// groups re-apply independently.
#[derive(Debug, Default)]
pub struct TickSet {
    last_applied: HashMap<(ActorId, SkillId), GameTick>,
}

impl TickSet {
    pub fn new() -> Self {
        Self {
            last_applied: HashMap::new(),
        }
    }

    /// True when the effect may fire now; records the application when it
    /// does. A zero period never throttles.
    pub fn try_apply(
        &mut self,
        entity: ActorId,
        family: SkillId,
        now: GameTick,
        period_ms: u64,
    ) -> bool {
        if period_ms == 0 {
            self.last_applied.insert((entity, family), now);
            return true;
        }
        if let Some(last) = self.last_applied.get(&(entity, family)) {
            if now.saturating_sub(*last) < period_ms {
                return false;
            }
        }
        self.last_applied.insert((entity, family), now);
        true
    }

    pub fn forget_entity(&mut self, entity: ActorId) {
        self.last_applied.retain(|(actor, _), _| *actor != entity);
    }

    /// Drop records old enough that they can no longer throttle anything.
    pub fn prune(&mut self, now: GameTick, max_period_ms: u64) {
        self.last_applied
            .retain(|_, last| now.saturating_sub(*last) < max_period_ms);
    }

    pub fn len(&self) -> usize {
        self.last_applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_applied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_application_always_fires() {
        let mut tickset = TickSet::new();
        assert!(tickset.try_apply(ActorId(1), SkillId(101), GameTick(1_000), 2_000));
    }

    #[test]
    fn reapplication_waits_for_the_period() {
        let mut tickset = TickSet::new();
        let entity = ActorId(1);
        let family = SkillId(101);
        assert!(tickset.try_apply(entity, family, GameTick(1_000), 2_000));
        assert!(!tickset.try_apply(entity, family, GameTick(1_500), 2_000));
        assert!(!tickset.try_apply(entity, family, GameTick(2_999), 2_000));
        assert!(tickset.try_apply(entity, family, GameTick(3_000), 2_000));
    }

    #[test]
    fn families_throttle_independently() {
        let mut tickset = TickSet::new();
        let entity = ActorId(1);
        assert!(tickset.try_apply(entity, SkillId(101), GameTick(1_000), 2_000));
        assert!(tickset.try_apply(entity, SkillId(115), GameTick(1_000), 2_000));
        assert!(!tickset.try_apply(entity, SkillId(101), GameTick(1_100), 2_000));
    }

    #[test]
    fn same_family_shares_throttle_across_groups() {
        // Two groups of the same skill share the family key; the second
        // group's application is suppressed inside the window.
        let mut tickset = TickSet::new();
        let entity = ActorId(1);
        assert!(tickset.try_apply(entity, SkillId(115), GameTick(0), 4_000));
        assert!(!tickset.try_apply(entity, SkillId(115), GameTick(100), 4_000));
    }

    #[test]
    fn forget_entity_clears_only_that_entity() {
        let mut tickset = TickSet::new();
        tickset.try_apply(ActorId(1), SkillId(101), GameTick(0), 2_000);
        tickset.try_apply(ActorId(2), SkillId(101), GameTick(0), 2_000);
        tickset.forget_entity(ActorId(1));
        assert_eq!(tickset.len(), 1);
        assert!(tickset.try_apply(ActorId(1), SkillId(101), GameTick(100), 2_000));
        assert!(!tickset.try_apply(ActorId(2), SkillId(101), GameTick(100), 2_000));
    }

    #[test]
    fn prune_drops_expired_records() {
        let mut tickset = TickSet::new();
        tickset.try_apply(ActorId(1), SkillId(101), GameTick(0), 2_000);
        tickset.try_apply(ActorId(2), SkillId(101), GameTick(9_500), 2_000);
        tickset.prune(GameTick(10_000), 2_000);
        assert_eq!(tickset.len(), 1);
    }
}
