use crate::combat::skills::{skill_unit_index, SkillId, SkillUnitDef, UnitKind};
use crate::combat::triggers::{EffectTrigger, TriggerKind};
use crate::config::EngineConfig;
use crate::entities::actor::{ActorCategory, ActorId, Affiliation, PartyId, TeamId};
use crate::entities::status::{StatusEffectKind, StatusParams};
use crate::telemetry::logging;
use crate::units::group::{GroupId, GroupIdAllocator, SkillUnitGroup};
use crate::units::overlap::{self, OverlapOutcome};
use crate::units::registry::UnitRegistry;
use crate::units::slots::CasterSlots;
use crate::units::tickset::TickSet;
use crate::units::unit::{SkillUnit, UnitId};
use crate::world::area::{LayoutCache, LayoutShape};
use crate::world::position::{MapId, Position, PositionDelta};
use crate::world::time::GameTick;
use std::collections::HashMap;

/// Narrow contracts the engine consumes from the surrounding server. The
/// grid, entity registry, status container and visibility layers live
/// outside this crate.
pub trait WorldAdapter {
    fn is_cell_walkable(&self, pos: Position) -> bool;
    fn entity_exists(&self, id: ActorId) -> bool;
    fn entity_position(&self, id: ActorId) -> Option<Position>;
    fn entity_affiliation(&self, id: ActorId) -> Option<Affiliation>;
    fn entities_in_area(&self, map: MapId, x0: i16, y0: i16, x1: i16, y1: i16) -> Vec<ActorId>;
    fn apply_status_effect(
        &mut self,
        entity: ActorId,
        kind: StatusEffectKind,
        params: StatusParams,
        duration_ms: u64,
    );
    fn end_status_effect(&mut self, entity: ActorId, kind: StatusEffectKind);
    /// `party == None` addresses every observer.
    fn notify_visibility(&mut self, party: Option<PartyId>, unit: UnitId, pos: Position, visible: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceError {
    UnknownSkill(SkillId),
    /// Every candidate cell was rejected; the group was torn down again.
    NothingPlaced,
    /// Fatal configuration error; the operation aborted cleanly.
    IdSpaceExhausted,
}

impl std::fmt::Display for PlaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceError::UnknownSkill(skill) => write!(f, "unknown skill unit id {}", skill.0),
            PlaceError::NothingPlaced => write!(f, "no cell could be placed"),
            PlaceError::IdSpaceExhausted => write!(f, "group id space exhausted"),
        }
    }
}

impl std::error::Error for PlaceError {}

/// Placement report: rejected cells are a normal partial outcome, never an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacedCells {
    pub placed: u32,
    pub rejected: u32,
}

#[derive(Debug, Clone, Copy)]
struct UnitBrief {
    id: UnitId,
    group: GroupId,
    pos: Position,
    alive: bool,
    kind: UnitKind,
    val1: i32,
    val4: i32,
    range: i16,
    limit: GameTick,
    hidden: bool,
    dissonance: bool,
}

#[derive(Debug, Clone, Copy)]
struct GroupBrief {
    id: GroupId,
    caster: ActorId,
    affiliation: Affiliation,
    skill: SkillId,
    skill_lv: u8,
    interval: Option<u64>,
    song_dance: bool,
    doomed: bool,
    target_mask: crate::entities::actor::TargetMask,
    category_mask: crate::entities::actor::CategoryMask,
}

/// The skill unit group engine: owns every live group and unit, drives the
/// periodic unit timer and the entry/exit dispatch, and defers reclamation
/// so effect callbacks may delete the very units being iterated.
pub struct UnitEngine {
    tick_interval_ms: u64,
    registry: UnitRegistry,
    groups: HashMap<GroupId, SkillUnitGroup>,
    slots: CasterSlots,
    allocator: GroupIdAllocator,
    ticksets: TickSet,
    layouts: LayoutCache,
    pending_triggers: Vec<EffectTrigger>,
    dispatch_depth: u32,
    dead_units: Vec<UnitId>,
    doomed_groups: Vec<GroupId>,
    last_tick_at: Option<GameTick>,
}

impl UnitEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tick_interval_ms: config.tick_interval_ms.max(1),
            registry: UnitRegistry::new(),
            groups: HashMap::new(),
            slots: CasterSlots::new(config.max_groups_per_caster),
            allocator: GroupIdAllocator::new(config.group_id_floor),
            ticksets: TickSet::new(),
            layouts: LayoutCache::new(config.layout_cache_capacity),
            pending_triggers: Vec::new(),
            dispatch_depth: 0,
            dead_units: Vec::new(),
            doomed_groups: Vec::new(),
            last_tick_at: None,
        }
    }

    // ---- public queries -------------------------------------------------

    pub fn group(&self, id: GroupId) -> Option<&SkillUnitGroup> {
        self.groups.get(&id)
    }

    pub fn unit(&self, id: UnitId) -> Option<&SkillUnit> {
        self.registry.get(id)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn unit_count(&self) -> usize {
        self.registry.len()
    }

    pub fn units_at(&self, pos: Position) -> Vec<UnitId> {
        self.registry.units_at(pos)
    }

    pub fn caster_groups(&self, caster: ActorId) -> Vec<GroupId> {
        self.slots.groups_of(caster)
    }

    /// Drain the effect occurrences recorded since the last call; the
    /// external payload layer consumes these in order.
    pub fn drain_triggers(&mut self) -> Vec<EffectTrigger> {
        std::mem::take(&mut self.pending_triggers)
    }

    /// Hidden units are reported only to the caster and the caster's party,
    /// re-resolved against the observer's current affiliation.
    pub fn visible_to(&self, world: &dyn WorldAdapter, unit: UnitId, observer: ActorId) -> bool {
        let Some(unit) = self.registry.get(unit) else {
            return false;
        };
        if !unit.alive {
            return false;
        }
        if !unit.hidden {
            return true;
        }
        let Some(group) = self.groups.get(&unit.group) else {
            return false;
        };
        if group.caster == observer {
            return true;
        }
        let Some(affiliation) = world.entity_affiliation(observer) else {
            return false;
        };
        match (group.caster_affiliation.party, affiliation.party) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn visible_units_at(
        &self,
        world: &dyn WorldAdapter,
        pos: Position,
        observer: ActorId,
    ) -> Vec<UnitId> {
        self.registry
            .units_at(pos)
            .into_iter()
            .filter(|unit| self.visible_to(world, *unit, observer))
            .collect()
    }

    // ---- lifecycle ------------------------------------------------------

    /// Entry point for the external cast-resolution layer: allocate a group
    /// for the skill's unit definition and place its footprint at `origin`.
    pub fn on_cast_complete(
        &mut self,
        world: &mut dyn WorldAdapter,
        caster: ActorId,
        skill: SkillId,
        skill_lv: u8,
        origin: Position,
        now: GameTick,
    ) -> Result<GroupId, PlaceError> {
        let Some(def) = skill_unit_index().get(skill) else {
            return Err(PlaceError::UnknownSkill(skill));
        };
        self.begin_dispatch();
        let result = self.cast_inner(world, caster, def, skill_lv, origin, now);
        self.end_dispatch();
        result
    }

    fn cast_inner(
        &mut self,
        world: &mut dyn WorldAdapter,
        caster: ActorId,
        def: &'static SkillUnitDef,
        skill_lv: u8,
        origin: Position,
        now: GameTick,
    ) -> Result<GroupId, PlaceError> {
        let group = self.create_group_inner(world, caster, def, skill_lv, now)?;
        let placed = self.place_cells_inner(world, group, origin, def.layout, now);
        if placed.placed == 0 {
            return Err(PlaceError::NothingPlaced);
        }
        if let Some(status) = def.caster_status {
            if world.entity_exists(caster) {
                world.apply_status_effect(
                    caster,
                    status,
                    StatusParams::new(0, skill_lv),
                    def.limit_ms,
                );
            }
        }
        logging::log_game(&format!(
            "unit group {} ({}) placed: {} cells, {} rejected",
            group.0, def.name, placed.placed, placed.rejected
        ));
        Ok(group)
    }

    /// Allocate an empty group for `skill`, evicting the caster's oldest
    /// group when the slot table is full.
    pub fn create_group(
        &mut self,
        world: &mut dyn WorldAdapter,
        caster: ActorId,
        skill: SkillId,
        skill_lv: u8,
        now: GameTick,
    ) -> Result<GroupId, PlaceError> {
        let Some(def) = skill_unit_index().get(skill) else {
            return Err(PlaceError::UnknownSkill(skill));
        };
        self.begin_dispatch();
        let result = self.create_group_inner(world, caster, def, skill_lv, now);
        self.end_dispatch();
        result
    }

    fn create_group_inner(
        &mut self,
        world: &mut dyn WorldAdapter,
        caster: ActorId,
        def: &'static SkillUnitDef,
        skill_lv: u8,
        now: GameTick,
    ) -> Result<GroupId, PlaceError> {
        // Allocate before evicting: a failed allocation must leave the
        // caster's existing groups untouched.
        let groups = &self.groups;
        let id = self
            .allocator
            .alloc(|id| groups.contains_key(&id))
            .map_err(|err| {
                logging::log_error(&err.to_string());
                PlaceError::IdSpaceExhausted
            })?;
        if let Some(victim) = self.slots.eviction_candidate(caster) {
            logging::log_game(&format!(
                "caster {} slot table full, evicting group {}",
                caster.0, victim.0
            ));
            self.mark_group_doomed(world, victim, now);
        }
        let affiliation = world
            .entity_affiliation(caster)
            .unwrap_or(Affiliation::solo(TeamId(0), ActorCategory::Player));
        let group = SkillUnitGroup {
            id,
            caster,
            caster_affiliation: affiliation,
            skill: def.skill,
            skill_lv,
            unit_kind: def.kind,
            map: MapId(0),
            created_at: now,
            limit: def.limit_ms,
            interval: def.interval_ms,
            target_mask: def.target_mask,
            category_mask: def.category_mask,
            units: Vec::new(),
            alive_count: 0,
            song_dance: def.song_dance,
            aura: def.is_aura(),
            caster_linked: def.caster_linked,
            val1: 0,
            val2: 0,
            val3: 0,
            link_group: None,
            linked_status: def.linked_status,
            doomed: false,
        };
        self.groups.insert(id, group);
        self.slots.insert(caster, id, now);
        Ok(id)
    }

    /// Place the footprint of an already created group around `origin`.
    pub fn place_cells(
        &mut self,
        world: &mut dyn WorldAdapter,
        group: GroupId,
        origin: Position,
        shape: LayoutShape,
        now: GameTick,
    ) -> PlacedCells {
        self.begin_dispatch();
        let placed = self.place_cells_inner(world, group, origin, shape, now);
        self.end_dispatch();
        placed
    }

    fn place_cells_inner(
        &mut self,
        world: &mut dyn WorldAdapter,
        group: GroupId,
        origin: Position,
        shape: LayoutShape,
        now: GameTick,
    ) -> PlacedCells {
        let Some(state) = self.groups.get_mut(&group) else {
            return PlacedCells::default();
        };
        state.map = origin.map;
        let skill = state.skill;
        let Some(def) = skill_unit_index().get(skill) else {
            return PlacedCells::default();
        };
        let elemental_conflict = def.overlap.elemental_field
            && self.elemental_live_on_map(skill, origin.map, group);
        let offsets = self.layouts.get(shape);

        let mut result = PlacedCells::default();
        for (dx, dy) in offsets.iter().copied() {
            let Some(pos) = origin.offset(PositionDelta { dx, dy }) else {
                result.rejected += 1;
                continue;
            };
            if def.requires_ground && !world.is_cell_walkable(pos) {
                result.rejected += 1;
                continue;
            }
            if elemental_conflict {
                result.rejected += 1;
                continue;
            }
            if self.place_one_cell(world, group, def, pos, now) {
                result.placed += 1;
            } else {
                result.rejected += 1;
            }
        }
        // A group left without a single live cell is torn down right here,
        // whichever entry point placed it; nothing will ever expire it.
        if result.placed == 0 {
            let empty = self
                .groups
                .get(&group)
                .map(|state| state.alive_count == 0)
                .unwrap_or(false);
            if empty {
                self.mark_group_doomed(world, group, now);
            }
        }
        result
    }

    fn place_one_cell(
        &mut self,
        world: &mut dyn WorldAdapter,
        group: GroupId,
        def: &'static SkillUnitDef,
        pos: Position,
        now: GameTick,
    ) -> bool {
        let mut place = true;
        let mut extended = false;
        let mut unit_removals: Vec<UnitId> = Vec::new();
        let mut group_removals: Vec<GroupId> = Vec::new();
        let mut consumed: Vec<UnitId> = Vec::new();

        for existing_id in self.registry.units_at(pos) {
            let Some(existing) = self.registry.get(existing_id) else {
                continue;
            };
            if !existing.alive || existing.group == group {
                continue;
            }
            let Some(existing_group) = self.groups.get(&existing.group) else {
                continue;
            };
            let Some(existing_def) = skill_unit_index().get(existing_group.skill) else {
                continue;
            };
            match overlap::resolve(def, existing_def) {
                OverlapOutcome::Reject => place = false,
                OverlapOutcome::MutualCancel => {
                    unit_removals.push(existing_id);
                    place = false;
                }
                OverlapOutcome::RemoveExisting => {
                    if def.overlap.clears_ranged_single
                        && existing_def.overlap.ranged_single_unit
                    {
                        group_removals.push(existing.group);
                    } else {
                        unit_removals.push(existing_id);
                    }
                }
                OverlapOutcome::ConsumeExisting => consumed.push(existing_id),
                OverlapOutcome::CoexistExtended => extended = true,
                OverlapOutcome::Coexist => {}
            }
        }

        // Denial removals and mutual cancels run whether or not the
        // candidate survives; consumption only pays off on placement.
        for victim in group_removals {
            self.mark_group_doomed(world, victim, now);
        }
        for victim in unit_removals {
            self.kill_unit(world, victim, now);
        }
        if !place {
            return false;
        }
        for victim in consumed {
            self.kill_unit(world, victim, now);
        }

        let id = self.registry.allocate_unit_id();
        let limit = if def.is_aura() {
            GameTick::MAX
        } else {
            let life = if extended { def.limit_ms * 2 } else { def.limit_ms };
            now.saturating_add(life)
        };
        // Meteors and warning states keep their trigger radius dormant
        // until conversion or the final tick.
        let range = match def.kind {
            UnitKind::Meteor | UnitKind::Warning => -1,
            _ => def.range,
        };
        let unit = SkillUnit {
            id,
            group,
            pos,
            alive: true,
            kind: def.kind,
            val1: def.trap_hp,
            val2: 0,
            val3: 0,
            val4: 0,
            range,
            limit,
            hidden: def.hidden,
            dissonance: false,
        };
        self.registry.register(unit);
        let mut party = None;
        if let Some(state) = self.groups.get_mut(&group) {
            state.units.push(id);
            state.alive_count += 1;
            party = state.caster_affiliation.party;
        }
        if def.hidden {
            // A party-less caster gets no announcement at all; `None` here
            // would read as a broadcast and show the trap to everyone.
            if let Some(party) = party {
                world.notify_visibility(Some(party), id, pos, true);
            }
        }
        if def.song_dance {
            self.refresh_dissonance_at(world, pos, now);
        }
        for entity in Self::entities_standing_at(world, pos) {
            self.dispatch_onplace(world, id, entity, now);
        }
        true
    }

    /// Tear down a group, its units, and any companion group. Idempotent,
    /// including against re-entrant calls triggered by its own side effects.
    pub fn destroy_group(&mut self, world: &mut dyn WorldAdapter, group: GroupId, now: GameTick) {
        self.begin_dispatch();
        self.mark_group_doomed(world, group, now);
        self.end_dispatch();
    }

    /// Bind two groups so destroying either tears down both.
    pub fn link_groups(&mut self, a: GroupId, b: GroupId) {
        if let Some(group) = self.groups.get_mut(&a) {
            group.link_group = Some(b);
        }
        if let Some(group) = self.groups.get_mut(&b) {
            group.link_group = Some(a);
        }
    }

    fn mark_group_doomed(&mut self, world: &mut dyn WorldAdapter, group: GroupId, now: GameTick) {
        let Some(state) = self.groups.get_mut(&group) else {
            return;
        };
        if state.doomed {
            return;
        }
        state.doomed = true;
        let caster = state.caster;
        let skill = state.skill;
        let link = state.link_group;
        let unit_ids = state.units.clone();
        self.doomed_groups.push(group);

        for unit in unit_ids {
            self.kill_unit(world, unit, now);
        }
        self.slots.remove(caster, group);
        // Group-held caster status ends explicitly, never by timeout.
        if let Some(status) = skill_unit_index().get(skill).and_then(|def| def.caster_status) {
            if world.entity_exists(caster) {
                world.end_status_effect(caster, status);
            }
        }
        if let Some(link) = link {
            self.mark_group_doomed(world, link, now);
        }
        logging::log_game(&format!("unit group {} destroyed", group.0));
    }

    /// Mark one unit dead: exit events for entities standing on it, then
    /// group bookkeeping. Reclamation is deferred to the reap phase.
    fn kill_unit(&mut self, world: &mut dyn WorldAdapter, unit: UnitId, now: GameTick) {
        let Some(brief) = self.unit_brief(unit) else {
            return;
        };
        if !brief.alive {
            return;
        }
        if let Some(state) = self.registry.get_mut(unit) {
            state.alive = false;
        }
        self.dead_units.push(unit);

        let mut doom = false;
        let mut party = None;
        if let Some(group) = self.groups.get_mut(&brief.group) {
            group.alive_count = group.alive_count.saturating_sub(1);
            party = group.caster_affiliation.party;
            if group.alive_count == 0 && !group.doomed {
                doom = true;
            }
        }
        if brief.hidden {
            // Teardown mirrors the placement announcement: party-only, and
            // nothing when the caster had no party.
            if let Some(party) = party {
                world.notify_visibility(Some(party), unit, brief.pos, false);
            }
        }
        if let Some(group) = self.group_brief(brief.group) {
            for entity in Self::entities_standing_at(world, brief.pos) {
                if !self.eligible(world, &group, entity) {
                    continue;
                }
                self.dispatch_onout(brief, &group, entity, now);
                if !self.group_covers(brief.group, brief.pos) {
                    self.dispatch_onleft(world, brief, &group, entity, now);
                }
            }
            if group.song_dance {
                self.refresh_dissonance_at(world, brief.pos, now);
            }
        }
        if doom {
            self.mark_group_doomed(world, brief.group, now);
        }
    }

    /// External damage against a destructible cell (trap disarming, wall
    /// chipping). Returns true when the cell was destroyed.
    pub fn damage_unit(
        &mut self,
        world: &mut dyn WorldAdapter,
        unit: UnitId,
        amount: i32,
        now: GameTick,
    ) -> bool {
        let Some(brief) = self.unit_brief(unit) else {
            return false;
        };
        if !brief.alive || brief.val1 <= 0 {
            return false;
        }
        let remaining = brief.val1.saturating_sub(amount.max(0));
        if remaining > 0 {
            if let Some(state) = self.registry.get_mut(unit) {
                state.val1 = remaining;
            }
            return false;
        }
        self.begin_dispatch();
        self.kill_unit(world, unit, now);
        self.end_dispatch();
        true
    }

    /// Unhide a unit to every observer (detection skills).
    pub fn reveal_unit(&mut self, world: &mut dyn WorldAdapter, unit: UnitId) {
        let Some(state) = self.registry.get_mut(unit) else {
            return;
        };
        if !state.alive || !state.hidden {
            return;
        }
        state.hidden = false;
        let pos = state.pos;
        world.notify_visibility(None, unit, pos, true);
    }

    // ---- tick scheduler -------------------------------------------------

    /// Global unit timer: visits every live unit exactly once. Expiration
    /// and effect callbacks may delete units and groups mid-pass; the
    /// snapshot-and-recheck discipline plus deferred reaping absorb that.
    pub fn tick(&mut self, world: &mut dyn WorldAdapter, now: GameTick) {
        if let Some(last) = self.last_tick_at {
            let gap = now.saturating_sub(last);
            if gap > self.tick_interval_ms.saturating_mul(2) {
                logging::log_lag(&format!(
                    "unit timer gap {}ms, expected {}ms",
                    gap, self.tick_interval_ms
                ));
            }
        }
        self.last_tick_at = Some(now);
        self.begin_dispatch();
        let caster_linked: Vec<(GroupId, ActorId)> = self
            .groups
            .values()
            .filter(|group| group.caster_linked && !group.doomed)
            .map(|group| (group.id, group.caster))
            .collect();
        for (group, caster) in caster_linked {
            if !world.entity_exists(caster) {
                self.mark_group_doomed(world, group, now);
            }
        }
        for unit in self.registry.unit_ids() {
            self.tick_unit(world, unit, now);
        }
        self.ticksets.prune(now, TICKSET_RETENTION_MS);
        self.end_dispatch();
    }

    fn tick_unit(&mut self, world: &mut dyn WorldAdapter, unit: UnitId, now: GameTick) {
        let Some(brief) = self.unit_brief(unit) else {
            return;
        };
        if !brief.alive {
            return;
        }
        let Some(group) = self.group_brief(brief.group) else {
            return;
        };
        if group.doomed {
            return;
        }
        let Some(def) = skill_unit_index().get(group.skill) else {
            return;
        };

        if now >= brief.limit {
            self.expire_unit(world, brief, &group, def, now);
            return;
        }

        // Meteor-class signals intent one tick before the strike lands.
        if brief.kind == UnitKind::Meteor
            && brief.val4 == 0
            && brief.limit.saturating_sub(now) <= self.tick_interval_ms
        {
            if let Some(state) = self.registry.get_mut(unit) {
                state.val4 = 1;
            }
            self.push_trigger(TriggerKind::VisualCue, &group, brief, None, now);
            return;
        }

        let scans = group.interval.is_some()
            || (brief.kind == UnitKind::Trap && brief.range >= 0);
        if !scans || brief.range < 0 {
            return;
        }
        let reach = brief.range.max(0);
        let entities = world.entities_in_area(
            brief.pos.map,
            brief.pos.x.saturating_sub(reach),
            brief.pos.y.saturating_sub(reach),
            brief.pos.x.saturating_add(reach),
            brief.pos.y.saturating_add(reach),
        );
        for entity in entities {
            // The previous callback may have deleted this unit.
            let Some(current) = self.unit_brief(unit) else {
                return;
            };
            if !current.alive {
                return;
            }
            let Some(pos) = world.entity_position(entity) else {
                continue;
            };
            let in_range = self
                .registry
                .get(unit)
                .map(|state| state.in_trigger_range(pos))
                .unwrap_or(false);
            if !in_range {
                continue;
            }
            if !self.eligible(world, &group, entity) {
                continue;
            }
            if current.kind == UnitKind::Trap {
                self.spring_trap(world, current, &group, def, entity, now);
                return;
            }
            if !self
                .ticksets
                .try_apply(entity, group.skill, now, def.throttle_period())
            {
                continue;
            }
            self.apply_unit_effect(world, current, &group, def, entity, now, TriggerKind::Interval);
        }
    }

    fn expire_unit(
        &mut self,
        world: &mut dyn WorldAdapter,
        brief: UnitBrief,
        group: &GroupBrief,
        def: &'static SkillUnitDef,
        now: GameTick,
    ) {
        match brief.kind {
            // Destructible traps degrade before they vanish.
            UnitKind::Trap if brief.val1 > 0 && def.trap_hp > 0 => {
                let step = (def.trap_hp / 2).max(1);
                let remaining = brief.val1 - step;
                if remaining > 0 {
                    if let Some(state) = self.registry.get_mut(brief.id) {
                        state.val1 = remaining;
                        state.limit = now.saturating_add(def.degrade_window_ms);
                    }
                } else {
                    self.push_trigger(TriggerKind::Expire, group, brief, None, now);
                    self.kill_unit(world, brief.id, now);
                }
            }
            // Meteor-class: the destructive action happens on the final
            // tick, not during the fall.
            UnitKind::Meteor => {
                let reach = def.range.max(0);
                let entities = world.entities_in_area(
                    brief.pos.map,
                    brief.pos.x.saturating_sub(reach),
                    brief.pos.y.saturating_sub(reach),
                    brief.pos.x.saturating_add(reach),
                    brief.pos.y.saturating_add(reach),
                );
                for entity in entities {
                    let Some(pos) = world.entity_position(entity) else {
                        continue;
                    };
                    if !brief.pos.within_range(pos, def.range) {
                        continue;
                    }
                    if !self.eligible(world, group, entity) {
                        continue;
                    }
                    if let Some(status) = def.linked_status {
                        world.apply_status_effect(
                            entity,
                            status,
                            StatusParams::new(0, group.skill_lv),
                            def.status_duration_ms,
                        );
                    }
                    self.push_trigger(TriggerKind::Expire, group, brief, Some(entity), now);
                }
                self.kill_unit(world, brief.id, now);
            }
            // Warning states convert in place instead of vanishing.
            UnitKind::Warning if def.morph_to.is_some() => {
                if let Some(state) = self.registry.get_mut(brief.id) {
                    state.kind = def.morph_to.unwrap_or(UnitKind::Field);
                    state.range = def.range;
                    state.limit = now.saturating_add(def.morph_limit_ms);
                }
            }
            _ => {
                self.push_trigger(TriggerKind::Expire, group, brief, None, now);
                self.kill_unit(world, brief.id, now);
            }
        }
    }

    // ---- entry/exit dispatch --------------------------------------------

    /// Movement notification from the external movement layer. Computes
    /// onplace for freshly covered cells, onout for vacated cells, and
    /// onleft once the whole group footprint is vacated.
    pub fn on_entity_moved(
        &mut self,
        world: &mut dyn WorldAdapter,
        entity: ActorId,
        old: Position,
        new: Position,
        now: GameTick,
    ) {
        if old == new {
            return;
        }
        self.begin_dispatch();
        for unit in self.registry.units_at(new) {
            self.dispatch_onplace(world, unit, entity, now);
        }
        let mut left_groups: Vec<GroupId> = Vec::new();
        for unit in self.registry.units_at(old) {
            let Some(brief) = self.unit_brief(unit) else {
                continue;
            };
            if !brief.alive {
                continue;
            }
            let Some(group) = self.group_brief(brief.group) else {
                continue;
            };
            if group.doomed || !self.eligible(world, &group, entity) {
                continue;
            }
            self.dispatch_onout(brief, &group, entity, now);
            if !self.group_covers(brief.group, new) && !left_groups.contains(&brief.group) {
                left_groups.push(brief.group);
                self.dispatch_onleft(world, brief, &group, entity, now);
            }
        }
        self.end_dispatch();
    }

    /// Notification that an entity left the world (death, logout, warp-out).
    /// Drops its throttle records so a returning entity starts fresh.
    pub fn on_entity_removed(&mut self, entity: ActorId) {
        self.ticksets.forget_entity(entity);
    }

    fn dispatch_onplace(
        &mut self,
        world: &mut dyn WorldAdapter,
        unit: UnitId,
        entity: ActorId,
        now: GameTick,
    ) {
        let Some(brief) = self.unit_brief(unit) else {
            return;
        };
        if !brief.alive {
            return;
        }
        let Some(group) = self.group_brief(brief.group) else {
            return;
        };
        if group.doomed {
            return;
        }
        let Some(def) = skill_unit_index().get(group.skill) else {
            return;
        };
        if !self.eligible(world, &group, entity) {
            return;
        }
        match brief.kind {
            UnitKind::Trap => self.spring_trap(world, brief, &group, def, entity, now),
            UnitKind::TrapSpent
            | UnitKind::Conduit
            | UnitKind::Barrier
            | UnitKind::Denial
            | UnitKind::Meteor
            | UnitKind::Warning => {}
            _ => {
                if brief.range < 0 {
                    return;
                }
                if !self
                    .ticksets
                    .try_apply(entity, group.skill, now, def.throttle_period())
                {
                    return;
                }
                self.apply_unit_effect(world, brief, &group, def, entity, now, TriggerKind::Place);
            }
        }
    }

    fn dispatch_onout(
        &mut self,
        brief: UnitBrief,
        group: &GroupBrief,
        entity: ActorId,
        now: GameTick,
    ) {
        self.push_trigger(TriggerKind::Out, group, brief, Some(entity), now);
    }

    fn dispatch_onleft(
        &mut self,
        world: &mut dyn WorldAdapter,
        brief: UnitBrief,
        group: &GroupBrief,
        entity: ActorId,
        now: GameTick,
    ) {
        let Some(def) = skill_unit_index().get(group.skill) else {
            return;
        };
        // Presence-bound statuses survive steps between cells of the same
        // footprint; they end only here, on a full exit.
        if def.status_requires_presence {
            if let Some(status) = self.effective_status(brief, def) {
                world.end_status_effect(entity, status);
            }
        }
        if group.song_dance {
            // Music lingers: a reduced grace window replaces an abrupt end.
            if brief.dissonance {
                world.end_status_effect(entity, StatusEffectKind::Dissonance);
            }
            if let Some(status) = def.linked_status {
                world.apply_status_effect(
                    entity,
                    status,
                    StatusParams::new(0, group.skill_lv),
                    def.song_grace_ms,
                );
            }
        }
        self.push_trigger(TriggerKind::Left, group, brief, Some(entity), now);
    }

    fn spring_trap(
        &mut self,
        world: &mut dyn WorldAdapter,
        brief: UnitBrief,
        group: &GroupBrief,
        def: &'static SkillUnitDef,
        entity: ActorId,
        now: GameTick,
    ) {
        if brief.hidden {
            if let Some(state) = self.registry.get_mut(brief.id) {
                state.hidden = false;
            }
            world.notify_visibility(None, brief.id, brief.pos, true);
        }
        if let Some(status) = def.linked_status {
            world.apply_status_effect(
                entity,
                status,
                StatusParams::new(0, group.skill_lv),
                def.status_duration_ms,
            );
        }
        self.push_trigger(TriggerKind::Place, group, brief, Some(entity), now);
        // Sprung trap converts to its spent visual with a short fresh limit.
        if let Some(state) = self.registry.get_mut(brief.id) {
            state.kind = UnitKind::TrapSpent;
            state.range = -1;
            state.limit = now.saturating_add(def.spent_ms);
        }
    }

    fn apply_unit_effect(
        &mut self,
        world: &mut dyn WorldAdapter,
        brief: UnitBrief,
        group: &GroupBrief,
        def: &'static SkillUnitDef,
        entity: ActorId,
        now: GameTick,
        kind: TriggerKind,
    ) {
        if let Some(status) = self.effective_status(brief, def) {
            world.apply_status_effect(
                entity,
                status,
                StatusParams::new(0, group.skill_lv),
                def.status_duration_ms,
            );
        }
        self.push_trigger(kind, group, brief, Some(entity), now);
    }

    fn effective_status(
        &self,
        brief: UnitBrief,
        def: &'static SkillUnitDef,
    ) -> Option<StatusEffectKind> {
        if brief.dissonance {
            Some(StatusEffectKind::Dissonance)
        } else {
            def.linked_status
        }
    }

    /// Re-evaluate the dissonance toggle for every song unit at `pos` and
    /// propagate flips to the entities standing there.
    fn refresh_dissonance_at(&mut self, world: &mut dyn WorldAdapter, pos: Position, now: GameTick) {
        let mut songs: Vec<(UnitId, GroupId, u8)> = Vec::new();
        for unit in self.registry.units_at(pos) {
            let Some(brief) = self.unit_brief(unit) else {
                continue;
            };
            if !brief.alive {
                continue;
            }
            let Some(group) = self.group_brief(brief.group) else {
                continue;
            };
            if group.doomed || !group.song_dance {
                continue;
            }
            let family = skill_unit_index()
                .get(group.skill)
                .and_then(|def| def.music_family)
                .unwrap_or(0);
            songs.push((unit, brief.group, family));
        }
        let clash = songs
            .iter()
            .any(|(_, _, a)| songs.iter().any(|(_, _, b)| a != b));
        for (unit, group_id, _) in songs {
            let Some(brief) = self.unit_brief(unit) else {
                continue;
            };
            if brief.dissonance == clash {
                continue;
            }
            if let Some(state) = self.registry.get_mut(unit) {
                state.dissonance = clash;
            }
            let Some(group) = self.group_brief(group_id) else {
                continue;
            };
            let Some(def) = skill_unit_index().get(group.skill) else {
                continue;
            };
            for entity in Self::entities_standing_at(world, pos) {
                if !self.eligible(world, &group, entity) {
                    continue;
                }
                if clash {
                    if let Some(status) = def.linked_status {
                        world.end_status_effect(entity, status);
                    }
                    world.apply_status_effect(
                        entity,
                        StatusEffectKind::Dissonance,
                        StatusParams::new(0, group.skill_lv),
                        def.status_duration_ms,
                    );
                } else {
                    world.end_status_effect(entity, StatusEffectKind::Dissonance);
                    if let Some(status) = def.linked_status {
                        world.apply_status_effect(
                            entity,
                            status,
                            StatusParams::new(0, group.skill_lv),
                            def.status_duration_ms,
                        );
                    }
                }
                let updated = self.unit_brief(unit).unwrap_or(brief);
                self.push_trigger(TriggerKind::Place, &group, updated, Some(entity), now);
            }
        }
    }

    // ---- internals ------------------------------------------------------

    fn begin_dispatch(&mut self) {
        self.dispatch_depth += 1;
    }

    /// Reap marked units and groups once the outermost dispatch pass ends.
    fn end_dispatch(&mut self) {
        debug_assert!(self.dispatch_depth > 0);
        self.dispatch_depth = self.dispatch_depth.saturating_sub(1);
        if self.dispatch_depth > 0 {
            return;
        }
        for unit in std::mem::take(&mut self.dead_units) {
            self.registry.purge(unit);
        }
        for group in std::mem::take(&mut self.doomed_groups) {
            if let Some(state) = self.groups.remove(&group) {
                for unit in state.units {
                    self.registry.purge(unit);
                }
            }
        }
    }

    fn unit_brief(&self, unit: UnitId) -> Option<UnitBrief> {
        self.registry.get(unit).map(|state| UnitBrief {
            id: state.id,
            group: state.group,
            pos: state.pos,
            alive: state.alive,
            kind: state.kind,
            val1: state.val1,
            val4: state.val4,
            range: state.range,
            limit: state.limit,
            hidden: state.hidden,
            dissonance: state.dissonance,
        })
    }

    fn group_brief(&self, group: GroupId) -> Option<GroupBrief> {
        self.groups.get(&group).map(|state| GroupBrief {
            id: state.id,
            caster: state.caster,
            affiliation: state.caster_affiliation,
            skill: state.skill,
            skill_lv: state.skill_lv,
            interval: state.interval,
            song_dance: state.song_dance,
            doomed: state.doomed,
            target_mask: state.target_mask,
            category_mask: state.category_mask,
        })
    }

    /// Targeting re-check run on every dispatch; a failed resolution is a
    /// normal skip, not an error.
    fn eligible(&self, world: &dyn WorldAdapter, group: &GroupBrief, entity: ActorId) -> bool {
        if !world.entity_exists(entity) {
            return false;
        }
        let Some(affiliation) = world.entity_affiliation(entity) else {
            return false;
        };
        group.category_mask.matches(affiliation.category)
            && group
                .target_mask
                .accepts(group.caster, group.affiliation, entity, affiliation)
    }

    fn group_covers(&self, group: GroupId, pos: Position) -> bool {
        let Some(state) = self.groups.get(&group) else {
            return false;
        };
        state.units.iter().any(|unit| {
            self.registry
                .get(*unit)
                .map(|state| state.alive && state.covers(pos))
                .unwrap_or(false)
        })
    }

    fn elemental_live_on_map(&self, skill: SkillId, map: MapId, except: GroupId) -> bool {
        self.groups.values().any(|group| {
            group.id != except
                && !group.doomed
                && group.skill == skill
                && group.map == map
                && group.alive_count > 0
        })
    }

    fn entities_standing_at(world: &dyn WorldAdapter, pos: Position) -> Vec<ActorId> {
        world
            .entities_in_area(pos.map, pos.x, pos.y, pos.x, pos.y)
            .into_iter()
            .filter(|entity| world.entity_position(*entity) == Some(pos))
            .collect()
    }

    fn push_trigger(
        &mut self,
        kind: TriggerKind,
        group: &GroupBrief,
        brief: UnitBrief,
        entity: Option<ActorId>,
        now: GameTick,
    ) {
        self.pending_triggers.push(EffectTrigger {
            kind,
            skill: group.skill,
            skill_lv: group.skill_lv,
            group: group.id,
            unit: brief.id,
            pos: brief.pos,
            entity,
            tick: now,
        });
    }
}

/// Tickset records older than this cannot throttle any builtin skill.
const TICKSET_RETENTION_MS: u64 = 60_000;
