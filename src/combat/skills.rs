use crate::entities::actor::{
    CategoryMask, TargetMask, CATEGORY_ANY, TARGET_ENEMY, TARGET_FRIEND,
};
use crate::entities::status::StatusEffectKind;
use crate::world::area::LayoutShape;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkillId(pub u16);

/// Behavior class of a placed cell. Governs tick-time expiration handling
/// and rendering; overlap rules are driven by `OverlapTraits` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Field,
    Mist,
    Conduit,
    Denial,
    Trap,
    TrapSpent,
    Song,
    Aura,
    Meteor,
    Barrier,
    Warning,
    Blast,
}

/// Placement-time coexistence classification, evaluated pairwise in the
/// resolver's fixed rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlapTraits {
    /// Never removed by other placements and never blocks them.
    pub aura_exempt: bool,
    /// Removes opposing ground effects at its cells; mutual-cancels with the
    /// same denial skill.
    pub ground_denial: bool,
    /// Survives a ground-denial placement.
    pub denial_immune: bool,
    /// Enumerated hazard the denial effect leaves alone.
    pub denial_exception: bool,
    /// Placement clears any unit flagged `ranged_single_unit`, whole group.
    pub clears_ranged_single: bool,
    /// Part of a ranged, single-instance layout; cleared as one group.
    pub ranged_single_unit: bool,
    /// At most one live instance of this skill per map.
    pub elemental_field: bool,
    /// Doubles its own per-cell duration over a compatible field.
    pub mist_class: bool,
    /// Consumes a compatible field cell outright when placed.
    pub consumes_field: bool,
    /// Two instances of the same skill cannot share a cell.
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillUnitDef {
    pub skill: SkillId,
    pub name: &'static str,
    pub kind: UnitKind,
    pub layout: LayoutShape,
    /// Nominal group lifetime in ms; 0 marks a non-expiring aura.
    pub limit_ms: u64,
    /// Effect re-application period. `None` disables tick-time rescans and
    /// leaves throttling entirely to the per-entity tickset.
    pub interval_ms: Option<u64>,
    /// Tickset period used when `interval_ms` is `None`.
    pub throttle_ms: u64,
    /// Trigger radius; -1 disables proximity triggering.
    pub range: i16,
    pub target_mask: TargetMask,
    pub category_mask: CategoryMask,
    pub hidden: bool,
    pub requires_ground: bool,
    /// Torn down as soon as the caster stops resolving.
    pub caster_linked: bool,
    pub song_dance: bool,
    /// Songs of different families clash into dissonance when overlapping.
    pub music_family: Option<u8>,
    pub overlap: OverlapTraits,
    /// Mist-class: field skill this one extends on top of.
    pub extends_on: Option<SkillId>,
    /// Conduit-class: field skill whose cell this one consumes.
    pub consumes: Option<SkillId>,
    pub linked_status: Option<StatusEffectKind>,
    pub status_duration_ms: u64,
    /// Linked status requires standing inside; ended on cell exit.
    pub status_requires_presence: bool,
    /// Reduced re-application window granted when leaving the whole
    /// footprint of a song/dance group.
    pub song_grace_ms: u64,
    /// Status held by the caster while the group lives; ended explicitly on
    /// group teardown.
    pub caster_status: Option<StatusEffectKind>,
    /// Destructible cell health; 0 marks an indestructible cell.
    pub trap_hp: i32,
    /// Lifetime of the spent visual left behind by a sprung trap.
    pub spent_ms: u64,
    /// Lifetime extension granted per degrade step of a destructible trap.
    pub degrade_window_ms: u64,
    /// Kind adopted when the unit morphs at expiry (warning states).
    pub morph_to: Option<UnitKind>,
    pub morph_limit_ms: u64,
}

impl SkillUnitDef {
    pub fn throttle_period(&self) -> u64 {
        self.interval_ms.unwrap_or(self.throttle_ms)
    }

    pub fn is_aura(&self) -> bool {
        self.limit_ms == 0
    }
}

const DEF_BASE: SkillUnitDef = SkillUnitDef {
    skill: SkillId(0),
    name: "",
    kind: UnitKind::Field,
    layout: LayoutShape::Single,
    limit_ms: 10_000,
    interval_ms: None,
    throttle_ms: 1_000,
    range: -1,
    target_mask: TargetMask(TARGET_ENEMY),
    category_mask: CategoryMask(CATEGORY_ANY),
    hidden: false,
    requires_ground: false,
    caster_linked: false,
    song_dance: false,
    music_family: None,
    overlap: OverlapTraits {
        aura_exempt: false,
        ground_denial: false,
        denial_immune: false,
        denial_exception: false,
        clears_ranged_single: false,
        ranged_single_unit: false,
        elemental_field: false,
        mist_class: false,
        consumes_field: false,
        unique: false,
    },
    extends_on: None,
    consumes: None,
    linked_status: None,
    status_duration_ms: 0,
    status_requires_presence: false,
    song_grace_ms: 2_000,
    caster_status: None,
    trap_hp: 0,
    spent_ms: 1_500,
    degrade_window_ms: 30_000,
    morph_to: None,
    morph_limit_ms: 0,
};

const NO_OVERLAP: OverlapTraits = DEF_BASE.overlap;

pub const EMBER_FIELD: SkillId = SkillId(101);
pub const TIDE_FIELD: SkillId = SkillId(102);
pub const GALE_FIELD: SkillId = SkillId(103);
pub const MIRAGE_MIST: SkillId = SkillId(104);
pub const WATER_CONDUIT: SkillId = SkillId(105);
pub const NULL_WARD: SkillId = SkillId(106);
pub const SUNDER_GLYPH: SkillId = SkillId(107);
pub const BLIZZARD_SWEEP: SkillId = SkillId(108);
pub const ICE_BARRIER: SkillId = SkillId(109);
pub const HALLOWED_GROUND: SkillId = SkillId(110);
pub const AEGIS_FIELD: SkillId = SkillId(111);
pub const SNARE_TRAP: SkillId = SkillId(112);
pub const BLAST_TRAP: SkillId = SkillId(113);
pub const STARFALL: SkillId = SkillId(114);
pub const BATTLE_HYMN: SkillId = SkillId(115);
pub const LULLABY_WALTZ: SkillId = SkillId(116);
pub const FAULTLINE: SkillId = SkillId(117);

/// Built-in placement definitions. The bespoke damage numbers live in the
/// external payload layer; this table carries everything placement and
/// lifecycle need.
static BUILTIN_SKILL_UNITS: &[SkillUnitDef] = &[
    SkillUnitDef {
        skill: EMBER_FIELD,
        name: "ember field",
        layout: LayoutShape::Square { radius: 1 },
        limit_ms: 20_000,
        interval_ms: Some(1_000),
        range: 0,
        linked_status: Some(StatusEffectKind::Burn),
        status_duration_ms: 5_000,
        overlap: OverlapTraits {
            elemental_field: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: TIDE_FIELD,
        name: "tide field",
        layout: LayoutShape::Square { radius: 1 },
        limit_ms: 20_000,
        interval_ms: Some(1_000),
        range: 0,
        linked_status: Some(StatusEffectKind::Drench),
        status_duration_ms: 5_000,
        status_requires_presence: true,
        overlap: OverlapTraits {
            elemental_field: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: GALE_FIELD,
        name: "gale field",
        layout: LayoutShape::Square { radius: 1 },
        limit_ms: 20_000,
        interval_ms: Some(1_000),
        range: 0,
        overlap: OverlapTraits {
            elemental_field: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: MIRAGE_MIST,
        name: "mirage mist",
        kind: UnitKind::Mist,
        layout: LayoutShape::Square { radius: 2 },
        limit_ms: 15_000,
        throttle_ms: 2_000,
        range: 0,
        extends_on: Some(TIDE_FIELD),
        overlap: OverlapTraits {
            mist_class: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: WATER_CONDUIT,
        name: "water conduit",
        kind: UnitKind::Conduit,
        limit_ms: 30_000,
        consumes: Some(TIDE_FIELD),
        overlap: OverlapTraits {
            consumes_field: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: NULL_WARD,
        name: "null ward",
        kind: UnitKind::Denial,
        layout: LayoutShape::Square { radius: 2 },
        limit_ms: 30_000,
        overlap: OverlapTraits {
            ground_denial: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: SUNDER_GLYPH,
        name: "sunder glyph",
        layout: LayoutShape::Square { radius: 1 },
        limit_ms: 500,
        overlap: OverlapTraits {
            clears_ranged_single: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: BLIZZARD_SWEEP,
        name: "blizzard sweep",
        kind: UnitKind::Blast,
        layout: LayoutShape::Square { radius: 4 },
        limit_ms: 4_600,
        interval_ms: Some(450),
        range: 0,
        linked_status: Some(StatusEffectKind::Chill),
        status_duration_ms: 3_000,
        overlap: OverlapTraits {
            ranged_single_unit: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: ICE_BARRIER,
        name: "ice barrier",
        kind: UnitKind::Barrier,
        limit_ms: 40_000,
        requires_ground: true,
        overlap: OverlapTraits {
            unique: true,
            denial_exception: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: HALLOWED_GROUND,
        name: "hallowed ground",
        layout: LayoutShape::Square { radius: 2 },
        limit_ms: 30_000,
        interval_ms: Some(1_000),
        range: 0,
        target_mask: TargetMask(TARGET_FRIEND),
        linked_status: Some(StatusEffectKind::Sanctify),
        status_duration_ms: 1_500,
        status_requires_presence: true,
        overlap: OverlapTraits {
            unique: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: AEGIS_FIELD,
        name: "aegis field",
        kind: UnitKind::Aura,
        layout: LayoutShape::Circle { radius: 4 },
        limit_ms: 0,
        interval_ms: Some(300),
        range: 0,
        target_mask: TargetMask(TARGET_FRIEND),
        caster_linked: true,
        linked_status: Some(StatusEffectKind::Aegis),
        status_duration_ms: 1_000,
        status_requires_presence: true,
        overlap: OverlapTraits {
            aura_exempt: true,
            denial_immune: true,
            ..NO_OVERLAP
        },
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: SNARE_TRAP,
        name: "snare trap",
        kind: UnitKind::Trap,
        limit_ms: 120_000,
        range: 0,
        hidden: true,
        requires_ground: true,
        linked_status: Some(StatusEffectKind::Snare),
        status_duration_ms: 5_000,
        trap_hp: 100,
        spent_ms: 4_000,
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: BLAST_TRAP,
        name: "blast trap",
        kind: UnitKind::Trap,
        limit_ms: 90_000,
        range: 1,
        hidden: true,
        requires_ground: true,
        trap_hp: 50,
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: STARFALL,
        name: "starfall",
        kind: UnitKind::Meteor,
        layout: LayoutShape::Single,
        limit_ms: 2_500,
        // Strike radius applied on the final tick only.
        range: 3,
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: BATTLE_HYMN,
        name: "battle hymn",
        kind: UnitKind::Song,
        layout: LayoutShape::Square { radius: 3 },
        limit_ms: 60_000,
        throttle_ms: 4_000,
        range: 0,
        target_mask: TargetMask(TARGET_FRIEND),
        song_dance: true,
        music_family: Some(0),
        linked_status: Some(StatusEffectKind::Hymn),
        status_duration_ms: 6_000,
        caster_status: Some(StatusEffectKind::Performing),
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: LULLABY_WALTZ,
        name: "lullaby waltz",
        kind: UnitKind::Song,
        layout: LayoutShape::Square { radius: 3 },
        limit_ms: 60_000,
        throttle_ms: 4_000,
        range: 0,
        song_dance: true,
        music_family: Some(1),
        linked_status: Some(StatusEffectKind::Lullaby),
        status_duration_ms: 6_000,
        caster_status: Some(StatusEffectKind::Performing),
        ..DEF_BASE
    },
    SkillUnitDef {
        skill: FAULTLINE,
        name: "faultline",
        kind: UnitKind::Warning,
        layout: LayoutShape::Cross { arm: 2 },
        limit_ms: 2_000,
        interval_ms: Some(500),
        range: 0,
        morph_to: Some(UnitKind::Field),
        morph_limit_ms: 8_000,
        ..DEF_BASE
    },
];

pub struct SkillUnitIndex {
    by_id: HashMap<SkillId, &'static SkillUnitDef>,
}

impl SkillUnitIndex {
    fn build() -> Self {
        let mut by_id = HashMap::new();
        for def in BUILTIN_SKILL_UNITS {
            by_id.insert(def.skill, def);
        }
        Self { by_id }
    }

    pub fn get(&self, skill: SkillId) -> Option<&'static SkillUnitDef> {
        self.by_id.get(&skill).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

pub fn skill_unit_index() -> &'static SkillUnitIndex {
    static INDEX: OnceLock<SkillUnitIndex> = OnceLock::new();
    INDEX.get_or_init(SkillUnitIndex::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_unique_ids() {
        let index = skill_unit_index();
        assert_eq!(index.len(), BUILTIN_SKILL_UNITS.len());
    }

    #[test]
    fn lookup_finds_known_skills() {
        let index = skill_unit_index();
        let trap = index.get(SNARE_TRAP).expect("snare trap");
        assert_eq!(trap.kind, UnitKind::Trap);
        assert!(trap.hidden);
        assert!(index.get(SkillId(9_999)).is_none());
    }

    #[test]
    fn aura_is_marked_non_expiring() {
        let index = skill_unit_index();
        let aura = index.get(AEGIS_FIELD).expect("aegis field");
        assert!(aura.is_aura());
        assert!(aura.caster_linked);
        assert!(aura.overlap.aura_exempt);
    }

    #[test]
    fn throttle_period_prefers_interval() {
        let index = skill_unit_index();
        let field = index.get(EMBER_FIELD).expect("ember field");
        assert_eq!(field.throttle_period(), 1_000);
        let song = index.get(BATTLE_HYMN).expect("battle hymn");
        assert_eq!(song.interval_ms, None);
        assert_eq!(song.throttle_period(), 4_000);
    }

    #[test]
    fn songs_declare_distinct_music_families() {
        let index = skill_unit_index();
        let hymn = index.get(BATTLE_HYMN).expect("hymn");
        let waltz = index.get(LULLABY_WALTZ).expect("waltz");
        assert!(hymn.song_dance && waltz.song_dance);
        assert_ne!(hymn.music_family, waltz.music_family);
    }
}
