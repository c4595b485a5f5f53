/// Status effects the engine can request on entities. The status container
/// itself lives outside this crate; these are interface tags only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusEffectKind {
    Burn,
    Drench,
    Chill,
    Snare,
    Sanctify,
    Aegis,
    Hymn,
    Lullaby,
    Dissonance,
    Performing,
}

/// Opaque payload forwarded with a status application. Semantics belong to
/// the external status module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusParams {
    pub power: i32,
    pub skill_lv: u8,
}

impl StatusParams {
    pub fn new(power: i32, skill_lv: u8) -> Self {
        Self { power, skill_lv }
    }
}
