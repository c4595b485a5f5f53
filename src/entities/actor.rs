#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartyId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuildId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorCategory {
    Player,
    Monster,
    Npc,
}

/// Group-membership snapshot of an entity, re-resolved by id at use time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affiliation {
    pub party: Option<PartyId>,
    pub guild: Option<GuildId>,
    pub team: TeamId,
    pub category: ActorCategory,
}

impl Affiliation {
    pub fn solo(team: TeamId, category: ActorCategory) -> Self {
        Self {
            party: None,
            guild: None,
            team,
            category,
        }
    }
}

pub const TARGET_SELF: u16 = 0x01;
pub const TARGET_PARTY: u16 = 0x02;
pub const TARGET_GUILD: u16 = 0x04;
pub const TARGET_ALLY: u16 = 0x08;
pub const TARGET_ENEMY: u16 = 0x10;
pub const TARGET_ALL: u16 =
    TARGET_SELF | TARGET_PARTY | TARGET_GUILD | TARGET_ALLY | TARGET_ENEMY;
pub const TARGET_FRIEND: u16 = TARGET_SELF | TARGET_PARTY | TARGET_GUILD | TARGET_ALLY;

/// Bitmask of eligible target relationships relative to the caster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMask(pub u16);

pub const CATEGORY_PLAYER: u8 = 0x01;
pub const CATEGORY_MONSTER: u8 = 0x02;
pub const CATEGORY_NPC: u8 = 0x04;
pub const CATEGORY_ANY: u8 = CATEGORY_PLAYER | CATEGORY_MONSTER | CATEGORY_NPC;

/// Bitmask of eligible entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMask(pub u8);

impl CategoryMask {
    pub fn matches(self, category: ActorCategory) -> bool {
        let bit = match category {
            ActorCategory::Player => CATEGORY_PLAYER,
            ActorCategory::Monster => CATEGORY_MONSTER,
            ActorCategory::Npc => CATEGORY_NPC,
        };
        self.0 & bit != 0
    }
}

/// Relationship bits that hold between a caster snapshot and a target.
pub fn relation_bits(
    caster: ActorId,
    caster_affiliation: Affiliation,
    target: ActorId,
    target_affiliation: Affiliation,
) -> u16 {
    if caster == target {
        // Self is also a party/guild/ally member for mask purposes.
        return TARGET_SELF | TARGET_PARTY | TARGET_GUILD | TARGET_ALLY;
    }
    let mut bits = 0;
    if let (Some(a), Some(b)) = (caster_affiliation.party, target_affiliation.party) {
        if a == b {
            bits |= TARGET_PARTY;
        }
    }
    if let (Some(a), Some(b)) = (caster_affiliation.guild, target_affiliation.guild) {
        if a == b {
            bits |= TARGET_GUILD;
        }
    }
    if caster_affiliation.team == target_affiliation.team {
        bits |= TARGET_ALLY;
    } else {
        bits |= TARGET_ENEMY;
    }
    bits
}

impl TargetMask {
    pub fn accepts(
        self,
        caster: ActorId,
        caster_affiliation: Affiliation,
        target: ActorId,
        target_affiliation: Affiliation,
    ) -> bool {
        self.0 & relation_bits(caster, caster_affiliation, target, target_affiliation) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(party: Option<u32>, team: u32) -> Affiliation {
        Affiliation {
            party: party.map(PartyId),
            guild: None,
            team: TeamId(team),
            category: ActorCategory::Player,
        }
    }

    #[test]
    fn self_matches_friendly_masks() {
        let caster = ActorId(1);
        let affiliation = player(None, 1);
        assert!(TargetMask(TARGET_SELF).accepts(caster, affiliation, caster, affiliation));
        assert!(TargetMask(TARGET_PARTY).accepts(caster, affiliation, caster, affiliation));
        assert!(!TargetMask(TARGET_ENEMY).accepts(caster, affiliation, caster, affiliation));
    }

    #[test]
    fn party_membership_is_required_on_both_sides() {
        let caster = ActorId(1);
        let target = ActorId(2);
        assert!(TargetMask(TARGET_PARTY).accepts(
            caster,
            player(Some(7), 1),
            target,
            player(Some(7), 1)
        ));
        assert!(!TargetMask(TARGET_PARTY).accepts(
            caster,
            player(Some(7), 1),
            target,
            player(None, 1)
        ));
        assert!(!TargetMask(TARGET_PARTY).accepts(
            caster,
            player(Some(7), 1),
            target,
            player(Some(8), 1)
        ));
    }

    #[test]
    fn opposing_teams_are_enemies() {
        let caster = ActorId(1);
        let target = ActorId(2);
        assert!(TargetMask(TARGET_ENEMY).accepts(caster, player(None, 1), target, player(None, 2)));
        assert!(!TargetMask(TARGET_ENEMY).accepts(caster, player(None, 1), target, player(None, 1)));
        assert!(TargetMask(TARGET_ALLY).accepts(caster, player(None, 1), target, player(None, 1)));
    }

    #[test]
    fn category_mask_filters_kinds() {
        let players_only = CategoryMask(CATEGORY_PLAYER);
        assert!(players_only.matches(ActorCategory::Player));
        assert!(!players_only.matches(ActorCategory::Monster));
        assert!(CategoryMask(CATEGORY_ANY).matches(ActorCategory::Npc));
    }
}
