use crate::combat::skills::SkillUnitDef;

/// Outcome of evaluating one candidate cell against one existing live unit
/// at the same cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapOutcome {
    /// Candidate cell is not placed; existing unit untouched.
    Reject,
    /// Both coexist with no interaction.
    Coexist,
    /// Both coexist; candidate cell gets double duration.
    CoexistExtended,
    /// Existing unit removed; candidate placed.
    RemoveExisting,
    /// Existing unit removed AND candidate rejected (same denial type).
    MutualCancel,
    /// Existing field cell is used up; candidate placed.
    ConsumeExisting,
}

/// Pairwise coexistence rules, evaluated in fixed order with the first
/// decisive rule winning. Rule numbering is load-bearing: symmetry of the
/// net result depends on both directions of a pair resolving through the
/// same rule.
pub fn resolve(new: &SkillUnitDef, existing: &SkillUnitDef) -> OverlapOutcome {
    // 1. Exempt aura effects neither block nor get removed.
    if new.overlap.aura_exempt || existing.overlap.aura_exempt {
        return OverlapOutcome::Coexist;
    }

    // 2. Ground denial, both directions.
    if new.overlap.ground_denial {
        if existing.overlap.ground_denial && existing.skill == new.skill {
            return OverlapOutcome::MutualCancel;
        }
        if existing.overlap.denial_immune || existing.overlap.denial_exception {
            return OverlapOutcome::Coexist;
        }
        return OverlapOutcome::RemoveExisting;
    }
    if existing.overlap.ground_denial {
        if new.overlap.denial_immune || new.overlap.denial_exception {
            return OverlapOutcome::Coexist;
        }
        return OverlapOutcome::Reject;
    }

    // 3. Ground-clearing blast versus ranged single-instance layouts. The
    //    caller removes the whole sibling group, not just this cell.
    if new.overlap.clears_ranged_single && existing.overlap.ranged_single_unit {
        return OverlapOutcome::RemoveExisting;
    }
    if existing.overlap.clears_ranged_single && new.overlap.ranged_single_unit {
        return OverlapOutcome::Reject;
    }

    // 4. Self-exclusive elemental fields are handled before cell placement
    //    (one live instance per map); same-cell same-skill still rejects.
    if new.overlap.elemental_field && existing.skill == new.skill {
        return OverlapOutcome::Reject;
    }

    // 5. Mist over its compatible field extends the new cell.
    if new.overlap.mist_class && new.extends_on == Some(existing.skill) {
        return OverlapOutcome::CoexistExtended;
    }

    // 6. Conduit consumes its compatible field cell.
    if new.overlap.consumes_field && new.consumes == Some(existing.skill) {
        return OverlapOutcome::ConsumeExisting;
    }
    if existing.overlap.consumes_field && existing.consumes == Some(new.skill) {
        return OverlapOutcome::Reject;
    }

    // 7. Non-refreshable unique effects never stack with themselves.
    if new.overlap.unique && existing.skill == new.skill {
        return OverlapOutcome::Reject;
    }

    // 8. Default: independent coexistence.
    OverlapOutcome::Coexist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::skills::{
        skill_unit_index, SkillId, AEGIS_FIELD, BLIZZARD_SWEEP, EMBER_FIELD, HALLOWED_GROUND,
        ICE_BARRIER, MIRAGE_MIST, NULL_WARD, SNARE_TRAP, SUNDER_GLYPH, TIDE_FIELD, WATER_CONDUIT,
    };

    fn def(skill: SkillId) -> &'static crate::combat::skills::SkillUnitDef {
        skill_unit_index().get(skill).expect("builtin skill")
    }

    #[test]
    fn aura_exempt_wins_over_denial() {
        assert_eq!(
            resolve(def(NULL_WARD), def(AEGIS_FIELD)),
            OverlapOutcome::Coexist
        );
        assert_eq!(
            resolve(def(AEGIS_FIELD), def(NULL_WARD)),
            OverlapOutcome::Coexist
        );
    }

    #[test]
    fn denial_removes_ordinary_ground_effects() {
        assert_eq!(
            resolve(def(NULL_WARD), def(EMBER_FIELD)),
            OverlapOutcome::RemoveExisting
        );
        assert_eq!(
            resolve(def(EMBER_FIELD), def(NULL_WARD)),
            OverlapOutcome::Reject
        );
    }

    #[test]
    fn same_denial_type_cancels_mutually() {
        assert_eq!(
            resolve(def(NULL_WARD), def(NULL_WARD)),
            OverlapOutcome::MutualCancel
        );
    }

    #[test]
    fn denial_exceptions_survive() {
        assert_eq!(
            resolve(def(NULL_WARD), def(ICE_BARRIER)),
            OverlapOutcome::Coexist
        );
        assert_eq!(
            resolve(def(ICE_BARRIER), def(NULL_WARD)),
            OverlapOutcome::Coexist
        );
    }

    #[test]
    fn glyph_clears_ranged_single_units() {
        assert_eq!(
            resolve(def(SUNDER_GLYPH), def(BLIZZARD_SWEEP)),
            OverlapOutcome::RemoveExisting
        );
        // Only flagged layouts are cleared.
        assert_eq!(
            resolve(def(SUNDER_GLYPH), def(EMBER_FIELD)),
            OverlapOutcome::Coexist
        );
    }

    #[test]
    fn mist_extends_only_on_its_compatible_field() {
        assert_eq!(
            resolve(def(MIRAGE_MIST), def(TIDE_FIELD)),
            OverlapOutcome::CoexistExtended
        );
        assert_eq!(
            resolve(def(MIRAGE_MIST), def(EMBER_FIELD)),
            OverlapOutcome::Coexist
        );
    }

    #[test]
    fn conduit_consumes_its_field() {
        assert_eq!(
            resolve(def(WATER_CONDUIT), def(TIDE_FIELD)),
            OverlapOutcome::ConsumeExisting
        );
        assert_eq!(
            resolve(def(WATER_CONDUIT), def(EMBER_FIELD)),
            OverlapOutcome::Coexist
        );
    }

    #[test]
    fn unique_effects_reject_restack() {
        assert_eq!(
            resolve(def(HALLOWED_GROUND), def(HALLOWED_GROUND)),
            OverlapOutcome::Reject
        );
        assert_eq!(
            resolve(def(ICE_BARRIER), def(ICE_BARRIER)),
            OverlapOutcome::Reject
        );
    }

    #[test]
    fn unrelated_effects_coexist() {
        assert_eq!(
            resolve(def(SNARE_TRAP), def(EMBER_FIELD)),
            OverlapOutcome::Coexist
        );
    }

    /// Net survivors at a cell are insertion-order independent for every
    /// builtin pair: placing A onto B and B onto A must leave the same
    /// multiset of skills alive. Comparing skill identities (rather than
    /// which cast was first) keeps the same-skill diagonal well-defined:
    /// when A rejects its own restack, the earlier A survives either way.
    #[test]
    fn outcome_class_is_order_independent() {
        let all = [
            EMBER_FIELD,
            TIDE_FIELD,
            MIRAGE_MIST,
            WATER_CONDUIT,
            NULL_WARD,
            SUNDER_GLYPH,
            BLIZZARD_SWEEP,
            ICE_BARRIER,
            HALLOWED_GROUND,
            AEGIS_FIELD,
            SNARE_TRAP,
        ];
        // Skills left alive after `second` is placed onto `first`.
        fn survivors(first: SkillId, second: SkillId) -> Vec<SkillId> {
            let outcome = resolve(
                skill_unit_index().get(second).expect("second"),
                skill_unit_index().get(first).expect("first"),
            );
            let (first_survives, second_survives) = match outcome {
                OverlapOutcome::Reject => (true, false),
                OverlapOutcome::Coexist | OverlapOutcome::CoexistExtended => (true, true),
                OverlapOutcome::RemoveExisting => (false, true),
                OverlapOutcome::MutualCancel => (false, false),
                OverlapOutcome::ConsumeExisting => (false, true),
            };
            let mut alive = Vec::new();
            if first_survives {
                alive.push(first);
            }
            if second_survives {
                alive.push(second);
            }
            alive.sort_by_key(|skill| skill.0);
            alive
        }
        for a in all {
            for b in all {
                assert_eq!(
                    survivors(a, b),
                    survivors(b, a),
                    "asymmetric net survivors for {:?} vs {:?}",
                    a,
                    b
                );
            }
        }
    }
}
