use crate::units::unit::{SkillUnit, UnitId};
use crate::world::position::{MapId, Position};
use std::collections::HashMap;

/// Global bidirectional index over live skill units: unique id to unit, and
/// cell to the units occupying it. Queries hand out id snapshots so callbacks
/// may delete units mid-iteration; callers re-check `alive` before acting.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: HashMap<UnitId, SkillUnit>,
    by_cell: HashMap<Position, Vec<UnitId>>,
    next_unit_id: u32,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            by_cell: HashMap::new(),
            next_unit_id: 1,
        }
    }

    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id = self.next_unit_id.wrapping_add(1).max(1);
        id
    }

    pub fn register(&mut self, unit: SkillUnit) {
        self.by_cell.entry(unit.pos).or_default().push(unit.id);
        self.units.insert(unit.id, unit);
    }

    /// Remove a unit from both indexes. Idempotent.
    pub fn purge(&mut self, id: UnitId) {
        let Some(unit) = self.units.remove(&id) else {
            return;
        };
        if let Some(ids) = self.by_cell.get_mut(&unit.pos) {
            ids.retain(|entry| *entry != id);
            if ids.is_empty() {
                self.by_cell.remove(&unit.pos);
            }
        }
    }

    pub fn get(&self, id: UnitId) -> Option<&SkillUnit> {
        self.units.get(&id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut SkillUnit> {
        self.units.get_mut(&id)
    }

    /// Ids of live units at exactly this cell. Snapshot, not a live view.
    pub fn units_at(&self, pos: Position) -> Vec<UnitId> {
        let Some(ids) = self.by_cell.get(&pos) else {
            return Vec::new();
        };
        ids.iter()
            .copied()
            .filter(|id| self.units.get(id).map(|unit| unit.alive).unwrap_or(false))
            .collect()
    }

    /// Ids of live units inside an axis-aligned rectangle. Snapshot.
    pub fn units_in_area(&self, map: MapId, x0: i16, y0: i16, x1: i16, y1: i16) -> Vec<UnitId> {
        let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (y0, y1) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        let mut ids = Vec::new();
        for (pos, cell_ids) in &self.by_cell {
            if pos.map != map || pos.x < x0 || pos.x > x1 || pos.y < y0 || pos.y > y1 {
                continue;
            }
            for id in cell_ids {
                if self.units.get(id).map(|unit| unit.alive).unwrap_or(false) {
                    ids.push(*id);
                }
            }
        }
        ids
    }

    /// Snapshot of every registered unit id, live or marked dead.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::skills::UnitKind;
    use crate::units::group::GroupId;
    use crate::world::time::GameTick;

    fn test_unit(id: u32, pos: Position) -> SkillUnit {
        SkillUnit {
            id: UnitId(id),
            group: GroupId(0x10000),
            pos,
            alive: true,
            kind: UnitKind::Field,
            val1: 0,
            val2: 0,
            val3: 0,
            val4: 0,
            range: 0,
            limit: GameTick(1_000),
            hidden: false,
            dissonance: false,
        }
    }

    #[test]
    fn register_and_point_query() {
        let mut registry = UnitRegistry::new();
        let pos = Position::new(MapId(1), 5, 5);
        registry.register(test_unit(1, pos));
        registry.register(test_unit(2, pos));
        registry.register(test_unit(3, Position::new(MapId(1), 6, 5)));
        let at = registry.units_at(pos);
        assert_eq!(at.len(), 2);
        assert!(at.contains(&UnitId(1)) && at.contains(&UnitId(2)));
    }

    #[test]
    fn dead_units_are_skipped_by_queries_until_purged() {
        let mut registry = UnitRegistry::new();
        let pos = Position::new(MapId(1), 5, 5);
        registry.register(test_unit(1, pos));
        registry.get_mut(UnitId(1)).expect("unit").alive = false;
        assert!(registry.units_at(pos).is_empty());
        assert_eq!(registry.len(), 1);
        registry.purge(UnitId(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn purge_is_idempotent() {
        let mut registry = UnitRegistry::new();
        registry.register(test_unit(1, Position::new(MapId(1), 5, 5)));
        registry.purge(UnitId(1));
        registry.purge(UnitId(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn area_query_filters_by_map_and_bounds() {
        let mut registry = UnitRegistry::new();
        registry.register(test_unit(1, Position::new(MapId(1), 5, 5)));
        registry.register(test_unit(2, Position::new(MapId(1), 9, 9)));
        registry.register(test_unit(3, Position::new(MapId(2), 5, 5)));
        let found = registry.units_in_area(MapId(1), 4, 4, 6, 6);
        assert_eq!(found, vec![UnitId(1)]);
        // Reversed bounds are normalized.
        let found = registry.units_in_area(MapId(1), 9, 9, 4, 4);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn area_query_snapshot_survives_mid_iteration_deletion() {
        let mut registry = UnitRegistry::new();
        registry.register(test_unit(1, Position::new(MapId(1), 5, 5)));
        registry.register(test_unit(2, Position::new(MapId(1), 5, 6)));
        let snapshot = registry.units_in_area(MapId(1), 0, 0, 10, 10);
        for id in snapshot {
            // Deleting while walking the snapshot must not disturb it; the
            // re-check below is the discipline callers follow.
            if registry.get(id).map(|unit| unit.alive).unwrap_or(false) {
                registry.purge(id);
            }
        }
        assert!(registry.is_empty());
    }
}
