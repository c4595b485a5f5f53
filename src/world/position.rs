#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub map: MapId,
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionDelta {
    pub dx: i16,
    pub dy: i16,
}

impl Position {
    pub fn new(map: MapId, x: i16, y: i16) -> Self {
        Self { map, x, y }
    }

    pub fn offset(self, delta: PositionDelta) -> Option<Self> {
        let x = i32::from(self.x) + i32::from(delta.dx);
        let y = i32::from(self.y) + i32::from(delta.dy);

        if x < i32::from(i16::MIN) || x > i32::from(i16::MAX) {
            return None;
        }
        if y < i32::from(i16::MIN) || y > i32::from(i16::MAX) {
            return None;
        }

        Some(Self {
            map: self.map,
            x: x as i16,
            y: y as i16,
        })
    }

    /// Chebyshev distance; `None` when the positions are on different maps.
    pub fn distance(self, other: Position) -> Option<u16> {
        if self.map != other.map {
            return None;
        }
        let dx = (i32::from(self.x) - i32::from(other.x)).unsigned_abs();
        let dy = (i32::from(self.y) - i32::from(other.y)).unsigned_abs();
        Some(dx.max(dy).min(u32::from(u16::MAX)) as u16)
    }

    pub fn within_range(self, other: Position, range: i16) -> bool {
        if range < 0 {
            return false;
        }
        match self.distance(other) {
            Some(distance) => distance <= range as u16,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_rejects_coordinate_overflow() {
        let origin = Position::new(MapId(1), i16::MAX, 10);
        assert!(origin.offset(PositionDelta { dx: 1, dy: 0 }).is_none());
        assert!(origin.offset(PositionDelta { dx: -1, dy: 0 }).is_some());
    }

    #[test]
    fn distance_is_chebyshev() {
        let a = Position::new(MapId(1), 10, 10);
        let b = Position::new(MapId(1), 13, 11);
        assert_eq!(a.distance(b), Some(3));
        assert_eq!(b.distance(a), Some(3));
    }

    #[test]
    fn distance_across_maps_is_none() {
        let a = Position::new(MapId(1), 10, 10);
        let b = Position::new(MapId(2), 10, 10);
        assert_eq!(a.distance(b), None);
        assert!(!a.within_range(b, 5));
    }

    #[test]
    fn negative_range_never_matches() {
        let a = Position::new(MapId(1), 10, 10);
        assert!(!a.within_range(a, -1));
        assert!(a.within_range(a, 0));
    }
}
