use crate::world::position::{Position, PositionDelta};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Footprint shape of a ground effect, applied around a placement origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutShape {
    /// The origin cell only.
    Single,
    /// Filled square, `(2r+1) x (2r+1)` cells.
    Square { radius: u8 },
    /// Chebyshev-rounded disc.
    Circle { radius: u8 },
    /// Origin plus four straight arms.
    Cross { arm: u8 },
    /// Hand-authored offsets for irregular shapes.
    Custom(&'static [(i16, i16)]),
}

pub fn square_offsets(radius: u8) -> Vec<(i16, i16)> {
    let radius = i16::from(radius);
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            offsets.push((dx, dy));
        }
    }
    offsets
}

pub fn circle_offsets(radius: u8) -> Vec<(i16, i16)> {
    if radius == 0 {
        return vec![(0, 0)];
    }
    let radius = i16::from(radius);
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if (i32::from(dx) * i32::from(dx) + i32::from(dy) * i32::from(dy))
                <= i32::from(radius) * i32::from(radius)
            {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

pub fn cross_offsets(arm: u8) -> Vec<(i16, i16)> {
    let arm = i16::from(arm);
    let mut offsets = vec![(0, 0)];
    for step in 1..=arm {
        offsets.push((step, 0));
        offsets.push((-step, 0));
        offsets.push((0, step));
        offsets.push((0, -step));
    }
    offsets
}

pub fn shape_offsets(shape: LayoutShape) -> Vec<(i16, i16)> {
    match shape {
        LayoutShape::Single => vec![(0, 0)],
        LayoutShape::Square { radius } => square_offsets(radius),
        LayoutShape::Circle { radius } => circle_offsets(radius),
        LayoutShape::Cross { arm } => cross_offsets(arm),
        LayoutShape::Custom(offsets) => offsets.to_vec(),
    }
}

pub fn shape_positions(shape: LayoutShape, origin: Position) -> Vec<Position> {
    shape_offsets(shape)
        .into_iter()
        .filter_map(|(dx, dy)| origin.offset(PositionDelta { dx, dy }))
        .collect()
}

/// Offset cache with LRU eviction. Footprints are recomputed rarely relative
/// to how often they are placed, so shared `Arc` snapshots are handed out.
pub struct LayoutCache {
    cache: LruCache<LayoutShape, Arc<Vec<(i16, i16)>>>,
    hits: u64,
    misses: u64,
}

impl LayoutCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, shape: LayoutShape) -> Arc<Vec<(i16, i16)>> {
        if let Some(offsets) = self.cache.get(&shape) {
            self.hits += 1;
            return Arc::clone(offsets);
        }
        self.misses += 1;
        let offsets = Arc::new(shape_offsets(shape));
        self.cache.put(shape, Arc::clone(&offsets));
        offsets
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::position::MapId;

    #[test]
    fn square_covers_expected_cell_count() {
        assert_eq!(square_offsets(0).len(), 1);
        assert_eq!(square_offsets(1).len(), 9);
        assert_eq!(square_offsets(2).len(), 25);
    }

    #[test]
    fn cross_has_origin_and_four_arms() {
        let offsets = cross_offsets(2);
        assert_eq!(offsets.len(), 9);
        assert!(offsets.contains(&(0, 0)));
        assert!(offsets.contains(&(2, 0)));
        assert!(offsets.contains(&(0, -2)));
        assert!(!offsets.contains(&(1, 1)));
    }

    #[test]
    fn circle_is_subset_of_square() {
        let circle = circle_offsets(3);
        let square = square_offsets(3);
        assert!(circle.len() < square.len());
        for offset in &circle {
            assert!(square.contains(offset));
        }
    }

    #[test]
    fn positions_drop_out_of_bounds_cells() {
        let origin = Position::new(MapId(1), i16::MAX, 0);
        let positions = shape_positions(LayoutShape::Square { radius: 1 }, origin);
        // The column past i16::MAX is dropped, not wrapped.
        assert_eq!(positions.len(), 6);
    }

    #[test]
    fn layout_cache_reuses_offsets() {
        let mut cache = LayoutCache::new(4);
        let first = cache.get(LayoutShape::Square { radius: 2 });
        let second = cache.get(LayoutShape::Square { radius: 2 });
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.hit_rate() > 0.0);
    }

    #[test]
    fn layout_cache_distinguishes_custom_shapes() {
        static SHAPE_A: &[(i16, i16)] = &[(0, 0), (1, 0)];
        static SHAPE_B: &[(i16, i16)] = &[(0, 0), (0, 1)];
        let mut cache = LayoutCache::new(4);
        let a = cache.get(LayoutShape::Custom(SHAPE_A));
        let b = cache.get(LayoutShape::Custom(SHAPE_B));
        assert_ne!(a.as_slice(), b.as_slice());
    }
}
