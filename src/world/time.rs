use std::time::Duration;

/// Simulation timestamp in milliseconds. One engine tick advances the clock
/// by the configured tick length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameTick(pub u64);

impl GameTick {
    pub const MAX: GameTick = GameTick(u64::MAX);

    pub fn saturating_add(self, millis: u64) -> GameTick {
        GameTick(self.0.saturating_add(millis))
    }

    pub fn saturating_sub(self, other: GameTick) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

#[derive(Debug, Clone)]
pub struct GameClock {
    tick_length: Duration,
    now: GameTick,
}

impl GameClock {
    pub fn new(tick_length: Duration) -> Self {
        let tick_length = if tick_length.is_zero() {
            Duration::from_millis(1)
        } else {
            tick_length
        };
        Self {
            tick_length,
            now: GameTick(0),
        }
    }

    pub fn tick_length(&self) -> Duration {
        self.tick_length
    }

    pub fn now(&self) -> GameTick {
        self.now
    }

    /// Advance by one tick length and return the new timestamp.
    pub fn advance(&mut self) -> GameTick {
        self.advance_duration(self.tick_length)
    }

    pub fn advance_duration(&mut self, duration: Duration) -> GameTick {
        let millis = duration.as_millis().min(u128::from(u64::MAX)) as u64;
        self.now = self.now.saturating_add(millis);
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_by_tick_length() {
        let mut clock = GameClock::new(Duration::from_millis(100));
        assert_eq!(clock.now(), GameTick(0));
        assert_eq!(clock.advance(), GameTick(100));
        assert_eq!(clock.advance(), GameTick(200));
    }

    #[test]
    fn zero_tick_length_is_clamped() {
        let mut clock = GameClock::new(Duration::ZERO);
        assert_eq!(clock.advance(), GameTick(1));
    }

    #[test]
    fn tick_saturates_instead_of_wrapping() {
        let tick = GameTick(u64::MAX - 1);
        assert_eq!(tick.saturating_add(10), GameTick::MAX);
        assert_eq!(GameTick(5).saturating_sub(GameTick(9)), 0);
    }
}
