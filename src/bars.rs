use std::time::{SystemTime, UNIX_EPOCH};

/// Hard ceiling on the raw activity level and therefore on bar heights.
pub const MAX_BAR_LEVEL: i32 = 20;

/// Baseline every bar decays to during silence. Bars never drop below
/// it, which keeps a faint strip visible when nothing is playing.
pub const FLOOR_LEVEL: i32 = 1;

/// Per-bar smoothed amplitude state.
///
/// The vector tracks the configured bar count: it grows on demand and
/// existing heights survive a resize. Once a bar exists its height stays
/// inside `FLOOR_LEVEL..=MAX_BAR_LEVEL`; the render path treats indices
/// beyond the vector as height zero.
pub struct BarField {
    heights: Vec<i32>,
    rng_state: u64,
}

impl BarField {
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        Self::with_seed(seed)
    }

    /// Fixed-seed constructor for deterministic sequences.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            heights: Vec::new(),
            rng_state: seed,
        }
    }

    pub fn heights(&self) -> &[i32] {
        &self.heights
    }

    /// Runs one capture-cycle update over the first `bar_count` bars.
    ///
    /// Each bar is pulled halfway toward its own uniformly random target
    /// in `0..=bar_level` (integer floor division), which gives the
    /// cheap low-pass "dancing" motion. During silence (`bar_level` 0)
    /// every bar instead decays by one step. Both paths clamp at
    /// [`FLOOR_LEVEL`].
    pub fn advance(&mut self, bar_count: usize, bar_level: i32) {
        let bar_level = bar_level.clamp(0, MAX_BAR_LEVEL);
        if self.heights.len() < bar_count {
            self.heights.resize(bar_count, FLOOR_LEVEL);
        }
        for i in 0..bar_count {
            if bar_level == 0 {
                self.heights[i] = (self.heights[i] - 1).max(FLOOR_LEVEL);
            } else {
                let target = (self.next_u32() % (bar_level as u32 + 1)) as i32;
                self.heights[i] = ((self.heights[i] + target) / 2).max(FLOOR_LEVEL);
            }
        }
    }

    fn next_u32(&mut self) -> u32 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (self.rng_state >> 32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_from_the_start_stays_at_floor() {
        let mut bars = BarField::with_seed(1);
        for _ in 0..50 {
            bars.advance(80, 0);
        }
        assert_eq!(bars.heights().len(), 80);
        assert!(bars.heights().iter().all(|&h| h == FLOOR_LEVEL));
    }

    #[test]
    fn silence_settles_active_bars_back_to_the_floor() {
        let mut bars = BarField::with_seed(7);
        for _ in 0..10 {
            bars.advance(80, MAX_BAR_LEVEL);
        }
        for _ in 0..50 {
            bars.advance(80, 0);
        }
        assert!(bars.heights().iter().all(|&h| h == FLOOR_LEVEL));
    }

    #[test]
    fn sustained_high_signal_keeps_heights_in_range() {
        let mut bars = BarField::with_seed(42);
        for _ in 0..500 {
            bars.advance(64, MAX_BAR_LEVEL);
            assert!(
                bars.heights()
                    .iter()
                    .all(|&h| (FLOOR_LEVEL..=MAX_BAR_LEVEL).contains(&h))
            );
        }
    }

    #[test]
    fn growing_the_bar_count_keeps_existing_heights() {
        let mut bars = BarField::with_seed(9);
        for _ in 0..10 {
            bars.advance(4, MAX_BAR_LEVEL);
        }
        let before = bars.heights().to_vec();
        // silence makes the next update deterministic
        bars.advance(8, 0);
        assert_eq!(bars.heights().len(), 8);
        for i in 0..4 {
            assert_eq!(bars.heights()[i], (before[i] - 1).max(FLOOR_LEVEL));
        }
        for i in 4..8 {
            assert_eq!(bars.heights()[i], FLOOR_LEVEL);
        }
    }

    #[test]
    fn shrinking_the_bar_count_leaves_the_tail_untouched() {
        let mut bars = BarField::with_seed(3);
        for _ in 0..5 {
            bars.advance(10, MAX_BAR_LEVEL);
        }
        let tail = bars.heights()[6..].to_vec();
        bars.advance(6, 0);
        assert_eq!(bars.heights().len(), 10);
        assert_eq!(&bars.heights()[6..], &tail[..]);
    }

    #[test]
    fn same_seed_gives_the_same_sequence() {
        let mut a = BarField::with_seed(1234);
        let mut b = BarField::with_seed(1234);
        for _ in 0..20 {
            a.advance(16, 13);
            b.advance(16, 13);
        }
        assert_eq!(a.heights(), b.heights());
    }

    #[test]
    fn heights_never_reach_zero_under_mixed_input() {
        let mut bars = BarField::with_seed(99);
        let levels = [0, 1, MAX_BAR_LEVEL, 3];
        for cycle in 0..300 {
            bars.advance(32, levels[cycle % levels.len()]);
            assert!(bars.heights().iter().all(|&h| h >= FLOOR_LEVEL));
        }
    }

    #[test]
    fn out_of_range_levels_are_clamped() {
        let mut bars = BarField::with_seed(5);
        bars.advance(8, 10_000);
        assert!(bars.heights().iter().all(|&h| h <= MAX_BAR_LEVEL));
        bars.advance(8, -3);
        assert!(bars.heights().iter().all(|&h| h >= FLOOR_LEVEL));
    }
}
