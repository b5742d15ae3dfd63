use serde::{Deserialize, Serialize};

/// Experience needed to go from level 1 to level 2; each level after that
/// costs this much more than the previous one.
const LEVEL_STEP: f64 = 50.0;

/// Level derived from a learner's experience total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Experience total the level was computed from.
    pub experience: u64,
    /// Current level, starting at 1.
    pub level: u64,
    /// Rounded percentage of the way to the next level.
    pub percent_to_next: u8,
}

/// Triangular level curve: reaching level `n` takes `LEVEL_STEP * n(n-1)/2`.
pub fn level_progress(experience: u64) -> LevelProgress {
    let raw = (1.0 + (1.0 + 8.0 * experience as f64 / LEVEL_STEP).sqrt()) / 2.0;
    let level = raw.floor();
    let percent = ((raw - level) * 100.0).round().clamp(0.0, 99.0);
    LevelProgress {
        experience,
        level: level as u64,
        percent_to_next: percent as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_boundaries() {
        assert_eq!(level_progress(0).level, 1);
        assert_eq!(level_progress(0).percent_to_next, 0);
        assert_eq!(level_progress(49).level, 1);
        assert_eq!(level_progress(50).level, 2);
        assert_eq!(level_progress(150).level, 3);
        assert_eq!(level_progress(300).level, 4);
    }

    #[test]
    fn percent_tracks_partial_progress() {
        // raw = (1 + sqrt(2.6)) / 2 ~= 1.306
        assert_eq!(level_progress(10).percent_to_next, 31);
    }
}
