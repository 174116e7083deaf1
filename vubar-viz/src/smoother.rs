use alloc::{vec, vec::Vec};

/// Low-pass filters frame-to-frame level changes per band.
///
/// Rises are passed through instantly so attacks stay visually sharp;
/// falls are limited to `speed_filter` per cycle so releases fade instead
/// of flickering. The decrement is per cycle, not per elapsed time, which
/// matches a pipeline paced by the fixed-size capture block.
pub struct SpeedSmoother {
    previous: Vec<f32>,
}

impl SpeedSmoother {
    pub fn new(num_bands: usize) -> Self {
        Self {
            previous: vec![0.0; num_bands],
        }
    }

    /// Smooth the levels in place, carrying the result into the next cycle.
    pub fn smooth(&mut self, levels: &mut [f32], speed_filter: f32) {
        if levels.len() != self.previous.len() {
            // Band count is fixed at startup; a mismatched slice is a
            // caller bug and gets ignored rather than misindexed.
            return;
        }

        for (level, previous) in levels.iter_mut().zip(self.previous.iter_mut()) {
            let new = *level;
            if new < *previous {
                *level = (*previous - speed_filter).max(new);
            }
            *previous = *level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fall_is_rate_limited() {
        let mut smoother = SpeedSmoother::new(1);
        let mut levels = [0.8f32];
        smoother.smooth(&mut levels, 0.1);
        assert_abs_diff_eq!(levels[0], 0.8);

        let mut levels = [0.3f32];
        smoother.smooth(&mut levels, 0.1);
        assert_abs_diff_eq!(levels[0], 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_rise_is_instant() {
        let mut smoother = SpeedSmoother::new(1);
        let mut levels = [0.3f32];
        smoother.smooth(&mut levels, 0.1);

        let mut levels = [0.8f32];
        smoother.smooth(&mut levels, 0.1);
        assert_abs_diff_eq!(levels[0], 0.8);
    }

    #[test]
    fn test_fall_converges_to_target() {
        let mut smoother = SpeedSmoother::new(1);
        let mut levels = [1.0f32];
        smoother.smooth(&mut levels, 0.25);

        let mut cycles = 0;
        loop {
            let mut step = [0.0f32];
            smoother.smooth(&mut step, 0.25);
            cycles += 1;
            if step[0] == 0.0 {
                break;
            }
            assert!(cycles < 10, "decay never reached the target");
        }
        assert_eq!(cycles, 4);
    }

    #[test]
    fn test_bands_are_independent() {
        let mut smoother = SpeedSmoother::new(3);
        let mut levels = [0.9f32, 0.1, 0.5];
        smoother.smooth(&mut levels, 0.2);

        let mut levels = [0.1f32, 0.6, 0.5];
        smoother.smooth(&mut levels, 0.2);
        assert_abs_diff_eq!(levels[0], 0.7, epsilon = 1e-6);
        assert_abs_diff_eq!(levels[1], 0.6);
        assert_abs_diff_eq!(levels[2], 0.5);
    }

    #[test]
    fn test_mismatched_slice_is_ignored() {
        let mut smoother = SpeedSmoother::new(2);
        let mut levels = [0.5f32; 4];
        smoother.smooth(&mut levels, 0.1);
        assert!(levels.iter().all(|&l| l == 0.5));
    }
}
