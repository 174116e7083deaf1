#[allow(unused_imports)]
use micromath::F32Ext;

/// Damping constant for the adaptive gain: the divisor on the way down is
/// blended as `(previous * (DAMPEN - 1) + observed) / DAMPEN`.
pub const GAIN_DAMPEN: f32 = 2.0;

/// How raw band energies are compressed into the displayable [0, 1] range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GainMode {
    /// Divide every band by `max(attenuation, cycle peak)`.
    Fixed { attenuation: f32 },
    /// Divide by the damped rolling peak, never letting the divisor fall
    /// below `floor` so quiet passages do not saturate the display.
    Adaptive { floor: f32 },
}

/// Rescales raw band energies (often in the 100k range) into [0, 1].
pub struct Normalizer {
    last_peak: f32,
}

impl Normalizer {
    pub const fn new() -> Self {
        Self { last_peak: 0.0 }
    }

    /// Normalize the energies in place for one cycle.
    pub fn normalize(&mut self, energies: &mut [f32], mode: GainMode) {
        let mut peak = 0.0f32;
        for &e in energies.iter() {
            if e > peak {
                peak = e;
            }
        }
        if peak < 1.0 {
            peak = 1.0;
        }

        let divisor = match mode {
            GainMode::Fixed { attenuation } => attenuation.max(peak),
            GainMode::Adaptive { floor } => {
                // Rate of change is dampened on the way down only; a louder
                // peak always takes over immediately.
                let damped = peak.max((self.last_peak * (GAIN_DAMPEN - 1.0) + peak) / GAIN_DAMPEN);
                self.last_peak = damped;
                damped.max(floor)
            }
        };

        for e in energies.iter_mut() {
            *e /= divisor;
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}
