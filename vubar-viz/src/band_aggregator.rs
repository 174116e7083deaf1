use alloc::{vec, vec::Vec};

#[allow(unused_imports)]
use micromath::F32Ext;

/// FFT bins below this index never take part in banding; bin 0 is DC and
/// bin 1 mostly carries power-supply hum and DC bias leakage.
pub const FIRST_USABLE_BIN: usize = 2;

/// Maps FFT magnitude bins onto a small set of frequency bands.
///
/// The band table is a list of ascending boundaries in Hz. Band `b`
/// covers the half-open range `(table[b-1], table[b]]`, with the first
/// band starting at 0 Hz. Bin-to-band assignment only depends on the
/// sample rate and the table, so it is resolved once at construction.
pub struct BandAggregator {
    assignments: Vec<Option<u16>>,
    num_bands: usize,
    noise_threshold: f32,
}

impl BandAggregator {
    /// Build the bin-to-band assignment for a fixed band table.
    ///
    /// Panics if the table is empty or its boundaries are not strictly
    /// ascending; the table is startup configuration, not runtime input.
    pub fn new(
        band_table: &[u32],
        sample_rate: u32,
        block_size: usize,
        spectrum_size: usize,
        noise_threshold: f32,
    ) -> Self {
        if band_table.is_empty() {
            panic!("Band table must contain at least one boundary");
        }
        for pair in band_table.windows(2) {
            if pair[1] <= pair[0] {
                panic!(
                    "Band table boundaries must be strictly ascending, got {} after {}",
                    pair[1], pair[0]
                );
            }
        }

        let mut assignments = vec![None; spectrum_size];
        for (i, slot) in assignments.iter_mut().enumerate().skip(FIRST_USABLE_BIN) {
            let freq = i as f32 * sample_rate as f32 / block_size as f32;
            *slot = Self::band_for(band_table, freq);
        }

        Self {
            assignments,
            num_bands: band_table.len(),
            noise_threshold,
        }
    }

    fn band_for(band_table: &[u32], freq: f32) -> Option<u16> {
        for (b, &bound) in band_table.iter().enumerate() {
            let start = if b == 0 { 0 } else { band_table[b - 1] };
            if freq > start as f32 && freq <= bound as f32 {
                return Some(b as u16);
            }
        }
        None // above the last boundary
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Sum qualifying bin magnitudes into per-band energies.
    ///
    /// A bin contributes to exactly one band, and only when its magnitude
    /// exceeds the noise threshold. Bands with no qualifying bins stay at
    /// zero, which is the normal outcome for silence.
    pub fn aggregate(&self, magnitudes: &[f32]) -> Vec<f32> {
        let mut energies = vec![0.0f32; self.num_bands];

        for (i, &magnitude) in magnitudes.iter().enumerate() {
            if magnitude <= self.noise_threshold {
                continue;
            }
            if let Some(Some(band)) = self.assignments.get(i) {
                // Index is clamped rather than trusted; a bad band index
                // must not take down a continuously-running display.
                if let Some(energy) = energies.get_mut(*band as usize) {
                    *energy += magnitude;
                }
            }
        }

        energies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sample_rate == block_size makes bin i sit at exactly i Hz.
    const RATE: u32 = 1024;
    const BLOCK: usize = 1024;
    const SPECTRUM: usize = BLOCK / 2 + 1;

    fn aggregator(table: &[u32], threshold: f32) -> BandAggregator {
        BandAggregator::new(table, RATE, BLOCK, SPECTRUM, threshold)
    }

    #[test]
    fn test_low_bins_never_contribute() {
        let agg = aggregator(&[100, 512], 0.0);
        let mut magnitudes = [0.0f32; SPECTRUM];
        magnitudes[0] = 1_000_000.0;
        magnitudes[1] = 1_000_000.0;

        let energies = agg.aggregate(&magnitudes);
        assert_eq!(energies, vec![0.0, 0.0]);
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let agg = aggregator(&[100, 200], 0.0);
        let mut magnitudes = [0.0f32; SPECTRUM];
        magnitudes[100] = 5.0; // exactly on the first boundary
        magnitudes[101] = 7.0; // first bin of the second band

        let energies = agg.aggregate(&magnitudes);
        assert_eq!(energies[0], 5.0);
        assert_eq!(energies[1], 7.0);
    }

    #[test]
    fn test_bins_above_last_boundary_are_dropped() {
        let agg = aggregator(&[100, 200], 0.0);
        let mut magnitudes = [0.0f32; SPECTRUM];
        magnitudes[300] = 9.0;

        let energies = agg.aggregate(&magnitudes);
        assert_eq!(energies, vec![0.0, 0.0]);
    }

    #[test]
    fn test_noise_threshold_gates_bins() {
        let agg = aggregator(&[512], 10.0);
        let mut magnitudes = [0.0f32; SPECTRUM];
        magnitudes[5] = 10.0; // not strictly above the threshold
        magnitudes[6] = 10.5;

        let energies = agg.aggregate(&magnitudes);
        assert_eq!(energies[0], 10.5);
    }

    #[test]
    fn test_every_qualifying_bin_lands_in_exactly_one_band() {
        // Table covers the whole usable spectrum.
        let agg = aggregator(&[50, 200, 512], 1.0);
        let mut magnitudes = [0.0f32; SPECTRUM];
        let mut expected_sum = 0.0f64;
        for i in 0..SPECTRUM {
            magnitudes[i] = (i % 7) as f32;
            if i >= FIRST_USABLE_BIN && magnitudes[i] > 1.0 {
                expected_sum += magnitudes[i] as f64;
            }
        }

        let energies = agg.aggregate(&magnitudes);
        let total: f64 = energies.iter().map(|&e| e as f64).sum();
        assert!(
            (total - expected_sum).abs() < 1e-3,
            "expected {}, got {}",
            expected_sum,
            total
        );
    }

    #[test]
    fn test_silence_yields_all_zero_bands() {
        let agg = aggregator(&[100, 250, 512], 1000.0);
        let magnitudes = [0.0f32; SPECTRUM];
        let energies = agg.aggregate(&magnitudes);
        assert!(energies.iter().all(|&e| e == 0.0));
    }

    #[test]
    #[should_panic]
    fn test_non_ascending_table_panics() {
        aggregator(&[100, 100], 0.0);
    }
}
