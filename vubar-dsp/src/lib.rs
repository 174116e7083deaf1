#![no_std]

use microfft::real::rfft_1024;
use microfft::Complex32;
#[allow(unused_imports)]
use micromath::F32Ext;

/// Number of samples in one capture block. Must match the FFT size.
pub const BLOCK_SIZE: usize = 1024;

/// Number of usable magnitude values per block (N/2 + 1, Nyquist included).
pub const SPECTRUM_SIZE: usize = BLOCK_SIZE / 2 + 1;

/// Subtract the block mean so a DC offset does not leak into bin 0
/// and its neighbours.
pub fn remove_dc(samples: &mut [f32; BLOCK_SIZE]) {
    let mut sum = 0.0f32;
    for &s in samples.iter() {
        sum += s;
    }
    let mean = sum / BLOCK_SIZE as f32;
    for s in samples.iter_mut() {
        *s -= mean;
    }
}

/// Apply a Hamming window in place.
pub fn apply_hamming_window(samples: &mut [f32; BLOCK_SIZE]) {
    let scale = 2.0 * core::f32::consts::PI / (BLOCK_SIZE - 1) as f32;
    for (i, s) in samples.iter_mut().enumerate() {
        *s *= 0.54 - 0.46 * (scale * i as f32).cos();
    }
}

/// Compute the forward FFT of a block in place.
pub fn compute_fft(samples: &mut [f32; BLOCK_SIZE]) -> &mut [Complex32; BLOCK_SIZE / 2] {
    rfft_1024(samples)
}

/// Convert the packed FFT output to a magnitude spectrum.
///
/// `rfft_1024` returns N/2 complex values with the real-valued Nyquist
/// term packed into `bins[0].im`; it is unpacked here into the last
/// magnitude slot so callers see all N/2 + 1 usable bins.
pub fn compute_magnitudes(spectrum: &[Complex32; BLOCK_SIZE / 2]) -> [f32; SPECTRUM_SIZE] {
    let mut magnitudes = [0.0f32; SPECTRUM_SIZE];
    magnitudes[0] = spectrum[0].re.abs();
    magnitudes[BLOCK_SIZE / 2] = spectrum[0].im.abs();
    for i in 1..BLOCK_SIZE / 2 {
        let c = spectrum[i];
        magnitudes[i] = (c.re * c.re + c.im * c.im).sqrt();
    }
    magnitudes
}

/// Process one block of i16 samples and return the magnitude spectrum.
///
/// Samples are kept on the raw i16 scale (no ±1.0 normalization) so the
/// magnitudes remain comparable against integer noise thresholds.
pub fn process_block(samples: &[i16; BLOCK_SIZE]) -> [f32; SPECTRUM_SIZE] {
    let mut block = [0.0f32; BLOCK_SIZE];
    for (i, &sample) in samples.iter().enumerate() {
        block[i] = sample as f32;
    }

    remove_dc(&mut block);
    apply_hamming_window(&mut block);
    let spectrum = compute_fft(&mut block);
    compute_magnitudes(spectrum)
}

/// Center frequency of a bin in Hz: `i * sample_rate / N`.
pub fn bin_frequency(bin: usize, sample_rate: u32) -> f32 {
    bin as f32 * sample_rate as f32 / BLOCK_SIZE as f32
}
