use alloc::{vec, vec::Vec};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

#[cfg(feature = "logging")]
use defmt::info;
#[cfg(feature = "logging")]
use defmt_rtt as _;

use crate::color;

/// Receives a finished frame. Push is fire-and-forget; the pipeline never
/// waits on the sink.
pub trait LedSink {
    fn push(&mut self, frame: &[Rgb888], brightness: u8);
}

/// Fall-down state for one column's peak pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnPeak {
    pub row: u16,
    pub wait_ms: u32,
    pub last_update_ms: u64,
}

/// The LED matrix frame builder: a column fill layer from the palette plus
/// a decaying peak pixel per column.
///
/// The frame is column-major with row 0 at the bottom
/// (`index = col * rows + row`), matching bottom-to-top strip wiring.
pub struct LedMatrix {
    rows: u16,
    cols: u16,
    pixel_colors: Vec<Rgb888>,
    peak_color: Rgb888,
    max_peak_wait_ms: u32,
    fall_increment_ms: u32,
    peaks: Vec<ColumnPeak>,
    frame: Vec<Rgb888>,
}

impl LedMatrix {
    pub fn new(rows: u16, cols: u16) -> Self {
        if rows == 0 || cols == 0 {
            panic!("Matrix dimensions must be non-zero, got {}x{}", rows, cols);
        }
        #[cfg(feature = "logging")]
        info!("LedMatrix::new rows: {} cols: {}", rows, cols);

        let count = rows as usize * cols as usize;
        let max_peak_wait_ms = 1500;
        Self {
            rows,
            cols,
            pixel_colors: color::default_palette(rows, cols),
            peak_color: Rgb888::WHITE,
            max_peak_wait_ms,
            fall_increment_ms: 25,
            peaks: vec![
                ColumnPeak {
                    row: 0,
                    wait_ms: max_peak_wait_ms,
                    last_update_ms: 0,
                };
                cols as usize
            ],
            frame: vec![Rgb888::BLACK; count],
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn frame(&self) -> &[Rgb888] {
        &self.frame
    }

    pub fn peak(&self, col: u16) -> ColumnPeak {
        self.peaks[col as usize]
    }

    fn index(&self, col: u16, row: u16) -> usize {
        col as usize * self.rows as usize + row as usize
    }

    /// Take over the deployable display style for this cycle. The palette
    /// is replaced wholesale; a slice of the wrong size is ignored so a
    /// bad deploy can never tear the frame layout.
    pub fn set_style(
        &mut self,
        peak_color: Rgb888,
        max_peak_wait_ms: u32,
        fall_increment_ms: u32,
        palette: &[Rgb888],
    ) {
        self.peak_color = peak_color;
        self.max_peak_wait_ms = max_peak_wait_ms;
        self.fall_increment_ms = fall_increment_ms.max(1);
        if palette.len() == self.pixel_colors.len() {
            self.pixel_colors.copy_from_slice(palette);
        }
    }

    /// Fill one column up to `level` rows with its palette colors, the rest
    /// with black.
    pub fn set_column(&mut self, col: u16, level: u16) {
        if col >= self.cols {
            return;
        }
        for row in 0..self.rows {
            let idx = self.index(col, row);
            self.frame[idx] = if row < level {
                self.pixel_colors[idx]
            } else {
                Rgb888::BLACK
            };
        }
    }

    /// Advance the peak state machine for one column and overlay the peak
    /// pixel. Call after [`set_column`] so the overlay wins.
    ///
    /// `level` is the column's target row for this cycle; `now_ms` is a
    /// monotonic millisecond timestamp.
    pub fn advance_peak(&mut self, col: u16, level: u16, now_ms: u64) {
        if col >= self.cols {
            return;
        }
        let top_row = self.rows - 1;
        let peak = &mut self.peaks[col as usize];

        // A louder level takes the peak up immediately and re-arms the
        // fall timer at its slowest.
        if level > peak.row {
            peak.row = level.min(top_row);
            peak.last_update_ms = now_ms;
            peak.wait_ms = self.max_peak_wait_ms;
        }

        let idx = col as usize * self.rows as usize + peak.row as usize;
        self.frame[idx] = if peak.row > 0 {
            self.peak_color
        } else {
            Rgb888::BLACK
        };

        // Fall one row once the current wait has elapsed.
        if now_ms.saturating_sub(peak.last_update_ms) >= peak.wait_ms as u64 && peak.row > 0 {
            peak.row -= 1;
            peak.last_update_ms = now_ms;
        }

        // The wait shrinks every cycle whether or not a fall happened,
        // which makes the descent accelerate.
        peak.wait_ms = peak
            .wait_ms
            .saturating_sub(self.fall_increment_ms)
            .max(self.fall_increment_ms);
    }

    /// Black out the whole frame. Peak state is untouched.
    pub fn clear(&mut self) {
        self.frame.fill(Rgb888::BLACK);
    }

    /// Drop all transient peak state, as after a pause: without this a
    /// stale peak would teleport back onto the display on resume.
    pub fn reset_peaks(&mut self) {
        for peak in self.peaks.iter_mut() {
            peak.row = 0;
            peak.wait_ms = self.max_peak_wait_ms;
            peak.last_update_ms = 0;
        }
    }
}
