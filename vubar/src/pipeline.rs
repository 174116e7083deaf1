//! The real-time audio-to-display loop.
//!
//! One cycle: capture → FFT magnitudes → band energies → normalize →
//! smooth → column fill + peak overlay → sink. Pacing comes from the
//! blocking block read; there is no other intentional suspension.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use vubar_viz::{BandAggregator, LedMatrix, LedSink, Normalizer, SpeedSmoother};

use crate::capture::BlockReader;
use crate::config::SharedConfig;

/// Upper bound on one block wait; at 44.1 kHz a block arrives every ~23 ms,
/// so hitting this means the capture side is stalled.
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(250);

pub struct Pipeline {
    reader: BlockReader,
    aggregator: BandAggregator,
    normalizer: Normalizer,
    smoother: SpeedSmoother,
    matrix: LedMatrix,
    sink: Box<dyn LedSink>,
    config: SharedConfig,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    epoch: Instant,
    was_paused: bool,
}

impl Pipeline {
    pub fn new(
        reader: BlockReader,
        aggregator: BandAggregator,
        matrix: LedMatrix,
        sink: Box<dyn LedSink>,
        config: SharedConfig,
        paused: Arc<AtomicBool>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let bands = aggregator.num_bands();
        Self {
            reader,
            aggregator,
            normalizer: Normalizer::new(),
            smoother: SpeedSmoother::new(bands),
            matrix,
            sink,
            config,
            paused,
            shutdown,
            epoch: Instant::now(),
            was_paused: false,
        }
    }

    /// Run until shutdown is requested, then leave a cleared display.
    pub fn run(mut self) {
        info!("pipeline running");
        while !self.shutdown.load(Ordering::Relaxed) {
            self.cycle();
        }
        let brightness = {
            let guard = self.config.read().unwrap_or_else(|e| e.into_inner());
            guard.brightness
        };
        self.matrix.clear();
        self.sink.push(self.matrix.frame(), brightness);
        info!("pipeline stopped");
    }

    fn cycle(&mut self) {
        let fresh = self.reader.capture_block(CAPTURE_TIMEOUT);
        if !fresh {
            debug!("processing stale capture block");
        }

        let magnitudes = vubar_dsp::process_block(self.reader.block());
        let mut levels = self.aggregator.aggregate(&magnitudes);

        // Configuration snapshot for this cycle; a stale-by-one-cycle read
        // is fine, a torn one is not.
        let cfg = self
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        if self.paused.load(Ordering::Relaxed) {
            if !self.was_paused {
                self.matrix.clear();
                self.sink.push(self.matrix.frame(), cfg.brightness);
                self.was_paused = true;
                info!("display paused");
            }
            return;
        }
        if self.was_paused {
            self.matrix.reset_peaks();
            self.was_paused = false;
            info!("display resumed");
        }

        self.normalizer.normalize(&mut levels, cfg.gain_mode());
        self.smoother.smooth(&mut levels, cfg.speed_filter);

        self.matrix.set_style(
            cfg.peak_color,
            cfg.max_peak_wait_ms,
            cfg.fall_increment_ms,
            &cfg.pixel_colors,
        );

        let rows = self.matrix.rows();
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        for (col, &level) in levels.iter().enumerate() {
            let value = (level.clamp(0.0, 1.0) * rows as f32) as u16;
            self.matrix.set_column(col as u16, value);
            self.matrix.advance_peak(col as u16, value, now_ms);
        }

        self.sink.push(self.matrix.frame(), cfg.brightness);
    }
}
