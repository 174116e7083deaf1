//! LED output sinks for hosts without a physical matrix attached.

use std::io::Write;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use vubar_viz::color::scale_brightness;
use vubar_viz::LedSink;

/// Renders the matrix as truecolor blocks on the terminal, top row first.
pub struct ConsoleDisplay {
    rows: u16,
    cols: u16,
    buffer: String,
    first_frame: bool,
}

impl ConsoleDisplay {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            buffer: String::with_capacity(rows as usize * cols as usize * 24),
            first_frame: true,
        }
    }
}

impl LedSink for ConsoleDisplay {
    fn push(&mut self, frame: &[Rgb888], brightness: u8) {
        if frame.len() != self.rows as usize * self.cols as usize {
            return;
        }

        self.buffer.clear();
        if self.first_frame {
            self.buffer.push_str("\x1b[2J\x1b[?25l");
            self.first_frame = false;
        }
        self.buffer.push_str("\x1b[H");

        for row in (0..self.rows).rev() {
            for col in 0..self.cols {
                let color = scale_brightness(
                    frame[col as usize * self.rows as usize + row as usize],
                    brightness,
                );
                self.buffer.push_str(&format!(
                    "\x1b[38;2;{};{};{}m\u{2588}\u{2588}",
                    color.r(),
                    color.g(),
                    color.b()
                ));
            }
            self.buffer.push_str("\x1b[0m\n");
        }

        // Fire and forget: a broken terminal must not stall the pipeline.
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(self.buffer.as_bytes());
        let _ = stdout.flush();
    }
}

/// Swallows frames; used for headless runs and tests.
pub struct NullSink;

impl LedSink for NullSink {
    fn push(&mut self, _frame: &[Rgb888], _brightness: u8) {}
}
