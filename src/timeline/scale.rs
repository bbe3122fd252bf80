//! Linear mapping between epoch seconds and horizontal pixels.

use chrono::TimeZone;

use super::ticks;

const MIN_SPAN: f64 = 1e-9;

/// Maps the time domain `[start, stop]` onto the pixel range `[0, width]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    start: f64,
    stop: f64,
    width: f64,
}

impl TimeScale {
    pub fn new(start: f64, stop: f64, width: f64) -> Self {
        Self {
            start,
            stop,
            width: width.max(0.0),
        }
    }

    fn is_degenerate(&self) -> bool {
        !((self.stop - self.start).abs() > MIN_SPAN) || !self.start.is_finite()
    }

    /// Pixel position of time `t`. A degenerate domain maps to the middle of
    /// the range.
    pub fn map(&self, t: f64) -> f64 {
        if self.is_degenerate() {
            return self.width / 2.0;
        }
        (t - self.start) / (self.stop - self.start) * self.width
    }

    /// Time under pixel `x`.
    pub fn invert(&self, x: f64) -> f64 {
        if self.is_degenerate() {
            return (self.start + self.stop) / 2.0;
        }
        if self.width <= 0.0 {
            return self.start;
        }
        self.start + x / self.width * (self.stop - self.start)
    }

    /// Round tick timestamps for the domain together with their pixel positions.
    pub fn ticks<Tz: TimeZone>(&self, count: usize, tz: &Tz) -> Vec<(f64, f64)> {
        if self.is_degenerate() {
            return Vec::new();
        }
        ticks::time_ticks(self.start, self.stop, count, tz)
            .into_iter()
            .map(|t| (self.map(t), t))
            .collect()
    }
}
