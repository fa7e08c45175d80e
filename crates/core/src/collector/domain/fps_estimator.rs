use std::time::Instant;

/// Exponentially smoothed arrival rate.
///
/// Each tick blends the instantaneous rate `1 / dt` into the running value:
/// `fps = smoothing * fps + (1 - smoothing) / dt`. The estimate starts at
/// zero and ticks with a zero interval are ignored.
#[derive(Clone, Debug)]
pub struct FpsEstimator {
    smoothing: f64,
    fps: f64,
    last: Instant,
}

impl FpsEstimator {
    pub fn new(smoothing: f64, start: Instant) -> Result<Self, &'static str> {
        if smoothing.is_nan() || smoothing <= 0.0 || smoothing >= 1.0 {
            return Err("smoothing must be in (0.0, 1.0)");
        }
        Ok(Self {
            smoothing,
            fps: 0.0,
            last: start,
        })
    }

    pub fn tick(&mut self, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        if dt > 0.0 {
            self.fps = self.smoothing * self.fps + (1.0 - self.smoothing) / dt;
        }
        self.last = now;
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}
