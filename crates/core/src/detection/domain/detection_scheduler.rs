/// Decides per frame whether the expensive detector runs.
///
/// Detection runs on every `interval`-th frame and on any frame where no
/// face box is currently tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectionScheduler {
    interval: usize,
}

impl DetectionScheduler {
    pub fn new(interval: usize) -> Result<Self, &'static str> {
        if interval < 1 {
            return Err("detect_interval must be >= 1");
        }
        Ok(Self { interval })
    }

    pub fn should_detect(&self, frame_index: usize, has_tracked: bool) -> bool {
        frame_index % self.interval == 0 || !has_tracked
    }
}
