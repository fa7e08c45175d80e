use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for the producer loop.
///
/// The stream use case reports stage timings and per-frame metrics here
/// and never formats output itself.
pub trait PipelineLogger: Send {
    /// `total` is 0 when the source does not know its length.
    fn progress(&mut self, current: usize, total: usize);

    /// One frame's runtime for a named stage.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Called once after the last frame. Default: no-op.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Count, sum and extremes of a sample stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunningStats {
    pub count: usize,
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl RunningStats {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            total: value,
            min: value,
            max: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

fn record(map: &mut BTreeMap<String, RunningStats>, key: &str, value: f64) {
    match map.get_mut(key) {
        Some(stats) => stats.push(value),
        None => {
            map.insert(key.to_string(), RunningStats::first(value));
        }
    }
}

/// Logs throttled progress and, at the end of a run, the average runtime
/// of every stage plus the averaged metrics.
pub struct SummaryPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, RunningStats>,
    metrics: BTreeMap<String, RunningStats>,
    started: Instant,
    frames: usize,
}

impl SummaryPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames: 0,
        }
    }

    pub fn timings_for(&self, stage: &str) -> Option<RunningStats> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<RunningStats> {
        self.metrics.get(name).copied()
    }

    /// The end-of-run report, or `None` before anything was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let secs = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Producer summary ({} frames, {secs:.1}s):",
            self.frames
        )];

        for (stage, stats) in &self.timings {
            lines.push(format!(
                "  {stage:8} avg {:7.2}ms  min {:7.2}ms  max {:7.2}ms  ({} frames)",
                stats.mean(),
                stats.min,
                stats.max,
                stats.count
            ));
        }
        for (name, stats) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}, max {:.0}", stats.mean(), stats.max));
        }
        if self.frames > 0 && secs > 0.0 {
            lines.push(format!(
                "  throughput: {:.1} fps",
                self.frames as f64 / secs
            ));
        }

        Some(lines.join("\n"))
    }
}

impl Default for SummaryPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for SummaryPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = current;
        let due = current % self.throttle_frames == 0 || current == total;
        if !due {
            return;
        }
        match total {
            0 => log::info!("Streamed {current} frames"),
            _ => log::info!(
                "Streamed {current}/{total} frames ({:.1}%)",
                current as f64 / total as f64 * 100.0
            ),
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}
