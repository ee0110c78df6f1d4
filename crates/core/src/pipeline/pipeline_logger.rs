use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for the frame driver's progress, step timings and counters.
///
/// Keeps the driver free of any particular reporting mechanism.
pub trait PipelineLogger: Send {
    /// `total` is 0 when the source does not know its frame count.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long one named step took.
    fn timing(&mut self, step: &str, duration_ms: f64);

    /// Add `amount` to a named counter (faces found, crops saved, ...).
    fn count(&mut self, name: &str, amount: u64);

    fn info(&mut self, message: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _step: &str, _duration_ms: f64) {}
    fn count(&mut self, _name: &str, _amount: u64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStats {
    pub calls: usize,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StepStats {
    fn record(&mut self, ms: f64) {
        self.calls += 1;
        self.total_ms += ms;
        self.max_ms = self.max_ms.max(ms);
    }

    pub fn avg_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_ms / self.calls as f64
        }
    }
}

/// CLI logger: throttled progress lines through `log::info!` plus a summary
/// table at the end of the run.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    steps: BTreeMap<String, StepStats>,
    counters: BTreeMap<String, u64>,
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            steps: BTreeMap::new(),
            counters: BTreeMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepStats> {
        self.steps.get(name)
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Formatted summary, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.steps.is_empty() && self.counters.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Run summary ({} frames, {elapsed_s:.1}s):",
            self.frames_seen
        )];

        for (name, stats) in &self.steps {
            lines.push(format!(
                "  {name:12}: {:5} calls  avg {:7.1}ms  max {:7.1}ms  total {:8.0}ms",
                stats.calls,
                stats.avg_ms(),
                stats.max_ms,
                stats.total_ms
            ));
        }
        for (name, value) in &self.counters {
            lines.push(format!("  {name}: {value}"));
        }
        if self.frames_seen > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames_seen as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }

    fn should_report(&self, current: usize, total: usize) -> bool {
        current % self.throttle_frames == 0 || (total > 0 && current == total)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = self.frames_seen.max(current);
        if !self.should_report(current, total) {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processing: {current} frames");
        }
    }

    fn timing(&mut self, step: &str, duration_ms: f64) {
        self.steps.entry(step.to_string()).or_default().record(duration_ms);
    }

    fn count(&mut self, name: &str, amount: u64) {
        *self.counters.entry(name.to_string()).or_default() += amount;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
