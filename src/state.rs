// state.rs: State data structures for the polling loop and display

use crate::client::ProgressReading;
use tokio::sync::mpsc;

/// The two states of the loop: polling repeats with a delay, done is
/// terminal and reached only when the reported value hits 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollPhase {
    #[default]
    Polling,
    Done,
}

/// A snapshot sent to the display frontend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Raw percent as reported by the server (may exceed 100).
    pub percent: f64,
    /// Display label, e.g. "57%".
    pub label: String,
    pub phase: PollPhase,
    pub err: Option<String>,
    /// Body of the results document, present only on the terminal update.
    pub results: Option<String>,
    pub version: u64, // Incremented on any state change
}

impl Update {
    /// Fill ratio for gauge rendering, clamped into [0, 1].
    pub fn ratio(&self) -> f64 {
        (sanitize_percent(self.percent) / 100.0).min(1.0)
    }
}

/// Bundles the latest reading, phase and versioning for the poller.
#[derive(Debug, Default)]
pub struct StateBundle {
    pub percent: f64,
    pub phase: PollPhase,
    pub err: Option<String>,
    pub results: Option<String>,
    pub version: u64,
}

impl StateBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fresh reading. Clears any prior error and moves to the
    /// terminal phase at >= 100. Returns whether the state changed.
    pub fn record_reading(&mut self, reading: &ProgressReading) -> bool {
        let percent = sanitize_percent(reading.progress);
        let phase = if percent >= 100.0 {
            PollPhase::Done
        } else {
            PollPhase::Polling
        };
        let changed = (self.percent - percent).abs() > f64::EPSILON
            || self.phase != phase
            || self.err.is_some();
        self.percent = percent;
        self.phase = phase;
        self.err = None;
        if changed {
            self.version += 1;
        }
        changed
    }

    pub fn record_error(&mut self, err: String) {
        if self.err.as_deref() != Some(err.as_str()) {
            self.version += 1;
        }
        self.err = Some(err);
    }

    pub fn record_results(&mut self, body: Option<String>) {
        self.results = body;
        self.version += 1;
    }

    pub fn is_done(&self) -> bool {
        self.phase == PollPhase::Done
    }

    pub fn snapshot(&self) -> Update {
        Update {
            percent: self.percent,
            label: format_percent(self.percent),
            phase: self.phase,
            err: self.err.clone(),
            results: self.results.clone(),
            version: self.version,
        }
    }

    pub async fn send_update(&self, update_tx: &mpsc::Sender<Update>) {
        let _ = update_tx.send(self.snapshot()).await;
    }
}

/// Clamp non-finite and negative percents to zero. Values above 100 are
/// kept as-is; the display shows what the server said.
pub fn sanitize_percent(p: f64) -> f64 {
    if p.is_nan() || !p.is_finite() {
        0.0
    } else if p < 0.0 {
        0.0
    } else {
        p
    }
}

/// Format a percent the way the status page shows it: integer-valued
/// readings drop the fraction ("57%"), anything else keeps it ("57.5%").
pub fn format_percent(p: f64) -> String {
    if p.fract() == 0.0 && p.abs() < 1e15 {
        format!("{}%", p as i64)
    } else {
        format!("{}%", p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(progress: f64) -> ProgressReading {
        ProgressReading { progress }
    }

    #[test]
    fn starts_polling_at_zero() {
        let bundle = StateBundle::new();
        assert_eq!(bundle.phase, PollPhase::Polling);
        assert!(!bundle.is_done());
        assert_eq!(bundle.snapshot().label, "0%");
    }

    #[test]
    fn mid_reading_stays_polling() {
        let mut bundle = StateBundle::new();
        assert!(bundle.record_reading(&reading(57.0)));
        assert_eq!(bundle.phase, PollPhase::Polling);
        assert_eq!(bundle.snapshot().label, "57%");
    }

    #[test]
    fn hundred_is_terminal() {
        let mut bundle = StateBundle::new();
        bundle.record_reading(&reading(100.0));
        assert!(bundle.is_done());
        assert_eq!(bundle.snapshot().label, "100%");
    }

    #[test]
    fn out_of_range_reading_is_terminal() {
        // Server may overshoot; anything >= 100 ends the loop.
        let mut bundle = StateBundle::new();
        bundle.record_reading(&reading(143.0));
        assert!(bundle.is_done());
        assert_eq!(bundle.snapshot().label, "143%");
    }

    #[test]
    fn identical_readings_do_not_bump_version() {
        let mut bundle = StateBundle::new();
        bundle.record_reading(&reading(40.0));
        let v = bundle.version;
        assert!(!bundle.record_reading(&reading(40.0)));
        assert_eq!(bundle.version, v);
    }

    #[test]
    fn reading_clears_previous_error() {
        let mut bundle = StateBundle::new();
        bundle.record_error("Network error: timeout".into());
        assert!(bundle.snapshot().err.is_some());
        bundle.record_reading(&reading(10.0));
        assert!(bundle.snapshot().err.is_none());
    }

    #[test]
    fn sanitize_clamps_garbage() {
        assert_eq!(sanitize_percent(f64::NAN), 0.0);
        assert_eq!(sanitize_percent(f64::INFINITY), 0.0);
        assert_eq!(sanitize_percent(-5.0), 0.0);
        assert_eq!(sanitize_percent(143.0), 143.0);
    }

    #[test]
    fn fractional_percent_keeps_fraction() {
        assert_eq!(format_percent(57.5), "57.5%");
        assert_eq!(format_percent(57.0), "57%");
        assert_eq!(format_percent(0.0), "0%");
    }

    #[test]
    fn ratio_is_clamped_for_rendering() {
        let mut bundle = StateBundle::new();
        bundle.record_reading(&reading(143.0));
        assert_eq!(bundle.snapshot().ratio(), 1.0);
        bundle.record_reading(&reading(50.0));
        assert_eq!(bundle.snapshot().ratio(), 0.5);
    }
}
