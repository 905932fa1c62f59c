use log::{log_enabled, warn, Level};
use std::time::{Duration, Instant};

/// Scoped timer that emits start/end trace lines for a labelled section.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            let elapsed = self.start.elapsed();
            log::trace!("end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Warns when a rope step took longer than `budget_ms`; returns whether it did.
pub fn warn_if_step_budget_exceeded(duration: Duration, budget_ms: f64) -> bool {
    let elapsed_ms = duration.as_secs_f64() * 1000.0;
    if budget_ms > 0.0 && elapsed_ms > budget_ms {
        warn!("Rope step exceeded budget: {elapsed_ms:.3} ms > {budget_ms:.3} ms");
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_check_ignores_disabled_budget() {
        assert!(!warn_if_step_budget_exceeded(Duration::from_secs(1), 0.0));
        assert!(warn_if_step_budget_exceeded(Duration::from_millis(5), 1.0));
        assert!(!warn_if_step_budget_exceeded(Duration::from_millis(1), 5.0));
    }
}
