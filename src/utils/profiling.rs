use std::time::{Duration, Instant};

/// Per-phase timings of the most recent rope step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfiler {
    pub predict_time: Duration,
    pub gather_time: Duration,
    pub solve_time: Duration,
    pub sync_time: Duration,
    pub metrics_time: Duration,
    pub total_step_time: Duration,

    pub node_count: usize,
    pub candidate_count: usize,
    pub manifold_count: usize,
}

impl StepProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        let total_us = self.total_step_time.as_micros() as f64;
        if total_us < 1.0 {
            return;
        }

        let share = |d: Duration| (d.as_micros() as f64 / total_us) * 100.0;
        log::debug!(
            "rope step: {} nodes, {} candidates, {} manifolds, {:.3} ms total",
            self.node_count,
            self.candidate_count,
            self.manifold_count,
            self.total_step_time.as_secs_f64() * 1000.0
        );
        log::debug!(
            "  predict {:.1}% | gather {:.1}% | solve {:.1}% | sync {:.1}% | metrics {:.1}%",
            share(self.predict_time),
            share(self.gather_time),
            share(self.solve_time),
            share(self.sync_time),
            share(self.metrics_time)
        );
    }
}

/// Adds the lifetime of the guard to `output` when dropped.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_timer_accumulates_into_target() {
        let mut total = Duration::ZERO;
        {
            let _timer = ScopedTimer::new(&mut total);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(total >= Duration::from_millis(1));

        let mut profiler = StepProfiler {
            solve_time: total,
            ..StepProfiler::default()
        };
        profiler.reset();
        assert_eq!(profiler.solve_time, Duration::ZERO);
    }
}
