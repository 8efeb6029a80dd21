use serde::Serialize;
use std::{future::Future, time::Duration, time::Instant};

/// A value together with the wall-clock time it took to produce.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

pub fn timed<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    Timed {
        value,
        elapsed: start.elapsed(),
    }
}

pub async fn timed_async<T>(fut: impl Future<Output = T>) -> Timed<T> {
    let start = Instant::now();
    let value = fut.await;
    Timed {
        value,
        elapsed: start.elapsed(),
    }
}

/// Wall-clock comparison of the two rolling execution modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceComparison {
    pub sequential_secs: f64,
    pub parallel_secs: f64,
    pub workers: usize,
}

impl PerformanceComparison {
    /// Sequential time over parallel time; `None` if the parallel run took no measurable time.
    pub fn speedup(&self) -> Option<f64> {
        (self.parallel_secs > 0.0).then(|| self.sequential_secs / self.parallel_secs)
    }

    /// Speedup per CPU, in percent.
    pub fn efficiency_pct(&self, cpus: usize) -> Option<f64> {
        if cpus == 0 {
            return None;
        }
        self.speedup().map(|speedup| speedup / cpus as f64 * 100.0)
    }
}
