//! Monotonic latency measurement.

use std::future::Future;
use std::time::{Duration, Instant};

/// Stopwatch over [`Instant`], unaffected by wall-clock adjustments.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
    elapsed: Option<Duration>,
}

impl Timer {
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            elapsed: None,
        }
    }

    /// Freeze the elapsed time. Later calls keep the first reading.
    pub fn stop(&mut self) -> f64 {
        let elapsed = *self.elapsed.get_or_insert_with(|| self.start.elapsed());
        duration_ms(elapsed)
    }

    /// Elapsed milliseconds: the frozen value once stopped, live otherwise.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.elapsed.unwrap_or_else(|| self.start.elapsed()))
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.elapsed.is_some()
    }
}

/// Result of a timed block together with its duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed_ms: f64,
}

impl<T> Timed<T> {
    pub fn into_parts(self) -> (T, f64) {
        (self.value, self.elapsed_ms)
    }
}

/// Run `f` and measure how long it took.
pub fn timed<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let mut timer = Timer::start();
    let value = f();
    let elapsed_ms = timer.stop();
    Timed { value, elapsed_ms }
}

/// Await `fut` and measure how long it took.
pub async fn timed_async<F: Future>(fut: F) -> Timed<F::Output> {
    let mut timer = Timer::start();
    let value = fut.await;
    let elapsed_ms = timer.stop();
    Timed { value, elapsed_ms }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
