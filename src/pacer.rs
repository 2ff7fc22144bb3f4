use std::thread;
use std::time::{Duration, Instant};

/// Holds a fixed interval between consecutive samples.
pub trait Pacer {
    fn wait(&mut self);
}

/// Sleeps until the next deadline. Deadlines advance by a fixed step, so
/// jitter in one tick is absorbed by the next and a block always spans
/// `N * interval`.
pub struct DeadlinePacer {
    interval: Duration,
    next: Instant,
    max_lag: Duration,
}

impl DeadlinePacer {
    /// `max_lag` is how far behind the schedule may fall before it is reset.
    pub fn new(sample_rate: u32, max_lag: Duration) -> Self {
        let interval = Duration::from_nanos(1_000_000_000 / u64::from(sample_rate.max(1)));
        Self {
            interval,
            next: Instant::now() + interval,
            max_lag,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Pacer for DeadlinePacer {
    fn wait(&mut self) {
        let now = Instant::now();
        if now > self.next + self.max_lag {
            log::warn!(
                "Sampling fell {:.1}ms behind schedule, resynchronising",
                (now - self.next).as_secs_f64() * 1000.0
            );
            self.next = now + self.interval;
            return;
        }

        loop {
            let now = Instant::now();
            if now >= self.next {
                break;
            }
            let remaining = self.next - now;
            if remaining > Duration::from_millis(1) {
                thread::sleep(remaining - Duration::from_millis(1));
            } else {
                thread::yield_now();
            }
        }
        self.next += self.interval;
    }
}

/// No pacing: samples are consumed as fast as the source yields them.
pub struct Unpaced;

impl Pacer for Unpaced {
    fn wait(&mut self) {}
}
