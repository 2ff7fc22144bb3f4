use std::sync::atomic::{AtomicBool, Ordering};

use super::agc::AgcState;
use super::preprocess::LoudnessState;

/// Minimum spacing between two peak events.
pub const REFRACTORY_MS: u64 = 100;

/// Single-consumer event flag. Only its owner clears it with [`PeakFlag::take`].
#[derive(Debug, Default)]
pub struct PeakFlag(AtomicBool);

impl PeakFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume the event. Returns whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// One trigger, two independent consumers.
#[derive(Debug, Default)]
pub struct PeakFlags {
    pub renderer: PeakFlag,
    pub network: PeakFlag,
}

/// Beat detection: AGC loudness above its average plus a margin, debounced.
///
/// Each flag auto-clears after its own window: `hold_ms` for the renderer,
/// `network_hold_ms` for the network copy, which is only read once per
/// spectral cycle.
pub struct PeakDetector {
    margin: f32,
    hold_ms: u64,
    network_hold_ms: u64,
    last_peak_ms: Option<u64>,
}

impl PeakDetector {
    pub fn new(margin: u8, hold_ms: u64, network_hold_ms: u64) -> Self {
        Self {
            margin: f32::from(margin),
            hold_ms,
            network_hold_ms,
            last_peak_ms: None,
        }
    }

    /// Returns true when a new peak was signalled on this tick.
    pub fn evaluate(
        &mut self,
        loudness: &LoudnessState,
        agc: &AgcState,
        flags: &PeakFlags,
        now_ms: u64,
    ) -> bool {
        let since_last = self.last_peak_ms.map(|t| now_ms.saturating_sub(t));

        if since_last.map_or(false, |d| d > self.hold_ms) {
            flags.renderer.clear();
        }
        if since_last.map_or(false, |d| d > self.network_hold_ms) {
            flags.network.clear();
        }

        let loud_enough = agc.sample_agc as f32 > loudness.sample_average + self.margin;
        let rested = since_last.map_or(true, |d| d >= REFRACTORY_MS);

        if loud_enough && rested {
            flags.renderer.raise();
            flags.network.raise();
            self.last_peak_ms = Some(now_ms);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(sample_agc: i32, sample_average: f32) -> (LoudnessState, AgcState) {
        (
            LoudnessState {
                sample_average,
                ..Default::default()
            },
            AgcState {
                sample_agc,
                ..Default::default()
            },
        )
    }

    #[test]
    fn fires_above_margin_only() {
        let flags = PeakFlags::default();
        let mut det = PeakDetector::new(6, 15, 100);
        let (l, a) = inputs(16, 10.0);
        assert!(!det.evaluate(&l, &a, &flags, 0));
        let (l, a) = inputs(17, 10.0);
        assert!(det.evaluate(&l, &a, &flags, 1));
        assert!(flags.renderer.is_set());
        assert!(flags.network.is_set());
    }

    #[test]
    fn refractory_period_blocks_retrigger() {
        let flags = PeakFlags::default();
        let mut det = PeakDetector::new(6, 15, 100);
        let (l, a) = inputs(200, 0.0);
        let fired: Vec<u64> = (0..1_000u64)
            .step_by(10)
            .filter(|&t| det.evaluate(&l, &a, &flags, t))
            .collect();
        assert_eq!(fired, (0..1_000).step_by(100).collect::<Vec<u64>>());
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= REFRACTORY_MS);
        }
    }

    #[test]
    fn flags_auto_clear_after_their_own_hold() {
        let flags = PeakFlags::default();
        let mut det = PeakDetector::new(6, 15, 100);
        let (l, a) = inputs(200, 0.0);
        assert!(det.evaluate(&l, &a, &flags, 1_000));
        let (l, a) = inputs(0, 0.0);
        det.evaluate(&l, &a, &flags, 1_015);
        assert!(flags.renderer.is_set());
        det.evaluate(&l, &a, &flags, 1_016);
        assert!(!flags.renderer.is_set());
        // still pending for the next broadcast
        assert!(flags.network.is_set());
        det.evaluate(&l, &a, &flags, 1_100);
        assert!(flags.network.is_set());
        det.evaluate(&l, &a, &flags, 1_101);
        assert!(!flags.network.is_set());
    }

    #[test]
    fn consumers_clear_independently() {
        let flags = PeakFlags::default();
        let mut det = PeakDetector::new(6, 15, 100);
        let (l, a) = inputs(200, 0.0);
        det.evaluate(&l, &a, &flags, 0);
        assert!(flags.renderer.take());
        assert!(!flags.renderer.take());
        assert!(flags.network.is_set());
        assert!(flags.network.take());
    }
}
