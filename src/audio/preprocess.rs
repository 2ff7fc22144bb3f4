use serde::Serialize;

/// Running loudness scalars, updated once per loudness tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LoudnessState {
    /// Slow DC-bias estimate (32-sample EMA of the raw input).
    pub mic_level: f32,
    /// Centered, rectified input of the last tick, before gating.
    pub mic_in: i32,
    /// Gated, smoothed and gain-adjusted loudness, 0..=255.
    pub sample: i32,
    /// 16-sample EMA of `sample`.
    pub sample_average: f32,
}

/// DC removal, squelch gate, smoothing and gain.
pub struct Preprocessor {
    squelch: i32,
    gain: i32,
    state: LoudnessState,
    seeded: bool,
}

impl Preprocessor {
    pub fn new(squelch: u8, gain: u8) -> Self {
        Self {
            squelch: i32::from(squelch),
            gain: i32::from(gain),
            state: LoudnessState::default(),
            seeded: false,
        }
    }

    pub fn process_tick(&mut self, raw: i32) -> &LoudnessState {
        let s = &mut self.state;

        if !self.seeded {
            s.mic_level = raw as f32;
            self.seeded = true;
        }
        s.mic_level = (s.mic_level * 31.0 + raw as f32) / 32.0;

        let centered = (raw as f32 - s.mic_level) as i32;
        s.mic_in = centered.abs();

        let smoothed = if s.mic_in <= self.squelch {
            0
        } else {
            (s.sample * 3 + s.mic_in) / 4
        };

        let adjusted = smoothed * self.gain / 40 + smoothed / 16;
        s.sample = adjusted.min(255);
        s.sample_average = (s.sample_average * 15.0 + s.sample as f32) / 16.0;

        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_input_at_dc_stays_silent() {
        let mut pre = Preprocessor::new(10, 40);
        let mut last = LoudnessState::default();
        for _ in 0..2_000 {
            last = *pre.process_tick(512);
            assert_eq!(last.sample, 0);
        }
        assert!((last.mic_level - 512.0).abs() < 1e-3);
        assert_eq!(last.sample_average, 0.0);
    }

    #[test]
    fn squelch_gates_small_deviations() {
        let mut pre = Preprocessor::new(10, 40);
        pre.process_tick(100);
        let st = pre.process_tick(108);
        assert_eq!(st.sample, 0);
    }

    #[test]
    fn loudness_stays_bounded_for_wild_input() {
        let mut pre = Preprocessor::new(0, 255);
        let mut x: u32 = 12345;
        for _ in 0..20_000 {
            // xorshift noise spanning the digital range
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            let raw = (x % 65_536) as i32 - 32_768;
            let st = pre.process_tick(raw);
            assert!((0..=255).contains(&st.sample), "sample {}", st.sample);
            assert!(
                (0.0..=255.0).contains(&st.sample_average),
                "average {}",
                st.sample_average
            );
        }
    }

    #[test]
    fn unity_gain_adds_a_sixteenth() {
        let mut pre = Preprocessor::new(10, 40);
        pre.process_tick(0);
        // mic_level becomes 100/32 = 3.125, centered = 96
        let st = pre.process_tick(100);
        assert_eq!(st.mic_in, 96);
        // smoothed = 96 / 4 = 24, adjusted = 24 + 1
        assert_eq!(st.sample, 25);
    }
}
