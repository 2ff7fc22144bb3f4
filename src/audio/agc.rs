use serde::Serialize;

use super::preprocess::LoudnessState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AgcState {
    /// `target / sample_average`, or `target` near silence.
    pub multiplier: f32,
    /// Normalised loudness, 0..=255. Overflow is discarded to 0.
    pub sample_agc: i32,
    /// Volume published for unrelated consumers: `sample_average * 4`, clamped.
    pub volume: u8,
}

/// Simple averaging gain control toward a fixed setpoint.
pub struct AutomaticGainControl {
    target_level: f32,
    state: AgcState,
}

impl AutomaticGainControl {
    pub fn new(target_level: u8) -> Self {
        Self {
            target_level: f32::from(target_level),
            state: AgcState::default(),
        }
    }

    pub fn target_level(&self) -> f32 {
        self.target_level
    }

    pub fn recompute(&mut self, loudness: &LoudnessState) -> &AgcState {
        let avg = loudness.sample_average;
        let multiplier = if avg < 1.0 {
            self.target_level
        } else {
            self.target_level / avg
        };

        let scaled = (loudness.sample as f32 * multiplier) as i32;
        // An outlier is rejected outright instead of saturating
        let sample_agc = if scaled > 255 { 0 } else { scaled };

        self.state = AgcState {
            multiplier,
            sample_agc,
            volume: (avg * 4.0).clamp(0.0, 255.0) as u8,
        };
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loudness(sample: i32, sample_average: f32) -> LoudnessState {
        LoudnessState {
            sample,
            sample_average,
            ..Default::default()
        }
    }

    #[test]
    fn silence_uses_target_as_multiplier() {
        let mut agc = AutomaticGainControl::new(60);
        let st = agc.recompute(&loudness(2, 0.5));
        assert_eq!(st.multiplier, 60.0);
        assert_eq!(st.sample_agc, 120);
    }

    #[test]
    fn steady_signal_lands_on_target() {
        let mut agc = AutomaticGainControl::new(60);
        let st = agc.recompute(&loudness(30, 30.0));
        assert!((st.multiplier - 2.0).abs() < 1e-6);
        assert_eq!(st.sample_agc, 60);
        assert_eq!(st.volume, 120);
    }

    #[test]
    fn overflow_resets_to_zero() {
        let mut agc = AutomaticGainControl::new(60);
        let st = agc.recompute(&loudness(255, 10.0));
        assert_eq!(st.sample_agc, 0);
    }

    #[test]
    fn output_never_leaves_byte_range() {
        let mut agc = AutomaticGainControl::new(255);
        for sample in 0..=255 {
            for avg in [0.0f32, 0.9, 1.0, 3.5, 60.0, 200.0, 255.0] {
                let st = agc.recompute(&loudness(sample, avg));
                assert!((0..=255).contains(&st.sample_agc));
            }
        }
    }

    #[test]
    fn published_volume_is_clamped() {
        let mut agc = AutomaticGainControl::new(60);
        assert_eq!(agc.recompute(&loudness(0, 100.0)).volume, 255);
    }
}
