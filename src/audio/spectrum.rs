use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::calibration::{FFT_BIN_MULT, FFT_SIZE, FIRST_USABLE_BIN, MAGNITUDE_DIVISOR};
use super::source::SampleSource;
use crate::pacer::Pacer;

/// Calibrated magnitudes plus the dominant tone of one transform block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectralResult {
    pub magnitude_per_bin: Vec<f64>,
    pub dominant_frequency: f64,
    pub dominant_magnitude: f64,
}

/// Block-based spectral analysis over `FFT_SIZE` samples, the size the
/// calibration tables were tuned for. Buffers are allocated once and reused.
pub struct SpectralAnalyzer {
    size: usize,
    sample_rate: u32,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    result: SpectralResult,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        let size = FFT_SIZE;
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            size,
            sample_rate,
            fft,
            window: hamming_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            result: SpectralResult {
                magnitude_per_bin: vec![0.0; size],
                ..Default::default()
            },
        }
    }

    /// Hz covered by one bin.
    pub fn bin_width(&self) -> f64 {
        self.sample_rate as f64 / self.size as f64
    }

    /// Acquire one block, paced at the sample rate, then analyze it.
    /// `on_sample` sees every raw sample as it arrives.
    pub fn run_cycle<S, P, F>(&mut self, source: &mut S, pacer: &mut P, mut on_sample: F) -> &SpectralResult
    where
        S: SampleSource + ?Sized,
        P: Pacer + ?Sized,
        F: FnMut(usize, i32),
    {
        for i in 0..self.size {
            let raw = source.next_sample();
            self.buffer[i] = Complex::new(raw as f64, 0.0);
            on_sample(i, raw);
            pacer.wait();
        }
        self.analyze()
    }

    /// Window, transform and calibrate whatever is in the buffer.
    fn analyze(&mut self) -> &SpectralResult {
        for (c, w) in self.buffer.iter_mut().zip(&self.window) {
            c.re *= w;
            c.im = 0.0;
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let bin_width = self.bin_width();
        let mags = &mut self.result.magnitude_per_bin;
        for (m, c) in mags.iter_mut().zip(&self.buffer) {
            *m = c.norm();
        }

        let (freq, mag) = major_peak(mags, bin_width);
        self.result.dominant_frequency = freq;
        self.result.dominant_magnitude = mag;

        for (i, m) in mags.iter_mut().enumerate() {
            *m /= MAGNITUDE_DIVISOR;
            if let Some(&mult) = FFT_BIN_MULT.get(i) {
                *m *= mult as f64;
            }
        }

        &self.result
    }
}

/// Strongest bin in the usable half spectrum, refined by parabolic
/// interpolation against its neighbours. Zero if there is no usable bin.
fn major_peak(mags: &[f64], bin_width: f64) -> (f64, f64) {
    let half = mags.len() / 2;
    if half <= FIRST_USABLE_BIN {
        return (0.0, 0.0);
    }
    let mut best = FIRST_USABLE_BIN;
    for i in FIRST_USABLE_BIN..half {
        if mags[i] > mags[best] {
            best = i;
        }
    }

    let (left, mid, right) = (mags[best - 1], mags[best], mags[best + 1]);
    let denom = left - 2.0 * mid + right;
    let delta = if denom.abs() > f64::EPSILON {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    ((best as f64 + delta) * bin_width, mid)
}

fn hamming_window(size: usize) -> Vec<f64> {
    let den = (size.max(2) - 1) as f64;
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / den).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::calibration::REFERENCE_SAMPLE_RATE;
    use crate::pacer::Unpaced;

    struct SineSource {
        freq: f64,
        rate: f64,
        n: u64,
    }

    impl SampleSource for SineSource {
        fn next_sample(&mut self) -> i32 {
            let t = self.n as f64 / self.rate;
            self.n += 1;
            (512.0 + 400.0 * (2.0 * std::f64::consts::PI * self.freq * t).sin()) as i32
        }
    }

    fn analyze_tone(freq: f64) -> SpectralResult {
        let mut analyzer = SpectralAnalyzer::new(REFERENCE_SAMPLE_RATE);
        let mut src = SineSource {
            freq,
            rate: REFERENCE_SAMPLE_RATE as f64,
            n: 0,
        };
        analyzer.run_cycle(&mut src, &mut Unpaced, |_, _| {}).clone()
    }

    #[test]
    fn finds_on_bin_tone() {
        let res = analyze_tone(1_000.0);
        assert!((res.dominant_frequency - 1_000.0).abs() < 20.0, "got {}", res.dominant_frequency);
        assert!(res.dominant_magnitude > 0.0);
    }

    #[test]
    fn finds_off_bin_tones_within_one_bin() {
        let width = REFERENCE_SAMPLE_RATE as f64 / FFT_SIZE as f64;
        for freq in [130.0, 517.0, 2_345.0, 4_410.0] {
            let res = analyze_tone(freq);
            assert!(
                (res.dominant_frequency - freq).abs() <= width,
                "{} Hz detected as {}",
                freq,
                res.dominant_frequency
            );
        }
    }

    #[test]
    fn calibration_zeroes_artifact_bins() {
        let res = analyze_tone(1_000.0);
        assert_eq!(res.magnitude_per_bin.len(), FFT_SIZE);
        assert!(res.magnitude_per_bin[..3].iter().all(|&m| m == 0.0));
        // 1 kHz sits in bin 50
        let peak = res.magnitude_per_bin[..256]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(50));
    }

    #[test]
    fn every_sample_is_reported() {
        let mut analyzer = SpectralAnalyzer::new(1_000);
        let mut src = SineSource { freq: 100.0, rate: 1_000.0, n: 0 };
        let mut seen = Vec::new();
        analyzer.run_cycle(&mut src, &mut Unpaced, |i, _| seen.push(i));
        assert_eq!(seen, (0..FFT_SIZE).collect::<Vec<_>>());
    }

    #[test]
    fn major_peak_tolerates_tiny_spectra() {
        for len in 0..=7 {
            assert_eq!(major_peak(&vec![1.0; len], 20.0), (0.0, 0.0), "len {}", len);
        }
        let (freq, mag) = major_peak(&[0.0, 0.0, 0.0, 5.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 10.0);
        assert_eq!(mag, 5.0);
        assert!(freq > 25.0 && freq < 35.0, "got {}", freq);
    }

    #[test]
    fn hamming_endpoints() {
        let w = hamming_window(512);
        assert!((w[0] - 0.08).abs() < 1e-9);
        assert!((w[511] - 0.08).abs() < 1e-9);
        assert!(w[255] > 0.99);
    }
}
