use serde::Serialize;

use super::calibration::{BandEdge, BAND_EDGES, NUM_BANDS};
#[cfg(feature = "linear-noise-floor")]
use super::calibration::LINEAR_NOISE;
use super::spectrum::SpectralResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BandResult {
    pub bands: [f64; NUM_BANDS],
}

/// Folds calibrated bins into the sixteen output bands.
pub struct BandReducer {
    #[cfg_attr(not(feature = "linear-noise-floor"), allow(dead_code))]
    squelch: u8,
}

impl BandReducer {
    pub fn new(squelch: u8) -> Self {
        Self { squelch }
    }

    pub fn reduce(&self, spectrum: &SpectralResult) -> BandResult {
        let mut out = BandResult::default();
        for (band, edge) in out.bands.iter_mut().zip(BAND_EDGES.iter()) {
            *band = sum_bins(&spectrum.magnitude_per_bin, edge) / f64::from(edge.divisor);
        }

        #[cfg(feature = "linear-noise-floor")]
        for (band, noise) in out.bands.iter_mut().zip(LINEAR_NOISE) {
            let floor = f64::from(self.squelch) * f64::from(noise) / 4.0;
            *band = (*band - floor).max(0.0);
        }

        out
    }
}

fn sum_bins(bins: &[f64], edge: &BandEdge) -> f64 {
    let last = edge.last_bin.min(bins.len().saturating_sub(1));
    bins.get(edge.first_bin..=last).map_or(0.0, |s| s.iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum_from(f: impl Fn(usize) -> f64) -> SpectralResult {
        SpectralResult {
            magnitude_per_bin: (0..512).map(f).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn band_edges_follow_calibration_table() {
        let reducer = BandReducer::new(0);
        // bin i holds i, so each band is an arithmetic series
        let out = reducer.reduce(&spectrum_from(|i| i as f64));
        assert_eq!(out.bands.len(), 16);
        assert!((out.bands[0] - (2.0 + 3.0 + 4.0) / 3.0).abs() < 1e-9);
        let top: f64 = (182..=255).map(|i| i as f64).sum();
        assert!((out.bands[15] - top / 74.0).abs() < 1e-9);
    }

    #[test]
    #[cfg(not(feature = "linear-noise-floor"))]
    fn flat_spectrum_gives_width_over_divisor() {
        let reducer = BandReducer::new(10);
        let out = reducer.reduce(&spectrum_from(|_| 1.0));
        for (band, edge) in out.bands.iter().zip(BAND_EDGES.iter()) {
            let width = (edge.last_bin - edge.first_bin + 1) as f64;
            assert!((band - width / f64::from(edge.divisor)).abs() < 1e-9);
        }
    }

    #[test]
    fn reduce_is_idempotent() {
        let reducer = BandReducer::new(10);
        let spectrum = spectrum_from(|i| ((i * 37) % 101) as f64);
        assert_eq!(reducer.reduce(&spectrum), reducer.reduce(&spectrum));
    }

    #[test]
    fn short_spectrum_does_not_panic() {
        let reducer = BandReducer::new(0);
        let spectrum = SpectralResult {
            magnitude_per_bin: vec![1.0; 8],
            ..Default::default()
        };
        let out = reducer.reduce(&spectrum);
        assert!((out.bands[0] - 1.0).abs() < 1e-9);
        assert_eq!(out.bands[15], 0.0);
    }

    #[test]
    #[cfg(feature = "linear-noise-floor")]
    fn noise_floor_is_subtracted() {
        let reducer = BandReducer::new(4);
        let out = reducer.reduce(&spectrum_from(|_| 0.0));
        assert!(out.bands.iter().all(|&b| b == 0.0));
        let out = reducer.reduce(&spectrum_from(|_| 100.0));
        // band 0: 300/3 - 4*30/4
        assert!((out.bands[0] - 70.0).abs() < 1e-9);
    }
}
