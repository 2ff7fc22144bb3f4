use serde::Serialize;

use super::agc::AgcState;
use super::bands::BandResult;
use super::preprocess::LoudnessState;

pub const HISTORY_LEN: usize = 32;

/// Ring of recent loudness bytes, oldest value overwritten first.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SampleHistory {
    pub values: [u8; HISTORY_LEN],
    #[serde(skip)]
    cursor: usize,
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self {
            values: [0; HISTORY_LEN],
            cursor: 0,
        }
    }
}

impl SampleHistory {
    pub fn from_bytes(values: [u8; HISTORY_LEN]) -> Self {
        Self { values, cursor: 0 }
    }

    pub fn push(&mut self, value: u8) {
        self.values[self.cursor] = value;
        self.cursor = (self.cursor + 1) % HISTORY_LEN;
    }
}

/// Everything a renderer may read. Replaced field-group by field-group,
/// never partially.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnalysisFrame {
    pub loudness: LoudnessState,
    pub agc: AgcState,
    pub history: SampleHistory,
    pub bands: BandResult,
    pub dominant_frequency: f64,
    pub dominant_magnitude: f64,
    /// Completed spectral cycles, or received packets in listen mode.
    pub cycle: u64,
}
