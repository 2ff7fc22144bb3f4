//! Empirical calibration tables for the 10240 Hz / 512-point transform.
//!
//! These numbers were measured against one microphone chain and are only
//! valid for that pairing. Changing the sample rate or transform size
//! invalidates every table in this file.

/// Sample rate the tables were tuned for (Hz).
pub const REFERENCE_SAMPLE_RATE: u32 = 10_240;

/// Transform size the tables were tuned for. Must stay a power of two.
pub const FFT_SIZE: usize = 512;

/// Every magnitude is divided by this before the per-bin multiplier.
pub const MAGNITUDE_DIVISOR: f64 = 16.0;

/// Bins below this index carry DC and windowing artifacts.
pub const FIRST_USABLE_BIN: usize = 3;

/// Per-bin gain flattening. Bins 0..=2 are zeroed.
pub const FFT_BIN_MULT: [f32; 256] = [
    0.0, 0.0, 0.0, //
    0.842, 0.938, 1.010, 0.995, 0.966, 0.899, 0.970, 0.982, 0.835, 0.906, 0.872, 0.981, 0.961, 0.948, 1.027, 1.015,
    0.820, 0.859, 0.643, 0.656, 0.695, 0.739, 0.647, 0.572, 0.463, 0.413, 0.455, 0.494, 0.440, 0.366, 0.457, 0.364,
    0.336, 0.308, 0.300, 0.398, 0.421, 0.327, 0.455, 0.319, 0.319, 0.328, 0.318, 0.293, 0.385, 0.369, 0.381, 0.395,
    0.475, 0.342, 0.363, 0.357, 0.366, 0.360, 0.399, 0.380, 0.446, 0.417, 0.390, 0.413, 0.280, 0.345, 0.406, 0.498,
    0.433, 0.441, 0.472, 0.409, 0.370, 0.416, 0.429, 0.383, 0.414, 0.434, 0.471, 0.388, 0.337, 0.325, 0.313, 0.277,
    0.265, 0.305, 0.275, 0.316, 0.284, 0.266, 0.337, 0.290, 0.330, 0.337, 0.417, 0.398, 0.362, 0.306, 0.332, 0.315,
    0.287, 0.311, 0.356, 0.326, 0.363, 0.278, 0.283, 0.301, 0.300, 0.267, 0.285, 0.330, 0.324, 0.321, 0.330, 0.306,
    0.282, 0.239, 0.234, 0.235, 0.209, 0.237, 0.222, 0.211, 0.210, 0.169, 0.181, 0.206, 0.177, 0.156, 0.153, 0.156,
    0.132, 0.137, 0.118, 0.133, 0.140, 0.142, 0.121, 0.110, 0.118, 0.117, 0.117, 0.112, 0.112, 0.116, 0.126, 0.132,
    0.137, 0.137, 0.146, 0.147, 0.155, 0.144, 0.149, 0.145, 0.165, 0.139, 0.143, 0.150, 0.150, 0.138, 0.143, 0.159,
    0.150, 0.151, 0.160, 0.159, 0.157, 0.151, 0.172, 0.166, 0.156, 0.157, 0.152, 0.154, 0.159, 0.149, 0.146, 0.147,
    0.170, 0.136, 0.161, 0.136, 0.152, 0.140, 0.147, 0.172, 0.143, 0.157, 0.162, 0.161, 0.165, 0.200, 0.240, 0.193,
    0.202, 0.227, 0.250, 0.290, 0.277, 0.277, 0.229, 0.266, 0.223, 0.246, 0.225, 0.234, 0.211, 0.196, 0.197, 0.178,
    0.185, 0.198, 0.185, 0.195, 0.156, 0.163, 0.182, 0.166, 0.163, 0.129, 0.157, 0.142, 0.147, 0.160, 0.146, 0.123,
    0.138, 0.133, 0.109, 0.144, 0.122, 0.133, 0.138, 0.123, 0.144, 0.113, 0.132, 0.134, 0.150, 0.152, 0.144, 0.165,
    0.170, 0.166, 0.171, 0.139, 0.172, 0.156, 0.150, 0.145, 0.157, 0.154, 0.161, 0.157, 0.181,
];

/// Number of output bands.
pub const NUM_BANDS: usize = 16;

/// Inclusive bin range and divisor for each output band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandEdge {
    pub first_bin: usize,
    pub last_bin: usize,
    pub divisor: u16,
}

const fn edge(first_bin: usize, last_bin: usize, divisor: u16) -> BandEdge {
    BandEdge { first_bin, last_bin, divisor }
}

/// Log-like band layout, index based. Neighbouring bands share their edge bin.
pub const BAND_EDGES: [BandEdge; NUM_BANDS] = [
    edge(2, 4, 3),
    edge(4, 6, 3),
    edge(6, 9, 4),
    edge(9, 13, 5),
    edge(13, 18, 5),
    edge(18, 24, 6),
    edge(24, 31, 8),
    edge(31, 40, 10),
    edge(40, 50, 11),
    edge(50, 63, 14),
    edge(63, 78, 16),
    edge(78, 97, 20),
    edge(97, 120, 24),
    edge(120, 148, 29),
    edge(148, 182, 35),
    edge(182, 255, 74),
];

/// Legacy per-band noise floor, scaled by `squelch / 4` when enabled.
#[cfg_attr(not(feature = "linear-noise-floor"), allow(dead_code))]
pub const LINEAR_NOISE: [u8; NUM_BANDS] = [30, 28, 26, 25, 20, 12, 9, 6, 4, 4, 3, 2, 2, 2, 2, 2];
