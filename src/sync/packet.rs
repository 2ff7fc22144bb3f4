use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::audio::calibration::NUM_BANDS;
use crate::audio::features::{AnalysisFrame, HISTORY_LEN};

/// Protocol tag, NUL-terminated.
pub const SYNC_HEADER: [u8; 6] = *b"00001\0";

pub const PACKET_LEN: usize = std::mem::size_of::<WirePacket>();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("unexpected datagram length {0}")]
    Length(usize),
    #[error("unknown sync header {0:?}")]
    Header([u8; 6]),
}

/// Byte layout on the wire. Packed, multi-byte fields little-endian.
#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct WirePacket {
    header: [u8; 6],
    history: [u8; HISTORY_LEN],
    sample_agc: i32,
    sample: i32,
    sample_average: u32,
    peak: u8,
    bands: [u8; NUM_BANDS],
    dominant_magnitude: u64,
    dominant_frequency: u64,
}

/// One audio-sync datagram, decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncPacket {
    pub history: [u8; HISTORY_LEN],
    pub sample_agc: i32,
    pub sample: i32,
    pub sample_average: f32,
    pub peak: bool,
    pub bands: [u8; NUM_BANDS],
    pub dominant_magnitude: f64,
    pub dominant_frequency: f64,
}

impl SyncPacket {
    /// Snapshot a frame for transmission. Bands are clamped to 0..=254.
    pub fn from_frame(frame: &AnalysisFrame, peak: bool) -> Self {
        let mut bands = [0u8; NUM_BANDS];
        for (dst, &v) in bands.iter_mut().zip(frame.bands.bands.iter()) {
            *dst = v.clamp(0.0, 254.0) as u8;
        }

        Self {
            history: frame.history.values,
            sample_agc: frame.agc.sample_agc,
            sample: frame.loudness.sample,
            sample_average: frame.loudness.sample_average,
            peak,
            bands,
            dominant_magnitude: frame.dominant_magnitude,
            dominant_frequency: frame.dominant_frequency,
        }
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let wire = WirePacket {
            header: SYNC_HEADER,
            history: self.history,
            sample_agc: self.sample_agc.to_le(),
            sample: self.sample.to_le(),
            sample_average: self.sample_average.to_bits().to_le(),
            peak: u8::from(self.peak),
            bands: self.bands,
            dominant_magnitude: self.dominant_magnitude.to_bits().to_le(),
            dominant_frequency: self.dominant_frequency.to_bits().to_le(),
        };
        let mut out = [0u8; PACKET_LEN];
        out.copy_from_slice(bytemuck::bytes_of(&wire));
        out
    }

    /// Parse a received datagram. The header must match byte for byte.
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() != PACKET_LEN {
            return Err(PacketError::Length(bytes.len()));
        }
        let wire: WirePacket = bytemuck::pod_read_unaligned(bytes);

        let header = wire.header;
        if header != SYNC_HEADER {
            return Err(PacketError::Header(header));
        }

        Ok(Self {
            history: wire.history,
            sample_agc: i32::from_le(wire.sample_agc),
            sample: i32::from_le(wire.sample),
            sample_average: f32::from_bits(u32::from_le(wire.sample_average)),
            peak: wire.peak != 0,
            bands: wire.bands,
            dominant_magnitude: f64::from_bits(u64::from_le(wire.dominant_magnitude)),
            dominant_frequency: f64::from_bits(u64::from_le(wire.dominant_frequency)),
        })
    }
}
