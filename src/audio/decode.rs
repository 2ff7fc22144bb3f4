use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::source::{AdcChannel, PcmInput};

pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // Downmix to mono
        for frame_samples in sample_buf.samples().chunks(channels) {
            all_samples.push(frame_samples.iter().sum::<f32>() / channels as f32);
        }
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}

/// Plays a decoded file back at the pipeline's sample rate, standing in for
/// either microphone. Nearest-sample rate conversion.
pub struct FileInput {
    samples: Vec<f32>,
    position: f64,
    step: f64,
}

impl FileInput {
    pub fn new(audio: AudioData, target_rate: u32) -> Self {
        Self {
            step: audio.sample_rate as f64 / target_rate.max(1) as f64,
            samples: audio.samples,
            position: 0.0,
        }
    }

    /// Number of samples this input yields at the target rate.
    pub fn len(&self) -> usize {
        (self.samples.len() as f64 / self.step) as usize
    }

    fn advance(&mut self) -> Option<f32> {
        let s = self.samples.get(self.position as usize).copied()?;
        self.position += self.step;
        Some(s.clamp(-1.0, 1.0))
    }
}

impl AdcChannel for FileInput {
    fn read(&mut self) -> u16 {
        // Biased around mid-scale like a real electret front end
        let s = self.advance().unwrap_or(0.0);
        (2048.0 + s * 2047.0) as u16
    }
}

impl PcmInput for FileInput {
    fn pop_sample(&mut self) -> Option<i32> {
        self.advance().map(|s| (s as f64 * i32::MAX as f64) as i32)
    }
}
