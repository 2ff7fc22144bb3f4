use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond clock for the loudness path.
pub type Clock = Box<dyn FnMut() -> u64 + Send>;

use crate::audio::agc::AutomaticGainControl;
use crate::audio::bands::{BandReducer, BandResult};
use crate::audio::calibration::{FFT_SIZE, REFERENCE_SAMPLE_RATE};
use crate::audio::features::SampleHistory;
use crate::audio::peak::PeakDetector;
use crate::audio::preprocess::Preprocessor;
use crate::audio::source::SampleSource;
use crate::audio::spectrum::SpectralAnalyzer;
use crate::pacer::Pacer;
use crate::shared::SharedState;
use crate::sync::broadcast::SyncBroadcaster;

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    pub sample_rate: u32,
    pub squelch: u8,
    pub gain: u8,
    pub target_agc: u8,
    pub max_vol: u8,
    pub peak_hold_ms: u64,
    pub loudness_decimation: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sample_rate: REFERENCE_SAMPLE_RATE,
            squelch: 10,
            gain: 40,
            target_agc: 60,
            max_vol: 6,
            peak_hold_ms: 15,
            loudness_decimation: 8,
        }
    }
}

impl PipelineSettings {
    /// Duration of one transform block, rounded up.
    pub fn block_ms(&self) -> u64 {
        let rate = u64::from(self.sample_rate.max(1));
        (FFT_SIZE as u64 * 1000).div_ceil(rate)
    }

    /// The network peak flag is read once per block, right after it ends.
    /// Two blocks cover a peak raised on the first sample of a block.
    pub fn network_hold_ms(&self) -> u64 {
        (2 * self.block_ms()).max(self.peak_hold_ms)
    }
}

/// Preprocessor, AGC and peak detector, run on every decimated sample.
pub struct LoudnessPath {
    preprocessor: Preprocessor,
    agc: AutomaticGainControl,
    peak: PeakDetector,
    history: SampleHistory,
}

impl LoudnessPath {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            preprocessor: Preprocessor::new(settings.squelch, settings.gain),
            agc: AutomaticGainControl::new(settings.target_agc),
            peak: PeakDetector::new(settings.max_vol, settings.peak_hold_ms, settings.network_hold_ms()),
            history: SampleHistory::default(),
        }
    }

    /// One loudness tick. Returns true if a peak fired.
    pub fn tick(&mut self, raw: i32, now_ms: u64, shared: &SharedState) -> bool {
        let loudness = *self.preprocessor.process_tick(raw);
        let agc = *self.agc.recompute(&loudness);
        let fired = self.peak.evaluate(&loudness, &agc, shared.peaks(), now_ms);
        self.history.push(agc.sample_agc as u8);

        log::trace!(
            "raw={} micLev={:.1} micIn={} sample={} avg={:.2} target={} mult={:.2} agc={} peak={}",
            raw,
            loudness.mic_level,
            loudness.mic_in,
            loudness.sample,
            loudness.sample_average,
            self.agc.target_level(),
            agc.multiplier,
            agc.sample_agc,
            fired
        );

        let history = self.history;
        shared.publish(|f| {
            f.loudness = loudness;
            f.agc = agc;
            f.history = history;
        });
        fired
    }
}

/// The whole analysis chain for one device.
pub struct Pipeline {
    loudness: LoudnessPath,
    decimation: usize,
    analyzer: SpectralAnalyzer,
    reducer: BandReducer,
    broadcaster: SyncBroadcaster,
    shared: Arc<SharedState>,
    clock: Clock,
    cycles: u64,
}

impl Pipeline {
    pub fn new(settings: &PipelineSettings, broadcaster: SyncBroadcaster, shared: Arc<SharedState>) -> Self {
        let started = Instant::now();
        let clock: Clock = Box::new(move || started.elapsed().as_millis() as u64);
        Self::with_clock(settings, broadcaster, shared, clock)
    }

    pub fn with_clock(
        settings: &PipelineSettings,
        broadcaster: SyncBroadcaster,
        shared: Arc<SharedState>,
        clock: Clock,
    ) -> Self {
        if settings.sample_rate != REFERENCE_SAMPLE_RATE {
            log::warn!(
                "Sample rate {}Hz differs from the {}Hz the band calibration was tuned for",
                settings.sample_rate,
                REFERENCE_SAMPLE_RATE
            );
        }

        if !broadcaster.is_connected() {
            log::info!("No sync sink attached, packets will not be sent");
        }

        Self {
            loudness: LoudnessPath::new(settings),
            decimation: settings.loudness_decimation.max(1),
            analyzer: SpectralAnalyzer::new(settings.sample_rate),
            reducer: BandReducer::new(settings.squelch),
            broadcaster,
            shared,
            clock,
            cycles: 0,
        }
    }

    pub fn broadcaster(&self) -> &SyncBroadcaster {
        &self.broadcaster
    }

    /// Acquire one transform block, feeding the loudness path along the way,
    /// then publish bands and broadcast.
    pub fn run_cycle<S, P>(&mut self, source: &mut S, pacer: &mut P) -> BandResult
    where
        S: SampleSource + ?Sized,
        P: Pacer + ?Sized,
    {
        let cycle_start = Instant::now();
        let decimation = self.decimation;
        let loudness = &mut self.loudness;
        let clock = &mut self.clock;
        let shared = &*self.shared;

        let spectrum = self.analyzer.run_cycle(source, pacer, |i, raw| {
            if i % decimation == 0 {
                loudness.tick(raw, clock(), shared);
            }
        });

        let bands = self.reducer.reduce(spectrum);
        let (freq, mag) = (spectrum.dominant_frequency, spectrum.dominant_magnitude);
        self.cycles += 1;
        let cycle = self.cycles;

        self.shared.publish(|f| {
            f.bands = bands;
            f.dominant_frequency = freq;
            f.dominant_magnitude = mag;
            f.cycle = cycle;
        });

        log::debug!(
            "cycle {} in {:.1}ms: major={:.0}Hz mag={:.0} peak={} bands={:?}",
            cycle,
            cycle_start.elapsed().as_secs_f64() * 1000.0,
            freq,
            mag,
            self.shared.peaks().network.is_set(),
            bands.bands.map(|b| b.clamp(0.0, 254.0) as u8)
        );

        let frame = self.shared.snapshot();
        self.broadcaster.broadcast_if_connected(&frame, self.shared.peaks());
        bands
    }
}
