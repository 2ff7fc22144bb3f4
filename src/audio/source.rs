use noise::{NoiseFn, OpenSimplex};
use std::time::Instant;

/// Something that yields one instantaneous amplitude reading per tick.
pub trait SampleSource: Send {
    fn next_sample(&mut self) -> i32;
}

/// Single-ended ADC channel with a 12-bit native range.
pub trait AdcChannel: Send {
    fn read(&mut self) -> u16;
}

/// Buffered 32-bit PCM input. `None` means nothing could be read.
pub trait PcmInput: Send {
    fn pop_sample(&mut self) -> Option<i32>;
}

/// Deterministic stand-in used when no microphone is present.
pub struct SimulatedSource {
    simplex: OpenSimplex,
    started: Instant,
}

impl SimulatedSource {
    pub fn new(seed: u32) -> Self {
        Self {
            simplex: OpenSimplex::new(seed),
            started: Instant::now(),
        }
    }

    /// Value in 0..=255 for the given elapsed time.
    pub fn sample_at(&self, elapsed_ms: u64) -> i32 {
        // 256 ms per lattice cell, same coordinate on both axes
        let t = elapsed_ms as f64 / 256.0;
        let n = self.simplex.get([t, t]).clamp(-1.0, 1.0);
        ((n + 1.0) * 127.5) as i32
    }
}

impl SampleSource for SimulatedSource {
    fn next_sample(&mut self) -> i32 {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.sample_at(elapsed)
    }
}

/// Analog microphone: the two extra ADC bits are dropped to match the
/// 10-bit range the rest of the pipeline is tuned for.
pub struct AnalogSource<A> {
    adc: A,
}

impl<A: AdcChannel> AnalogSource<A> {
    pub fn new(adc: A) -> Self {
        Self { adc }
    }
}

impl<A: AdcChannel> SampleSource for AnalogSource<A> {
    fn next_sample(&mut self) -> i32 {
        i32::from(self.adc.read() >> 2)
    }
}

/// Digital microphone: magnitude of the high 16 bits of each PCM word.
/// A failed read repeats the previous value.
pub struct DigitalSource<P> {
    input: P,
    last: i32,
}

impl<P: PcmInput> DigitalSource<P> {
    pub fn new(input: P) -> Self {
        Self { input, last: 0 }
    }
}

impl<P: PcmInput> SampleSource for DigitalSource<P> {
    fn next_sample(&mut self) -> i32 {
        if let Some(word) = self.input.pop_sample() {
            self.last = (word >> 16).abs();
        }
        self.last
    }
}
