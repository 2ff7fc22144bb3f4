use clap::{Parser, ValueEnum};
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Deterministic noise, no microphone needed
    Simulated,
    /// 12-bit ADC microphone
    Analog,
    /// 32-bit PCM microphone
    Digital,
}

#[derive(Parser, Debug)]
#[command(name = "soundsync", about = "Real-time audio analysis with multicast sync")]
pub struct Cli {
    /// Audio file played back as the microphone (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Config file (defaults to soundsync.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Microphone type
    #[arg(short, long, value_enum, default_value_t = SourceKind::Simulated)]
    pub source: SourceKind,

    /// Sampling rate in Hz. The band calibration assumes 10240.
    #[arg(long, default_value_t = 10_240)]
    pub sample_rate: u32,

    /// Noise gate threshold
    #[arg(long, default_value_t = 10)]
    pub squelch: u8,

    /// Input gain (40 = unity)
    #[arg(long, default_value_t = 40)]
    pub gain: u8,

    /// AGC setpoint (0-255)
    #[arg(long, default_value_t = 60)]
    pub target_agc: u8,

    /// Peak margin above the running average
    #[arg(long, default_value_t = 6)]
    pub max_vol: u8,

    /// How long a peak stays visible without acknowledgement (ms)
    #[arg(long, default_value_t = 15)]
    pub peak_hold_ms: u64,

    /// Run the loudness path on every Nth sample
    #[arg(long, default_value_t = 8)]
    pub loudness_decimation: usize,

    /// Multicast group for sync packets
    #[arg(long, default_value_t = Ipv4Addr::new(239, 0, 0, 1))]
    pub group: Ipv4Addr,

    /// UDP port for sync packets
    #[arg(long, default_value_t = 11988)]
    pub port: u16,

    /// Do not broadcast sync packets
    #[arg(long)]
    pub no_sync: bool,

    /// Receive sync packets instead of analysing audio
    #[arg(long)]
    pub listen: bool,

    /// Stop after this many transform cycles (0 = run until input ends or forever)
    #[arg(long, default_value_t = 0)]
    pub cycles: u64,

    /// Process samples as fast as possible instead of in real time
    #[arg(long)]
    pub no_pace: bool,

    /// Print meter readings as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Meter read interval (ms). Longer than --peak-hold-ms and peaks go unseen.
    #[arg(long, default_value_t = 15)]
    pub meter_interval_ms: u64,
}
