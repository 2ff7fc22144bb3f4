mod audio;
mod cli;
mod config;
mod pacer;
mod pipeline;
mod shared;
mod sync;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use audio::calibration::FFT_SIZE;
use audio::decode::{decode_audio, FileInput};
use audio::features::AnalysisFrame;
use audio::source::{AnalogSource, DigitalSource, SampleSource, SimulatedSource};
use cli::{Cli, SourceKind};
use pacer::{DeadlinePacer, Pacer, Unpaced};
use pipeline::{Pipeline, PipelineSettings};
use shared::SharedState;
use sync::broadcast::{DatagramSink, MulticastSink, SyncBroadcaster};
use sync::receive::SyncReceiver;

/// Clears the run flag when the analysis thread exits, panics included.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Serialize)]
struct MeterReading<'a> {
    #[serde(flatten)]
    frame: &'a AnalysisFrame,
    peak: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(ref path) = config::find_config(cli.config.clone()) {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.source == SourceKind::Simulated {
                match SourceKind::from_str(&cfg.audio.source, true) {
                    Ok(kind) => cli.source = kind,
                    Err(_) => log::warn!("Unknown source '{}' in config", cfg.audio.source),
                }
            }
            if cli.sample_rate == 10_240 { cli.sample_rate = cfg.audio.sample_rate; }
            if cli.squelch == 10 { cli.squelch = cfg.audio.squelch; }
            if cli.gain == 40 { cli.gain = cfg.audio.gain; }
            if cli.loudness_decimation == 8 { cli.loudness_decimation = cfg.audio.loudness_decimation; }
            if cli.target_agc == 60 { cli.target_agc = cfg.agc.target; }
            if cli.max_vol == 6 { cli.max_vol = cfg.agc.max_vol; }
            if cli.peak_hold_ms == 15 { cli.peak_hold_ms = cfg.agc.peak_hold_ms; }
            if cli.group == std::net::Ipv4Addr::new(239, 0, 0, 1) { cli.group = cfg.sync.group; }
            if cli.port == 11988 { cli.port = cfg.sync.port; }
            if !cfg.sync.enabled { cli.no_sync = true; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let shared = SharedState::new();

    if cli.listen {
        return run_listener(&cli, &shared);
    }

    log::info!("soundsync - audio analysis and sync");
    log::info!(
        "Source: {:?}, {}Hz, {}-point transform ({:.1}ms per cycle)",
        cli.source,
        cli.sample_rate,
        FFT_SIZE,
        FFT_SIZE as f64 * 1000.0 / cli.sample_rate.max(1) as f64
    );
    log::info!(
        "squelch={} gain={} target={} maxVol={} hold={}ms",
        cli.squelch, cli.gain, cli.target_agc, cli.max_vol, cli.peak_hold_ms
    );

    let (mut source, input_len) = build_source(&cli)?;

    let sink: Option<Box<dyn DatagramSink>> = if cli.no_sync {
        log::info!("Sync broadcast disabled");
        None
    } else {
        match MulticastSink::open(cli.group, cli.port) {
            Ok(sink) => Some(Box::new(sink)),
            Err(err) => {
                log::warn!("Sync broadcast unavailable: {:#}", err);
                None
            }
        }
    };

    let settings = PipelineSettings {
        sample_rate: cli.sample_rate,
        squelch: cli.squelch,
        gain: cli.gain,
        target_agc: cli.target_agc,
        max_vol: cli.max_vol,
        peak_hold_ms: cli.peak_hold_ms,
        loudness_decimation: cli.loudness_decimation,
    };
    let mut pipeline = Pipeline::new(&settings, SyncBroadcaster::new(sink), Arc::clone(&shared));

    let limit = if cli.cycles > 0 {
        Some(cli.cycles)
    } else {
        input_len.map(|n| (n / FFT_SIZE) as u64)
    };

    let pb = limit.filter(|_| !cli.json).map(|total| {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} cycles ({eta} remaining)")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb
    });

    let running = Arc::new(AtomicBool::new(true));
    let analysis = {
        let running = Arc::clone(&running);
        let pb = pb.clone();
        let paced = !cli.no_pace;
        let sample_rate = cli.sample_rate;
        thread::Builder::new()
            .name("analysis".into())
            .spawn(move || {
                let _stop = StopOnDrop(Arc::clone(&running));
                let mut pacer: Box<dyn Pacer> = if paced {
                    let pacer = DeadlinePacer::new(sample_rate, Duration::from_millis(50));
                    log::debug!("Sampling every {:?}", pacer.interval());
                    Box::new(pacer)
                } else {
                    Box::new(Unpaced)
                };
                let mut done = 0u64;
                while running.load(Ordering::Acquire) && limit.map_or(true, |l| done < l) {
                    pipeline.run_cycle(source.as_mut(), pacer.as_mut());
                    done += 1;
                    if let Some(ref pb) = pb {
                        pb.set_position(done);
                    }
                }
                log::info!(
                    "Analysis stopped after {} cycles, {} sync packets sent",
                    done,
                    pipeline.broadcaster().transmissions()
                );
            })
            .context("Failed to start analysis thread")?
    };

    if cli.meter_interval_ms > cli.peak_hold_ms {
        log::warn!(
            "Meter reads every {}ms but peaks clear after {}ms, most peaks will not be shown",
            cli.meter_interval_ms,
            cli.peak_hold_ms
        );
    }
    let interval = Duration::from_millis(cli.meter_interval_ms.max(1));
    while running.load(Ordering::Acquire) && !analysis.is_finished() {
        thread::sleep(interval);
        let peak = shared.acknowledge_peak();
        report(&shared.snapshot(), peak, cli.json, pb.as_ref())?;
    }

    if analysis.join().is_err() {
        anyhow::bail!("Analysis thread panicked");
    }
    if let Some(pb) = pb {
        pb.finish_with_message("Analysis complete");
    }
    Ok(())
}

fn build_source(cli: &Cli) -> Result<(Box<dyn SampleSource>, Option<usize>)> {
    let Some(ref path) = cli.input else {
        if cli.source != SourceKind::Simulated {
            log::warn!("No input for the {:?} microphone, falling back to simulated input", cli.source);
        }
        return Ok((Box::new(SimulatedSource::new(0)), None));
    };

    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    log::info!("Input: {}", path.display());

    let input = FileInput::new(decode_audio(path)?, cli.sample_rate);
    let len = input.len();
    let source: Box<dyn SampleSource> = match cli.source {
        SourceKind::Analog => Box::new(AnalogSource::new(input)),
        SourceKind::Digital => Box::new(DigitalSource::new(input)),
        SourceKind::Simulated => {
            log::info!("Input file given, emulating a digital microphone");
            Box::new(DigitalSource::new(input))
        }
    };
    Ok((source, Some(len)))
}

fn run_listener(cli: &Cli, shared: &SharedState) -> Result<()> {
    let interval = Duration::from_millis(cli.meter_interval_ms.max(1));
    let mut receiver = SyncReceiver::open(cli.group, cli.port, interval)?;
    let mut accepted = 0u64;
    let mut last_report = Instant::now();

    while cli.cycles == 0 || accepted < cli.cycles {
        if receiver.poll(shared)? {
            accepted += 1;
        }
        if last_report.elapsed() >= interval {
            last_report = Instant::now();
            let peak = shared.acknowledge_peak();
            report(&shared.snapshot(), peak, cli.json, None)?;
        }
    }
    log::info!("Received {} sync packets", accepted);
    Ok(())
}

fn report(frame: &AnalysisFrame, peak: bool, json: bool, pb: Option<&ProgressBar>) -> Result<()> {
    if json {
        let line = serde_json::to_string(&MeterReading { frame, peak })?;
        println!("{}", line);
        return Ok(());
    }

    let bands: Vec<u8> = frame.bands.bands.iter().map(|b| b.clamp(0.0, 254.0) as u8).collect();
    let line = format!(
        "vol={:3} agc={:3} {} major={:5.0}Hz bands={:?}",
        frame.agc.volume,
        frame.agc.sample_agc,
        if peak { "PEAK" } else { "    " },
        frame.dominant_frequency,
        bands
    );
    match pb {
        Some(pb) => pb.println(line),
        None => log::info!("{}", line),
    }
    Ok(())
}
