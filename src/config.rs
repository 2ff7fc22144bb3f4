use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::audio::calibration::REFERENCE_SAMPLE_RATE;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub agc: AgcConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_squelch")]
    pub squelch: u8,
    #[serde(default = "default_gain")]
    pub gain: u8,
    #[serde(default = "default_decimation")]
    pub loudness_decimation: usize,
}

#[derive(Debug, Deserialize)]
pub struct AgcConfig {
    #[serde(default = "default_target")]
    pub target: u8,
    #[serde(default = "default_max_vol")]
    pub max_vol: u8,
    #[serde(default = "default_peak_hold_ms")]
    pub peak_hold_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            sample_rate: default_sample_rate(),
            squelch: default_squelch(),
            gain: default_gain(),
            loudness_decimation: default_decimation(),
        }
    }
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            max_vol: default_max_vol(),
            peak_hold_ms: default_peak_hold_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            group: default_group(),
            port: default_port(),
        }
    }
}

fn default_source() -> String { "simulated".into() }
fn default_sample_rate() -> u32 { REFERENCE_SAMPLE_RATE }
fn default_squelch() -> u8 { 10 }
fn default_gain() -> u8 { 40 }
fn default_decimation() -> usize { 8 }
fn default_target() -> u8 { 60 }
fn default_max_vol() -> u8 { 6 }
fn default_peak_hold_ms() -> u64 { 15 }
fn default_enabled() -> bool { true }
fn default_group() -> Ipv4Addr { Ipv4Addr::new(239, 0, 0, 1) }
fn default_port() -> u16 { 11988 }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Explicit path, else `soundsync.toml` in the working directory, else the
/// user config directories.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("soundsync.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("soundsync").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("soundsync").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}
