use anyhow::{Context, Result};
use std::io;
use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use super::packet::{PacketError, SyncPacket};
use crate::audio::features::SampleHistory;
use crate::shared::SharedState;

/// Listens for sync packets from another device.
pub struct SyncReceiver {
    socket: UdpSocket,
    buf: [u8; 512],
}

impl SyncReceiver {
    pub fn open(group: Ipv4Addr, port: u16, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .with_context(|| format!("Failed to bind sync port {}", port))?;
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .with_context(|| format!("Failed to join multicast group {}", group))?;
        socket
            .set_read_timeout(Some(timeout))
            .context("Failed to set receive timeout")?;
        log::info!("Listening for sync packets on {}:{}", group, port);
        Ok(Self {
            socket,
            buf: [0; 512],
        })
    }

    /// Wait for one datagram. Returns true if it was accepted.
    pub fn poll(&mut self, shared: &SharedState) -> Result<bool> {
        let (len, from) = match self.socket.recv_from(&mut self.buf) {
            Ok(r) => r,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(false);
            }
            Err(e) => return Err(e).context("Sync receive failed"),
        };

        match ingest(&self.buf[..len], shared) {
            Ok(()) => Ok(true),
            Err(e) => {
                log::warn!("Rejected sync packet from {}: {}", from, e);
                Ok(false)
            }
        }
    }
}

/// Publish a received datagram. A rejected datagram leaves `shared` untouched.
pub fn ingest(bytes: &[u8], shared: &SharedState) -> Result<(), PacketError> {
    let packet = SyncPacket::decode(bytes)?;
    log::debug!(
        "Sync packet: agc={} avg={:.1} peak={} major={:.0}Hz",
        packet.sample_agc,
        packet.sample_average,
        packet.peak,
        packet.dominant_frequency
    );

    shared.publish(|f| {
        f.loudness.sample = packet.sample;
        f.loudness.sample_average = packet.sample_average;
        f.agc.sample_agc = packet.sample_agc;
        f.agc.volume = (packet.sample_average * 4.0).clamp(0.0, 255.0) as u8;
        f.history = SampleHistory::from_bytes(packet.history);
        for (dst, &b) in f.bands.bands.iter_mut().zip(packet.bands.iter()) {
            *dst = f64::from(b);
        }
        f.dominant_frequency = packet.dominant_frequency;
        f.dominant_magnitude = packet.dominant_magnitude;
        f.cycle += 1;
    });
    if packet.peak {
        shared.peaks().renderer.raise();
    }
    Ok(())
}
