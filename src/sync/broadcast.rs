use anyhow::{Context, Result};
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use super::packet::SyncPacket;
use crate::audio::features::AnalysisFrame;
use crate::audio::peak::PeakFlags;

/// Fire-and-forget datagram transport.
pub trait DatagramSink: Send {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize>;
}

/// UDP multicast sender.
pub struct MulticastSink {
    socket: UdpSocket,
    target: SocketAddrV4,
}

impl MulticastSink {
    pub fn open(group: Ipv4Addr, port: u16) -> Result<Self> {
        if !group.is_multicast() {
            anyhow::bail!("{} is not a multicast address", group);
        }
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .context("Failed to bind sync socket")?;
        socket
            .set_multicast_ttl_v4(1)
            .context("Failed to set multicast TTL")?;
        log::info!("Sync broadcast to {}:{}", group, port);
        Ok(Self {
            socket,
            target: SocketAddrV4::new(group, port),
        })
    }
}

impl DatagramSink for MulticastSink {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, self.target)
    }
}

/// Sends one sync packet per spectral cycle while a sink is attached.
#[derive(Default)]
pub struct SyncBroadcaster {
    sink: Option<Box<dyn DatagramSink>>,
    sent: u64,
}

impl SyncBroadcaster {
    pub fn new(sink: Option<Box<dyn DatagramSink>>) -> Self {
        Self { sink, sent: 0 }
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Datagrams handed to the sink so far.
    pub fn transmissions(&self) -> u64 {
        self.sent
    }

    /// Returns whether a datagram was sent. The network peak flag is
    /// consumed only when a sink is attached.
    pub fn broadcast_if_connected(&mut self, frame: &AnalysisFrame, peaks: &PeakFlags) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };

        let packet = SyncPacket::from_frame(frame, peaks.network.take());
        match sink.send(&packet.encode()) {
            Ok(_) => {
                self.sent += 1;
                true
            }
            Err(e) => {
                // datagram loss is accepted; the next cycle sends a fresh one
                log::warn!("Sync send failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::packet::PACKET_LEN;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<Vec<u8>>>>);

    impl DatagramSink for RecordingSink {
        fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().push(payload.to_vec());
            Ok(payload.len())
        }
    }

    struct BrokenSink;

    impl DatagramSink for BrokenSink {
        fn send(&mut self, _payload: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "network down"))
        }
    }

    #[test]
    fn no_sink_means_no_traffic() {
        let mut tx = SyncBroadcaster::new(None);
        let peaks = PeakFlags::default();
        peaks.network.raise();
        for _ in 0..100 {
            assert!(!tx.broadcast_if_connected(&AnalysisFrame::default(), &peaks));
        }
        assert_eq!(tx.transmissions(), 0);
        assert!(peaks.network.is_set());
    }

    #[test]
    fn peak_is_sent_once_and_renderer_copy_kept() {
        let sink = RecordingSink::default();
        let mut tx = SyncBroadcaster::new(Some(Box::new(sink.clone())));
        let peaks = PeakFlags::default();
        peaks.renderer.raise();
        peaks.network.raise();

        let frame = AnalysisFrame::default();
        assert!(tx.broadcast_if_connected(&frame, &peaks));
        assert!(tx.broadcast_if_connected(&frame, &peaks));

        let sent = sink.0.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|p| p.len() == PACKET_LEN));
        assert_eq!(sent[0][50], 1);
        assert_eq!(sent[1][50], 0);
        assert!(peaks.renderer.is_set());
    }

    #[test]
    fn connection_state_follows_sink() {
        assert!(!SyncBroadcaster::default().is_connected());
        let tx = SyncBroadcaster::new(Some(Box::new(RecordingSink::default())));
        assert!(tx.is_connected());
    }

    #[test]
    fn send_failure_is_not_fatal() {
        let mut tx = SyncBroadcaster::new(Some(Box::new(BrokenSink)));
        assert!(!tx.broadcast_if_connected(&AnalysisFrame::default(), &PeakFlags::default()));
        assert_eq!(tx.transmissions(), 0);
    }

    #[test]
    fn rejects_unicast_group() {
        assert!(MulticastSink::open(Ipv4Addr::new(192, 168, 1, 2), 11988).is_err());
    }
}
