use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use rand::Rng;

use super::protocol::{MAX_PACKET_SIZE, Packet, sequence_greater_than};

/// Outbound drop injection for tests and soak runs. The protocol has to stay
/// correct when half the volatile traffic disappears, so the harness needs a
/// way to make that happen on localhost.
#[derive(Debug, Clone, Default)]
pub struct LossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
}

impl LossSimulation {
    pub fn with_loss(loss_percent: f32) -> Self {
        Self {
            enabled: true,
            loss_percent,
        }
    }

    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rand::thread_rng().gen_range(0.0..100.0) < self.loss_percent
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped_sim: u64,
    pub packets_malformed: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Tracks received packet sequences for duplicate suppression and builds the
/// cumulative ack + 32-bit history bitfield carried in every header.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: u32,
    received_bits: u32,
    recent: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: 0,
            received_bits: 0,
            recent: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Returns false for a duplicate.
    pub fn record(&mut self, sequence: u32) -> bool {
        if self.recent.contains(&sequence) {
            return false;
        }

        if self.recent.len() >= self.max_recent {
            self.recent.pop_front();
        }
        self.recent.push_back(sequence);

        if sequence_greater_than(sequence, self.last_received) {
            let diff = sequence.wrapping_sub(self.last_received);
            if diff <= 32 {
                self.received_bits = (self.received_bits << diff) | 1;
            } else {
                self.received_bits = 0;
            }
            self.last_received = sequence;
        } else {
            let diff = self.last_received.wrapping_sub(sequence);
            if diff > 0 && diff <= 32 {
                self.received_bits |= 1 << (diff - 1);
            }
        }

        true
    }

    pub fn ack_data(&self) -> (u32, u32) {
        (self.last_received, self.received_bits)
    }
}

/// Nonblocking UDP socket wrapper. Malformed or version-mismatched datagrams
/// are dropped and counted, never surfaced as errors.
pub struct Endpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    recv_buffer: [u8; MAX_PACKET_SIZE],
    stats: NetStats,
    loss: LossSimulation,
}

impl Endpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            stats: NetStats::default(),
            loss: LossSimulation::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetStats {
        &self.stats
    }

    pub fn set_loss_simulation(&mut self, loss: LossSimulation) {
        self.loss = loss;
    }

    pub fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> io::Result<usize> {
        let data = packet
            .serialize()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        if data.len() > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "packet exceeds MTU",
            ));
        }

        if self.loss.should_drop() {
            self.stats.packets_dropped_sim += 1;
            return Ok(data.len());
        }

        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(bytes)
    }

    /// Drains everything currently queued on the socket.
    pub fn receive(&mut self) -> io::Result<Vec<(Packet, SocketAddr)>> {
        let mut packets = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    let Ok(packet) = Packet::deserialize(&self.recv_buffer[..size]) else {
                        self.stats.packets_malformed += 1;
                        continue;
                    };
                    if !packet.header.is_valid() {
                        self.stats.packets_malformed += 1;
                        continue;
                    }

                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    packets.push((packet, addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{PacketHeader, Payload};

    #[test]
    fn receive_tracker_bitfield() {
        let mut tracker = ReceiveTracker::new();

        tracker.record(1);
        tracker.record(2);
        tracker.record(3);

        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bits & 0b11, 0b11);
    }

    #[test]
    fn receive_tracker_out_of_order() {
        let mut tracker = ReceiveTracker::new();

        tracker.record(3);
        tracker.record(1);
        tracker.record(2);

        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bits & 0b11, 0b11);
    }

    #[test]
    fn duplicate_detection() {
        let mut tracker = ReceiveTracker::new();

        assert!(tracker.record(1));
        assert!(!tracker.record(1));
        assert!(tracker.record(2));
    }

    #[test]
    fn endpoint_drops_garbage() {
        let mut a = Endpoint::bind("127.0.0.1:0").unwrap();
        let b = Endpoint::bind("127.0.0.1:0").unwrap();

        b.socket.send_to(b"not a packet", a.local_addr()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let received = a.receive().unwrap();
        assert!(received.is_empty());
        assert_eq!(a.stats().packets_malformed, 1);
    }

    #[test]
    fn endpoint_roundtrip() {
        let mut a = Endpoint::bind("127.0.0.1:0").unwrap();
        let mut b = Endpoint::bind("127.0.0.1:0").unwrap();

        let packet = Packet::new(PacketHeader::new(1, 0, 0), Payload::Join);
        a.send_to(&packet, b.local_addr()).unwrap();

        let start = std::time::Instant::now();
        loop {
            let received = b.receive().unwrap();
            if !received.is_empty() {
                assert!(matches!(received[0].0.payload, Payload::Join));
                break;
            }
            assert!(start.elapsed().as_millis() < 500, "packet never arrived");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}
