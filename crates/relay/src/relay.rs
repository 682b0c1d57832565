use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;

use bump::{
    BodyState, Endpoint, Link, MoveUpdate, NetStats, Packet, Payload, Roster, StructuralEvent,
};

use crate::config::RelayConfig;
use crate::events::RelayEvent;

struct PeerLink {
    index: u32,
    link: Link,
}

/// The message hub. Holds the roster of connected bodies and the global
/// bullet id counter, and forwards events; it runs no physics and does not
/// validate peer-submitted positions — that trust boundary is deliberate.
pub struct RelayServer {
    endpoint: Endpoint,
    peers: HashMap<SocketAddr, PeerLink>,
    roster: Roster<BodyState>,
    next_bullet_id: u64,
    epoch: Instant,
    pending_events: VecDeque<RelayEvent>,
    running: Arc<AtomicBool>,
    config: RelayConfig,
}

impl RelayServer {
    pub fn bind(bind_addr: &str, config: RelayConfig) -> io::Result<Self> {
        let mut endpoint = Endpoint::bind(bind_addr)?;
        if let Some(loss) = config.loss_simulation.clone() {
            endpoint.set_loss_simulation(loss);
        }

        Ok(Self {
            endpoint,
            peers: HashMap::new(),
            roster: Roster::new(),
            next_bullet_id: 0,
            epoch: Instant::now(),
            pending_events: VecDeque::new(),
            running: Arc::new(AtomicBool::new(true)),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> &NetStats {
        self.endpoint.stats()
    }

    pub fn connected(&self) -> usize {
        self.peers.len()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = RelayEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Blocking single-threaded loop; each connection's traffic is handled
    /// without ever blocking on another.
    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.pending_events.drain(..) {
                log_event(&event);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// One pump: drain the socket, then flush reliable resends.
    pub fn tick_once(&mut self) {
        if let Err(e) = self.process_network() {
            self.pending_events.push_back(RelayEvent::Error {
                message: format!("network error: {}", e),
            });
        }
        if let Err(e) = self.flush_outboxes() {
            self.pending_events.push_back(RelayEvent::Error {
                message: format!("resend error: {}", e),
            });
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;
        for (packet, addr) in packets {
            self.handle_packet(packet, addr)?;
        }
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) -> io::Result<()> {
        if let Some(peer) = self.peers.get_mut(&addr) {
            if !peer.link.accept_packet(&packet.header) {
                return Ok(());
            }
        }

        match packet.payload {
            Payload::Join => self.handle_join(addr)?,
            Payload::Snapshot(update) => self.handle_snapshot(addr, update)?,
            Payload::Event { seq, event } => self.handle_event(addr, seq, event)?,
            Payload::EventAck { seq } => {
                if let Some(peer) = self.peers.get_mut(&addr) {
                    peer.link.outbox.ack_up_to(seq);
                }
            }
            Payload::Bye => self.handle_bye(addr)?,
            // relay-originated payloads arriving inbound: drop
            Payload::SnapshotFrom { .. } => {}
        }

        Ok(())
    }

    /// Appends a randomized body, unicasts `Init` (assigned index plus the
    /// full roster, tombstones included), and announces the newcomer to
    /// everyone else. Duplicate `Join`s from a registered address are
    /// absorbed by the reliable channel's resends.
    fn handle_join(&mut self, addr: SocketAddr) -> io::Result<()> {
        if self.peers.contains_key(&addr) {
            return Ok(());
        }
        if self.peers.len() >= self.config.max_peers {
            log::warn!("join from {} refused: relay full", addr);
            return Ok(());
        }

        let body = random_body(&mut rand::thread_rng());
        let index = self.roster.push(body);

        let mut link = Link::new();
        link.outbox.push(StructuralEvent::Init {
            index,
            roster: self.roster.slots().to_vec(),
        });
        self.peers.insert(addr, PeerLink { index, link });

        for peer in self.peers.values_mut() {
            if peer.index != index {
                peer.link.outbox.push(StructuralEvent::Add { index, body });
            }
        }

        self.pending_events.push_back(RelayEvent::PeerJoined {
            index,
            addr,
            connected: self.peers.len(),
        });
        Ok(())
    }

    /// Latest-wins fan-out: the update lands in the roster copy and goes out
    /// volatile to every other peer; it is never buffered or resent.
    fn handle_snapshot(&mut self, addr: SocketAddr, update: MoveUpdate) -> io::Result<()> {
        let Some(peer) = self.peers.get(&addr) else {
            return Ok(());
        };
        let index = peer.index;

        if let Some(body) = self.roster.get_mut(index) {
            body.position = update.position;
            body.velocity = update.velocity;
            body.flags = update.flags;
        }

        let targets: Vec<SocketAddr> = self
            .peers
            .iter()
            .filter(|(peer_addr, _)| **peer_addr != addr)
            .map(|(peer_addr, _)| *peer_addr)
            .collect();

        for target in targets {
            let payload = Payload::SnapshotFrom { index, update };
            self.send_payload(target, payload)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, addr: SocketAddr, seq: u32, event: StructuralEvent) -> io::Result<()> {
        let Some(peer) = self.peers.get_mut(&addr) else {
            return Ok(());
        };
        let from_index = peer.index;
        let delivered = peer.link.inbox.accept(seq, event);
        let ack = peer.link.inbox.ack_value();

        for event in delivered {
            self.handle_structural(from_index, event);
        }

        self.send_payload(addr, Payload::EventAck { seq: ack })?;
        Ok(())
    }

    fn handle_structural(&mut self, from_index: u32, event: StructuralEvent) {
        match event {
            StructuralEvent::Collided(correction) => {
                self.queue_event_except(from_index, StructuralEvent::Collision(correction));
            }
            StructuralEvent::Fire(spawn) => {
                let id = self.next_bullet_id;
                self.next_bullet_id += 1;
                // spawn goes to everyone, the firer included
                self.queue_event_all(StructuralEvent::BulletSpawned { id, spawn });
                self.pending_events.push_back(RelayEvent::BulletAssigned {
                    id,
                    owner: spawn.owner,
                });
            }
            other => {
                log::debug!(
                    "dropping relay-bound event from peer {}: {:?}",
                    from_index,
                    other
                );
            }
        }
    }

    fn handle_bye(&mut self, addr: SocketAddr) -> io::Result<()> {
        let Some(peer) = self.peers.remove(&addr) else {
            return Ok(());
        };
        let index = peer.index;

        // tombstone; the arena clears itself once the last body leaves, at
        // which point index reuse becomes legal again
        self.roster.tombstone(index);
        self.queue_event_all(StructuralEvent::Remove { index });

        self.pending_events.push_back(RelayEvent::PeerLeft {
            index,
            addr,
            connected: self.peers.len(),
        });
        Ok(())
    }

    fn queue_event_all(&mut self, event: StructuralEvent) {
        for peer in self.peers.values_mut() {
            peer.link.outbox.push(event.clone());
        }
    }

    fn queue_event_except(&mut self, from_index: u32, event: StructuralEvent) {
        for peer in self.peers.values_mut() {
            if peer.index != from_index {
                peer.link.outbox.push(event.clone());
            }
        }
    }

    /// Sends every reliable event that is due or overdue on each link.
    fn flush_outboxes(&mut self) -> io::Result<()> {
        let now_ms = self.now_ms();
        let mut to_send: Vec<(SocketAddr, Payload)> = Vec::new();

        for (addr, peer) in self.peers.iter_mut() {
            for (seq, event) in peer.link.outbox.due(now_ms) {
                to_send.push((*addr, Payload::Event { seq, event }));
            }
        }

        for (addr, payload) in to_send {
            self.send_payload(addr, payload)?;
        }
        Ok(())
    }

    fn send_payload(&mut self, addr: SocketAddr, payload: Payload) -> io::Result<()> {
        let Some(peer) = self.peers.get_mut(&addr) else {
            return Ok(());
        };
        let header = peer.link.next_header();
        self.endpoint.send_to(&Packet::new(header, payload), addr)?;
        Ok(())
    }
}

fn random_body<R: Rng>(rng: &mut R) -> BodyState {
    BodyState {
        radius: 0.02 + rng.gen_range(0.0..=200.0_f32).round() / 10000.0,
        position: [
            rng.gen_range(0.0..=1000.0_f32).round() / 1000.0,
            rng.gen_range(0.0..=1000.0_f32).round() / 1000.0,
        ],
        velocity: [0.0, 0.0],
        color: [rng.r#gen(), rng.r#gen(), rng.r#gen()],
        flags: 0,
    }
}

fn log_event(event: &RelayEvent) {
    match event {
        RelayEvent::PeerJoined {
            index,
            addr,
            connected,
        } => {
            log::info!("peer {} joined from {}, {} connected", index, addr, connected);
        }
        RelayEvent::PeerLeft {
            index,
            addr,
            connected,
        } => {
            log::info!("peer {} left from {}, {} connected", index, addr, connected);
        }
        RelayEvent::BulletAssigned { id, owner } => {
            log::debug!("bullet {} assigned to peer {}", id, owner);
        }
        RelayEvent::Error { message } => {
            log::error!("{}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_radius_stays_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let body = random_body(&mut rng);
            assert!(body.radius >= 0.02);
            assert!(body.radius <= 0.04);
            assert!((0.0..=1.0).contains(&body.position[0]));
            assert!((0.0..=1.0).contains(&body.position[1]));
        }
    }

    #[test]
    fn bullet_ids_strictly_increase() {
        let mut relay = RelayServer::bind("127.0.0.1:0", RelayConfig::default()).unwrap();

        let spawn = bump::BulletSpawn {
            owner: 0,
            position: [0.0, 0.0],
            velocity: [0.0, 0.0],
            spin: 0.0,
            rotation: 0.0,
            radius: 0.01,
            sides: 3,
            color: [0, 0, 0],
        };

        for expected in 0..5u64 {
            assert_eq!(relay.next_bullet_id, expected);
            relay.handle_structural(0, StructuralEvent::Fire(spawn));
        }
        assert_eq!(relay.next_bullet_id, 5);
    }
}
