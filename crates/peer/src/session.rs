use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use glam::Vec2;

use bump::{
    Body, Bullet, BulletSet, Endpoint, INPUT_TARGET_MS, InputFlags, Link, LossSimulation,
    MoveUpdate, NETWORK_TARGET_MS, NetStats, OwnedBody, Pacer, Packet, Payload, Roster,
    SIMULATE_TARGET_MS, ShadowBody, StructuralEvent, TrackedBody, apply_correction, fire,
    resolve_owned_overlap, sweep_bullet_hits, unix_ms,
};

/// Cadence for repeating `Join` until the relay's `Init` lands.
pub const JOIN_RETRY_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Joining,
    Active,
}

/// One peer's entire view of the world: the exclusively owned body, shadows
/// of every other body, the live bullet set, and the three self-tuning
/// loops. Everything runs cooperatively on the caller's thread — the owned
/// body is exclusive to the simulate path and shadows are touched only by
/// the simulate and reconciliation paths, so no locks are needed.
pub struct PeerSession {
    endpoint: Endpoint,
    relay_addr: SocketAddr,
    link: Link,
    state: SessionState,
    self_index: Option<u32>,
    roster: Roster<TrackedBody>,
    bullets: BulletSet,
    simulate: Pacer,
    input: Pacer,
    network: Pacer,
    epoch: Instant,
    last_join_ms: Option<u64>,
    held_flags: InputFlags,
    fire_request: Option<Vec2>,
}

impl PeerSession {
    pub fn connect(relay_addr: SocketAddr) -> io::Result<Self> {
        let endpoint = Endpoint::bind("0.0.0.0:0")?;
        log::info!("joining relay at {}", relay_addr);

        Ok(Self {
            endpoint,
            relay_addr,
            link: Link::new(),
            state: SessionState::Joining,
            self_index: None,
            roster: Roster::new(),
            bullets: BulletSet::new(),
            simulate: Pacer::new(SIMULATE_TARGET_MS),
            input: Pacer::new(INPUT_TARGET_MS),
            network: Pacer::new(NETWORK_TARGET_MS),
            epoch: Instant::now(),
            last_join_ms: None,
            held_flags: InputFlags::empty(),
            fire_request: None,
        })
    }

    pub fn set_loss_simulation(&mut self, loss: LossSimulation) {
        self.endpoint.set_loss_simulation(loss);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn self_index(&self) -> Option<u32> {
        self.self_index
    }

    pub fn roster(&self) -> &Roster<TrackedBody> {
        &self.roster
    }

    pub fn bullets(&self) -> &BulletSet {
        &self.bullets
    }

    pub fn stats(&self) -> &NetStats {
        self.endpoint.stats()
    }

    pub fn self_body(&self) -> Option<&Body> {
        self.roster.get(self.self_index?).map(TrackedBody::body)
    }

    /// Directional flags held until the next call; sampled by the input
    /// loop.
    pub fn set_input(&mut self, flags: InputFlags) {
        self.held_flags = flags;
    }

    /// Queues one fire request; `aim` is relative to the self body. Consumed
    /// by the next input tick.
    pub fn request_fire(&mut self, aim: Vec2) {
        self.fire_request = Some(aim);
    }

    /// One cooperative pump: drain the socket, run whichever of the three
    /// loops are due, flush reliable resends. Never blocks.
    pub fn update(&mut self) -> io::Result<()> {
        let now = Instant::now();
        let mono_ms = self.epoch.elapsed().as_millis() as u64;

        self.process_network(mono_ms)?;

        match self.state {
            SessionState::Joining => {
                let due = match self.last_join_ms {
                    None => true,
                    Some(last) => mono_ms.saturating_sub(last) >= JOIN_RETRY_MS,
                };
                if due {
                    self.last_join_ms = Some(mono_ms);
                    self.send_payload(Payload::Join)?;
                }
            }
            SessionState::Active => {
                if self.input.poll(now) {
                    self.input_tick();
                }
                if self.simulate.poll(now) {
                    self.simulate_tick();
                }
                if self.network.poll(now) {
                    self.publish_snapshot()?;
                }
            }
        }

        self.flush_outbox(mono_ms)?;
        Ok(())
    }

    /// Announces departure. Best-effort, like yanking a socket: the relay
    /// tombstones us either way once the message lands.
    pub fn leave(&mut self) -> io::Result<()> {
        self.send_payload(Payload::Bye)?;
        Ok(())
    }

    fn process_network(&mut self, mono_ms: u64) -> io::Result<()> {
        let packets = self.endpoint.receive()?;
        for (packet, from) in packets {
            if from != self.relay_addr {
                continue;
            }
            if !self.link.accept_packet(&packet.header) {
                continue;
            }

            match packet.payload {
                Payload::SnapshotFrom { index, update } => {
                    self.handle_remote_snapshot(index, update, mono_ms);
                }
                Payload::Event { seq, event } => {
                    let delivered = self.link.inbox.accept(seq, event);
                    let ack = self.link.inbox.ack_value();
                    for event in delivered {
                        self.handle_structural(event);
                    }
                    self.send_payload(Payload::EventAck { seq: ack })?;
                }
                Payload::EventAck { seq } => {
                    self.link.outbox.ack_up_to(seq);
                }
                // peer-bound payloads only
                Payload::Join | Payload::Snapshot(_) | Payload::Bye => {}
            }
        }
        Ok(())
    }

    fn handle_remote_snapshot(&mut self, index: u32, update: MoveUpdate, mono_ms: u64) {
        if Some(index) == self.self_index {
            return;
        }
        if let Some(shadow) = self.roster.get_mut(index).and_then(TrackedBody::as_shadow_mut) {
            shadow.absorb_snapshot(&update, mono_ms);
        }
        // snapshots for unknown or tombstoned indices are harmless no-ops
    }

    fn handle_structural(&mut self, event: StructuralEvent) {
        match event {
            StructuralEvent::Init { index, roster } => {
                self.self_index = Some(index);
                self.roster = Roster::new();
                for (i, slot) in roster.iter().enumerate() {
                    let Some(state) = slot else { continue };
                    let body = Body::from_state(state);
                    let tracked = if i as u32 == index {
                        TrackedBody::Owned(OwnedBody::new(body))
                    } else {
                        TrackedBody::Shadow(ShadowBody::new(body))
                    };
                    self.roster.insert_at(i as u32, tracked);
                }
                self.state = SessionState::Active;
                log::info!("joined as peer {} ({} bodies)", index, self.roster.live());
            }
            StructuralEvent::Add { index, body } => {
                let shadow = ShadowBody::new(Body::from_state(&body));
                self.roster.insert_at(index, TrackedBody::Shadow(shadow));
                log::info!("peer {} joined", index);
            }
            StructuralEvent::Remove { index } => {
                if Some(index) == self.self_index {
                    return;
                }
                self.roster.tombstone(index);
                log::info!("peer {} left", index);
            }
            StructuralEvent::Collision(correction) => {
                self.handle_collision(correction);
            }
            StructuralEvent::BulletSpawned { id, spawn } => {
                self.bullets.insert(Bullet::from_spawn(id, &spawn, unix_ms()));
            }
            // relay-bound events never arrive here
            StructuralEvent::Collided(_) | StructuralEvent::Fire(_) => {}
        }
    }

    fn handle_collision(&mut self, correction: bump::Correction) {
        let Some(self_index) = self.self_index else {
            return;
        };
        if correction.affected != self_index {
            return;
        }
        let Some((a, b)) = self.roster.pair_mut(self_index, correction.cause) else {
            return;
        };
        let (Some(owned), Some(cause)) = (a.as_owned_mut(), b.as_shadow_mut()) else {
            return;
        };
        if apply_correction(owned, cause, &correction, unix_ms()) {
            log::debug!(
                "correction from peer {} applied: dv = {:?}",
                correction.cause,
                correction.velocity_delta
            );
        }
    }

    /// Input-sample tick: impulses for held flags, plus any queued fire.
    fn input_tick(&mut self) {
        let Some(self_index) = self.self_index else {
            return;
        };
        let Some(tracked) = self.roster.get_mut(self_index) else {
            return;
        };
        let body = tracked.body_mut();
        body.flags = self.held_flags;
        body.apply_input_impulses();

        if let Some(aim) = self.fire_request.take() {
            let spawn = fire(self_index, body, aim, &mut rand::thread_rng());
            self.link.outbox.push(StructuralEvent::Fire(spawn));
        }
    }

    /// Simulate tick: integrate everything, then arbitrate collisions and
    /// expire bullets.
    fn simulate_tick(&mut self) {
        self.bullets.integrate_all();
        for (_, tracked) in self.roster.iter_mut() {
            tracked.integrate();
        }

        let Some(self_index) = self.self_index else {
            return;
        };
        let now_wall = unix_ms();

        let shadow_indices: Vec<u32> = self
            .roster
            .iter()
            .filter(|(index, _)| *index != self_index)
            .map(|(index, _)| index)
            .collect();

        for shadow_index in shadow_indices {
            let Some((a, b)) = self.roster.pair_mut(self_index, shadow_index) else {
                continue;
            };
            let (Some(owned), Some(shadow)) = (a.as_owned_mut(), b.as_shadow_mut()) else {
                continue;
            };
            if let Some(correction) =
                resolve_owned_overlap(owned, self_index, shadow, shadow_index, now_wall)
            {
                self.link.outbox.push(StructuralEvent::Collided(correction));
            }
        }

        for hit in sweep_bullet_hits(&mut self.bullets, &mut self.roster, self_index) {
            log::debug!("bullet {} struck peer {}", hit.bullet_id, hit.struck);
        }

        for id in self.bullets.expire(now_wall) {
            log::debug!("bullet {} expired", id);
        }
    }

    /// Network-publish tick: the self body's positional state, volatile.
    fn publish_snapshot(&mut self) -> io::Result<()> {
        let Some(body) = self.self_body() else {
            return Ok(());
        };
        let update = MoveUpdate {
            timestamp_ms: unix_ms(),
            position: body.position.into(),
            velocity: body.velocity.into(),
            flags: body.flags.bits(),
        };
        self.send_payload(Payload::Snapshot(update))
    }

    fn flush_outbox(&mut self, mono_ms: u64) -> io::Result<()> {
        let due = self.link.outbox.due(mono_ms);
        for (seq, event) in due {
            self.send_payload(Payload::Event { seq, event })?;
        }
        Ok(())
    }

    fn send_payload(&mut self, payload: Payload) -> io::Result<()> {
        let header = self.link.next_header();
        self.endpoint
            .send_to(&Packet::new(header, payload), self.relay_addr)?;
        Ok(())
    }
}
