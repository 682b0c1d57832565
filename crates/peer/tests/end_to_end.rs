use std::thread;
use std::time::{Duration, Instant};

use bump::{InputFlags, LossSimulation, TrackedBody};
use bump_peer::{PeerSession, SessionState};
use bump_relay::{RelayConfig, RelayServer};
use glam::Vec2;

fn start_relay() -> RelayServer {
    RelayServer::bind("127.0.0.1:0", RelayConfig::default()).unwrap()
}

/// Runs one cooperative iteration of the relay and every session.
fn step(relay: &mut RelayServer, sessions: &mut [&mut PeerSession]) {
    relay.tick_once();
    for session in sessions.iter_mut() {
        session.update().unwrap();
    }
    thread::sleep(Duration::from_millis(1));
}

fn pump_for(relay: &mut RelayServer, sessions: &mut [&mut PeerSession], ms: u64) {
    let deadline = Instant::now() + Duration::from_millis(ms);
    while Instant::now() < deadline {
        step(relay, sessions);
    }
}

#[test]
fn join_assigns_indices_in_order() {
    let mut relay = start_relay();
    let addr = relay.local_addr();

    let mut a = PeerSession::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(2000);
    while a.state() != SessionState::Active && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a]);
    }
    assert_eq!(a.state(), SessionState::Active);
    assert_eq!(a.self_index(), Some(0));
    assert_eq!(a.roster().live(), 1);

    let mut b = PeerSession::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(2000);
    while b.state() != SessionState::Active && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a, &mut b]);
    }
    assert_eq!(b.self_index(), Some(1));

    // B's roster was seeded from the init event and already holds A.
    assert_eq!(b.roster().live(), 2);
    assert!(matches!(b.roster().get(0), Some(TrackedBody::Shadow(_))));
    assert!(matches!(b.roster().get(1), Some(TrackedBody::Owned(_))));

    // A learns about B through an add event.
    let deadline = Instant::now() + Duration::from_millis(2000);
    while a.roster().live() < 2 && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a, &mut b]);
    }
    assert_eq!(a.roster().live(), 2);
    assert!(matches!(a.roster().get(1), Some(TrackedBody::Shadow(_))));

    assert_eq!(relay.connected(), 2);
}

#[test]
fn fired_bullet_reaches_both_peers_and_expires() {
    let mut relay = start_relay();
    let addr = relay.local_addr();

    let mut a = PeerSession::connect(addr).unwrap();
    let mut b = PeerSession::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(3000);
    while (a.state() != SessionState::Active
        || b.state() != SessionState::Active
        || a.roster().live() < 2)
        && Instant::now() < deadline
    {
        step(&mut relay, &mut [&mut a, &mut b]);
    }
    assert_eq!(a.roster().live(), 2);
    assert_eq!(b.roster().live(), 2);

    b.request_fire(Vec2::new(1.0, 0.0));

    // The relay assigns the first global bullet id and rebroadcasts,
    // so the bullet appears on the firer and the observer alike.
    let deadline = Instant::now() + Duration::from_millis(2000);
    while !(a.bullets().contains(0) && b.bullets().contains(0)) && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a, &mut b]);
    }
    assert!(a.bullets().contains(0));
    assert!(b.bullets().contains(0));

    let owner = a.bullets().iter().next().map(|bullet| bullet.owner);
    assert_eq!(owner, Some(1));

    // Each peer retires the bullet on its own clock after the lifetime
    // elapses; no removal message is exchanged.
    let deadline = Instant::now() + Duration::from_millis(3000);
    while !(a.bullets().is_empty() && b.bullets().is_empty()) && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a, &mut b]);
    }
    assert!(a.bullets().is_empty());
    assert!(b.bullets().is_empty());
}

#[test]
fn movement_propagates_to_remote_roster() {
    let mut relay = start_relay();
    let addr = relay.local_addr();

    let mut a = PeerSession::connect(addr).unwrap();
    let mut b = PeerSession::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(3000);
    while (a.state() != SessionState::Active
        || b.state() != SessionState::Active
        || a.roster().live() < 2)
        && Instant::now() < deadline
    {
        step(&mut relay, &mut [&mut a, &mut b]);
    }

    let before = match a.roster().get(1) {
        Some(tracked) => tracked.body().position,
        None => panic!("A never learned about B"),
    };

    // Hold a key on B long enough for several snapshot rounds.
    b.set_input(InputFlags::RIGHT);
    pump_for(&mut relay, &mut [&mut a, &mut b], 600);
    b.set_input(InputFlags::empty());

    let after = match a.roster().get(1) {
        Some(tracked) => tracked.body().position,
        None => panic!("B disappeared from A's roster"),
    };
    assert!(
        after.x > before.x,
        "expected B's shadow on A to move right: {} -> {}",
        before.x,
        after.x
    );
}

#[test]
fn leave_removes_peer_everywhere() {
    let mut relay = start_relay();
    let addr = relay.local_addr();

    let mut a = PeerSession::connect(addr).unwrap();
    let mut b = PeerSession::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(3000);
    while (a.state() != SessionState::Active
        || b.state() != SessionState::Active
        || a.roster().live() < 2)
        && Instant::now() < deadline
    {
        step(&mut relay, &mut [&mut a, &mut b]);
    }

    b.leave().unwrap();

    let deadline = Instant::now() + Duration::from_millis(2000);
    while a.roster().live() > 1 && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a]);
    }
    assert_eq!(a.roster().live(), 1);
    assert_eq!(relay.connected(), 1);

    // The vacated slot is handed to the next joiner once the room is
    // empty again; with A still present the next index continues.
    let mut c = PeerSession::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(2000);
    while c.state() != SessionState::Active && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a, &mut c]);
    }
    assert_eq!(c.self_index(), Some(2));
}

#[test]
fn structural_events_survive_packet_loss() {
    let mut relay = start_relay();
    let addr = relay.local_addr();

    let mut a = PeerSession::connect(addr).unwrap();
    let deadline = Instant::now() + Duration::from_millis(2000);
    while a.state() != SessionState::Active && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a]);
    }

    let mut b = PeerSession::connect(addr).unwrap();
    b.set_loss_simulation(LossSimulation::with_loss(30.0));

    // Join retries and 100ms event resends ride out the drops.
    let deadline = Instant::now() + Duration::from_millis(8000);
    while (b.state() != SessionState::Active || b.roster().live() < 2)
        && Instant::now() < deadline
    {
        step(&mut relay, &mut [&mut a, &mut b]);
    }
    assert_eq!(b.state(), SessionState::Active);
    assert_eq!(b.roster().live(), 2);

    a.request_fire(Vec2::new(0.0, 1.0));
    let deadline = Instant::now() + Duration::from_millis(8000);
    while !b.bullets().contains(0) && Instant::now() < deadline {
        step(&mut relay, &mut [&mut a, &mut b]);
    }
    assert!(b.bullets().contains(0));
}
