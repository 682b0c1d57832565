use glam::Vec2;

use crate::body::{Body, InputFlags, SIM_TICK_MS};
use crate::net::MoveUpdate;

/// Snapshots stamped inside this window past a shadow's fence do not steer
/// drift: right after a correction the reported positions are known-stale
/// and would only amplify noise.
pub const DRIFT_SUPPRESS_MS: u64 = 500;

/// The locally simulated, exclusively owned body.
#[derive(Debug, Clone, Copy)]
pub struct OwnedBody {
    pub body: Body,
    /// Wall-clock stamp of the last locally detected collision.
    pub last_collision_ms: u64,
}

impl OwnedBody {
    pub fn new(body: Body) -> Self {
        Self {
            body,
            last_collision_ms: 0,
        }
    }
}

/// A peer's local reconstruction of a remote body. Position is never adopted
/// from the network directly; it is steered toward reports via `drift`, a
/// per-tick corrective velocity, so the shadow glides between sparse
/// snapshots instead of teleporting.
#[derive(Debug, Clone, Copy)]
pub struct ShadowBody {
    pub body: Body,
    /// Dead-reckoning correction added to position once per simulate tick.
    pub drift: Vec2,
    /// Monotonic receive time of the last absorbed snapshot.
    last_update_ms: Option<u64>,
    /// Fence: incoming updates stamped at or below this are discarded. Only
    /// ever raised, never lowered.
    ignore_before_ms: u64,
}

impl ShadowBody {
    pub fn new(body: Body) -> Self {
        Self {
            body,
            drift: Vec2::ZERO,
            last_update_ms: None,
            ignore_before_ms: 0,
        }
    }

    pub fn ignore_before_ms(&self) -> u64 {
        self.ignore_before_ms
    }

    /// Raises the fence. Applied when a local authoritative correction must
    /// not be undone by stale snapshots still in flight.
    pub fn raise_fence(&mut self, timestamp_ms: u64) {
        self.ignore_before_ms = self.ignore_before_ms.max(timestamp_ms);
    }

    /// Reconciles one positional snapshot. `now_ms` is this peer's monotonic
    /// clock; `update.timestamp_ms` is the sender's wall clock.
    pub fn absorb_snapshot(&mut self, update: &MoveUpdate, now_ms: u64) {
        if update.timestamp_ms > self.ignore_before_ms {
            self.body.velocity = Vec2::from(update.velocity);
            self.body.flags = InputFlags::from_bits_truncate(update.flags);
        }

        match self.last_update_ms {
            None => {
                // first report: no baseline to infer drift from
                self.drift = Vec2::ZERO;
                self.last_update_ms = Some(now_ms);
            }
            Some(last) if now_ms > last => {
                if update.timestamp_ms > self.ignore_before_ms + DRIFT_SUPPRESS_MS {
                    let elapsed = (now_ms - last) as f32;
                    let offset = Vec2::from(update.position) - self.body.position;
                    self.drift = offset * SIM_TICK_MS / elapsed;
                } else {
                    self.drift = Vec2::ZERO;
                }
                self.last_update_ms = Some(now_ms);
            }
            Some(_) => {}
        }
    }

    /// One simulate tick: normal kinematics plus the dead-reckoning nudge.
    pub fn integrate(&mut self) {
        self.body.integrate();
        self.body.position += self.drift;
    }
}

/// Roster entry on a peer: either the body this peer owns or a shadow of a
/// remote one. The owner mutates `Owned` every simulate tick; shadows are
/// only touched by the simulate and reconciliation paths.
#[derive(Debug, Clone, Copy)]
pub enum TrackedBody {
    Owned(OwnedBody),
    Shadow(ShadowBody),
}

impl TrackedBody {
    pub fn body(&self) -> &Body {
        match self {
            TrackedBody::Owned(owned) => &owned.body,
            TrackedBody::Shadow(shadow) => &shadow.body,
        }
    }

    pub fn body_mut(&mut self) -> &mut Body {
        match self {
            TrackedBody::Owned(owned) => &mut owned.body,
            TrackedBody::Shadow(shadow) => &mut shadow.body,
        }
    }

    pub fn as_shadow_mut(&mut self) -> Option<&mut ShadowBody> {
        match self {
            TrackedBody::Shadow(shadow) => Some(shadow),
            TrackedBody::Owned(_) => None,
        }
    }

    pub fn as_owned_mut(&mut self) -> Option<&mut OwnedBody> {
        match self {
            TrackedBody::Owned(owned) => Some(owned),
            TrackedBody::Shadow(_) => None,
        }
    }

    pub fn integrate(&mut self) {
        match self {
            TrackedBody::Owned(owned) => owned.body.integrate(),
            TrackedBody::Shadow(shadow) => shadow.integrate(),
        }
    }
}
