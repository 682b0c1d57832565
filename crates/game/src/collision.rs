use glam::Vec2;

use crate::body::SIM_TICK_MS;
use crate::bullet::BulletSet;
use crate::net::Correction;
use crate::roster::Roster;
use crate::tracker::{OwnedBody, ShadowBody, TrackedBody};

/// A self body re-triggers against the same or another shadow at most once
/// per this window.
pub const SELF_COLLISION_COOLDOWN_MS: u64 = 20;
/// The affected side accepts a correction only if it is newer than its own
/// last collision minus this slack.
pub const CORRECTION_ACCEPT_WINDOW_MS: u64 = 400;
/// Bullet hits nudge the struck body by this fraction of the elastic split.
pub const BULLET_IMPULSE_SCALE: f32 = 0.07;

fn contact_normal(from: Vec2, to: Vec2) -> Vec2 {
    let delta = to - from;
    let angle = delta.y.atan2(delta.x);
    Vec2::new(angle.cos(), angle.sin())
}

/// Detects and resolves overlap between the locally owned body and one
/// shadow. Mass is modeled implicitly by radius: the heavier (larger) side
/// receives proportionally less of the velocity exchange.
///
/// On a hit this mutates both local copies immediately, fences the shadow
/// against stale snapshots, and returns the correction to publish so the
/// shadow's owner can apply the symmetric half.
pub fn resolve_owned_overlap(
    owned: &mut OwnedBody,
    owned_index: u32,
    shadow: &mut ShadowBody,
    shadow_index: u32,
    now_ms: u64,
) -> Option<Correction> {
    if !owned.body.overlaps(&shadow.body) {
        return None;
    }
    if owned.last_collision_ms >= now_ms.saturating_sub(SELF_COLLISION_COOLDOWN_MS) {
        return None;
    }
    owned.last_collision_ms = now_ms;

    let normal = contact_normal(owned.body.position, shadow.body.position);
    let relative_speed = (shadow.body.velocity - owned.body.velocity).length();
    let exchange = normal * relative_speed;

    let radius_sum = owned.body.radius + shadow.body.radius;
    let owned_delta = -exchange * (shadow.body.radius / radius_sum);
    let shadow_delta = exchange * (owned.body.radius / radius_sum);

    // penetration resolution: place self just outside the shadow
    owned.body.position = shadow.body.position - normal * radius_sum;
    owned.body.velocity += owned_delta;

    // local, provisional view of the other side; authoritative for us until
    // its owner republishes
    shadow.body.velocity += shadow_delta;
    shadow.drift = Vec2::ZERO;
    shadow.raise_fence(now_ms);

    Some(Correction {
        cause: owned_index,
        affected: shadow_index,
        velocity_delta: shadow_delta.into(),
        timestamp_ms: now_ms,
    })
}

/// Applies a correction in which the local body is the affected side. The
/// position advance compensates for the event's transit latency; the causing
/// shadow is repositioned tangent to the corrected self since its owner had
/// authoritative contact geometry when it resolved.
///
/// Returns false when the correction is too old to accept.
pub fn apply_correction(
    owned: &mut OwnedBody,
    cause: &mut ShadowBody,
    correction: &Correction,
    now_ms: u64,
) -> bool {
    if owned.last_collision_ms >= correction.timestamp_ms.saturating_sub(CORRECTION_ACCEPT_WINDOW_MS)
    {
        return false;
    }

    let delta = Vec2::from(correction.velocity_delta);
    owned.body.velocity += delta;

    let transit_ms = now_ms.saturating_sub(correction.timestamp_ms) as f32;
    owned.body.position += delta * (transit_ms / SIM_TICK_MS);

    let normal = contact_normal(cause.body.position, owned.body.position);
    let radius_sum = cause.body.radius + owned.body.radius;
    cause.body.position = owned.body.position - normal * radius_sum;
    cause.drift = Vec2::ZERO;

    true
}

/// One bullet/body hit, reported for local bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulletHit {
    pub bullet_id: u64,
    pub struck: u32,
}

/// Sweeps every live bullet against every tracked body except the bullet's
/// owner. A struck bullet is removed locally in every case; the velocity
/// nudge lands only when the struck body is the local self (its owner) — the
/// shared despawn makes the hit self-evident to everyone else.
pub fn sweep_bullet_hits(
    bullets: &mut BulletSet,
    roster: &mut Roster<TrackedBody>,
    self_index: u32,
) -> Vec<BulletHit> {
    let mut hits = Vec::new();

    bullets.retain(|bullet| {
        for (index, tracked) in roster.iter_mut() {
            if index == bullet.owner {
                continue;
            }
            let body = tracked.body_mut();
            let reach = body.radius + bullet.radius;
            if body.position.distance_squared(bullet.position) > reach * reach {
                continue;
            }

            if index == self_index {
                let normal = contact_normal(body.position, bullet.position);
                let relative_speed = (bullet.velocity - body.velocity).length();
                let exchange = normal * relative_speed;
                let split = bullet.radius / reach;
                body.velocity += -exchange * split * BULLET_IMPULSE_SCALE;
            }

            hits.push(BulletHit {
                bullet_id: bullet.id,
                struck: index,
            });
            return false;
        }
        true
    });

    hits
}
