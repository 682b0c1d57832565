use glam::Vec2;
use rand::Rng;

use crate::body::Body;
use crate::net::BulletSpawn;

/// Exponential velocity damping applied to bullets once per simulate tick.
pub const BULLET_DAMPING: f32 = 0.98;
/// Aim-direction speed added on top of the firer's own velocity.
pub const MUZZLE_SPEED: f32 = 0.03;
/// Every peer despawns a bullet this long after spawn, independently.
pub const BULLET_LIFETIME_MS: u64 = 500;

/// A transient projectile. `id` is assigned by the relay and globally
/// unique; `sides`/`rotation`/`spin` are cosmetic polygon data with no
/// physical meaning beyond the spin integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bullet {
    pub id: u64,
    pub owner: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub spin: f32,
    pub rotation: f32,
    pub radius: f32,
    pub sides: u8,
    pub color: [u8; 3],
    /// Explicit expiry stamp, checked every simulate tick.
    pub expires_at_ms: u64,
}

impl Bullet {
    pub fn from_spawn(id: u64, spawn: &BulletSpawn, now_ms: u64) -> Self {
        Self {
            id,
            owner: spawn.owner,
            position: Vec2::from(spawn.position),
            velocity: Vec2::from(spawn.velocity),
            spin: spawn.spin,
            rotation: spawn.rotation,
            radius: spawn.radius,
            sides: spawn.sides,
            color: spawn.color,
            expires_at_ms: now_ms + BULLET_LIFETIME_MS,
        }
    }

    pub fn integrate(&mut self) {
        self.position += self.velocity;
        self.velocity *= BULLET_DAMPING;
        self.rotation += self.spin;
    }
}

/// Builds a fire request from the firer's current state and an aim vector
/// (relative to the firer, any magnitude). Spin, radius fraction, side
/// count, and initial rotation are randomized at fire time so every peer
/// sees the same cosmetics via the relayed spawn.
pub fn fire<R: Rng>(owner: u32, body: &Body, aim: Vec2, rng: &mut R) -> BulletSpawn {
    let angle = aim.y.atan2(aim.x);
    let velocity = body.velocity + Vec2::new(angle.cos(), angle.sin()) * MUZZLE_SPEED;

    let spin_deg = (rng.gen_range(0.0..=20.0_f32)).round();
    let radius_fraction = (rng.gen_range(0.0..1000.0_f32)).floor() / 2000.0;
    let rotation_deg = (rng.gen_range(0.0..=360.0_f32)).round();

    BulletSpawn {
        owner,
        position: body.position.into(),
        velocity: velocity.into(),
        spin: spin_deg.to_radians(),
        rotation: rotation_deg.to_radians(),
        radius: body.radius * radius_fraction,
        sides: rng.gen_range(3..=7),
        color: body.color,
    }
}

/// A peer's local set of live bullets. Membership is local-only: peers may
/// transiently disagree about a bullet's existence between a hit on one
/// peer and expiry on another.
#[derive(Debug, Default)]
pub struct BulletSet {
    bullets: Vec<Bullet>,
}

impl BulletSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bullet: Bullet) {
        self.bullets.push(bullet);
    }

    pub fn integrate_all(&mut self) {
        for bullet in &mut self.bullets {
            bullet.integrate();
        }
    }

    /// Removes everything past its expiry stamp, returning the ids.
    pub fn expire(&mut self, now_ms: u64) -> Vec<u64> {
        let mut expired = Vec::new();
        self.bullets.retain(|b| {
            if now_ms >= b.expires_at_ms {
                expired.push(b.id);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn retain(&mut self, f: impl FnMut(&Bullet) -> bool) {
        self.bullets.retain(f);
    }

    pub fn contains(&self, id: u64) -> bool {
        self.bullets.iter().any(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.iter()
    }

    pub fn len(&self) -> usize {
        self.bullets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }
}
