pub mod body;
pub mod bullet;
pub mod collision;
pub mod net;
pub mod pacer;
pub mod roster;
pub mod tracker;

pub use body::{BODY_DAMPING, Body, INPUT_IMPULSE, InputFlags, SIM_TICK_MS};
pub use bullet::{BULLET_DAMPING, BULLET_LIFETIME_MS, Bullet, BulletSet, MUZZLE_SPEED, fire};
pub use collision::{
    BULLET_IMPULSE_SCALE, BulletHit, CORRECTION_ACCEPT_WINDOW_MS, SELF_COLLISION_COOLDOWN_MS,
    apply_correction, resolve_owned_overlap, sweep_bullet_hits,
};
pub use net::{
    BodyState, BulletSpawn, Correction, DEFAULT_PORT, Endpoint, Link, LossSimulation, MoveUpdate,
    NetStats, Packet, PacketError, PacketHeader, Payload, StructuralEvent, unix_ms,
};
pub use pacer::{INPUT_TARGET_MS, NETWORK_TARGET_MS, Pacer, SIMULATE_TARGET_MS};
pub use roster::Roster;
pub use tracker::{DRIFT_SUPPRESS_MS, OwnedBody, ShadowBody, TrackedBody};
