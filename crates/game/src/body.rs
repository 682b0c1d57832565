use bitflags::bitflags;
use glam::Vec2;

use crate::net::BodyState;

/// Exponential velocity damping applied once per simulate tick.
pub const BODY_DAMPING: f32 = 0.95;
/// Velocity impulse added per simulate tick for each active input flag.
pub const INPUT_IMPULSE: f32 = 0.001;
/// Nominal simulate tick interval, used to scale dead-reckoning drift and
/// correction latency compensation.
pub const SIM_TICK_MS: f32 = 1000.0 / 60.0;

bitflags! {
    /// Directional input held by a body's owner. Travels on the wire as a
    /// raw byte inside `MoveUpdate`/`BodyState`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InputFlags: u8 {
        const LEFT = 1 << 0;
        const UP = 1 << 1;
        const RIGHT = 1 << 2;
        const DOWN = 1 << 3;
    }
}

/// A circular game body. Plain value type shared by the relay roster, the
/// owned body, and remote shadows. Coordinates are screen-style: +x right,
/// +y down, world units roughly [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub color: [u8; 3],
    pub flags: InputFlags,
}

impl Body {
    pub fn new(position: Vec2, radius: f32, color: [u8; 3]) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
            color,
            flags: InputFlags::empty(),
        }
    }

    /// One input-sample tick: a fixed impulse along each held axis.
    pub fn apply_input_impulses(&mut self) {
        if self.flags.contains(InputFlags::LEFT) {
            self.velocity.x -= INPUT_IMPULSE;
        }
        if self.flags.contains(InputFlags::UP) {
            self.velocity.y -= INPUT_IMPULSE;
        }
        if self.flags.contains(InputFlags::RIGHT) {
            self.velocity.x += INPUT_IMPULSE;
        }
        if self.flags.contains(InputFlags::DOWN) {
            self.velocity.y += INPUT_IMPULSE;
        }
    }

    /// One simulate tick: position advances by velocity, then velocity damps.
    pub fn integrate(&mut self) {
        self.position += self.velocity;
        self.velocity *= BODY_DAMPING;
    }

    /// Circle-circle test on squared distances.
    pub fn overlaps(&self, other: &Body) -> bool {
        let reach = self.radius + other.radius;
        self.position.distance_squared(other.position) <= reach * reach
    }

    pub fn to_state(&self) -> BodyState {
        BodyState {
            position: self.position.into(),
            velocity: self.velocity.into(),
            radius: self.radius,
            color: self.color,
            flags: self.flags.bits(),
        }
    }

    pub fn from_state(state: &BodyState) -> Self {
        Self {
            position: Vec2::from(state.position),
            velocity: Vec2::from(state.velocity),
            radius: state.radius,
            color: state.color,
            flags: InputFlags::from_bits_truncate(state.flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damping_converges_without_input() {
        let mut body = Body::new(Vec2::ZERO, 0.03, [0, 0, 0]);
        body.velocity = Vec2::new(0.05, -0.02);

        let mut prev_speed = body.velocity.length();
        for _ in 0..240 {
            body.integrate();
            let speed = body.velocity.length();
            assert!(speed < prev_speed, "speed must strictly decrease");
            // damping never flips a component's sign
            assert!(body.velocity.x >= 0.0);
            assert!(body.velocity.y <= 0.0);
            prev_speed = speed;
        }
        assert!(prev_speed < 1e-6);
    }

    #[test]
    fn input_impulses_follow_screen_axes() {
        let mut body = Body::new(Vec2::ZERO, 0.03, [0, 0, 0]);

        body.flags = InputFlags::LEFT | InputFlags::UP;
        body.apply_input_impulses();
        assert_eq!(body.velocity, Vec2::new(-INPUT_IMPULSE, -INPUT_IMPULSE));

        body.flags = InputFlags::RIGHT | InputFlags::DOWN;
        body.apply_input_impulses();
        assert_eq!(body.velocity, Vec2::ZERO);
    }

    #[test]
    fn opposed_flags_cancel() {
        let mut body = Body::new(Vec2::ZERO, 0.03, [0, 0, 0]);
        body.flags = InputFlags::all();
        body.apply_input_impulses();
        assert_eq!(body.velocity, Vec2::ZERO);
    }

    #[test]
    fn overlap_test_uses_radius_sum() {
        let a = Body::new(Vec2::ZERO, 0.02, [0, 0, 0]);
        let mut b = Body::new(Vec2::new(0.05, 0.0), 0.02, [0, 0, 0]);
        assert!(!a.overlaps(&b));

        b.position.x = 0.039;
        assert!(a.overlaps(&b));
    }

    #[test]
    fn wire_roundtrip_preserves_flags() {
        let mut body = Body::new(Vec2::new(0.25, 0.75), 0.021, [9, 8, 7]);
        body.flags = InputFlags::LEFT | InputFlags::DOWN;
        body.velocity = Vec2::new(0.001, -0.002);

        let back = Body::from_state(&body.to_state());
        assert_eq!(body, back);
    }
}
