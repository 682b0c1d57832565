use std::time::Instant;

use bump::InputFlags;
use glam::Vec2;
use rand::Rng;

/// Scripted input source for headless peers. Holds a direction for a
/// short while, then picks a new one, and occasionally fires toward a
/// random point.
pub struct WanderBot {
    held: InputFlags,
    next_turn: Instant,
    next_fire: Instant,
}

impl WanderBot {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            held: InputFlags::empty(),
            next_turn: now,
            next_fire: now + std::time::Duration::from_millis(1500),
        }
    }

    /// Returns the flags to hold this tick, and an aim point when the
    /// bot decides to fire.
    pub fn step<R: Rng>(&mut self, rng: &mut R, now: Instant) -> (InputFlags, Option<Vec2>) {
        if now >= self.next_turn {
            self.held = random_direction(rng);
            let hold_ms = rng.gen_range(300..1200);
            self.next_turn = now + std::time::Duration::from_millis(hold_ms);
        }

        let mut aim = None;
        if now >= self.next_fire {
            aim = Some(Vec2::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ));
            let wait_ms = rng.gen_range(800..2500);
            self.next_fire = now + std::time::Duration::from_millis(wait_ms);
        }

        (self.held, aim)
    }
}

impl Default for WanderBot {
    fn default() -> Self {
        Self::new()
    }
}

fn random_direction<R: Rng>(rng: &mut R) -> InputFlags {
    let mut flags = InputFlags::empty();
    if rng.gen_bool(0.5) {
        flags |= if rng.gen_bool(0.5) {
            InputFlags::LEFT
        } else {
            InputFlags::RIGHT
        };
    }
    if rng.gen_bool(0.5) {
        flags |= if rng.gen_bool(0.5) {
            InputFlags::UP
        } else {
            InputFlags::DOWN
        };
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn direction_flags_never_oppose() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let flags = random_direction(&mut rng);
            assert!(!flags.contains(InputFlags::LEFT | InputFlags::RIGHT));
            assert!(!flags.contains(InputFlags::UP | InputFlags::DOWN));
        }
    }

    #[test]
    fn bot_eventually_fires() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut bot = WanderBot::new();
        let start = Instant::now();
        let mut fired = false;
        for tick in 0..1000u64 {
            let now = start + std::time::Duration::from_millis(tick * 16);
            let (_, aim) = bot.step(&mut rng, now);
            if aim.is_some() {
                fired = true;
                break;
            }
        }
        assert!(fired);
    }
}
