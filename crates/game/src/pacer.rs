use std::time::Instant;

/// Nominal simulate/render loop period.
pub const SIMULATE_TARGET_MS: f32 = 1000.0 / 60.0;
/// Nominal input-sample loop period.
pub const INPUT_TARGET_MS: f32 = 1000.0 / 60.0;
/// Nominal network-publish loop period.
pub const NETWORK_TARGET_MS: f32 = 1000.0 / 10.0;

const STEP_MS: f32 = 0.1;
const FLOOR_MS: f32 = 0.0;
const CEILING_MS: f32 = 20.0;

/// Self-tuning tick governor. Instead of a fixed-rate timer, each loop
/// sleeps its current interval and nudges that interval by a small fixed
/// step toward whichever direction keeps the measured period close to the
/// nominal target — an integral-feedback controller that tolerates host
/// scheduler jitter. The interval can be pushed down to zero but is never
/// raised past 20 ms.
#[derive(Debug)]
pub struct Pacer {
    target_ms: f32,
    interval_ms: f32,
    last_tick: Instant,
}

impl Pacer {
    pub fn new(target_ms: f32) -> Self {
        Self {
            target_ms,
            interval_ms: target_ms,
            last_tick: Instant::now(),
        }
    }

    pub fn interval_ms(&self) -> f32 {
        self.interval_ms
    }

    /// True when the loop should run a tick now. Firing a tick retunes the
    /// interval from the measured period.
    pub fn poll(&mut self, now: Instant) -> bool {
        let elapsed_ms = now.duration_since(self.last_tick).as_secs_f32() * 1000.0;
        if elapsed_ms < self.interval_ms {
            return false;
        }
        self.tune(elapsed_ms);
        self.last_tick = now;
        true
    }

    fn tune(&mut self, measured_ms: f32) {
        if self.interval_ms > FLOOR_MS && measured_ms > self.target_ms {
            self.interval_ms = (self.interval_ms - STEP_MS).max(FLOOR_MS);
        } else if self.interval_ms < CEILING_MS && measured_ms < self.target_ms {
            self.interval_ms = (self.interval_ms + STEP_MS).min(CEILING_MS);
        }
    }
}
